//! Engine configuration
//!
//! Configuration can be built in code, through [`crate::EngineBuilder`], or
//! loaded from TOML:
//!
//! ```toml
//! size = 512
//! page_size = 64
//! random_attempts = 100
//! seed = 42
//! ```

use crate::allocator::placement::DEFAULT_RANDOM_ATTEMPTS;
use crate::error::{BitramError, Result};
use crate::paging::DEFAULT_PAGE_SIZE;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Total number of bit cells, fixed for the engine's lifetime
    pub size: usize,

    /// Initial page size in bits
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Random placement draws before reporting out of memory
    #[serde(default = "default_random_attempts")]
    pub random_attempts: usize,

    /// Seed for a deterministic random source (thread RNG when absent)
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

fn default_random_attempts() -> usize {
    DEFAULT_RANDOM_ATTEMPTS
}

impl EngineConfig {
    pub fn new(size: usize) -> Self {
        EngineConfig {
            size,
            page_size: DEFAULT_PAGE_SIZE,
            random_attempts: DEFAULT_RANDOM_ATTEMPTS,
            seed: None,
        }
    }

    /// Parse and validate TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| BitramError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.size == 0 {
            return Err(BitramError::InvalidSize(self.size));
        }
        if self.page_size == 0 || self.size % self.page_size != 0 {
            return Err(BitramError::InvalidPageSize {
                page_size: self.page_size,
                size: self.size,
            });
        }
        if self.random_attempts == 0 {
            return Err(BitramError::Config(
                "random_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::new(512);
        assert_eq!(config.page_size, 64);
        assert_eq!(config.random_attempts, 100);
        assert_eq!(config.seed, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml_with_defaults() {
        let config = EngineConfig::from_toml_str("size = 256\nseed = 9\n").unwrap();
        assert_eq!(config.size, 256);
        assert_eq!(config.page_size, 64);
        assert_eq!(config.seed, Some(9));
    }

    #[test]
    fn test_validation_errors() {
        assert!(matches!(
            EngineConfig::new(0).validate(),
            Err(BitramError::InvalidSize(0))
        ));
        assert!(matches!(
            EngineConfig::new(100).validate(),
            Err(BitramError::InvalidPageSize { .. })
        ));
        assert!(matches!(
            EngineConfig::from_toml_str("size = 128\nrandom_attempts = 0\n"),
            Err(BitramError::Config(_))
        ));
        assert!(matches!(
            EngineConfig::from_toml_str("size = 128\nbogus = 1\n"),
            Err(BitramError::Config(_))
        ));
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = EngineConfig::new(1024);
        config.page_size = 128;
        config.seed = Some(7);

        let text = config.to_toml_string().unwrap();
        assert_eq!(EngineConfig::from_toml_str(&text).unwrap(), config);
    }
}

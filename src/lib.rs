//! # Bitram - Bit-Addressable Memory Engine
//!
//! `bitram` simulates a small memory device whose smallest unit is a single
//! bit. Every cell has its own read/write permissions, every write lands in a
//! primary copy and two replicas so single-copy faults can be voted away, and
//! a registry maps names to typed variables stored at bit offsets.
//!
//! - **Three copies** with majority-vote correction
//! - **Per-bit permissions** checked before any multi-bit mutation
//! - **Placement strategies**: random, left-fit and aligned
//! - **Defragmentation** that carries variables and permissions along
//! - **Snapshots** framed with a magic number and CRC32
//!
//! ## Quick Start
//!
//! ```rust
//! use bitram::{Engine, Result};
//!
//! # fn main() -> Result<()> {
//! let mut engine = Engine::new(512)?;
//!
//! engine.declare_int("a", 8, 7)?;
//! engine.declare_int("b", 8, 35)?;
//! let sum = engine.read_int("a")? + engine.read_int("b")?;
//! engine.declare_int("sum", 8, sum)?;
//!
//! assert_eq!(engine.read_int("sum")?, 42);
//! # Ok(())
//! # }
//! ```
//!
//! ## Builder
//!
//! ```rust
//! use bitram::{EngineBuilder, Placement, Result, VarType};
//!
//! # fn main() -> Result<()> {
//! let mut engine = EngineBuilder::new()
//!     .size(1024)
//!     .page_size(128)
//!     .seed(42)
//!     .build()?;
//!
//! let position = engine.declare("counter", 16, 0, VarType::Int, 8, Placement::Random)?;
//! assert_eq!(position % 8, 0);
//! # Ok(())
//! # }
//! ```

pub mod core;

// Re-export core modules so crate:: paths resolve from the crate root
pub use crate::core::{
    allocator, bits, codec, config, engine, error, memory, paging, permissions, random, snapshot,
    variables,
};

pub use crate::core::{
    allocator::{Allocator, Placement, Relocation},
    config::EngineConfig,
    engine::{DefragReport, Engine, EngineStats},
    error::{BitramError, Result},
    memory::{MemoryStore, Replica},
    paging::PagingTracker,
    permissions::{Access, Permission, PermissionTable},
    random::{RandomSource, SeededRandom, ThreadRandom},
    snapshot::EngineState,
    variables::{VarType, Variable, VariableRegistry, VariableValue},
};

use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;
use tracing::{debug, info};

/// Builder for creating engines with custom configuration
pub struct EngineBuilder {
    size: Option<usize>,
    page_size: usize,
    random_attempts: usize,
    seed: Option<u64>,
    random_source: Option<Box<dyn RandomSource>>,
}

impl EngineBuilder {
    /// Create a new EngineBuilder with default settings
    pub fn new() -> Self {
        EngineBuilder {
            size: None,
            page_size: paging::DEFAULT_PAGE_SIZE,
            random_attempts: allocator::placement::DEFAULT_RANDOM_ATTEMPTS,
            seed: None,
            random_source: None,
        }
    }

    /// Start from an existing configuration
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.size = Some(config.size);
        self.page_size = config.page_size;
        self.random_attempts = config.random_attempts;
        self.seed = config.seed;
        self
    }

    /// Set the number of bit cells (required)
    pub fn size(mut self, size: usize) -> Self {
        self.size = Some(size);
        self
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Set how many random draws placement makes before giving up
    pub fn random_attempts(mut self, attempts: usize) -> Self {
        self.random_attempts = attempts;
        self
    }

    /// Use a deterministic random source seeded with `seed`
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Use a custom random source. Takes precedence over [`EngineBuilder::seed`].
    pub fn random_source(mut self, rng: Box<dyn RandomSource>) -> Self {
        self.random_source = Some(rng);
        self
    }

    /// Build the Engine instance
    pub fn build(self) -> Result<Engine> {
        let size = self
            .size
            .ok_or_else(|| BitramError::Config("size must be set".to_string()))?;

        let config = EngineConfig {
            size,
            page_size: self.page_size,
            random_attempts: self.random_attempts,
            seed: self.seed,
        };
        info!("Building engine with {} bits", size);

        match self.random_source {
            Some(rng) => {
                debug!("Using caller-supplied random source");
                Engine::with_random_source(config, rng)
            }
            None => Engine::from_config(config),
        }
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Engine handle shared across threads
///
/// Every call takes the lock for its whole duration, so a closure passed to
/// [`SharedEngine::with`] observes and mutates the engine atomically.
#[derive(Clone)]
pub struct SharedEngine {
    inner: Arc<Mutex<Engine>>,
}

impl SharedEngine {
    pub fn new(engine: Engine) -> Self {
        SharedEngine {
            inner: Arc::new(Mutex::new(engine)),
        }
    }

    /// Run `f` with exclusive access to the engine
    pub fn with<R>(&self, f: impl FnOnce(&mut Engine) -> R) -> R {
        let mut guard = self.inner.lock();
        f(&mut guard)
    }

    pub fn lock(&self) -> MutexGuard<'_, Engine> {
        self.inner.lock()
    }
}

impl From<Engine> for SharedEngine {
    fn from(engine: Engine) -> Self {
        SharedEngine::new(engine)
    }
}

//! Named variables over allocated bit ranges
//!
//! A variable is a view: it records where its bits live and how to
//! interpret them, and owns no storage of its own. The typed read/write
//! operations live on [`crate::Engine`], which combines the registry with
//! memory, allocation and permissions.

use crate::error::{BitramError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

/// How a variable's bits are interpreted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VarType {
    /// Two's-complement integer over the full width
    Int,
    /// 8 bits per character
    String,
    /// Caller-defined tag; read back as raw bits
    Opaque(String),
}

impl fmt::Display for VarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VarType::Int => write!(f, "int"),
            VarType::String => write!(f, "string"),
            VarType::Opaque(tag) => write!(f, "{}", tag),
        }
    }
}

/// Registry entry for one variable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    /// Bit offset of the first cell
    pub position: usize,
    /// Number of cells
    pub length: usize,
    pub var_type: VarType,
    /// Position is a multiple of this when greater than 1
    pub alignment: usize,
}

impl Variable {
    /// One past the last cell
    pub fn end(&self) -> usize {
        self.position + self.length
    }
}

/// Result of an untyped read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariableValue {
    /// Decoded value of an `int` variable
    Int(i64),
    /// Raw cells of any other variable
    Bits(Vec<bool>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableRegistry {
    entries: BTreeMap<String, Variable>,
}

impl VariableRegistry {
    pub fn new() -> Self {
        VariableRegistry::default()
    }

    /// Fail if `name` is not a valid identifier or is already taken
    pub fn check_available(&self, name: &str) -> Result<()> {
        validate_name(name)?;
        if self.entries.contains_key(name) {
            return Err(BitramError::NameCollision(name.to_string()));
        }
        Ok(())
    }

    /// Record a new entry. The name must have passed [`Self::check_available`].
    pub(crate) fn insert(&mut self, name: &str, variable: Variable) {
        self.entries.insert(name.to_string(), variable);
    }

    pub fn get(&self, name: &str) -> Result<&Variable> {
        self.entries
            .get(name)
            .ok_or_else(|| BitramError::UnknownVariable(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Result<Variable> {
        self.entries
            .remove(name)
            .ok_or_else(|| BitramError::UnknownVariable(name.to_string()))
    }

    /// Bit offset of a variable
    pub fn location(&self, name: &str) -> Result<usize> {
        Ok(self.get(name)?.position)
    }

    /// Bit count of a variable
    pub fn length(&self, name: &str) -> Result<usize> {
        Ok(self.get(name)?.length)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries ordered by position, then name
    pub fn by_position(&self) -> Vec<(&str, &Variable)> {
        let mut entries: Vec<(&str, &Variable)> = self
            .entries
            .iter()
            .map(|(name, variable)| (name.as_str(), variable))
            .collect();
        entries.sort_by_key(|(name, variable)| (variable.position, *name));
        entries
    }

    pub(crate) fn entries_mut(&mut self) -> impl Iterator<Item = (&String, &mut Variable)> {
        self.entries.iter_mut()
    }
}

/// Variable names are identifiers: letters, digits, underscores, no leading digit
pub fn validate_name(name: &str) -> Result<()> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let re = PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

    if !re.is_match(name) {
        return Err(BitramError::InvalidVariableName(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int_var(position: usize, length: usize) -> Variable {
        Variable {
            position,
            length,
            var_type: VarType::Int,
            alignment: 1,
        }
    }

    #[test]
    fn test_insert_and_lookup() {
        let mut registry = VariableRegistry::new();
        registry.check_available("a").unwrap();
        registry.insert("a", int_var(16, 8));

        assert_eq!(registry.location("a").unwrap(), 16);
        assert_eq!(registry.length("a").unwrap(), 8);
        assert_eq!(registry.get("a").unwrap().end(), 24);
        assert!(matches!(
            registry.location("missing"),
            Err(BitramError::UnknownVariable(_))
        ));
    }

    #[test]
    fn test_collision_rejected() {
        let mut registry = VariableRegistry::new();
        registry.insert("a", int_var(0, 8));
        assert!(matches!(
            registry.check_available("a"),
            Err(BitramError::NameCollision(name)) if name == "a"
        ));
    }

    #[test]
    fn test_name_validation() {
        assert!(validate_name("result").is_ok());
        assert!(validate_name("_tmp2").is_ok());
        assert!(validate_name("prompt_a").is_ok());

        assert!(validate_name("").is_err());
        assert!(validate_name("2fast").is_err());
        assert!(validate_name("has space").is_err());
        assert!(validate_name("dash-ed").is_err());
    }

    #[test]
    fn test_by_position_ordering() {
        let mut registry = VariableRegistry::new();
        registry.insert("z", int_var(0, 8));
        registry.insert("a", int_var(32, 8));
        registry.insert("m", int_var(8, 8));

        let names: Vec<&str> = registry.by_position().iter().map(|(n, _)| *n).collect();
        assert_eq!(names, vec!["z", "m", "a"]);

        registry.remove("m").unwrap();
        assert_eq!(registry.len(), 2);
        assert!(registry.remove("m").is_err());
    }

    #[test]
    fn test_type_display() {
        assert_eq!(VarType::Int.to_string(), "int");
        assert_eq!(VarType::String.to_string(), "string");
        assert_eq!(VarType::Opaque("float".into()).to_string(), "float");
    }
}

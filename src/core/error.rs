use crate::permissions::Access;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BitramError {
    #[error("{access} permission denied at position {position}")]
    PermissionDenied { position: usize, access: Access },

    #[error("Out of memory: no free window of {length} bits")]
    OutOfMemory { length: usize },

    #[error("Unknown variable: {0}")]
    UnknownVariable(String),

    #[error("Variable already exists: {0}")]
    NameCollision(String),

    #[error("Type mismatch on '{name}': expected {expected}, found {found}")]
    TypeMismatch {
        name: String,
        expected: String,
        found: String,
    },

    #[error("Value of {needed} bits does not fit in {available} allocated bits")]
    ValueTooLarge { needed: usize, available: usize },

    #[error("Invalid page size {page_size}: must evenly divide memory size {size}")]
    InvalidPageSize { page_size: usize, size: usize },

    #[error("Encoding error: {0}")]
    EncodingError(String),

    #[error("Range out of bounds: position {position}, length {length}, size {size}")]
    OutOfBounds {
        position: usize,
        length: usize,
        size: usize,
    },

    #[error("Invalid alignment: {0} (must be at least 1)")]
    InvalidAlignment(usize),

    #[error("Invalid memory size: {0}")]
    InvalidSize(usize),

    #[error("Invalid variable name '{0}' (letters, digits and underscores, not starting with a digit)")]
    InvalidVariableName(String),

    #[error("Scan pattern must not be empty")]
    EmptyPattern,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Corrupt snapshot: {0}")]
    CorruptSnapshot(String),
}

impl From<bincode::Error> for BitramError {
    fn from(err: bincode::Error) -> Self {
        BitramError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for BitramError {
    fn from(err: serde_json::Error) -> Self {
        BitramError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for BitramError {
    fn from(err: toml::de::Error) -> Self {
        BitramError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BitramError>;

//! Full-state snapshots
//!
//! A snapshot captures everything observable about an engine: the three
//! memory copies, usage map, permissions, variable registry, page flags and
//! configuration. The random source is not captured.
//!
//! ```text
//! ┌──────────────┬─────────────┬──────────────┬──────────────────────┐
//! │ magic (8)    │ version (2) │ crc32 (4)    │ bincode payload      │
//! │ "BITRAM\0\1" │ LE u16      │ LE, payload  │ EngineState          │
//! └──────────────┴─────────────┴──────────────┴──────────────────────┘
//! ```

use crate::allocator::Allocator;
use crate::config::EngineConfig;
use crate::error::{BitramError, Result};
use crate::memory::{MemoryStore, Replica};
use crate::paging::PagingTracker;
use crate::permissions::PermissionTable;
use crate::variables::VariableRegistry;
use serde::{Deserialize, Serialize};

pub const MAGIC: [u8; 8] = *b"BITRAM\x00\x01";
pub const FORMAT_VERSION: u16 = 1;
const HEADER_LEN: usize = 8 + 2 + 4;

/// Everything a snapshot restores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineState {
    pub config: EngineConfig,
    pub memory: MemoryStore,
    pub allocator: Allocator,
    pub permissions: PermissionTable,
    pub variables: VariableRegistry,
    pub paging: PagingTracker,
}

impl EngineState {
    /// Frame the state as a snapshot blob
    pub fn encode(&self) -> Result<Vec<u8>> {
        let payload = bincode::serialize(self)?;
        let checksum = crc32fast::hash(&payload);

        let mut blob = Vec::with_capacity(HEADER_LEN + payload.len());
        blob.extend_from_slice(&MAGIC);
        blob.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        blob.extend_from_slice(&checksum.to_le_bytes());
        blob.extend_from_slice(&payload);
        Ok(blob)
    }

    /// Parse and validate a snapshot blob
    pub fn decode(blob: &[u8]) -> Result<Self> {
        if blob.len() < HEADER_LEN {
            return Err(BitramError::CorruptSnapshot(format!(
                "blob too short: {} bytes",
                blob.len()
            )));
        }
        if blob[0..8] != MAGIC {
            return Err(BitramError::CorruptSnapshot("invalid magic number".to_string()));
        }

        let version = u16::from_le_bytes([blob[8], blob[9]]);
        if version != FORMAT_VERSION {
            return Err(BitramError::CorruptSnapshot(format!(
                "unsupported format version {}",
                version
            )));
        }

        let expected = u32::from_le_bytes([blob[10], blob[11], blob[12], blob[13]]);
        let payload = &blob[HEADER_LEN..];
        if crc32fast::hash(payload) != expected {
            return Err(BitramError::CorruptSnapshot("checksum mismatch".to_string()));
        }

        let state: EngineState = bincode::deserialize(payload)?;
        state.validate()?;
        Ok(state)
    }

    /// Cross-check the lengths of every component against the configured size
    pub fn validate(&self) -> Result<()> {
        self.config.validate()?;
        let size = self.config.size;

        let copies_ok = [Replica::Primary, Replica::A, Replica::B].iter().all(|&r| {
            let copy = self.memory.replica(r);
            copy.len() == size && copy.is_well_formed()
        });
        if !copies_ok {
            return Err(BitramError::CorruptSnapshot(
                "memory copies do not match the configured size".to_string(),
            ));
        }

        let usage = self.allocator.usage();
        if usage.size() != size
            || !usage.bitmap().is_well_formed()
            || usage.bitmap().count_ones() != usage.used_bits()
        {
            return Err(BitramError::CorruptSnapshot("inconsistent usage map".to_string()));
        }
        if self.allocator.random_attempts() != self.config.random_attempts {
            return Err(BitramError::CorruptSnapshot(format!(
                "allocator tries {} random placements, config says {}",
                self.allocator.random_attempts(),
                self.config.random_attempts
            )));
        }

        if self.permissions.len() != size {
            return Err(BitramError::CorruptSnapshot(
                "permission table does not match the configured size".to_string(),
            ));
        }

        if self.paging.size() != size || !self.paging.is_consistent() {
            return Err(BitramError::CorruptSnapshot("inconsistent page table".to_string()));
        }

        if let Some((name, _)) = self
            .variables
            .by_position()
            .into_iter()
            .find(|(_, variable)| {
                let end = variable.position.checked_add(variable.length);
                end.map_or(true, |end| end > size) || variable.alignment == 0
            })
        {
            return Err(BitramError::CorruptSnapshot(format!(
                "variable '{}' lies outside memory",
                name
            )));
        }

        Ok(())
    }
}

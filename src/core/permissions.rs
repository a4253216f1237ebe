//! Per-bit access control
//!
//! Every cell carries a (readable, writable) pair, open by default. Read and
//! write paths consult the table before touching memory; the first denied
//! cell aborts the whole operation.

use crate::error::{BitramError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of access being requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    Read,
    Write,
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Access::Read => write!(f, "read"),
            Access::Write => write!(f, "write"),
        }
    }
}

/// Flags for a single cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub readable: bool,
    pub writable: bool,
}

impl Permission {
    /// Readable and writable
    pub const OPEN: Permission = Permission {
        readable: true,
        writable: true,
    };

    pub const READ_ONLY: Permission = Permission {
        readable: true,
        writable: false,
    };

    pub fn new(readable: bool, writable: bool) -> Self {
        Permission { readable, writable }
    }

    /// Whether this cell allows the given access
    pub fn allows(&self, access: Access) -> bool {
        match access {
            Access::Read => self.readable,
            Access::Write => self.writable,
        }
    }
}

impl Default for Permission {
    fn default() -> Self {
        Permission::OPEN
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionTable {
    cells: Vec<Permission>,
}

impl PermissionTable {
    /// Create a table of `size` open cells
    pub fn new(size: usize) -> Self {
        PermissionTable {
            cells: vec![Permission::OPEN; size],
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Flags of one cell
    pub fn get(&self, position: usize) -> Permission {
        self.cells[position]
    }

    /// Overwrite flags for `[position, position + length)`.
    ///
    /// The range must lie inside the table; the engine validates it.
    pub fn set_range(&mut self, position: usize, length: usize, readable: bool, writable: bool) {
        let permission = Permission::new(readable, writable);
        for cell in &mut self.cells[position..position + length] {
            *cell = permission;
        }
    }

    /// Restore `[position, position + length)` to open
    pub fn reset_range(&mut self, position: usize, length: usize) {
        self.set_range(position, length, true, true);
    }

    /// Fail at the first cell in range that forbids `access`
    pub fn check_range(&self, position: usize, length: usize, access: Access) -> Result<()> {
        match self.cells[position..position + length]
            .iter()
            .position(|cell| !cell.allows(access))
        {
            Some(offset) => Err(BitramError::PermissionDenied {
                position: position + offset,
                access,
            }),
            None => Ok(()),
        }
    }

    /// Single-cell check
    pub fn check(&self, position: usize, access: Access) -> Result<()> {
        self.check_range(position, 1, access)
    }

    pub(crate) fn cells(&self) -> &[Permission] {
        &self.cells
    }

    pub(crate) fn from_cells(cells: Vec<Permission>) -> Self {
        PermissionTable { cells }
    }
}

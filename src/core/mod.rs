//! Bitram core
//!
//! - [`bits`] - Packed bit array used by every copy and map
//! - [`codec`] - Integer and text conversion to bit sequences
//! - [`permissions`] - Per-cell read/write flags
//! - [`allocator`] - Usage map and placement strategies:
//!   - [`allocator::placement`] - Random, left-fit and aligned placement
//!   - [`allocator::compaction`] - Defragmentation planning
//! - [`memory`] - Primary copy plus replicas A and B
//! - [`variables`] - Name to range registry
//! - [`paging`] - Page bookkeeping
//! - [`engine`] - Composition root
//! - [`snapshot`] - Framed full-state snapshots
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                  Engine                     │
//! ├──────────────┬──────────────┬───────────────┤
//! │ MemoryStore  │ Allocator    │ Permission    │
//! │  primary     │  usage map   │ Table         │
//! │  replica A   │  placement   │  r/w per cell │
//! │  replica B   │  compaction  │               │
//! ├──────────────┴──────────────┴───────────────┤
//! │ VariableRegistry    │ PagingTracker         │
//! │  name → range/type  │  one flag per page    │
//! └─────────────────────────────────────────────┘
//! ```

pub mod allocator;
pub mod bits;
pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod memory;
pub mod paging;
pub mod permissions;
pub mod random;
pub mod snapshot;
pub mod variables;

pub use engine::{DefragReport, Engine, EngineStats};

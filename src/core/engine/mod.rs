//! Main engine API
//!
//! The engine owns every component and is the only place where they meet:
//! range validation, permission gates, allocation bookkeeping and the three
//! memory copies are kept consistent here.

mod maintenance;
mod variables;

pub use maintenance::DefragReport;

use crate::allocator::{Allocator, Placement};
use crate::codec::bits_to_string;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::memory::{MemoryStore, Replica};
use crate::paging::PagingTracker;
use crate::permissions::{Access, Permission, PermissionTable};
use crate::random::{RandomSource, SeededRandom, ThreadRandom};
use crate::variables::VariableRegistry;
use serde::Serialize;
use std::fmt;
use tracing::{debug, info};

/// Bit-addressable memory device
pub struct Engine {
    config: EngineConfig,
    memory: MemoryStore,
    allocator: Allocator,
    permissions: PermissionTable,
    variables: VariableRegistry,
    paging: PagingTracker,
    rng: Box<dyn RandomSource>,
}

/// Point-in-time summary of an engine
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineStats {
    pub size: usize,
    pub used_bits: usize,
    pub free_bits: usize,
    pub usage_fraction: f64,
    pub fragmentation_score: f64,
    pub variables: usize,
    pub page_size: usize,
    pub page_count: usize,
    pub pages_used: usize,
    pub divergent_bits: usize,
}

impl Engine {
    /// Create an engine of `size` cells with the default page size.
    ///
    /// Fails with `InvalidPageSize` if the default page size does not divide `size`.
    pub fn new(size: usize) -> Result<Self> {
        Self::from_config(EngineConfig::new(size))
    }

    /// Create an engine from a configuration. A configured seed selects a
    /// deterministic random source.
    pub fn from_config(config: EngineConfig) -> Result<Self> {
        let rng: Box<dyn RandomSource> = match config.seed {
            Some(seed) => Box::new(SeededRandom::new(seed)),
            None => Box::new(ThreadRandom),
        };
        Self::with_random_source(config, rng)
    }

    /// Create an engine with an explicit random source
    pub fn with_random_source(config: EngineConfig, rng: Box<dyn RandomSource>) -> Result<Self> {
        config.validate()?;
        let size = config.size;

        info!(
            "Creating engine with {} bits (page size {})",
            size, config.page_size
        );

        Ok(Engine {
            memory: MemoryStore::new(size),
            allocator: Allocator::with_attempts(size, config.random_attempts),
            permissions: PermissionTable::new(size),
            variables: VariableRegistry::new(),
            paging: PagingTracker::new(size, config.page_size)?,
            rng,
            config,
        })
    }

    /// Replace the random source, e.g. with a seeded one in tests
    pub fn set_random_source(&mut self, rng: Box<dyn RandomSource>) {
        self.rng = rng;
    }

    pub fn size(&self) -> usize {
        self.memory.size()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Write `bits` at `position` in all copies and mark the range used
    pub fn write(&mut self, position: usize, bits: &[bool]) -> Result<()> {
        debug!("Writing {} bits at {}", bits.len(), position);
        self.memory.write(&self.permissions, position, bits)?;
        self.allocator.reserve(position, bits.len());
        Ok(())
    }

    /// Read `length` bits from the primary copy
    pub fn read(&self, position: usize, length: usize) -> Result<Vec<bool>> {
        self.memory.read(&self.permissions, position, length)
    }

    /// Write one bit in all copies. Unlike [`Engine::write`] the usage map
    /// is left alone.
    pub fn set(&mut self, position: usize, bit: bool) -> Result<()> {
        self.memory.set(&self.permissions, position, bit)
    }

    pub fn get(&self, position: usize) -> Result<bool> {
        self.memory.get(&self.permissions, position)
    }

    /// Invert one bit in all copies
    pub fn reverse_bit(&mut self, position: usize) -> Result<()> {
        self.memory.reverse_bit(&self.permissions, position)
    }

    /// Invert every used bit; returns how many were flipped
    pub fn reverse_all_used(&mut self) -> Result<usize> {
        self.memory
            .reverse_used(&self.permissions, self.allocator.usage())
    }

    /// Circular shift of the whole memory. Ignores permissions, and the
    /// usage map and permission table stay where they are.
    pub fn rotate_right(&mut self, n: usize) {
        debug!("Rotating memory right by {}", n);
        self.memory.rotate_right(n);
    }

    pub fn rotate_left(&mut self, n: usize) {
        debug!("Rotating memory left by {}", n);
        self.memory.rotate_left(n);
    }

    pub fn set_permissions(
        &mut self,
        position: usize,
        length: usize,
        readable: bool,
        writable: bool,
    ) -> Result<()> {
        self.memory.check_bounds(position, length)?;
        debug!(
            "Setting permissions r={} w={} on [{}, {})",
            readable,
            writable,
            position,
            position + length
        );
        self.permissions
            .set_range(position, length, readable, writable);
        Ok(())
    }

    pub fn check_permissions(&self, position: usize, length: usize, access: Access) -> Result<()> {
        self.memory.check_bounds(position, length)?;
        self.permissions.check_range(position, length, access)
    }

    pub fn permission(&self, position: usize) -> Result<Permission> {
        self.memory.check_bounds(position, 1)?;
        Ok(self.permissions.get(position))
    }

    /// Reserve `length` bits and return the start position
    pub fn allocate(&mut self, length: usize, placement: Placement, alignment: usize) -> Result<usize> {
        self.allocator
            .allocate(length, placement, alignment, self.rng.as_mut())
    }

    pub fn allocate_random(&mut self, length: usize) -> Result<usize> {
        self.allocator.allocate_random(length, self.rng.as_mut())
    }

    pub fn allocate_left_fit(&mut self, length: usize) -> Result<usize> {
        self.allocator.allocate_left_fit(length)
    }

    pub fn allocate_aligned(&mut self, length: usize, alignment: usize) -> Result<usize> {
        self.allocator.allocate_aligned(length, alignment)
    }

    /// Release a range: requires write permission, then zeroes the content
    /// in all copies, clears usage and reopens permissions.
    ///
    /// Registry entries pointing into the range are kept; see
    /// [`Engine::free_variable`] to drop one together with its storage.
    pub fn free(&mut self, position: usize, length: usize) -> Result<()> {
        self.memory.check_bounds(position, length)?;
        self.permissions
            .check_range(position, length, Access::Write)?;

        self.allocator.release(position, length);
        self.memory.clear_range(position, length);
        self.permissions.reset_range(position, length);
        debug!("Freed {} bits at {}", length, position);
        Ok(())
    }

    pub fn is_used(&self, position: usize) -> Result<bool> {
        self.memory.check_bounds(position, 1)?;
        Ok(self.allocator.is_used(position))
    }

    /// Fraction of bits in use, in `[0, 1]`
    pub fn usage_fraction(&self) -> f64 {
        self.allocator.usage_fraction()
    }

    /// Usage as a percentage
    pub fn usage_percent(&self) -> f64 {
        self.usage_fraction() * 100.0
    }

    pub fn fragmentation_score(&self) -> f64 {
        self.allocator.fragmentation_score()
    }

    /// Change the page size; all pages become free
    pub fn configure_pages(&mut self, page_size: usize) -> Result<()> {
        self.paging.configure(page_size)?;
        self.config.page_size = page_size;
        info!(
            "Configured {} pages of {} bits",
            self.paging.page_count(),
            page_size
        );
        Ok(())
    }

    pub fn page_of(&self, address: usize) -> usize {
        self.paging.page_of(address)
    }

    pub fn mark_page_used(&mut self, page: usize) {
        self.paging.mark_used(page);
    }

    pub fn mark_page_free(&mut self, page: usize) {
        self.paging.mark_free(page);
    }

    /// Mark every page overlapping `[position, position + length)` as used
    pub fn mark_pages_used(&mut self, position: usize, length: usize) -> Result<()> {
        self.memory.check_bounds(position, length)?;
        self.paging.mark_range_used(position, length);
        Ok(())
    }

    pub fn paging(&self) -> &PagingTracker {
        &self.paging
    }

    /// Flip one bit in a single copy to simulate a fault
    pub fn corrupt(&mut self, replica: Replica, position: usize) -> Result<()> {
        debug!("Injecting fault into {:?} at {}", replica, position);
        self.memory.corrupt(replica, position)
    }

    /// Positions where the three copies disagree
    pub fn compare_divergence(&self) -> Vec<usize> {
        self.memory.compare_divergence()
    }

    /// Start positions of `pattern` in the primary copy
    pub fn scan_pattern(&self, pattern: &[bool]) -> Result<Vec<usize>> {
        self.memory.scan_pattern(pattern)
    }

    pub fn dump_binary(&self) -> Vec<String> {
        self.memory.dump_binary()
    }

    pub fn dump_hex(&self) -> Vec<String> {
        self.memory.dump_hex()
    }

    /// Hex groups joined by single spaces
    pub fn hex_dump(&self) -> String {
        self.dump_hex().join(" ")
    }

    /// The whole primary copy decoded as 8-bit characters
    pub fn memory_as_text(&self) -> String {
        bits_to_string(&self.memory.replica(Replica::Primary).to_vec())
    }

    pub fn memory(&self) -> &MemoryStore {
        &self.memory
    }

    pub fn allocator(&self) -> &Allocator {
        &self.allocator
    }

    pub fn registry(&self) -> &VariableRegistry {
        &self.variables
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            size: self.size(),
            used_bits: self.allocator.used_bits(),
            free_bits: self.size() - self.allocator.used_bits(),
            usage_fraction: self.usage_fraction(),
            fragmentation_score: self.fragmentation_score(),
            variables: self.variables.len(),
            page_size: self.paging.page_size(),
            page_count: self.paging.page_count(),
            pages_used: self.paging.used_pages(),
            divergent_bits: self.compare_divergence().len(),
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.memory)
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("size", &self.size())
            .field("used_bits", &self.allocator.used_bits())
            .field("variables", &self.variables.len())
            .field("page_size", &self.paging.page_size())
            .finish()
    }
}

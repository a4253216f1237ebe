//! Bit allocation for the memory engine
//!
//! The allocator owns the usage map and offers three placement strategies:
//! - Random fit: up to N uniform draws (probabilistic)
//! - Left fit: lowest free window (deterministic)
//! - Aligned fit: lowest free window at a multiple of the alignment

pub mod compaction;
pub mod placement;
pub mod usage;

use crate::error::{BitramError, Result};
use crate::random::RandomSource;
use placement::{AlignedFit, LeftFit, PlacementStrategy, RandomFit, DEFAULT_RANDOM_ATTEMPTS};
use serde::{Deserialize, Serialize};
use tracing::debug;
use usage::UsageMap;

pub use compaction::Relocation;

/// How a new allocation picks its start position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Placement {
    /// Uniform random draws over the (aligned) start positions
    Random,
    /// Lowest free window. With alignment > 1 only aligned starts are scanned.
    LeftFit,
    /// Lowest free window at an aligned start; alignment 1 equals left fit
    Aligned,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocator {
    usage: UsageMap,

    /// Draws made by random placement before reporting out of memory
    random_attempts: usize,
}

impl Allocator {
    pub fn new(size: usize) -> Self {
        Self::with_attempts(size, DEFAULT_RANDOM_ATTEMPTS)
    }

    pub fn with_attempts(size: usize, random_attempts: usize) -> Self {
        Allocator {
            usage: UsageMap::new(size),
            random_attempts,
        }
    }

    /// Reserve `length` cells using `placement` and return the start position
    pub fn allocate(
        &mut self,
        length: usize,
        placement: Placement,
        alignment: usize,
        rng: &mut dyn RandomSource,
    ) -> Result<usize> {
        if alignment == 0 {
            return Err(BitramError::InvalidAlignment(alignment));
        }

        let found = match placement {
            Placement::Random => RandomFit {
                attempts: self.random_attempts,
                alignment,
            }
            .place(&self.usage, length, rng),
            Placement::LeftFit if alignment == 1 => LeftFit.place(&self.usage, length, rng),
            Placement::LeftFit | Placement::Aligned => {
                AlignedFit { alignment }.place(&self.usage, length, rng)
            }
        };

        let position = found.ok_or(BitramError::OutOfMemory { length })?;
        self.usage.mark_used(position, length);
        debug!(
            "Allocated {} bits at {} ({:?}, alignment {})",
            length, position, placement, alignment
        );
        Ok(position)
    }

    /// Random placement with the configured number of attempts
    pub fn allocate_random(&mut self, length: usize, rng: &mut dyn RandomSource) -> Result<usize> {
        self.allocate(length, Placement::Random, 1, rng)
    }

    /// Lowest free window
    pub fn allocate_left_fit(&mut self, length: usize) -> Result<usize> {
        let position = LeftFit
            .place(&self.usage, length, &mut NoRandom)
            .ok_or(BitramError::OutOfMemory { length })?;
        self.usage.mark_used(position, length);
        debug!("Allocated {} bits at {} (left fit)", length, position);
        Ok(position)
    }

    /// Lowest free window at a multiple of `alignment`
    pub fn allocate_aligned(&mut self, length: usize, alignment: usize) -> Result<usize> {
        if alignment == 0 {
            return Err(BitramError::InvalidAlignment(alignment));
        }
        let position = AlignedFit { alignment }
            .place(&self.usage, length, &mut NoRandom)
            .ok_or(BitramError::OutOfMemory { length })?;
        self.usage.mark_used(position, length);
        debug!(
            "Allocated {} bits at {} (aligned to {})",
            length, position, alignment
        );
        Ok(position)
    }

    /// Mark a range used without searching (explicit writes)
    pub fn reserve(&mut self, position: usize, length: usize) {
        self.usage.mark_used(position, length);
    }

    /// Release a range. Permission checks and content zeroing are the engine's job.
    pub fn release(&mut self, position: usize, length: usize) {
        self.usage.mark_free(position, length);
    }

    pub fn is_used(&self, position: usize) -> bool {
        self.usage.is_used(position)
    }

    pub fn usage(&self) -> &UsageMap {
        &self.usage
    }

    pub fn used_bits(&self) -> usize {
        self.usage.used_bits()
    }

    pub fn size(&self) -> usize {
        self.usage.size()
    }

    pub fn random_attempts(&self) -> usize {
        self.random_attempts
    }

    /// Fraction of cells in use, in `[0, 1]`
    pub fn usage_fraction(&self) -> f64 {
        self.usage.fraction()
    }

    pub fn fragmentation_score(&self) -> f64 {
        self.usage.fragmentation_score()
    }

    /// Plan a compaction of all used cells toward address 0.
    ///
    /// `aligned_starts` maps a start position to the alignment its new
    /// position must keep.
    pub fn plan_compaction(&self, aligned_starts: &[(usize, usize)]) -> Relocation {
        Relocation::plan(&self.usage, aligned_starts)
    }

    /// Replace the usage map with the compacted layout
    pub fn apply_compaction(&mut self, relocation: &Relocation) {
        self.usage = relocation.compacted_usage(self.size());
    }
}

/// Stand-in source for deterministic strategies, which never draw
struct NoRandom;

impl RandomSource for NoRandom {
    fn next_bit(&mut self) -> bool {
        false
    }

    fn next_index(&mut self, _upper: usize) -> usize {
        0
    }
}

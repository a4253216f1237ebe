//! Placement strategies
//!
//! Each strategy only looks for a free window; reserving it is the
//! allocator's job.

use crate::allocator::usage::UsageMap;
use crate::random::RandomSource;

/// Number of random draws before giving up
pub const DEFAULT_RANDOM_ATTEMPTS: usize = 100;

/// Finds a start position for a free window of `length` cells
pub trait PlacementStrategy {
    fn place(&self, usage: &UsageMap, length: usize, rng: &mut dyn RandomSource) -> Option<usize>;
}

/// Independent uniform draws over the aligned start positions.
///
/// May fail even when space exists if the map is badly fragmented.
#[derive(Debug, Clone, Copy)]
pub struct RandomFit {
    pub attempts: usize,
    pub alignment: usize,
}

impl PlacementStrategy for RandomFit {
    fn place(&self, usage: &UsageMap, length: usize, rng: &mut dyn RandomSource) -> Option<usize> {
        let last_start = usage.size().checked_sub(length)?;
        let last_slot = last_start / self.alignment;

        (0..self.attempts)
            .map(|_| rng.next_index(last_slot) * self.alignment)
            .find(|&position| usage.is_window_free(position, length))
    }
}

/// Lowest free window, scanning every position
#[derive(Debug, Clone, Copy, Default)]
pub struct LeftFit;

impl PlacementStrategy for LeftFit {
    fn place(&self, usage: &UsageMap, length: usize, _rng: &mut dyn RandomSource) -> Option<usize> {
        let last_start = usage.size().checked_sub(length)?;
        (0..=last_start).find(|&position| usage.is_window_free(position, length))
    }
}

/// Lowest free window starting at a multiple of `alignment`
#[derive(Debug, Clone, Copy)]
pub struct AlignedFit {
    pub alignment: usize,
}

impl PlacementStrategy for AlignedFit {
    fn place(&self, usage: &UsageMap, length: usize, _rng: &mut dyn RandomSource) -> Option<usize> {
        let last_start = usage.size().checked_sub(length)?;
        (0..=last_start)
            .step_by(self.alignment)
            .find(|&position| usage.is_window_free(position, length))
    }
}

//! Injectable randomness
//!
//! Random placement and the randomize operations are the only consumers.
//! Tests swap in [`SeededRandom`] for reproducible runs.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of uniform random bits and indices
pub trait RandomSource: Send {
    /// A uniformly random bit
    fn next_bit(&mut self) -> bool;

    /// A uniformly random integer in `[0, upper]` (inclusive)
    fn next_index(&mut self, upper: usize) -> usize;
}

/// Operating-system seeded source backed by `rand::thread_rng`
#[derive(Debug, Default)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn next_bit(&mut self) -> bool {
        rand::thread_rng().gen()
    }

    fn next_index(&mut self, upper: usize) -> usize {
        rand::thread_rng().gen_range(0..=upper)
    }
}

/// Deterministic source: the same seed yields the same sequence
#[derive(Debug, Clone)]
pub struct SeededRandom {
    seed: u64,
    rng: StdRng,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        SeededRandom {
            seed,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl RandomSource for SeededRandom {
    fn next_bit(&mut self) -> bool {
        self.rng.gen()
    }

    fn next_index(&mut self, upper: usize) -> usize {
        self.rng.gen_range(0..=upper)
    }
}

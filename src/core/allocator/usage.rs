//! Usage map: which cells are currently reserved
//!
//! Represents reservation state with bits:
//! - 0 = free cell
//! - 1 = used cell

use crate::bits::BitArray;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageMap {
    bitmap: BitArray,

    /// Number of used cells (kept in step with `bitmap`)
    used: usize,
}

impl UsageMap {
    pub fn new(size: usize) -> Self {
        UsageMap {
            bitmap: BitArray::new(size),
            used: 0,
        }
    }

    pub(crate) fn from_bitmap(bitmap: BitArray) -> Self {
        let used = bitmap.count_ones();
        UsageMap { bitmap, used }
    }

    pub fn size(&self) -> usize {
        self.bitmap.len()
    }

    pub fn used_bits(&self) -> usize {
        self.used
    }

    pub fn free_bits(&self) -> usize {
        self.size() - self.used
    }

    pub fn is_used(&self, position: usize) -> bool {
        self.bitmap.get(position)
    }

    /// True if every cell of the window is free
    pub fn is_window_free(&self, position: usize, length: usize) -> bool {
        self.bitmap.range_is_clear(position, length)
    }

    /// Reserve a range. Cells already used stay used and are not double counted.
    pub fn mark_used(&mut self, position: usize, length: usize) {
        for i in position..position + length {
            if !self.bitmap.get(i) {
                self.bitmap.set(i, true);
                self.used += 1;
            }
        }
    }

    /// Release a range
    pub fn mark_free(&mut self, position: usize, length: usize) {
        for i in position..position + length {
            if self.bitmap.get(i) {
                self.bitmap.set(i, false);
                self.used -= 1;
            }
        }
    }

    /// Ascending positions of used cells
    pub fn used_positions(&self) -> impl Iterator<Item = usize> + '_ {
        self.bitmap.ones()
    }

    /// Used fraction in `[0, 1]`
    pub fn fraction(&self) -> f64 {
        if self.size() == 0 {
            return 0.0;
        }
        self.used as f64 / self.size() as f64
    }

    /// Used/free transitions per cell (0.0 = contiguous, higher = more scattered)
    pub fn fragmentation_score(&self) -> f64 {
        if self.size() == 0 {
            return 0.0;
        }
        let mut transitions = 0usize;
        let mut prev_used = false;
        for used in self.bitmap.iter() {
            if used != prev_used {
                transitions += 1;
            }
            prev_used = used;
        }
        transitions as f64 / self.size() as f64
    }

    pub(crate) fn bitmap(&self) -> &BitArray {
        &self.bitmap
    }
}

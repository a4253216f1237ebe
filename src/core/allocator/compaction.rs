//! Compaction planning for defragmentation
//!
//! Used cells keep their relative order and move toward address 0. A cell
//! that starts an aligned allocation is first bumped to the next multiple of
//! its alignment, so aligned allocations stay aligned. Because every aligned
//! start was already a multiple of its alignment, a cell never moves to a
//! higher address.

use crate::allocator::usage::UsageMap;
use crate::bits::BitArray;
use std::collections::HashMap;

/// Old position to new position for every used cell, ascending by old position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relocation {
    moves: Vec<(usize, usize)>,
}

impl Relocation {
    pub(crate) fn plan(usage: &UsageMap, aligned_starts: &[(usize, usize)]) -> Self {
        let mut alignment_at: HashMap<usize, usize> = HashMap::new();
        for &(start, alignment) in aligned_starts {
            if alignment > 1 {
                let entry = alignment_at.entry(start).or_insert(1);
                *entry = (*entry).max(alignment);
            }
        }

        let mut moves = Vec::with_capacity(usage.used_bits());
        let mut cursor = 0usize;
        for old in usage.used_positions() {
            if let Some(&alignment) = alignment_at.get(&old) {
                cursor = round_up(cursor, alignment);
            }
            moves.push((old, cursor));
            cursor += 1;
        }

        Relocation { moves }
    }

    /// New position of a used cell, or `None` if the cell was free
    pub fn target_of(&self, old: usize) -> Option<usize> {
        self.moves
            .binary_search_by_key(&old, |&(from, _)| from)
            .ok()
            .map(|index| self.moves[index].1)
    }

    /// True if `[old, old + length)` lands contiguously after the move
    pub fn moves_contiguously(&self, old: usize, length: usize) -> Option<usize> {
        let start = self.target_of(old)?;
        let intact = (1..length).all(|k| self.target_of(old + k) == Some(start + k));
        intact.then_some(start)
    }

    pub fn moves(&self) -> &[(usize, usize)] {
        &self.moves
    }

    /// Number of cells that actually change address
    pub fn displaced(&self) -> usize {
        self.moves.iter().filter(|(from, to)| from != to).count()
    }

    pub(crate) fn compacted_usage(&self, size: usize) -> UsageMap {
        let mut bitmap = BitArray::new(size);
        for &(_, to) in &self.moves {
            bitmap.set(to, true);
        }
        UsageMap::from_bitmap(bitmap)
    }
}

fn round_up(value: usize, alignment: usize) -> usize {
    (value + alignment - 1) / alignment * alignment
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_compaction() {
        let mut usage = UsageMap::new(32);
        usage.mark_used(4, 4);
        usage.mark_used(20, 2);

        let relocation = Relocation::plan(&usage, &[]);
        assert_eq!(relocation.target_of(4), Some(0));
        assert_eq!(relocation.target_of(7), Some(3));
        assert_eq!(relocation.target_of(20), Some(4));
        assert_eq!(relocation.target_of(21), Some(5));
        assert_eq!(relocation.target_of(8), None);
        assert_eq!(relocation.displaced(), 6);

        let compacted = relocation.compacted_usage(32);
        assert_eq!(compacted.used_bits(), 6);
        assert!(!compacted.is_window_free(0, 6));
        assert!(compacted.is_window_free(6, 26));
    }

    #[test]
    fn test_aligned_start_stays_aligned() {
        let mut usage = UsageMap::new(64);
        usage.mark_used(3, 2);
        usage.mark_used(16, 8);

        let relocation = Relocation::plan(&usage, &[(16, 8)]);
        assert_eq!(relocation.target_of(3), Some(0));
        assert_eq!(relocation.moves_contiguously(16, 8), Some(8));
    }

    #[test]
    fn test_never_moves_upward() {
        let mut usage = UsageMap::new(64);
        usage.mark_used(0, 5);
        usage.mark_used(8, 4);
        usage.mark_used(32, 16);

        let relocation = Relocation::plan(&usage, &[(8, 4), (32, 16)]);
        for &(from, to) in relocation.moves() {
            assert!(to <= from);
        }
        assert_eq!(relocation.moves_contiguously(32, 16), Some(16));
    }
}

//! Triple-redundant bit storage
//!
//! The store keeps a primary array and two shadow replicas of equal length.
//! Every mutator updates all three together, so they can only diverge
//! through [`MemoryStore::corrupt`]. [`MemoryStore::correct`] repairs any
//! cell where at most one of the three copies disagrees.

use crate::allocator::usage::UsageMap;
use crate::allocator::Relocation;
use crate::bits::BitArray;
use crate::codec::{bits_to_byte, format_bits};
use crate::error::{BitramError, Result};
use crate::permissions::{Access, PermissionTable};
use crate::random::RandomSource;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the three stored copies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Replica {
    Primary,
    A,
    B,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryStore {
    primary: BitArray,
    replica_a: BitArray,
    replica_b: BitArray,
}

impl MemoryStore {
    /// Create a zeroed store of `size` cells
    pub fn new(size: usize) -> Self {
        MemoryStore {
            primary: BitArray::new(size),
            replica_a: BitArray::new(size),
            replica_b: BitArray::new(size),
        }
    }

    pub fn size(&self) -> usize {
        self.primary.len()
    }

    /// Fail unless `[position, position + length)` lies inside the store
    pub fn check_bounds(&self, position: usize, length: usize) -> Result<()> {
        match position.checked_add(length) {
            Some(end) if end <= self.size() => Ok(()),
            _ => Err(BitramError::OutOfBounds {
                position,
                length,
                size: self.size(),
            }),
        }
    }

    /// Write `bits` at `position` into all three copies after a write check
    pub fn write(&mut self, permissions: &PermissionTable, position: usize, bits: &[bool]) -> Result<()> {
        self.check_bounds(position, bits.len())?;
        permissions.check_range(position, bits.len(), Access::Write)?;
        for (offset, &bit) in bits.iter().enumerate() {
            self.store(position + offset, bit);
        }
        Ok(())
    }

    /// Copy `length` primary cells starting at `position` after a read check
    pub fn read(&self, permissions: &PermissionTable, position: usize, length: usize) -> Result<Vec<bool>> {
        self.check_bounds(position, length)?;
        permissions.check_range(position, length, Access::Read)?;
        Ok(self.primary.slice(position, length))
    }

    /// Single-cell write
    pub fn set(&mut self, permissions: &PermissionTable, position: usize, bit: bool) -> Result<()> {
        self.write(permissions, position, &[bit])
    }

    /// Single-cell read
    pub fn get(&self, permissions: &PermissionTable, position: usize) -> Result<bool> {
        self.check_bounds(position, 1)?;
        permissions.check(position, Access::Read)?;
        Ok(self.primary.get(position))
    }

    /// Invert one cell in every copy
    pub fn reverse_bit(&mut self, permissions: &PermissionTable, position: usize) -> Result<()> {
        self.check_bounds(position, 1)?;
        permissions.check(position, Access::Write)?;
        self.flip_all(position);
        Ok(())
    }

    /// Invert every used cell. Every target is checked before any is flipped.
    pub fn reverse_used(&mut self, permissions: &PermissionTable, usage: &UsageMap) -> Result<usize> {
        let targets: Vec<usize> = usage.used_positions().collect();
        for &position in &targets {
            permissions.check(position, Access::Write)?;
        }
        for &position in &targets {
            self.flip_all(position);
        }
        Ok(targets.len())
    }

    /// Circular shift of all copies toward higher addresses
    pub fn rotate_right(&mut self, n: usize) {
        self.primary.rotate_right(n);
        self.replica_a.rotate_right(n);
        self.replica_b.rotate_right(n);
    }

    /// Circular shift of all copies toward lower addresses
    pub fn rotate_left(&mut self, n: usize) {
        self.primary.rotate_left(n);
        self.replica_a.rotate_left(n);
        self.replica_b.rotate_left(n);
    }

    /// Random values for every used cell, write-checked up front
    pub fn randomize_used(
        &mut self,
        permissions: &PermissionTable,
        usage: &UsageMap,
        rng: &mut dyn RandomSource,
    ) -> Result<usize> {
        let targets: Vec<usize> = usage.used_positions().collect();
        for &position in &targets {
            permissions.check(position, Access::Write)?;
        }
        for &position in &targets {
            let bit = rng.next_bit();
            self.store(position, bit);
        }
        Ok(targets.len())
    }

    /// Random values for every unused cell. Unused cells have no owner to deny.
    pub fn randomize_unused(&mut self, usage: &UsageMap, rng: &mut dyn RandomSource) -> usize {
        let mut count = 0;
        for position in 0..self.size() {
            if !usage.is_used(position) {
                let bit = rng.next_bit();
                self.store(position, bit);
                count += 1;
            }
        }
        count
    }

    /// Random values for every cell, write-checked up front
    pub fn randomize_all(&mut self, permissions: &PermissionTable, rng: &mut dyn RandomSource) -> Result<()> {
        permissions.check_range(0, self.size(), Access::Write)?;
        for position in 0..self.size() {
            let bit = rng.next_bit();
            self.store(position, bit);
        }
        Ok(())
    }

    /// Zero a range in every copy without permission checks
    pub(crate) fn clear_range(&mut self, position: usize, length: usize) {
        self.primary.fill_range(position, length, false);
        self.replica_a.fill_range(position, length, false);
        self.replica_b.fill_range(position, length, false);
    }

    /// Majority vote per cell, written back to all three copies.
    ///
    /// If the replicas agree their value wins; otherwise the majority of the
    /// three does (which is then the primary's value). Returns the number of
    /// cells where any copy changed.
    pub fn correct(&mut self) -> usize {
        let mut repaired = 0;
        for position in 0..self.size() {
            let p = self.primary.get(position);
            let a = self.replica_a.get(position);
            let b = self.replica_b.get(position);

            let voted = if a == b {
                a
            } else {
                (p as u8 + a as u8 + b as u8) >= 2
            };

            if p != voted || a != voted || b != voted {
                self.store(position, voted);
                repaired += 1;
            }
        }
        repaired
    }

    /// Ascending positions where the three copies are not all equal
    pub fn compare_divergence(&self) -> Vec<usize> {
        (0..self.size())
            .filter(|&position| {
                let p = self.primary.get(position);
                p != self.replica_a.get(position) || p != self.replica_b.get(position)
            })
            .collect()
    }

    /// Every start position where the primary contains `pattern`
    pub fn scan_pattern(&self, pattern: &[bool]) -> Result<Vec<usize>> {
        if pattern.is_empty() {
            return Err(BitramError::EmptyPattern);
        }
        let Some(last_start) = self.size().checked_sub(pattern.len()) else {
            return Ok(Vec::new());
        };

        Ok((0..=last_start)
            .filter(|&start| {
                pattern
                    .iter()
                    .enumerate()
                    .all(|(offset, &bit)| self.primary.get(start + offset) == bit)
            })
            .collect())
    }

    /// Primary in 8-bit groups rendered as bit strings (last group may be short)
    pub fn dump_binary(&self) -> Vec<String> {
        self.primary
            .to_vec()
            .chunks(8)
            .map(format_bits)
            .collect()
    }

    /// Primary in 8-bit groups rendered as two uppercase hex digits.
    ///
    /// A short trailing group is left-padded with zeros.
    pub fn dump_hex(&self) -> Vec<String> {
        self.primary
            .to_vec()
            .chunks(8)
            .map(|group| format!("{:02X}", bits_to_byte(group)))
            .collect()
    }

    /// Flip one cell in a single copy, leaving the others untouched.
    ///
    /// This is the only way the copies can diverge; it exists to exercise
    /// [`MemoryStore::correct`].
    pub fn corrupt(&mut self, replica: Replica, position: usize) -> Result<()> {
        self.check_bounds(position, 1)?;
        self.copy_mut(replica).flip(position);
        Ok(())
    }

    /// Read-only view of one copy
    pub fn replica(&self, replica: Replica) -> &BitArray {
        match replica {
            Replica::Primary => &self.primary,
            Replica::A => &self.replica_a,
            Replica::B => &self.replica_b,
        }
    }

    /// Move used cells to their compacted positions; everything else becomes zero
    pub(crate) fn apply_relocation(&mut self, relocation: &Relocation) {
        let size = self.size();
        let mut compacted = BitArray::new(size);
        for &(from, to) in relocation.moves() {
            compacted.set(to, self.primary.get(from));
        }
        self.replica_a = compacted.clone();
        self.replica_b = compacted.clone();
        self.primary = compacted;
    }

    fn store(&mut self, position: usize, bit: bool) {
        self.primary.set(position, bit);
        self.replica_a.set(position, bit);
        self.replica_b.set(position, bit);
    }

    fn flip_all(&mut self, position: usize) {
        self.primary.flip(position);
        self.replica_a.flip(position);
        self.replica_b.flip(position);
    }

    fn copy_mut(&mut self, replica: Replica) -> &mut BitArray {
        match replica {
            Replica::Primary => &mut self.primary,
            Replica::A => &mut self.replica_a,
            Replica::B => &mut self.replica_b,
        }
    }
}

impl fmt::Display for MemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for bit in self.primary.iter() {
            f.write_str(if bit { "1" } else { "0" })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::parse_bits;
    use crate::random::SeededRandom;

    fn open(size: usize) -> (MemoryStore, PermissionTable) {
        (MemoryStore::new(size), PermissionTable::new(size))
    }

    #[test]
    fn test_write_read_keeps_replicas_in_step() {
        let (mut memory, perms) = open(32);
        let bits = parse_bits("1011").unwrap();
        memory.write(&perms, 4, &bits).unwrap();

        assert_eq!(memory.read(&perms, 4, 4).unwrap(), bits);
        assert_eq!(memory.replica(Replica::A), memory.replica(Replica::Primary));
        assert_eq!(memory.replica(Replica::B), memory.replica(Replica::Primary));
        assert!(memory.compare_divergence().is_empty());
    }

    #[test]
    fn test_bounds_checked() {
        let (mut memory, perms) = open(16);
        assert!(matches!(
            memory.write(&perms, 14, &[true, true, true]),
            Err(BitramError::OutOfBounds { .. })
        ));
        assert!(matches!(
            memory.read(&perms, usize::MAX, 2),
            Err(BitramError::OutOfBounds { .. })
        ));
        assert!(memory.get(&perms, 16).is_err());
    }

    #[test]
    fn test_denied_write_changes_nothing() {
        let (mut memory, mut perms) = open(16);
        perms.set_range(6, 1, true, false);

        let result = memory.write(&perms, 4, &[true; 4]);
        assert!(matches!(
            result,
            Err(BitramError::PermissionDenied { position: 6, .. })
        ));
        assert_eq!(memory.replica(Replica::Primary).count_ones(), 0);
    }

    #[test]
    fn test_denied_read() {
        let (memory, mut perms) = open(16);
        perms.set_range(0, 4, false, true);
        assert!(matches!(
            memory.read(&perms, 2, 4),
            Err(BitramError::PermissionDenied {
                position: 2,
                access: Access::Read
            })
        ));
        assert!(memory.get(&perms, 4).is_ok());
    }

    #[test]
    fn test_reverse_used_is_atomic() {
        let (mut memory, mut perms) = open(16);
        let mut usage = UsageMap::new(16);
        usage.mark_used(0, 4);
        usage.mark_used(10, 2);
        perms.set_range(11, 1, true, false);

        assert!(memory.reverse_used(&perms, &usage).is_err());
        assert_eq!(memory.replica(Replica::Primary).count_ones(), 0);

        perms.reset_range(11, 1);
        assert_eq!(memory.reverse_used(&perms, &usage).unwrap(), 6);
        assert_eq!(memory.to_string(), "1111000000110000");
    }

    #[test]
    fn test_correct_single_replica_faults() {
        let (mut memory, perms) = open(16);
        memory.write(&perms, 0, &parse_bits("1100110011001100").unwrap()).unwrap();
        let original = memory.to_string();

        memory.corrupt(Replica::A, 10).unwrap();
        memory.corrupt(Replica::B, 11).unwrap();
        memory.corrupt(Replica::Primary, 3).unwrap();
        assert_eq!(memory.compare_divergence(), vec![3, 10, 11]);

        assert_eq!(memory.correct(), 3);
        assert_eq!(memory.to_string(), original);
        assert!(memory.compare_divergence().is_empty());
    }

    #[test]
    fn test_correct_prefers_agreeing_replicas() {
        let (mut memory, perms) = open(8);
        memory.set(&perms, 5, true).unwrap();

        // Both replicas flipped: they agree with each other, so they win
        memory.corrupt(Replica::A, 5).unwrap();
        memory.corrupt(Replica::B, 5).unwrap();
        memory.correct();
        assert!(!memory.get(&perms, 5).unwrap());
    }

    #[test]
    fn test_rotate_round_trip() {
        let (mut memory, perms) = open(12);
        memory.write(&perms, 0, &parse_bits("100100000001").unwrap()).unwrap();

        memory.rotate_right(3);
        assert_eq!(memory.to_string(), "001100100000");
        memory.rotate_left(3);
        assert_eq!(memory.to_string(), "100100000001");
        assert!(memory.compare_divergence().is_empty());
    }

    #[test]
    fn test_scan_pattern() {
        let (mut memory, perms) = open(16);
        memory.write(&perms, 0, &parse_bits("0101010000000101").unwrap()).unwrap();

        let pattern = parse_bits("0101").unwrap();
        assert_eq!(memory.scan_pattern(&pattern).unwrap(), vec![0, 2, 12]);
        assert!(matches!(memory.scan_pattern(&[]), Err(BitramError::EmptyPattern)));
        assert!(memory.scan_pattern(&[false; 17]).unwrap().is_empty());
    }

    #[test]
    fn test_dumps_with_short_trailing_group() {
        let (mut memory, perms) = open(20);
        memory.write(&perms, 0, &parse_bits("10101111").unwrap()).unwrap();
        memory.write(&perms, 16, &parse_bits("1011").unwrap()).unwrap();

        assert_eq!(memory.dump_binary(), vec!["10101111", "00000000", "1011"]);
        assert_eq!(memory.dump_hex(), vec!["AF", "00", "0B"]);
    }

    #[test]
    fn test_randomize_unused_skips_used_cells() {
        let (mut memory, perms) = open(64);
        let mut usage = UsageMap::new(64);
        usage.mark_used(0, 8);
        memory.write(&perms, 0, &[true; 8]).unwrap();

        let mut rng = SeededRandom::new(17);
        assert_eq!(memory.randomize_unused(&usage, &mut rng), 56);
        assert_eq!(memory.read(&perms, 0, 8).unwrap(), vec![true; 8]);
        assert!(memory.compare_divergence().is_empty());
    }

    #[test]
    fn test_randomize_all_requires_write_everywhere() {
        let (mut memory, mut perms) = open(16);
        perms.set_range(15, 1, true, false);
        let mut rng = SeededRandom::new(1);
        assert!(memory.randomize_all(&perms, &mut rng).is_err());
        assert_eq!(memory.replica(Replica::Primary).count_ones(), 0);
    }
}

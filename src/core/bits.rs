//! Packed bit storage
//!
//! Each word holds 64 cells. Bit `i` of the array lives in word `i / 64`
//! at bit offset `i % 64`. Bits past `len` in the last word are always zero.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitArray {
    /// Bitmap words (each word = 64 cells)
    words: Vec<u64>,

    /// Number of addressable cells
    len: usize,
}

impl BitArray {
    /// Create an all-zero array of `len` cells
    pub fn new(len: usize) -> Self {
        let num_words = (len + 63) / 64;
        BitArray {
            words: vec![0u64; num_words],
            len,
        }
    }

    /// Build an array from a bool slice
    pub fn from_bits(bits: &[bool]) -> Self {
        let mut array = BitArray::new(bits.len());
        for (i, &bit) in bits.iter().enumerate() {
            array.set(i, bit);
        }
        array
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Read one cell. Panics if `index >= len`.
    #[inline]
    pub fn get(&self, index: usize) -> bool {
        assert!(index < self.len, "bit index {} out of range {}", index, self.len);
        (self.words[index / 64] & (1u64 << (index % 64))) != 0
    }

    /// Write one cell. Panics if `index >= len`.
    #[inline]
    pub fn set(&mut self, index: usize, value: bool) {
        assert!(index < self.len, "bit index {} out of range {}", index, self.len);
        let mask = 1u64 << (index % 64);
        if value {
            self.words[index / 64] |= mask;
        } else {
            self.words[index / 64] &= !mask;
        }
    }

    /// Invert one cell
    #[inline]
    pub fn flip(&mut self, index: usize) {
        assert!(index < self.len, "bit index {} out of range {}", index, self.len);
        self.words[index / 64] ^= 1u64 << (index % 64);
    }

    /// Set every cell in `[start, start + length)` to `value`
    pub fn fill_range(&mut self, start: usize, length: usize, value: bool) {
        for i in start..start + length {
            self.set(i, value);
        }
    }

    /// True if every cell in `[start, start + length)` is clear
    pub fn range_is_clear(&self, start: usize, length: usize) -> bool {
        (start..start + length).all(|i| !self.get(i))
    }

    /// Copy out `[start, start + length)`
    pub fn slice(&self, start: usize, length: usize) -> Vec<bool> {
        (start..start + length).map(|i| self.get(i)).collect()
    }

    /// Number of set cells
    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Iterate over every cell in address order
    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        (0..self.len).map(move |i| self.get(i))
    }

    /// Indices of all set cells, ascending
    pub fn ones(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.len).filter(move |&i| self.get(i))
    }

    pub fn to_vec(&self) -> Vec<bool> {
        self.iter().collect()
    }

    /// Circular shift toward higher addresses: cell `i` moves to `(i + n) % len`
    pub fn rotate_right(&mut self, n: usize) {
        if self.len == 0 {
            return;
        }
        let n = n % self.len;
        if n == 0 {
            return;
        }
        let mut rotated = BitArray::new(self.len);
        for i in 0..self.len {
            if self.get(i) {
                rotated.set((i + n) % self.len, true);
            }
        }
        *self = rotated;
    }

    /// Circular shift toward lower addresses: cell `i` moves to `(i - n) mod len`
    pub fn rotate_left(&mut self, n: usize) {
        if self.len == 0 {
            return;
        }
        let n = n % self.len;
        self.rotate_right(self.len - n);
    }

    /// Words with stray bits past `len`, which a valid array never has
    pub(crate) fn is_well_formed(&self) -> bool {
        if self.words.len() != (self.len + 63) / 64 {
            return false;
        }
        match (self.len % 64, self.words.last()) {
            (0, _) | (_, None) => true,
            (tail, Some(&last)) => last >> tail == 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_array_creation() {
        let bits = BitArray::new(130);
        assert_eq!(bits.len(), 130);
        assert_eq!(bits.count_ones(), 0);
        assert!(bits.is_well_formed());
    }

    #[test]
    fn test_set_get_across_word_boundary() {
        let mut bits = BitArray::new(130);
        bits.set(63, true);
        bits.set(64, true);
        bits.set(129, true);

        assert!(bits.get(63));
        assert!(bits.get(64));
        assert!(bits.get(129));
        assert!(!bits.get(65));
        assert_eq!(bits.count_ones(), 3);

        bits.set(64, false);
        assert!(!bits.get(64));
    }

    #[test]
    fn test_flip_and_fill() {
        let mut bits = BitArray::new(16);
        bits.flip(3);
        assert!(bits.get(3));
        bits.flip(3);
        assert!(!bits.get(3));

        bits.fill_range(4, 8, true);
        assert_eq!(bits.count_ones(), 8);
        assert!(!bits.range_is_clear(0, 5));
        assert!(bits.range_is_clear(0, 4));
        assert!(bits.range_is_clear(12, 4));
    }

    #[test]
    fn test_rotate() {
        let mut bits = BitArray::from_bits(&[true, false, false, true, false]);
        bits.rotate_right(2);
        assert_eq!(bits.to_vec(), vec![true, false, true, false, false]);
        bits.rotate_left(2);
        assert_eq!(bits.to_vec(), vec![true, false, false, true, false]);

        // Full-length rotation is the identity
        bits.rotate_right(5);
        assert_eq!(bits.to_vec(), vec![true, false, false, true, false]);
    }

    #[test]
    #[should_panic]
    fn test_out_of_range_panics() {
        let bits = BitArray::new(8);
        bits.get(8);
    }
}

//! Page bookkeeping
//!
//! Pages split the address space into equal slices with one used/free flag
//! each. There is no translation and no link between pages and variables.

use crate::error::{BitramError, Result};
use serde::{Deserialize, Serialize};

/// Default page size in bits
pub const DEFAULT_PAGE_SIZE: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagingTracker {
    /// Total cells covered
    size: usize,
    page_size: usize,
    pages: Vec<bool>,
}

impl PagingTracker {
    /// Create a tracker with all pages free.
    ///
    /// Fails with `InvalidPageSize` unless `page_size` evenly divides `size`.
    pub fn new(size: usize, page_size: usize) -> Result<Self> {
        Self::check_page_size(size, page_size)?;
        Ok(PagingTracker {
            size,
            page_size,
            pages: vec![false; size / page_size],
        })
    }

    fn check_page_size(size: usize, page_size: usize) -> Result<()> {
        if page_size == 0 || size % page_size != 0 {
            return Err(BitramError::InvalidPageSize { page_size, size });
        }
        Ok(())
    }

    /// Change the page size and reset every page to free
    pub fn configure(&mut self, page_size: usize) -> Result<()> {
        Self::check_page_size(self.size, page_size)?;
        self.page_size = page_size;
        self.pages = vec![false; self.size / page_size];
        Ok(())
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Page holding `address`
    pub fn page_of(&self, address: usize) -> usize {
        address / self.page_size
    }

    /// Out-of-range pages are ignored
    pub fn mark_used(&mut self, page: usize) {
        if let Some(flag) = self.pages.get_mut(page) {
            *flag = true;
        }
    }

    /// Out-of-range pages are ignored
    pub fn mark_free(&mut self, page: usize) {
        if let Some(flag) = self.pages.get_mut(page) {
            *flag = false;
        }
    }

    /// Mark every page touched by `[position, position + length)`
    pub fn mark_range_used(&mut self, position: usize, length: usize) {
        if length == 0 {
            return;
        }
        let first = self.page_of(position);
        let last = self.page_of(position.saturating_add(length - 1));
        let end = last.saturating_add(1).min(self.pages.len());
        for page in first..end {
            self.mark_used(page);
        }
    }

    pub fn is_page_used(&self, page: usize) -> bool {
        self.pages.get(page).copied().unwrap_or(false)
    }

    pub fn used_pages(&self) -> usize {
        self.pages.iter().filter(|&&used| used).count()
    }

    /// Flags of all pages in order
    pub fn pages(&self) -> &[bool] {
        &self.pages
    }

    pub(crate) fn is_consistent(&self) -> bool {
        self.page_size > 0
            && self.size % self.page_size == 0
            && self.pages.len() == self.size / self.page_size
    }

    pub(crate) fn size(&self) -> usize {
        self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paging_creation() {
        let paging = PagingTracker::new(512, DEFAULT_PAGE_SIZE).unwrap();
        assert_eq!(paging.page_count(), 8);
        assert_eq!(paging.used_pages(), 0);
    }

    #[test]
    fn test_invalid_page_size() {
        assert!(matches!(
            PagingTracker::new(100, 64),
            Err(BitramError::InvalidPageSize { page_size: 64, size: 100 })
        ));
        assert!(PagingTracker::new(64, 0).is_err());

        let mut paging = PagingTracker::new(512, 64).unwrap();
        assert!(paging.configure(100).is_err());
        assert_eq!(paging.page_size(), 64);
    }

    #[test]
    fn test_page_of_and_marking() {
        let mut paging = PagingTracker::new(512, 64).unwrap();
        assert_eq!(paging.page_of(10), 0);
        assert_eq!(paging.page_of(64), 1);
        assert_eq!(paging.page_of(511), 7);

        paging.mark_used(paging.page_of(10));
        assert!(paging.is_page_used(0));
        paging.mark_free(0);
        assert!(!paging.is_page_used(0));
    }

    #[test]
    fn test_out_of_range_pages_ignored() {
        let mut paging = PagingTracker::new(128, 64).unwrap();
        paging.mark_used(2);
        paging.mark_free(99);
        assert_eq!(paging.used_pages(), 0);
        assert!(!paging.is_page_used(2));
    }

    #[test]
    fn test_configure_resets_flags() {
        let mut paging = PagingTracker::new(512, 64).unwrap();
        paging.mark_used(3);
        paging.configure(128).unwrap();
        assert_eq!(paging.page_count(), 4);
        assert_eq!(paging.used_pages(), 0);
    }

    #[test]
    fn test_mark_range_used() {
        let mut paging = PagingTracker::new(256, 64).unwrap();
        paging.mark_range_used(60, 10);
        assert_eq!(paging.pages(), &[true, true, false, false]);

        paging.mark_range_used(200, 0);
        assert_eq!(paging.used_pages(), 2);

        paging.mark_range_used(250, usize::MAX);
        assert_eq!(paging.pages(), &[true, true, false, true]);
    }
}

// In: src/index/row_bitmap.rs

//! The row-boundary bitmap: one bit per flattened value slot, where a set bit
//! marks the first value of a row.
//!
//! Row extents are recovered without any stored lengths: a row runs from its
//! own mark up to (not including) the next mark, or to the end of the column.
//! Scans use `bitvec`'s word-at-a-time `first_one`/`iter_ones`, and every scan
//! reports how many bits it examined so callers can verify the chunk bound.

use crate::error::{Result, ScmvError};
use crate::kernels::BitPackedStore;

/// The outcome of a forward scan for row-start marks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanResult {
    /// The flattened offset of the mark found, if any lies before the limit.
    pub position: Option<usize>,
    /// How many bitmap bits the scan examined.
    pub bits_scanned: usize,
}

/// A semantic view over a `BitPackedStore` holding one bit per packed value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowBoundaryBitmap<B> {
    store: BitPackedStore<B>,
}

impl RowBoundaryBitmap<Vec<u8>> {
    /// An empty bitmap for a column of `total_values` values.
    pub fn zeroed(total_values: usize) -> Self {
        Self {
            store: BitPackedStore::zeroed(total_values),
        }
    }
}

impl<B: AsRef<[u8]>> RowBoundaryBitmap<B> {
    /// Views the first `total_values` bits of `bytes` as a row-boundary bitmap.
    pub fn from_bytes(bytes: B, total_values: usize) -> Result<Self> {
        Ok(Self {
            store: BitPackedStore::with_bit_capacity(bytes, total_values)?,
        })
    }

    /// The number of value slots covered.
    pub fn len(&self) -> usize {
        self.store.capacity_bits()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.store.as_bytes()
    }

    pub fn into_inner(self) -> B {
        self.store.into_inner()
    }

    pub fn is_row_start(&self, value_offset: usize) -> Result<bool> {
        self.store.test_bit(value_offset)
    }

    /// The first row start strictly after `value_offset` and before `limit`.
    pub fn find_next_row_start_after(&self, value_offset: usize, limit: usize) -> Option<usize> {
        self.scan_next_row_start_after(value_offset, limit).position
    }

    /// Instrumented form of [`Self::find_next_row_start_after`].
    pub fn scan_next_row_start_after(&self, value_offset: usize, limit: usize) -> ScanResult {
        self.scan_nth_row_start_after(value_offset, 1, limit)
    }

    /// Finds the `n`-th row start strictly after `value_offset` (with `n = 1`
    /// being the next one), stopping at `limit`.
    pub fn scan_nth_row_start_after(&self, value_offset: usize, n: usize, limit: usize) -> ScanResult {
        let limit = limit.min(self.len());
        let from = value_offset.saturating_add(1);
        if n == 0 {
            return ScanResult {
                position: Some(value_offset),
                bits_scanned: 0,
            };
        }
        if from >= limit {
            return ScanResult {
                position: None,
                bits_scanned: 0,
            };
        }

        let window = &self.store.bits()[from..limit];
        match window.iter_ones().nth(n - 1) {
            Some(i) => ScanResult {
                position: Some(from + i),
                bits_scanned: i + 1,
            },
            None => ScanResult {
                position: None,
                bits_scanned: window.len(),
            },
        }
    }

    /// Every row start in ascending order.
    pub fn row_starts(&self) -> impl Iterator<Item = usize> + '_ {
        self.store.bits().iter_ones()
    }

    /// The number of marked row starts.
    pub fn count_row_starts(&self) -> usize {
        self.store.bits().count_ones()
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> RowBoundaryBitmap<B> {
    /// Marks `value_offset` as the first value of a row.
    pub fn mark_row_start(&mut self, value_offset: usize) -> Result<()> {
        self.store.set_bit(value_offset).map_err(|e| match e {
            ScmvError::OutOfRange { capacity, .. } => ScmvError::CapacityExceeded {
                declared: capacity as u64,
                attempted: value_offset as u64 + 1,
            },
            other => other,
        })
    }
}

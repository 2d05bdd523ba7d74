//! This module contains the arbitrary-width bit-packed store that every other
//! layer of the codec is built on.
//!
//! A `BitPackedStore` addresses its backing bytes as one long bit string. Bit
//! position `p` lives in byte `p / 8` under mask `0x80 >> (p % 8)`, and an
//! N-bit field is stored most-significant-bit first with no padding to byte or
//! word boundaries. The same type serves the write path (an owned `Vec<u8>`)
//! and the read path (a borrowed slice of a mapped file), so both agree
//! bit-for-bit by construction. This module is PURE RUST and panic-free.

use bitvec::prelude::*;
use std::ops::Range;

use crate::error::{Result, ScmvError};
use crate::utils::max_value_for_width;

/// The widest field a store can read or write in one operation.
pub const MAX_FIELD_WIDTH: u8 = 32;

//==================================================================================
// 1. Core Type
//==================================================================================

/// A byte-buffer-backed array of bits supporting N-bit field access at any offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitPackedStore<B> {
    bytes: B,
    capacity_bits: usize,
}

impl BitPackedStore<Vec<u8>> {
    /// Allocates a zeroed store able to hold exactly `capacity_bits` bits.
    /// The final byte's trailing pad bits stay zero.
    pub fn zeroed(capacity_bits: usize) -> Self {
        Self {
            bytes: vec![0u8; capacity_bits.div_ceil(8)],
            capacity_bits,
        }
    }
}

impl<B: AsRef<[u8]>> BitPackedStore<B> {
    /// Wraps a byte buffer, exposing all of its bits.
    pub fn from_bytes(bytes: B) -> Self {
        let capacity_bits = bytes.as_ref().len() * 8;
        Self {
            bytes,
            capacity_bits,
        }
    }

    /// Wraps a byte buffer but only exposes its first `capacity_bits` bits.
    pub fn with_bit_capacity(bytes: B, capacity_bits: usize) -> Result<Self> {
        let available = bytes.as_ref().len().saturating_mul(8);
        if capacity_bits > available {
            return Err(ScmvError::InvalidParameter(format!(
                "Requested capacity of {} bits exceeds the {} bits in the buffer",
                capacity_bits, available
            )));
        }
        Ok(Self {
            bytes,
            capacity_bits,
        })
    }

    /// The number of addressable bits.
    pub fn capacity_bits(&self) -> usize {
        self.capacity_bits
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.bytes.as_ref()
    }

    pub fn into_inner(self) -> B {
        self.bytes
    }

    /// Reads the `width`-bit unsigned field starting at `bit_offset`.
    pub fn get_field(&self, bit_offset: usize, width: u8) -> Result<u32> {
        let range = self.field_range(bit_offset, width)?;
        Ok(self.bits()[range].load_be::<u32>())
    }

    /// Reads `count` consecutive `width`-bit fields starting at `bit_offset`,
    /// appending them to `out`.
    pub fn get_fields_into(
        &self,
        bit_offset: usize,
        width: u8,
        count: usize,
        out: &mut Vec<u32>,
    ) -> Result<()> {
        check_width(width)?;
        let span = count
            .checked_mul(width as usize)
            .ok_or_else(|| ScmvError::InvalidParameter("Field span overflows usize".into()))?;
        let end = bit_offset
            .checked_add(span)
            .filter(|&end| end <= self.capacity_bits)
            .ok_or(ScmvError::OutOfRange {
                bit_offset,
                width,
                capacity: self.capacity_bits,
            })?;

        out.reserve(count);
        out.extend(
            self.bits()[bit_offset..end]
                .chunks_exact(width as usize)
                .map(|field| field.load_be::<u32>()),
        );
        Ok(())
    }

    /// Tests the single bit at `bit_position`.
    pub fn test_bit(&self, bit_position: usize) -> Result<bool> {
        let range = self.field_range(bit_position, 1)?;
        Ok(self.bits()[range.start])
    }

    /// The addressable bits as an MSB-first view.
    pub(crate) fn bits(&self) -> &BitSlice<u8, Msb0> {
        &self.bytes.as_ref().view_bits::<Msb0>()[..self.capacity_bits]
    }

    fn field_range(&self, bit_offset: usize, width: u8) -> Result<Range<usize>> {
        check_width(width)?;
        match bit_offset.checked_add(width as usize) {
            Some(end) if end <= self.capacity_bits => Ok(bit_offset..end),
            _ => Err(ScmvError::OutOfRange {
                bit_offset,
                width,
                capacity: self.capacity_bits,
            }),
        }
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> BitPackedStore<B> {
    /// Writes `value` as a `width`-bit field at `bit_offset`, preserving every
    /// bit outside the field.
    pub fn set_field(&mut self, bit_offset: usize, width: u8, value: u32) -> Result<()> {
        check_width(width)?;
        if u64::from(value) > max_value_for_width(width) {
            return Err(ScmvError::ValueOverflow {
                value: u64::from(value),
                max_bits: width,
            });
        }
        let range = self.field_range(bit_offset, width)?;
        self.bits_mut()[range].store_be::<u32>(value);
        Ok(())
    }

    /// Sets the single bit at `bit_position`.
    pub fn set_bit(&mut self, bit_position: usize) -> Result<()> {
        let range = self.field_range(bit_position, 1)?;
        self.bits_mut().set(range.start, true);
        Ok(())
    }

    fn bits_mut(&mut self) -> &mut BitSlice<u8, Msb0> {
        let capacity = self.capacity_bits;
        &mut self.bytes.as_mut().view_bits_mut::<Msb0>()[..capacity]
    }
}

fn check_width(width: u8) -> Result<()> {
    if width == 0 || width > MAX_FIELD_WIDTH {
        return Err(ScmvError::InvalidParameter(format!(
            "Field width must be in 1..={}, got {}",
            MAX_FIELD_WIDTH, width
        )));
    }
    Ok(())
}

//==================================================================================
// 2. Unit Tests
//==================================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nibbles_pack_msb_first() {
        let mut store = BitPackedStore::zeroed(16);
        store.set_field(0, 4, 3).unwrap();
        store.set_field(4, 4, 1).unwrap();
        store.set_field(8, 4, 0xA).unwrap();
        assert_eq!(store.as_bytes(), &[0x31, 0xA0]);
    }

    #[test]
    fn test_field_straddling_a_byte_boundary() {
        // 0b10110 at bit 6: "10" ends byte 0, "110" starts byte 1.
        let mut store = BitPackedStore::zeroed(16);
        store.set_field(6, 5, 0b10110).unwrap();
        assert_eq!(store.as_bytes(), &[0x02, 0xC0]);
        assert_eq!(store.get_field(6, 5).unwrap(), 0b10110);
    }

    #[test]
    fn test_set_field_preserves_neighbouring_bits() {
        let mut store = BitPackedStore::from_bytes(vec![0xFFu8, 0xFF]);
        store.set_field(3, 2, 0).unwrap();
        assert_eq!(store.as_bytes(), &[0xE7, 0xFF]);

        // Overwriting a field replaces it completely.
        store.set_field(3, 2, 0b01).unwrap();
        assert_eq!(store.as_bytes(), &[0xEF, 0xFF]);
    }

    #[test]
    fn test_full_width_field_at_unaligned_offset() {
        let mut store = BitPackedStore::zeroed(72);
        store.set_field(5, 32, u32::MAX).unwrap();
        store.set_field(37, 32, 0xDEAD_BEEF).unwrap();
        assert_eq!(store.get_field(5, 32).unwrap(), u32::MAX);
        assert_eq!(store.get_field(37, 32).unwrap(), 0xDEAD_BEEF);
        assert!(!store.test_bit(4).unwrap());
        assert!(store.test_bit(5).unwrap());
    }

    #[test]
    fn test_single_bits() {
        let mut store = BitPackedStore::zeroed(10);
        store.set_bit(0).unwrap();
        store.set_bit(9).unwrap();
        assert_eq!(store.as_bytes(), &[0x80, 0x40]);
        assert!(store.test_bit(9).unwrap());
        assert!(!store.test_bit(8).unwrap());
    }

    #[test]
    fn test_value_exceeding_width_is_rejected() {
        let mut store = BitPackedStore::zeroed(8);
        let err = store.set_field(0, 3, 8).unwrap_err();
        if let ScmvError::ValueOverflow { value, max_bits } = err {
            assert_eq!(value, 8);
            assert_eq!(max_bits, 3);
        } else {
            panic!("Expected ValueOverflow");
        }
        // Nothing was written.
        assert_eq!(store.as_bytes(), &[0x00]);
    }

    #[test]
    fn test_out_of_range_access() {
        let mut store = BitPackedStore::zeroed(12);
        assert!(matches!(
            store.set_field(9, 4, 1),
            Err(ScmvError::OutOfRange { capacity: 12, .. })
        ));
        assert!(matches!(store.get_field(12, 1), Err(ScmvError::OutOfRange { .. })));
        assert!(matches!(store.test_bit(usize::MAX), Err(ScmvError::OutOfRange { .. })));
        assert!(store.get_field(8, 4).is_ok());
    }

    #[test]
    fn test_invalid_widths() {
        let store = BitPackedStore::zeroed(64);
        assert!(matches!(store.get_field(0, 0), Err(ScmvError::InvalidParameter(_))));
        assert!(matches!(store.get_field(0, 33), Err(ScmvError::InvalidParameter(_))));
    }

    #[test]
    fn test_borrowed_store_reads_what_owned_store_wrote() {
        let mut owned = BitPackedStore::zeroed(7 * 9);
        for i in 0..9 {
            owned.set_field(i * 7, 7, (i as u32 * 13) % 128).unwrap();
        }
        let bytes = owned.into_inner();

        let borrowed = BitPackedStore::with_bit_capacity(bytes.as_slice(), 7 * 9).unwrap();
        let mut out = Vec::new();
        borrowed.get_fields_into(0, 7, 9, &mut out).unwrap();
        let expected: Vec<u32> = (0..9).map(|i| (i * 13) % 128).collect();
        assert_eq!(out, expected);
    }

    #[test]
    fn test_get_fields_into_rejects_overrun() {
        let store = BitPackedStore::zeroed(20);
        let mut out = Vec::new();
        assert!(store.get_fields_into(0, 5, 4, &mut out).is_ok());
        assert!(matches!(
            store.get_fields_into(1, 5, 4, &mut out),
            Err(ScmvError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_capacity_cannot_exceed_buffer() {
        let bytes = [0u8; 2];
        assert!(BitPackedStore::with_bit_capacity(&bytes[..], 17).is_err());
        assert_eq!(
            BitPackedStore::with_bit_capacity(&bytes[..], 16).unwrap().capacity_bits(),
            16
        );
    }
}

//! Shared, low-level helpers for bit-width arithmetic.

/// The largest unsigned value representable in `width` bits.
pub fn max_value_for_width(width: u8) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

/// The minimum number of bits needed to store `max_value`.
///
/// A column whose every value is zero still needs one bit per value, so the
/// result is never below 1.
pub fn bits_required(max_value: u64) -> u8 {
    let bits = (u64::BITS - max_value.leading_zeros()) as u8;
    bits.max(1)
}

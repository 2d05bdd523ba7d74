//! Low-level, stateless storage kernels.
//!
//! The only kernel the codec needs is the MSB-first bit-packed store; the row
//! bitmap and raw value region are both views over it.

pub mod bitpack;

pub use bitpack::{BitPackedStore, MAX_FIELD_WIDTH};

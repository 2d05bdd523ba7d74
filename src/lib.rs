//! This file is the root of the `scmv_codec` Rust crate.
//!
//! `scmv_codec` stores a single column whose rows each hold a variable number of
//! unsigned integer values. Every value is bit-packed with a fixed width, and two
//! small indexes (a per-chunk offset header and a per-value row-boundary bitmap)
//! let a reader decode any row without scanning from the start of the column.
//!
//! Its responsibilities are strictly limited to:
//! 1.  Declaring all the top-level modules of our library (`bridge`, `index`, `kernels`, etc.)
//!     so the Rust compiler knows they exist.
//! 2.  Re-exporting the handful of types most callers need.

//==================================================================================
// 0. Constants
//==================================================================================
/// The crate version, automatically set from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
//==================================================================================
// 1. Module Declarations
//==================================================================================
#[macro_use]
pub mod observability; // Make macros available throughout the crate

pub mod bridge;
pub mod config;
pub mod error;
pub mod index;
pub mod kernels;
pub mod utils;

//==================================================================================
// 2. Public Surface
//==================================================================================
pub use bridge::{
    analyze_column, decode_column, encode_column, encode_rows, write_column_file, ColumnDecoder,
    ColumnEncoder, ColumnLayout, ColumnParams, ColumnStats, RowExtent, RowIter, WriterState,
    DEFAULT_ROWS_PER_CHUNK,
};
pub use config::CodecConfig;
pub use error::{Result, ScmvError};
pub use observability::{enable_logging, enable_verbose_logging};

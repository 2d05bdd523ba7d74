// In: src/error.rs

//! This module defines the single, unified error type for the entire scmv codec.
//! It uses the `thiserror` crate to provide ergonomic, context-aware error handling.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ScmvError>;

#[derive(Error, Debug)]
pub enum ScmvError {
    // =========================================================================
    // === Write Path Errors
    // =========================================================================
    /// A value does not fit in the column's bit width. The row is not committed.
    #[error("Value {value} does not fit in {max_bits} bits")]
    ValueOverflow { value: u64, max_bits: u8 },

    /// More values were written than the column declared at construction.
    #[error("Capacity exceeded: column declares {declared} values, write would reach {attempted}")]
    CapacityExceeded { declared: u64, attempted: u64 },

    #[error("Rows must be written in ascending order: expected row {expected}, got {got}")]
    OutOfOrderRow { expected: usize, got: usize },

    /// A row with no values cannot be represented by the row-boundary bitmap.
    #[error("Row {0} has no values; empty rows are not representable")]
    EmptyRow(usize),

    #[error(
        "Column is incomplete: wrote {rows_written}/{num_rows} rows and {values_written}/{total_values} values"
    )]
    Incomplete {
        rows_written: usize,
        num_rows: usize,
        values_written: u64,
        total_values: u64,
    },

    // =========================================================================
    // === Read Path Errors
    // =========================================================================
    #[error("Row {row} is out of range for a column of {num_rows} rows")]
    RowOutOfRange { row: usize, num_rows: usize },

    /// The byte source does not have the size the column parameters describe.
    #[error("Layout mismatch: parameters describe {expected} bytes, source holds {actual}")]
    LayoutMismatch { expected: u64, actual: u64 },

    #[error("Corrupt column data: {0}")]
    CorruptData(String),

    // =========================================================================
    // === Low-Level Bit Store Errors
    // =========================================================================
    #[error("Bit range {bit_offset}..+{width} exceeds store capacity of {capacity} bits")]
    OutOfRange {
        bit_offset: usize,
        width: u8,
        capacity: usize,
    },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    // =========================================================================
    // === External Error Wrappers (Using #[from] for automatic conversion)
    // =========================================================================
    /// An error originating from the underlying I/O subsystem.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An error from the Serde JSON library, typically while loading config or params.
    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),
}

// In: src/bridge/mod.rs

// ====================================================================================
// ARCHITECTURAL OVERVIEW: The Bridge Layer
// ====================================================================================
//
// The `bridge` is the public-facing API of the codec. It ties the pure storage
// kernels (`kernels::bitpack`) and the two index structures (`index::row_bitmap`,
// `index::chunk_index`) together under one layout contract (`format`).
//
// Data Flow (Encoding):
//
//   1. [Stateful Writer (ColumnEncoder)]   -> set_row(0), set_row(1), ... in order
//         |
//         `-> a. row % rows_per_chunk == 0  -> ChunkIndex::record(cursor)
//         `-> b. RowBoundaryBitmap::mark_row_start(cursor)
//         `-> c. BitPackedStore::set_field(cursor * max_bits) per value
//
//   2. [close()] -> [ chunk index | bitmap | packed values ] -> sink
//
// Data Flow (Decoding):
//
//   1. [ColumnDecoder::new] -> size check against ColumnLayout, parse + validate ChunkIndex
//
//   2. [get_row(r)]
//         |
//         `-> a. chunk offset for r / rows_per_chunk
//         `-> b. skip (r % rows_per_chunk) row-start marks in the bitmap -> start
//         `-> c. next mark after start (or total_values)                -> end
//         `-> d. unpack (end - start) fields of max_bits from the raw region
//
// ====================================================================================
pub mod decoder;
pub mod encoder;
pub mod format;
pub mod stateless_api;

// --- High-Level Stateful API ---
pub use decoder::{ColumnDecoder, RowExtent, RowIter};
pub use encoder::{ColumnEncoder, WriterState};

// --- Low-Level Stateless API ---
pub use stateless_api::{analyze_column, decode_column, encode_column, encode_rows, write_column_file};

// --- Format Constants and Structs ---
pub use format::{ColumnLayout, ColumnParams, ColumnStats, DEFAULT_ROWS_PER_CHUNK};

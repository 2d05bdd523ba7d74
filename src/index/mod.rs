//! The two structures that make random-access row decode sub-linear: the
//! per-value row-boundary bitmap and the per-chunk skip-list of value offsets.

pub mod chunk_index;
pub mod row_bitmap;

pub use chunk_index::{ChunkIndex, CHUNK_OFFSET_SIZE};
pub use row_bitmap::{RowBoundaryBitmap, ScanResult};

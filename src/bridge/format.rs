// In: src/bridge/format.rs

//! Defines the on-disk layout of an encoded column and the parameters that
//! describe it. This is the single source of truth for the layout arithmetic
//! shared by the encoder, the decoder and the analysis API.
//!
//! ```text
//! [ ChunkIndex header : num_chunks x 4 bytes, big-endian u32         ]
//! [ RowBoundaryBitmap : ceil(total_values / 8) bytes, MSB-first      ]
//! [ Raw packed values : ceil(total_values * max_bits / 8), MSB-first ]
//! ```
//!
//! The parameters are NOT embedded in the column. The caller carries them in
//! its own segment metadata (hence the serde derives) and must supply the same
//! values to both the writer and the reader.

use serde::{Deserialize, Serialize};
use std::ops::Range;

use crate::config::CodecConfig;
use crate::error::{Result, ScmvError};
use crate::index::CHUNK_OFFSET_SIZE;
use crate::kernels::MAX_FIELD_WIDTH;
use crate::utils::bits_required;

/// The default number of rows covered by one chunk-index entry.
pub const DEFAULT_ROWS_PER_CHUNK: usize = 1024;

//==================================================================================
// I. Column Parameters
//==================================================================================

/// The four values that fully determine a column's layout.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnParams {
    pub num_rows: usize,
    /// The sum of every row's value count.
    pub total_values: usize,
    /// Bits per packed value, in `1..=32`.
    pub max_bits: u8,
    #[serde(default = "default_rows_per_chunk")]
    pub rows_per_chunk: usize,
}

fn default_rows_per_chunk() -> usize {
    DEFAULT_ROWS_PER_CHUNK
}

impl ColumnParams {
    pub fn new(num_rows: usize, total_values: usize, max_bits: u8) -> Self {
        Self {
            num_rows,
            total_values,
            max_bits,
            rows_per_chunk: DEFAULT_ROWS_PER_CHUNK,
        }
    }

    /// Builds parameters whose chunk granularity comes from a `CodecConfig`.
    pub fn with_config(
        num_rows: usize,
        total_values: usize,
        max_bits: u8,
        config: &CodecConfig,
    ) -> Self {
        Self::new(num_rows, total_values, max_bits).with_rows_per_chunk(config.rows_per_chunk)
    }

    pub fn with_rows_per_chunk(mut self, rows_per_chunk: usize) -> Self {
        self.rows_per_chunk = rows_per_chunk;
        self
    }

    /// Derives row count, value count and the minimal bit width from data.
    pub fn from_rows<R: AsRef<[u32]>>(rows: &[R]) -> Self {
        let total_values = rows.iter().map(|r| r.as_ref().len()).sum();
        let max_value = rows
            .iter()
            .flat_map(|r| r.as_ref().iter().copied())
            .max()
            .unwrap_or(0);
        Self::new(rows.len(), total_values, bits_required(u64::from(max_value)))
    }

    /// Checks the parameters describe a representable column.
    pub fn validate(&self) -> Result<()> {
        if self.max_bits == 0 || self.max_bits > MAX_FIELD_WIDTH {
            return Err(ScmvError::InvalidParameter(format!(
                "max_bits must be in 1..={}, got {}",
                MAX_FIELD_WIDTH, self.max_bits
            )));
        }
        if self.rows_per_chunk == 0 {
            return Err(ScmvError::InvalidParameter(
                "rows_per_chunk must be at least 1".into(),
            ));
        }
        // Every row holds at least one value, so there are never fewer values than rows.
        if self.total_values < self.num_rows {
            return Err(ScmvError::InvalidParameter(format!(
                "{} rows cannot hold only {} values; empty rows are not representable",
                self.num_rows, self.total_values
            )));
        }
        if self.num_rows == 0 && self.total_values != 0 {
            return Err(ScmvError::InvalidParameter(format!(
                "A column with no rows cannot hold {} values",
                self.total_values
            )));
        }
        if u32::try_from(self.total_values).is_err() {
            return Err(ScmvError::InvalidParameter(format!(
                "total_values {} exceeds the 32-bit chunk offset range",
                self.total_values
            )));
        }
        ColumnLayout::compute(self).map(|_| ())
    }

    /// Validates the parameters and computes the derived layout.
    pub fn layout(&self) -> Result<ColumnLayout> {
        self.validate()?;
        ColumnLayout::compute(self)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let params: Self = serde_json::from_str(json)?;
        params.validate()?;
        Ok(params)
    }
}

//==================================================================================
// II. Derived Layout
//==================================================================================

/// Byte sizes of every region of an encoded column.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnLayout {
    pub num_chunks: usize,
    pub chunk_offset_header_size: usize,
    pub bitmap_size: usize,
    pub raw_data_size: usize,
    pub total_size: usize,
}

impl ColumnLayout {
    fn compute(params: &ColumnParams) -> Result<Self> {
        let overflow = || ScmvError::InvalidParameter(format!("Layout of {:?} overflows usize", params));

        let num_chunks = params.num_rows.div_ceil(params.rows_per_chunk.max(1));
        let chunk_offset_header_size = num_chunks
            .checked_mul(CHUNK_OFFSET_SIZE)
            .ok_or_else(overflow)?;
        let bitmap_size = params.total_values.div_ceil(8);
        let raw_data_size = params
            .total_values
            .checked_mul(params.max_bits as usize)
            .ok_or_else(overflow)?
            .div_ceil(8);
        let total_size = chunk_offset_header_size
            .checked_add(bitmap_size)
            .and_then(|s| s.checked_add(raw_data_size))
            .ok_or_else(overflow)?;

        Ok(Self {
            num_chunks,
            chunk_offset_header_size,
            bitmap_size,
            raw_data_size,
            total_size,
        })
    }

    /// Byte range of the row-boundary bitmap.
    pub fn bitmap_range(&self) -> Range<usize> {
        let start = self.chunk_offset_header_size;
        start..start + self.bitmap_size
    }

    /// Byte range of the packed values.
    pub fn raw_data_range(&self) -> Range<usize> {
        let start = self.chunk_offset_header_size + self.bitmap_size;
        start..start + self.raw_data_size
    }
}

//==================================================================================
// III. Analysis Results
//==================================================================================

/// The public-facing struct for column analysis, returned by `analyze_column`.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ColumnStats {
    pub num_rows: usize,
    pub total_values: usize,
    pub max_bits: u8,
    pub num_chunks: usize,
    pub header_size: usize,
    pub bitmap_size: usize,
    pub raw_data_size: usize,
    pub total_size: usize,
    pub avg_values_per_row: f64,
    /// The largest number of values covered by a single chunk; this bounds
    /// the bitmap scan cost of any `get_row`.
    pub max_chunk_span: usize,
}

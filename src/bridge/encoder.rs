// In: src/bridge/encoder.rs

use num_traits::{PrimInt, Unsigned};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::bridge::format::{ColumnLayout, ColumnParams};
use crate::error::{Result, ScmvError};
use crate::index::{ChunkIndex, RowBoundaryBitmap};
use crate::kernels::BitPackedStore;
use crate::utils::max_value_for_width;

/// The sequential write cursor of an encoder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterState {
    /// The next row `set_row` accepts.
    pub next_row: usize,
    /// Flattened offset of the next value to be packed.
    pub next_value_offset: usize,
    /// The next chunk whose offset will be recorded.
    pub next_chunk_id: usize,
}

/// A stateful, single-writer encoder for one multi-value column.
///
/// Rows are accepted strictly in ascending order and buffered in memory; the
/// sink is only touched by [`ColumnEncoder::close`], which writes the chunk
/// index, the row-boundary bitmap and the packed values in that order. An
/// encoder that is dropped without being closed writes nothing.
#[derive(Debug)]
pub struct ColumnEncoder<W: Write> {
    sink: W,
    params: ColumnParams,
    layout: ColumnLayout,
    chunk_index: ChunkIndex,
    bitmap: RowBoundaryBitmap<Vec<u8>>,
    raw_data: BitPackedStore<Vec<u8>>,
    state: WriterState,
    verify_on_close: bool,
    scratch: Vec<u32>,
}

impl ColumnEncoder<BufWriter<File>> {
    /// Creates (or truncates) `path` and returns an encoder writing to it.
    pub fn create<P: AsRef<Path>>(path: P, params: ColumnParams) -> Result<Self> {
        let file = File::create(path.as_ref())?;
        Self::new(BufWriter::new(file), params)
    }
}

impl<W: Write> ColumnEncoder<W> {
    /// Creates a new encoder over `sink`. All storage is sized from `params`.
    pub fn new(sink: W, params: ColumnParams) -> Result<Self> {
        let layout = params.layout()?;
        log::debug!(
            "ColumnEncoder: rows={} values={} max_bits={} rows_per_chunk={} -> {} bytes",
            params.num_rows,
            params.total_values,
            params.max_bits,
            params.rows_per_chunk,
            layout.total_size
        );

        Ok(Self {
            sink,
            params,
            layout,
            chunk_index: ChunkIndex::new(layout.num_chunks),
            bitmap: RowBoundaryBitmap::zeroed(params.total_values),
            raw_data: BitPackedStore::zeroed(params.total_values * params.max_bits as usize),
            state: WriterState::default(),
            verify_on_close: true,
            scratch: Vec::new(),
        })
    }

    /// Enables or disables the bitmap recount performed by `close`.
    pub fn verify_on_close(mut self, verify: bool) -> Self {
        self.verify_on_close = verify;
        self
    }

    /// Appends `values` as row `row`.
    ///
    /// The whole row is validated before anything is written, so a failed
    /// call leaves the encoder exactly as it was.
    pub fn set_row<T>(&mut self, row: usize, values: &[T]) -> Result<()>
    where
        T: PrimInt + Unsigned,
    {
        if row >= self.params.num_rows {
            return Err(ScmvError::RowOutOfRange {
                row,
                num_rows: self.params.num_rows,
            });
        }
        if row != self.state.next_row {
            return Err(ScmvError::OutOfOrderRow {
                expected: self.state.next_row,
                got: row,
            });
        }
        if values.is_empty() {
            return Err(ScmvError::EmptyRow(row));
        }
        let attempted = self.state.next_value_offset + values.len();
        if attempted > self.params.total_values {
            return Err(ScmvError::CapacityExceeded {
                declared: self.params.total_values as u64,
                attempted: attempted as u64,
            });
        }

        let max_bits = self.params.max_bits;
        let max_value = max_value_for_width(max_bits);
        self.scratch.clear();
        for value in values {
            let wide = value.to_u64().ok_or(ScmvError::ValueOverflow {
                value: u64::MAX,
                max_bits,
            })?;
            if wide > max_value {
                return Err(ScmvError::ValueOverflow {
                    value: wide,
                    max_bits,
                });
            }
            self.scratch.push(wide as u32);
        }

        // --- Commit ---
        let cursor = self.state.next_value_offset;
        if row % self.params.rows_per_chunk == 0 {
            self.chunk_index.record(self.state.next_chunk_id, cursor)?;
            self.state.next_chunk_id += 1;
        }
        self.bitmap.mark_row_start(cursor)?;
        let width = max_bits as usize;
        for (i, &value) in self.scratch.iter().enumerate() {
            self.raw_data.set_field((cursor + i) * width, max_bits, value)?;
        }
        self.state.next_value_offset = attempted;
        self.state.next_row += 1;

        log::trace!("set_row {}: {} values at offset {}", row, values.len(), cursor);
        Ok(())
    }

    /// Finalizes the column: writes header, bitmap and packed values, flushes
    /// the sink and hands it back.
    ///
    /// A column missing rows or values is refused before a single byte reaches
    /// the sink.
    pub fn close(mut self) -> Result<W> {
        if self.state.next_row != self.params.num_rows
            || self.state.next_value_offset != self.params.total_values
        {
            return Err(ScmvError::Incomplete {
                rows_written: self.state.next_row,
                num_rows: self.params.num_rows,
                values_written: self.state.next_value_offset as u64,
                total_values: self.params.total_values as u64,
            });
        }
        if self.verify_on_close {
            let marks = self.bitmap.count_row_starts();
            if marks != self.params.num_rows || !self.chunk_index.is_complete() {
                return Err(ScmvError::CorruptData(format!(
                    "Encoder state is inconsistent: {} row marks for {} rows, {} of {} chunks recorded",
                    marks,
                    self.params.num_rows,
                    self.chunk_index.offsets().len(),
                    self.layout.num_chunks
                )));
            }
        }

        let mut written = self.chunk_index.write_to(&mut self.sink)?;
        self.sink.write_all(self.bitmap.as_bytes())?;
        written += self.bitmap.as_bytes().len();
        self.sink.write_all(self.raw_data.as_bytes())?;
        written += self.raw_data.as_bytes().len();
        self.sink.flush()?;

        if written != self.layout.total_size {
            return Err(ScmvError::LayoutMismatch {
                expected: self.layout.total_size as u64,
                actual: written as u64,
            });
        }

        log::info!(
            "ColumnEncoder closed: {} rows, {} values, header={} bitmap={} raw={} total={}",
            self.params.num_rows,
            self.params.total_values,
            self.layout.chunk_offset_header_size,
            self.layout.bitmap_size,
            self.layout.raw_data_size,
            self.layout.total_size
        );
        log_metric!(
            "event" = "encoder_close",
            "num_chunks" = self.layout.num_chunks,
            "total_size" = self.layout.total_size
        );

        Ok(self.sink)
    }

    // --- Read-only introspection ---

    pub fn params(&self) -> &ColumnParams {
        &self.params
    }

    pub fn layout(&self) -> &ColumnLayout {
        &self.layout
    }

    pub fn state(&self) -> WriterState {
        self.state
    }

    pub fn total_size(&self) -> usize {
        self.layout.total_size
    }

    pub fn chunk_offset_header_size(&self) -> usize {
        self.layout.chunk_offset_header_size
    }

    pub fn bitmap_size(&self) -> usize {
        self.layout.bitmap_size
    }

    pub fn raw_data_size(&self) -> usize {
        self.layout.raw_data_size
    }

    pub fn num_chunks(&self) -> usize {
        self.layout.num_chunks
    }

    pub fn rows_per_chunk(&self) -> usize {
        self.params.rows_per_chunk
    }

    pub fn rows_written(&self) -> usize {
        self.state.next_row
    }

    pub fn values_written(&self) -> usize {
        self.state.next_value_offset
    }
}

// In: src/bridge/decoder.rs

use memmap2::Mmap;
use std::fs::File;
use std::path::Path;

use crate::bridge::format::{ColumnLayout, ColumnParams};
use crate::error::{Result, ScmvError};
use crate::index::{ChunkIndex, RowBoundaryBitmap};
use crate::kernels::BitPackedStore;

/// The flattened extent of one row, plus the scan cost of locating it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowExtent {
    /// Flattened offset of the row's first value.
    pub start: usize,
    /// Flattened offset one past the row's last value.
    pub end: usize,
    /// Bitmap bits examined to find `start` and `end`.
    pub bits_scanned: usize,
}

impl RowExtent {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// A read-only, random-access decoder over a finalized column.
///
/// The chunk index is parsed once at construction; the bitmap and packed
/// values are read in place from `source` on every call. The decoder holds no
/// mutable state, so `&ColumnDecoder` can be shared freely across threads
/// whenever `S` is `Sync`.
#[derive(Debug)]
pub struct ColumnDecoder<S> {
    source: S,
    params: ColumnParams,
    layout: ColumnLayout,
    chunk_index: ChunkIndex,
}

impl ColumnDecoder<Mmap> {
    /// Memory-maps the column file at `path`.
    pub fn open<P: AsRef<Path>>(path: P, params: ColumnParams) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        // SAFETY: the column is immutable once published; callers must not
        // modify a file while it is mapped.
        let mmap = unsafe { Mmap::map(&file)? };
        Self::new(mmap, params)
    }
}

impl<S: AsRef<[u8]>> ColumnDecoder<S> {
    /// Creates a decoder over `source`, which must hold exactly the bytes an
    /// encoder produced for `params`.
    pub fn new(source: S, params: ColumnParams) -> Result<Self> {
        let layout = params.layout()?;
        let actual = source.as_ref().len();
        if actual != layout.total_size {
            return Err(ScmvError::LayoutMismatch {
                expected: layout.total_size as u64,
                actual: actual as u64,
            });
        }

        let chunk_index = ChunkIndex::read_from(source.as_ref(), layout.num_chunks)?;
        let decoder = Self {
            source,
            params,
            layout,
            chunk_index,
        };
        decoder.validate_chunk_index()?;
        decoder.validate_row_count()?;

        log::debug!(
            "ColumnDecoder: rows={} values={} max_bits={} chunks={}",
            params.num_rows,
            params.total_values,
            params.max_bits,
            layout.num_chunks
        );
        Ok(decoder)
    }

    /// Checks that chunk offsets start at zero, strictly increase, stay inside
    /// the column and each land on a row-start mark.
    fn validate_chunk_index(&self) -> Result<()> {
        let bitmap = self.bitmap()?;
        let mut previous: Option<u32> = None;
        for (chunk, &offset) in self.chunk_index.offsets().iter().enumerate() {
            let valid = match previous {
                None => offset == 0,
                Some(prev) => offset > prev,
            };
            if !valid || offset as usize >= self.params.total_values {
                return Err(ScmvError::CorruptData(format!(
                    "Chunk {} has invalid value offset {}",
                    chunk, offset
                )));
            }
            if !bitmap.is_row_start(offset as usize)? {
                return Err(ScmvError::CorruptData(format!(
                    "Chunk {} offset {} is not a row start",
                    chunk, offset
                )));
            }
            previous = Some(offset);
        }
        Ok(())
    }

    /// Checks that the bitmap marks exactly one start per row.
    fn validate_row_count(&self) -> Result<()> {
        let marks = self.bitmap()?.count_row_starts();
        if marks != self.params.num_rows {
            return Err(ScmvError::CorruptData(format!(
                "Bitmap marks {} row starts for a column of {} rows",
                marks, self.params.num_rows
            )));
        }
        Ok(())
    }

    fn bitmap(&self) -> Result<RowBoundaryBitmap<&[u8]>> {
        let bytes = &self.source.as_ref()[self.layout.bitmap_range()];
        RowBoundaryBitmap::from_bytes(bytes, self.params.total_values)
    }

    fn raw_data(&self) -> Result<BitPackedStore<&[u8]>> {
        let bytes = &self.source.as_ref()[self.layout.raw_data_range()];
        BitPackedStore::with_bit_capacity(bytes, self.params.total_values * self.params.max_bits as usize)
    }

    /// Finds the flattened extent of `row` using the chunk index and bitmap.
    pub fn locate_row(&self, row: usize) -> Result<RowExtent> {
        if row >= self.params.num_rows {
            return Err(ScmvError::RowOutOfRange {
                row,
                num_rows: self.params.num_rows,
            });
        }
        let total_values = self.params.total_values;
        let chunk = row / self.params.rows_per_chunk;
        let chunk_start_row = chunk * self.params.rows_per_chunk;
        let cursor = self.chunk_index.lookup(chunk)? as usize;
        // Rows of this chunk never start at or beyond the next chunk's offset.
        let chunk_limit = self
            .chunk_index
            .offsets()
            .get(chunk + 1)
            .map_or(total_values, |&o| o as usize);

        let bitmap = self.bitmap()?;
        let lead = bitmap.scan_nth_row_start_after(cursor, row - chunk_start_row, chunk_limit);
        let start = lead.position.ok_or_else(|| {
            ScmvError::CorruptData(format!("Row {} has no row-start mark in chunk {}", row, chunk))
        })?;
        let tail = bitmap.scan_next_row_start_after(start, total_values);
        let end = tail.position.unwrap_or(total_values);

        log::trace!(
            "locate_row {}: chunk={} extent={}..{} scanned={}",
            row,
            chunk,
            start,
            end,
            lead.bits_scanned + tail.bits_scanned
        );
        Ok(RowExtent {
            start,
            end,
            bits_scanned: lead.bits_scanned + tail.bits_scanned,
        })
    }

    /// Decodes the values of `row`.
    pub fn get_row(&self, row: usize) -> Result<Vec<u32>> {
        let mut values = Vec::new();
        self.get_row_into(row, &mut values)?;
        Ok(values)
    }

    /// Decodes the values of `row` into `out` (cleared first), returning how
    /// many values the row holds.
    pub fn get_row_into(&self, row: usize, out: &mut Vec<u32>) -> Result<usize> {
        let extent = self.locate_row(row)?;
        out.clear();
        self.decode_extent(extent.start, extent.end, out)?;
        Ok(extent.len())
    }

    /// The number of values in `row`.
    pub fn row_len(&self, row: usize) -> Result<usize> {
        Ok(self.locate_row(row)?.len())
    }

    /// Decodes every row in order in a single pass over the bitmap.
    pub fn iter_rows(&self) -> Result<RowIter<'_>> {
        let total_values = self.params.total_values;
        Ok(RowIter {
            bitmap: self.bitmap()?,
            raw_data: self.raw_data()?,
            max_bits: self.params.max_bits,
            total_values,
            rows_left: self.params.num_rows,
            next_start: if total_values > 0 { Some(0) } else { None },
        })
    }

    fn decode_extent(&self, start: usize, end: usize, out: &mut Vec<u32>) -> Result<()> {
        let max_bits = self.params.max_bits;
        self.raw_data()?
            .get_fields_into(start * max_bits as usize, max_bits, end - start, out)
    }

    pub fn params(&self) -> &ColumnParams {
        &self.params
    }

    pub fn layout(&self) -> &ColumnLayout {
        &self.layout
    }

    pub fn num_rows(&self) -> usize {
        self.params.num_rows
    }

    /// The cached chunk skip-list.
    pub fn chunk_offsets(&self) -> &[u32] {
        self.chunk_index.offsets()
    }
}

/// Sequential iterator over every row of a column. See [`ColumnDecoder::iter_rows`].
pub struct RowIter<'a> {
    bitmap: RowBoundaryBitmap<&'a [u8]>,
    raw_data: BitPackedStore<&'a [u8]>,
    max_bits: u8,
    total_values: usize,
    rows_left: usize,
    next_start: Option<usize>,
}

impl Iterator for RowIter<'_> {
    type Item = Result<Vec<u32>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.rows_left == 0 {
            return None;
        }
        let start = self.next_start?;
        self.rows_left -= 1;
        let end = self
            .bitmap
            .find_next_row_start_after(start, self.total_values)
            .unwrap_or(self.total_values);
        self.next_start = (end < self.total_values).then_some(end);

        let mut values = Vec::with_capacity(end - start);
        let result = self
            .raw_data
            .get_fields_into(start * self.max_bits as usize, self.max_bits, end - start, &mut values)
            .map(|_| values);
        if result.is_err() {
            self.next_start = None;
        }
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::encoder::ColumnEncoder;

    fn encode(rows: &[Vec<u32>], params: ColumnParams) -> Vec<u8> {
        let mut encoder = ColumnEncoder::new(Vec::new(), params).unwrap();
        for (i, row) in rows.iter().enumerate() {
            encoder.set_row(i, row.as_slice()).unwrap();
        }
        encoder.close().unwrap()
    }

    fn scenario() -> (Vec<Vec<u32>>, ColumnParams) {
        let rows = vec![vec![3, 1], vec![0], vec![15, 15, 2]];
        (rows, ColumnParams::new(3, 6, 4).with_rows_per_chunk(2))
    }

    #[test]
    fn test_scenario_random_access() {
        let (rows, params) = scenario();
        let decoder = ColumnDecoder::new(encode(&rows, params), params).unwrap();

        assert_eq!(decoder.chunk_offsets(), &[0, 3]);
        assert_eq!(decoder.get_row(2).unwrap(), vec![15, 15, 2]);
        assert_eq!(decoder.get_row(0).unwrap(), vec![3, 1]);
        assert_eq!(decoder.get_row(1).unwrap(), vec![0]);
    }

    #[test]
    fn test_locate_row_extents() {
        let (rows, params) = scenario();
        let decoder = ColumnDecoder::new(encode(&rows, params), params).unwrap();

        let extent = decoder.locate_row(1).unwrap();
        assert_eq!((extent.start, extent.end), (2, 3));
        let extent = decoder.locate_row(2).unwrap();
        assert_eq!((extent.start, extent.end), (3, 6));
        assert_eq!(decoder.row_len(0).unwrap(), 2);
    }

    #[test]
    fn test_out_of_range_row() {
        let (rows, params) = scenario();
        let decoder = ColumnDecoder::new(encode(&rows, params), params).unwrap();
        assert!(matches!(
            decoder.get_row(3),
            Err(ScmvError::RowOutOfRange { row: 3, num_rows: 3 })
        ));
        // Other reads are unaffected.
        assert_eq!(decoder.get_row(2).unwrap(), vec![15, 15, 2]);
    }

    #[test]
    fn test_layout_mismatch_is_detected_eagerly() {
        let (rows, params) = scenario();
        let mut bytes = encode(&rows, params);
        bytes.push(0);
        assert!(matches!(
            ColumnDecoder::new(bytes.as_slice(), params),
            Err(ScmvError::LayoutMismatch { expected: 12, actual: 13 })
        ));

        // Right bytes, wrong parameters.
        let bytes = encode(&rows, params);
        let wrong = ColumnParams::new(3, 6, 5).with_rows_per_chunk(2);
        assert!(matches!(
            ColumnDecoder::new(bytes, wrong),
            Err(ScmvError::LayoutMismatch { .. })
        ));
    }

    #[test]
    fn test_corrupt_chunk_index_is_detected() {
        let (rows, params) = scenario();
        let mut bytes = encode(&rows, params);
        // Point chunk 1 at offset 1, which is not a row start.
        bytes[7] = 1;
        assert!(matches!(
            ColumnDecoder::new(bytes.clone(), params),
            Err(ScmvError::CorruptData(_))
        ));
        // An offset past the end of the column.
        bytes[7] = 9;
        assert!(matches!(
            ColumnDecoder::new(bytes, params),
            Err(ScmvError::CorruptData(_))
        ));
    }

    #[test]
    fn test_extra_row_start_mark_is_detected() {
        let (rows, params) = scenario();
        let mut bytes = encode(&rows, params);
        // Mark value 5 as a row start, splitting row 2 in two.
        bytes[8] |= 0b0000_0100;
        assert!(matches!(
            ColumnDecoder::new(bytes.as_slice(), params),
            Err(ScmvError::CorruptData(_))
        ));
        assert!(crate::bridge::decode_column(&bytes, params).is_err());
    }

    #[test]
    fn test_missing_row_start_mark_is_detected() {
        let (rows, params) = scenario();
        let mut bytes = encode(&rows, params);
        // Clear the mark of row 1, which is not a chunk start.
        bytes[8] &= !0b0010_0000;
        assert!(matches!(
            ColumnDecoder::new(bytes, params),
            Err(ScmvError::CorruptData(_))
        ));
    }

    #[test]
    fn test_get_row_into_reuses_buffer() {
        let (rows, params) = scenario();
        let decoder = ColumnDecoder::new(encode(&rows, params), params).unwrap();
        let mut buf = vec![99; 10];
        assert_eq!(decoder.get_row_into(1, &mut buf).unwrap(), 1);
        assert_eq!(buf, vec![0]);
        assert_eq!(decoder.get_row_into(2, &mut buf).unwrap(), 3);
        assert_eq!(buf, vec![15, 15, 2]);
    }

    #[test]
    fn test_iter_rows_matches_random_access() {
        let rows: Vec<Vec<u32>> = (0..50u32).map(|i| (0..(i % 7) + 1).map(|j| (i * j) % 64).collect()).collect();
        let params = ColumnParams::from_rows(&rows).with_rows_per_chunk(8);
        let decoder = ColumnDecoder::new(encode(&rows, params), params).unwrap();

        let sequential: Vec<Vec<u32>> = decoder.iter_rows().unwrap().collect::<Result<_>>().unwrap();
        assert_eq!(sequential, rows);
        for (i, row) in rows.iter().enumerate() {
            assert_eq!(&decoder.get_row(i).unwrap(), row);
        }
    }

    #[test]
    fn test_empty_column() {
        let params = ColumnParams::new(0, 0, 3);
        let decoder = ColumnDecoder::new(encode(&[], params), params).unwrap();
        assert_eq!(decoder.iter_rows().unwrap().count(), 0);
        assert!(decoder.get_row(0).is_err());
    }

    #[test]
    fn test_decoder_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ColumnDecoder<Vec<u8>>>();
        assert_send_sync::<ColumnDecoder<Mmap>>();
        assert_send_sync::<ColumnDecoder<std::sync::Arc<[u8]>>>();
    }
}

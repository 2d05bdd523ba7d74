// In: src/index/chunk_index.rs

//! The chunk skip-list: one 32-bit flattened value offset per chunk of
//! `rows_per_chunk` consecutive rows.
//!
//! Entry `c` is the offset of the first value of row `c * rows_per_chunk`. It
//! bounds every bitmap scan to a single chunk. On disk the index is a flat run
//! of big-endian `u32`s and is always the first region of the column.

use std::io::Write;

use crate::error::{Result, ScmvError};

/// The serialized size of a single chunk offset.
pub const CHUNK_OFFSET_SIZE: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkIndex {
    offsets: Vec<u32>,
    num_chunks: usize,
}

impl ChunkIndex {
    /// An empty index that expects exactly `num_chunks` records.
    pub fn new(num_chunks: usize) -> Self {
        Self {
            offsets: Vec::with_capacity(num_chunks),
            num_chunks,
        }
    }

    /// Records the offset of `chunk_id`'s first value. Chunks must be recorded
    /// once each, in ascending order.
    pub fn record(&mut self, chunk_id: usize, value_offset: usize) -> Result<()> {
        if chunk_id >= self.num_chunks {
            return Err(ScmvError::InvalidParameter(format!(
                "Chunk {} is out of range for an index of {} chunks",
                chunk_id, self.num_chunks
            )));
        }
        if chunk_id != self.offsets.len() {
            return Err(ScmvError::InvalidParameter(format!(
                "Chunk {} recorded out of order; next expected chunk is {}",
                chunk_id,
                self.offsets.len()
            )));
        }
        let offset = u32::try_from(value_offset).map_err(|_| {
            ScmvError::InvalidParameter(format!(
                "Value offset {} does not fit in a 32-bit chunk offset",
                value_offset
            ))
        })?;
        self.offsets.push(offset);
        Ok(())
    }

    pub fn lookup(&self, chunk_id: usize) -> Result<u32> {
        self.offsets.get(chunk_id).copied().ok_or_else(|| {
            ScmvError::InvalidParameter(format!(
                "Chunk {} has not been recorded ({} of {} present)",
                chunk_id,
                self.offsets.len(),
                self.num_chunks
            ))
        })
    }

    pub fn num_chunks(&self) -> usize {
        self.num_chunks
    }

    /// True once every expected chunk has been recorded.
    pub fn is_complete(&self) -> bool {
        self.offsets.len() == self.num_chunks
    }

    pub fn offsets(&self) -> &[u32] {
        &self.offsets
    }

    pub fn serialized_size(&self) -> usize {
        self.num_chunks * CHUNK_OFFSET_SIZE
    }

    /// Writes the index as big-endian `u32`s. Returns the number of bytes written.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<usize> {
        if !self.is_complete() {
            return Err(ScmvError::InvalidParameter(format!(
                "Cannot serialize a partial chunk index ({} of {} chunks recorded)",
                self.offsets.len(),
                self.num_chunks
            )));
        }
        let mut buf = Vec::with_capacity(self.serialized_size());
        for offset in &self.offsets {
            buf.extend_from_slice(&offset.to_be_bytes());
        }
        writer.write_all(&buf)?;
        Ok(buf.len())
    }

    /// Parses `num_chunks` offsets from the front of `bytes`.
    pub fn read_from(bytes: &[u8], num_chunks: usize) -> Result<Self> {
        let size = num_chunks.checked_mul(CHUNK_OFFSET_SIZE).ok_or_else(|| {
            ScmvError::CorruptData(format!("Chunk index of {} chunks overflows usize", num_chunks))
        })?;
        let header = bytes.get(..size).ok_or_else(|| {
            ScmvError::CorruptData(format!(
                "Chunk index needs {} bytes, only {} available",
                size,
                bytes.len()
            ))
        })?;
        let offsets = header
            .chunks_exact(CHUNK_OFFSET_SIZE)
            .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        Ok(Self {
            offsets,
            num_chunks,
        })
    }
}

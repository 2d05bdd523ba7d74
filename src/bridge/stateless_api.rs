// In: src/bridge/stateless_api.rs

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use crate::bridge::decoder::ColumnDecoder;
use crate::bridge::encoder::ColumnEncoder;
use crate::bridge::format::{ColumnParams, ColumnStats};
use crate::config::CodecConfig;
use crate::error::{Result, ScmvError};

/// Encodes every row of a column into a byte vector using explicit parameters.
pub fn encode_column<R: AsRef<[u32]>>(rows: &[R], params: ColumnParams) -> Result<Vec<u8>> {
    encode_into(Vec::with_capacity(params.layout()?.total_size), rows, params, true)
}

/// Encodes `rows`, deriving `num_rows`, `total_values` and the minimal
/// `max_bits` from the data and taking the chunk granularity from `config`.
/// Returns the bytes together with the parameters the reader will need.
pub fn encode_rows<R: AsRef<[u32]>>(
    rows: &[R],
    config: &CodecConfig,
) -> Result<(Vec<u8>, ColumnParams)> {
    config.validate()?;
    let params = ColumnParams::from_rows(rows).with_rows_per_chunk(config.rows_per_chunk);
    let bytes = encode_into(Vec::new(), rows, params, config.verify_on_close)?;
    Ok((bytes, params))
}

/// Decodes every row of an encoded column.
pub fn decode_column(bytes: &[u8], params: ColumnParams) -> Result<Vec<Vec<u32>>> {
    let decoder = ColumnDecoder::new(bytes, params)?;
    let rows = decoder.iter_rows()?.collect::<Result<Vec<_>>>()?;
    Ok(rows)
}

/// Validates an encoded column and reports its layout without decoding values.
pub fn analyze_column(bytes: &[u8], params: ColumnParams) -> Result<ColumnStats> {
    let decoder = ColumnDecoder::new(bytes, params)?;
    let layout = decoder.layout();

    let offsets = decoder.chunk_offsets();
    let max_chunk_span = offsets
        .iter()
        .zip(offsets.iter().skip(1).map(|&o| o as usize).chain([params.total_values]))
        .map(|(&start, end)| end - start as usize)
        .max()
        .unwrap_or(0);

    Ok(ColumnStats {
        num_rows: params.num_rows,
        total_values: params.total_values,
        max_bits: params.max_bits,
        num_chunks: layout.num_chunks,
        header_size: layout.chunk_offset_header_size,
        bitmap_size: layout.bitmap_size,
        raw_data_size: layout.raw_data_size,
        total_size: bytes.len(),
        avg_values_per_row: if params.num_rows == 0 {
            0.0
        } else {
            params.total_values as f64 / params.num_rows as f64
        },
        max_chunk_span,
    })
}

/// Encodes `rows` into a sibling temp file and renames it over `path` only
/// once the column has been fully written and synced. Returns the file size.
pub fn write_column_file<R: AsRef<[u32]>>(
    path: &Path,
    rows: &[R],
    params: ColumnParams,
) -> Result<u64> {
    let tmp_path = temp_path_for(path)?;
    let result = write_and_sync(&tmp_path, rows, params);
    match result {
        Ok(size) => {
            fs::rename(&tmp_path, path)?;
            log::info!("Published column file {} ({} bytes)", path.display(), size);
            Ok(size)
        }
        Err(e) => {
            let _ = fs::remove_file(&tmp_path);
            Err(e)
        }
    }
}

fn write_and_sync<R: AsRef<[u32]>>(tmp_path: &Path, rows: &[R], params: ColumnParams) -> Result<u64> {
    let writer = BufWriter::new(File::create(tmp_path)?);
    let writer = encode_into(writer, rows, params, true)?;
    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;
    Ok(file.metadata()?.len())
}

fn encode_into<W, R>(sink: W, rows: &[R], params: ColumnParams, verify: bool) -> Result<W>
where
    W: std::io::Write,
    R: AsRef<[u32]>,
{
    let mut encoder = ColumnEncoder::new(sink, params)?.verify_on_close(verify);
    for (i, row) in rows.iter().enumerate() {
        encoder.set_row(i, row.as_ref())?;
    }
    encoder.close()
}

fn temp_path_for(path: &Path) -> Result<PathBuf> {
    let mut name = path
        .file_name()
        .ok_or_else(|| {
            ScmvError::InvalidParameter(format!(
                "Column path {} does not name a file",
                path.display()
            ))
        })?
        .to_os_string();
    name.push(".tmp");
    Ok(path.with_file_name(name))
}

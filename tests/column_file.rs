//! # Column File Tests
//!
//! End-to-end checks of the on-disk path:
//! 1. A column written with `ColumnEncoder::create` reads back through a
//!    memory-mapped `ColumnDecoder::open`
//! 2. `write_column_file` only publishes complete columns
//! 3. One decoder can serve many reader threads at once

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use scmv_codec::{
    write_column_file, ColumnDecoder, ColumnEncoder, ColumnParams, ScmvError,
};
use std::fs;
use tempfile::tempdir;

fn sample_rows(seed: u64, num_rows: usize) -> Vec<Vec<u32>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..num_rows)
        .map(|_| {
            let len = rng.random_range(1..=8usize);
            (0..len).map(|_| rng.random_range(0..1u32 << 12)).collect()
        })
        .collect()
}

mod file_roundtrip_tests {
    use super::*;

    #[test]
    fn streamed_file_reads_back_through_mmap() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tags.scmv");
        let rows = sample_rows(11, 5_000);
        let params = ColumnParams::from_rows(&rows).with_rows_per_chunk(128);

        let mut encoder = ColumnEncoder::create(&path, params).unwrap();
        for (i, row) in rows.iter().enumerate() {
            encoder.set_row(i, row.as_slice()).unwrap();
        }
        encoder.close().unwrap();

        let expected_size = params.layout().unwrap().total_size as u64;
        assert_eq!(fs::metadata(&path).unwrap().len(), expected_size);

        let decoder = ColumnDecoder::open(&path, params).unwrap();
        for row in [0, 1, 127, 128, 129, 2_500, 4_999] {
            assert_eq!(decoder.get_row(row).unwrap(), rows[row], "row {}", row);
        }
        let decoded: Vec<Vec<u32>> = decoder
            .iter_rows()
            .unwrap()
            .collect::<scmv_codec::Result<_>>()
            .unwrap();
        assert_eq!(decoded, rows);
    }

    #[test]
    fn write_column_file_publishes_atomically() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("col.scmv");
        let rows = sample_rows(5, 300);
        let params = ColumnParams::from_rows(&rows);

        let size = write_column_file(&path, &rows, params).unwrap();

        assert_eq!(size, params.layout().unwrap().total_size as u64);
        assert!(!dir.path().join("col.scmv.tmp").exists());
        let decoder = ColumnDecoder::open(&path, params).unwrap();
        assert_eq!(decoder.get_row(299).unwrap(), rows[299]);
    }

    #[test]
    fn failed_write_leaves_no_file_behind() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("col.scmv");
        let rows = sample_rows(5, 10);
        // Declares one row more than supplied.
        let total_values = rows.iter().map(|r| r.len()).sum::<usize>() + 1;
        let params = ColumnParams::new(11, total_values, 12);

        let err = write_column_file(&path, &rows, params).unwrap_err();

        assert!(matches!(err, ScmvError::Incomplete { .. }));
        assert!(!path.exists());
        assert!(!dir.path().join("col.scmv.tmp").exists());
    }

    #[test]
    fn truncated_file_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("col.scmv");
        let rows = sample_rows(9, 50);
        let params = ColumnParams::from_rows(&rows);
        write_column_file(&path, &rows, params).unwrap();

        let mut bytes = fs::read(&path).unwrap();
        bytes.pop();
        fs::write(&path, &bytes).unwrap();

        let err = ColumnDecoder::open(&path, params).unwrap_err();
        assert!(matches!(err, ScmvError::LayoutMismatch { .. }));
    }
}

mod concurrent_read_tests {
    use super::*;
    use std::thread;

    #[test]
    fn shared_decoder_serves_many_threads() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("shared.scmv");
        let rows = sample_rows(21, 20_000);
        let params = ColumnParams::from_rows(&rows).with_rows_per_chunk(256);
        write_column_file(&path, &rows, params).unwrap();

        let decoder = ColumnDecoder::open(&path, params).unwrap();
        let num_threads = 8;

        thread::scope(|s| {
            for t in 0..num_threads {
                let decoder = &decoder;
                let rows = &rows;
                s.spawn(move || {
                    let mut buf = Vec::new();
                    for row in (t..rows.len()).step_by(num_threads) {
                        decoder.get_row_into(row, &mut buf).unwrap();
                        assert_eq!(&buf, &rows[row]);
                    }
                });
            }
        });
    }
}

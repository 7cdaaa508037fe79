//! Fixed-layout binary records.
//!
//! Each reading is 32 bytes, little-endian, no header, no padding:
//!
//! ```text
//! offset  size  field
//!      0     8  device_time_us  u64
//!      8     8  temperature_c   f64 (IEEE-754)
//!     16     8  host_time_us    u64
//!     24     8  latency_us      i64 (two's complement)
//! ```
//!
//! The record count is `file_size / 32`.

use super::{create_file, open_file, FormatEncoder, StorageFormat};
use crate::error::{AppResult, DaqError};
use crate::reading::Reading;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

/// Size of one encoded reading in bytes.
pub const RECORD_SIZE: usize = 32;

/// Encode one reading.
pub fn encode_record(reading: &Reading) -> [u8; RECORD_SIZE] {
    let mut buf = [0u8; RECORD_SIZE];
    buf[0..8].copy_from_slice(&reading.device_time_us.to_le_bytes());
    buf[8..16].copy_from_slice(&reading.temperature_c.to_le_bytes());
    buf[16..24].copy_from_slice(&reading.host_time_us.to_le_bytes());
    buf[24..32].copy_from_slice(&reading.latency_us.to_le_bytes());
    buf
}

/// Decode one reading.
pub fn decode_record(buf: &[u8; RECORD_SIZE]) -> Reading {
    let word = |i: usize| {
        let mut w = [0u8; 8];
        w.copy_from_slice(&buf[i * 8..(i + 1) * 8]);
        w
    };
    Reading {
        device_time_us: u64::from_le_bytes(word(0)),
        temperature_c: f64::from_le_bytes(word(1)),
        host_time_us: u64::from_le_bytes(word(2)),
        latency_us: i64::from_le_bytes(word(3)),
    }
}

/// Decode a whole buffer. Fails if it holds a partial trailing record.
pub fn decode_all(bytes: &[u8]) -> Result<Vec<Reading>, String> {
    if bytes.len() % RECORD_SIZE != 0 {
        return Err(format!(
            "{} bytes is not a whole number of {}-byte records",
            bytes.len(),
            RECORD_SIZE
        ));
    }
    Ok(bytes
        .chunks_exact(RECORD_SIZE)
        .map(|chunk| {
            let mut rec = [0u8; RECORD_SIZE];
            rec.copy_from_slice(chunk);
            decode_record(&rec)
        })
        .collect())
}

/// Writer for the fixed binary layout.
#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryEncoder;

impl FormatEncoder for BinaryEncoder {
    fn format(&self) -> StorageFormat {
        StorageFormat::Binary
    }

    fn write(&self, path: &Path, readings: &[Reading]) -> AppResult<()> {
        let fail = |e: std::io::Error| DaqError::encode(StorageFormat::Binary, path, e);
        let mut out = BufWriter::new(create_file(StorageFormat::Binary, path)?);
        for reading in readings {
            out.write_all(&encode_record(reading)).map_err(fail)?;
        }
        out.flush().map_err(fail)?;
        out.get_ref().sync_all().map_err(fail)
    }

    fn read(&self, path: &Path) -> AppResult<Vec<Reading>> {
        let mut bytes = Vec::new();
        open_file(StorageFormat::Binary, path)?
            .read_to_end(&mut bytes)
            .map_err(|e| DaqError::decode(StorageFormat::Binary, path, e))?;
        decode_all(&bytes).map_err(|e| DaqError::decode(StorageFormat::Binary, path, e))
    }
}

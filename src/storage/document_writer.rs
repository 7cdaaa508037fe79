//! Tree-document encoder: a pretty-printed JSON array of objects.
//!
//! Keys appear in canonical field order because they follow the declaration order of
//! [`Reading`].

use super::{create_file, open_file, FormatEncoder, StorageFormat};
use crate::error::{AppResult, DaqError};
use crate::reading::Reading;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Writer for the JSON document format.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEncoder;

impl FormatEncoder for JsonEncoder {
    fn format(&self) -> StorageFormat {
        StorageFormat::Json
    }

    fn write(&self, path: &Path, readings: &[Reading]) -> AppResult<()> {
        let mut out = BufWriter::new(create_file(StorageFormat::Json, path)?);
        serde_json::to_writer_pretty(&mut out, readings)
            .map_err(|e| DaqError::encode(StorageFormat::Json, path, e))?;
        out.flush()
            .map_err(|e| DaqError::encode(StorageFormat::Json, path, e))
    }

    fn read(&self, path: &Path) -> AppResult<Vec<Reading>> {
        let reader = BufReader::new(open_file(StorageFormat::Json, path)?);
        serde_json::from_reader(reader).map_err(|e| DaqError::decode(StorageFormat::Json, path, e))
    }
}

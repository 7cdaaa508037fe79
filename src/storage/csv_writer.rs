//! CSV encoder: one header row, then one row per reading.
//!
//! Numbers are printed by the `csv` serializer, which is locale-independent (floats
//! always use `.` and keep a fractional part, e.g. `21.0`).

use super::{FormatEncoder, StorageFormat};
use crate::error::{AppResult, DaqError};
use crate::reading::Reading;
use std::path::Path;

#[cfg(feature = "storage_csv")]
use super::{create_file, open_file};
#[cfg(feature = "storage_csv")]
use crate::reading::FIELD_NAMES;

/// Writer for the row-oriented text format.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvEncoder;

#[cfg(feature = "storage_csv")]
impl FormatEncoder for CsvEncoder {
    fn format(&self) -> StorageFormat {
        StorageFormat::Csv
    }

    fn write(&self, path: &Path, readings: &[Reading]) -> AppResult<()> {
        let fail = |e: csv::Error| DaqError::encode(StorageFormat::Csv, path, e);
        let file = create_file(StorageFormat::Csv, path)?;

        // Header is written explicitly so an empty sequence still gets one.
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(file);
        writer.write_record(FIELD_NAMES).map_err(fail)?;
        for reading in readings {
            writer.serialize(reading).map_err(fail)?;
        }
        writer
            .flush()
            .map_err(|e| DaqError::encode(StorageFormat::Csv, path, e))
    }

    fn read(&self, path: &Path) -> AppResult<Vec<Reading>> {
        let fail = |e: csv::Error| DaqError::decode(StorageFormat::Csv, path, e);
        let mut reader = csv::Reader::from_reader(open_file(StorageFormat::Csv, path)?);

        let headers = reader.headers().map_err(fail)?;
        if headers.iter().ne(FIELD_NAMES.iter().copied()) {
            return Err(DaqError::decode(
                StorageFormat::Csv,
                path,
                format!("unexpected header {:?}", headers),
            ));
        }

        reader
            .deserialize::<Reading>()
            .collect::<Result<Vec<_>, _>>()
            .map_err(fail)
    }
}

#[cfg(not(feature = "storage_csv"))]
impl FormatEncoder for CsvEncoder {
    fn format(&self) -> StorageFormat {
        StorageFormat::Csv
    }

    fn write(&self, _path: &Path, _readings: &[Reading]) -> AppResult<()> {
        Err(DaqError::FeatureNotEnabled("storage_csv".to_string()))
    }

    fn read(&self, _path: &Path) -> AppResult<Vec<Reading>> {
        Err(DaqError::FeatureNotEnabled("storage_csv".to_string()))
    }
}

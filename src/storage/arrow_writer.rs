//! Arrow IPC columnar container.
//!
//! Used for the columnar slot when HDF5 is not compiled in. The file holds a single
//! uncompressed record batch whose schema carries the table name in its metadata.
//!
//! # Feature Flags
//!
//! - `storage_arrow`: Enables this writer

use super::{FormatEncoder, StorageFormat};
use crate::error::{AppResult, DaqError};
use crate::reading::Reading;
use std::path::Path;

#[cfg(feature = "storage_arrow")]
use super::{create_file, open_file, TABLE_NAME};
#[cfg(feature = "storage_arrow")]
use crate::reading::FIELD_NAMES;
#[cfg(feature = "storage_arrow")]
use arrow::array::{Array, ArrayRef, Float64Array, Int64Array, UInt64Array};
#[cfg(feature = "storage_arrow")]
use arrow::datatypes::{DataType, Field, Schema};
#[cfg(feature = "storage_arrow")]
use arrow::record_batch::RecordBatch;
#[cfg(feature = "storage_arrow")]
use std::sync::Arc;

/// Schema of the readings table, fields in canonical order.
#[cfg(feature = "storage_arrow")]
pub fn readings_schema() -> Schema {
    let types = [
        DataType::UInt64,
        DataType::Float64,
        DataType::UInt64,
        DataType::Int64,
    ];
    let fields: Vec<Field> = FIELD_NAMES
        .iter()
        .zip(types)
        .map(|(name, dtype)| Field::new(*name, dtype, false))
        .collect();
    Schema::new(fields).with_metadata(
        [("table".to_string(), TABLE_NAME.to_string())]
            .into_iter()
            .collect(),
    )
}

/// Build one record batch from the readings.
#[cfg(feature = "storage_arrow")]
pub fn to_record_batch(readings: &[Reading]) -> Result<RecordBatch, arrow::error::ArrowError> {
    let columns: Vec<ArrayRef> = vec![
        Arc::new(UInt64Array::from_iter_values(
            readings.iter().map(|r| r.device_time_us),
        )),
        Arc::new(Float64Array::from_iter_values(
            readings.iter().map(|r| r.temperature_c),
        )),
        Arc::new(UInt64Array::from_iter_values(
            readings.iter().map(|r| r.host_time_us),
        )),
        Arc::new(Int64Array::from_iter_values(
            readings.iter().map(|r| r.latency_us),
        )),
    ];
    RecordBatch::try_new(Arc::new(readings_schema()), columns)
}

#[cfg(feature = "storage_arrow")]
fn column<'a, T: Array + 'static>(batch: &'a RecordBatch, index: usize) -> Result<&'a T, String> {
    batch
        .column(index)
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| {
            format!(
                "column '{}' has unexpected type {:?}",
                FIELD_NAMES[index],
                batch.column(index).data_type()
            )
        })
}

#[cfg(feature = "storage_arrow")]
fn from_record_batch(batch: &RecordBatch) -> Result<Vec<Reading>, String> {
    if batch.num_columns() != FIELD_NAMES.len() {
        return Err(format!("expected 4 columns, found {}", batch.num_columns()));
    }
    let device = column::<UInt64Array>(batch, 0)?;
    let temperature = column::<Float64Array>(batch, 1)?;
    let host = column::<UInt64Array>(batch, 2)?;
    let latency = column::<Int64Array>(batch, 3)?;

    Ok((0..batch.num_rows())
        .map(|i| Reading {
            device_time_us: device.value(i),
            temperature_c: temperature.value(i),
            host_time_us: host.value(i),
            latency_us: latency.value(i),
        })
        .collect())
}

/// Writer for the Arrow IPC container.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArrowEncoder;

#[cfg(feature = "storage_arrow")]
impl FormatEncoder for ArrowEncoder {
    fn format(&self) -> StorageFormat {
        StorageFormat::Arrow
    }

    fn write(&self, path: &Path, readings: &[Reading]) -> AppResult<()> {
        use arrow::ipc::writer::FileWriter;

        let fail = |e: arrow::error::ArrowError| DaqError::encode(StorageFormat::Arrow, path, e);
        let batch = to_record_batch(readings).map_err(fail)?;
        let file = std::io::BufWriter::new(create_file(StorageFormat::Arrow, path)?);

        let mut writer = FileWriter::try_new(file, &batch.schema()).map_err(fail)?;
        writer.write(&batch).map_err(fail)?;
        writer.finish().map_err(fail)
    }

    fn read(&self, path: &Path) -> AppResult<Vec<Reading>> {
        use arrow::ipc::reader::FileReader;

        let fail = |e: String| DaqError::decode(StorageFormat::Arrow, path, e);
        let file = open_file(StorageFormat::Arrow, path)?;
        let reader = FileReader::try_new(file, None).map_err(|e| fail(e.to_string()))?;

        let mut readings = Vec::new();
        for batch in reader {
            let batch = batch.map_err(|e| fail(e.to_string()))?;
            readings.extend(from_record_batch(&batch).map_err(fail)?);
        }
        Ok(readings)
    }
}

#[cfg(not(feature = "storage_arrow"))]
impl FormatEncoder for ArrowEncoder {
    fn format(&self) -> StorageFormat {
        StorageFormat::Arrow
    }

    fn write(&self, _path: &Path, _readings: &[Reading]) -> AppResult<()> {
        Err(DaqError::FeatureNotEnabled("storage_arrow".to_string()))
    }

    fn read(&self, _path: &Path) -> AppResult<Vec<Reading>> {
        Err(DaqError::FeatureNotEnabled("storage_arrow".to_string()))
    }
}

#[cfg(all(test, feature = "storage_arrow"))]
mod tests {
    use super::*;
    use crate::storage::test_support::sample_readings;

    #[test]
    fn schema_matches_canonical_fields() {
        let schema = readings_schema();
        let names: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
        assert_eq!(names, FIELD_NAMES.to_vec());
        assert_eq!(schema.field(3).data_type(), &DataType::Int64);
        assert_eq!(schema.metadata().get("table").map(String::as_str), Some(TABLE_NAME));
    }

    #[test]
    fn round_trips_single_batch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("temp_data_3_entries.arrow");
        let readings = sample_readings();
        ArrowEncoder.write(&path, &readings).unwrap();
        assert_eq!(ArrowEncoder.read(&path).unwrap(), readings);
    }

    #[test]
    fn empty_sequence_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.arrow");
        ArrowEncoder.write(&path, &[]).unwrap();
        assert!(ArrowEncoder.read(&path).unwrap().is_empty());
    }

    #[test]
    fn garbage_file_fails_to_decode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.arrow");
        std::fs::write(&path, b"definitely not arrow").unwrap();
        assert!(matches!(
            ArrowEncoder.read(&path),
            Err(DaqError::Decode { .. })
        ));
    }
}

//! Format encoders for a frozen record sequence.
//!
//! Every session is persisted in four equivalent encodings that share the stem
//! `temp_data_<N>_entries`:
//!
//! | Slot | Format | Extension |
//! |------|--------|-----------|
//! | row text | CSV | `.csv` |
//! | fixed binary | 32-byte little-endian records | `.bin` |
//! | columnar container | HDF5 compound dataset, or Arrow IPC file | `.h5` / `.arrow` |
//! | tree document | pretty-printed JSON array | `.json` |
//!
//! All encoders write the fields in [`FIELD_NAMES`](crate::reading::FIELD_NAMES) order.
//! Each encoder also knows how to read its own file back, which is all the downstream
//! analysis tools need.

pub mod arrow_writer;
pub mod binary_writer;
pub mod csv_writer;
pub mod document_writer;
pub mod hdf5_writer;
pub mod registry;

pub use registry::EncoderRegistry;

use crate::error::{AppResult, DaqError};
use crate::reading::Reading;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::info;

/// Name of the table/dataset inside columnar containers.
pub const TABLE_NAME: &str = "temperature_data";

/// Every on-disk encoding this crate knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StorageFormat {
    /// Comma-separated text with a header row.
    Csv,
    /// Headerless 32-byte fixed records.
    Binary,
    /// HDF5 file with one compound dataset.
    Hdf5,
    /// Arrow IPC file with one record batch.
    Arrow,
    /// JSON array of objects.
    Json,
}

impl StorageFormat {
    /// All formats, in persistence order.
    pub const ALL: [StorageFormat; 5] = [
        StorageFormat::Csv,
        StorageFormat::Binary,
        StorageFormat::Hdf5,
        StorageFormat::Arrow,
        StorageFormat::Json,
    ];

    /// File extension without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            StorageFormat::Csv => "csv",
            StorageFormat::Binary => "bin",
            StorageFormat::Hdf5 => "h5",
            StorageFormat::Arrow => "arrow",
            StorageFormat::Json => "json",
        }
    }

    /// Cargo feature that compiles this format in, if it is optional.
    pub fn feature(&self) -> Option<&'static str> {
        match self {
            StorageFormat::Csv => Some("storage_csv"),
            StorageFormat::Hdf5 => Some("storage_hdf5"),
            StorageFormat::Arrow => Some("storage_arrow"),
            StorageFormat::Binary | StorageFormat::Json => None,
        }
    }
}

impl fmt::Display for StorageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StorageFormat::Csv => "csv",
            StorageFormat::Binary => "binary",
            StorageFormat::Hdf5 => "hdf5",
            StorageFormat::Arrow => "arrow",
            StorageFormat::Json => "json",
        };
        f.write_str(name)
    }
}

/// Which container fills the columnar slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnarBackend {
    /// HDF5 compound dataset (requires `storage_hdf5`).
    Hdf5,
    /// Arrow IPC file (requires `storage_arrow`).
    Arrow,
}

impl Default for ColumnarBackend {
    fn default() -> Self {
        if cfg!(feature = "storage_hdf5") {
            ColumnarBackend::Hdf5
        } else {
            ColumnarBackend::Arrow
        }
    }
}

impl ColumnarBackend {
    /// Storage format written by this backend.
    pub fn format(&self) -> StorageFormat {
        match self {
            ColumnarBackend::Hdf5 => StorageFormat::Hdf5,
            ColumnarBackend::Arrow => StorageFormat::Arrow,
        }
    }

    /// The four formats of one session: row text, fixed binary, columnar, document.
    pub fn session_formats(&self) -> [StorageFormat; 4] {
        [
            StorageFormat::Csv,
            StorageFormat::Binary,
            self.format(),
            StorageFormat::Json,
        ]
    }
}

/// Serializes a whole record sequence into one file, and reads it back.
pub trait FormatEncoder: Send + Sync {
    /// Format this encoder produces.
    fn format(&self) -> StorageFormat;

    /// Write every reading to `path`, creating or truncating it.
    fn write(&self, path: &Path, readings: &[Reading]) -> AppResult<()>;

    /// Decode a file previously produced by [`write`](Self::write).
    fn read(&self, path: &Path) -> AppResult<Vec<Reading>>;
}

/// File naming for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionFiles {
    dir: PathBuf,
    count: u64,
}

impl SessionFiles {
    /// Files for a session of `count` readings under `dir`.
    pub fn new(dir: impl Into<PathBuf>, count: u64) -> Self {
        Self {
            dir: dir.into(),
            count,
        }
    }

    /// Number of readings the files hold.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// `temp_data_<N>_entries`
    pub fn stem(&self) -> String {
        format!("temp_data_{}_entries", self.count)
    }

    /// Full path of this session's file in `format`.
    pub fn path_for(&self, format: StorageFormat) -> PathBuf {
        self.dir
            .join(format!("{}.{}", self.stem(), format.extension()))
    }

    /// Formats whose file exists on disk. Missing files are simply left out.
    pub fn existing(&self) -> Vec<(StorageFormat, PathBuf)> {
        StorageFormat::ALL
            .iter()
            .map(|f| (*f, self.path_for(*f)))
            .filter(|(_, p)| p.is_file())
            .collect()
    }
}

/// Run every encoder over `readings`, in order, on the blocking pool.
///
/// The first failure aborts persistence; files already written stay on disk.
pub async fn persist_all(
    files: SessionFiles,
    encoders: Vec<Box<dyn FormatEncoder>>,
    readings: Vec<Reading>,
) -> AppResult<Vec<PathBuf>> {
    tokio::task::spawn_blocking(move || {
        let mut written = Vec::with_capacity(encoders.len());
        for encoder in &encoders {
            let path = files.path_for(encoder.format());
            encoder.write(&path, &readings)?;
            info!(
                format = %encoder.format(),
                path = %path.display(),
                records = readings.len(),
                "Encoder finished"
            );
            written.push(path);
        }
        Ok(written)
    })
    .await
    .map_err(|e| DaqError::Task(format!("Persistence task panicked: {e}")))?
}

pub(crate) fn create_file(format: StorageFormat, path: &Path) -> AppResult<std::fs::File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| DaqError::encode(format, path, e))?;
    }
    std::fs::File::create(path).map_err(|e| DaqError::encode(format, path, e))
}

pub(crate) fn open_file(format: StorageFormat, path: &Path) -> AppResult<std::fs::File> {
    std::fs::File::open(path).map_err(|e| DaqError::decode(format, path, e))
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::reading::Reading;

    /// Small sequence exercising negative latency and fractional temperatures.
    pub fn sample_readings() -> Vec<Reading> {
        vec![
            Reading {
                device_time_us: 123_456,
                temperature_c: 21.5,
                host_time_us: 1_700_000_000_200_000,
                latency_us: 0,
            },
            Reading {
                device_time_us: 124_456,
                temperature_c: 21.0,
                host_time_us: 1_700_000_000_201_350,
                latency_us: 350,
            },
            Reading {
                device_time_us: 125_456,
                temperature_c: -0.125,
                host_time_us: 1_700_000_000_201_900,
                latency_us: -100,
            },
        ]
    }
}

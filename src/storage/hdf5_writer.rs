//! HDF5 columnar container.
//!
//! One dataset, [`TABLE_NAME`](super::TABLE_NAME), holding every reading as a compound
//! element with the four canonical fields. No chunking, no compression, so Python
//! (`h5py`), MATLAB and Igor read it directly.

use super::{FormatEncoder, StorageFormat};
use crate::error::{AppResult, DaqError};
use crate::reading::Reading;
use std::path::Path;

#[cfg(feature = "storage_hdf5")]
use super::TABLE_NAME;

/// Compound element type of the dataset. Field order and widths match the binary layout.
#[cfg(feature = "storage_hdf5")]
#[derive(hdf5::H5Type, Debug, Clone, Copy, PartialEq)]
#[repr(C)]
struct H5Reading {
    device_time_us: u64,
    temperature_c: f64,
    host_time_us: u64,
    latency_us: i64,
}

#[cfg(feature = "storage_hdf5")]
impl From<&Reading> for H5Reading {
    fn from(r: &Reading) -> Self {
        Self {
            device_time_us: r.device_time_us,
            temperature_c: r.temperature_c,
            host_time_us: r.host_time_us,
            latency_us: r.latency_us,
        }
    }
}

#[cfg(feature = "storage_hdf5")]
impl From<H5Reading> for Reading {
    fn from(r: H5Reading) -> Self {
        Self {
            device_time_us: r.device_time_us,
            temperature_c: r.temperature_c,
            host_time_us: r.host_time_us,
            latency_us: r.latency_us,
        }
    }
}

/// Writer for the HDF5 container.
#[derive(Debug, Clone, Copy, Default)]
pub struct Hdf5Encoder;

#[cfg(feature = "storage_hdf5")]
impl FormatEncoder for Hdf5Encoder {
    fn format(&self) -> StorageFormat {
        StorageFormat::Hdf5
    }

    fn write(&self, path: &Path, readings: &[Reading]) -> AppResult<()> {
        use hdf5::File;

        let fail = |e: hdf5::Error| DaqError::encode(StorageFormat::Hdf5, path, e);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| DaqError::encode(StorageFormat::Hdf5, path, e))?;
        }

        let rows: Vec<H5Reading> = readings.iter().map(H5Reading::from).collect();
        let file = File::create(path).map_err(fail)?;
        file.new_dataset_builder()
            .with_data(rows.as_slice())
            .create(TABLE_NAME)
            .map_err(fail)?;
        file.flush().map_err(fail)?;
        file.close().map_err(fail)
    }

    fn read(&self, path: &Path) -> AppResult<Vec<Reading>> {
        use hdf5::File;

        let fail = |e: hdf5::Error| DaqError::decode(StorageFormat::Hdf5, path, e);
        let file = File::open(path).map_err(fail)?;
        let rows = file
            .dataset(TABLE_NAME)
            .map_err(fail)?
            .read_raw::<H5Reading>()
            .map_err(fail)?;
        Ok(rows.into_iter().map(Reading::from).collect())
    }
}

#[cfg(not(feature = "storage_hdf5"))]
impl FormatEncoder for Hdf5Encoder {
    fn format(&self) -> StorageFormat {
        StorageFormat::Hdf5
    }

    fn write(&self, _path: &Path, _readings: &[Reading]) -> AppResult<()> {
        Err(DaqError::FeatureNotEnabled("storage_hdf5".to_string()))
    }

    fn read(&self, _path: &Path) -> AppResult<Vec<Reading>> {
        Err(DaqError::FeatureNotEnabled("storage_hdf5".to_string()))
    }
}

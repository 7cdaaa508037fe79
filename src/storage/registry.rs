//! Encoder registry with automatic feature-based registration.
#[cfg(feature = "storage_arrow")]
use super::arrow_writer::ArrowEncoder;
use super::binary_writer::BinaryEncoder;
#[cfg(feature = "storage_csv")]
use super::csv_writer::CsvEncoder;
use super::document_writer::JsonEncoder;
#[cfg(feature = "storage_hdf5")]
use super::hdf5_writer::Hdf5Encoder;
use super::{ColumnarBackend, FormatEncoder, StorageFormat};
use crate::error::{AppResult, DaqError};
use std::collections::HashMap;

type EncoderFactory = Box<dyn Fn() -> Box<dyn FormatEncoder> + Send + Sync>;

/// Registry for encoder factories.
///
/// Formats behind an optional Cargo feature are only registered when that feature is
/// enabled, so asking for them yields [`DaqError::FeatureNotEnabled`] instead of a
/// runtime failure halfway through a session.
///
/// # Examples
///
/// ```
/// use temp_daq::storage::{EncoderRegistry, StorageFormat};
///
/// let registry = EncoderRegistry::new();
/// assert!(registry.is_available(StorageFormat::Binary));
/// assert!(registry.is_available(StorageFormat::Json));
/// ```
pub struct EncoderRegistry {
    factories: HashMap<StorageFormat, EncoderFactory>,
}

impl Default for EncoderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EncoderRegistry {
    /// Creates a registry with every encoder compiled into this build.
    pub fn new() -> Self {
        let mut registry = Self {
            factories: HashMap::new(),
        };

        registry.register(StorageFormat::Binary, || Box::new(BinaryEncoder));
        registry.register(StorageFormat::Json, || Box::new(JsonEncoder));

        #[cfg(feature = "storage_csv")]
        registry.register(StorageFormat::Csv, || Box::new(CsvEncoder));

        #[cfg(feature = "storage_hdf5")]
        registry.register(StorageFormat::Hdf5, || Box::new(Hdf5Encoder));

        #[cfg(feature = "storage_arrow")]
        registry.register(StorageFormat::Arrow, || Box::new(ArrowEncoder));

        registry
    }

    fn register<F>(&mut self, format: StorageFormat, factory: F)
    where
        F: Fn() -> Box<dyn FormatEncoder> + Send + Sync + 'static,
    {
        self.factories.insert(format, Box::new(factory));
    }

    /// Creates the encoder for `format`.
    ///
    /// # Errors
    ///
    /// [`DaqError::FeatureNotEnabled`] if the format was not compiled in.
    pub fn create(&self, format: StorageFormat) -> AppResult<Box<dyn FormatEncoder>> {
        self.factories
            .get(&format)
            .map(|factory| factory())
            .ok_or_else(|| {
                DaqError::FeatureNotEnabled(
                    format.feature().unwrap_or("unknown").to_string(),
                )
            })
    }

    /// The four encoders of one session, in persistence order.
    pub fn session_encoders(
        &self,
        backend: ColumnarBackend,
    ) -> AppResult<Vec<Box<dyn FormatEncoder>>> {
        backend
            .session_formats()
            .into_iter()
            .map(|format| self.create(format))
            .collect()
    }

    /// Whether `format` can be created.
    pub fn is_available(&self, format: StorageFormat) -> bool {
        self.factories.contains_key(&format)
    }
}

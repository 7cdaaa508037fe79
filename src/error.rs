//! Custom error types for the application.
//!
//! This module defines the primary error type, `DaqError`, for the whole acquisition
//! pipeline. Using the `thiserror` crate, it provides a centralized and consistent way
//! to report the fatal conditions that can end a session, from configuration and
//! serial-port problems to encoder failures.
//!
//! ## Error Hierarchy
//!
//! - **`Config`** / **`Configuration`**: layered configuration could not be extracted, or
//!   extracted values failed semantic validation.
//! - **`SerialOpen`**: the serial device could not be opened. Nothing has been written yet.
//! - **`SerialRead`** / **`ChannelClosed`**: the line channel failed or ran dry before the
//!   target count was reached.
//! - **`Encode`**: a format encoder could not write its destination. Files written by
//!   earlier encoders are left on disk as-is.
//! - **`Usage`**: the command line did not describe a valid run.
//! - **`Interrupted`**: a bounded session was stopped externally before reaching its count.
//!
//! Malformed lines and read timeouts are *not* errors: the parser returns `None` and the
//! line source reports [`LineEvent::Timeout`](crate::acquisition::source::LineEvent), and
//! the accumulator simply moves on.

use crate::storage::StorageFormat;
use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias for results using the application error type.
pub type AppResult<T> = std::result::Result<T, DaqError>;

#[derive(Error, Debug)]
pub enum DaqError {
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("Configuration validation error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to open serial port '{port}': {reason}")]
    SerialOpen { port: String, reason: String },

    #[error("Serial read error: {0}")]
    SerialRead(String),

    #[error("Line channel closed after {received} of {target} readings")]
    ChannelClosed { received: usize, target: u64 },

    #[error("Serial support not enabled. Rebuild with --features instrument_serial")]
    SerialFeatureDisabled,

    #[error("Failed to write {format} file '{}': {reason}", path.display())]
    Encode {
        format: StorageFormat,
        path: PathBuf,
        reason: String,
    },

    #[error("Failed to decode {format} file '{}': {reason}", path.display())]
    Decode {
        format: StorageFormat,
        path: PathBuf,
        reason: String,
    },

    #[error("{0}")]
    Usage(String),

    #[error("Acquisition interrupted after {received} of {target} readings")]
    Interrupted { received: usize, target: u64 },

    #[error("Feature '{0}' is not enabled. Please build with --features {0}")]
    FeatureNotEnabled(String),

    #[error("Background task failed: {0}")]
    Task(String),
}

impl From<figment::Error> for DaqError {
    fn from(value: figment::Error) -> Self {
        DaqError::Config(Box::new(value))
    }
}

impl DaqError {
    /// Builds an [`DaqError::Encode`] from any displayable cause.
    pub fn encode(format: StorageFormat, path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        DaqError::Encode {
            format,
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Builds an [`DaqError::Decode`] from any displayable cause.
    pub fn decode(format: StorageFormat, path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        DaqError::Decode {
            format,
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// True for errors that leave the serial channel in an unknown state.
    ///
    /// A sweep configured to keep going after a failed session still stops on these.
    pub fn is_channel_fault(&self) -> bool {
        matches!(
            self,
            DaqError::SerialOpen { .. }
                | DaqError::SerialRead(_)
                | DaqError::ChannelClosed { .. }
                | DaqError::SerialFeatureDisabled
                | DaqError::Interrupted { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_error_names_format_and_path() {
        let err = DaqError::encode(
            StorageFormat::Binary,
            "/readonly/temp_data_10_entries.bin",
            "permission denied",
        );
        let msg = err.to_string();
        assert!(msg.contains("binary"));
        assert!(msg.contains("temp_data_10_entries.bin"));
        assert!(msg.contains("permission denied"));
    }

    #[test]
    fn channel_faults_are_classified() {
        assert!(DaqError::ChannelClosed {
            received: 3,
            target: 10
        }
        .is_channel_fault());
        assert!(DaqError::SerialOpen {
            port: "/dev/ttyACM0".into(),
            reason: "busy".into()
        }
        .is_channel_fault());
        assert!(!DaqError::encode(StorageFormat::Csv, "x.csv", "disk full").is_channel_fault());
        assert!(!DaqError::Usage("bad".into()).is_channel_fault());
    }

    #[test]
    fn figment_errors_convert() {
        let figment_err = figment::Error::from("missing field `port`".to_string());
        let err: DaqError = figment_err.into();
        match err {
            DaqError::Config(inner) => assert!(inner.to_string().contains("port")),
            other => panic!("unexpected variant: {:?}", other),
        }
    }
}

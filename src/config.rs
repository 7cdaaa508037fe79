//! Configuration management using Figment.
//!
//! Settings are layered, lowest precedence first:
//! 1. built-in defaults ([`Settings::default`])
//! 2. a TOML file (`config/temp_daq.toml` unless another path is given)
//! 3. environment variables prefixed with `TEMP_DAQ_`, nested keys split on `__`
//!
//! Command-line flags are applied on top by the binary.
//!
//! # Example
//! ```no_run
//! use temp_daq::config::Settings;
//!
//! let settings = Settings::load()?;
//! println!("Reading from {}", settings.serial.port);
//! # Ok::<(), temp_daq::error::DaqError>(())
//! ```

use crate::acquisition::parser::LineGrammar;
use crate::error::{AppResult, DaqError};
use crate::storage::{ColumnarBackend, EncoderRegistry};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "config/temp_daq.toml";

/// Top-level settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Log output format (pretty, compact, json)
    pub log_format: String,
    /// Serial channel
    pub serial: SerialSettings,
    /// Output files
    pub storage: StorageSettings,
    /// Token positions of the device line format
    pub grammar: LineGrammar,
    /// Sweep behaviour
    pub sweep: SweepSettings,
}

/// Serial channel settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialSettings {
    /// Port path (e.g. "/dev/ttyACM0", "COM7")
    pub port: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Per-read timeout in milliseconds
    pub read_timeout_ms: u64,
    /// Pause after opening the port before reading, in milliseconds
    pub settle_ms: u64,
}

/// Output settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Directory receiving `temp_data_<N>_entries.*`
    pub output_dir: PathBuf,
    /// Container used for the columnar slot
    pub columnar_backend: ColumnarBackend,
}

/// Sweep settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepSettings {
    /// Stop the remaining counts after a failed session
    pub abort_on_error: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            serial: SerialSettings::default(),
            storage: StorageSettings::default(),
            grammar: LineGrammar::default(),
            sweep: SweepSettings::default(),
        }
    }
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            port: "/dev/ttyACM0".to_string(),
            baud_rate: 115_200,
            read_timeout_ms: 1_000,
            settle_ms: 0,
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            columnar_backend: ColumnarBackend::default(),
        }
    }
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            abort_on_error: true,
        }
    }
}

impl SerialSettings {
    /// Read timeout as a [`Duration`].
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

impl Settings {
    /// Load from [`DEFAULT_CONFIG_PATH`] and the environment.
    pub fn load() -> AppResult<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load from a specific file path and the environment. A missing file is not an
    /// error; the defaults apply.
    pub fn load_from<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        Self::figment(path.as_ref())
            .extract()
            .map_err(DaqError::from)
    }

    /// The provider stack behind [`load_from`](Self::load_from).
    pub fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("TEMP_DAQ_").split("__"))
    }

    /// Validate configuration after loading.
    pub fn validate(&self) -> AppResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(DaqError::Configuration(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            )));
        }

        let valid_formats = ["pretty", "compact", "json"];
        if !valid_formats.contains(&self.log_format.to_lowercase().as_str()) {
            return Err(DaqError::Configuration(format!(
                "Invalid log_format '{}'. Must be one of: {}",
                self.log_format,
                valid_formats.join(", ")
            )));
        }

        if self.serial.port.trim().is_empty() {
            return Err(DaqError::Configuration(
                "serial.port must not be empty".to_string(),
            ));
        }
        if self.serial.baud_rate == 0 {
            return Err(DaqError::Configuration(
                "serial.baud_rate must be positive".to_string(),
            ));
        }
        if self.serial.read_timeout_ms == 0 {
            return Err(DaqError::Configuration(
                "serial.read_timeout_ms must be positive".to_string(),
            ));
        }

        if self.grammar.timestamp_token == self.grammar.temperature_token {
            return Err(DaqError::Configuration(format!(
                "grammar.timestamp_token and grammar.temperature_token are both {}",
                self.grammar.timestamp_token
            )));
        }

        let backend = self.storage.columnar_backend.format();
        if !EncoderRegistry::new().is_available(backend) {
            return Err(DaqError::Configuration(format!(
                "Columnar backend '{}' is not compiled in (enable feature {})",
                backend,
                backend.feature().unwrap_or("?")
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn defaults_validate() {
        let settings = Settings::default();
        assert_eq!(settings.serial.baud_rate, 115_200);
        assert_eq!(settings.serial.read_timeout(), Duration::from_secs(1));
        assert_eq!(settings.grammar, LineGrammar::default());
        assert!(settings.sweep.abort_on_error);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn invalid_log_level() {
        let settings = Settings {
            log_level: "loud".to_string(),
            ..Settings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(DaqError::Configuration(_))
        ));
    }

    #[test]
    fn log_format_is_case_insensitive() {
        let settings = Settings {
            log_format: "JSON".to_string(),
            ..Settings::default()
        };
        assert!(settings.validate().is_ok());
        assert!(crate::logging::parse_output_format(&settings.log_format).is_ok());
    }

    #[test]
    fn identical_token_positions_rejected() {
        let mut settings = Settings::default();
        settings.grammar.temperature_token = settings.grammar.timestamp_token;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn zero_timeout_rejected() {
        let mut settings = Settings::default();
        settings.serial.read_timeout_ms = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    #[serial]
    fn toml_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("temp_daq.toml");
        std::fs::write(
            &path,
            r#"
log_level = "debug"

[serial]
port = "COM7"
read_timeout_ms = 250

[storage]
output_dir = "runs"
columnar_backend = "arrow"
"#,
        )
        .unwrap();

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.log_level, "debug");
        assert_eq!(settings.serial.port, "COM7");
        assert_eq!(settings.serial.read_timeout_ms, 250);
        assert_eq!(settings.serial.baud_rate, 115_200);
        assert_eq!(settings.storage.output_dir, PathBuf::from("runs"));
        assert_eq!(settings.storage.columnar_backend, ColumnarBackend::Arrow);
    }

    #[test]
    #[serial]
    fn shipped_config_keeps_compiled_defaults() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join(DEFAULT_CONFIG_PATH);
        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(
            settings.storage.columnar_backend,
            ColumnarBackend::default()
        );
        assert_eq!(settings, Settings::default());
        assert!(settings.validate().is_ok());
    }

    #[test]
    #[serial]
    fn missing_file_falls_back_to_defaults() {
        let settings = Settings::load_from("does/not/exist.toml").unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    #[serial]
    fn environment_overrides_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("temp_daq.toml", "[serial]\nport = \"COM7\"\n")?;
            jail.set_env("TEMP_DAQ_SERIAL__PORT", "/dev/ttyUSB1");
            jail.set_env("TEMP_DAQ_GRAMMAR__TEMPERATURE_TOKEN", "6");

            let settings = Settings::load_from("temp_daq.toml").map_err(|e| e.to_string())?;
            assert_eq!(settings.serial.port, "/dev/ttyUSB1");
            assert_eq!(settings.grammar.temperature_token, 6);
            Ok(())
        });
    }
}

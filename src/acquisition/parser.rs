//! Line grammar for the device's serial output.
//!
//! The firmware prints one sample per line, e.g.
//!
//! ```text
//! Onboard temperature @ 123456 = 21.50 C
//! ```
//!
//! which splits on whitespace into tokens where index 3 is the device timestamp in
//! microseconds and index 5 is the temperature. The positions live in [`LineGrammar`]
//! so a firmware change is a one-point update (and can be overridden from config).

use serde::{Deserialize, Serialize};

/// Device timestamp and temperature extracted from one line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParsedLine {
    /// Device clock in microseconds.
    pub device_time_us: u64,
    /// Temperature in degrees Celsius.
    pub temperature_c: f64,
}

/// Positions of the two numeric tokens within a whitespace-split line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineGrammar {
    /// Zero-based index of the device timestamp token.
    #[serde(default = "default_timestamp_token")]
    pub timestamp_token: usize,
    /// Zero-based index of the temperature token.
    #[serde(default = "default_temperature_token")]
    pub temperature_token: usize,
}

fn default_timestamp_token() -> usize {
    3
}

fn default_temperature_token() -> usize {
    5
}

impl Default for LineGrammar {
    fn default() -> Self {
        Self {
            timestamp_token: default_timestamp_token(),
            temperature_token: default_temperature_token(),
        }
    }
}

impl LineGrammar {
    /// Smallest token count a line must have to be considered.
    pub fn min_tokens(&self) -> usize {
        self.timestamp_token.max(self.temperature_token) + 1
    }

    /// Parse one raw line.
    ///
    /// Returns `None` for empty lines, lines with too few tokens, a timestamp that is
    /// not a non-negative integer, or a temperature that is not a finite number.
    pub fn parse(&self, line: &str) -> Option<ParsedLine> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() < self.min_tokens() {
            return None;
        }

        let device_time_us = tokens[self.timestamp_token].parse::<u64>().ok()?;
        let temperature_c = tokens[self.temperature_token]
            .parse::<f64>()
            .ok()
            .filter(|t| t.is_finite())?;

        Some(ParsedLine {
            device_time_us,
            temperature_c,
        })
    }
}

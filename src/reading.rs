//! The single domain record produced by an acquisition session.
//!
//! A [`Reading`] is immutable once built. Every on-disk format writes the four fields
//! in the order given by [`FIELD_NAMES`], and the [`RecordSequence`] preserves arrival
//! order.

use serde::{Deserialize, Serialize};

/// Canonical field names, in the order every encoder writes them.
pub const FIELD_NAMES: [&str; 4] = ["device_time_us", "temperature_c", "host_time_us", "latency_us"];

/// One timestamped temperature sample.
///
/// `latency_us` is signed: a host clock read that lands before the offset-adjusted
/// device time yields a negative value instead of wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Device clock at sampling time, microseconds since device boot.
    pub device_time_us: u64,
    /// Temperature in degrees Celsius.
    pub temperature_c: f64,
    /// Host wall clock at line receipt, microseconds since the Unix epoch.
    pub host_time_us: u64,
    /// `host_time_us - (device_time_us + offset)`.
    pub latency_us: i64,
}

/// Ordered readings of one session, in arrival order.
///
/// The sequence only grows while acquiring. [`RecordSequence::freeze`] hands out the
/// finished slice that the encoders consume.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordSequence {
    readings: Vec<Reading>,
}

impl RecordSequence {
    /// Empty sequence with room for `capacity` readings.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            readings: Vec::with_capacity(capacity),
        }
    }

    /// Append one fully-populated reading.
    pub fn push(&mut self, reading: Reading) {
        self.readings.push(reading);
    }

    /// Number of readings accumulated so far.
    pub fn len(&self) -> usize {
        self.readings.len()
    }

    /// True when no reading has been accumulated.
    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    /// Readings in arrival order.
    pub fn as_slice(&self) -> &[Reading] {
        &self.readings
    }

    /// Consume the sequence, returning the frozen readings.
    pub fn freeze(self) -> Vec<Reading> {
        self.readings
    }
}

impl From<Vec<Reading>> for RecordSequence {
    fn from(readings: Vec<Reading>) -> Self {
        Self { readings }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_preserves_arrival_order() {
        let mut seq = RecordSequence::with_capacity(2);
        assert!(seq.is_empty());
        seq.push(Reading {
            device_time_us: 20,
            temperature_c: 21.0,
            host_time_us: 120,
            latency_us: 0,
        });
        seq.push(Reading {
            device_time_us: 10,
            temperature_c: 22.0,
            host_time_us: 130,
            latency_us: 20,
        });
        assert_eq!(seq.len(), 2);
        let frozen = seq.freeze();
        assert_eq!(frozen[0].device_time_us, 20);
        assert_eq!(frozen[1].device_time_us, 10);
    }

    #[test]
    fn json_keys_follow_canonical_order() {
        let reading = Reading {
            device_time_us: 1,
            temperature_c: 2.5,
            host_time_us: 3,
            latency_us: -4,
        };
        let json = serde_json::to_string(&reading).unwrap();
        let positions: Vec<usize> = FIELD_NAMES
            .iter()
            .map(|name| json.find(name).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert!(json.contains("\"latency_us\":-4"));
    }
}

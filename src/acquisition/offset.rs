//! One-shot device-to-host clock offset.

use tracing::info;

/// Latches `host - device` from the first successfully parsed sample of a session.
///
/// Owned by one session's accumulator, so sweeps never share an offset.
#[derive(Debug, Clone, Default)]
pub struct ClockOffset {
    offset_us: Option<i64>,
}

impl ClockOffset {
    /// Unset offset.
    pub fn new() -> Self {
        Self::default()
    }

    /// The latched offset, if any sample has been observed.
    pub fn get(&self) -> Option<i64> {
        self.offset_us
    }

    /// Latch on first call, then return the latency of this sample under the
    /// latched offset. Later calls never change the offset.
    pub fn latency(&mut self, device_time_us: u64, host_time_us: u64) -> i64 {
        let device = device_time_us as i64;
        let host = host_time_us as i64;
        let offset = *self.offset_us.get_or_insert_with(|| {
            let offset = host.wrapping_sub(device);
            info!(offset_us = offset, "Clock offset latched");
            offset
        });
        host.wrapping_sub(device.wrapping_add(offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    #[traced_test]
    fn latch_is_logged_once() {
        let mut offset = ClockOffset::new();
        offset.latency(5, 10);
        offset.latency(6, 12);
        assert!(logs_contain("Clock offset latched"));
        logs_assert(|lines: &[&str]| {
            match lines.iter().filter(|l| l.contains("Clock offset latched")).count() {
                1 => Ok(()),
                n => Err(format!("expected one latch log, found {n}")),
            }
        });
    }

    #[test]
    fn first_sample_latches_and_has_zero_latency() {
        let mut offset = ClockOffset::new();
        assert_eq!(offset.get(), None);
        assert_eq!(offset.latency(123_456, 200_000), 0);
        assert_eq!(offset.get(), Some(76_544));
    }

    #[test]
    fn later_samples_reuse_latched_offset() {
        let mut offset = ClockOffset::new();
        offset.latency(1_000, 10_000);
        assert_eq!(offset.latency(2_000, 11_250), 250);
        assert_eq!(offset.latency(3_000, 12_000), 0);
        assert_eq!(offset.get(), Some(9_000));
    }

    #[test]
    fn negative_latency_is_not_wrapped() {
        let mut offset = ClockOffset::new();
        offset.latency(1_000, 10_000);
        assert_eq!(offset.latency(2_000, 10_900), -100);
    }
}

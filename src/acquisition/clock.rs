//! Host wall clock used to timestamp line receipt.

/// Source of host timestamps in microseconds since the Unix epoch.
pub trait HostClock: Send + Sync {
    /// Current host time in microseconds.
    fn now_us(&self) -> u64;
}

/// Wall clock backed by `chrono::Utc`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl HostClock for SystemClock {
    fn now_us(&self) -> u64 {
        // Pre-epoch clocks are clamped to zero.
        u64::try_from(chrono::Utc::now().timestamp_micros()).unwrap_or(0)
    }
}

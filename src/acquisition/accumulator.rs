//! Reading accumulator: the acquisition loop of one session.

use super::clock::HostClock;
use super::offset::ClockOffset;
use super::parser::LineGrammar;
use super::shutdown::Shutdown;
use super::source::{LineEvent, LineSource};
use crate::error::AppResult;
use crate::reading::{Reading, RecordSequence};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// How many readings a session collects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Stop after exactly this many readings.
    Count(u64),
    /// Run until external termination or until the channel closes.
    Unbounded,
}

impl Target {
    fn reached(&self, len: usize) -> bool {
        match self {
            Target::Count(n) => len as u64 >= *n,
            Target::Unbounded => false,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Count(n) => write!(f, "{n}"),
            Target::Unbounded => f.write_str("unbounded"),
        }
    }
}

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The record sequence reached the target count.
    TargetReached,
    /// The shutdown signal fired.
    Interrupted,
    /// The channel reported end of data.
    ChannelClosed,
    /// The channel failed mid-run. Only reported for unbounded targets; bounded runs
    /// return the error instead.
    ChannelFailed,
}

/// Frozen result of one acquisition loop.
#[derive(Debug, Clone)]
pub struct Acquisition {
    /// Readings in arrival order.
    pub readings: Vec<Reading>,
    /// Offset latched by the first reading, if any.
    pub offset_us: Option<i64>,
    /// What ended the loop.
    pub stop: StopReason,
    /// Lines dropped by the parser.
    pub skipped_lines: usize,
    /// Pulls that timed out without a line.
    pub timeouts: usize,
}

/// Session-scoped accumulator. Owns the offset, so nothing leaks between sessions.
pub struct Accumulator {
    grammar: LineGrammar,
    clock: Arc<dyn HostClock>,
    target: Target,
    offset: ClockOffset,
    records: RecordSequence,
    skipped_lines: usize,
    timeouts: usize,
}

impl Accumulator {
    /// Fresh accumulator with an unset offset and an empty record sequence.
    pub fn new(grammar: LineGrammar, clock: Arc<dyn HostClock>, target: Target) -> Self {
        let capacity = match target {
            Target::Count(n) => usize::try_from(n).unwrap_or(0).min(1 << 20),
            Target::Unbounded => 0,
        };
        Self {
            grammar,
            clock,
            target,
            offset: ClockOffset::new(),
            records: RecordSequence::with_capacity(capacity),
            skipped_lines: 0,
            timeouts: 0,
        }
    }

    /// Handle one raw line received at `host_time_us`.
    ///
    /// Returns `true` if the line produced a reading. A rejected line changes
    /// neither the record sequence nor the offset.
    pub fn ingest(&mut self, raw: &[u8], host_time_us: u64) -> bool {
        let text = String::from_utf8_lossy(raw);
        let Some(parsed) = self.grammar.parse(&text) else {
            self.skipped_lines += 1;
            trace!(line = %text.trim_end(), "Skipping unparseable line");
            return false;
        };

        let latency_us = self.offset.latency(parsed.device_time_us, host_time_us);
        self.records.push(Reading {
            device_time_us: parsed.device_time_us,
            temperature_c: parsed.temperature_c,
            host_time_us,
            latency_us,
        });
        true
    }

    /// Readings accumulated so far.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True before the first reading.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Pull lines from `source` until the target is reached, `shutdown` fires, or the
    /// channel closes.
    ///
    /// Host time is sampled as soon as a line arrives, before parsing. Timeouts are
    /// retried without counting as samples.
    pub async fn run(
        mut self,
        source: &mut dyn LineSource,
        shutdown: &mut Shutdown,
    ) -> AppResult<Acquisition> {
        let stop = loop {
            if self.target.reached(self.records.len()) {
                break StopReason::TargetReached;
            }

            let event = tokio::select! {
                biased;
                _ = shutdown.wait() => break StopReason::Interrupted,
                event = source.next_line() => match event {
                    Ok(event) => event,
                    Err(e) if self.target == Target::Unbounded => {
                        warn!(
                            error = %e,
                            collected = self.records.len(),
                            "Channel failed, keeping readings collected so far"
                        );
                        break StopReason::ChannelFailed;
                    }
                    Err(e) => return Err(e),
                },
            };

            match event {
                LineEvent::Line(raw) => {
                    let host_time_us = self.clock.now_us();
                    if self.ingest(&raw, host_time_us) && self.records.len() % 1000 == 0 {
                        debug!(
                            collected = self.records.len(),
                            goal = %self.target,
                            "Acquisition progress"
                        );
                    }
                }
                LineEvent::Timeout => {
                    self.timeouts += 1;
                    debug!(collected = self.records.len(), "No line within read timeout");
                }
                LineEvent::Closed => break StopReason::ChannelClosed,
            }
        };

        Ok(self.finish(stop))
    }

    fn finish(self, stop: StopReason) -> Acquisition {
        Acquisition {
            offset_us: self.offset.get(),
            readings: self.records.freeze(),
            stop,
            skipped_lines: self.skipped_lines,
            timeouts: self.timeouts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::source::MockLineSource;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Clock that advances a fixed step on every read.
    struct StepClock {
        next: AtomicU64,
        step: u64,
    }

    impl HostClock for StepClock {
        fn now_us(&self) -> u64 {
            self.next.fetch_add(self.step, Ordering::SeqCst)
        }
    }

    fn clock(start: u64, step: u64) -> Arc<dyn HostClock> {
        Arc::new(StepClock {
            next: AtomicU64::new(start),
            step,
        })
    }

    #[tokio::test]
    async fn reference_line_latches_offset() {
        let mut source = MockLineSource::from_lines(["abc def 42 123456 temp 21.50"]);
        let acc = Accumulator::new(LineGrammar::default(), clock(200_000, 0), Target::Count(1));
        let out = acc.run(&mut source, &mut Shutdown::never()).await.unwrap();

        assert_eq!(out.stop, StopReason::TargetReached);
        assert_eq!(out.offset_us, Some(76_544));
        assert_eq!(
            out.readings,
            vec![Reading {
                device_time_us: 123_456,
                temperature_c: 21.50,
                host_time_us: 200_000,
                latency_us: 0,
            }]
        );
    }

    #[tokio::test]
    async fn stops_exactly_at_target() {
        let lines: Vec<String> = (0..10)
            .map(|i| format!("T @ x {} = {}.0", 1_000 * i, 20 + i))
            .collect();
        let mut source = MockLineSource::from_lines(&lines);
        let acc = Accumulator::new(LineGrammar::default(), clock(5_000, 1_100), Target::Count(4));
        let out = acc.run(&mut source, &mut Shutdown::never()).await.unwrap();

        assert_eq!(out.readings.len(), 4);
        assert_eq!(source.pulls(), 4);
        // host advances 1100us per line while device advances 1000us
        let latencies: Vec<i64> = out.readings.iter().map(|r| r.latency_us).collect();
        assert_eq!(latencies, vec![0, 100, 200, 300]);
    }

    #[tokio::test]
    async fn malformed_lines_and_timeouts_do_not_count() {
        let mut source = MockLineSource::from_events([
            LineEvent::Timeout,
            LineEvent::Line(b"garbage\n".to_vec()),
            LineEvent::Line(b"\n".to_vec()),
            LineEvent::Line(b"a b c 100 e 20.0\n".to_vec()),
            LineEvent::Line(b"a b c bad e 20.0\n".to_vec()),
            LineEvent::Timeout,
            LineEvent::Line(b"a b c 200 e 20.5\n".to_vec()),
        ]);
        let acc = Accumulator::new(LineGrammar::default(), clock(1_000, 0), Target::Count(2));
        let out = acc.run(&mut source, &mut Shutdown::never()).await.unwrap();

        assert_eq!(out.readings.len(), 2);
        assert_eq!(out.skipped_lines, 3);
        assert_eq!(out.timeouts, 2);
        // offset from the first *successful* line only
        assert_eq!(out.offset_us, Some(900));
        assert_eq!(out.readings[1].latency_us, -100);
    }

    #[test]
    fn rejected_line_leaves_offset_unset() {
        let mut acc = Accumulator::new(LineGrammar::default(), clock(0, 0), Target::Count(1));
        assert!(!acc.ingest(b"a b c", 50));
        assert!(acc.is_empty());
        assert_eq!(acc.offset.get(), None);
        assert!(acc.ingest(b"a b c 10 e 1.5", 50));
        assert_eq!(acc.offset.get(), Some(40));
        assert_eq!(acc.len(), 1);
    }

    #[tokio::test]
    async fn closed_channel_reports_partial_sequence() {
        let mut source = MockLineSource::from_lines(["a b c 1 e 1.0", "a b c 2 e 2.0"]);
        let acc = Accumulator::new(LineGrammar::default(), clock(10, 1), Target::Count(5));
        let out = acc.run(&mut source, &mut Shutdown::never()).await.unwrap();
        assert_eq!(out.stop, StopReason::ChannelClosed);
        assert_eq!(out.readings.len(), 2);
    }

    #[tokio::test]
    async fn unbounded_runs_until_shutdown() {
        let mut source = MockLineSource::from_lines(["a b c 1 e 1.0", "a b c 2 e 2.0"])
            .idle_when_drained();
        let (trigger, mut shutdown) = Shutdown::channel();
        let acc = Accumulator::new(LineGrammar::default(), clock(10, 1), Target::Unbounded);

        let handle = tokio::spawn(async move {
            let out = acc.run(&mut source, &mut shutdown).await;
            (out, source)
        });
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        trigger.trigger();

        let (out, source) = handle.await.unwrap();
        let out = out.unwrap();
        assert_eq!(out.stop, StopReason::Interrupted);
        assert_eq!(out.readings.len(), 2);
        assert!(source.pulls() > 2);
    }

    #[tokio::test]
    async fn unbounded_keeps_readings_when_channel_fails() {
        let mut source = MockLineSource::from_lines(["a b c 1 e 1.0", "a b c 2 e 2.0"])
            .fail_when_drained("device disconnected");
        let acc = Accumulator::new(LineGrammar::default(), clock(10, 1), Target::Unbounded);
        let out = acc.run(&mut source, &mut Shutdown::never()).await.unwrap();
        assert_eq!(out.stop, StopReason::ChannelFailed);
        assert_eq!(out.readings.len(), 2);
    }

    #[tokio::test]
    async fn bounded_run_returns_channel_failure() {
        let mut source =
            MockLineSource::from_lines(["a b c 1 e 1.0"]).fail_when_drained("device disconnected");
        let acc = Accumulator::new(LineGrammar::default(), clock(10, 1), Target::Count(3));
        let err = acc
            .run(&mut source, &mut Shutdown::never())
            .await
            .unwrap_err();
        assert!(matches!(err, crate::error::DaqError::SerialRead(ref m) if m == "device disconnected"));
    }

    #[test]
    fn target_display() {
        assert_eq!(Target::Count(1000).to_string(), "1000");
        assert_eq!(Target::Unbounded.to_string(), "unbounded");
        assert!(Target::Count(2).reached(2));
        assert!(!Target::Unbounded.reached(usize::MAX));
    }
}

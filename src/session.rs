//! Session driver.
//!
//! A session is one acquire-then-persist cycle for a single target count:
//!
//! ```text
//! Idle -> Opening -> Acquiring -> Persisting -> Closed
//! ```
//!
//! A sweep repeats the full `Opening -> Closed` cycle once per count, closing and
//! reopening the line channel in between so no buffered bytes cross a session boundary.
//! Every session gets a fresh [`Accumulator`], so the clock offset is never shared.

use crate::acquisition::{
    Accumulator, HostClock, LineGrammar, LineSource, ReaderLineSource, SerialLineSource,
    Shutdown, StopReason, SystemClock, Target,
};
use crate::config::{SerialSettings, Settings};
use crate::error::{AppResult, DaqError};
use crate::storage::{self, ColumnarBackend, EncoderRegistry, SessionFiles};
use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Inclusive start, exclusive stop, positive step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepRange {
    /// First target count
    pub start: u64,
    /// Exclusive upper bound
    pub stop: u64,
    /// Increment between counts
    pub step: u64,
}

impl SweepRange {
    /// Build a range, rejecting a zero start or step.
    pub fn new(start: u64, stop: u64, step: u64) -> AppResult<Self> {
        if start == 0 || step == 0 {
            return Err(DaqError::Usage(format!(
                "start and step must be positive (got start={start}, step={step})"
            )));
        }
        Ok(Self { start, stop, step })
    }

    /// Counts actually executed: `start, start+step, ...` strictly below `stop`.
    pub fn counts(&self) -> impl Iterator<Item = u64> {
        let step = usize::try_from(self.step).unwrap_or(usize::MAX);
        (self.start..self.stop).step_by(step)
    }

    /// Largest multiple of `step` not exceeding `stop`. Display only.
    pub fn actual_stop(&self) -> u64 {
        (self.stop / self.step) * self.step
    }

    /// The line printed before a sweep starts.
    pub fn plan_report(&self) -> String {
        format!(
            "I will take datasets with the number of events ranging from {} to {}, in steps of {}",
            self.start,
            self.actual_stop(),
            self.step
        )
    }
}

/// What a run of the tool does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPlan {
    /// One session of exactly N readings.
    Single(u64),
    /// One session per count of the range.
    Sweep(SweepRange),
    /// One session that runs until interrupted or the channel ends.
    Unbounded,
}

/// Lifecycle of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for a target count.
    Idle,
    /// Opening the line channel.
    Opening,
    /// Pulling lines into the accumulator.
    Acquiring,
    /// Running the format encoders.
    Persisting,
    /// Channel released; the session is over.
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Opening => "opening",
            SessionState::Acquiring => "acquiring",
            SessionState::Persisting => "persisting",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Opens a fresh line channel for every session.
#[async_trait]
pub trait ChannelFactory: Send + Sync {
    /// Open a new channel, ready to read.
    async fn open(&self) -> AppResult<Box<dyn LineSource>>;

    /// Description for logs.
    fn describe(&self) -> String;
}

/// Serial port channels built from [`SerialSettings`].
#[derive(Debug, Clone)]
pub struct SerialChannel {
    settings: SerialSettings,
}

impl SerialChannel {
    /// Channel factory for the configured port.
    pub fn new(settings: SerialSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl ChannelFactory for SerialChannel {
    async fn open(&self) -> AppResult<Box<dyn LineSource>> {
        let mut source = SerialLineSource::new(&self.settings.port, self.settings.baud_rate)
            .with_timeout(self.settings.read_timeout());
        source.open()?;

        if self.settings.settle_ms > 0 {
            debug!(settle_ms = self.settings.settle_ms, "Waiting for device to settle");
            tokio::time::sleep(Duration::from_millis(self.settings.settle_ms)).await;
        }
        Ok(Box::new(source))
    }

    fn describe(&self) -> String {
        format!("serial {} @ {} baud", self.settings.port, self.settings.baud_rate)
    }
}

/// Replays a captured serial log. Each session starts again from the top of the file.
#[derive(Debug, Clone)]
pub struct ReplayChannel {
    path: PathBuf,
}

impl ReplayChannel {
    /// Channel factory replaying `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ChannelFactory for ReplayChannel {
    async fn open(&self) -> AppResult<Box<dyn LineSource>> {
        Ok(Box::new(ReaderLineSource::open_file(&self.path).await?))
    }

    fn describe(&self) -> String {
        format!("replay {}", self.path.display())
    }
}

/// Result of one completed session.
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    /// Target the session ran for.
    pub target: Target,
    /// Readings persisted.
    pub records: usize,
    /// Files written, in persistence order. Empty if nothing was collected.
    pub paths: Vec<PathBuf>,
    /// Offset latched by the first reading.
    pub offset_us: Option<i64>,
    /// Lines dropped by the parser.
    pub skipped_lines: usize,
    /// Pulls that hit the read timeout.
    pub timeouts: usize,
}

/// Runs sessions and sweeps against a channel factory.
pub struct SessionDriver {
    channel: Arc<dyn ChannelFactory>,
    clock: Arc<dyn HostClock>,
    grammar: LineGrammar,
    registry: EncoderRegistry,
    backend: ColumnarBackend,
    output_dir: PathBuf,
    abort_on_error: bool,
    shutdown: Shutdown,
    state: SessionState,
}

impl SessionDriver {
    /// Driver using the system clock and no external shutdown.
    pub fn new(settings: &Settings, channel: Arc<dyn ChannelFactory>) -> Self {
        Self {
            channel,
            clock: Arc::new(SystemClock),
            grammar: settings.grammar,
            registry: EncoderRegistry::new(),
            backend: settings.storage.columnar_backend,
            output_dir: settings.storage.output_dir.clone(),
            abort_on_error: settings.sweep.abort_on_error,
            shutdown: Shutdown::never(),
            state: SessionState::Idle,
        }
    }

    /// Replace the host clock.
    pub fn with_clock(mut self, clock: Arc<dyn HostClock>) -> Self {
        self.clock = clock;
        self
    }

    /// Stop acquisition when `shutdown` fires.
    pub fn with_shutdown(mut self, shutdown: Shutdown) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    fn transition(&mut self, next: SessionState) {
        debug!(from = %self.state, to = %next, "Session state change");
        self.state = next;
    }

    /// Execute a whole plan. Returns the outcome of every completed session.
    pub async fn run(&mut self, plan: &RunPlan) -> AppResult<Vec<SessionOutcome>> {
        match plan {
            RunPlan::Single(count) => Ok(vec![self.run_session(Target::Count(*count)).await?]),
            RunPlan::Unbounded => Ok(vec![self.run_session(Target::Unbounded).await?]),
            RunPlan::Sweep(range) => self.run_sweep(range).await,
        }
    }

    /// One session per count of `range`.
    ///
    /// A failed session ends the sweep when `sweep.abort_on_error` is set, and always
    /// when the failure left the channel in an unknown state.
    pub async fn run_sweep(&mut self, range: &SweepRange) -> AppResult<Vec<SessionOutcome>> {
        println!("{}", range.plan_report());
        info!(
            start = range.start,
            stop = range.stop,
            step = range.step,
            actual_stop = range.actual_stop(),
            "Starting sweep"
        );

        let mut outcomes = Vec::new();
        for count in range.counts() {
            match self.run_session(Target::Count(count)).await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) if self.abort_on_error || e.is_channel_fault() => {
                    error!(count, error = %e, "Session failed, aborting sweep");
                    return Err(e);
                }
                Err(e) => warn!(count, error = %e, "Session failed, continuing sweep"),
            }
        }
        Ok(outcomes)
    }

    /// One full `Opening -> Closed` cycle.
    pub async fn run_session(&mut self, target: Target) -> AppResult<SessionOutcome> {
        self.state = SessionState::Idle;
        let result = self.acquire_and_persist(target).await;
        self.transition(SessionState::Closed);
        if let Err(e) = &result {
            error!(goal = %target, error = %e, "Session failed");
        }
        result
    }

    async fn acquire_and_persist(&mut self, target: Target) -> AppResult<SessionOutcome> {
        self.transition(SessionState::Opening);
        // Resolve encoders first so a missing backend fails before touching the device.
        let encoders = self.registry.session_encoders(self.backend)?;
        debug!(channel = %self.channel.describe(), "Opening channel");
        let mut source = self.channel.open().await?;
        info!(channel = %source.info(), goal = %target, "Channel open");

        self.transition(SessionState::Acquiring);
        println!("\n=== Acquiring {target} events ===");
        let accumulator = Accumulator::new(self.grammar, self.clock.clone(), target);
        let acquired = accumulator.run(source.as_mut(), &mut self.shutdown).await;
        if let Err(e) = source.close().await {
            warn!(error = %e, "Failed to close channel");
        }
        let acquisition = acquired?;
        let received = acquisition.readings.len();

        info!(
            received,
            skipped_lines = acquisition.skipped_lines,
            timeouts = acquisition.timeouts,
            stop = ?acquisition.stop,
            "Acquisition finished"
        );

        let count = match (target, acquisition.stop) {
            (Target::Count(n), StopReason::TargetReached) => n,
            (Target::Count(n), StopReason::Interrupted) => {
                return Err(DaqError::Interrupted {
                    received,
                    target: n,
                })
            }
            (Target::Count(n), StopReason::ChannelClosed | StopReason::ChannelFailed) => {
                return Err(DaqError::ChannelClosed {
                    received,
                    target: n,
                })
            }
            (Target::Unbounded, _) => received as u64,
        };

        let mut outcome = SessionOutcome {
            target,
            records: received,
            paths: Vec::new(),
            offset_us: acquisition.offset_us,
            skipped_lines: acquisition.skipped_lines,
            timeouts: acquisition.timeouts,
        };

        if received == 0 {
            warn!("No readings collected, nothing to persist");
            return Ok(outcome);
        }

        self.transition(SessionState::Persisting);
        let files = SessionFiles::new(&self.output_dir, count);
        outcome.paths = storage::persist_all(files, encoders, acquisition.readings).await?;

        println!("\nData stored in:");
        for path in &outcome.paths {
            println!("  {}", path.display());
        }
        println!();

        Ok(outcome)
    }
}

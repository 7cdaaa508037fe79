//! Line-oriented channels feeding the accumulator.
//!
//! [`SerialLineSource`] wraps the `serialport` crate and runs its blocking reads on
//! Tokio's blocking pool. [`ReaderLineSource`] replays a captured log through the same
//! path, and [`MockLineSource`] scripts events for tests.

use crate::error::{AppResult, DaqError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

#[cfg(feature = "instrument_serial")]
use std::sync::Arc;
#[cfg(feature = "instrument_serial")]
use tracing::debug;
#[cfg(feature = "instrument_serial")]
use tokio::sync::Mutex;

/// Outcome of one pull from a line channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEvent {
    /// One raw line, terminator included if present.
    Line(Vec<u8>),
    /// Nothing arrived within the read timeout.
    Timeout,
    /// The channel has no more data.
    Closed,
}

/// A channel that yields one line per pull.
#[async_trait]
pub trait LineSource: Send {
    /// Pull the next line, blocking at most for the source's read timeout.
    async fn next_line(&mut self) -> AppResult<LineEvent>;

    /// Release the underlying channel. Further pulls report [`LineEvent::Closed`].
    async fn close(&mut self) -> AppResult<()>;

    /// Human-readable description for logs.
    fn info(&self) -> String;
}

/// Serial port carrying the device's line stream.
pub struct SerialLineSource {
    /// Port name (e.g., "/dev/ttyACM0", "COM7")
    port_name: String,

    /// Baud rate (e.g., 115200)
    baud_rate: u32,

    /// Read timeout per pull
    timeout: Duration,

    #[cfg(feature = "instrument_serial")]
    port: Option<Arc<Mutex<PortReader>>>,
}

#[cfg(feature = "instrument_serial")]
struct PortReader {
    reader: std::io::BufReader<Box<dyn serialport::SerialPort>>,
    /// Bytes of a line whose terminator has not arrived yet.
    pending: Vec<u8>,
}

#[cfg(feature = "instrument_serial")]
impl PortReader {
    fn read_line(&mut self) -> AppResult<LineEvent> {
        use std::io::BufRead;

        // On timeout, bytes already read stay in `pending` for the next pull.
        match self.reader.read_until(b'\n', &mut self.pending) {
            Ok(0) if self.pending.is_empty() => Ok(LineEvent::Closed),
            Ok(_) => Ok(LineEvent::Line(std::mem::take(&mut self.pending))),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(LineEvent::Timeout),
            Err(e) => Err(DaqError::SerialRead(e.to_string())),
        }
    }
}

impl SerialLineSource {
    /// Describe a serial channel without opening it.
    pub fn new(port_name: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate,
            timeout: Duration::from_secs(1),
            #[cfg(feature = "instrument_serial")]
            port: None,
        }
    }

    /// Set read timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Open the port.
    #[cfg(feature = "instrument_serial")]
    pub fn open(&mut self) -> AppResult<()> {
        let port = serialport::new(&self.port_name, self.baud_rate)
            .timeout(self.timeout)
            .open()
            .map_err(|e| DaqError::SerialOpen {
                port: self.port_name.clone(),
                reason: e.to_string(),
            })?;

        self.port = Some(Arc::new(Mutex::new(PortReader {
            reader: std::io::BufReader::new(port),
            pending: Vec::new(),
        })));

        debug!(
            "Serial port '{}' opened at {} baud",
            self.port_name, self.baud_rate
        );
        Ok(())
    }

    #[cfg(not(feature = "instrument_serial"))]
    pub fn open(&mut self) -> AppResult<()> {
        Err(DaqError::SerialFeatureDisabled)
    }

    /// True once [`open`](Self::open) succeeded and until [`close`](LineSource::close).
    pub fn is_open(&self) -> bool {
        #[cfg(feature = "instrument_serial")]
        {
            self.port.is_some()
        }

        #[cfg(not(feature = "instrument_serial"))]
        {
            false
        }
    }
}

#[async_trait]
impl LineSource for SerialLineSource {
    #[cfg(feature = "instrument_serial")]
    async fn next_line(&mut self) -> AppResult<LineEvent> {
        let Some(port) = self.port.clone() else {
            return Ok(LineEvent::Closed);
        };

        tokio::task::spawn_blocking(move || port.blocking_lock().read_line())
            .await
            .map_err(|e| DaqError::Task(format!("Serial I/O task panicked: {e}")))?
    }

    #[cfg(not(feature = "instrument_serial"))]
    async fn next_line(&mut self) -> AppResult<LineEvent> {
        Err(DaqError::SerialFeatureDisabled)
    }

    async fn close(&mut self) -> AppResult<()> {
        #[cfg(feature = "instrument_serial")]
        {
            if self.port.take().is_some() {
                debug!("Serial port '{}' closed", self.port_name);
            }
        }
        Ok(())
    }

    fn info(&self) -> String {
        format!("serial {} @ {} baud", self.port_name, self.baud_rate)
    }
}

/// Replays lines from any buffered async reader, typically a captured serial log.
pub struct ReaderLineSource<R> {
    reader: Option<R>,
    label: String,
}

impl<R> ReaderLineSource<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    /// Wrap a reader; `label` names it in logs.
    pub fn new(reader: R, label: impl Into<String>) -> Self {
        Self {
            reader: Some(reader),
            label: label.into(),
        }
    }
}

impl ReaderLineSource<tokio::io::BufReader<tokio::fs::File>> {
    /// Open a capture file for replay.
    pub async fn open_file(path: &std::path::Path) -> AppResult<Self> {
        let file = tokio::fs::File::open(path)
            .await
            .map_err(|e| DaqError::SerialOpen {
                port: path.display().to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self::new(
            tokio::io::BufReader::new(file),
            path.display().to_string(),
        ))
    }
}

#[async_trait]
impl<R> LineSource for ReaderLineSource<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn next_line(&mut self) -> AppResult<LineEvent> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(LineEvent::Closed);
        };
        let mut line = Vec::new();
        let n = reader
            .read_until(b'\n', &mut line)
            .await
            .map_err(|e| DaqError::SerialRead(e.to_string()))?;
        if n == 0 {
            return Ok(LineEvent::Closed);
        }
        Ok(LineEvent::Line(line))
    }

    async fn close(&mut self) -> AppResult<()> {
        self.reader = None;
        Ok(())
    }

    fn info(&self) -> String {
        format!("replay {}", self.label)
    }
}

/// Scripted line source for tests and dry runs.
///
/// Once the script is exhausted it reports [`LineEvent::Closed`]. Built with
/// [`MockLineSource::idle_when_drained`] it keeps reporting [`LineEvent::Timeout`], and
/// with [`MockLineSource::fail_when_drained`] it fails like an unplugged device.
#[derive(Debug, Default)]
pub struct MockLineSource {
    events: VecDeque<LineEvent>,
    idle_when_drained: bool,
    failure: Option<String>,
    closed: bool,
    pulls: usize,
}

impl MockLineSource {
    /// Source that yields `lines` in order, then closes.
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::from_events(
            lines
                .into_iter()
                .map(|l| LineEvent::Line(format!("{}\n", l.as_ref()).into_bytes())),
        )
    }

    /// Source that yields the given events in order, then closes.
    pub fn from_events(events: impl IntoIterator<Item = LineEvent>) -> Self {
        Self {
            events: events.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Report timeouts instead of closing once the script runs out.
    pub fn idle_when_drained(mut self) -> Self {
        self.idle_when_drained = true;
        self
    }

    /// Report [`DaqError::SerialRead`] with `reason` once the script runs out.
    pub fn fail_when_drained(mut self, reason: impl Into<String>) -> Self {
        self.failure = Some(reason.into());
        self
    }

    /// Number of `next_line` calls served.
    pub fn pulls(&self) -> usize {
        self.pulls
    }

}

#[async_trait]
impl LineSource for MockLineSource {
    async fn next_line(&mut self) -> AppResult<LineEvent> {
        self.pulls += 1;
        if self.closed {
            return Ok(LineEvent::Closed);
        }
        if let Some(event) = self.events.pop_front() {
            return Ok(event);
        }
        if let Some(reason) = &self.failure {
            return Err(DaqError::SerialRead(reason.clone()));
        }
        if self.idle_when_drained {
            // Keep the loop cooperative, like a real read timeout would.
            tokio::task::yield_now().await;
            return Ok(LineEvent::Timeout);
        }
        Ok(LineEvent::Closed)
    }

    async fn close(&mut self) -> AppResult<()> {
        self.closed = true;
        Ok(())
    }

    fn info(&self) -> String {
        format!("mock ({} events queued)", self.events.len())
    }
}

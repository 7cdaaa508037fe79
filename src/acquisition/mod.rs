//! Acquisition side of a session: line channel, parser, clock offset and accumulator.

pub mod accumulator;
pub mod clock;
pub mod offset;
pub mod parser;
pub mod shutdown;
pub mod source;

pub use accumulator::{Accumulator, Acquisition, StopReason, Target};
pub use clock::{HostClock, SystemClock};
pub use offset::ClockOffset;
pub use parser::{LineGrammar, ParsedLine};
pub use shutdown::{Shutdown, ShutdownTrigger};
pub use source::{LineEvent, LineSource, MockLineSource, ReaderLineSource, SerialLineSource};

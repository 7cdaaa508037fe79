//! # Temperature DAQ Library
//!
//! Reads timestamped temperature lines from a microcontroller over a serial port,
//! corrects the device clock against the host clock with a one-time offset, and
//! persists each session as CSV, fixed-size binary records, a columnar container and
//! a JSON document.
//!
//! ## Crate Structure
//!
//! - **`acquisition`**: line channels (serial, replay, mock), the line grammar, the clock
//!   offset estimator and the per-session accumulator.
//! - **`cli`**: clap-derived command surface and run-plan parsing.
//! - **`config`**: figment-backed `Settings` (TOML file + `TEMP_DAQ_` environment).
//! - **`error`**: the `DaqError` enum shared by the whole crate.
//! - **`logging`**: `tracing-subscriber` initialisation.
//! - **`reading`**: the `Reading` record and the in-memory record sequence.
//! - **`session`**: session state machine, sweeps and channel factories.
//! - **`storage`**: the format encoders, their registry and file naming.

pub mod acquisition;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod reading;
pub mod session;
pub mod storage;

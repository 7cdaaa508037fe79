//! Command-line surface.
//!
//! ```bash
//! temp_daq 1000              # one session of 1000 readings
//! temp_daq 1000 5000 1000    # sweep 1000, 2000, 3000, 4000
//! temp_daq                   # unbounded, stop with Ctrl-C
//! ```

use crate::config::Settings;
use crate::error::{AppResult, DaqError};
use crate::session::{RunPlan, SweepRange};
use clap::Parser;
use std::path::PathBuf;

/// Usage text shown for a malformed invocation.
pub const USAGE: &str = "Usage examples:\n  temp_daq 1000\n  temp_daq 1000 5000 1000";

/// Command-line arguments.
#[derive(Debug, Parser)]
#[command(name = "temp_daq")]
#[command(about = "Serial temperature acquisition with clock-offset latency", long_about = None)]
pub struct Cli {
    /// COUNT for one session, START STOP STEP for a sweep, nothing for unbounded
    #[arg(value_name = "COUNTS")]
    pub counts: Vec<String>,

    /// Configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Serial port (overrides serial.port)
    #[arg(long)]
    pub port: Option<String>,

    /// Baud rate (overrides serial.baud_rate)
    #[arg(long)]
    pub baud: Option<u32>,

    /// Output directory (overrides storage.output_dir)
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Replay a captured serial log instead of opening the port
    #[arg(long)]
    pub replay: Option<PathBuf>,

    /// Log level (overrides log_level)
    #[arg(long)]
    pub log_level: Option<String>,
}

impl Cli {
    /// Interpret the positional arguments.
    pub fn plan(&self) -> AppResult<RunPlan> {
        parse_plan(&self.counts)
    }

    /// Apply flag overrides on top of loaded settings.
    pub fn apply_overrides(&self, settings: &mut Settings) {
        if let Some(port) = &self.port {
            settings.serial.port = port.clone();
        }
        if let Some(baud) = self.baud {
            settings.serial.baud_rate = baud;
        }
        if let Some(dir) = &self.output_dir {
            settings.storage.output_dir = dir.clone();
        }
        if let Some(level) = &self.log_level {
            settings.log_level = level.clone();
        }
    }
}

fn parse_count(arg: &str) -> AppResult<u64> {
    match arg.trim().parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(DaqError::Usage(format!(
            "'{arg}' is not a positive integer\n{USAGE}"
        ))),
    }
}

/// Map positional arguments to a plan: none, one count, or `start stop step`.
pub fn parse_plan<S: AsRef<str>>(args: &[S]) -> AppResult<RunPlan> {
    match args {
        [] => Ok(RunPlan::Unbounded),
        [count] => Ok(RunPlan::Single(parse_count(count.as_ref())?)),
        [start, stop, step] => {
            let start = parse_count(start.as_ref())?;
            let stop = parse_count(stop.as_ref())?;
            let step = parse_count(step.as_ref())?;
            Ok(RunPlan::Sweep(SweepRange::new(start, stop, step)?))
        }
        _ => Err(DaqError::Usage(USAGE.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_arguments_is_unbounded() {
        let args: [&str; 0] = [];
        assert_eq!(parse_plan(&args).unwrap(), RunPlan::Unbounded);
    }

    #[test]
    fn one_argument_is_single() {
        assert_eq!(parse_plan(&["1000"]).unwrap(), RunPlan::Single(1000));
    }

    #[test]
    fn three_arguments_are_a_sweep() {
        match parse_plan(&["1000", "4500", "1000"]).unwrap() {
            RunPlan::Sweep(range) => {
                assert_eq!((range.start, range.stop, range.step), (1000, 4500, 1000));
                assert_eq!(range.actual_stop(), 4000);
            }
            other => panic!("expected sweep, got {other:?}"),
        }
    }

    #[test]
    fn other_argument_counts_are_usage_errors() {
        assert!(matches!(parse_plan(&["1", "2"]), Err(DaqError::Usage(_))));
        assert!(matches!(
            parse_plan(&["1", "2", "3", "4"]),
            Err(DaqError::Usage(_))
        ));
    }

    #[test]
    fn non_positive_counts_are_usage_errors() {
        for bad in ["0", "-5", "ten", "1.5"] {
            assert!(
                matches!(parse_plan(&[bad]), Err(DaqError::Usage(_))),
                "{bad} should be rejected"
            );
        }
        assert!(matches!(
            parse_plan(&["1000", "5000", "0"]),
            Err(DaqError::Usage(_))
        ));
    }

    #[test]
    fn flags_override_settings() {
        let cli = Cli::parse_from([
            "temp_daq",
            "--port",
            "COM7",
            "--baud",
            "9600",
            "--output-dir",
            "runs",
            "--log-level",
            "debug",
            "500",
        ]);
        let mut settings = Settings::default();
        cli.apply_overrides(&mut settings);
        assert_eq!(settings.serial.port, "COM7");
        assert_eq!(settings.serial.baud_rate, 9600);
        assert_eq!(settings.storage.output_dir, PathBuf::from("runs"));
        assert_eq!(settings.log_level, "debug");
        assert_eq!(cli.plan().unwrap(), RunPlan::Single(500));
    }

    #[test]
    fn replay_and_config_flags_parse() {
        let cli = Cli::parse_from(["temp_daq", "--replay", "capture.log", "--config", "x.toml"]);
        assert_eq!(cli.replay, Some(PathBuf::from("capture.log")));
        assert_eq!(cli.config, Some(PathBuf::from("x.toml")));
        assert!(cli.counts.is_empty());
    }
}

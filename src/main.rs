//! CLI entry point for temp_daq.
//!
//! # Usage
//!
//! ```bash
//! temp_daq 1000                       # 1000 readings
//! temp_daq 1000 5000 1000             # sweep
//! temp_daq                            # until Ctrl-C
//! temp_daq --replay capture.log 500   # replay a captured serial log
//! ```

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use temp_daq::acquisition::Shutdown;
use temp_daq::cli::Cli;
use temp_daq::config::{Settings, DEFAULT_CONFIG_PATH};
use temp_daq::error::DaqError;
use temp_daq::logging;
use temp_daq::session::{ChannelFactory, ReplayChannel, SerialChannel, SessionDriver};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let plan = match cli.plan() {
        Ok(plan) => plan,
        Err(DaqError::Usage(message)) => {
            println!("{message}");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.into());
    let mut settings = Settings::load_from(&config_path)?;
    cli.apply_overrides(&mut settings);
    settings.validate()?;
    logging::init_from_settings(&settings).map_err(anyhow::Error::msg)?;

    let channel: Arc<dyn ChannelFactory> = match &cli.replay {
        Some(path) => Arc::new(ReplayChannel::new(path)),
        None => Arc::new(SerialChannel::new(settings.serial.clone())),
    };
    info!(
        channel = %channel.describe(),
        output_dir = %settings.storage.output_dir.display(),
        plan = ?plan,
        "Starting acquisition"
    );

    let (trigger, shutdown) = Shutdown::channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping acquisition");
            trigger.trigger();
        }
    });

    let mut driver = SessionDriver::new(&settings, channel).with_shutdown(shutdown);
    let outcomes = driver.run(&plan).await?;
    info!(sessions = outcomes.len(), "Done");
    Ok(())
}

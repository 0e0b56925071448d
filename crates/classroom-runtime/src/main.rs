//! # ClassPoll Context
//!
//! Entry point for one headless context.
//!
//! ## Startup Sequence
//!
//! 1. Load configuration from the environment
//! 2. Initialise logging and metrics
//! 3. Open the shared data directory and start the engine
//! 4. Serve JSON lines on stdin/stdout until input ends or Ctrl+C

use anyhow::{Context, Result};
use classroom_runtime::{run_console, ClassroomContext, RuntimeConfig};
use poll_telemetry::init_telemetry;
use tokio::io::BufReader;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let config = RuntimeConfig::from_env();
    config.validate().context("invalid configuration")?;

    let _telemetry = init_telemetry(&config.telemetry).context("telemetry setup failed")?;

    let context = ClassroomContext::start(&config).context("context startup failed")?;
    info!("Context is running. Close stdin or press Ctrl+C to stop.");

    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();

    tokio::select! {
        result = run_console(context.bridge(), stdin, stdout) => {
            if let Err(e) = result {
                error!("Console failed: {}", e);
            }
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("cannot listen for Ctrl+C")?;
            info!("Received Ctrl+C");
        }
    }

    context.shutdown().await;
    Ok(())
}

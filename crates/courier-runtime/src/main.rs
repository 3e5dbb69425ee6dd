//! # Courier Service
//!
//! Runs the user service behind the dispatch gateway until Ctrl+C.
//!
//! ## Startup Sequence
//!
//! 1. Install logging (`COURIER_LOG_LEVEL`, `COURIER_JSON_LOGS`)
//! 2. Load configuration from the environment
//! 3. Start the runtime
//! 4. Wait for Ctrl+C, then shut down gracefully

use anyhow::{Context, Result};
use tracing::info;

use courier_runtime::{init_tracing, CourierConfig, CourierRuntime, TelemetryConfig};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing(&TelemetryConfig::from_env()).context("Failed to initialize logging")?;

    let config = CourierConfig::from_env().context("Failed to load configuration")?;

    let mut runtime = CourierRuntime::new(config).context("Failed to create runtime")?;
    runtime.start().await.context("Failed to start runtime")?;

    info!("Courier is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;

    runtime.shutdown().await;

    Ok(())
}

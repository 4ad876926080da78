//! Triage intake entry point.
//!
//! Serves `POST /triage/incident` on the address from the `triage` config
//! section until Ctrl-C.

use std::sync::Arc;

use pulse_core::PulseConfig;
use pulse_triage::{start_server, ServerConfig, TriageState};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration is invalid or the server cannot bind.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("pulse-triage starting");

    let config = PulseConfig::load()?;
    let server_config = ServerConfig::from(&config.triage);
    info!(
        host = server_config.host,
        port = server_config.port,
        "configuration loaded"
    );

    let state = Arc::new(TriageState::new());
    start_server(&server_config, state, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
        info!("interrupt received");
    })
    .await?;

    Ok(())
}

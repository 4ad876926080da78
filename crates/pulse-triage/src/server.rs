//! Triage HTTP server lifecycle.
//!
//! [`start_server`] binds the configured address and serves until the
//! given shutdown future completes.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use pulse_core::config::TriageConfig;
use tokio::net::TcpListener;
use tracing::info;

use crate::router::build_router;
use crate::state::TriageState;

/// Bind address for the triage server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// The host address to bind to (e.g. `127.0.0.1`).
    pub host: String,
    /// The TCP port to listen on.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from(&TriageConfig::default())
    }
}

impl From<&TriageConfig> for ServerConfig {
    fn from(config: &TriageConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
        }
    }
}

/// Serve the triage router until `shutdown` completes.
///
/// # Errors
///
/// Returns an error if the address is invalid, the listener cannot bind,
/// or serving fails.
pub async fn start_server<F>(
    config: &ServerConfig,
    state: Arc<TriageState>,
    shutdown: F,
) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| ServerError::Bind(format!("invalid address: {e}")))?;

    let router = build_router(state);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| ServerError::Bind(format!("bind failed on {addr}: {e}")))?;

    info!(%addr, "triage intake listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| ServerError::Serve(format!("serve error: {e}")))?;

    info!("triage intake stopped");
    Ok(())
}

/// Errors that can occur when starting or running the triage server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind to the network address.
    #[error("bind error: {0}")]
    Bind(String),

    /// The server encountered a fatal error while serving.
    #[error("serve error: {0}")]
    Serve(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_triage_section() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 5100);
    }

    #[tokio::test]
    async fn invalid_host_is_a_bind_error() {
        let config = ServerConfig {
            host: "not a host".to_owned(),
            port: 5100,
        };
        let result = start_server(&config, Arc::new(TriageState::new()), async {}).await;
        assert!(matches!(result, Err(ServerError::Bind(_))));
    }
}

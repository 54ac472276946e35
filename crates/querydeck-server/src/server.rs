//! Listener setup and the serve loop.
//!
//! Grafana polls the datasource on every dashboard refresh, so the service
//! is long-running: [`start_server`] only returns on `Ctrl-C` (after
//! in-flight queries finish) or on a listener failure.

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::router::build_router;
use crate::state::AppState;

/// Port the datasource listens on unless configured otherwise.
pub const DEFAULT_PORT: u16 = 9999;

/// Where the datasource API listens.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host name or IP address. Host names are resolved at bind time.
    pub host: String,
    /// TCP port.
    pub port: u16,
}

impl ServerConfig {
    /// `host:port` form used in logs and errors.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_owned(),
            port: DEFAULT_PORT,
        }
    }
}

/// Bind the listener and serve the datasource API until `Ctrl-C`.
///
/// # Errors
///
/// [`ServerError::Bind`] if the address does not resolve or is taken,
/// [`ServerError::Serve`] if the accept loop fails.
pub async fn start_server(config: &ServerConfig, state: Arc<AppState>) -> Result<(), ServerError> {
    let listener = TcpListener::bind((config.host.as_str(), config.port))
        .await
        .map_err(|source| ServerError::Bind {
            endpoint: config.endpoint(),
            source,
        })?;
    match listener.local_addr() {
        Ok(addr) => info!(%addr, "datasource API listening"),
        Err(_) => info!(endpoint = %config.endpoint(), "datasource API listening"),
    }

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(ctrl_c())
        .await
        .map_err(ServerError::Serve)?;

    info!("datasource API drained");
    Ok(())
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "no Ctrl-C handler, serving until killed");
        std::future::pending::<()>().await;
    }
    info!("Ctrl-C received, draining requests");
}

/// Listener failures.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The endpoint could not be resolved or bound.
    #[error("cannot listen on {endpoint}: {source}")]
    Bind {
        /// The configured `host:port`.
        endpoint: String,
        /// Underlying socket error.
        #[source]
        source: std::io::Error,
    },

    /// The accept loop stopped with an I/O error.
    #[error("datasource API stopped: {0}")]
    Serve(#[source] std::io::Error),
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_listens_on_all_interfaces() {
        let config = ServerConfig::default();
        assert_eq!(config.endpoint(), "0.0.0.0:9999");
    }

    #[tokio::test]
    async fn bind_failure_names_the_endpoint() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = taken.local_addr().unwrap().port();
        let config = ServerConfig {
            host: "127.0.0.1".to_owned(),
            port,
        };
        let state = Arc::new(AppState::new(Arc::new(
            querydeck_core::Catalog::from_definitions(
                Vec::new(),
                Vec::new(),
                querydeck_core::RefreshCoordinator::new(Arc::new(NoSources)),
            )
            .0,
        )));

        let err = start_server(&config, state).await.unwrap_err();
        assert!(err.to_string().contains(&format!("127.0.0.1:{port}")));
    }

    struct NoSources;

    #[async_trait::async_trait]
    impl querydeck_core::DataSourceExecutor for NoSources {
        async fn execute(
            &self,
            source_name: &str,
            _query: &str,
        ) -> Result<querydeck_types::ResultSet, querydeck_core::ExecuteError> {
            Err(querydeck_core::ExecuteError::UnknownSource(source_name.to_owned()))
        }
    }
}

//! querydeck service binary.
//!
//! Wires the definition loader, the data source registry, the query cache,
//! and the HTTP API together, then serves until `Ctrl-C`.
//!
//! # Startup Sequence
//!
//! 1. Load service configuration from `querydeck-config.yaml` (or the path
//!    in `QUERYDECK_CONFIG`)
//! 2. Initialize structured logging (tracing)
//! 3. Load data source, query, and data selector definitions
//! 4. Build a connection pool per data source
//! 5. Build the query catalog
//! 6. Serve the HTTP API
//! 7. Close the pools on shutdown

mod error;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use querydeck_core::config::LoggingSettings;
use querydeck_core::{
    Catalog, DataSourceExecutor, RefreshCoordinator, ServiceConfig, load_definitions,
};
use querydeck_db::DataSourceRegistry;
use querydeck_server::{AppState, ServerConfig, start_server};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;

/// Default service configuration file, relative to the working directory.
const DEFAULT_CONFIG_FILE: &str = "querydeck-config.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if the configuration or definition directories cannot
/// be read, or if the HTTP server cannot bind.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration. Logging is not up yet, so this step is silent.
    let config_path = config_path(std::env::var("QUERYDECK_CONFIG").ok());
    let config = load_config(&config_path)?;

    // 2. Initialize structured logging.
    init_tracing(&config.logging);
    info!(
        config = %config_path.display(),
        config_dir = %config.config_dir.display(),
        host = config.server.host,
        port = config.server.port,
        "querydeck starting"
    );

    // 3. Load definitions.
    let definitions = load_definitions(&config.config_dir).map_err(EngineError::from)?;
    for problem in &definitions.diagnostics {
        warn!(error = %problem, "definition skipped");
    }

    // 4. Connect data sources.
    let (registry, db_problems) =
        DataSourceRegistry::connect_all(&definitions.data_sources, &config.database).await;
    for problem in &db_problems {
        warn!(error = %problem, "data source skipped");
    }
    info!(data_sources = registry.len(), "Data sources registered");
    let registry = Arc::new(registry);

    // 5. Build the catalog.
    let executor: Arc<dyn DataSourceExecutor> = registry.clone();
    let coordinator = RefreshCoordinator::new(executor);
    let (catalog, catalog_problems) =
        Catalog::from_definitions(definitions.queries, definitions.consumers, coordinator);
    info!(
        queries = catalog.query_count(),
        dataselectors = catalog.consumer_count(),
        skipped = catalog_problems.len(),
        "Catalog ready"
    );

    // 6. Serve.
    let server_config = ServerConfig {
        host: config.server.host.clone(),
        port: config.server.port,
    };
    let state = Arc::new(AppState::new(Arc::new(catalog)));
    let served = start_server(&server_config, state).await;

    // 7. Shut down.
    registry.close_all().await;
    served.map_err(EngineError::from)?;
    info!("querydeck stopped");
    Ok(())
}

/// Resolve the service configuration path from `QUERYDECK_CONFIG`.
fn config_path(from_env: Option<String>) -> PathBuf {
    from_env.map_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from)
}

/// Load the service configuration, falling back to defaults when the file
/// does not exist. Environment overrides apply either way.
fn load_config(path: &Path) -> Result<ServiceConfig, EngineError> {
    if path.exists() {
        Ok(ServiceConfig::from_file(path)?)
    } else {
        let mut config = ServiceConfig::default();
        config.apply_env_overrides();
        Ok(config)
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level when set.
fn init_tracing(settings: &LoggingSettings) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    if settings.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

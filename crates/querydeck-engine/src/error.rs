//! Error types for the querydeck binary.
//!
//! [`EngineError`] is the top-level error type that wraps every failure
//! that stops the service from starting or serving.

/// Top-level error for the querydeck binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Service configuration or the definition directories could not be
    /// loaded.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: querydeck_core::ConfigError,
    },

    /// The HTTP server failed to bind or serve.
    #[error("server error: {source}")]
    Server {
        /// The underlying server error.
        #[from]
        source: querydeck_server::ServerError,
    },
}

//! Telemetry error types.

use thiserror::Error;

/// Errors raised by the telemetry server.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The listen address could not be bound.
    #[error("failed to bind telemetry server to {addr}: {source}")]
    Bind {
        /// Address that was requested.
        addr: String,
        /// Underlying socket error.
        #[source]
        source: std::io::Error,
    },

    /// The server stopped with an I/O error.
    #[error("telemetry server failed: {0}")]
    Serve(#[from] std::io::Error),

    /// A frame could not be serialized.
    #[error("failed to encode telemetry frame: {0}")]
    Encode(#[from] serde_json::Error),
}

//! Link error types.
//!
//! None of these are fatal: callers log them and retry on the next tick.
//! Malformed or mismatched protocol lines are not errors at all; they
//! surface as "no data this cycle".

use std::time::Duration;
use thiserror::Error;

/// Error types for serial link operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    /// No port is open and none could be opened (no matching port, open
    /// failure, or the reconnect window has not elapsed yet).
    #[error("{link} link unavailable")]
    Unavailable {
        /// Link name.
        link: String,
    },

    /// Read or write failed on an open port; the handle has been dropped.
    #[error("{link} link I/O error: {reason}")]
    Io {
        /// Link name.
        link: String,
        /// Underlying I/O error text.
        reason: String,
    },

    /// The motion controller did not acknowledge a command in time.
    #[error("no 'ok' for '{command}' within {timeout:?}")]
    AckTimeout {
        /// Command that went unacknowledged.
        command: String,
        /// How long the acknowledgement was awaited.
        timeout: Duration,
    },

    /// The OS port table could not be read.
    #[error("port enumeration failed: {0}")]
    PortEnumeration(String),

    /// Opening a specific device failed.
    #[error("failed to open {device}: {reason}")]
    OpenFailed {
        /// Device path.
        device: String,
        /// Reason reported by the backend.
        reason: String,
    },

    /// No backend registered under the requested name.
    #[error("port backend not found: {0}")]
    BackendNotFound(String),
}

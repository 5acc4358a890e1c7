//! # Sortline Telemetry
//!
//! Live status for dashboards: the controller snapshot and the latest
//! vision boxes, streamed as JSON over a WebSocket.
//!
//! # Module Structure
//!
//! - [`frame`] - `{state, tag, boxes}` frame and its encoding
//! - [`hub`] - bounded fan-out to connected clients
//! - [`publisher`] - periodic frame composition and broadcast
//! - [`server`] - axum `/ws` endpoint
//! - [`vision`] - latest-boxes store and periodic detector worker
//! - [`error`] - telemetry error type
//!
//! # Data Flow
//!
//! ```text
//! cycle thread ──watch──┐
//!                       ├─▶ TelemetryPublisher ─▶ TelemetryHub ─▶ /ws clients
//! VisionWorker ─BoxStore┘        (every 100 ms)     (drops slow ones)
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod frame;
pub mod hub;
pub mod publisher;
pub mod server;
pub mod vision;

pub use crate::error::TelemetryError;
pub use crate::frame::TelemetryFrame;
pub use crate::hub::TelemetryHub;
pub use crate::publisher::TelemetryPublisher;
pub use crate::vision::{BoxDetector, BoxStore, VisionWorker};

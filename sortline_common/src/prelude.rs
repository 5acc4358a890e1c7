//! Prelude module for common re-exports.
//!
//! ```rust
//! use sortline_common::prelude::*;
//! ```

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{
    BackendKind, ConfigError, ConfigLoader, LineConfig, LogLevel, MotionScript,
    SerialPortConfig, SharedConfig, StageTimings,
};

// ─── Time ───────────────────────────────────────────────────────────
pub use crate::clock::{Clock, ManualClock, MonotonicClock, SharedClock};

// ─── Status ─────────────────────────────────────────────────────────
pub use crate::snapshot::{BoundingBox, StateSnapshot};

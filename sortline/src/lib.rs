//! # Sortline
//!
//! Supervisor wiring for the sorting line: builds the links, controller
//! and telemetry from one configuration and runs them until shutdown.
//!
//! # Module Structure
//!
//! - [`context`] - one-time construction and task lifecycle

#![warn(missing_docs)]

pub mod context;

pub use crate::context::{LineContext, RunSummary};

//! # Sortline HAL
//!
//! Serial links to the line's two peripherals with pluggable port backends.
//!
//! # Module Structure
//!
//! - [`port`] - `PortBackend` / `LinePort` traits and port selection
//! - [`link`] - `SerialLink`, the self-healing line-oriented connection
//! - [`rfid`] - RFID bridge request/response protocol
//! - [`motion`] - motion controller request/acknowledge protocol
//! - [`backend_registry`] - backend factory registration
//! - [`drivers`] - serial and simulation backends
//!
//! # Architecture
//!
//! ```text
//! ┌────────────┐   ┌────────────┐
//! │  RfidLink  │   │ MotionLink │
//! └─────┬──────┘   └─────┬──────┘
//!       ▼                ▼
//! ┌──────────────────────────────┐    ┌──────────────────┐
//! │ SerialLink (reconnect, I/O)  │◄───│ BackendRegistry  │
//! └──────────────┬───────────────┘    └──────────────────┘
//!                ▼
//!        PortBackend (trait object)
//!        ├── serial      (OS ports)
//!        └── simulation  (scripted devices)
//! ```

#![warn(missing_docs)]

pub mod backend_registry;
pub mod drivers;
pub mod error;
pub mod link;
pub mod motion;
pub mod port;
pub mod rfid;

pub use crate::backend_registry::BackendRegistry;
pub use crate::error::LinkError;
pub use crate::link::{LinkSettings, SerialLink};
pub use crate::motion::MotionLink;
pub use crate::port::{LinePort, PortBackend, PortInfo};
pub use crate::rfid::{Checkpoint, RfidLink, TagReading};

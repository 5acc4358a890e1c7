//! Port backend trait and line-oriented port handle.
//!
//! This module defines:
//! - `PortBackend` trait - enumerates and opens ports (real or simulated)
//! - `LinePort` trait - an open, exclusively owned port handle
//! - `PortInfo` - one enumerated port
//! - `BackendFactory` type alias - factory function type
//!
//! # Lifecycle
//!
//! 1. `list_ports()` - called on every connect attempt
//! 2. `open()` - called for the first port whose description matches
//! 3. `read_line()` / `write_all()` - until an I/O error drops the handle

use crate::error::LinkError;
use sortline_common::clock::SharedClock;
use sortline_common::config::LineConfig;
use std::io;
use std::time::Duration;

/// One OS-enumerated serial port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    /// Device path or name passed to `open()` (e.g. `/dev/ttyUSB0`, `COM3`).
    pub device: String,
    /// Human-readable description used for keyword matching.
    pub description: String,
}

impl PortInfo {
    /// Build a port entry.
    pub fn new(device: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            description: description.into(),
        }
    }

    /// True if the description contains any of `keywords`.
    pub fn matches<S: AsRef<str>>(&self, keywords: &[S]) -> bool {
        keywords
            .iter()
            .any(|k| self.description.contains(k.as_ref()))
    }
}

/// Open port handle.
///
/// Owned by exactly one link. Any `Err` returned here makes the owner drop
/// the handle.
pub trait LinePort: Send {
    /// One blocking read bounded by the port's read timeout.
    ///
    /// Returns the bytes of one line without its terminator, or whatever
    /// arrived before the timeout (possibly nothing).
    fn read_line(&mut self) -> io::Result<Vec<u8>>;

    /// Write all bytes.
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Discard pending input and output.
    fn clear_buffers(&mut self) -> io::Result<()>;
}

/// Source of serial ports.
///
/// Backends are selected by name through the
/// [`BackendRegistry`](crate::backend_registry::BackendRegistry).
pub trait PortBackend: Send {
    /// Backend identifier (e.g. "serial", "simulation").
    fn name(&self) -> &'static str;

    /// Enumerate ports currently visible.
    fn list_ports(&self) -> Result<Vec<PortInfo>, LinkError>;

    /// Open one port.
    fn open(
        &self,
        device: &str,
        baud_rate: u32,
        read_timeout: Duration,
    ) -> Result<Box<dyn LinePort>, LinkError>;
}

/// Factory function type for creating backend instances.
///
/// The clock is the one the owning link runs on; simulated backends use it
/// to account for idle read timeouts.
pub type BackendFactory = fn(&LineConfig, SharedClock) -> Box<dyn PortBackend>;

/// First port whose description contains any keyword.
pub fn select_port<'a, S: AsRef<str>>(ports: &'a [PortInfo], keywords: &[S]) -> Option<&'a PortInfo> {
    ports.iter().find(|p| p.matches(keywords))
}

/// Decode bytes as UTF-8, silently dropping invalid sequences.
pub fn decode_permissive(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        out.push_str(chunk.valid());
    }
    out
}

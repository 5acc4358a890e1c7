//! Self-healing serial link.
//!
//! `SerialLink` owns at most one open port. Every read and write first
//! calls [`SerialLink::ensure_connection`], so callers never carry their
//! own connectivity retry logic. An I/O error drops the handle; the next
//! call reconnects, at most once per reconnect interval.

use crate::error::LinkError;
use crate::port::{LinePort, PortBackend, decode_permissive, select_port};
use sortline_common::clock::SharedClock;
use sortline_common::config::{LineConfig, SerialPortConfig};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Static settings of one link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkSettings {
    /// Short name used in logs and errors ("rfid", "motion").
    pub name: String,
    /// Port description keywords, matched in order.
    pub keywords: Vec<String>,
    /// Line speed.
    pub baud_rate: u32,
    /// Bound on one blocking read.
    pub read_timeout: Duration,
    /// Minimum time between two connect attempts.
    pub reconnect_interval: Duration,
    /// Delay after open before buffers are cleared.
    pub settle: Duration,
}

impl LinkSettings {
    /// Build settings from a serial section of the line config.
    pub fn from_config(name: &str, port: &SerialPortConfig, line: &LineConfig) -> Self {
        Self {
            name: name.to_string(),
            keywords: port.keywords.clone(),
            baud_rate: port.baud_rate,
            read_timeout: port.read_timeout(),
            reconnect_interval: line.link.reconnect_interval(),
            settle: port.settle(),
        }
    }
}

/// One physical serial connection with lazy reconnection.
pub struct SerialLink {
    settings: LinkSettings,
    backend: Box<dyn PortBackend>,
    clock: SharedClock,
    /// Open port; `None` while disconnected. Never reused once dropped.
    handle: Option<Box<dyn LinePort>>,
    /// Device path of the open port.
    device: Option<String>,
    /// Clock time of the most recent connect attempt.
    last_attempt: Option<Duration>,
    /// Number of connect attempts made so far.
    attempts: u64,
}

impl SerialLink {
    /// Create a disconnected link. No port is touched until first use.
    pub fn new(settings: LinkSettings, backend: Box<dyn PortBackend>, clock: SharedClock) -> Self {
        Self {
            settings,
            backend,
            clock,
            handle: None,
            device: None,
            last_attempt: None,
            attempts: 0,
        }
    }

    /// Link name.
    pub fn name(&self) -> &str {
        &self.settings.name
    }

    /// Link settings.
    pub fn settings(&self) -> &LinkSettings {
        &self.settings
    }

    /// Shared clock used by this link.
    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    /// True while a port handle is held.
    pub fn is_connected(&self) -> bool {
        self.handle.is_some()
    }

    /// Device path of the open port, if any.
    pub fn device(&self) -> Option<&str> {
        self.device.as_deref()
    }

    /// Number of connect attempts made so far.
    pub fn connect_attempts(&self) -> u64 {
        self.attempts
    }

    /// Enumerate ports and open the first one matching a keyword.
    ///
    /// On success, pending input/output is discarded and the handle is
    /// stored. On failure the link stays disconnected. The attempt time is
    /// recorded either way.
    pub fn connect(&mut self) -> Result<(), LinkError> {
        self.drop_handle();
        self.last_attempt = Some(self.clock.now());
        self.attempts += 1;

        let ports = self.backend.list_ports()?;
        let Some(port) = select_port(&ports, &self.settings.keywords) else {
            debug!(
                "[{}] no port matches {:?} among {} ports",
                self.settings.name,
                self.settings.keywords,
                ports.len()
            );
            return Err(self.unavailable());
        };

        let mut handle = self.backend.open(
            &port.device,
            self.settings.baud_rate,
            self.settings.read_timeout,
        )?;

        if !self.settings.settle.is_zero() {
            self.clock.sleep(self.settings.settle);
        }
        handle.clear_buffers().map_err(|e| LinkError::OpenFailed {
            device: port.device.clone(),
            reason: e.to_string(),
        })?;

        info!(
            "[{}] connected on {} ({})",
            self.settings.name, port.device, port.description
        );
        self.handle = Some(handle);
        self.device = Some(port.device.clone());
        Ok(())
    }

    /// Make sure a handle is held, reconnecting at most once per interval.
    ///
    /// Returns true if the link is connected afterwards.
    pub fn ensure_connection(&mut self) -> bool {
        if self.handle.is_some() {
            return true;
        }

        let now = self.clock.now();
        let due = match self.last_attempt {
            None => true,
            Some(last) => now.saturating_sub(last) >= self.settings.reconnect_interval,
        };
        if !due {
            return false;
        }

        info!("[{}] reconnecting...", self.settings.name);
        match self.connect() {
            Ok(()) => true,
            Err(e) => {
                warn!("[{}] connect failed: {}", self.settings.name, e);
                false
            }
        }
    }

    /// Read one line, decoded permissively and trimmed.
    ///
    /// An empty string means the read timed out with no data.
    pub fn read_line(&mut self) -> Result<String, LinkError> {
        if !self.ensure_connection() {
            return Err(self.unavailable());
        }
        let Some(handle) = self.handle.as_mut() else {
            return Err(self.unavailable());
        };

        match handle.read_line() {
            Ok(bytes) => {
                let line = decode_permissive(&bytes).trim().to_string();
                if !line.is_empty() {
                    debug!("[{}<-] {}", self.settings.name, line);
                }
                Ok(line)
            }
            Err(e) => {
                warn!("[{}] read error: {}", self.settings.name, e);
                self.drop_handle();
                Err(self.io_error(e))
            }
        }
    }

    /// Write `payload` followed by a newline.
    pub fn write(&mut self, payload: &str) -> Result<(), LinkError> {
        if !self.ensure_connection() {
            return Err(self.unavailable());
        }
        let Some(handle) = self.handle.as_mut() else {
            return Err(self.unavailable());
        };

        let mut bytes = Vec::with_capacity(payload.len() + 1);
        bytes.extend_from_slice(payload.as_bytes());
        bytes.push(b'\n');

        match handle.write_all(&bytes) {
            Ok(()) => {
                debug!("[{}->] {}", self.settings.name, payload);
                Ok(())
            }
            Err(e) => {
                warn!("[{}] write error: {}", self.settings.name, e);
                self.drop_handle();
                Err(self.io_error(e))
            }
        }
    }

    /// Close the port. The next operation reconnects.
    pub fn disconnect(&mut self) {
        if self.handle.is_some() {
            info!("[{}] disconnected", self.settings.name);
        }
        self.drop_handle();
    }

    fn drop_handle(&mut self) {
        self.handle = None;
        self.device = None;
    }

    fn unavailable(&self) -> LinkError {
        LinkError::Unavailable {
            link: self.settings.name.clone(),
        }
    }

    fn io_error(&self, e: std::io::Error) -> LinkError {
        LinkError::Io {
            link: self.settings.name.clone(),
            reason: e.to_string(),
        }
    }
}

impl std::fmt::Debug for SerialLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialLink")
            .field("name", &self.settings.name)
            .field("backend", &self.backend.name())
            .field("device", &self.device)
            .field("last_attempt", &self.last_attempt)
            .finish()
    }
}

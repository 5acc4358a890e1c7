//! OS serial port backend built on the `serialport` crate.

use crate::error::LinkError;
use crate::port::{LinePort, PortBackend, PortInfo};
use serialport::{ClearBuffer, SerialPort, SerialPortType};
use sortline_common::clock::SharedClock;
use sortline_common::config::LineConfig;
use std::io::{self, Read, Write};
use std::time::{Duration, Instant};

const READ_CHUNK: usize = 256;

/// Backend over the ports the OS reports.
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialBackend;

impl SerialBackend {
    /// Create the backend.
    pub fn new() -> Self {
        Self
    }
}

/// Human-readable description for keyword matching.
///
/// USB adapters report product and manufacturer strings ("USB2.0-Serial",
/// "Silicon Labs", "STMicroelectronics"); other ports fall back to the
/// device name.
fn describe(info: &serialport::SerialPortInfo) -> String {
    match &info.port_type {
        SerialPortType::UsbPort(usb) => {
            let parts: Vec<&str> = [usb.product.as_deref(), usb.manufacturer.as_deref()]
                .into_iter()
                .flatten()
                .filter(|s| !s.is_empty())
                .collect();
            if parts.is_empty() {
                format!("{} ({:04x}:{:04x})", info.port_name, usb.vid, usb.pid)
            } else {
                parts.join(" - ")
            }
        }
        _ => info.port_name.clone(),
    }
}

impl PortBackend for SerialBackend {
    fn name(&self) -> &'static str {
        "serial"
    }

    fn list_ports(&self) -> Result<Vec<PortInfo>, LinkError> {
        let ports =
            serialport::available_ports().map_err(|e| LinkError::PortEnumeration(e.to_string()))?;
        Ok(ports
            .iter()
            .map(|p| PortInfo::new(p.port_name.clone(), describe(p)))
            .collect())
    }

    fn open(
        &self,
        device: &str,
        baud_rate: u32,
        read_timeout: Duration,
    ) -> Result<Box<dyn LinePort>, LinkError> {
        let port = serialport::new(device, baud_rate)
            .timeout(read_timeout)
            .open()
            .map_err(|e| LinkError::OpenFailed {
                device: device.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Box::new(SerialLinePort::new(port, read_timeout)))
    }
}

/// Line-buffered wrapper around an open OS port.
pub struct SerialLinePort {
    port: Box<dyn SerialPort>,
    read_timeout: Duration,
    /// Bytes received past the last returned line.
    pending: Vec<u8>,
}

impl SerialLinePort {
    fn new(port: Box<dyn SerialPort>, read_timeout: Duration) -> Self {
        Self {
            port,
            read_timeout,
            pending: Vec::new(),
        }
    }

    fn take_line(&mut self) -> Option<Vec<u8>> {
        let pos = self.pending.iter().position(|&b| b == b'\n')?;
        let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
        line.pop();
        Some(line)
    }
}

impl LinePort for SerialLinePort {
    fn read_line(&mut self) -> io::Result<Vec<u8>> {
        if let Some(line) = self.take_line() {
            return Ok(line);
        }

        // The port timeout bounds each read; the deadline bounds the line.
        let deadline = Instant::now() + self.read_timeout;
        let mut buf = [0u8; READ_CHUNK];
        loop {
            match self.port.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    self.pending.extend_from_slice(&buf[..n]);
                    if let Some(line) = self.take_line() {
                        return Ok(line);
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::TimedOut => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
            if Instant::now() >= deadline {
                break;
            }
        }

        // Timed out: hand back the partial line, like a blocking readline.
        Ok(std::mem::take(&mut self.pending))
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.port.write_all(bytes)?;
        self.port.flush()
    }

    fn clear_buffers(&mut self) -> io::Result<()> {
        self.pending.clear();
        self.port.clear(ClearBuffer::All).map_err(io::Error::from)
    }
}

/// Factory for the OS serial backend.
pub fn create_backend(_config: &LineConfig, _clock: SharedClock) -> Box<dyn PortBackend> {
    Box::new(SerialBackend::new())
}

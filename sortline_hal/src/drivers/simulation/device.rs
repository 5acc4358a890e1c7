//! Scripted peripheral device.
//!
//! A `ScriptedDevice` is a cheap, clonable handle onto the state of one
//! simulated peripheral. The backend hands out `ScriptedPort`s that read
//! from and write to this state, while tests (or a responder) queue the
//! lines the host will receive and inject faults.

use super::responder::Responder;
use crate::port::LinePort;
use parking_lot::Mutex;
use sortline_common::clock::SharedClock;
use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct DeviceState {
    /// Lines waiting to be read by the host (without terminator).
    rx: VecDeque<Vec<u8>>,
    /// Everything the host wrote, one entry per write call.
    written: Vec<String>,
    /// Firmware boot chatter, delivered on the first read after an open.
    boot_lines: Vec<String>,
    boot_pending: bool,
    responder: Option<Box<dyn Responder>>,
    /// Visible in port enumeration.
    hidden: bool,
    fail_open: bool,
    pending_read_failures: u32,
    pending_write_failures: u32,
    opens: u32,
    clears: u32,
}

/// Handle onto one simulated peripheral.
#[derive(Clone, Default)]
pub struct ScriptedDevice {
    state: Arc<Mutex<DeviceState>>,
}

impl ScriptedDevice {
    /// Create a silent, present device.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a device that answers writes through `responder`.
    pub fn with_responder(responder: impl Responder + 'static) -> Self {
        let device = Self::new();
        device.set_responder(responder);
        device
    }

    /// Replace the responder.
    pub fn set_responder(&self, responder: impl Responder + 'static) {
        self.state.lock().responder = Some(Box::new(responder));
    }

    /// Queue one line for the host to read.
    pub fn push_line(&self, line: impl Into<String>) {
        self.state.lock().rx.push_back(line.into().into_bytes());
    }

    /// Queue raw bytes (may be invalid UTF-8) as one line.
    pub fn push_bytes(&self, bytes: Vec<u8>) {
        self.state.lock().rx.push_back(bytes);
    }

    /// Lines the device prints after every open, once the host starts reading.
    pub fn set_boot_lines<I, S>(&self, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state.lock().boot_lines = lines.into_iter().map(Into::into).collect();
    }

    /// Unplug (`false`) or plug in (`true`) the device.
    pub fn set_present(&self, present: bool) {
        self.state.lock().hidden = !present;
    }

    /// True if the device shows up in enumeration.
    pub fn is_present(&self) -> bool {
        !self.state.lock().hidden
    }

    /// Make subsequent opens fail.
    pub fn set_fail_open(&self, fail: bool) {
        self.state.lock().fail_open = fail;
    }

    /// Make the next read on an open port fail with an I/O error.
    pub fn fail_next_read(&self) {
        self.state.lock().pending_read_failures += 1;
    }

    /// Make the next write on an open port fail with an I/O error.
    pub fn fail_next_write(&self) {
        self.state.lock().pending_write_failures += 1;
    }

    /// All writes received so far, including terminators.
    pub fn written(&self) -> Vec<String> {
        self.state.lock().written.clone()
    }

    /// Lines received so far, trimmed, one per command.
    pub fn commands(&self) -> Vec<String> {
        self.state
            .lock()
            .written
            .iter()
            .flat_map(|w| w.lines().map(str::trim).map(str::to_string).collect::<Vec<_>>())
            .filter(|l| !l.is_empty())
            .collect()
    }

    /// Forget recorded writes.
    pub fn clear_written(&self) {
        self.state.lock().written.clear();
    }

    /// Number of lines waiting to be read.
    pub fn pending_lines(&self) -> usize {
        self.state.lock().rx.len()
    }

    /// Number of successful opens.
    pub fn open_count(&self) -> u32 {
        self.state.lock().opens
    }

    /// Number of buffer clears requested by the host.
    pub fn clear_count(&self) -> u32 {
        self.state.lock().clears
    }

    /// Register an open; fails if the device is unplugged or set to fail.
    pub(crate) fn open(&self) -> io::Result<()> {
        let mut state = self.state.lock();
        if state.hidden {
            return Err(io::Error::new(io::ErrorKind::NotFound, "device unplugged"));
        }
        if state.fail_open {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "device busy",
            ));
        }
        state.opens += 1;
        state.boot_pending = !state.boot_lines.is_empty();
        Ok(())
    }
}

/// Open port onto a [`ScriptedDevice`].
pub struct ScriptedPort {
    device: ScriptedDevice,
    read_timeout: Duration,
    clock: Option<SharedClock>,
}

impl ScriptedPort {
    pub(crate) fn new(
        device: ScriptedDevice,
        read_timeout: Duration,
        clock: Option<SharedClock>,
    ) -> Self {
        Self {
            device,
            read_timeout,
            clock,
        }
    }
}

impl LinePort for ScriptedPort {
    fn read_line(&mut self) -> io::Result<Vec<u8>> {
        let next = {
            let mut state = self.device.state.lock();
            if state.hidden {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "device unplugged"));
            }
            if state.pending_read_failures > 0 {
                state.pending_read_failures -= 1;
                return Err(io::Error::new(io::ErrorKind::Other, "injected read failure"));
            }
            if state.boot_pending {
                state.boot_pending = false;
                let boot: Vec<Vec<u8>> = state
                    .boot_lines
                    .iter()
                    .map(|l| l.clone().into_bytes())
                    .collect();
                state.rx.extend(boot);
            }
            state.rx.pop_front()
        };

        match next {
            Some(line) => Ok(line),
            None => {
                // Idle line: a real port blocks until its timeout expires.
                if let Some(clock) = &self.clock {
                    clock.sleep(self.read_timeout);
                }
                Ok(Vec::new())
            }
        }
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        let mut state = self.device.state.lock();
        if state.hidden {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "device unplugged"));
        }
        if state.pending_write_failures > 0 {
            state.pending_write_failures -= 1;
            return Err(io::Error::new(io::ErrorKind::Other, "injected write failure"));
        }

        let text = crate::port::decode_permissive(bytes);
        state.written.push(text.clone());

        let mut replies = Vec::new();
        if let Some(responder) = state.responder.as_mut() {
            for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
                replies.extend(responder.respond(line));
            }
        }
        state.rx.extend(replies.into_iter().map(String::into_bytes));
        Ok(())
    }

    fn clear_buffers(&mut self) -> io::Result<()> {
        let mut state = self.device.state.lock();
        state.rx.clear();
        state.clears += 1;
        Ok(())
    }
}

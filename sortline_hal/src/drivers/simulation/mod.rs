//! Simulation port backend.
//!
//! Serves scripted devices instead of OS ports. Used by the test suites and
//! by `--simulate` to run the whole line without hardware.

mod device;
mod responder;

pub use device::{ScriptedDevice, ScriptedPort};
pub use responder::{MotionControllerResponder, Responder, RfidBridgeResponder};

use crate::error::LinkError;
use crate::port::{LinePort, PortBackend, PortInfo};
use sortline_common::clock::SharedClock;
use sortline_common::config::LineConfig;
use std::time::Duration;
use tracing::debug;

/// Device path of the simulated RFID bridge.
pub const SIM_RFID_DEVICE: &str = "/sim/ttyUSB0";
/// Device path of the simulated motion controller.
pub const SIM_MOTION_DEVICE: &str = "/sim/ttyACM0";

/// Backend serving a fixed set of [`ScriptedDevice`]s.
#[derive(Default)]
pub struct SimulationBackend {
    devices: Vec<(PortInfo, ScriptedDevice)>,
    /// When set, idle reads sleep on this clock for the read timeout.
    clock: Option<SharedClock>,
}

impl SimulationBackend {
    /// Backend with no devices whose idle reads return immediately.
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend whose idle reads block on `clock` like a real port.
    pub fn with_clock(clock: SharedClock) -> Self {
        Self {
            devices: Vec::new(),
            clock: Some(clock),
        }
    }

    /// Plug a device in under `device` with the given description.
    pub fn attach(&mut self, device: &str, description: &str, handle: ScriptedDevice) {
        self.devices.push((PortInfo::new(device, description), handle));
    }

    /// Handle of an attached device.
    pub fn device(&self, device: &str) -> Option<&ScriptedDevice> {
        self.devices
            .iter()
            .find(|(info, _)| info.device == device)
            .map(|(_, handle)| handle)
    }
}

impl PortBackend for SimulationBackend {
    fn name(&self) -> &'static str {
        "simulation"
    }

    fn list_ports(&self) -> Result<Vec<PortInfo>, LinkError> {
        Ok(self
            .devices
            .iter()
            .filter(|(_, handle)| handle.is_present())
            .map(|(info, _)| info.clone())
            .collect())
    }

    fn open(
        &self,
        device: &str,
        _baud_rate: u32,
        read_timeout: Duration,
    ) -> Result<Box<dyn LinePort>, LinkError> {
        let handle = self
            .device(device)
            .ok_or_else(|| LinkError::OpenFailed {
                device: device.to_string(),
                reason: "no such device".to_string(),
            })?;
        handle.open().map_err(|e| LinkError::OpenFailed {
            device: device.to_string(),
            reason: e.to_string(),
        })?;
        debug!("simulation: opened {}", device);
        Ok(Box::new(ScriptedPort::new(
            handle.clone(),
            read_timeout,
            self.clock.clone(),
        )))
    }
}

/// Simulated line: an RFID bridge and a motion controller.
///
/// The bridge reports the tags from the `[simulation]` config section;
/// the controller acknowledges every command after a short boot banner.
pub fn create_backend(config: &LineConfig, clock: SharedClock) -> Box<dyn PortBackend> {
    let mut backend = SimulationBackend::with_clock(clock);

    let bridge = ScriptedDevice::with_responder(RfidBridgeResponder::with_tags(
        config.simulation.tags.clone(),
    ));
    backend.attach(SIM_RFID_DEVICE, "Simulated CH340 RFID bridge", bridge);

    let controller = ScriptedDevice::with_responder(MotionControllerResponder::new());
    controller.set_boot_lines(["start", "echo:Marlin simulated", "echo:SD card ok"]);
    backend.attach(
        SIM_MOTION_DEVICE,
        "Simulated BIGTREETECH SKR (Marlin)",
        controller,
    );

    Box::new(backend)
}

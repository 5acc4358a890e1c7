//! Link protocol integration tests.
//!
//! Verifies, against simulated devices and a manual clock:
//! 1. Reconnect attempts are rate-limited while a device is missing.
//! 2. RFID request/response parsing over a live link.
//! 3. Motion acks, ack timeouts and boot chatter draining.

use sortline_common::clock::{Clock, ManualClock};
use sortline_common::config::LineConfig;
use sortline_hal::drivers::simulation::{
    MotionControllerResponder, RfidBridgeResponder, ScriptedDevice, SimulationBackend,
};
use sortline_hal::{Checkpoint, LinkError, LinkSettings, MotionLink, RfidLink, SerialLink, TagReading};
use std::sync::Arc;
use std::time::Duration;

// ─── Helpers ────────────────────────────────────────────────────────

fn backend_with(
    clock: &Arc<ManualClock>,
    device: &str,
    description: &str,
    handle: &ScriptedDevice,
) -> SimulationBackend {
    let mut backend = SimulationBackend::with_clock(clock.clone());
    backend.attach(device, description, handle.clone());
    backend
}

fn rfid_link(clock: &Arc<ManualClock>, device: &ScriptedDevice) -> RfidLink {
    let backend = backend_with(clock, "/dev/ttyUSB0", "USB2.0-Serial CH340", device);
    RfidLink::from_config(&LineConfig::default(), Box::new(backend), clock.clone())
}

fn motion_link(clock: &Arc<ManualClock>, device: &ScriptedDevice) -> MotionLink {
    let backend = backend_with(clock, "/dev/ttyACM0", "BIGTREETECH SKR Marlin", device);
    MotionLink::from_config(&LineConfig::default(), Box::new(backend), clock.clone())
}

/// Connect the motion link and return the time right after the settle delay.
fn connected(clock: &Arc<ManualClock>, motion: &mut MotionLink) -> Duration {
    assert!(motion.link_mut().ensure_connection());
    clock.now()
}

// ─── Test 1: reconnect rate limiting ───────────────────────────────

#[test]
fn test_reconnect_is_rate_limited_while_port_missing() {
    let clock = ManualClock::shared();
    let device = ScriptedDevice::new();
    device.set_present(false);

    let config = LineConfig::default();
    let settings = LinkSettings::from_config("rfid", &config.rfid, &config);
    let backend = backend_with(&clock, "/dev/ttyUSB0", "USB CH340", &device);
    let mut link = SerialLink::new(settings, Box::new(backend), clock.clone());

    assert!(matches!(link.connect(), Err(LinkError::Unavailable { .. })));
    assert_eq!(link.connect_attempts(), 1);

    clock.advance_secs(2.0);
    assert!(!link.ensure_connection());
    assert_eq!(link.connect_attempts(), 1, "no attempt inside the 5s window");

    clock.advance_secs(4.0);
    assert!(!link.ensure_connection());
    assert_eq!(link.connect_attempts(), 2, "new attempt 6s after the first");

    // Repeated calls inside the new window stay quiet.
    for _ in 0..10 {
        assert!(!link.ensure_connection());
    }
    assert_eq!(link.connect_attempts(), 2);

    device.set_present(true);
    clock.advance_secs(5.0);
    assert!(link.ensure_connection());
    assert_eq!(link.connect_attempts(), 3);
    assert_eq!(device.open_count(), 1);
    assert_eq!(device.clear_count(), 1);
}

#[test]
fn test_ports_without_matching_keyword_are_ignored() {
    let clock = ManualClock::shared();
    let device = ScriptedDevice::new();
    let mut rfid = {
        let backend = backend_with(&clock, "/dev/ttyS0", "ttyS0", &device);
        RfidLink::from_config(&LineConfig::default(), Box::new(backend), clock.clone())
    };

    assert!(!rfid.link_mut().ensure_connection());
    assert_eq!(device.open_count(), 0);
}

// ─── Test 2: RFID protocol ─────────────────────────────────────────

#[test]
fn test_read_tag_from_bridge() {
    let clock = ManualClock::shared();
    let mut bridge = RfidBridgeResponder::new();
    bridge.set_tag("TAG1", "ABC123");
    let device = ScriptedDevice::with_responder(bridge);
    let mut rfid = rfid_link(&clock, &device);

    assert_eq!(rfid.read_tag("TAG1"), Some("ABC123".to_string()));
    assert_eq!(rfid.read_tag("TAG3"), Some("empty".to_string()));
    assert_eq!(
        rfid.read_checkpoint(Checkpoint::Entry),
        Some(TagReading::Tag("ABC123".to_string()))
    );
    assert_eq!(rfid.read_checkpoint(Checkpoint::Exit), Some(TagReading::Empty));
    assert_eq!(device.written()[0], "scan TAG1\n");
}

#[test]
fn test_mismatched_label_yields_nothing() {
    let clock = ManualClock::shared();
    let device = ScriptedDevice::new();
    let mut rfid = rfid_link(&clock, &device);
    assert!(rfid.link_mut().ensure_connection());

    device.push_line("TAG2:XYZ");
    assert_eq!(rfid.read_tag("TAG1"), None);

    device.push_line("garbage");
    assert_eq!(rfid.read_tag("TAG1"), None);

    device.push_line("TAG1:");
    assert_eq!(rfid.read_tag("TAG1"), None);

    // Timed out read.
    assert_eq!(rfid.read_tag("TAG1"), None);
    assert!(rfid.link().is_connected());
}

#[test]
fn test_read_tag_without_port_is_absent() {
    let clock = ManualClock::shared();
    let device = ScriptedDevice::new();
    device.set_present(false);
    let mut rfid = rfid_link(&clock, &device);

    assert_eq!(rfid.read_tag("TAG1"), None);
    assert_eq!(rfid.read_checkpoint(Checkpoint::Exit), None);
}

// ─── Test 3: motion protocol ───────────────────────────────────────

#[test]
fn test_send_command_acknowledged() {
    let clock = ManualClock::shared();
    let device = ScriptedDevice::with_responder(MotionControllerResponder::with_chatter([
        "echo:busy: processing",
        "ok T:21.3 /0.0",
    ]));
    let mut motion = motion_link(&clock, &device);
    let t0 = connected(&clock, &mut motion);

    assert_eq!(motion.send_command("G1 X250 F3000"), Ok(()));
    assert_eq!(clock.now(), t0, "ack arrived without waiting");
    assert_eq!(device.commands(), vec!["G1 X250 F3000".to_string()]);
}

#[test]
fn test_send_command_times_out_without_ack() {
    let clock = ManualClock::shared();
    let device = ScriptedDevice::new();
    let mut motion = motion_link(&clock, &device);
    let t0 = connected(&clock, &mut motion);

    let result = motion.send_command("G1 Y360 F1200");
    assert!(matches!(result, Err(LinkError::AckTimeout { .. })));
    assert_eq!(clock.now() - t0, Duration::from_secs(3));
}

#[test]
fn test_dropped_read_waits_out_timeout() {
    let clock = ManualClock::shared();
    let device = ScriptedDevice::new();
    let mut motion = motion_link(&clock, &device);
    let t0 = connected(&clock, &mut motion);

    device.fail_next_read();
    device.push_line("ok");
    let result = motion.send_command("G91");
    assert!(matches!(result, Err(LinkError::AckTimeout { .. })));
    assert!(clock.now() - t0 >= Duration::from_secs(3));
    assert!(!motion.link().is_connected());
}

#[test]
fn test_write_failure_returns_immediately() {
    let clock = ManualClock::shared();
    let device = ScriptedDevice::with_responder(MotionControllerResponder::new());
    let mut motion = motion_link(&clock, &device);
    let t0 = connected(&clock, &mut motion);

    device.fail_next_write();
    assert!(matches!(motion.send_command("G91"), Err(LinkError::Io { .. })));
    assert_eq!(clock.now(), t0);
}

#[test]
fn test_fire_and_forget_skips_ack_wait() {
    let clock = ManualClock::shared();
    let device = ScriptedDevice::new();
    let mut motion = motion_link(&clock, &device);
    let t0 = connected(&clock, &mut motion);

    assert_eq!(
        motion.send_command_with("M84", false, Duration::from_secs(3)),
        Ok(())
    );
    assert_eq!(clock.now(), t0);
    assert_eq!(device.commands(), vec!["M84".to_string()]);
}

#[test]
fn test_run_script_counts_acks() {
    let clock = ManualClock::shared();
    let device = ScriptedDevice::with_responder(MotionControllerResponder::new());
    let mut motion = motion_link(&clock, &device);

    let script = ["M92 X80 Y80", "G91"];
    assert_eq!(motion.run_script(&script), 2);
    assert_eq!(device.commands(), vec!["M92 X80 Y80".to_string(), "G91".to_string()]);
}

#[test]
fn test_flush_drains_boot_chatter() {
    let clock = ManualClock::shared();
    let device = ScriptedDevice::with_responder(MotionControllerResponder::new());
    device.set_boot_lines(["start", "echo:Marlin 2.1.2", "echo:SD init fail"]);
    let mut motion = motion_link(&clock, &device);
    connected(&clock, &mut motion);

    let drained = motion.flush_until_idle(Duration::from_millis(200), Duration::from_secs(2));
    assert_eq!(drained, 3);
    assert_eq!(device.pending_lines(), 0);

    // The next command sees its own ack, not boot noise.
    assert_eq!(motion.send_command("G91"), Ok(()));
}

#[test]
fn test_flush_on_silent_controller_returns_after_idle_window() {
    let clock = ManualClock::shared();
    let device = ScriptedDevice::new();
    let mut motion = motion_link(&clock, &device);
    let t0 = connected(&clock, &mut motion);

    assert_eq!(
        motion.flush_until_idle(Duration::from_millis(200), Duration::from_secs(2)),
        0
    );
    assert!(clock.now() - t0 <= Duration::from_secs(2));
}

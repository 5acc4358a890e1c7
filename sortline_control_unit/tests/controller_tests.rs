//! Sorting controller integration tests.
//!
//! Drives the controller over simulated RFID bridge and motion controller
//! devices with a manual clock, so 30-second dwells run instantly.

use sortline_common::clock::{Clock, ManualClock};
use sortline_common::config::LineConfig;
use sortline_common::snapshot::StateSnapshot;
use sortline_control_unit::{CycleRunner, SortState, SortingController};
use sortline_hal::drivers::simulation::{
    MotionControllerResponder, RfidBridgeResponder, ScriptedDevice, SimulationBackend,
};
use sortline_hal::{MotionLink, RfidLink};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

// ─── Helpers ────────────────────────────────────────────────────────

struct Line {
    clock: Arc<ManualClock>,
    bridge: ScriptedDevice,
    motion: ScriptedDevice,
    controller: SortingController,
}

impl Line {
    /// Line whose motion controller acks every command (or none if `acks` is false).
    fn new(acks: bool) -> Self {
        let clock = ManualClock::shared();
        let config = LineConfig::default();

        let bridge = ScriptedDevice::with_responder(RfidBridgeResponder::new());
        let mut rfid_backend = SimulationBackend::with_clock(clock.clone());
        rfid_backend.attach("/dev/ttyUSB0", "USB2.0-Serial CH340", bridge.clone());

        let motion = if acks {
            ScriptedDevice::with_responder(MotionControllerResponder::new())
        } else {
            ScriptedDevice::new()
        };
        let mut motion_backend = SimulationBackend::with_clock(clock.clone());
        motion_backend.attach("/dev/ttyACM0", "BIGTREETECH SKR Marlin", motion.clone());

        let rfid = RfidLink::from_config(&config, Box::new(rfid_backend), clock.clone());
        let motion_link = MotionLink::from_config(&config, Box::new(motion_backend), clock.clone());
        let controller = SortingController::from_config(&config, rfid, motion_link, clock.clone());

        Self {
            clock,
            bridge,
            motion,
            controller,
        }
    }

    /// Put tags in front of the readers; unlisted readers report `empty`.
    fn tags(&self, tags: &[(&str, &str)]) {
        let table: BTreeMap<String, String> = tags
            .iter()
            .map(|(label, id)| (label.to_string(), id.to_string()))
            .collect();
        self.bridge
            .set_responder(RfidBridgeResponder::with_tags(table));
    }

    fn tick(&mut self) -> SortState {
        self.controller.tick()
    }

    fn tick_after(&mut self, ms: u64) -> SortState {
        self.clock.advance(Duration::from_millis(ms));
        self.controller.tick()
    }

    /// Drive a fresh line with object `id` up to `AwaitPickup`.
    fn run_to_pickup(&mut self, id: &str) {
        self.tags(&[("TAG1", id)]);
        assert_eq!(self.tick(), SortState::EntryAck);
        self.tags(&[]);
        assert_eq!(self.tick_after(5_000), SortState::MoveToCenter);
        assert_eq!(self.tick(), SortState::MoveToCenter);
        assert_eq!(self.tick_after(7_000), SortState::Centered);
        assert_eq!(self.tick_after(2_000), SortState::Scanning);
        assert_eq!(self.tick(), SortState::Scanning);
        assert_eq!(self.tick_after(30_000), SortState::ScanDone);
        assert_eq!(self.tick_after(22_000), SortState::MoveToEnd);
        self.tags(&[("TAG3", id)]);
        assert_eq!(self.tick(), SortState::AwaitPickup);
    }
}

// ─── Scenario A: entry tag ─────────────────────────────────────────

#[test]
fn test_entry_tag_starts_cycle() {
    let mut line = Line::new(true);
    line.tags(&[("TAG1", "ABC123")]);

    assert_eq!(line.tick(), SortState::EntryAck);
    assert_eq!(line.controller.tag1(), Some("ABC123"));
    assert_eq!(line.controller.latest_tag(), Some("ABC123"));
    assert_eq!(
        line.controller.snapshot(),
        StateSnapshot {
            state: "state1_1".to_string(),
            tag: Some("ABC123".to_string()),
        }
    );

    // Axis configuration was sent on entry, before the first scan.
    let commands = line.motion.commands();
    assert_eq!(commands.len(), LineConfig::default().script.axis_setup.len());
    assert_eq!(commands.last().map(String::as_str), Some("G91"));
}

#[test]
fn test_empty_entry_reader_keeps_waiting() {
    let mut line = Line::new(true);

    for _ in 0..5 {
        assert_eq!(line.tick_after(300), SortState::AwaitEntry);
    }
    assert_eq!(line.controller.tag1(), None);
    assert_eq!(line.controller.snapshot(), StateSnapshot::new("state1"));

    // Axis configuration is sent once, not every tick.
    assert_eq!(
        line.motion.commands().len(),
        LineConfig::default().script.axis_setup.len()
    );
}

// ─── Scenario B: dwell timer ───────────────────────────────────────

#[test]
fn test_entry_ack_leaves_after_five_seconds() {
    let mut line = Line::new(true);
    line.tags(&[("TAG1", "ABC123")]);
    assert_eq!(line.tick(), SortState::EntryAck);

    assert_eq!(line.tick_after(4_900), SortState::EntryAck);
    assert_eq!(line.tick_after(100), SortState::MoveToCenter);
    assert_eq!(line.controller.snapshot().state, "state2");
}

#[test]
fn test_move_commands_issued_once_on_entry() {
    let mut line = Line::new(true);
    line.tags(&[("TAG1", "ABC123")]);
    line.tick();
    line.tags(&[]);
    line.tick_after(5_000);
    line.motion.clear_written();

    assert_eq!(line.tick(), SortState::MoveToCenter);
    assert_eq!(line.tick_after(300), SortState::MoveToCenter);
    assert_eq!(line.motion.commands(), vec!["G1 X250 F3000".to_string()]);
}

#[test]
fn test_center_checkpoint_is_not_polled() {
    let mut line = Line::new(true);
    line.tags(&[("TAG1", "ABC123")]);
    line.tick();
    line.tags(&[("TAG2", "ABC123")]);
    assert_eq!(line.tick_after(5_000), SortState::MoveToCenter);

    assert_eq!(line.tick_after(1_000), SortState::MoveToCenter);
    assert_eq!(line.controller.tag2(), None);
    assert_eq!(line.tick_after(6_000), SortState::Centered);
}

// ─── Scenario C: scan proceeds without acks ────────────────────────

#[test]
fn test_scanning_ends_on_time_without_acks() {
    let mut line = Line::new(false);
    line.tags(&[("TAG1", "ABC123")]);

    // Every axis setup command waits out its ack timeout.
    assert_eq!(line.tick(), SortState::EntryAck);
    line.tags(&[]);
    assert_eq!(line.tick_after(5_000), SortState::MoveToCenter);
    assert_eq!(line.tick_after(7_000), SortState::Centered);
    assert_eq!(line.tick_after(2_000), SortState::Scanning);

    let entered = line.controller.machine().state_since();
    line.motion.clear_written();
    assert_eq!(line.tick(), SortState::Scanning);

    // Both spin commands were sent and each waited out its 3s timeout.
    assert_eq!(
        line.motion.commands(),
        vec!["G1 Y360 F1200".to_string(), "G1 Y-360 F1200".to_string()]
    );
    assert_eq!(line.clock.now() - entered, Duration::from_secs(6));

    // The dwell counts from the transition, not from the last ack wait.
    assert_eq!(line.tick_after(23_900), SortState::Scanning);
    assert_eq!(line.tick_after(100), SortState::ScanDone);
}

// ─── Scenario D: pickup ────────────────────────────────────────────

#[test]
fn test_pickup_detected_when_exit_reader_empties() {
    let mut line = Line::new(true);
    line.run_to_pickup("ABC123");
    assert_eq!(line.controller.tag3(), Some("ABC123"));

    // Object still there.
    assert_eq!(line.tick_after(10_000), SortState::AwaitPickup);

    line.tags(&[]);
    assert_eq!(line.tick(), SortState::AwaitReset);
    assert_eq!(line.controller.snapshot().state, "state7");
}

#[test]
fn test_pickup_waits_while_bridge_is_missing() {
    let mut line = Line::new(true);
    line.run_to_pickup("ABC123");

    line.bridge.set_present(false);
    for _ in 0..10 {
        assert_eq!(line.tick_after(1_000), SortState::AwaitPickup);
    }
}

// ─── Move to end: tag or timeout ───────────────────────────────────

#[test]
fn test_move_to_end_times_out_without_exit_tag() {
    let mut line = Line::new(true);
    line.tags(&[("TAG1", "ABC123")]);
    line.tick();
    line.tags(&[]);
    line.tick_after(5_000);
    line.tick_after(7_000);
    line.tick_after(2_000);
    line.tick_after(30_000);
    assert_eq!(line.tick_after(22_000), SortState::MoveToEnd);

    assert_eq!(line.tick_after(6_900), SortState::MoveToEnd);
    assert_eq!(line.tick_after(100), SortState::AwaitPickup);
    assert_eq!(line.controller.tag3(), None);
    assert_eq!(line.controller.latest_tag(), Some("ABC123"));
}

#[test]
fn test_exit_tag_wins_over_timeout() {
    let mut line = Line::new(true);
    line.tags(&[("TAG1", "ABC123")]);
    line.tick();
    line.tags(&[]);
    line.tick_after(5_000);
    line.tick_after(7_000);
    line.tick_after(2_000);
    line.tick_after(30_000);
    line.tick_after(22_000);
    assert_eq!(line.tick(), SortState::MoveToEnd);

    line.tags(&[("TAG3", "XYZ789")]);
    assert_eq!(line.tick_after(8_000), SortState::AwaitPickup);
    assert_eq!(line.controller.tag3(), Some("XYZ789"));
    assert_eq!(line.controller.latest_tag(), Some("XYZ789"));
}

// ─── Reset ─────────────────────────────────────────────────────────

#[test]
fn test_reset_after_timeout_clears_values() {
    let mut line = Line::new(true);
    line.run_to_pickup("ABC123");
    line.tags(&[]);
    assert_eq!(line.tick(), SortState::AwaitReset);

    assert_eq!(line.tick_after(4_000), SortState::AwaitReset);
    assert_eq!(line.tick_after(1_000), SortState::AwaitEntry);
    assert_eq!(line.controller.tag1(), None);
    assert_eq!(line.controller.tag3(), None);
    assert_eq!(line.controller.latest_tag(), None);
    assert_eq!(line.controller.completed_cycles(), 1);
    assert_eq!(line.controller.snapshot(), StateSnapshot::new("state1"));

    // Axis configuration is sent again for the next object.
    line.motion.clear_written();
    assert_eq!(line.tick(), SortState::AwaitEntry);
    assert_eq!(line.motion.commands()[0], "M92 X80 Y80");
}

#[test]
fn test_new_object_at_entry_skips_reset_wait() {
    let mut line = Line::new(true);
    line.run_to_pickup("ABC123");
    line.tags(&[]);
    assert_eq!(line.tick(), SortState::AwaitReset);

    line.tags(&[("TAG1", "NEXT01")]);
    assert_eq!(line.tick_after(300), SortState::AwaitEntry);
    assert_eq!(line.controller.latest_tag(), None);

    assert_eq!(line.tick(), SortState::EntryAck);
    assert_eq!(line.controller.tag1(), Some("NEXT01"));
}

// ─── Cycle runner ──────────────────────────────────────────────────

#[test]
fn test_step_publishes_snapshot() {
    let line = Line::new(true);
    line.tags(&[("TAG1", "ABC123")]);
    let mut runner = CycleRunner::new(
        line.controller,
        line.clock.clone(),
        Duration::from_millis(300),
    );
    let mut rx = runner.subscribe();
    assert_eq!(rx.borrow_and_update().state, "state1");

    assert_eq!(runner.step(), SortState::EntryAck);
    assert!(rx.has_changed().unwrap());
    assert_eq!(
        *rx.borrow_and_update(),
        StateSnapshot {
            state: "state1_1".to_string(),
            tag: Some("ABC123".to_string()),
        }
    );
    assert_eq!(runner.stats().tick_count, 1);
    assert_eq!(runner.stats().transitions, 1);

    // No change, no notification.
    assert_eq!(runner.step(), SortState::EntryAck);
    assert!(!rx.has_changed().unwrap());
}

#[test]
fn test_runner_thread_stops_on_request() {
    let line = Line::new(true);
    // Object never leaves the exit reader, so the line parks in AwaitPickup.
    line.tags(&[("TAG1", "ABC123"), ("TAG3", "ABC123")]);
    let clock = line.clock.clone();
    let runner = CycleRunner::new(line.controller, clock.clone(), Duration::from_millis(300));
    let rx = runner.subscribe();
    let stop = runner.stop_handle();

    let handle = runner.spawn().expect("spawn cycle thread");
    let deadline = Instant::now() + Duration::from_secs(10);
    while rx.borrow().state != "state6" && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(1));
    }
    stop.stop();
    let runner = handle.join().expect("cycle thread panicked");

    assert!(!stop.is_running());
    assert_eq!(runner.controller().state(), SortState::AwaitPickup);
    assert_eq!(runner.controller().tag3(), Some("ABC123"));
    assert!(runner.stats().tick_count > 1);
    // Manual time covered every dwell on the way to pickup.
    assert!(clock.now() >= Duration::from_secs(66));
}

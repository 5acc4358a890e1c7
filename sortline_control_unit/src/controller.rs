//! Sorting line controller.
//!
//! Drives one object at a time through the line. Each [`tick`] runs the
//! handler of the current state to completion; a handler may poll a
//! checkpoint, issue a motion script on entry, and request at most one
//! transition.
//!
//! Motion scripts are fire-and-forget relative to the state timing: a
//! missing ack is logged and the dwell timer alone decides when the state
//! ends.
//!
//! [`tick`]: SortingController::tick

use crate::state::machine::TimedStateMachine;
use crate::state::sorting::SortState;
use sortline_common::clock::SharedClock;
use sortline_common::config::{LineConfig, MotionScript, StageTimings};
use sortline_common::snapshot::StateSnapshot;
use sortline_hal::rfid::{Checkpoint, TagReading};
use sortline_hal::{MotionLink, RfidLink};
use std::time::Duration;
use tracing::{debug, info};

/// State handler; returns the requested next state, if any.
type Handler = fn(&mut SortingController) -> Option<SortState>;

/// Explicit state → handler table.
fn handler_for(state: SortState) -> Handler {
    match state {
        SortState::AwaitEntry => SortingController::await_entry,
        SortState::EntryAck => SortingController::entry_ack,
        SortState::MoveToCenter => SortingController::move_to_center,
        SortState::Centered => SortingController::centered,
        SortState::Scanning => SortingController::scanning,
        SortState::ScanDone => SortingController::scan_done,
        SortState::MoveToEnd => SortingController::move_to_end,
        SortState::AwaitPickup => SortingController::await_pickup,
        SortState::AwaitReset => SortingController::await_reset,
    }
}

/// Domain state machine bound to one RFID link and one motion link.
#[derive(Debug)]
pub struct SortingController {
    machine: TimedStateMachine<SortState>,
    rfid: RfidLink,
    motion: MotionLink,
    timing: StageTimings,
    script: MotionScript,
    tag1: Option<String>,
    /// Center checkpoint value. Kept and cleared with the others, but no
    /// transition reads checkpoint 2.
    tag2: Option<String>,
    tag3: Option<String>,
    latest_tag: Option<String>,
    completed_cycles: u64,
    /// Idle window and upper bound of the one-time motion boot drain.
    boot_drain: Option<(Duration, Duration)>,
}

impl SortingController {
    /// Create a controller in `AwaitEntry` with its entry action pending.
    pub fn new(
        rfid: RfidLink,
        motion: MotionLink,
        clock: SharedClock,
        timing: StageTimings,
        script: MotionScript,
    ) -> Self {
        Self {
            machine: TimedStateMachine::new(SortState::AwaitEntry, clock),
            rfid,
            motion,
            timing,
            script,
            tag1: None,
            tag2: None,
            tag3: None,
            latest_tag: None,
            completed_cycles: 0,
            boot_drain: None,
        }
    }

    /// Drain motion boot chatter once, before the first tick.
    pub fn with_boot_drain(mut self, idle: Duration, max_wait: Duration) -> Self {
        self.boot_drain = Some((idle, max_wait));
        self
    }

    /// Create a controller using the `[timing]`, `[script]` and
    /// `[motion_ack]` sections.
    pub fn from_config(
        config: &LineConfig,
        rfid: RfidLink,
        motion: MotionLink,
        clock: SharedClock,
    ) -> Self {
        Self::new(
            rfid,
            motion,
            clock,
            config.timing.clone(),
            config.script.clone(),
        )
        .with_boot_drain(config.motion_ack.flush_idle(), config.motion_ack.flush_max())
    }

    /// Run the pending boot drain, if any. Blocks for at most its upper
    /// bound and only ever runs once.
    ///
    /// Returns the number of lines discarded.
    pub fn drain_motion_boot(&mut self) -> usize {
        match self.boot_drain.take() {
            Some((idle, max_wait)) => self.motion.flush_until_idle(idle, max_wait),
            None => 0,
        }
    }

    /// Run the current state's handler once.
    ///
    /// Returns the state after the tick.
    pub fn tick(&mut self) -> SortState {
        let state = self.machine.state();
        if let Some(next) = handler_for(state)(self) {
            info!("{} -> {}", state, next);
            self.machine.transition(next);
        }
        self.machine.state()
    }

    /// Current `{state, tag}` pair. Never touches a link.
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            state: self.machine.state().wire_id().to_string(),
            tag: self.latest_tag.clone(),
        }
    }

    /// Clear all per-object values.
    pub fn reset_values(&mut self) {
        self.tag1 = None;
        self.tag2 = None;
        self.tag3 = None;
        self.latest_tag = None;
    }

    /// Current state.
    pub fn state(&self) -> SortState {
        self.machine.state()
    }

    /// Timed state engine.
    pub fn machine(&self) -> &TimedStateMachine<SortState> {
        &self.machine
    }

    /// Value read at the entry checkpoint this cycle.
    pub fn tag1(&self) -> Option<&str> {
        self.tag1.as_deref()
    }

    /// Value read at the center checkpoint this cycle.
    pub fn tag2(&self) -> Option<&str> {
        self.tag2.as_deref()
    }

    /// Value read at the exit checkpoint this cycle.
    pub fn tag3(&self) -> Option<&str> {
        self.tag3.as_deref()
    }

    /// Most recent value read at any checkpoint.
    pub fn latest_tag(&self) -> Option<&str> {
        self.latest_tag.as_deref()
    }

    /// Number of objects that went all the way through.
    pub fn completed_cycles(&self) -> u64 {
        self.completed_cycles
    }

    /// RFID link.
    pub fn rfid(&self) -> &RfidLink {
        &self.rfid
    }

    /// Motion link.
    pub fn motion(&self) -> &MotionLink {
        &self.motion
    }


    // ─── Helpers ────────────────────────────────────────────────────

    fn dwell_elapsed(&self) -> bool {
        match self.machine.state().dwell(&self.timing) {
            Some(dwell) => self.machine.elapsed() >= dwell,
            None => false,
        }
    }

    fn record(&mut self, checkpoint: Checkpoint, id: String) {
        info!("tag {} at {}", id, checkpoint);
        let slot = match checkpoint {
            Checkpoint::Entry => &mut self.tag1,
            Checkpoint::Center => &mut self.tag2,
            Checkpoint::Exit => &mut self.tag3,
        };
        *slot = Some(id.clone());
        self.latest_tag = Some(id);
    }

    fn announce(&mut self, what: &str) -> bool {
        let entered = self.machine.on_enter();
        if entered {
            info!("entered {}: {}", self.machine.state(), what);
        }
        entered
    }

    // ─── State handlers ─────────────────────────────────────────────

    fn await_entry(&mut self) -> Option<SortState> {
        if self.announce("waiting for an object at the entry") {
            let acked = self.motion.run_script(&self.script.axis_setup);
            debug!("{}/{} commands acknowledged", acked, self.script.axis_setup.len());
        }
        match self.rfid.read_checkpoint(Checkpoint::Entry) {
            Some(TagReading::Tag(id)) => {
                self.record(Checkpoint::Entry, id);
                Some(SortState::EntryAck)
            }
            _ => None,
        }
    }

    fn entry_ack(&mut self) -> Option<SortState> {
        self.announce("showing incoming object");
        self.dwell_elapsed().then_some(SortState::MoveToCenter)
    }

    fn move_to_center(&mut self) -> Option<SortState> {
        if self.announce("moving object to the camera") {
            let acked = self.motion.run_script(&self.script.move_to_center);
            debug!("{}/{} commands acknowledged", acked, self.script.move_to_center.len());
        }
        self.dwell_elapsed().then_some(SortState::Centered)
    }

    fn centered(&mut self) -> Option<SortState> {
        self.announce("object settling under the camera");
        self.dwell_elapsed().then_some(SortState::Scanning)
    }

    fn scanning(&mut self) -> Option<SortState> {
        if self.announce("spinning camera") {
            let acked = self.motion.run_script(&self.script.scan);
            debug!("{}/{} commands acknowledged", acked, self.script.scan.len());
        }
        self.dwell_elapsed().then_some(SortState::ScanDone)
    }

    fn scan_done(&mut self) -> Option<SortState> {
        self.announce("showing scan results");
        self.dwell_elapsed().then_some(SortState::MoveToEnd)
    }

    fn move_to_end(&mut self) -> Option<SortState> {
        if self.announce("moving object to the end") {
            let acked = self.motion.run_script(&self.script.move_to_end);
            debug!("{}/{} commands acknowledged", acked, self.script.move_to_end.len());
        }
        if let Some(TagReading::Tag(id)) = self.rfid.read_checkpoint(Checkpoint::Exit) {
            self.record(Checkpoint::Exit, id);
            return Some(SortState::AwaitPickup);
        }
        self.dwell_elapsed().then_some(SortState::AwaitPickup)
    }

    fn await_pickup(&mut self) -> Option<SortState> {
        self.announce("waiting for pickup");
        match self.rfid.read_checkpoint(Checkpoint::Exit) {
            Some(TagReading::Empty) => Some(SortState::AwaitReset),
            _ => None,
        }
    }

    fn await_reset(&mut self) -> Option<SortState> {
        self.announce("object picked up, waiting for reset");
        if !self.dwell_elapsed() {
            match self.rfid.read_checkpoint(Checkpoint::Entry) {
                Some(TagReading::Tag(_)) => {}
                _ => return None,
            }
        }
        self.reset_values();
        self.completed_cycles += 1;
        Some(SortState::AwaitEntry)
    }
}

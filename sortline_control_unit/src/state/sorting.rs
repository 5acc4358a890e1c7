//! Sorting line states.
//!
//! One object at a time travels entry → camera → end of belt:
//!
//! ```text
//! AwaitEntry ─tag@TAG1─▶ EntryAck ─5s─▶ MoveToCenter ─7s─▶ Centered ─2s─▶ Scanning
//!     ▲                                                                      │30s
//!     │                                                                      ▼
//! AwaitReset ◀─TAG3 empty─ AwaitPickup ◀─tag@TAG3 or 7s─ MoveToEnd ◀─22s─ ScanDone
//!     │5s or tag@TAG1
//!     └──▶ AwaitEntry (values reset)
//! ```

use sortline_common::config::StageTimings;
use std::fmt;
use std::time::Duration;

/// Closed set of sorting line states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortState {
    /// Waiting for an object at the entry reader.
    AwaitEntry,
    /// Object detected; the display shows the incoming item.
    EntryAck,
    /// Belt carrying the object to the camera.
    MoveToCenter,
    /// Object settling under the camera.
    Centered,
    /// Camera spinning around the object.
    Scanning,
    /// Scan finished; results are being shown.
    ScanDone,
    /// Belt carrying the object to the end.
    MoveToEnd,
    /// Object at the end of the belt, waiting to be taken.
    AwaitPickup,
    /// Object taken; short pause before the next cycle.
    AwaitReset,
}

impl SortState {
    /// Every state, in cycle order.
    pub const ALL: [SortState; 9] = [
        SortState::AwaitEntry,
        SortState::EntryAck,
        SortState::MoveToCenter,
        SortState::Centered,
        SortState::Scanning,
        SortState::ScanDone,
        SortState::MoveToEnd,
        SortState::AwaitPickup,
        SortState::AwaitReset,
    ];

    /// Identifier published in the telemetry snapshot.
    ///
    /// These tokens are what dashboard clients switch on; keep them stable.
    pub const fn wire_id(self) -> &'static str {
        match self {
            SortState::AwaitEntry => "state1",
            SortState::EntryAck => "state1_1",
            SortState::MoveToCenter => "state2",
            SortState::Centered => "state3",
            SortState::Scanning => "state4",
            SortState::ScanDone => "state4_1",
            SortState::MoveToEnd => "state5",
            SortState::AwaitPickup => "state6",
            SortState::AwaitReset => "state7",
        }
    }

    /// Descriptive name used in logs.
    pub const fn name(self) -> &'static str {
        match self {
            SortState::AwaitEntry => "awaitEntry",
            SortState::EntryAck => "entryAck",
            SortState::MoveToCenter => "moveToCenter",
            SortState::Centered => "centered",
            SortState::Scanning => "scanning",
            SortState::ScanDone => "scanDone",
            SortState::MoveToEnd => "moveToEnd",
            SortState::AwaitPickup => "awaitPickup",
            SortState::AwaitReset => "awaitReset",
        }
    }

    /// Dwell time that ends this state, if it has one.
    pub fn dwell(self, timings: &StageTimings) -> Option<Duration> {
        let secs = match self {
            SortState::EntryAck => timings.entry_ack,
            SortState::MoveToCenter => timings.move_to_center,
            SortState::Centered => timings.centered,
            SortState::Scanning => timings.scanning,
            SortState::ScanDone => timings.scan_done,
            SortState::MoveToEnd => timings.move_to_end,
            SortState::AwaitReset => timings.await_reset,
            SortState::AwaitEntry | SortState::AwaitPickup => return None,
        };
        Some(Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX))
    }
}

impl fmt::Display for SortState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.wire_id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn wire_ids_are_unique() {
        let ids: HashSet<_> = SortState::ALL.iter().map(|s| s.wire_id()).collect();
        assert_eq!(ids.len(), SortState::ALL.len());
        assert_eq!(SortState::AwaitEntry.wire_id(), "state1");
        assert_eq!(SortState::AwaitReset.wire_id(), "state7");
    }

    #[test]
    fn only_tag_gated_states_lack_dwell() {
        let timings = StageTimings::default();
        assert_eq!(SortState::AwaitEntry.dwell(&timings), None);
        assert_eq!(SortState::AwaitPickup.dwell(&timings), None);
        assert_eq!(
            SortState::Scanning.dwell(&timings),
            Some(Duration::from_secs(30))
        );
        assert_eq!(
            SortState::ScanDone.dwell(&timings),
            Some(Duration::from_secs(22))
        );
    }

    #[test]
    fn oversized_dwell_saturates_instead_of_expiring() {
        let timings = StageTimings {
            scanning: 1e20,
            ..StageTimings::default()
        };
        assert_eq!(SortState::Scanning.dwell(&timings), Some(Duration::MAX));
    }

    #[test]
    fn display_shows_name_and_wire_id() {
        assert_eq!(SortState::ScanDone.to_string(), "scanDone (state4_1)");
    }
}

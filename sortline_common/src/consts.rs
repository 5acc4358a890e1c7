//! System-wide constants for the sorting line workspace.
//!
//! Single source of truth for default timings, serial settings and the
//! motion script. Configuration sections fall back to these values.

// ─── Serial links ───────────────────────────────────────────────────

/// Baud rate of the RFID bridge.
pub const RFID_BAUD_RATE: u32 = 9600;

/// Baud rate of the motion controller (Marlin default).
pub const MOTION_BAUD_RATE: u32 = 115_200;

/// Read timeout applied to both links [ms].
pub const LINK_READ_TIMEOUT_MS: u64 = 1000;

/// Minimum interval between two reconnect attempts on one link [ms].
pub const RECONNECT_INTERVAL_MS: u64 = 5000;

/// Delay after opening the motion port; the firmware resets on open [ms].
pub const MOTION_SETTLE_MS: u64 = 200;

/// Port description keywords identifying the RFID bridge.
pub const RFID_KEYWORDS: &[&str] = &["USB", "CH340", "Silicon"];

/// Port description keywords identifying the motion controller.
pub const MOTION_KEYWORDS: &[&str] = &[
    "STM",
    "Marlin",
    "BIGTREETECH",
    "SKR",
    "USB-Serial",
    "USB Serial",
    "CDC",
];

// ─── Motion acknowledgement ─────────────────────────────────────────

/// Default wait for the `ok` acknowledgement [ms].
pub const ACK_TIMEOUT_MS: u64 = 3000;

/// Quiet period that ends the boot-noise drain [ms].
pub const FLUSH_IDLE_MS: u64 = 200;

/// Upper bound on the boot-noise drain [ms].
pub const FLUSH_MAX_MS: u64 = 2000;

/// Pause between read attempts while the motion port is unavailable [ms].
pub const ACK_RETRY_BACKOFF_MS: u64 = 50;

/// Acknowledgement token emitted by the motion firmware.
pub const ACK_TOKEN: &str = "ok";

// ─── RFID protocol ──────────────────────────────────────────────────

/// Request prefix sent to the RFID bridge.
pub const SCAN_COMMAND: &str = "scan";

/// Value reported by the bridge when no tag is present.
pub const EMPTY_TAG: &str = "empty";

// ─── Cycle & dwell times ────────────────────────────────────────────

/// Controller tick period [ms].
pub const TICK_PERIOD_MS: u64 = 300;

/// Dwell in `entryAck` [s].
pub const ENTRY_ACK_S: f64 = 5.0;
/// Dwell in `moveToCenter` [s].
pub const MOVE_TO_CENTER_S: f64 = 7.0;
/// Dwell in `centered` [s].
pub const CENTERED_S: f64 = 2.0;
/// Dwell in `scanning` [s].
pub const SCANNING_S: f64 = 30.0;
/// Dwell in `scanDone` [s].
pub const SCAN_DONE_S: f64 = 22.0;
/// Maximum time in `moveToEnd` before assuming arrival [s].
pub const MOVE_TO_END_S: f64 = 7.0;
/// Maximum time in `awaitReset` before the next cycle [s].
pub const AWAIT_RESET_S: f64 = 5.0;

// ─── Motion script ──────────────────────────────────────────────────

/// Axis setup sent on entry to `awaitEntry`: steps/mm, max acceleration,
/// max feedrate and jerk for the belt (X) and camera spin (Y) axes, then
/// relative positioning.
pub const AXIS_SETUP_SCRIPT: &[&str] = &[
    "M92 X80 Y80",
    "M201 X500 Y200",
    "M203 X50 Y30",
    "M205 X8 Y4",
    "G91",
];

/// Belt advance from the loading zone to the camera.
pub const MOVE_TO_CENTER_SCRIPT: &[&str] = &["G1 X250 F3000"];

/// Camera spin: one forward revolution, then back.
pub const SCAN_SCRIPT: &[&str] = &["G1 Y360 F1200", "G1 Y-360 F1200"];

/// Belt advance from the camera to the pickup zone.
pub const MOVE_TO_END_SCRIPT: &[&str] = &["G1 X250 F3000"];

// ─── Telemetry ──────────────────────────────────────────────────────

/// Default telemetry bind address.
pub const TELEMETRY_BIND: &str = "0.0.0.0:8000";

/// Telemetry fan-out period [ms].
pub const TELEMETRY_INTERVAL_MS: u64 = 100;

/// Frames buffered per subscriber before it is dropped.
pub const SUBSCRIBER_BUFFER: usize = 16;

/// Default service name.
pub const SERVICE_NAME: &str = "sortline";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_sets_are_disjoint() {
        for kw in RFID_KEYWORDS {
            assert!(!MOTION_KEYWORDS.contains(kw), "{kw} used by both links");
        }
    }

    #[test]
    fn dwell_times_are_positive() {
        for d in [
            ENTRY_ACK_S,
            MOVE_TO_CENTER_S,
            CENTERED_S,
            SCANNING_S,
            SCAN_DONE_S,
            MOVE_TO_END_S,
            AWAIT_RESET_S,
        ] {
            assert!(d > 0.0);
        }
    }

    #[test]
    fn tick_is_shorter_than_every_dwell() {
        let tick_s = TICK_PERIOD_MS as f64 / 1000.0;
        assert!(tick_s < CENTERED_S);
    }
}

//! Status types shared between the controller and telemetry.

use serde::{Deserialize, Serialize};

/// Immutable view of the controller published once per tick.
///
/// Serializes as `{ "state": "state4", "tag": "ABC123" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Wire id of the current state.
    pub state: String,
    /// Most recent tag value read at any checkpoint.
    pub tag: Option<String>,
}

impl StateSnapshot {
    /// Snapshot for a state with no tag read yet.
    pub fn new(state: impl Into<String>) -> Self {
        Self {
            state: state.into(),
            tag: None,
        }
    }
}

/// Axis-aligned box in source video pixels: `(x1, y1, x2, y2)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[i32; 4]", into = "[i32; 4]")]
pub struct BoundingBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BoundingBox {
    /// Build a box from its corner coordinates.
    pub const fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Width in pixels (0 for inverted boxes).
    pub fn width(&self) -> i32 {
        (self.x2 - self.x1).max(0)
    }

    /// Height in pixels (0 for inverted boxes).
    pub fn height(&self) -> i32 {
        (self.y2 - self.y1).max(0)
    }
}

impl From<[i32; 4]> for BoundingBox {
    fn from([x1, y1, x2, y2]: [i32; 4]) -> Self {
        Self { x1, y1, x2, y2 }
    }
}

impl From<BoundingBox> for [i32; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.x1, b.y1, b.x2, b.y2]
    }
}

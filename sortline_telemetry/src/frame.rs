//! Telemetry frame sent to every client.

use crate::error::TelemetryError;
use serde::{Deserialize, Serialize};
use sortline_common::snapshot::{BoundingBox, StateSnapshot};

/// One status update: controller snapshot plus the latest vision boxes.
///
/// Serializes as `{"state":"state4","tag":"ABC123","boxes":[[x1,y1,x2,y2]]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryFrame {
    /// Wire id of the controller state.
    pub state: String,
    /// Most recent tag, if any.
    pub tag: Option<String>,
    /// Latest detected boxes, possibly empty.
    pub boxes: Vec<BoundingBox>,
}

impl TelemetryFrame {
    /// Combine a controller snapshot with vision results.
    pub fn compose(snapshot: &StateSnapshot, boxes: Vec<BoundingBox>) -> Self {
        Self {
            state: snapshot.state.clone(),
            tag: snapshot.tag.clone(),
            boxes,
        }
    }

    /// JSON text of the frame.
    pub fn to_json(&self) -> Result<String, TelemetryError> {
        Ok(serde_json::to_string(self)?)
    }
}

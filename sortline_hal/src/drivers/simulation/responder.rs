//! Firmware emulation for simulated devices.
//!
//! A responder sees every line the host writes and returns the lines the
//! device answers with.

use std::collections::BTreeMap;

/// Emulated device firmware.
pub trait Responder: Send {
    /// Handle one received line (trimmed, non-empty).
    fn respond(&mut self, line: &str) -> Vec<String>;
}

/// Emulates the RFID bridge firmware.
///
/// Answers `scan TAGn` with `TAGn:<value>` where the value comes from the
/// tag table, or `empty` if the reader sees nothing. Unknown commands are
/// ignored, as the real bridge does.
#[derive(Debug, Clone, Default)]
pub struct RfidBridgeResponder {
    tags: BTreeMap<String, String>,
}

impl RfidBridgeResponder {
    /// Bridge with every reader empty.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bridge with fixed reader contents, keyed by label.
    pub fn with_tags(tags: BTreeMap<String, String>) -> Self {
        Self { tags }
    }

    /// Put a tag in front of reader `label`.
    pub fn set_tag(&mut self, label: &str, value: &str) {
        self.tags.insert(label.to_string(), value.to_string());
    }
}

impl Responder for RfidBridgeResponder {
    fn respond(&mut self, line: &str) -> Vec<String> {
        let mut words = line.split_whitespace();
        let (Some(cmd), Some(label), None) = (words.next(), words.next(), words.next()) else {
            return Vec::new();
        };
        if !cmd.eq_ignore_ascii_case(sortline_common::consts::SCAN_COMMAND) {
            return Vec::new();
        }
        let label = label.to_ascii_uppercase();
        if !matches!(label.as_str(), "TAG1" | "TAG2" | "TAG3") {
            return Vec::new();
        }

        let value = self
            .tags
            .get(&label)
            .map(String::as_str)
            .unwrap_or(sortline_common::consts::EMPTY_TAG);
        vec![format!("{label}:{value}")]
    }
}

/// Emulates a Marlin-style motion controller that accepts every command.
#[derive(Debug, Clone, Default)]
pub struct MotionControllerResponder {
    /// Informational lines sent before each `ok`.
    chatter: Vec<String>,
}

impl MotionControllerResponder {
    /// Controller that answers `ok` to every line.
    pub fn new() -> Self {
        Self::default()
    }

    /// Controller that emits `chatter` before every `ok`.
    pub fn with_chatter<I, S>(chatter: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            chatter: chatter.into_iter().map(Into::into).collect(),
        }
    }
}

impl Responder for MotionControllerResponder {
    fn respond(&mut self, _line: &str) -> Vec<String> {
        let mut out = self.chatter.clone();
        out.push(sortline_common::consts::ACK_TOKEN.to_string());
        out
    }
}

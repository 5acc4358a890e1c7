//! RFID bridge link.
//!
//! Request/response protocol: the host writes `scan <label>`, the bridge
//! answers one `<label>:<value>` line where `<value>` is a tag id or the
//! literal `empty`. Anything else means "no reading this cycle".

use crate::error::LinkError;
use crate::link::{LinkSettings, SerialLink};
use crate::port::PortBackend;
use sortline_common::clock::SharedClock;
use sortline_common::config::LineConfig;
use sortline_common::consts::{EMPTY_TAG, SCAN_COMMAND};
use std::fmt;
use tracing::debug;

/// Physical read points along the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Checkpoint {
    /// Belt entry.
    Entry,
    /// Under the camera.
    Center,
    /// Belt end, where objects are picked up.
    Exit,
}

impl Checkpoint {
    /// Label the bridge uses for this reader.
    pub const fn label(self) -> &'static str {
        match self {
            Checkpoint::Entry => "TAG1",
            Checkpoint::Center => "TAG2",
            Checkpoint::Exit => "TAG3",
        }
    }
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Interpreted reading of one checkpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagReading {
    /// The reader saw nothing.
    Empty,
    /// A tag is in front of the reader.
    Tag(String),
}

impl TagReading {
    /// Classify a raw value returned by the bridge.
    pub fn from_value(value: &str) -> Self {
        if value == EMPTY_TAG {
            TagReading::Empty
        } else {
            TagReading::Tag(value.to_string())
        }
    }
}

/// Extract the value from a `<label>:<value>` response.
///
/// Only the whole line is trimmed before splitting on the first `:`.
/// Returns `None` unless the label equals `expected` byte for byte and the
/// trimmed value is non-empty.
pub fn parse_tag_response(line: &str, expected: &str) -> Option<String> {
    let (label, value) = line.trim().split_once(':')?;
    if label != expected {
        return None;
    }
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    Some(value.to_string())
}

/// Serial link to the RFID bridge.
#[derive(Debug)]
pub struct RfidLink {
    link: SerialLink,
}

impl RfidLink {
    /// Wrap an existing serial link.
    pub fn new(link: SerialLink) -> Self {
        Self { link }
    }

    /// Build the link from the `[rfid]` config section.
    pub fn from_config(config: &LineConfig, backend: Box<dyn PortBackend>, clock: SharedClock) -> Self {
        let settings = LinkSettings::from_config("rfid", &config.rfid, config);
        Self::new(SerialLink::new(settings, backend, clock))
    }

    /// Underlying serial link.
    pub fn link(&self) -> &SerialLink {
        &self.link
    }

    /// Mutable access to the underlying serial link.
    pub fn link_mut(&mut self) -> &mut SerialLink {
        &mut self.link
    }

    /// Ask the bridge for reader `label` and return its raw value.
    ///
    /// The value may be the `empty` literal. `None` covers link failures,
    /// timeouts and malformed or mismatched responses alike.
    pub fn read_tag(&mut self, label: &str) -> Option<String> {
        match self.query(label) {
            Ok(value) => value,
            Err(e) => {
                debug!("[rfid] {} not read: {}", label, e);
                None
            }
        }
    }

    /// Read one checkpoint and classify the result.
    pub fn read_checkpoint(&mut self, checkpoint: Checkpoint) -> Option<TagReading> {
        self.read_tag(checkpoint.label())
            .map(|v| TagReading::from_value(&v))
    }

    fn query(&mut self, label: &str) -> Result<Option<String>, LinkError> {
        self.link.write(&format!("{SCAN_COMMAND} {label}"))?;
        let line = self.link.read_line()?;
        let value = parse_tag_response(&line, label);
        if value.is_none() && !line.is_empty() {
            debug!("[rfid] ignoring response {:?} to {}", line, label);
        }
        Ok(value)
    }
}

//! Configuration loading traits and types.
//!
//! The whole line is configured from one TOML file. Every section is
//! optional and falls back to the constants in [`crate::consts`], so an
//! empty file (or no file at all) describes the stock machine.
//!
//! # Usage
//!
//! ```rust,no_run
//! use sortline_common::config::{ConfigError, LineConfig};
//! use std::path::Path;
//!
//! fn main() -> Result<(), ConfigError> {
//!     let config = LineConfig::load_validated(Path::new("config/sortline.toml"))?;
//!     println!("tick every {:?}", config.cycle.tick_period());
//!     Ok(())
//! }
//! ```

use crate::consts::*;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Log level for application logging.
///
/// Uses lowercase serde values for TOML compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Most verbose, detailed tracing information.
    Trace,
    /// Debug information useful during development.
    Debug,
    /// General information about application operation.
    #[default]
    Info,
    /// Warning messages for potentially problematic situations.
    Warn,
    /// Error messages for serious problems.
    Error,
}

impl LogLevel {
    /// Directive string understood by `tracing_subscriber::EnvFilter`.
    pub const fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Common configuration fields.
///
/// ```toml
/// [shared]
/// log_level = "debug"
/// service_name = "sortline-bay-2"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedConfig {
    /// Logging verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Application instance identifier.
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

fn default_service_name() -> String {
    SERVICE_NAME.to_string()
}

impl Default for SharedConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            service_name: default_service_name(),
        }
    }
}

impl SharedConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if `service_name` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.is_empty() {
            return Err(ConfigError::ValidationError(
                "service_name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Trait for loading configuration from TOML files.
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

// Blanket implementation for all types that implement DeserializeOwned.
impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}

// ─── Line configuration ─────────────────────────────────────────────

/// Serial settings for one peripheral link.
///
/// The `[rfid]` and `[motion]` sections are read as overrides: any field
/// left out keeps that link's stock value (see [`SerialPortConfig::rfid`]
/// and [`SerialPortConfig::motion`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SerialPortConfig {
    /// Substrings matched against the OS port description, in order.
    pub keywords: Vec<String>,
    /// Line speed.
    pub baud_rate: u32,
    /// Bound on one blocking read [ms].
    pub read_timeout_ms: u64,
    /// Delay after a successful open before buffers are cleared [ms].
    pub settle_ms: u64,
}

/// Fields present in a serial section.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SerialPortOverrides {
    keywords: Option<Vec<String>>,
    baud_rate: Option<u32>,
    read_timeout_ms: Option<u64>,
    settle_ms: Option<u64>,
}

impl SerialPortOverrides {
    fn apply(self, mut base: SerialPortConfig) -> SerialPortConfig {
        if let Some(keywords) = self.keywords {
            base.keywords = keywords;
        }
        if let Some(baud_rate) = self.baud_rate {
            base.baud_rate = baud_rate;
        }
        if let Some(read_timeout_ms) = self.read_timeout_ms {
            base.read_timeout_ms = read_timeout_ms;
        }
        if let Some(settle_ms) = self.settle_ms {
            base.settle_ms = settle_ms;
        }
        base
    }
}

fn rfid_section<'de, D: Deserializer<'de>>(d: D) -> Result<SerialPortConfig, D::Error> {
    SerialPortOverrides::deserialize(d).map(|o| o.apply(SerialPortConfig::rfid()))
}

fn motion_section<'de, D: Deserializer<'de>>(d: D) -> Result<SerialPortConfig, D::Error> {
    SerialPortOverrides::deserialize(d).map(|o| o.apply(SerialPortConfig::motion()))
}

impl SerialPortConfig {
    /// Stock settings for the RFID bridge.
    pub fn rfid() -> Self {
        Self {
            keywords: RFID_KEYWORDS.iter().map(|s| s.to_string()).collect(),
            baud_rate: RFID_BAUD_RATE,
            read_timeout_ms: LINK_READ_TIMEOUT_MS,
            settle_ms: 0,
        }
    }

    /// Stock settings for the motion controller.
    pub fn motion() -> Self {
        Self {
            keywords: MOTION_KEYWORDS.iter().map(|s| s.to_string()).collect(),
            baud_rate: MOTION_BAUD_RATE,
            read_timeout_ms: LINK_READ_TIMEOUT_MS,
            settle_ms: MOTION_SETTLE_MS,
        }
    }

    /// Read timeout as a `Duration`.
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Settle delay as a `Duration`.
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    fn validate(&self, section: &str) -> Result<(), ConfigError> {
        if self.keywords.is_empty() || self.keywords.iter().any(|k| k.is_empty()) {
            return Err(ConfigError::ValidationError(format!(
                "[{section}] keywords must be a non-empty list of non-empty strings"
            )));
        }
        if self.baud_rate == 0 {
            return Err(ConfigError::ValidationError(format!(
                "[{section}] baud_rate must be greater than 0"
            )));
        }
        if self.read_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(format!(
                "[{section}] read_timeout_ms must be greater than 0"
            )));
        }
        Ok(())
    }
}

/// Which port backend the links are built on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// OS serial ports.
    #[default]
    Serial,
    /// In-process simulated peripherals.
    Simulation,
}

impl BackendKind {
    /// Registry name of the backend.
    pub const fn name(self) -> &'static str {
        match self {
            BackendKind::Serial => "serial",
            BackendKind::Simulation => "simulation",
        }
    }
}

/// Connection-recovery settings shared by both links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LinkConfig {
    /// Minimum interval between reconnect attempts [ms].
    pub reconnect_interval_ms: u64,
    /// Port backend.
    pub backend: BackendKind,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            reconnect_interval_ms: RECONNECT_INTERVAL_MS,
            backend: BackendKind::default(),
        }
    }
}

impl LinkConfig {
    /// Reconnect interval as a `Duration`.
    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }
}

/// Motion acknowledgement and boot-drain settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MotionAckConfig {
    /// Wait for `ok` after each command [ms].
    pub ack_timeout_ms: u64,
    /// Quiet period ending the startup drain [ms].
    pub flush_idle_ms: u64,
    /// Upper bound on the startup drain [ms].
    pub flush_max_ms: u64,
}

impl Default for MotionAckConfig {
    fn default() -> Self {
        Self {
            ack_timeout_ms: ACK_TIMEOUT_MS,
            flush_idle_ms: FLUSH_IDLE_MS,
            flush_max_ms: FLUSH_MAX_MS,
        }
    }
}

impl MotionAckConfig {
    /// Ack timeout as a `Duration`.
    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }

    /// Drain idle window as a `Duration`.
    pub fn flush_idle(&self) -> Duration {
        Duration::from_millis(self.flush_idle_ms)
    }

    /// Drain upper bound as a `Duration`.
    pub fn flush_max(&self) -> Duration {
        Duration::from_millis(self.flush_max_ms)
    }
}

/// Controller tick settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CycleConfig {
    /// Tick period [ms].
    pub tick_ms: u64,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            tick_ms: TICK_PERIOD_MS,
        }
    }
}

impl CycleConfig {
    /// Tick period as a `Duration`.
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

/// Dwell times of the time-gated states [s].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StageTimings {
    pub entry_ack: f64,
    pub move_to_center: f64,
    pub centered: f64,
    pub scanning: f64,
    pub scan_done: f64,
    pub move_to_end: f64,
    pub await_reset: f64,
}

impl Default for StageTimings {
    fn default() -> Self {
        Self {
            entry_ack: ENTRY_ACK_S,
            move_to_center: MOVE_TO_CENTER_S,
            centered: CENTERED_S,
            scanning: SCANNING_S,
            scan_done: SCAN_DONE_S,
            move_to_end: MOVE_TO_END_S,
            await_reset: AWAIT_RESET_S,
        }
    }
}

impl StageTimings {
    fn validate(&self) -> Result<(), ConfigError> {
        let all = [
            ("entry_ack", self.entry_ack),
            ("move_to_center", self.move_to_center),
            ("centered", self.centered),
            ("scanning", self.scanning),
            ("scan_done", self.scan_done),
            ("move_to_end", self.move_to_end),
            ("await_reset", self.await_reset),
        ];
        for (name, secs) in all {
            if !secs.is_finite() || secs <= 0.0 || secs >= Duration::MAX.as_secs_f64() {
                return Err(ConfigError::ValidationError(format!(
                    "[timing] {name} must be a positive number of seconds, got {secs}"
                )));
            }
        }
        Ok(())
    }
}

/// Pre-authored G-code issued on state entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MotionScript {
    /// Axis configuration sent when waiting for a new object.
    pub axis_setup: Vec<String>,
    /// Belt advance to the camera.
    pub move_to_center: Vec<String>,
    /// Camera spin sequence.
    pub scan: Vec<String>,
    /// Belt advance to the pickup zone.
    pub move_to_end: Vec<String>,
}

fn owned(lines: &[&str]) -> Vec<String> {
    lines.iter().map(|s| s.to_string()).collect()
}

impl Default for MotionScript {
    fn default() -> Self {
        Self {
            axis_setup: owned(AXIS_SETUP_SCRIPT),
            move_to_center: owned(MOVE_TO_CENTER_SCRIPT),
            scan: owned(SCAN_SCRIPT),
            move_to_end: owned(MOVE_TO_END_SCRIPT),
        }
    }
}

/// Telemetry server settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TelemetryConfig {
    /// Socket address of the WebSocket server.
    pub bind: String,
    /// Fan-out period [ms].
    pub interval_ms: u64,
    /// Frames buffered per subscriber before it is dropped.
    pub subscriber_buffer: usize,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            bind: TELEMETRY_BIND.to_string(),
            interval_ms: TELEMETRY_INTERVAL_MS,
            subscriber_buffer: SUBSCRIBER_BUFFER,
        }
    }
}

impl TelemetryConfig {
    /// Fan-out period as a `Duration`.
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Values served by the simulated RFID bridge.
///
/// ```toml
/// [simulation.tags]
/// TAG1 = "SIM-0001"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// Checkpoint label → reported value; missing labels report `empty`.
    pub tags: BTreeMap<String, String>,
}

/// Complete line configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LineConfig {
    pub shared: SharedConfig,
    #[serde(deserialize_with = "rfid_section")]
    pub rfid: SerialPortConfig,
    #[serde(deserialize_with = "motion_section")]
    pub motion: SerialPortConfig,
    pub link: LinkConfig,
    pub motion_ack: MotionAckConfig,
    pub cycle: CycleConfig,
    pub timing: StageTimings,
    pub script: MotionScript,
    pub telemetry: TelemetryConfig,
    pub simulation: SimulationConfig,
}

impl Default for LineConfig {
    fn default() -> Self {
        Self {
            shared: SharedConfig::default(),
            rfid: SerialPortConfig::rfid(),
            motion: SerialPortConfig::motion(),
            link: LinkConfig::default(),
            motion_ack: MotionAckConfig::default(),
            cycle: CycleConfig::default(),
            timing: StageTimings::default(),
            script: MotionScript::default(),
            telemetry: TelemetryConfig::default(),
            simulation: SimulationConfig::default(),
        }
    }
}

impl LineConfig {
    /// Load and validate a line configuration file.
    pub fn load_validated(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.validate()?;
        debug!("loaded line configuration from {}", path.display());
        Ok(config)
    }

    /// Validate the line configuration.
    ///
    /// # Validation Rules
    /// 1. `shared.service_name` not empty
    /// 2. Both serial sections have keywords, a baud rate and a read timeout
    /// 3. Reconnect interval, ack timeout, drain bounds and tick period > 0
    /// 4. All dwell times positive
    /// 5. Telemetry interval and subscriber buffer > 0
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;
        self.rfid.validate("rfid")?;
        self.motion.validate("motion")?;

        let positive = [
            ("link.reconnect_interval_ms", self.link.reconnect_interval_ms),
            ("motion_ack.ack_timeout_ms", self.motion_ack.ack_timeout_ms),
            ("motion_ack.flush_idle_ms", self.motion_ack.flush_idle_ms),
            ("motion_ack.flush_max_ms", self.motion_ack.flush_max_ms),
            ("cycle.tick_ms", self.cycle.tick_ms),
            ("telemetry.interval_ms", self.telemetry.interval_ms),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "{name} must be greater than 0"
                )));
            }
        }

        self.timing.validate()?;

        if self.telemetry.subscriber_buffer == 0 {
            return Err(ConfigError::ValidationError(
                "telemetry.subscriber_buffer must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

//! Motion controller link.
//!
//! Request/acknowledge protocol: the host writes one G-code line, the
//! firmware may echo or print informational lines, and a line equal to
//! `ok` (case-insensitive, trimmed) acknowledges the command.

use crate::error::LinkError;
use crate::link::{LinkSettings, SerialLink};
use crate::port::PortBackend;
use sortline_common::clock::SharedClock;
use sortline_common::config::LineConfig;
use sortline_common::consts::{ACK_RETRY_BACKOFF_MS, ACK_TIMEOUT_MS, ACK_TOKEN};
use std::time::Duration;
use tracing::{debug, info, warn};

/// True if `line` acknowledges a command.
pub fn is_ack(line: &str) -> bool {
    line.trim().eq_ignore_ascii_case(ACK_TOKEN)
}

/// Serial link to the motion controller.
#[derive(Debug)]
pub struct MotionLink {
    link: SerialLink,
    ack_timeout: Duration,
    /// Pause after a failed read inside an ack wait.
    retry_backoff: Duration,
}

impl MotionLink {
    /// Wrap an existing serial link with the default ack timeout.
    pub fn new(link: SerialLink) -> Self {
        Self {
            link,
            ack_timeout: Duration::from_millis(ACK_TIMEOUT_MS),
            retry_backoff: Duration::from_millis(ACK_RETRY_BACKOFF_MS),
        }
    }

    /// Build the link from the `[motion]` and `[motion_ack]` config sections.
    pub fn from_config(config: &LineConfig, backend: Box<dyn PortBackend>, clock: SharedClock) -> Self {
        let settings = LinkSettings::from_config("motion", &config.motion, config);
        let mut motion = Self::new(SerialLink::new(settings, backend, clock));
        motion.ack_timeout = config.motion_ack.ack_timeout();
        motion
    }

    /// Default ack timeout used by [`send_command`](Self::send_command).
    pub fn ack_timeout(&self) -> Duration {
        self.ack_timeout
    }

    /// Underlying serial link.
    pub fn link(&self) -> &SerialLink {
        &self.link
    }

    /// Mutable access to the underlying serial link.
    pub fn link_mut(&mut self) -> &mut SerialLink {
        &mut self.link
    }

    /// Send `cmd` and wait for `ok` with the default timeout.
    pub fn send_command(&mut self, cmd: &str) -> Result<(), LinkError> {
        self.send_command_with(cmd, true, self.ack_timeout)
    }

    /// Send `cmd`, optionally waiting up to `timeout` for `ok`.
    ///
    /// A failed write returns immediately. Once written, only an `ok` line
    /// or the timeout ends the wait; other lines and failed reads are
    /// skipped.
    pub fn send_command_with(
        &mut self,
        cmd: &str,
        wait_ack: bool,
        timeout: Duration,
    ) -> Result<(), LinkError> {
        self.link.write(cmd)?;
        if !wait_ack {
            return Ok(());
        }

        let clock = self.link.clock().clone();
        let start = clock.now();
        while clock.now().saturating_sub(start) < timeout {
            match self.link.read_line() {
                Ok(line) if is_ack(&line) => {
                    debug!("[motion] '{}' acknowledged", cmd);
                    return Ok(());
                }
                Ok(_) => {}
                Err(_) => clock.sleep(self.retry_backoff),
            }
        }

        warn!("[motion] no ack for '{}' within {:?}", cmd, timeout);
        Err(LinkError::AckTimeout {
            command: cmd.to_string(),
            timeout,
        })
    }

    /// Send every command of `script` in order, waiting for each ack.
    ///
    /// A missing ack is logged and the script continues. Returns the number
    /// of acknowledged commands.
    pub fn run_script<S: AsRef<str>>(&mut self, script: &[S]) -> usize {
        let mut acked = 0;
        for cmd in script {
            match self.send_command(cmd.as_ref()) {
                Ok(()) => acked += 1,
                Err(e) => warn!("[motion] '{}' failed: {}", cmd.as_ref(), e),
            }
        }
        acked
    }

    /// Drain controller chatter until the line has been quiet for `idle`
    /// or `max_wait` has passed. Returns the number of lines discarded.
    pub fn flush_until_idle(&mut self, idle: Duration, max_wait: Duration) -> usize {
        let clock = self.link.clock().clone();
        let start = clock.now();
        let mut last_rx = start;
        let mut drained = 0;

        loop {
            let now = clock.now();
            if now.saturating_sub(start) >= max_wait || now.saturating_sub(last_rx) >= idle {
                break;
            }
            match self.link.read_line() {
                Ok(line) if !line.is_empty() => {
                    debug!("[motion] flushed: {}", line);
                    drained += 1;
                    last_rx = clock.now();
                }
                Ok(_) => {}
                Err(_) => clock.sleep(self.retry_backoff),
            }
        }

        if drained > 0 {
            info!("[motion] flushed {} boot lines", drained);
        }
        drained
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ack_is_case_insensitive_and_trimmed() {
        assert!(is_ack("ok"));
        assert!(is_ack(" OK \r"));
        assert!(is_ack("Ok"));
        assert!(!is_ack("ok T:21.0"));
        assert!(!is_ack("echo:ok"));
        assert!(!is_ack(""));
    }
}

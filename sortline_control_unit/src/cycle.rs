//! Fixed-period tick loop.
//!
//! Runs the controller on its own thread: tick → publish snapshot → sleep
//! for the rest of the period. Link I/O inside a tick is blocking and
//! bounded, so a tick may overrun its period; overruns are counted, not
//! fatal.
//!
//! The latest snapshot is published on a `tokio::sync::watch` channel,
//! which readers poll without ever blocking the loop.

use crate::controller::SortingController;
use crate::state::sorting::SortState;
use sortline_common::clock::SharedClock;
use sortline_common::snapshot::StateSnapshot;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

// ─── Cycle Statistics ───────────────────────────────────────────────

/// Per-tick timing statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleStats {
    /// Total ticks executed.
    pub tick_count: u64,
    /// Duration of the last tick.
    pub last_tick: Duration,
    /// Longest tick seen.
    pub max_tick: Duration,
    /// Sum of all tick durations.
    pub total: Duration,
    /// Ticks that took longer than the period.
    pub overruns: u64,
    /// Transitions observed.
    pub transitions: u64,
}

impl CycleStats {
    /// Create a zeroed stats instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one tick.
    pub fn record(&mut self, duration: Duration, period: Duration, transitioned: bool) {
        self.tick_count += 1;
        self.last_tick = duration;
        self.max_tick = self.max_tick.max(duration);
        self.total += duration;
        if duration > period {
            self.overruns += 1;
        }
        if transitioned {
            self.transitions += 1;
        }
    }

    /// Average tick duration (zero if no ticks).
    pub fn avg_tick(&self) -> Duration {
        match u32::try_from(self.tick_count) {
            Ok(0) => Duration::ZERO,
            Ok(n) => self.total / n,
            Err(_) => Duration::ZERO,
        }
    }
}

// ─── Stop Handle ────────────────────────────────────────────────────

/// Cloneable flag that ends [`CycleRunner::run`] after the current tick.
#[derive(Debug, Clone)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    /// Ask the loop to stop.
    pub fn stop(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    /// True until `stop()` is called.
    pub fn is_running(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ─── Cycle Runner ───────────────────────────────────────────────────

/// Owns the controller and drives it at a fixed period.
pub struct CycleRunner {
    controller: SortingController,
    clock: SharedClock,
    period: Duration,
    snapshot_tx: watch::Sender<StateSnapshot>,
    stats: CycleStats,
    running: Arc<AtomicBool>,
}

impl CycleRunner {
    /// Wrap `controller`; the initial snapshot is published immediately.
    pub fn new(controller: SortingController, clock: SharedClock, period: Duration) -> Self {
        let (snapshot_tx, _) = watch::channel(controller.snapshot());
        Self {
            controller,
            clock,
            period,
            snapshot_tx,
            stats: CycleStats::new(),
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Receiver of the latest snapshot.
    pub fn subscribe(&self) -> watch::Receiver<StateSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Handle that stops the loop.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle(self.running.clone())
    }

    /// Timing statistics so far.
    pub fn stats(&self) -> &CycleStats {
        &self.stats
    }

    /// The driven controller.
    pub fn controller(&self) -> &SortingController {
        &self.controller
    }

    /// Tick period.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Run one tick and publish the resulting snapshot.
    pub fn step(&mut self) -> SortState {
        let before = self.controller.state();
        let start = self.clock.now();

        let after = self.controller.tick();

        let duration = self.clock.now().saturating_sub(start);
        self.stats.record(duration, self.period, after != before);
        if duration > self.period {
            debug!(
                "tick in {} took {:?} (period {:?})",
                before, duration, self.period
            );
        }

        self.snapshot_tx.send_if_modified(|current| {
            let next = self.controller.snapshot();
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
        after
    }

    /// One-time startup work on the loop's own thread: drains motion boot
    /// chatter so the first command sees its own ack.
    pub fn prepare(&mut self) -> usize {
        self.controller.drain_motion_boot()
    }

    /// Tick until stopped.
    pub fn run(&mut self) {
        self.prepare();
        info!("cycle loop started (period {:?})", self.period);
        while self.running.load(Ordering::SeqCst) {
            let start = self.clock.now();
            self.step();
            let elapsed = self.clock.now().saturating_sub(start);
            if let Some(remaining) = self.period.checked_sub(elapsed) {
                self.clock.sleep(remaining);
            }
        }
        info!(
            "cycle loop stopped after {} ticks ({} overruns, avg {:?})",
            self.stats.tick_count,
            self.stats.overruns,
            self.stats.avg_tick()
        );
    }

    /// Run the loop on a dedicated thread; the runner is handed back on exit.
    pub fn spawn(mut self) -> std::io::Result<JoinHandle<CycleRunner>> {
        std::thread::Builder::new()
            .name("sortline-cycle".to_string())
            .spawn(move || {
                self.run();
                self
            })
            .inspect_err(|e| warn!("failed to spawn cycle thread: {}", e))
    }
}

impl std::fmt::Debug for CycleRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CycleRunner")
            .field("state", &self.controller.state())
            .field("period", &self.period)
            .field("stats", &self.stats)
            .finish()
    }
}

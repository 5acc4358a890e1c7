//! Process context.
//!
//! Everything the line needs is built once here and then moved into the
//! task that owns it: the controller into the cycle thread, the hub into
//! the telemetry server, the box store into the vision worker.

use sortline_common::prelude::{LineConfig, SharedClock, StateSnapshot};
use sortline_control_unit::{CycleRunner, SortingController};
use sortline_hal::{BackendRegistry, LinkError, MotionLink, RfidLink};
use sortline_telemetry::server;
use sortline_telemetry::{BoxDetector, BoxStore, TelemetryHub, TelemetryPublisher, VisionWorker};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};

/// Default pacing of an attached vision detector.
const VISION_INTERVAL: Duration = Duration::from_millis(100);

/// Wired-up line, ready to run.
pub struct LineContext {
    config: LineConfig,
    runner: CycleRunner,
    hub: Arc<TelemetryHub>,
    boxes: BoxStore,
    vision: Option<VisionWorker>,
    clock: SharedClock,
}

/// Counters reported after shutdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Controller ticks executed.
    pub ticks: u64,
    /// Ticks that overran the period.
    pub overruns: u64,
    /// Objects that completed a full cycle.
    pub completed_cycles: u64,
    /// Snapshot at the moment the loop stopped.
    pub last_snapshot: StateSnapshot,
}

impl LineContext {
    /// Build both links on `backend` and create the controller and its
    /// runner. No port is touched here; the motion boot drain runs on the
    /// cycle thread before its first tick.
    pub fn build(config: LineConfig, backend: &str, clock: SharedClock) -> Result<Self, LinkError> {
        let registry = BackendRegistry::with_builtin();
        info!(
            "building links on '{}' backend (available: {:?})",
            backend,
            registry.list_backends()
        );

        let rfid = RfidLink::from_config(
            &config,
            registry.create_backend(backend, &config, clock.clone())?,
            clock.clone(),
        );
        let motion = MotionLink::from_config(
            &config,
            registry.create_backend(backend, &config, clock.clone())?,
            clock.clone(),
        );

        let controller = SortingController::from_config(&config, rfid, motion, clock.clone());
        let runner = CycleRunner::new(controller, clock.clone(), config.cycle.tick_period());
        let hub = Arc::new(TelemetryHub::new(config.telemetry.subscriber_buffer));

        Ok(Self {
            config,
            runner,
            hub,
            boxes: BoxStore::new(),
            vision: None,
            clock,
        })
    }

    /// Run `detector` on its own thread and stream its boxes.
    pub fn with_detector(mut self, detector: Box<dyn BoxDetector>) -> Self {
        self.vision = Some(VisionWorker::new(
            detector,
            self.boxes.clone(),
            self.clock.clone(),
            VISION_INTERVAL,
        ));
        self
    }

    /// Effective configuration.
    pub fn config(&self) -> &LineConfig {
        &self.config
    }

    /// Cycle runner, before it is started.
    pub fn runner(&self) -> &CycleRunner {
        &self.runner
    }

    /// Mutable cycle runner, for stepping without a thread.
    pub fn runner_mut(&mut self) -> &mut CycleRunner {
        &mut self.runner
    }

    /// Telemetry hub.
    pub fn hub(&self) -> &Arc<TelemetryHub> {
        &self.hub
    }

    /// Store read by telemetry for the latest vision boxes.
    pub fn boxes(&self) -> &BoxStore {
        &self.boxes
    }

    /// Start every task and run until `shutdown` resolves or the server
    /// fails, then stop them all.
    pub async fn run<F>(
        self,
        listener: TcpListener,
        shutdown: F,
    ) -> Result<RunSummary, Box<dyn std::error::Error>>
    where
        F: Future<Output = ()>,
    {
        let (stop_tx, stop_rx) = watch::channel(false);

        let snapshots = self.runner.subscribe();
        let cycle_stop = self.runner.stop_handle();
        let cycle = self.runner.spawn()?;

        let vision = match self.vision {
            Some(worker) => {
                let running = worker.running_flag();
                Some((running, worker.spawn()?))
            }
            None => None,
        };

        let publisher = TelemetryPublisher::new(
            self.hub.clone(),
            snapshots,
            self.boxes.clone(),
            self.config.telemetry.interval(),
        );
        let publisher_task = tokio::spawn(publisher.run(stopped(stop_rx.clone())));
        let mut server_task = tokio::spawn(server::serve(
            listener,
            self.hub.clone(),
            stopped(stop_rx),
        ));

        let early_exit = tokio::select! {
            _ = shutdown => {
                info!("shutdown requested");
                None
            }
            res = &mut server_task => Some(res),
        };

        // ─── Teardown ───────────────────────────────────────────────
        let _ = stop_tx.send(true);
        cycle_stop.stop();

        let server_result = match early_exit {
            Some(res) => res,
            None => server_task.await,
        };
        if let Err(e) = publisher_task.await {
            warn!("telemetry publisher ended abnormally: {}", e);
        }

        if let Some((running, handle)) = vision {
            running.store(false, Ordering::SeqCst);
            tokio::task::spawn_blocking(move || handle.join())
                .await?
                .map_err(|_| "vision thread panicked")?;
        }

        let runner = tokio::task::spawn_blocking(move || cycle.join())
            .await?
            .map_err(|_| "cycle thread panicked")?;

        server_result??;

        let summary = RunSummary {
            ticks: runner.stats().tick_count,
            overruns: runner.stats().overruns,
            completed_cycles: runner.controller().completed_cycles(),
            last_snapshot: runner.controller().snapshot(),
        };
        Ok(summary)
    }
}

impl std::fmt::Debug for LineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineContext")
            .field("runner", &self.runner)
            .field("hub", &self.hub)
            .field("vision", &self.vision.is_some())
            .finish()
    }
}

/// Resolves once the stop flag turns true or its sender is gone.
async fn stopped(mut rx: watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}

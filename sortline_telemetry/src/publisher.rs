//! Periodic telemetry fan-out.
//!
//! Every interval the publisher reads the latest controller snapshot and
//! vision boxes, encodes one frame and offers it to every subscriber. Both
//! reads are non-blocking; the cycle thread is never waited on.

use crate::error::TelemetryError;
use crate::frame::TelemetryFrame;
use crate::hub::TelemetryHub;
use crate::vision::BoxStore;
use sortline_common::snapshot::StateSnapshot;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Composes frames from the latest snapshot and boxes.
#[derive(Debug)]
pub struct TelemetryPublisher {
    hub: Arc<TelemetryHub>,
    snapshots: watch::Receiver<StateSnapshot>,
    boxes: BoxStore,
    interval: Duration,
    published: u64,
}

impl TelemetryPublisher {
    /// Publisher fanning out to `hub` every `interval`.
    pub fn new(
        hub: Arc<TelemetryHub>,
        snapshots: watch::Receiver<StateSnapshot>,
        boxes: BoxStore,
        interval: Duration,
    ) -> Self {
        Self {
            hub,
            snapshots,
            boxes,
            interval,
            published: 0,
        }
    }

    /// Frame for the current snapshot and boxes.
    pub fn frame(&self) -> TelemetryFrame {
        let snapshot = self.snapshots.borrow().clone();
        TelemetryFrame::compose(&snapshot, self.boxes.latest())
    }

    /// Encode and broadcast one frame. Returns the number of receivers.
    pub fn publish_once(&mut self) -> Result<usize, TelemetryError> {
        let json = self.frame().to_json()?;
        self.published += 1;
        Ok(self.hub.broadcast(Arc::from(json)))
    }

    /// Frames published so far.
    pub fn published(&self) -> u64 {
        self.published
    }

    /// Publish every interval until `shutdown` resolves.
    pub async fn run<F>(mut self, shutdown: F) -> Self
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        info!("telemetry publisher started (interval {:?})", self.interval);
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    if self.hub.subscriber_count() == 0 {
                        continue;
                    }
                    match self.publish_once() {
                        Ok(n) => debug!("frame {} sent to {} clients", self.published, n),
                        Err(e) => warn!("failed to encode telemetry frame: {}", e),
                    }
                }
            }
        }
        info!("telemetry publisher stopped after {} frames", self.published);
        self
    }
}

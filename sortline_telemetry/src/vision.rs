//! Vision results.
//!
//! A detector produces bounding boxes at its own pace; the latest result is
//! kept in a [`BoxStore`] that telemetry reads without waiting. Stale boxes
//! are fine, a missed frame is simply replaced by the next one.

use parking_lot::RwLock;
use sortline_common::clock::SharedClock;
use sortline_common::snapshot::BoundingBox;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info};

// ─── Box Store ──────────────────────────────────────────────────────

/// Latest-value cell for detected boxes. Cloning shares the cell.
#[derive(Debug, Clone, Default)]
pub struct BoxStore {
    inner: Arc<RwLock<Vec<BoundingBox>>>,
}

impl BoxStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored boxes.
    pub fn publish(&self, boxes: Vec<BoundingBox>) {
        *self.inner.write() = boxes;
    }

    /// Copy of the latest boxes.
    pub fn latest(&self) -> Vec<BoundingBox> {
        self.inner.read().clone()
    }

    /// Forget the stored boxes.
    pub fn clear(&self) {
        self.inner.write().clear();
    }
}

// ─── Detector ───────────────────────────────────────────────────────

/// Source of bounding boxes, polled once per worker period.
pub trait BoxDetector: Send {
    /// Run one detection pass.
    ///
    /// `None` means no new frame was available; the store keeps its value.
    fn detect(&mut self) -> Option<Vec<BoundingBox>>;
}

impl<F> BoxDetector for F
where
    F: FnMut() -> Option<Vec<BoundingBox>> + Send,
{
    fn detect(&mut self) -> Option<Vec<BoundingBox>> {
        self()
    }
}

// ─── Worker ─────────────────────────────────────────────────────────

/// Runs a detector on a fixed interval and feeds a [`BoxStore`].
pub struct VisionWorker {
    detector: Box<dyn BoxDetector>,
    store: BoxStore,
    clock: SharedClock,
    interval: Duration,
    running: Arc<AtomicBool>,
    passes: u64,
}

impl VisionWorker {
    /// Worker polling `detector` every `interval`.
    pub fn new(
        detector: Box<dyn BoxDetector>,
        store: BoxStore,
        clock: SharedClock,
        interval: Duration,
    ) -> Self {
        Self {
            detector,
            store,
            clock,
            interval,
            running: Arc::new(AtomicBool::new(true)),
            passes: 0,
        }
    }

    /// Flag that ends [`run`](Self::run); store `false` to stop.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    /// Detection passes run so far.
    pub fn passes(&self) -> u64 {
        self.passes
    }

    /// Run one detection pass. Returns true when the store was updated.
    pub fn step(&mut self) -> bool {
        self.passes += 1;
        match self.detector.detect() {
            Some(boxes) => {
                debug!("vision pass {}: {} boxes", self.passes, boxes.len());
                self.store.publish(boxes);
                true
            }
            None => false,
        }
    }

    /// Poll until stopped.
    pub fn run(&mut self) {
        info!("vision worker started (interval {:?})", self.interval);
        while self.running.load(Ordering::SeqCst) {
            let start = self.clock.now();
            self.step();
            let elapsed = self.clock.now().saturating_sub(start);
            if let Some(remaining) = self.interval.checked_sub(elapsed) {
                self.clock.sleep(remaining);
            }
        }
        info!("vision worker stopped after {} passes", self.passes);
    }

    /// Run on a dedicated thread; the worker is handed back on exit.
    pub fn spawn(mut self) -> std::io::Result<JoinHandle<VisionWorker>> {
        std::thread::Builder::new()
            .name("sortline-vision".to_string())
            .spawn(move || {
                self.run();
                self
            })
    }
}

impl std::fmt::Debug for VisionWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisionWorker")
            .field("interval", &self.interval)
            .field("passes", &self.passes)
            .finish()
    }
}

//! Capture unit: pulls frames from a [`FrameSource`] at a fixed cadence
//! and publishes each one to the latest-frame slot.
//!
//! The unit never blocks on the network. If the stream unit is slow, older
//! frames are simply overwritten in the slot.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::pipeline::slot::SlotWriter;
use crate::pipeline::source::FrameSource;
use crate::presenter::{NoopPresenter, Presenter};

/// Default capture rate.
pub const DEFAULT_CAPTURE_FPS: u32 = 24;

/// Highest capture rate accepted; anything above is clamped.
pub const MAX_CAPTURE_FPS: u32 = 60;

// ── CaptureUnit ──────────────────────────────────────────────────

pub struct CaptureUnit {
    source: Box<dyn FrameSource>,
    slot: SlotWriter,
    presenter: Arc<dyn Presenter>,
    interval: Duration,
    cancel: CancellationToken,
}

impl CaptureUnit {
    /// Create a capture unit running at `fps` frames per second
    /// (clamped to `1..=60`).
    pub fn new(
        source: Box<dyn FrameSource>,
        slot: SlotWriter,
        fps: u32,
        cancel: CancellationToken,
    ) -> Self {
        let fps = fps.clamp(1, MAX_CAPTURE_FPS);
        Self {
            source,
            slot,
            presenter: Arc::new(NoopPresenter),
            interval: Duration::from_secs_f64(1.0 / f64::from(fps)),
            cancel,
        }
    }

    /// Attach a presenter that sees every captured frame.
    pub fn with_presenter(mut self, presenter: Arc<dyn Presenter>) -> Self {
        self.presenter = presenter;
        self
    }

    /// Time budget for one capture cycle.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run the capture loop until the source ends, fails, or the unit is
    /// cancelled. Returns the number of frames captured.
    ///
    /// On exit the slot is closed, which tells the stream unit that no more
    /// frames are coming.
    pub async fn run(self) -> u64 {
        let Self {
            mut source,
            slot,
            presenter,
            interval,
            cancel,
        } = self;
        info!("capture started from {} every {interval:?}", source.describe());
        let mut captured: u64 = 0;

        while !cancel.is_cancelled() {
            let loop_start = Instant::now();

            match source.read() {
                Ok(Some(frame)) => {
                    presenter.on_frame(&frame.to_rgb());
                    slot.publish(frame);
                    captured += 1;
                }
                Ok(None) => {
                    debug!("frame source exhausted after {captured} frames");
                    break;
                }
                Err(e) => {
                    warn!("frame source failed: {e}");
                    break;
                }
            }

            if !Self::pace(loop_start, interval, &cancel).await {
                break;
            }
        }

        slot.finish();
        source.release();
        info!(captured, "capture stopped");
        captured
    }

    /// Sleep for the remainder of the cycle. Returns `false` if cancelled
    /// while waiting.
    async fn pace(loop_start: Instant, interval: Duration, cancel: &CancellationToken) -> bool {
        let elapsed = loop_start.elapsed();
        if elapsed >= interval {
            return true;
        }
        tokio::select! {
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(interval - elapsed) => true,
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

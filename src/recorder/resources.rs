//! Resources owned by a recording session and their teardown.
//!
//! Each resource sits in its own `Option` and is `take()`n exactly once by
//! `release`, so teardown is idempotent. A failure releasing one resource is
//! logged and the remaining ones are still released.

use std::time::Duration;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};

use super::analyser::AnalysisGraph;
use super::device::{CaptureStream, FrameReceiver};
use super::encoder::ChunkEncoder;

#[derive(Default)]
pub(crate) struct SessionResources {
    /// Spectrum sampler, present only while recording (not paused)
    pub sampler: Option<Interval>,
    /// Elapsed-seconds timer, present only while recording (not paused)
    pub ticker: Option<Interval>,
    pub encoder: Option<ChunkEncoder>,
    pub graph: Option<AnalysisGraph>,
    pub stream: Option<Box<dyn CaptureStream>>,
    pub frames: Option<FrameReceiver>,
}

impl SessionResources {
    pub fn is_empty(&self) -> bool {
        self.sampler.is_none()
            && self.ticker.is_none()
            && self.encoder.is_none()
            && self.graph.is_none()
            && self.stream.is_none()
            && self.frames.is_none()
    }

    /// Starts the sampler and the elapsed-seconds timer.
    pub fn start_timers(&mut self, sample_every: Duration) {
        self.ticker = Some(periodic(Duration::from_secs(1), MissedTickBehavior::Burst));
        self.sampler = Some(periodic(sample_every, MissedTickBehavior::Skip));
    }

    pub fn stop_timers(&mut self) {
        self.ticker = None;
        self.sampler = None;
    }

    /// Releases everything, consumers before producers.
    pub fn release(&mut self) {
        self.stop_timers();

        if self.encoder.take().is_some() {
            tracing::debug!("Encoder released");
        }

        if let Some(mut graph) = self.graph.take() {
            match graph.close() {
                Ok(()) => tracing::debug!("Analysis graph closed"),
                Err(e) => tracing::warn!("Failed to close analysis graph: {}", e),
            }
        }

        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.close() {
                tracing::warn!("Failed to close input stream: {}", e);
            }
        }

        // Dropped after the stream so the producer never sees a closed channel mid-session.
        self.frames = None;
    }
}

impl Drop for SessionResources {
    fn drop(&mut self) {
        self.release();
    }
}

/// An interval whose first tick is one full period from now.
fn periodic(period: Duration, missed: MissedTickBehavior) -> Interval {
    let mut interval = time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(missed);
    interval
}

/// Waits for the next tick, or forever when the timer is not running.
pub(crate) async fn next_tick(timer: &mut Option<Interval>) {
    match timer {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Waits for the next batch of input frames, or forever when no stream is open.
pub(crate) async fn next_frames(frames: &mut Option<FrameReceiver>) -> Option<Vec<f32>> {
    match frames {
        Some(receiver) => receiver.recv().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::analyser::AnalyserSettings;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingStream {
        closes: Arc<AtomicUsize>,
        fail: bool,
    }

    impl CaptureStream for CountingStream {
        fn sample_rate(&self) -> u32 {
            8000
        }

        fn close(&mut self) -> anyhow::Result<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(anyhow::anyhow!("device wedged"))
            } else {
                Ok(())
            }
        }
    }

    fn populated(closes: &Arc<AtomicUsize>, fail: bool) -> SessionResources {
        let (_tx, rx) = tokio::sync::mpsc::channel(1);
        let mut resources = SessionResources::default();
        resources.encoder = Some(ChunkEncoder::new(8000, Duration::from_secs(1)));
        resources.graph = Some(AnalysisGraph::new(AnalyserSettings::default()).unwrap());
        resources.stream = Some(Box::new(CountingStream {
            closes: Arc::clone(closes),
            fail,
        }));
        resources.frames = Some(rx);
        resources.start_timers(Duration::from_millis(16));
        resources
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let closes = Arc::new(AtomicUsize::new(0));
        let mut resources = populated(&closes, false);
        assert!(!resources.is_empty());

        resources.release();
        resources.release();
        drop(resources);

        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stream_failure_does_not_block_release() {
        let closes = Arc::new(AtomicUsize::new(0));
        let mut resources = populated(&closes, true);

        resources.release();

        assert!(resources.is_empty());
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_waits_a_full_period() {
        let mut timer = Some(periodic(Duration::from_secs(1), MissedTickBehavior::Burst));
        let start = Instant::now();
        next_tick(&mut timer).await;
        assert_eq!(start.elapsed(), Duration::from_secs(1));
    }
}

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Background poller that records the highest number of live topology tasks.
///
/// The count is read every `interval`. A burst that starts and ends between
/// two ticks is not observed, so the reported peak is a lower bound on the
/// true peak concurrency.
pub struct ConcurrencySampler {
    peak: Arc<AtomicUsize>,
    samples: Arc<AtomicUsize>,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl ConcurrencySampler {
    pub fn spawn(tracker: TaskTracker, interval: Duration, parent: &CancellationToken) -> Self {
        let peak = Arc::new(AtomicUsize::new(tracker.len()));
        let samples = Arc::new(AtomicUsize::new(0));
        let token = parent.child_token();

        let task_peak = peak.clone();
        let task_samples = samples.clone();
        let task_token = token.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval.max(Duration::from_micros(100)));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = task_token.cancelled() => break,
                    _ = ticker.tick() => {
                        task_peak.fetch_max(tracker.len(), Ordering::Relaxed);
                        task_samples.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
        });

        Self { peak, samples, token, handle }
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::Relaxed)
    }

    /// Stop polling and return `(peak, samples taken)`.
    pub async fn stop(self) -> (usize, usize) {
        self.token.cancel();
        if let Err(e) = self.handle.await {
            tracing::warn!(error = %e, "concurrency sampler ended abnormally");
        }
        (self.peak.load(Ordering::Relaxed), self.samples.load(Ordering::Relaxed))
    }
}

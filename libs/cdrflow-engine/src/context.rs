use std::future::Future;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use cdrflow_api::StageSet;

/// A receiver shared by several workers of one pool.
pub type SharedReceiver<T> = Arc<Mutex<mpsc::Receiver<T>>>;

// ═══════════════════════════════════════════════════════════════
//  RunContext
// ═══════════════════════════════════════════════════════════════

/// Всё, что нужно топологии, чтобы поднять воркеров на один прогон.
///
/// Every task a topology spawns goes through [`RunContext::spawn`], so the
/// tracker both counts live workers and lets the caller wait for all of them.
#[derive(Clone)]
pub struct RunContext {
    pub stages: Arc<StageSet>,
    pub token: CancellationToken,
    pub tracker: TaskTracker,
}

impl RunContext {
    pub fn new(stages: Arc<StageSet>, token: CancellationToken) -> Self {
        Self {
            stages,
            token,
            tracker: TaskTracker::new(),
        }
    }

    pub fn spawn<F>(&self, task: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tracker.spawn(task)
    }

    /// Number of topology tasks currently alive.
    pub fn live_tasks(&self) -> usize {
        self.tracker.len()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Wait until every tracked task has exited.
    pub async fn shutdown(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }
}

// ═══════════════════════════════════════════════════════════════
//  Cancellation-aware channel operations
// ═══════════════════════════════════════════════════════════════
//
// All selects are biased toward the token: once cancellation is observed no
// further record crosses a channel.

/// `None` when the channel is closed or the run is cancelled.
pub async fn recv_or_cancel<T>(rx: &mut mpsc::Receiver<T>, token: &CancellationToken) -> Option<T> {
    tokio::select! {
        biased;
        _ = token.cancelled() => None,
        item = rx.recv() => item,
    }
}

/// Like [`recv_or_cancel`] for a receiver shared between workers.
///
/// Лок держится только пока ждём следующую запись.
pub async fn recv_shared<T>(rx: &SharedReceiver<T>, token: &CancellationToken) -> Option<T> {
    tokio::select! {
        biased;
        _ = token.cancelled() => None,
        item = async { rx.lock().await.recv().await } => item,
    }
}

/// `false` when the receiver is gone or the run is cancelled; the record is dropped.
pub async fn send_or_cancel<T>(tx: &mpsc::Sender<T>, item: T, token: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        _ = token.cancelled() => false,
        res = tx.send(item) => res.is_ok(),
    }
}

/// Drive `work` to completion unless the run is cancelled first.
pub async fn run_or_cancel<F: Future>(work: F, token: &CancellationToken) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = token.cancelled() => None,
        out = work => Some(out),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_recv_returns_none_after_cancel() {
        let (tx, mut rx) = mpsc::channel::<u32>(4);
        let token = CancellationToken::new();
        tx.send(1).await.unwrap();
        token.cancel();
        assert_eq!(recv_or_cancel(&mut rx, &token).await, None);
    }

    #[tokio::test]
    async fn test_send_blocked_on_full_channel_observes_cancel() {
        let (tx, _rx) = mpsc::channel::<u32>(1);
        let token = CancellationToken::new();
        assert!(send_or_cancel(&tx, 1, &token).await);

        let t = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            t.cancel();
        });
        assert!(!send_or_cancel(&tx, 2, &token).await);
    }

    #[tokio::test]
    async fn test_send_to_dropped_receiver() {
        let (tx, rx) = mpsc::channel::<u32>(1);
        drop(rx);
        assert!(!send_or_cancel(&tx, 1, &CancellationToken::new()).await);
    }

    #[tokio::test]
    async fn test_shared_receiver_drains_in_order() {
        let (tx, rx) = mpsc::channel::<u32>(8);
        let shared: SharedReceiver<u32> = Arc::new(Mutex::new(rx));
        let token = CancellationToken::new();
        for i in 0..3 {
            tx.send(i).await.unwrap();
        }
        drop(tx);
        assert_eq!(recv_shared(&shared, &token).await, Some(0));
        assert_eq!(recv_shared(&shared, &token).await, Some(1));
        assert_eq!(recv_shared(&shared, &token).await, Some(2));
        assert_eq!(recv_shared(&shared, &token).await, None);
    }

    #[tokio::test]
    async fn test_run_or_cancel_aborts_long_work() {
        let token = CancellationToken::new();
        token.cancel();
        let out = run_or_cancel(tokio::time::sleep(Duration::from_secs(60)), &token).await;
        assert!(out.is_none());
    }
}

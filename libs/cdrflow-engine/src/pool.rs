use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};

use cdrflow_api::CallRecord;

use crate::context::{RunContext, SharedReceiver, recv_shared, run_or_cancel, send_or_cancel};
use crate::topology::Topology;

/// Плоский пул: W воркеров, общий вход, общий выход.
///
/// Воркер прогоняет запись через все шесть стадий и только потом берёт
/// следующую, так что медленная запись держит воркер на сумму всех задержек.
pub struct WorkerPool {
    workers: usize,
    buffer: usize,
}

impl WorkerPool {
    pub fn new(workers: usize, buffer: usize) -> Self {
        Self {
            workers: workers.max(1),
            buffer: buffer.max(1),
        }
    }
}

impl Topology for WorkerPool {
    fn name(&self) -> &'static str {
        "pool"
    }

    fn describe(&self) -> String {
        format!("workers={} buffer={}", self.workers, self.buffer)
    }

    fn start(&self, ctx: &RunContext, input: mpsc::Receiver<CallRecord>) -> mpsc::Receiver<CallRecord> {
        let shared: SharedReceiver<CallRecord> = Arc::new(Mutex::new(input));
        let (tx, rx) = mpsc::channel(self.buffer);

        for worker in 0..self.workers {
            let shared = shared.clone();
            let tx = tx.clone();
            let stages = ctx.stages.clone();
            let token = ctx.token.clone();
            ctx.spawn(async move {
                let mut processed = 0u64;
                while let Some(mut record) = recv_shared(&shared, &token).await {
                    if run_or_cancel(stages.apply_all(&mut record), &token).await.is_none() {
                        break;
                    }
                    if !send_or_cancel(&tx, record, &token).await {
                        break;
                    }
                    processed += 1;
                }
                tracing::debug!(worker, processed, "pool worker stopped");
            });
        }

        tracing::info!(topology = "pool", workers = self.workers, buffer = self.buffer, "topology started");
        rx
    }
}

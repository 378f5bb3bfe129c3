use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};

use cdrflow_api::CallRecord;

use crate::context::{RunContext, recv_or_cancel, run_or_cancel, send_or_cancel};
use crate::topology::Topology;

/// One task per record, at most `permits` alive at a time.
///
/// The dispatcher acquires a permit before spawning. The record task keeps it
/// until its record has been handed to the output (or dropped on cancel), so
/// in-flight records and live record tasks are both bounded by `permits`.
/// Workers are never reused.
pub struct BoundedSemaphore {
    permits: usize,
    buffer: usize,
}

impl BoundedSemaphore {
    pub fn new(permits: usize, buffer: usize) -> Self {
        Self {
            permits: permits.max(1),
            buffer: buffer.max(1),
        }
    }
}

impl Topology for BoundedSemaphore {
    fn name(&self) -> &'static str {
        "semaphore"
    }

    fn describe(&self) -> String {
        format!("permits={} buffer={}", self.permits, self.buffer)
    }

    fn start(&self, ctx: &RunContext, mut input: mpsc::Receiver<CallRecord>) -> mpsc::Receiver<CallRecord> {
        let (tx, rx) = mpsc::channel(self.buffer);
        let semaphore = Arc::new(Semaphore::new(self.permits));
        let dispatch_ctx = ctx.clone();

        ctx.spawn(async move {
            let token = dispatch_ctx.token.clone();
            let mut launched = 0u64;

            while let Some(mut record) = recv_or_cancel(&mut input, &token).await {
                let permit = tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    permit = semaphore.clone().acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => break,
                    },
                };

                let tx = tx.clone();
                let stages = dispatch_ctx.stages.clone();
                let token = token.clone();
                dispatch_ctx.spawn(async move {
                    let _permit = permit;
                    if run_or_cancel(stages.apply_all(&mut record), &token).await.is_none() {
                        return;
                    }
                    send_or_cancel(&tx, record, &token).await;
                });
                launched += 1;
            }

            tracing::debug!(launched, "semaphore dispatcher stopped");
            // the output closes when this task and every record task have dropped their sender
        });

        tracing::info!(topology = "semaphore", permits = self.permits, buffer = self.buffer, "topology started");
        rx
    }
}

use tokio::sync::mpsc;

use cdrflow_api::CallRecord;

use crate::context::{RunContext, recv_or_cancel, run_or_cancel, send_or_cancel};
use crate::topology::Topology;

// ═══════════════════════════════════════════════════════════════
//  Fan-Out / Fan-In
// ═══════════════════════════════════════════════════════════════

/// Dispatcher → W private workers → collector.
///
/// The dispatcher hands records out strictly round-robin. Each worker has its
/// own input and output channel, so a slow worker stalls only the records
/// assigned to it (and the dispatcher, once it comes back around to that worker).
pub struct FanOutFanIn {
    workers: usize,
    buffer: usize,
}

impl FanOutFanIn {
    pub fn new(workers: usize, buffer: usize) -> Self {
        Self {
            workers: workers.max(1),
            buffer: buffer.max(1),
        }
    }

    fn spawn_workers(
        &self,
        ctx: &RunContext,
    ) -> (Vec<mpsc::Sender<CallRecord>>, Vec<mpsc::Receiver<CallRecord>>) {
        let mut inputs = Vec::with_capacity(self.workers);
        let mut outputs = Vec::with_capacity(self.workers);

        for worker in 0..self.workers {
            let (in_tx, mut in_rx) = mpsc::channel::<CallRecord>(self.buffer);
            let (out_tx, out_rx) = mpsc::channel::<CallRecord>(self.buffer);
            inputs.push(in_tx);
            outputs.push(out_rx);

            let stages = ctx.stages.clone();
            let token = ctx.token.clone();
            ctx.spawn(async move {
                let mut processed = 0u64;
                while let Some(mut record) = recv_or_cancel(&mut in_rx, &token).await {
                    if run_or_cancel(stages.apply_all(&mut record), &token).await.is_none() {
                        break;
                    }
                    if !send_or_cancel(&out_tx, record, &token).await {
                        break;
                    }
                    processed += 1;
                }
                // out_tx dropped here: the collector sees this worker's output close
                tracing::debug!(worker, processed, "fan-out worker stopped");
            });
        }

        (inputs, outputs)
    }

    fn spawn_dispatcher(
        &self,
        ctx: &RunContext,
        mut input: mpsc::Receiver<CallRecord>,
        worker_inputs: Vec<mpsc::Sender<CallRecord>>,
    ) {
        let token = ctx.token.clone();
        ctx.spawn(async move {
            let mut next = 0usize;
            let mut dispatched = 0u64;
            while let Some(record) = recv_or_cancel(&mut input, &token).await {
                // Блокируемся на занятом воркере, даже если остальные свободны.
                if !send_or_cancel(&worker_inputs[next], record, &token).await {
                    break;
                }
                next = (next + 1) % worker_inputs.len();
                dispatched += 1;
            }
            tracing::debug!(dispatched, "fan-out dispatcher stopped");
            // dropping worker_inputs closes every worker's input
        });
    }
}

impl Topology for FanOutFanIn {
    fn name(&self) -> &'static str {
        "fanout"
    }

    fn describe(&self) -> String {
        format!("workers={} buffer={}", self.workers, self.buffer)
    }

    fn start(&self, ctx: &RunContext, input: mpsc::Receiver<CallRecord>) -> mpsc::Receiver<CallRecord> {
        let (worker_inputs, worker_outputs) = self.spawn_workers(ctx);
        self.spawn_dispatcher(ctx, input, worker_inputs);
        tracing::info!(topology = "fanout", workers = self.workers, buffer = self.buffer, "topology started");
        fan_in(ctx, worker_outputs, self.buffer)
    }
}

/// Merge several streams into one.
///
/// One forwarding task per input; the merged output closes once every
/// forwarder has exited.
pub fn fan_in(
    ctx: &RunContext,
    inputs: Vec<mpsc::Receiver<CallRecord>>,
    buffer: usize,
) -> mpsc::Receiver<CallRecord> {
    let (tx, rx) = mpsc::channel(buffer.max(1));

    for mut input in inputs {
        let tx = tx.clone();
        let token = ctx.token.clone();
        ctx.spawn(async move {
            while let Some(record) = recv_or_cancel(&mut input, &token).await {
                if !send_or_cancel(&tx, record, &token).await {
                    break;
                }
            }
        });
    }

    rx
}

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};

use cdrflow_api::{CallRecord, Enricher, StageSet, stage_slot};

use crate::context::{RunContext, SharedReceiver, recv_shared, run_or_cancel, send_or_cancel};
use crate::topology::Topology;

// ═══════════════════════════════════════════════════════════════
//  Staged Pipeline (daisy chain)
// ═══════════════════════════════════════════════════════════════

/// One worker pool per stage, chained stage 1 → stage 6.
///
/// Each adapter owns its input and output channel. A saturated stage stops
/// pulling from its input, which blocks the previous stage's senders, and so
/// on back to the generator.
pub struct StagedPipeline {
    stage_workers: Vec<usize>,
    buffer: usize,
}

impl StagedPipeline {
    pub fn new(stage_workers: Vec<usize>, buffer: usize) -> Self {
        Self {
            stage_workers,
            buffer: buffer.max(1),
        }
    }

    /// Width of `stage_name`, looked up by name so a reordered stage keeps its
    /// pool. Stages outside the standard six use their position.
    fn workers_for(&self, stage_name: &str, position: usize) -> usize {
        let slot = stage_slot(stage_name).unwrap_or(position);
        self.stage_workers.get(slot).copied().unwrap_or(1).max(1)
    }

    /// `(stage, workers)` in the order the stages will be chained.
    pub fn stage_widths(&self, stages: &StageSet) -> Vec<(&'static str, usize)> {
        stages
            .stages()
            .iter()
            .enumerate()
            .map(|(position, stage)| (stage.name(), self.workers_for(stage.name(), position)))
            .collect()
    }
}

impl Topology for StagedPipeline {
    fn name(&self) -> &'static str {
        "pipeline"
    }

    fn describe(&self) -> String {
        format!("stage_workers={:?} buffer={}", self.stage_workers, self.buffer)
    }

    fn start(&self, ctx: &RunContext, input: mpsc::Receiver<CallRecord>) -> mpsc::Receiver<CallRecord> {
        let mut stream = input;
        for (position, stage) in ctx.stages.stages().iter().enumerate() {
            let workers = self.workers_for(stage.name(), position);
            stream = spawn_stage(ctx, stage.clone(), workers, self.buffer, stream);
        }
        tracing::info!(
            topology = "pipeline",
            stages = ctx.stages.len(),
            stage_workers = ?self.stage_workers,
            buffer = self.buffer,
            "topology started"
        );
        stream
    }
}

/// Start `workers` tasks applying `stage` to records pulled from `input`.
///
/// The returned receiver closes only after every worker of this stage has
/// drained its input (or been cancelled) and exited.
fn spawn_stage(
    ctx: &RunContext,
    stage: Arc<dyn Enricher>,
    workers: usize,
    buffer: usize,
    input: mpsc::Receiver<CallRecord>,
) -> mpsc::Receiver<CallRecord> {
    let shared: SharedReceiver<CallRecord> = Arc::new(Mutex::new(input));
    let (tx, rx) = mpsc::channel(buffer);

    for worker in 0..workers {
        let shared = shared.clone();
        let stage = stage.clone();
        let tx = tx.clone();
        let token = ctx.token.clone();
        ctx.spawn(async move {
            let mut processed = 0u64;
            while let Some(mut record) = recv_shared(&shared, &token).await {
                if run_or_cancel(stage.apply(&mut record), &token).await.is_none() {
                    break;
                }
                if !send_or_cancel(&tx, record, &token).await {
                    break;
                }
                processed += 1;
            }
            tracing::debug!(stage = stage.name(), worker, processed, "stage worker stopped");
        });
    }

    tracing::debug!(stage = stage.name(), workers, "stage started");
    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdrflow_api::{RateZoneTable, StageConfig, StageOrder};

    fn stage_set(order: StageOrder) -> StageSet {
        let config = StageConfig { order, ..StageConfig::instant() };
        StageSet::build(&config, Arc::new(RateZoneTable::build(10))).unwrap()
    }

    #[test]
    fn test_widths_follow_stage_names() {
        let pipeline = StagedPipeline::new(vec![1, 20, 5, 5, 50, 20], 1);

        let hash_first = pipeline.stage_widths(&stage_set(StageOrder::HashFirst));
        assert_eq!(hash_first[3], ("anonymized-id", 5));
        assert_eq!(hash_first[4], ("home-operator", 50));

        let operator_first = pipeline.stage_widths(&stage_set(StageOrder::OperatorFirst));
        assert_eq!(operator_first[3], ("home-operator", 50));
        assert_eq!(operator_first[4], ("anonymized-id", 5));
        assert_eq!(operator_first[0], ("duration", 1));
        assert_eq!(operator_first[5], ("risk-score", 20));
    }

    #[test]
    fn test_unknown_stages_use_position() {
        let pipeline = StagedPipeline::new(vec![3], 1);
        let stages = StageSet::from_stages(vec![Arc::new(cdrflow_api::stage::CalculateDuration) as Arc<dyn Enricher>]);
        assert_eq!(pipeline.stage_widths(&stages), vec![("duration", 3)]);
        assert_eq!(pipeline.workers_for("custom", 0), 3);
        assert_eq!(pipeline.workers_for("custom", 7), 1);
    }
}

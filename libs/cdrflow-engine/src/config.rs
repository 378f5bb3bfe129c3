use serde::{Deserialize, Serialize};

use cdrflow_api::stage::STAGE_COUNT;

use crate::error::EngineError;
use crate::fanout::FanOutFanIn;
use crate::pipeline::StagedPipeline;
use crate::pool::WorkerPool;
use crate::semaphore::BoundedSemaphore;
use crate::topology::{Topology, TopologyKind};

fn default_buffer() -> usize {
    1
}

// ═══════════════════════════════════════════════════════════════
//  Per-topology sizing
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FanOutConfig {
    #[serde(default = "default_fanout_workers")]
    pub workers: usize,
    #[serde(default = "default_buffer")]
    pub buffer: usize,
}

fn default_fanout_workers() -> usize {
    500
}

impl Default for FanOutConfig {
    fn default() -> Self {
        Self { workers: default_fanout_workers(), buffer: default_buffer() }
    }
}

/// Workers per stage, listed as duration, direction, rate-zone, anonymized-id,
/// home-operator, risk-score. Each width follows its stage when `[stages] order`
/// swaps two of them. I/O-bound stages get the wide pools.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_stage_workers")]
    pub stage_workers: Vec<usize>,
    #[serde(default = "default_buffer")]
    pub buffer: usize,
}

fn default_stage_workers() -> Vec<usize> {
    vec![1, 20, 5, 5, 50, 20]
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { stage_workers: default_stage_workers(), buffer: default_buffer() }
    }
}

impl PipelineConfig {
    /// Same width for every stage.
    pub fn uniform(workers: usize) -> Self {
        Self { stage_workers: vec![workers; STAGE_COUNT], buffer: default_buffer() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    #[serde(default = "default_pool_workers")]
    pub workers: usize,
    #[serde(default = "default_buffer")]
    pub buffer: usize,
}

fn default_pool_workers() -> usize {
    600
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self { workers: default_pool_workers(), buffer: default_buffer() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemaphoreConfig {
    #[serde(default = "default_permits")]
    pub permits: usize,
    #[serde(default = "default_buffer")]
    pub buffer: usize,
}

fn default_permits() -> usize {
    600
}

impl Default for SemaphoreConfig {
    fn default() -> Self {
        Self { permits: default_permits(), buffer: default_buffer() }
    }
}

// ═══════════════════════════════════════════════════════════════
//  TopologyConfig
// ═══════════════════════════════════════════════════════════════

/// `[topologies]` section: sizing for all four topologies.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologyConfig {
    pub fanout: FanOutConfig,
    pub pipeline: PipelineConfig,
    pub pool: PoolConfig,
    pub semaphore: SemaphoreConfig,
}

impl TopologyConfig {
    /// Override the worker (or permit) count of one topology.
    ///
    /// For the pipeline every stage gets `workers`.
    pub fn set_workers(&mut self, kind: TopologyKind, workers: usize) {
        match kind {
            TopologyKind::Fanout => self.fanout.workers = workers,
            TopologyKind::Pipeline => self.pipeline.stage_workers = vec![workers; STAGE_COUNT],
            TopologyKind::Pool => self.pool.workers = workers,
            TopologyKind::Semaphore => self.semaphore.permits = workers,
        }
    }

    /// Override the channel capacity of every topology.
    pub fn set_buffer(&mut self, buffer: usize) {
        self.fanout.buffer = buffer;
        self.pipeline.buffer = buffer;
        self.pool.buffer = buffer;
        self.semaphore.buffer = buffer;
    }

    pub fn validate(&self, kind: TopologyKind) -> Result<(), EngineError> {
        let name = kind.as_str();
        let (workers, buffer) = match kind {
            TopologyKind::Fanout => (self.fanout.workers, self.fanout.buffer),
            TopologyKind::Pipeline => {
                if self.pipeline.stage_workers.len() != STAGE_COUNT {
                    return Err(EngineError::config(
                        name,
                        format!(
                            "stage_workers has {} entries, expected {STAGE_COUNT}",
                            self.pipeline.stage_workers.len()
                        ),
                    ));
                }
                let min = self.pipeline.stage_workers.iter().copied().min().unwrap_or(0);
                (min, self.pipeline.buffer)
            }
            TopologyKind::Pool => (self.pool.workers, self.pool.buffer),
            TopologyKind::Semaphore => (self.semaphore.permits, self.semaphore.buffer),
        };
        if workers == 0 {
            return Err(EngineError::config(name, "worker count must be at least 1"));
        }
        if buffer == 0 {
            return Err(EngineError::config(name, "buffer must be at least 1"));
        }
        Ok(())
    }

    pub fn build(&self, kind: TopologyKind) -> Result<Box<dyn Topology>, EngineError> {
        self.validate(kind)?;
        Ok(match kind {
            TopologyKind::Fanout => Box::new(FanOutFanIn::new(self.fanout.workers, self.fanout.buffer)),
            TopologyKind::Pipeline => Box::new(StagedPipeline::new(
                self.pipeline.stage_workers.clone(),
                self.pipeline.buffer,
            )),
            TopologyKind::Pool => Box::new(WorkerPool::new(self.pool.workers, self.pool.buffer)),
            TopologyKind::Semaphore => {
                Box::new(BoundedSemaphore::new(self.semaphore.permits, self.semaphore.buffer))
            }
        })
    }
}

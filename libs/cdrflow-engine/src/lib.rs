pub mod config;
pub mod context;
pub mod error;
mod fanout;
mod pipeline;
mod pool;
mod semaphore;
pub mod topology;

pub use config::{FanOutConfig, PipelineConfig, PoolConfig, SemaphoreConfig, TopologyConfig};
pub use context::{RunContext, SharedReceiver, recv_or_cancel, recv_shared, run_or_cancel, send_or_cancel};
pub use error::EngineError;
pub use fanout::{FanOutFanIn, fan_in};
pub use pipeline::StagedPipeline;
pub use pool::WorkerPool;
pub use semaphore::BoundedSemaphore;
pub use topology::{Topology, TopologyKind};

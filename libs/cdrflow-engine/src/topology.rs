use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use cdrflow_api::CallRecord;

use crate::context::RunContext;
use crate::error::EngineError;

/// A strategy for mapping the enrichment stages onto concurrent workers.
///
/// `start` wires workers and channels on `ctx` and returns the output stream.
/// Given N input records and no cancellation, the output yields exactly those
/// N records, fully enriched, in unspecified order, and then closes.
/// Must be called from within a Tokio runtime.
pub trait Topology: Send + Sync {
    fn name(&self) -> &'static str;

    /// Short human-readable summary of the sizing parameters.
    fn describe(&self) -> String;

    fn start(&self, ctx: &RunContext, input: mpsc::Receiver<CallRecord>) -> mpsc::Receiver<CallRecord>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TopologyKind {
    #[serde(alias = "fanout-fanin")]
    Fanout,
    Pipeline,
    Pool,
    Semaphore,
}

impl TopologyKind {
    pub const ALL: [TopologyKind; 4] = [
        TopologyKind::Fanout,
        TopologyKind::Pipeline,
        TopologyKind::Pool,
        TopologyKind::Semaphore,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TopologyKind::Fanout => "fanout",
            TopologyKind::Pipeline => "pipeline",
            TopologyKind::Pool => "pool",
            TopologyKind::Semaphore => "semaphore",
        }
    }
}

impl std::fmt::Display for TopologyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TopologyKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fanout" | "fanout-fanin" | "fan-out" => Ok(TopologyKind::Fanout),
            "pipeline" => Ok(TopologyKind::Pipeline),
            "pool" | "worker-pool" => Ok(TopologyKind::Pool),
            "semaphore" => Ok(TopologyKind::Semaphore),
            other => Err(EngineError::UnknownTopology(other.to_string())),
        }
    }
}

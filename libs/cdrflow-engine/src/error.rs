#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("topology config ({topology}): {detail}")]
    Config { topology: &'static str, detail: String },

    #[error("unknown topology '{0}' (expected one of: fanout, pipeline, pool, semaphore)")]
    UnknownTopology(String),
}

impl EngineError {
    pub(crate) fn config(topology: &'static str, detail: impl Into<String>) -> Self {
        EngineError::Config { topology, detail: detail.into() }
    }
}

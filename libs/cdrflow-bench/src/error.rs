#[derive(Debug, thiserror::Error)]
pub enum BenchError {
    #[error("data loss detected! sent {sent}, received {received}")]
    DataLoss { sent: u64, received: u64 },

    #[error("duplicate record emitted: {call_id}")]
    Duplicate { call_id: String },

    #[error("record {call_id} was never injected")]
    Unknown { call_id: String },

    #[error("record {call_id} left the topology with identity fields changed")]
    IdentityMismatch { call_id: String },

    #[error("record {call_id} is missing derived fields: {missing:?}")]
    Incomplete { call_id: String, missing: Vec<&'static str> },

    #[error("run interrupted after {received} of {sent} records")]
    Interrupted { sent: u64, received: u64 },

    #[error("{0}")]
    Engine(#[from] cdrflow_engine::EngineError),

    #[error("{0}")]
    Stage(#[from] cdrflow_api::StageError),
}

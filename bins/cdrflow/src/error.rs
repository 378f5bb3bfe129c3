#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("config ({context}): {detail}")]
    Config { context: &'static str, detail: String },

    #[error("{0}")]
    Stage(#[from] cdrflow_api::StageError),

    #[error("{0}")]
    Engine(#[from] cdrflow_engine::EngineError),

    #[error("{0}")]
    Bench(#[from] cdrflow_bench::BenchError),

    #[error("output: {0}")]
    Output(#[from] serde_json::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

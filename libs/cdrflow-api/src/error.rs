#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error("stage config ({field}): {detail}")]
    InvalidConfig { field: &'static str, detail: String },
}

impl StageError {
    pub(crate) fn invalid(field: &'static str, detail: impl Into<String>) -> Self {
        StageError::InvalidConfig { field, detail: detail.into() }
    }
}

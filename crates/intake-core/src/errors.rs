use crate::validate::FieldIssue;
use thiserror::Error;

/// Error kinds surfaced by the engine. The HTTP layer owns the mapping to
/// status codes; nothing here knows about the wire.
#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("answer validation failed")]
    ValidationFailed(Vec<FieldIssue>),

    #[error("form template {0} not found in study")]
    TemplateNotFound(i64),

    #[error("no submission found for participant")]
    NotFound,

    #[error("compute dependency cycle at '{0}'")]
    ComputeCycle(String),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, IntakeError>;

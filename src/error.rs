use thiserror::Error;

/// Errors surfaced by the simulator's library operations.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("invalid domain: {0}")]
    InvalidDomain(String),
    #[error("unknown rule target: {0}")]
    UnknownRuleTarget(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type SimResult<T> = Result<T, SimError>;

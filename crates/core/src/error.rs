use thiserror::Error;

pub type AttributionResult<T> = Result<T, AttributionError>;

#[derive(Error, Debug)]
pub enum AttributionError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid attribution window: {0} days (expected 30, 60, 90, or unbounded)")]
    InvalidWindow(u32),

    #[error("Unknown weighting model: {0}")]
    InvalidModel(String),

    #[error("Unknown matching mode: {0}")]
    InvalidMatchingMode(String),

    #[error("Fact store error: {0}")]
    Store(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

use thiserror::Error;

use crate::job::JobStatus;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    #[error("Invalid layout element: {0}")]
    InvalidElement(String),

    #[error("Duration out of range: {0}s")]
    InvalidDuration(f64),

    #[error("Font error: {0}")]
    Font(String),

    #[error("Story has no pages: {0}")]
    NoPages(uuid::Uuid),

    #[error("Invalid job transition from {from} to {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },
}

pub type Result<T> = std::result::Result<T, CoreError>;

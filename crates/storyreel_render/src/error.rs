use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use storyreel_core::CoreError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("story not found: {0}")]
    StoryNotFound(Uuid),

    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("unsupported feature: {0}")]
    Unsupported(String),

    #[error("failed to execute ffprobe: {0}")]
    FfprobeExec(String),

    #[error("probe failed for {path}: {reason}")]
    ProbeFailed { path: PathBuf, reason: String },

    #[error("ffmpeg not found at {0}")]
    FfmpegNotFound(PathBuf),

    #[error("ffmpeg failed: {message}")]
    EncodeFailed {
        message: String,
        /// Last lines the encoder wrote to stderr.
        stderr_tail: String,
    },

    #[error("video generated at {path} but not recorded: {reason}")]
    Persistence { path: PathBuf, reason: String },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("{collaborator} failed: {reason}")]
    Collaborator {
        collaborator: &'static str,
        reason: String,
    },

    #[error("composition cancelled")]
    Cancelled,

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RenderError>;

/// Coarse failure classes reported to job consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    NotFound,
    ValidationFailure,
    UnsupportedFeature,
    ProbeFailure,
    EncodeFailure,
    PersistenceFailure,
    Cancelled,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::NotFound => "not-found",
            ErrorKind::ValidationFailure => "validation-failure",
            ErrorKind::UnsupportedFeature => "unsupported-feature",
            ErrorKind::ProbeFailure => "probe-failure",
            ErrorKind::EncodeFailure => "encode-failure",
            ErrorKind::PersistenceFailure => "persistence-failure",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Internal => "internal",
        };
        f.write_str(s)
    }
}

impl RenderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RenderError::StoryNotFound(_) | RenderError::FileNotFound(_) => ErrorKind::NotFound,
            RenderError::Unsupported(_) => ErrorKind::UnsupportedFeature,
            RenderError::FfprobeExec(_) | RenderError::ProbeFailed { .. } => {
                ErrorKind::ProbeFailure
            }
            RenderError::FfmpegNotFound(_) | RenderError::EncodeFailed { .. } => {
                ErrorKind::EncodeFailure
            }
            RenderError::Persistence { .. } => ErrorKind::PersistenceFailure,
            RenderError::Cancelled => ErrorKind::Cancelled,
            RenderError::Core(e) => match e {
                CoreError::NoPages(_) => ErrorKind::NotFound,
                CoreError::InvalidSettings(_) | CoreError::InvalidElement(_) => {
                    ErrorKind::ValidationFailure
                }
                _ => ErrorKind::Internal,
            },
            RenderError::Storage(_)
            | RenderError::Collaborator { .. }
            | RenderError::Io(_)
            | RenderError::Json(_) => ErrorKind::Internal,
        }
    }

    /// Message plus any captured encoder output, for job metadata.
    pub fn diagnostic(&self) -> String {
        match self {
            RenderError::EncodeFailed {
                message,
                stderr_tail,
            } if !stderr_tail.is_empty() => format!("{message}\n{stderr_tail}"),
            other => other.to_string(),
        }
    }

    pub(crate) fn collaborator(collaborator: &'static str, err: anyhow::Error) -> Self {
        RenderError::Collaborator {
            collaborator,
            reason: format!("{err:#}"),
        }
    }
}

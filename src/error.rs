use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportLensError {
    #[error("{0}")]
    Input(String),

    #[error("Failed to fetch report: {0}")]
    Api(String),

    #[error("Failed to fetch report: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid JSON received from Allure (see {})", .path.display())]
    InvalidReport {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to upload embeddings: {0}")]
    Upload(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Caller-visible classification of a failed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Input,
    Transport,
    Format,
    DurableArtifact,
    Internal,
}

impl ReportLensError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Input(_) => ErrorKind::Input,
            Self::Api(_) | Self::Network(_) => ErrorKind::Transport,
            Self::InvalidReport { .. } => ErrorKind::Format,
            Self::Upload(_) => ErrorKind::DurableArtifact,
            Self::Config(_) | Self::Json(_) | Self::Io(_) => ErrorKind::Internal,
        }
    }
}

pub type Result<T> = std::result::Result<T, ReportLensError>;

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DubError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("A dubbing run is already in progress")]
    Concurrency,

    #[error("Artifact storage error: {0}")]
    Storage(String),

    #[error("Media processing error: {0}")]
    Media(String),

    #[error("Speech recognition error: {0}")]
    Recognition(String),

    #[error("Translation error: {0}")]
    Translation(String),

    #[error("Voice synthesis error: {0}")]
    Synthesis(String),

    #[error("Lip-sync error: {0}")]
    Sync(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, DubError>;

/// Failure classes a run can terminate with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Validation,
    Concurrency,
    Storage,
    Media,
    Recognition,
    Translation,
    Synthesis,
    Sync,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "ValidationError",
            Self::Concurrency => "ConcurrencyError",
            Self::Storage => "StorageError",
            Self::Media => "MediaError",
            Self::Recognition => "RecognitionError",
            Self::Translation => "TranslationError",
            Self::Synthesis => "SynthesisError",
            Self::Sync => "SyncError",
            Self::Internal => "InternalError",
        }
    }

    /// Kinds raised by an external collaborator behind a stage.
    pub fn is_collaborator_failure(&self) -> bool {
        matches!(
            self,
            Self::Media | Self::Recognition | Self::Translation | Self::Synthesis | Self::Sync
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl DubError {
    /// Kind this error carries on its own, if any.
    ///
    /// Transport-level errors (I/O, JSON, HTTP) have no intrinsic kind; the
    /// stage they surface in decides how to classify them.
    pub fn intrinsic_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Io(_) | Self::Json(_) | Self::Http(_) => None,
            Self::Validation(_) | Self::Toml(_) | Self::Config(_) => Some(ErrorKind::Validation),
            Self::Concurrency => Some(ErrorKind::Concurrency),
            Self::Storage(_) => Some(ErrorKind::Storage),
            Self::Media(_) => Some(ErrorKind::Media),
            Self::Recognition(_) => Some(ErrorKind::Recognition),
            Self::Translation(_) => Some(ErrorKind::Translation),
            Self::Synthesis(_) => Some(ErrorKind::Synthesis),
            Self::Sync(_) => Some(ErrorKind::Sync),
            Self::Internal(_) => Some(ErrorKind::Internal),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.intrinsic_kind().unwrap_or(ErrorKind::Internal)
    }
}

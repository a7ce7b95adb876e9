//! Error types for publishing bundles to Google Play.

use std::{fmt, path::PathBuf};
use thiserror::Error;

/// The remote step a publish run was attempting when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStage {
    Authenticate,
    OpenEdit,
    UploadBundle,
    UpdateTrack,
    CommitEdit,
    DiscardEdit,
}

impl fmt::Display for UploadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UploadStage::Authenticate => "authenticate",
            UploadStage::OpenEdit => "open edit",
            UploadStage::UploadBundle => "upload bundle",
            UploadStage::UpdateTrack => "update track",
            UploadStage::CommitEdit => "commit edit",
            UploadStage::DiscardEdit => "discard edit",
        };
        write!(f, "{name}")
    }
}

/// Main error type for publish operations.
#[derive(Error, Debug)]
pub enum PublishError {
    // Configuration errors
    #[error("Service account credentials not found: env var {0} is not set")]
    MissingCredentials(String),

    #[error("Invalid service account credentials: {0}")]
    InvalidCredentials(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Network/API errors
    #[error("API authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Play API rejected credentials during {stage}: {message}")]
    Unauthorized { stage: UploadStage, message: String },

    #[error("Play API request failed during {stage} ({status}): {message}")]
    ApiError {
        stage: UploadStage,
        status: u16,
        message: String,
    },

    #[error("Network request failed: {0}")]
    NetworkError(String),

    // Local I/O errors
    #[error("Failed to read bundle {}: {source}", path.display())]
    BundleReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON parse error: {0}")]
    JsonParseError(#[from] serde_json::Error),

    #[error("URL parse error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("Logger initialization error: {0}")]
    LoggerError(#[from] log::SetLoggerError),

    // Generic wrapper for other errors
    #[error(transparent)]
    Other(#[from] color_eyre::Report),
}

/// Result type alias using PublishError
pub type Result<T> = std::result::Result<T, PublishError>;

impl PublishError {
    /// Create an invalid credentials error
    pub fn invalid_credentials(msg: impl Into<String>) -> Self {
        Self::InvalidCredentials(msg.into())
    }

    /// Create an invalid config error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create an API error tagged with the stage that produced it
    pub fn api(
        stage: UploadStage,
        status: u16,
        message: impl Into<String>,
    ) -> Self {
        Self::ApiError {
            stage,
            status,
            message: message.into(),
        }
    }

    /// Stage tag for errors raised by a remote call, if any.
    pub fn stage(&self) -> Option<UploadStage> {
        match self {
            Self::ApiError { stage, .. } | Self::Unauthorized { stage, .. } => {
                Some(*stage)
            }
            Self::AuthenticationError(_) => Some(UploadStage::Authenticate),
            Self::BundleReadError { .. } => Some(UploadStage::UploadBundle),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PublishError {
    fn from(err: std::io::Error) -> Self {
        Self::Other(color_eyre::Report::from(err))
    }
}

// Transport-level classification; HTTP status failures from the Play API are
// mapped by the client so they can carry the stage.
impl From<reqwest::Error> for PublishError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status)
                if status.as_u16() == 401 || status.as_u16() == 403 =>
            {
                Self::AuthenticationError(err.to_string())
            }
            _ => Self::NetworkError(err.to_string()),
        }
    }
}

impl From<reqwest::header::InvalidHeaderValue> for PublishError {
    fn from(err: reqwest::header::InvalidHeaderValue) -> Self {
        Self::AuthenticationError(format!("Invalid header value: {}", err))
    }
}

impl From<jsonwebtoken::errors::Error> for PublishError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Self::InvalidCredentials(format!("failed to sign assertion: {}", err))
    }
}

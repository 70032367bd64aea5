//! Error types for migration operations.

use thiserror::Error;

/// Migration-specific errors.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// Failed to authenticate with the source or destination instance.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// A group, project or entity was not found on the instance.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Failed to clone the source repository.
    #[error("Git clone failed: {0}")]
    GitCloneFailed(String),

    /// Failed to push to the destination repository.
    #[error("Git push failed: {0}")]
    GitPushFailed(String),

    /// A git-lfs fetch or push failed.
    #[error("Git LFS transfer failed: {0}")]
    LfsFailed(String),

    /// API request failed.
    #[error("API request failed: {0}")]
    ApiError(String),

    /// Network error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The statefile exists but cannot be trusted.
    #[error("Statefile {path} is unreadable: {reason}")]
    CorruptState {
        /// Location of the statefile.
        path: String,
        /// What went wrong while reading it.
        reason: String,
    },

    /// A group was reached twice while descending the source hierarchy.
    #[error("Group {0} was visited twice; the source hierarchy is not a tree")]
    CycleDetected(u64),

    /// Unsupported feature.
    #[error("Unsupported feature: {0}")]
    UnsupportedFeature(String),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// HTTP client error.
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
}

impl MigrationError {
    /// Errors raised before any migration work starts.
    pub fn is_fatal_config(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfig(_) | Self::AuthenticationFailed(_) | Self::CorruptState { .. }
        )
    }

    /// Errors that abort the run but leave the statefile resumable.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_)
                | Self::GitCloneFailed(_)
                | Self::GitPushFailed(_)
                | Self::LfsFailed(_)
                | Self::ApiError(_)
                | Self::NetworkError(_)
                | Self::IoError(_)
                | Self::HttpError(_)
        )
    }
}

/// Result type for migration operations.
pub type Result<T> = std::result::Result<T, MigrationError>;

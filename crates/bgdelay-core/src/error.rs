//! Error types for bgdelay core

use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Engine error types
///
/// A page with no applicable rule is not an error; see [`crate::Boot::Idle`].
#[derive(Error, Debug)]
pub enum Error {
    // Payload errors
    #[error("Invalid rule payload: {0}")]
    Payload(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Scheduling errors
    #[error("Invalid delay: {value}")]
    InvalidDelay { value: f64 },

    // Activation errors
    #[error("Selector matched no element: {selector}")]
    TargetNotFound { selector: String },

    #[error("Video source cannot be played: {source_ref:?}")]
    UnresolvableSource { source_ref: String },

    #[error("Failed to mount player: {0}")]
    Mount(String),

    // Placeholder errors
    #[error("Placeholder already hidden")]
    PlaceholderHidden,

    // State errors
    #[error("Invalid engine state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Create an unresolvable-source error
    pub fn unresolvable(source_ref: impl Into<String>) -> Self {
        Error::UnresolvableSource {
            source_ref: source_ref.into(),
        }
    }

    /// Returns true if the engine recovers from this error locally
    /// without leaving the placeholder stuck.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::InvalidDelay { .. })
    }

    /// Returns the error code for diagnostics
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Payload(_) => "PAYLOAD",
            Error::Json(_) => "JSON",
            Error::InvalidDelay { .. } => "INVALID_DELAY",
            Error::TargetNotFound { .. } => "TARGET_NOT_FOUND",
            Error::UnresolvableSource { .. } => "UNRESOLVABLE_SOURCE",
            Error::Mount(_) => "MOUNT",
            Error::PlaceholderHidden => "PLACEHOLDER_HIDDEN",
            Error::InvalidStateTransition { .. } => "INVALID_STATE",
            Error::InvalidConfig(_) => "INVALID_CONFIG",
        }
    }
}

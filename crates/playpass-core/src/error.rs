//! Error types for PlayPass Core

use crate::pipeline::Stage;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// PlayPass error types
#[derive(Error, Debug)]
pub enum Error {
    // Transport errors
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request timed out after {}ms", .after.as_millis())]
    Timeout { after: Duration },

    // Protocol errors
    #[error("Protocol error{}: {message}", .status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    Protocol { status: Option<u16>, message: String },

    // Stage errors
    #[error("Device encryption request failed: {source}")]
    EncryptionRequestFailed { source: Box<Error> },

    #[error("Device registration failed: {source}")]
    RegistrationFailed { source: Box<Error> },

    #[error("User authentication failed: {source}")]
    AuthenticationFailed { source: Box<Error> },

    #[error("Content package resolution failed: {source}")]
    PackageResolutionFailed { source: Box<Error> },

    #[error("DRM token request failed: {source}")]
    DrmTokenFailed { source: Box<Error> },

    #[error("Pipeline cancelled during {stage}")]
    Cancelled { stage: Stage },

    // Player errors
    #[error("Player error: {0}")]
    Player(String),

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to parse configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a protocol error without an HTTP status
    pub fn protocol(msg: impl Into<String>) -> Self {
        Error::Protocol {
            status: None,
            message: msg.into(),
        }
    }

    /// Wrap a lower-level error with the context of the stage it happened in
    pub fn at_stage(stage: Stage, source: Error) -> Self {
        let source = Box::new(source);
        match stage {
            Stage::Encrypt => Error::EncryptionRequestFailed { source },
            Stage::Register => Error::RegistrationFailed { source },
            Stage::Login => Error::AuthenticationFailed { source },
            Stage::ResolvePackage => Error::PackageResolutionFailed { source },
            Stage::DrmToken => Error::DrmTokenFailed { source },
        }
    }

    /// The pipeline stage this error belongs to, if any
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Error::EncryptionRequestFailed { .. } => Some(Stage::Encrypt),
            Error::RegistrationFailed { .. } => Some(Stage::Register),
            Error::AuthenticationFailed { .. } => Some(Stage::Login),
            Error::PackageResolutionFailed { .. } => Some(Stage::ResolvePackage),
            Error::DrmTokenFailed { .. } => Some(Stage::DrmToken),
            Error::Cancelled { stage } => Some(*stage),
            _ => None,
        }
    }

    /// The underlying transport/protocol error of a stage error
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::EncryptionRequestFailed { source }
            | Error::RegistrationFailed { source }
            | Error::AuthenticationFailed { source }
            | Error::PackageResolutionFailed { source }
            | Error::DrmTokenFailed { source } => source.root_cause(),
            other => other,
        }
    }

    /// Returns true for network-level failures (unreachable host, reset, timeout)
    pub fn is_transport(&self) -> bool {
        matches!(self.root_cause(), Error::Transport(_) | Error::Timeout { .. })
    }

    /// Returns the HTTP status carried by a protocol error
    pub fn status_code(&self) -> Option<u16> {
        match self.root_cause() {
            Error::Protocol { status, .. } => *status,
            _ => None,
        }
    }

    /// Returns the error code for reporting
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Transport(_) => "TRANSPORT",
            Error::Timeout { .. } => "TIMEOUT",
            Error::Protocol { .. } => "PROTOCOL",
            Error::EncryptionRequestFailed { .. } => "ENCRYPTION_REQUEST_FAILED",
            Error::RegistrationFailed { .. } => "REGISTRATION_FAILED",
            Error::AuthenticationFailed { .. } => "AUTHENTICATION_FAILED",
            Error::PackageResolutionFailed { .. } => "PACKAGE_RESOLUTION_FAILED",
            Error::DrmTokenFailed { .. } => "DRM_TOKEN_FAILED",
            Error::Cancelled { .. } => "CANCELLED",
            Error::Player(_) => "PLAYER",
            Error::InvalidConfig(_) => "INVALID_CONFIG",
            Error::Config(_) => "CONFIG_PARSE",
            Error::Io(_) => "IO",
            Error::Internal(_) => "INTERNAL",
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(error: reqwest::Error) -> Self {
        // Login credentials travel in the query string
        let error = error.without_url();
        if error.is_decode() {
            return Error::protocol(format!("malformed response body: {error}"));
        }
        if let Some(status) = error.status() {
            return Error::Protocol {
                status: Some(status.as_u16()),
                message: error.to_string(),
            };
        }
        Error::Transport(error.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::protocol(format!("unparsable JSON body: {error}"))
    }
}

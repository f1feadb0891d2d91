//! Error types used throughout the agent

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the agent.
///
/// Every variant maps to a stable machine code (see [`AgentError::code`]) that
/// is reported in export and integration responses next to the message.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum AgentError {
    /// Bad or missing integration or agent configuration. Job-fatal.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Credentials were rejected by the third-party system.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Event bus publish or subscribe failure.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Worker process exited unsuccessfully or could not be spawned.
    #[error("Worker process error: {0}")]
    Process(String),

    /// Incremental state could not be read or holds an invalid marker.
    #[error("State store error: {0}")]
    StateStore(String),

    /// Ciphertext could not be authenticated with the supplied key.
    #[error("Decryption failed: {0}")]
    Decryption(String),

    /// A device config file already exists for this root.
    #[error("Agent is already enrolled")]
    AlreadyEnrolled,

    #[error("Upload error: {0}")]
    Upload(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AgentError {
    /// Stable machine-readable code for this error kind.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "config_error",
            Self::Validation(_) => "validation_error",
            Self::Transport(_) => "transport_error",
            Self::Process(_) => "process_error",
            Self::StateStore(_) => "state_store_error",
            Self::Decryption(_) => "decryption_error",
            Self::AlreadyEnrolled => "already_enrolled",
            Self::Upload(_) => "upload_error",
            Self::Io(_) => "io_error",
            Self::Serialization(_) => "serialization_error",
            Self::InvalidInput(_) => "invalid_input",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Prefix the message with operator-facing context such as an
    /// integration name or operation, keeping the variant intact.
    #[must_use]
    pub fn with_context(self, context: impl fmt::Display) -> Self {
        let wrap = |message: String| format!("{context}: {message}");
        match self {
            Self::Config(m) => Self::Config(wrap(m)),
            Self::Validation(m) => Self::Validation(wrap(m)),
            Self::Transport(m) => Self::Transport(wrap(m)),
            Self::Process(m) => Self::Process(wrap(m)),
            Self::StateStore(m) => Self::StateStore(wrap(m)),
            Self::Decryption(m) => Self::Decryption(wrap(m)),
            Self::AlreadyEnrolled => Self::AlreadyEnrolled,
            Self::Upload(m) => Self::Upload(wrap(m)),
            Self::Io(m) => Self::Io(wrap(m)),
            Self::Serialization(m) => Self::Serialization(wrap(m)),
            Self::InvalidInput(m) => Self::InvalidInput(wrap(m)),
            Self::Internal(m) => Self::Internal(wrap(m)),
        }
    }
}

impl From<serde_json::Error> for AgentError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

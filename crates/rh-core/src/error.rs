//! Error taxonomy for remote-harness

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Coarse classification of every failure the harness can surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Credential rejected by the remote host
    Auth,
    /// Host unreachable, connection refused, DNS failure
    Network,
    /// A connect or command deadline elapsed
    Timeout,
    /// Session dropped mid-command or protocol failure
    Transport,
    /// Caller misuse
    InvalidState,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Auth => write!(f, "auth"),
            ErrorKind::Network => write!(f, "network"),
            ErrorKind::Timeout => write!(f, "timeout"),
            ErrorKind::Transport => write!(f, "transport"),
            ErrorKind::InvalidState => write!(f, "invalid-state"),
        }
    }
}

/// Stage a deadline was attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// TCP connect, handshake and authentication
    Connect,
    /// Remote command execution
    Command,
    /// SFTP listing or upload
    Transfer,
    /// Disconnect during session teardown
    Close,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Connect => write!(f, "connect"),
            Stage::Command => write!(f, "command"),
            Stage::Transfer => write!(f, "transfer"),
            Stage::Close => write!(f, "close"),
        }
    }
}

/// Top-level error type returned by harness operations
#[derive(Error, Debug)]
pub enum HarnessError {
    /// Credential rejected
    #[error("Authentication rejected for {username}@{endpoint}")]
    Auth { endpoint: String, username: String },

    /// Remote host could not be reached
    #[error("Network error reaching {endpoint}: {reason}")]
    Network { endpoint: String, reason: String },

    /// Deadline elapsed
    #[error("{stage} timed out after {}ms", .limit.as_millis())]
    Timeout { stage: Stage, limit: Duration },

    /// Transport-level failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// SFTP server refused an operation on a remote path
    #[error("Remote file error on {path}: {reason}")]
    RemoteFile { path: String, reason: String },

    /// Operation not valid in the current state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Invalid configuration or request supplied by the caller
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl HarnessError {
    /// Taxonomy kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            HarnessError::Auth { .. } => ErrorKind::Auth,
            HarnessError::Network { .. } => ErrorKind::Network,
            HarnessError::Timeout { .. } => ErrorKind::Timeout,
            HarnessError::Transport(_) | HarnessError::RemoteFile { .. } => ErrorKind::Transport,
            HarnessError::InvalidState(_) | HarnessError::Config(_) => ErrorKind::InvalidState,
        }
    }

    /// Shorthand for an invalid-state error
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        HarnessError::InvalidState(msg.into())
    }
}

/// Raw failure reported at the transport boundary, before classification
#[derive(Error, Debug)]
pub enum TransportFault {
    /// Remote host refused the credential
    #[error("authentication rejected")]
    AuthRejected,

    /// Host name could not be resolved
    #[error("failed to resolve {host}: {reason}")]
    Dns { host: String, reason: String },

    /// Socket-level failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Established connection went away
    #[error("connection reset: {0}")]
    ConnectionReset(String),

    /// SFTP status error for a path (missing, permission denied, ...)
    #[error("{path}: {reason}")]
    RemoteFile { path: String, reason: String },

    /// SSH protocol violation or negotiation failure
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Anything the transport could not describe more precisely
    #[error("{0}")]
    Other(String),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// Missing required field
    #[error("Missing required field: {0}")]
    MissingField(String),
}

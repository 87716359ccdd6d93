//! Core domain types

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::config::serde_utils::duration_millis;
use crate::error::{ConfigError, ErrorKind};

/// Opaque identity of one session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub uuid::Uuid);

impl SessionId {
    /// Generate a fresh session ID
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short = self.0.simple().to_string();
        write!(f, "session-{}", &short[..8])
    }
}

/// Session lifecycle state
///
/// `Connecting -> Ready | Failed`, `Ready -> Closing | Failed`,
/// `Failed -> Closing`, `Closing -> Closed`. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// Handshake and authentication in progress
    Connecting,
    /// Authenticated and accepting commands
    Ready,
    /// Teardown in progress
    Closing,
    /// Connection released
    Closed,
    /// Transport reported an unrecoverable error
    Failed,
}

impl SessionState {
    /// Whether `next` is a legal successor of this state
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Connecting, Ready)
                | (Connecting, Failed)
                | (Ready, Closing)
                | (Ready, Failed)
                | (Failed, Closing)
                | (Closing, Closed)
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Connecting => write!(f, "connecting"),
            SessionState::Ready => write!(f, "ready"),
            SessionState::Closing => write!(f, "closing"),
            SessionState::Closed => write!(f, "closed"),
            SessionState::Failed => write!(f, "failed"),
        }
    }
}

/// Output stream a chunk arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    Stdout,
    Stderr,
}

/// One piece of command output, tagged with its stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputChunk {
    /// Stream the bytes were read from
    pub stream: StreamKind,
    /// Raw bytes as received
    pub bytes: Bytes,
    /// Position within its own stream, starting at 0
    pub sequence: u64,
}

/// Completed, per-stream ordered record of one command's output
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcript {
    chunks: Vec<OutputChunk>,
}

impl Transcript {
    /// Wrap chunks already ordered per stream
    pub fn from_chunks(chunks: Vec<OutputChunk>) -> Self {
        Self { chunks }
    }

    /// All chunks in arrival order
    pub fn chunks(&self) -> &[OutputChunk] {
        &self.chunks
    }

    /// Chunks of a single stream, in sequence order
    pub fn stream(&self, kind: StreamKind) -> impl Iterator<Item = &OutputChunk> {
        self.chunks.iter().filter(move |c| c.stream == kind)
    }

    /// Concatenated bytes of one stream
    pub fn bytes(&self, kind: StreamKind) -> Vec<u8> {
        self.stream(kind).flat_map(|c| c.bytes.iter().copied()).collect()
    }

    /// Standard output decoded as UTF-8, replacing invalid sequences
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.bytes(StreamKind::Stdout)).into_owned()
    }

    /// Standard error decoded as UTF-8, replacing invalid sequences
    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.bytes(StreamKind::Stderr)).into_owned()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// A shell command to run remotely
///
/// The text is sent verbatim. No quoting or escaping is applied; callers that
/// interpolate untrusted values into it are responsible for shell safety.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandRequest {
    text: String,
    #[serde(with = "duration_millis", rename = "timeout_ms")]
    timeout: Duration,
}

impl CommandRequest {
    /// Build a request, rejecting empty commands and zero timeouts
    pub fn new(text: impl Into<String>, timeout: Duration) -> Result<Self, ConfigError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(ConfigError::Invalid("command text is empty".into()));
        }
        if timeout.is_zero() {
            return Err(ConfigError::Invalid("command timeout must be non-zero".into()));
        }
        Ok(Self { text, timeout })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// How a command execution ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// The execution channel closed normally; any exit code is data
    Completed,
    /// The command deadline elapsed and the session was torn down
    TimedOut,
    /// The transport failed while the command was in flight
    Failed { kind: ErrorKind, reason: String },
}

/// Result of one command execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResult {
    /// Remote exit status; `None` if the channel closed without one
    pub exit_code: Option<i32>,
    /// Signal name if the remote process was killed by a signal
    pub signal: Option<String>,
    /// Captured output
    pub transcript: Transcript,
    /// Wall time from submission to resolution
    #[serde(with = "duration_millis", rename = "duration_ms")]
    pub duration: Duration,
    /// Terminal outcome
    pub outcome: Outcome,
}

impl CommandResult {
    /// Completed with exit status 0
    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Completed && self.exit_code == Some(0)
    }
}

/// Kind of a remote directory entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    File,
    Directory,
    Symlink,
    Other,
}

/// One entry of a remote directory listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEntry {
    /// File name without its directory
    pub name: String,
    pub kind: EntryKind,
    /// Size in bytes, if the server reported one
    pub size: Option<u64>,
}

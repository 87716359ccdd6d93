//! rh-core: Core abstractions and configuration for remote-harness
//!
//! This crate provides the shared types, the error taxonomy, configuration
//! loading and the transport boundary traits used by the harness and CLI.

pub mod config;
pub mod error;
pub mod exec;
pub mod traits;
pub mod types;

pub use error::{ConfigError, ErrorKind, HarnessError, Stage, TransportFault};
pub use types::{
    CommandRequest, CommandResult, EntryKind, Outcome, OutputChunk, RemoteEntry, SessionId,
    SessionState, StreamKind, Transcript,
};

//! remote-harness: Command-line front end for the remote command harness
//!
//! Provides the `remote-harness` binary for running shell commands on a
//! remote host and checking that the host is reachable.

pub mod commands;
pub mod output;

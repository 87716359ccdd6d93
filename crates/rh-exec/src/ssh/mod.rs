//! SSH transport built on russh

mod handler;
mod sftp;
mod transport;

pub use transport::{SshConnection, SshTransport};

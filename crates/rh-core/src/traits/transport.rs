//! Transport boundary traits
//!
//! The harness never speaks SSH itself. It drives a [`Transport`] that can
//! authenticate to a host and a [`TransportConnection`] that can start
//! commands, move files and report liveness.

use async_trait::async_trait;
use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use crate::config::ConnectionConfig;
use crate::error::TransportFault;
use crate::exec::ExecStream;
use crate::types::RemoteEntry;

/// Opens authenticated connections to remote hosts
#[async_trait]
pub trait Transport: Send + Sync {
    /// The connection type produced by this transport
    type Connection: TransportConnection;

    /// Resolve, connect and authenticate.
    ///
    /// Dropping the returned future aborts the handshake.
    async fn authenticate(&self, config: &ConnectionConfig)
        -> Result<Self::Connection, TransportFault>;
}

/// One live authenticated connection
#[async_trait]
pub trait TransportConnection: Send {
    /// Start `command` verbatim on the remote side.
    ///
    /// When `cancel` fires the implementation should signal the remote
    /// process if it can and close the execution channel.
    async fn exec(
        &mut self,
        command: &str,
        cancel: CancellationToken,
    ) -> Result<ExecStream, TransportFault>;

    /// List the entries of a remote directory, excluding `.` and `..`
    async fn list_dir(&mut self, path: &str) -> Result<Vec<RemoteEntry>, TransportFault> {
        let _ = path;
        Err(TransportFault::Protocol(
            "this transport does not support file transfer".into(),
        ))
    }

    /// Create or truncate `remote_path` and write `contents` to it.
    ///
    /// Returns the number of bytes written.
    async fn upload(&mut self, contents: Bytes, remote_path: &str) -> Result<u64, TransportFault> {
        let _ = (contents, remote_path);
        Err(TransportFault::Protocol(
            "this transport does not support file transfer".into(),
        ))
    }

    /// Non-blocking check; false once the transport reported an error or close
    fn is_alive(&self) -> bool;

    /// Disconnect. Called at most once per connection.
    async fn close(&mut self) -> Result<(), TransportFault>;
}

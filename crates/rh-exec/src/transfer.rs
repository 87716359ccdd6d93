//! Remote directory listing and file upload

use std::path::Path;
use std::time::Duration;

use bytes::Bytes;

use rh_core::traits::TransportConnection;
use rh_core::{ConfigError, HarnessError, RemoteEntry, Stage, TransportFault};

use crate::policy::PolicyGuard;
use crate::session::Session;

/// Moves files over a ready session
///
/// Deadlines follow the command rules: when one elapses the session is
/// closed. Errors are sorted into the same taxonomy as commands; a path the
/// server refuses is [`HarnessError::RemoteFile`].
#[derive(Debug, Clone, Default)]
pub struct FileTransfer {
    policy: PolicyGuard,
}

impl FileTransfer {
    pub fn new() -> Self {
        Self::default()
    }

    /// List a remote directory
    pub async fn list_directory<C: TransportConnection>(
        &self,
        session: &mut Session<C>,
        path: &str,
        timeout: Duration,
    ) -> Result<Vec<RemoteEntry>, HarnessError> {
        check_args(path, timeout)?;
        session.ensure_ready()?;
        tracing::debug!("{}: list {}", session.id(), path);

        let attempt = {
            let connection = session.connection_mut()?;
            self.policy
                .with_timeout(Stage::Transfer, timeout, connection.list_dir(path))
                .await
        };
        self.settle(session, attempt).await
    }

    /// Write `contents` to `remote_path`, replacing any existing file
    pub async fn upload<C: TransportConnection>(
        &self,
        session: &mut Session<C>,
        contents: Bytes,
        remote_path: &str,
        timeout: Duration,
    ) -> Result<u64, HarnessError> {
        check_args(remote_path, timeout)?;
        session.ensure_ready()?;
        tracing::debug!(
            "{}: upload {} bytes to {}",
            session.id(),
            contents.len(),
            remote_path
        );

        let attempt = {
            let connection = session.connection_mut()?;
            self.policy
                .with_timeout(
                    Stage::Transfer,
                    timeout,
                    connection.upload(contents, remote_path),
                )
                .await
        };
        self.settle(session, attempt).await
    }

    /// Read a local file and upload it to `remote_path`
    pub async fn upload_file<C: TransportConnection>(
        &self,
        session: &mut Session<C>,
        local_path: &Path,
        remote_path: &str,
        timeout: Duration,
    ) -> Result<u64, HarnessError> {
        let contents = tokio::fs::read(local_path).await.map_err(|e| {
            ConfigError::Invalid(format!("cannot read {}: {}", local_path.display(), e))
        })?;
        self.upload(session, Bytes::from(contents), remote_path, timeout)
            .await
    }

    async fn settle<C: TransportConnection, T>(
        &self,
        session: &mut Session<C>,
        attempt: Result<Result<T, TransportFault>, HarnessError>,
    ) -> Result<T, HarnessError> {
        match attempt {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(fault)) => {
                let err = self
                    .policy
                    .escalate(fault, session.endpoint(), session.username());
                tracing::warn!("{}: transfer failed: {}", session.id(), err);
                if !session.connection_alive() {
                    session.mark_failed();
                }
                Err(err)
            }
            Err(timeout) => {
                tracing::warn!("{}: {}; tearing down session", session.id(), timeout);
                session.close().await;
                Err(timeout)
            }
        }
    }
}

fn check_args(path: &str, timeout: Duration) -> Result<(), ConfigError> {
    if path.trim().is_empty() {
        return Err(ConfigError::Invalid("remote path is empty".into()));
    }
    if timeout.is_zero() {
        return Err(ConfigError::Invalid("transfer timeout must be non-zero".into()));
    }
    Ok(())
}

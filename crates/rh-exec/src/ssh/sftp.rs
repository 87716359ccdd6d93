//! SFTP over the command connection

use bytes::Bytes;
use russh::client::Handle;
use russh_sftp::client::error::Error as SftpError;
use russh_sftp::client::SftpSession;
use russh_sftp::protocol::StatusCode;
use tokio::io::AsyncWriteExt;

use rh_core::{EntryKind, RemoteEntry, TransportFault};

use super::handler::ClientHandler;

/// Open a channel and start the `sftp` subsystem on it
pub(crate) async fn open(handle: &Handle<ClientHandler>) -> Result<SftpSession, TransportFault> {
    let channel = handle
        .channel_open_session()
        .await
        .map_err(super::transport::fault_from_russh)?;
    channel
        .request_subsystem(true, "sftp")
        .await
        .map_err(super::transport::fault_from_russh)?;
    tracing::debug!("Started sftp subsystem on channel {:?}", channel.id());

    SftpSession::new(channel.into_stream())
        .await
        .map_err(|e| fault_from_sftp(e, "sftp subsystem"))
}

pub(crate) async fn list_dir(
    sftp: &SftpSession,
    path: &str,
) -> Result<Vec<RemoteEntry>, TransportFault> {
    let entries = sftp
        .read_dir(path)
        .await
        .map_err(|e| fault_from_sftp(e, path))?
        .filter(|entry| !matches!(entry.file_name().as_str(), "." | ".."))
        .map(|entry| {
            let file_type = entry.file_type();
            let kind = if file_type.is_dir() {
                EntryKind::Directory
            } else if file_type.is_symlink() {
                EntryKind::Symlink
            } else if file_type.is_file() {
                EntryKind::File
            } else {
                EntryKind::Other
            };
            RemoteEntry {
                name: entry.file_name(),
                kind,
                size: entry.metadata().size,
            }
        })
        .collect();
    Ok(entries)
}

pub(crate) async fn upload(
    sftp: &SftpSession,
    contents: Bytes,
    remote_path: &str,
) -> Result<u64, TransportFault> {
    let mut file = sftp
        .create(remote_path)
        .await
        .map_err(|e| fault_from_sftp(e, remote_path))?;
    file.write_all(&contents).await?;
    file.shutdown().await?;
    Ok(contents.len() as u64)
}

/// Translate an SFTP client error for `path` into a transport fault
pub(crate) fn fault_from_sftp(err: SftpError, path: &str) -> TransportFault {
    match err {
        SftpError::Status(status) => match status.status_code {
            StatusCode::NoConnection | StatusCode::ConnectionLost => {
                TransportFault::ConnectionReset(status.error_message)
            }
            StatusCode::BadMessage | StatusCode::OpUnsupported => {
                TransportFault::Protocol(format!("sftp: {}", status.error_message))
            }
            code => TransportFault::RemoteFile {
                path: path.to_string(),
                reason: if status.error_message.is_empty() {
                    format!("{:?}", code)
                } else {
                    status.error_message
                },
            },
        },
        SftpError::IO(reason) => TransportFault::ConnectionReset(reason),
        other => TransportFault::Protocol(format!("sftp: {}", other)),
    }
}

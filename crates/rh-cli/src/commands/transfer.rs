//! File listing and upload commands

use std::path::Path;
use std::time::Duration;

use anyhow::Result;

use rh_core::config::ConnectionConfig;
use rh_core::{ErrorKind, HarnessError};
use rh_exec::{FileTransfer, SessionManager, SshTransport};

use super::{EXIT_CONNECTION, EXIT_REMOTE_FILE, EXIT_TIMEOUT};
use crate::output::{format_entries, print_error, print_success};

/// List a remote directory
pub async fn list_command(
    config: &ConnectionConfig,
    path: &str,
    timeout: Duration,
    json: bool,
) -> Result<u8> {
    let manager = SessionManager::new(SshTransport::new());
    let mut session = match manager.connect(config).await {
        Ok(session) => session,
        Err(e) => {
            print_error(&format!("Failed to connect: {}", e));
            return Ok(EXIT_CONNECTION);
        }
    };

    let listing = FileTransfer::new()
        .list_directory(&mut session, path, timeout)
        .await;
    manager.close(&mut session).await;

    match listing {
        Ok(entries) if json => {
            println!("{}", serde_json::to_string_pretty(&entries)?);
            Ok(0)
        }
        Ok(entries) => {
            println!("{}", format_entries(&entries));
            Ok(0)
        }
        Err(e @ HarnessError::Config(_)) => Err(e.into()),
        Err(e) => Ok(report_failure(&e)),
    }
}

/// Upload a local file to a remote path
pub async fn upload_command(
    config: &ConnectionConfig,
    local_path: &Path,
    remote_path: &str,
    timeout: Duration,
) -> Result<u8> {
    let manager = SessionManager::new(SshTransport::new());
    let mut session = match manager.connect(config).await {
        Ok(session) => session,
        Err(e) => {
            print_error(&format!("Failed to connect: {}", e));
            return Ok(EXIT_CONNECTION);
        }
    };

    let uploaded = FileTransfer::new()
        .upload_file(&mut session, local_path, remote_path, timeout)
        .await;
    manager.close(&mut session).await;

    match uploaded {
        Ok(bytes) => {
            print_success(&format!(
                "Uploaded {} ({} bytes) to {}",
                local_path.display(),
                bytes,
                remote_path
            ));
            Ok(0)
        }
        Err(e @ HarnessError::Config(_)) => Err(e.into()),
        Err(e) => Ok(report_failure(&e)),
    }
}

/// Print a transfer error and pick the exit status for it
fn report_failure(err: &HarnessError) -> u8 {
    print_error(&err.to_string());
    exit_code_for_transfer(err)
}

/// Process exit status for a failed transfer
pub fn exit_code_for_transfer(err: &HarnessError) -> u8 {
    match err {
        HarnessError::RemoteFile { .. } => EXIT_REMOTE_FILE,
        _ if err.kind() == ErrorKind::Timeout => EXIT_TIMEOUT,
        _ => EXIT_CONNECTION,
    }
}

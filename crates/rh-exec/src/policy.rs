//! Deadlines and failure classification
//!
//! Every stage the harness drives (connect, command) runs under
//! [`PolicyGuard::with_timeout`], and every raw [`TransportFault`] is turned
//! into a [`HarnessError`] exactly once through [`PolicyGuard::escalate`].

use std::future::Future;
use std::io;
use std::time::Duration;

use rh_core::{ErrorKind, HarnessError, Stage, TransportFault};

/// Enforces deadlines and maps transport failures onto [`ErrorKind`]
#[derive(Debug, Clone, Copy, Default)]
pub struct PolicyGuard;

impl PolicyGuard {
    /// Create a new policy guard
    pub fn new() -> Self {
        Self
    }

    /// Race `operation` against a timer.
    ///
    /// If the operation finishes first its output is returned and the timer
    /// is dropped with it. If the timer fires first the operation future is
    /// dropped, which cancels it, and a [`HarnessError::Timeout`] is returned.
    pub async fn with_timeout<F, T>(
        &self,
        stage: Stage,
        limit: Duration,
        operation: F,
    ) -> Result<T, HarnessError>
    where
        F: Future<Output = T>,
    {
        match tokio::time::timeout(limit, operation).await {
            Ok(output) => Ok(output),
            Err(_) => {
                tracing::debug!("{} deadline of {:?} elapsed", stage, limit);
                Err(HarnessError::Timeout { stage, limit })
            }
        }
    }

    /// Map a raw transport failure onto the error taxonomy.
    ///
    /// Anything not recognised is a [`ErrorKind::Transport`] failure.
    pub fn classify(&self, fault: &TransportFault) -> ErrorKind {
        match fault {
            TransportFault::AuthRejected => ErrorKind::Auth,
            TransportFault::Dns { .. } => ErrorKind::Network,
            TransportFault::Io(err) => classify_io(err),
            TransportFault::ConnectionReset(_)
            | TransportFault::RemoteFile { .. }
            | TransportFault::Protocol(_)
            | TransportFault::Other(_) => ErrorKind::Transport,
        }
    }

    /// Classify `fault` and convert it into the caller-facing error
    pub fn escalate(&self, fault: TransportFault, endpoint: &str, username: &str) -> HarnessError {
        if let TransportFault::RemoteFile { path, reason } = fault {
            return HarnessError::RemoteFile { path, reason };
        }
        match self.classify(&fault) {
            ErrorKind::Auth => HarnessError::Auth {
                endpoint: endpoint.to_string(),
                username: username.to_string(),
            },
            ErrorKind::Network => HarnessError::Network {
                endpoint: endpoint.to_string(),
                reason: fault.to_string(),
            },
            _ => HarnessError::Transport(fault.to_string()),
        }
    }
}

fn classify_io(err: &io::Error) -> ErrorKind {
    #[cfg(unix)]
    if let Some(code) = err.raw_os_error() {
        if code == libc::ENETUNREACH || code == libc::EHOSTUNREACH || code == libc::ECONNREFUSED
        {
            return ErrorKind::Network;
        }
    }

    match err.kind() {
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::AddrNotAvailable
        | io::ErrorKind::NotFound
        | io::ErrorKind::TimedOut => ErrorKind::Network,
        _ => ErrorKind::Transport,
    }
}

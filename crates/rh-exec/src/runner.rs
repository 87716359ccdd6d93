//! Remote command execution

use bytes::Bytes;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use rh_core::exec::ExecExit;
use rh_core::traits::TransportConnection;
use rh_core::{
    CommandRequest, CommandResult, ErrorKind, HarnessError, Outcome, SessionState, Stage,
    StreamKind, TransportFault,
};

use crate::collector::OutputCollector;
use crate::policy::PolicyGuard;
use crate::session::Session;

/// Runs commands on a ready session and captures their output
#[derive(Debug, Clone, Default)]
pub struct CommandRunner {
    policy: PolicyGuard,
}

impl CommandRunner {
    /// Create a new command runner
    pub fn new() -> Self {
        Self::default()
    }

    /// Run one command and wait for its execution channel to close.
    ///
    /// The only error returned is [`HarnessError::InvalidState`] when the
    /// session is not `Ready`; it is raised before any network I/O. Every
    /// other ending is a [`CommandResult`]:
    ///
    /// - a remote exit status, zero or not, is `Outcome::Completed`
    /// - an elapsed deadline is `Outcome::TimedOut`; the remote process is
    ///   signalled and the session is closed, since shell state after a
    ///   killed command cannot be trusted
    ///
    /// If the returned future is dropped before it resolves, the remote
    /// process is signalled the same way.
    /// - a transport failure is `Outcome::Failed`
    pub async fn run<C: TransportConnection>(
        &self,
        session: &mut Session<C>,
        request: &CommandRequest,
    ) -> Result<CommandResult, HarnessError> {
        session.ensure_ready()?;

        let started = Instant::now();
        let id = session.id();
        let cancel = CancellationToken::new();
        // Dropping this future mid-command must still stop the remote process
        let _cancel_on_drop = cancel.clone().drop_guard();
        let mut collector = OutputCollector::new();
        tracing::debug!("{}: exec {:?}", id, request.text());

        let attempt = {
            let connection = session.connection_mut()?;
            self.policy
                .with_timeout(
                    Stage::Command,
                    request.timeout(),
                    drive(connection, request.text(), cancel.clone(), &mut collector),
                )
                .await
        };

        let (exit_code, signal, outcome) = match attempt {
            Ok(Ok(ExecExit::Status(code))) => (Some(code), None, Outcome::Completed),
            Ok(Ok(ExecExit::Signal { name })) => (None, Some(name), Outcome::Completed),
            Ok(Ok(ExecExit::Closed)) if session.connection_alive() => {
                (None, None, Outcome::Completed)
            }
            Ok(Ok(ExecExit::Closed)) => {
                tracing::warn!("{}: session went away before an exit status", id);
                session.mark_failed();
                (
                    None,
                    None,
                    Outcome::Failed {
                        kind: ErrorKind::Transport,
                        reason: "session closed before an exit status was reported".into(),
                    },
                )
            }
            Ok(Ok(ExecExit::Lost(fault))) | Ok(Err(fault)) => {
                let err = self
                    .policy
                    .escalate(fault, session.endpoint(), session.username());
                tracing::warn!("{}: command failed: {}", id, err);
                if !session.connection_alive() {
                    session.mark_failed();
                }
                (
                    None,
                    None,
                    Outcome::Failed {
                        kind: err.kind(),
                        reason: err.to_string(),
                    },
                )
            }
            Err(timeout) => {
                cancel.cancel();
                tracing::warn!("{}: {}; tearing down session", id, timeout);
                session.close().await;
                (None, None, Outcome::TimedOut)
            }
        };

        let transcript = collector.finalize()?;
        let result = CommandResult {
            exit_code,
            signal,
            transcript,
            duration: started.elapsed(),
            outcome,
        };
        tracing::debug!(
            "{}: {:?} exit={:?} chunks={} in {:?}",
            id,
            result.outcome,
            result.exit_code,
            result.transcript.len(),
            result.duration
        );
        Ok(result)
    }

    /// Run commands in order on one session.
    ///
    /// Stops after the first result that leaves the session unusable
    /// (timeout or transport failure). A non-zero exit does not stop the run.
    pub async fn run_all<C: TransportConnection>(
        &self,
        session: &mut Session<C>,
        requests: &[CommandRequest],
    ) -> Result<Vec<CommandResult>, HarnessError> {
        let mut results = Vec::with_capacity(requests.len());
        for request in requests {
            results.push(self.run(session, request).await?);
            if session.state() != SessionState::Ready {
                tracing::info!(
                    "{} is {}; skipping {} remaining command(s)",
                    session.id(),
                    session.state(),
                    requests.len() - results.len()
                );
                break;
            }
        }
        Ok(results)
    }
}

/// Start the command and drain both output streams until they close
async fn drive<C: TransportConnection>(
    connection: &mut C,
    command: &str,
    cancel: CancellationToken,
    collector: &mut OutputCollector,
) -> Result<ExecExit, TransportFault> {
    let mut stream = connection.exec(command, cancel).await?;

    let mut stdout_open = true;
    let mut stderr_open = true;
    while stdout_open || stderr_open {
        tokio::select! {
            chunk = stream.stdout.recv(), if stdout_open => match chunk {
                Some(bytes) => record(collector, StreamKind::Stdout, bytes),
                None => stdout_open = false,
            },
            chunk = stream.stderr.recv(), if stderr_open => match chunk {
                Some(bytes) => record(collector, StreamKind::Stderr, bytes),
                None => stderr_open = false,
            },
        }
    }

    Ok(stream.exit.await.unwrap_or_else(|_| {
        ExecExit::Lost(TransportFault::Other(
            "execution channel dropped without an exit report".into(),
        ))
    }))
}

fn record(collector: &mut OutputCollector, stream: StreamKind, bytes: Bytes) {
    if let Err(e) = collector.record(stream, bytes) {
        tracing::warn!("Discarding {:?} output: {}", stream, e);
    }
}

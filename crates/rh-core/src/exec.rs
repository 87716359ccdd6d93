//! Execution channel plumbing between a transport and the harness
//!
//! A transport pumps remote output into an [`ExecSink`]; the harness drains
//! the paired [`ExecStream`]. Standard output and standard error travel on
//! independent unbounded channels so a quiet stream never stalls a busy one,
//! and the exit report is only delivered after both output channels are
//! closed.

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};

use crate::error::TransportFault;

/// How the remote execution channel ended
#[derive(Debug)]
pub enum ExecExit {
    /// Process reported an exit status
    Status(i32),
    /// Process was killed by a signal
    Signal { name: String },
    /// Channel closed without reporting a status
    Closed,
    /// Transport failed while the command was running
    Lost(TransportFault),
}

/// Consumer half, owned by the harness
#[derive(Debug)]
pub struct ExecStream {
    /// Standard output chunks in arrival order
    pub stdout: mpsc::UnboundedReceiver<Bytes>,
    /// Standard error chunks in arrival order
    pub stderr: mpsc::UnboundedReceiver<Bytes>,
    /// Final report, sent after both output channels close
    pub exit: oneshot::Receiver<ExecExit>,
}

/// Producer half, owned by the transport
#[derive(Debug)]
pub struct ExecSink {
    stdout: mpsc::UnboundedSender<Bytes>,
    stderr: mpsc::UnboundedSender<Bytes>,
    exit: oneshot::Sender<ExecExit>,
}

impl ExecStream {
    /// Create a connected sink/stream pair
    pub fn channel() -> (ExecSink, ExecStream) {
        let (stdout_tx, stdout_rx) = mpsc::unbounded_channel();
        let (stderr_tx, stderr_rx) = mpsc::unbounded_channel();
        let (exit_tx, exit_rx) = oneshot::channel();
        (
            ExecSink {
                stdout: stdout_tx,
                stderr: stderr_tx,
                exit: exit_tx,
            },
            ExecStream {
                stdout: stdout_rx,
                stderr: stderr_rx,
                exit: exit_rx,
            },
        )
    }
}

impl ExecSink {
    /// Forward a standard output chunk. Returns false once the harness stopped listening.
    pub fn stdout(&self, data: Bytes) -> bool {
        self.stdout.send(data).is_ok()
    }

    /// Forward a standard error chunk. Returns false once the harness stopped listening.
    pub fn stderr(&self, data: Bytes) -> bool {
        self.stderr.send(data).is_ok()
    }

    /// Close both output channels, then deliver the exit report
    pub fn finish(self, exit: ExecExit) {
        let ExecSink {
            stdout,
            stderr,
            exit: exit_tx,
        } = self;
        drop(stdout);
        drop(stderr);
        let _ = exit_tx.send(exit);
    }
}

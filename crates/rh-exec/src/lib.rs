//! rh-exec: Remote command execution harness
//!
//! Opens an authenticated session to one host, runs shell commands on it,
//! captures standard output and standard error as separate ordered streams,
//! lists and uploads files over SFTP, and enforces connect and command
//! deadlines.
//!
//! ```ignore
//! use rh_exec::{CommandRunner, SessionManager, SshTransport};
//!
//! let manager = SessionManager::new(SshTransport::new());
//! let mut session = manager.connect(&config).await?;
//! let result = CommandRunner::new().run(&mut session, &request).await?;
//! session.close().await;
//! ```

pub mod collector;
pub mod policy;
pub mod runner;
pub mod session;
pub mod ssh;
pub mod transfer;

pub use collector::OutputCollector;
pub use policy::PolicyGuard;
pub use runner::CommandRunner;
pub use session::{Session, SessionManager, CLOSE_GRACE};
pub use ssh::{SshConnection, SshTransport};
pub use transfer::FileTransfer;

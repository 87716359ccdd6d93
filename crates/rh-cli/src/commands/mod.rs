//! CLI command implementations

mod check;
mod run;
mod settings;
mod transfer;

pub use check::check_command;
pub use run::{exit_code_for, run_command, ReportFormat};
pub use settings::{resolve_connection, resolve_with, ConnectionOverrides};
pub use transfer::{exit_code_for_transfer, list_command, upload_command};

/// Exit status when the SFTP server refused a path
pub const EXIT_REMOTE_FILE: u8 = 1;

/// Exit status when a command or transfer deadline elapsed
pub const EXIT_TIMEOUT: u8 = 124;

/// Exit status when the host could not be reached or the session broke
pub const EXIT_CONNECTION: u8 = 255;

/// Exit status for unusable settings or arguments
pub const EXIT_USAGE: u8 = 2;

//! Run command implementation

use std::time::Duration;

use anyhow::{Context, Result};

use rh_core::config::ConnectionConfig;
use rh_core::{CommandRequest, CommandResult, Outcome};
use rh_exec::{CommandRunner, SessionManager, SshTransport};

use super::{EXIT_CONNECTION, EXIT_TIMEOUT};
use crate::output::{format_json, format_report, format_summary, print_error, print_warning};

/// How results are written to stdout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Text,
    Json,
}

/// Execute the run command
///
/// Returns the process exit status: the last command's remote exit code,
/// [`EXIT_TIMEOUT`] if it timed out, [`EXIT_CONNECTION`] if the session
/// could not be opened or broke.
pub async fn run_command(
    config: &ConnectionConfig,
    commands: &[String],
    timeout: Duration,
    format: ReportFormat,
    summary: bool,
) -> Result<u8> {
    let requests = commands
        .iter()
        .map(|text| CommandRequest::new(text.as_str(), timeout))
        .collect::<Result<Vec<_>, _>>()
        .context("Invalid command")?;

    let manager = SessionManager::new(SshTransport::new());
    let mut session = match manager.connect(config).await {
        Ok(session) => session,
        Err(e) => {
            print_error(&format!("Failed to connect: {}", e));
            return Ok(EXIT_CONNECTION);
        }
    };

    let runner = CommandRunner::new();
    let results = runner.run_all(&mut session, &requests).await;
    manager.close(&mut session).await;
    let results = results?;

    match format {
        ReportFormat::Text => {
            for (request, result) in requests.iter().zip(&results) {
                println!("$ {}", request.text());
                println!("{}", format_report(result));
                if let Outcome::Failed { reason, .. } = &result.outcome {
                    print_error(reason);
                }
            }
        }
        ReportFormat::Json => println!("{}", format_json(&requests, &results)?),
    }

    if summary {
        eprintln!("{}", format_summary(&requests, &results));
    }

    let skipped = requests.len() - results.len();
    if skipped > 0 {
        print_warning(&format!(
            "Session ended early; {} command(s) were not run",
            skipped
        ));
    }

    Ok(results.last().map(exit_code_for).unwrap_or(0))
}

/// Process exit status for one result
///
/// A command killed by a signal reports [`EXIT_CONNECTION`]; a command that
/// completed without any status reports 0.
pub fn exit_code_for(result: &CommandResult) -> u8 {
    match result.outcome {
        Outcome::TimedOut => EXIT_TIMEOUT,
        Outcome::Failed { .. } => EXIT_CONNECTION,
        Outcome::Completed => match (result.exit_code, &result.signal) {
            (Some(code), _) => u8::try_from(code).unwrap_or(EXIT_CONNECTION),
            (None, Some(_)) => EXIT_CONNECTION,
            (None, None) => 0,
        },
    }
}

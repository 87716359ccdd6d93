//! Output formatting utilities for the CLI
//!
//! Result reports, the JSON view, the summary table and colored status
//! messages.

use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use rh_core::{CommandRequest, CommandResult, EntryKind, Outcome, RemoteEntry};

/// Format one result as `Output:` / `Errors:` / `Exit Code:` blocks
///
/// The exit code reads `none` when the channel closed without a status.
pub fn format_report(result: &CommandResult) -> String {
    let exit = match (&result.exit_code, &result.signal) {
        (Some(code), _) => code.to_string(),
        (None, Some(signal)) => format!("none (signal {})", signal),
        (None, None) => "none".to_string(),
    };

    let mut output = format!(
        "Output:\n{}\n\nErrors:\n{}\n\nExit Code: {}",
        result.transcript.stdout_lossy(),
        result.transcript.stderr_lossy(),
        exit
    );
    if result.outcome == Outcome::TimedOut {
        output.push_str(&format!(
            "\nTimed out after {}",
            format_duration(result.duration.as_millis())
        ));
    }
    output
}

/// JSON view of one command and its result
#[derive(Debug, Serialize)]
struct ReportView<'a> {
    command: &'a str,
    exit_code: Option<i32>,
    signal: Option<&'a str>,
    stdout: String,
    stderr: String,
    duration_ms: u128,
    outcome: &'a Outcome,
}

/// Format results as a pretty-printed JSON array
///
/// Output text is decoded lossily; invalid UTF-8 becomes U+FFFD.
pub fn format_json(
    requests: &[CommandRequest],
    results: &[CommandResult],
) -> serde_json::Result<String> {
    let views: Vec<ReportView<'_>> = requests
        .iter()
        .zip(results)
        .map(|(request, result)| ReportView {
            command: request.text(),
            exit_code: result.exit_code,
            signal: result.signal.as_deref(),
            stdout: result.transcript.stdout_lossy(),
            stderr: result.transcript.stderr_lossy(),
            duration_ms: result.duration.as_millis(),
            outcome: &result.outcome,
        })
        .collect();
    serde_json::to_string_pretty(&views)
}

/// Format a one-row-per-command summary table
pub fn format_summary(requests: &[CommandRequest], results: &[CommandResult]) -> String {
    if results.is_empty() {
        return "No commands were run".to_string();
    }

    #[derive(Tabled)]
    struct SummaryRow {
        #[tabled(rename = "COMMAND")]
        command: String,
        #[tabled(rename = "OUTCOME")]
        outcome: String,
        #[tabled(rename = "EXIT")]
        exit: String,
        #[tabled(rename = "DURATION")]
        duration: String,
        #[tabled(rename = "STDOUT")]
        stdout: usize,
        #[tabled(rename = "STDERR")]
        stderr: usize,
    }

    let rows: Vec<SummaryRow> = requests
        .iter()
        .zip(results)
        .map(|(request, result)| SummaryRow {
            command: truncate(request.text(), 40),
            outcome: match &result.outcome {
                Outcome::Completed => "completed".to_string(),
                Outcome::TimedOut => "timed out".to_string(),
                Outcome::Failed { kind, .. } => format!("failed ({})", kind),
            },
            exit: result
                .exit_code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "-".to_string()),
            duration: format_duration(result.duration.as_millis()),
            stdout: result.transcript.bytes(rh_core::StreamKind::Stdout).len(),
            stderr: result.transcript.bytes(rh_core::StreamKind::Stderr).len(),
        })
        .collect();

    Table::new(rows).with(Style::rounded()).to_string()
}

/// Format a remote directory listing as a table
pub fn format_entries(entries: &[RemoteEntry]) -> String {
    if entries.is_empty() {
        return "Directory is empty".to_string();
    }

    #[derive(Tabled)]
    struct EntryRow {
        #[tabled(rename = "NAME")]
        name: String,
        #[tabled(rename = "TYPE")]
        kind: &'static str,
        #[tabled(rename = "SIZE")]
        size: String,
    }

    let rows: Vec<EntryRow> = entries
        .iter()
        .map(|e| EntryRow {
            name: e.name.clone(),
            kind: match e.kind {
                EntryKind::File => "file",
                EntryKind::Directory => "dir",
                EntryKind::Symlink => "link",
                EntryKind::Other => "other",
            },
            size: e
                .size
                .map(|s| s.to_string())
                .unwrap_or_else(|| "-".to_string()),
        })
        .collect();

    Table::new(rows).with(Style::rounded()).to_string()
}

/// Format a millisecond duration in human-readable form
fn format_duration(millis: u128) -> String {
    if millis < 1000 {
        format!("{}ms", millis)
    } else if millis < 60_000 {
        format!("{:.1}s", millis as f64 / 1000.0)
    } else {
        let secs = millis / 1000;
        format!("{}m {}s", secs / 60, secs % 60)
    }
}

/// Truncate a string with ellipsis if too long
fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Print a success message in green with a checkmark prefix
pub fn print_success(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Green),
        Print("✓ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an error message in red with an X prefix
///
/// Outputs to stderr so remote output on stdout stays clean.
pub fn print_error(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Red),
        Print("✗ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print a warning message in yellow to stderr
pub fn print_warning(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Yellow),
        Print("⚠ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use rh_core::{ErrorKind, OutputChunk, StreamKind, Transcript};
    use std::time::Duration;

    fn sample(outcome: Outcome, exit_code: Option<i32>) -> CommandResult {
        CommandResult {
            exit_code,
            signal: None,
            transcript: Transcript::from_chunks(vec![
                OutputChunk {
                    stream: StreamKind::Stdout,
                    bytes: Bytes::from_static(b"online"),
                    sequence: 0,
                },
                OutputChunk {
                    stream: StreamKind::Stderr,
                    bytes: Bytes::from_static(b"\xffwarn"),
                    sequence: 0,
                },
            ]),
            duration: Duration::from_millis(1500),
            outcome,
        }
    }

    #[test]
    fn test_format_report_blocks() {
        let report = format_report(&sample(Outcome::Completed, Some(0)));
        assert_eq!(
            report,
            "Output:\nonline\n\nErrors:\n\u{fffd}warn\n\nExit Code: 0"
        );
    }

    #[test]
    fn test_format_report_timeout() {
        let report = format_report(&sample(Outcome::TimedOut, None));
        assert!(report.contains("Exit Code: none"));
        assert!(report.ends_with("Timed out after 1.5s"));
    }

    #[test]
    fn test_format_json_is_lossy_text() {
        let request = CommandRequest::new("pm2 status", Duration::from_secs(5)).unwrap();
        let json = format_json(&[request], &[sample(Outcome::Completed, Some(0))]).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed[0]["command"], "pm2 status");
        assert_eq!(parsed[0]["stdout"], "online");
        assert_eq!(parsed[0]["stderr"], "\u{fffd}warn");
        assert_eq!(parsed[0]["outcome"]["status"], "completed");
        assert_eq!(parsed[0]["duration_ms"], 1500);
    }

    #[test]
    fn test_format_summary_rows() {
        let requests = vec![
            CommandRequest::new("systemctl status nginx", Duration::from_secs(5)).unwrap(),
            CommandRequest::new("curl -s localhost:3009", Duration::from_secs(5)).unwrap(),
        ];
        let results = vec![
            sample(Outcome::Completed, Some(3)),
            sample(
                Outcome::Failed {
                    kind: ErrorKind::Transport,
                    reason: "reset".into(),
                },
                None,
            ),
        ];
        let table = format_summary(&requests, &results);
        assert!(table.contains("systemctl status nginx"));
        assert!(table.contains("failed (transport)"));
        assert_eq!(format_summary(&[], &[]), "No commands were run");
    }

    #[test]
    fn test_format_entries() {
        let entries = vec![
            RemoteEntry {
                name: "logs".into(),
                kind: EntryKind::Directory,
                size: None,
            },
            RemoteEntry {
                name: "package.json".into(),
                kind: EntryKind::File,
                size: Some(1234),
            },
        ];
        let table = format_entries(&entries);
        assert!(table.contains("package.json"));
        assert!(table.contains("1234"));
        assert!(table.contains("dir"));
        assert_eq!(format_entries(&[]), "Directory is empty");
    }

    #[test]
    fn test_truncate_counts_chars() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("ééééééééééé", 6), "ééé...");
    }
}

//! remote-harness CLI
//!
//! Run shell commands on a remote host over SSH and report their output:
//! - `run` executes one or more commands on a single session
//! - `check` verifies the host is reachable and the credential is accepted
//! - `ls` and `put` list remote directories and upload files over SFTP

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use remote_harness::commands::{self, ConnectionOverrides, ReportFormat};
use remote_harness::output::print_error;

#[derive(Parser)]
#[command(name = "remote-harness")]
#[command(author, version, about = "Run and verify shell commands on a remote host over SSH")]
#[command(propagate_version = true)]
struct Cli {
    #[command(flatten)]
    connection: ConnectionArgs,

    /// Enable verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Log filter (e.g. "debug" or "rh_exec=trace"); RUST_LOG takes precedence
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ConnectionArgs {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Remote host (overrides VPS_HOST)
    #[arg(short = 'H', long, global = true)]
    host: Option<String>,

    /// Remote SSH port (overrides VPS_PORT)
    #[arg(short, long, global = true)]
    port: Option<u16>,

    /// Login user (overrides VPS_USERNAME)
    #[arg(short, long, global = true)]
    user: Option<String>,

    /// Private key file (overrides VPS_PRIVATE_KEY)
    #[arg(short = 'i', long, global = true, conflicts_with = "password_env")]
    key: Option<PathBuf>,

    /// Name of the environment variable holding the password
    #[arg(long, global = true, value_name = "NAME")]
    password_env: Option<String>,

    /// Connect, handshake and authentication deadline in milliseconds
    #[arg(long, global = true)]
    connect_timeout_ms: Option<u64>,

    /// Expected SHA-256 host key fingerprint
    #[arg(long, global = true)]
    host_key: Option<String>,
}

impl ConnectionArgs {
    fn overrides(&self) -> Result<ConnectionOverrides> {
        let password = match &self.password_env {
            Some(name) => Some(
                std::env::var(name)
                    .with_context(|| format!("Password variable {} is not set", name))?,
            ),
            None => None,
        };
        Ok(ConnectionOverrides {
            host: self.host.clone(),
            port: self.port,
            username: self.user.clone(),
            private_key: self.key.clone(),
            password,
            connect_timeout: self.connect_timeout_ms.map(Duration::from_millis),
            host_key: self.host_key.clone(),
        })
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run commands in order on one session and print their output
    Run {
        /// Shell commands, sent verbatim
        #[arg(required = true, value_name = "COMMAND")]
        commands: Vec<String>,

        /// Per-command deadline in milliseconds
        #[arg(short, long, default_value_t = 60_000)]
        timeout_ms: u64,

        /// Print results as JSON
        #[arg(long)]
        json: bool,

        /// Print a summary table to stderr
        #[arg(long)]
        summary: bool,
    },

    /// Check that the host is reachable and the credential is accepted
    Check,

    /// List a remote directory over SFTP
    Ls {
        /// Remote directory
        path: String,

        /// Deadline in milliseconds
        #[arg(short, long, default_value_t = 60_000)]
        timeout_ms: u64,

        /// Print entries as JSON
        #[arg(long)]
        json: bool,
    },

    /// Upload a local file over SFTP, replacing the remote file
    Put {
        /// Local file to send
        local: PathBuf,

        /// Destination path on the remote host
        remote: String,

        /// Deadline in milliseconds
        #[arg(short, long, default_value_t = 60_000)]
        timeout_ms: u64,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| match cli.verbose {
            0 => "warn".into(),
            1 => "info".into(),
            2 => "debug".into(),
            _ => "trace".into(),
        });

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or(log_level),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    match dispatch(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            print_error(&format!("{:#}", e));
            ExitCode::from(commands::EXIT_USAGE)
        }
    }
}

async fn dispatch(cli: Cli) -> Result<u8> {
    let overrides = cli.connection.overrides()?;
    let config = commands::resolve_connection(cli.connection.config.as_deref(), overrides)?;

    match cli.command {
        Commands::Run {
            commands: texts,
            timeout_ms,
            json,
            summary,
        } => {
            let format = if json {
                ReportFormat::Json
            } else {
                ReportFormat::Text
            };
            commands::run_command(
                &config,
                &texts,
                Duration::from_millis(timeout_ms),
                format,
                summary,
            )
            .await
        }
        Commands::Check => commands::check_command(&config).await,
        Commands::Ls {
            path,
            timeout_ms,
            json,
        } => {
            commands::list_command(&config, &path, Duration::from_millis(timeout_ms), json).await
        }
        Commands::Put {
            local,
            remote,
            timeout_ms,
        } => {
            commands::upload_command(&config, &local, &remote, Duration::from_millis(timeout_ms))
                .await
        }
    }
}

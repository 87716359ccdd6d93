//! Harness integration tests
//!
//! Drives SessionManager and CommandRunner against a scripted in-memory
//! transport so every outcome can be produced deterministically.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use rh_core::config::{ConnectionConfig, Credential};
use rh_core::exec::{ExecExit, ExecStream};
use rh_core::traits::{Transport, TransportConnection};
use rh_core::{
    CommandRequest, EntryKind, ErrorKind, HarnessError, Outcome, RemoteEntry, SessionState,
    StreamKind, TransportFault,
};
use rh_exec::{CommandRunner, FileTransfer, SessionManager, CLOSE_GRACE};

/// What the fake host does when asked to authenticate
#[derive(Clone, Copy)]
enum AuthBehaviour {
    Accept,
    Reject,
    Unreachable,
    Hang,
}

/// What the fake host does for one command
#[derive(Clone)]
enum Behaviour {
    /// Write stderr chunks, then stdout chunks, then exit
    Exit {
        stdout: Vec<&'static str>,
        stderr: Vec<&'static str>,
        code: i32,
    },
    /// Run until cancelled
    Hang,
    /// Write some output, then lose the connection
    DropConnection { stdout: Vec<&'static str> },
    /// Close the channel without an exit status
    NoStatus,
    /// Refuse to open a channel; the connection stays up
    Refuse,
}

#[derive(Default)]
struct Stats {
    auths: AtomicUsize,
    execs: AtomicUsize,
    closes: AtomicUsize,
    dropped: AtomicUsize,
    listings: AtomicUsize,
    cancelled: AtomicBool,
    files: Mutex<HashMap<String, Bytes>>,
}

struct FakeTransport {
    auth: AuthBehaviour,
    commands: Arc<HashMap<String, Behaviour>>,
    stats: Arc<Stats>,
    hang_on_close: bool,
}

impl FakeTransport {
    fn new(auth: AuthBehaviour, commands: &[(&str, Behaviour)]) -> Self {
        Self {
            auth,
            commands: Arc::new(
                commands
                    .iter()
                    .map(|(cmd, b)| (cmd.to_string(), b.clone()))
                    .collect(),
            ),
            stats: Arc::new(Stats::default()),
            hang_on_close: false,
        }
    }

    /// Disconnects never complete
    fn with_hanging_close(mut self) -> Self {
        self.hang_on_close = true;
        self
    }
}

struct FakeConnection {
    commands: Arc<HashMap<String, Behaviour>>,
    stats: Arc<Stats>,
    alive: Arc<AtomicBool>,
    hang_on_close: bool,
}

impl Drop for FakeConnection {
    fn drop(&mut self) {
        self.stats.dropped.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Transport for FakeTransport {
    type Connection = FakeConnection;

    async fn authenticate(
        &self,
        _config: &ConnectionConfig,
    ) -> Result<FakeConnection, TransportFault> {
        self.stats.auths.fetch_add(1, Ordering::SeqCst);
        match self.auth {
            AuthBehaviour::Accept => Ok(FakeConnection {
                commands: Arc::clone(&self.commands),
                stats: Arc::clone(&self.stats),
                alive: Arc::new(AtomicBool::new(true)),
                hang_on_close: self.hang_on_close,
            }),
            AuthBehaviour::Reject => Err(TransportFault::AuthRejected),
            AuthBehaviour::Unreachable => Err(TransportFault::Io(std::io::Error::from(
                std::io::ErrorKind::ConnectionRefused,
            ))),
            AuthBehaviour::Hang => std::future::pending().await,
        }
    }
}

#[async_trait]
impl TransportConnection for FakeConnection {
    async fn exec(
        &mut self,
        command: &str,
        cancel: CancellationToken,
    ) -> Result<ExecStream, TransportFault> {
        self.stats.execs.fetch_add(1, Ordering::SeqCst);
        let behaviour = self
            .commands
            .get(command)
            .cloned()
            .unwrap_or(Behaviour::Exit {
                stdout: vec![],
                stderr: vec!["sh: command not found\n"],
                code: 127,
            });

        if let Behaviour::Refuse = behaviour {
            return Err(TransportFault::Protocol("channel open refused".into()));
        }

        let (sink, stream) = ExecStream::channel();
        let stats = Arc::clone(&self.stats);
        let alive = Arc::clone(&self.alive);
        tokio::spawn(async move {
            match behaviour {
                Behaviour::Exit {
                    stdout,
                    stderr,
                    code,
                } => {
                    for chunk in stderr {
                        sink.stderr(Bytes::from_static(chunk.as_bytes()));
                    }
                    for chunk in stdout {
                        sink.stdout(Bytes::from_static(chunk.as_bytes()));
                        tokio::task::yield_now().await;
                    }
                    sink.finish(ExecExit::Status(code));
                }
                Behaviour::Hang => {
                    cancel.cancelled().await;
                    stats.cancelled.store(true, Ordering::SeqCst);
                    sink.finish(ExecExit::Closed);
                }
                Behaviour::DropConnection { stdout } => {
                    for chunk in stdout {
                        sink.stdout(Bytes::from_static(chunk.as_bytes()));
                    }
                    alive.store(false, Ordering::SeqCst);
                    sink.finish(ExecExit::Lost(TransportFault::ConnectionReset(
                        "peer went away".into(),
                    )));
                }
                Behaviour::NoStatus => sink.finish(ExecExit::Closed),
                Behaviour::Refuse => unreachable!(),
            }
        });
        Ok(stream)
    }

    async fn list_dir(&mut self, path: &str) -> Result<Vec<RemoteEntry>, TransportFault> {
        self.stats.listings.fetch_add(1, Ordering::SeqCst);
        match path {
            "/var/www/app" => Ok(vec![
                RemoteEntry {
                    name: "data".into(),
                    kind: EntryKind::Directory,
                    size: Some(4096),
                },
                RemoteEntry {
                    name: "app-integrated.js".into(),
                    kind: EntryKind::File,
                    size: Some(18_220),
                },
            ]),
            "/mnt/stale-nfs" => std::future::pending().await,
            "/dev/unplugged" => {
                self.alive.store(false, Ordering::SeqCst);
                Err(TransportFault::ConnectionReset("channel closed".into()))
            }
            _ => Err(TransportFault::RemoteFile {
                path: path.to_string(),
                reason: "No such file".into(),
            }),
        }
    }

    async fn upload(&mut self, contents: Bytes, remote_path: &str) -> Result<u64, TransportFault> {
        if remote_path.starts_with("/root/") {
            return Err(TransportFault::RemoteFile {
                path: remote_path.to_string(),
                reason: "Permission denied".into(),
            });
        }
        let len = contents.len() as u64;
        self.stats
            .files
            .lock()
            .unwrap()
            .insert(remote_path.to_string(), contents);
        Ok(len)
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    async fn close(&mut self) -> Result<(), TransportFault> {
        self.stats.closes.fetch_add(1, Ordering::SeqCst);
        self.alive.store(false, Ordering::SeqCst);
        if self.hang_on_close {
            std::future::pending::<()>().await;
        }
        Ok(())
    }
}

fn test_config() -> ConnectionConfig {
    ConnectionConfig::new("vps.test", "root", Credential::Password("pw".into()))
        .with_connect_timeout(Duration::from_secs(2))
}

fn request(text: &str) -> CommandRequest {
    CommandRequest::new(text, Duration::from_secs(5)).unwrap()
}

fn exit(code: i32) -> Behaviour {
    Behaviour::Exit {
        stdout: vec![],
        stderr: vec![],
        code,
    }
}

#[tokio::test]
async fn test_connect_returns_ready_session() {
    let manager = SessionManager::new(FakeTransport::new(AuthBehaviour::Accept, &[]));
    let session = manager.connect(&test_config()).await.unwrap();

    assert_eq!(session.state(), SessionState::Ready);
    assert!(manager.is_alive(&session));
    assert_eq!(session.endpoint(), "vps.test:22");
}

#[tokio::test]
async fn test_connect_auth_rejected() {
    let manager = SessionManager::new(FakeTransport::new(AuthBehaviour::Reject, &[]));
    let err = manager.connect(&test_config()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Auth);
}

#[tokio::test]
async fn test_connect_unreachable_host() {
    let manager = SessionManager::new(FakeTransport::new(AuthBehaviour::Unreachable, &[]));
    let err = manager.connect(&test_config()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Network);
}

#[tokio::test(start_paused = true)]
async fn test_connect_timeout_exposes_no_session() {
    let manager = SessionManager::new(FakeTransport::new(AuthBehaviour::Hang, &[]));
    let started = tokio::time::Instant::now();
    let err = manager.connect(&test_config()).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert!(started.elapsed() >= Duration::from_secs(2));
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[tokio::test]
async fn test_connect_rejects_invalid_config_without_io() {
    let transport = FakeTransport::new(AuthBehaviour::Accept, &[]);
    let stats = Arc::clone(&transport.stats);
    let manager = SessionManager::new(transport);

    let config = ConnectionConfig::new("", "root", Credential::Password("pw".into()));
    let err = manager.connect(&config).await.unwrap_err();

    assert!(matches!(err, HarnessError::Config(_)));
    assert_eq!(stats.auths.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_exit_codes_are_data_not_errors() {
    let manager = SessionManager::new(FakeTransport::new(
        AuthBehaviour::Accept,
        &[("true", exit(0)), ("false", exit(1))],
    ));
    let runner = CommandRunner::new();
    let mut session = manager.connect(&test_config()).await.unwrap();

    let ok = runner.run(&mut session, &request("true")).await.unwrap();
    assert_eq!(ok.outcome, Outcome::Completed);
    assert_eq!(ok.exit_code, Some(0));
    assert!(ok.is_success());

    let failed = runner.run(&mut session, &request("false")).await.unwrap();
    assert_eq!(failed.outcome, Outcome::Completed);
    assert_eq!(failed.exit_code, Some(1));
    assert!(!failed.is_success());

    assert_eq!(session.state(), SessionState::Ready);
}

#[tokio::test]
async fn test_stream_separation() {
    let manager = SessionManager::new(FakeTransport::new(
        AuthBehaviour::Accept,
        &[(
            "echo A; echo B >&2",
            Behaviour::Exit {
                stdout: vec!["A"],
                stderr: vec!["B"],
                code: 0,
            },
        )],
    ));
    let mut session = manager.connect(&test_config()).await.unwrap();
    let result = CommandRunner::new()
        .run(&mut session, &request("echo A; echo B >&2"))
        .await
        .unwrap();

    let stdout: Vec<_> = result.transcript.stream(StreamKind::Stdout).collect();
    let stderr: Vec<_> = result.transcript.stream(StreamKind::Stderr).collect();
    assert_eq!(stdout.len(), 1);
    assert_eq!(stderr.len(), 1);
    assert_eq!(stdout[0].bytes, Bytes::from_static(b"A"));
    assert_eq!(stderr[0].bytes, Bytes::from_static(b"B"));
}

#[tokio::test]
async fn test_chunks_keep_order_within_stream() {
    let manager = SessionManager::new(FakeTransport::new(
        AuthBehaviour::Accept,
        &[(
            "pm2 logs --nostream",
            Behaviour::Exit {
                stdout: vec!["one\n", "two\n", "three\n", "four\n"],
                stderr: vec!["warn-1\n", "warn-2\n"],
                code: 0,
            },
        )],
    ));
    let mut session = manager.connect(&test_config()).await.unwrap();
    let result = CommandRunner::new()
        .run(&mut session, &request("pm2 logs --nostream"))
        .await
        .unwrap();

    let seqs: Vec<u64> = result
        .transcript
        .stream(StreamKind::Stdout)
        .map(|c| c.sequence)
        .collect();
    assert_eq!(seqs, vec![0, 1, 2, 3]);
    assert_eq!(result.transcript.stdout_lossy(), "one\ntwo\nthree\nfour\n");
    assert_eq!(result.transcript.stderr_lossy(), "warn-1\nwarn-2\n");
}

#[tokio::test(start_paused = true)]
async fn test_command_timeout_tears_down_session() {
    let transport = FakeTransport::new(AuthBehaviour::Accept, &[("sleep 600", Behaviour::Hang)]);
    let stats = Arc::clone(&transport.stats);
    let manager = SessionManager::new(transport);
    let mut session = manager.connect(&test_config()).await.unwrap();

    let slow = CommandRequest::new("sleep 600", Duration::from_millis(500)).unwrap();
    let result = CommandRunner::new().run(&mut session, &slow).await.unwrap();

    assert_eq!(result.outcome, Outcome::TimedOut);
    assert_eq!(result.exit_code, None);
    assert!(result.duration >= Duration::from_millis(500));
    assert!(result.duration < Duration::from_millis(600));
    assert_eq!(session.state(), SessionState::Closed);
    assert!(!session.is_alive());
    assert_eq!(stats.closes.load(Ordering::SeqCst), 1);

    // Let the remote side observe the cancellation
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert!(stats.cancelled.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_run_on_closed_session_is_rejected_without_io() {
    let transport = FakeTransport::new(AuthBehaviour::Accept, &[("uptime", exit(0))]);
    let stats = Arc::clone(&transport.stats);
    let manager = SessionManager::new(transport);
    let mut session = manager.connect(&test_config()).await.unwrap();
    manager.close(&mut session).await;

    let err = CommandRunner::new()
        .run(&mut session, &request("uptime"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidState);
    assert_eq!(stats.execs.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_close_is_idempotent() {
    let transport = FakeTransport::new(AuthBehaviour::Accept, &[]);
    let stats = Arc::clone(&transport.stats);
    let manager = SessionManager::new(transport);
    let mut session = manager.connect(&test_config()).await.unwrap();

    manager.close(&mut session).await;
    manager.close(&mut session).await;
    session.close().await;

    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(stats.closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_connection_lost_mid_command() {
    let transport = FakeTransport::new(
        AuthBehaviour::Accept,
        &[(
            "tail -f app.log",
            Behaviour::DropConnection {
                stdout: vec!["partial line"],
            },
        )],
    );
    let stats = Arc::clone(&transport.stats);
    let manager = SessionManager::new(transport);
    let mut session = manager.connect(&test_config()).await.unwrap();

    let result = CommandRunner::new()
        .run(&mut session, &request("tail -f app.log"))
        .await
        .unwrap();

    assert!(matches!(
        result.outcome,
        Outcome::Failed {
            kind: ErrorKind::Transport,
            ..
        }
    ));
    assert_eq!(result.exit_code, None);
    assert_eq!(result.transcript.stdout_lossy(), "partial line");
    assert_eq!(session.state(), SessionState::Failed);
    assert!(!manager.is_alive(&session));

    manager.close(&mut session).await;
    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(stats.closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_refused_channel_leaves_session_ready() {
    let manager = SessionManager::new(FakeTransport::new(
        AuthBehaviour::Accept,
        &[("whoami", Behaviour::Refuse)],
    ));
    let mut session = manager.connect(&test_config()).await.unwrap();

    let result = CommandRunner::new()
        .run(&mut session, &request("whoami"))
        .await
        .unwrap();

    assert!(matches!(result.outcome, Outcome::Failed { .. }));
    assert!(result.transcript.is_empty());
    assert_eq!(session.state(), SessionState::Ready);
}

#[tokio::test]
async fn test_channel_close_without_status() {
    let manager = SessionManager::new(FakeTransport::new(
        AuthBehaviour::Accept,
        &[("exec true", Behaviour::NoStatus)],
    ));
    let mut session = manager.connect(&test_config()).await.unwrap();

    let result = CommandRunner::new()
        .run(&mut session, &request("exec true"))
        .await
        .unwrap();

    assert_eq!(result.outcome, Outcome::Completed);
    assert_eq!(result.exit_code, None);
}

#[tokio::test(start_paused = true)]
async fn test_run_all_stops_after_timeout() {
    let transport = FakeTransport::new(
        AuthBehaviour::Accept,
        &[
            ("pm2 list", exit(0)),
            ("grep -r missing /var/www", exit(1)),
            ("curl -s localhost:3009/api/health", Behaviour::Hang),
            ("sqlite3 app.db .tables", exit(0)),
        ],
    );
    let stats = Arc::clone(&transport.stats);
    let manager = SessionManager::new(transport);
    let mut session = manager.connect(&test_config()).await.unwrap();

    let requests = vec![
        request("pm2 list"),
        request("grep -r missing /var/www"),
        CommandRequest::new("curl -s localhost:3009/api/health", Duration::from_secs(1)).unwrap(),
        request("sqlite3 app.db .tables"),
    ];
    let results = CommandRunner::new()
        .run_all(&mut session, &requests)
        .await
        .unwrap();

    assert_eq!(results.len(), 3);
    assert_eq!(results[1].exit_code, Some(1));
    assert_eq!(results[2].outcome, Outcome::TimedOut);
    assert_eq!(stats.execs.load(Ordering::SeqCst), 3);
    assert_eq!(session.state(), SessionState::Closed);
}

#[tokio::test]
async fn test_unknown_command_reports_remote_error() {
    let manager = SessionManager::new(FakeTransport::new(AuthBehaviour::Accept, &[]));
    let mut session = manager.connect(&test_config()).await.unwrap();

    let result = CommandRunner::new()
        .run(&mut session, &request("no-such-tool --version"))
        .await
        .unwrap();

    assert_eq!(result.exit_code, Some(127));
    assert!(result.transcript.stderr_lossy().contains("not found"));
}

#[tokio::test]
async fn test_with_session_always_closes() {
    let transport = FakeTransport::new(AuthBehaviour::Accept, &[("uptime", exit(0))]);
    let stats = Arc::clone(&transport.stats);
    let manager = SessionManager::new(transport);
    let runner = CommandRunner::new();
    let uptime = request("uptime");

    let result = manager
        .with_session(&test_config(), |session| {
            Box::pin(async move { runner.run(session, &uptime).await })
        })
        .await
        .unwrap();
    assert_eq!(result.exit_code, Some(0));
    assert_eq!(stats.closes.load(Ordering::SeqCst), 1);

    let err = manager
        .with_session(&test_config(), |_session| {
            Box::pin(async { Err::<(), _>(HarnessError::invalid_state("caller bailed")) })
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    assert_eq!(stats.closes.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_dropped_run_signals_remote_command() {
    let transport = FakeTransport::new(AuthBehaviour::Accept, &[("tail -f app.log", Behaviour::Hang)]);
    let stats = Arc::clone(&transport.stats);
    let manager = SessionManager::new(transport);
    let runner = CommandRunner::new();
    let mut session = manager.connect(&test_config()).await.unwrap();

    let follow = CommandRequest::new("tail -f app.log", Duration::from_secs(60)).unwrap();
    let abandoned =
        tokio::time::timeout(Duration::from_millis(100), runner.run(&mut session, &follow)).await;
    assert!(abandoned.is_err());

    tokio::time::sleep(Duration::from_millis(1)).await;
    assert!(stats.cancelled.load(Ordering::SeqCst));

    // The session is still usable for the next command
    assert_eq!(session.state(), SessionState::Ready);
    let result = runner.run(&mut session, &request("uptime")).await.unwrap();
    assert_eq!(result.outcome, Outcome::Completed);
}

#[tokio::test(start_paused = true)]
async fn test_command_timeout_with_stalled_disconnect() {
    let transport = FakeTransport::new(AuthBehaviour::Accept, &[("sleep 600", Behaviour::Hang)])
        .with_hanging_close();
    let stats = Arc::clone(&transport.stats);
    let manager = SessionManager::new(transport);
    let mut session = manager.connect(&test_config()).await.unwrap();

    let slow = CommandRequest::new("sleep 600", Duration::from_millis(500)).unwrap();
    let result = tokio::time::timeout(
        Duration::from_secs(3600),
        CommandRunner::new().run(&mut session, &slow),
    )
    .await
    .expect("run must resolve despite a stalled disconnect")
    .unwrap();

    assert_eq!(result.outcome, Outcome::TimedOut);
    assert!(result.duration <= Duration::from_millis(500) + CLOSE_GRACE + Duration::from_millis(50));
    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(stats.closes.load(Ordering::SeqCst), 1);
    assert_eq!(stats.dropped.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_close_with_stalled_disconnect() {
    let transport = FakeTransport::new(AuthBehaviour::Accept, &[]).with_hanging_close();
    let stats = Arc::clone(&transport.stats);
    let manager = SessionManager::new(transport);
    let mut session = manager.connect(&test_config()).await.unwrap();

    let started = tokio::time::Instant::now();
    manager.close(&mut session).await;

    assert!(started.elapsed() <= CLOSE_GRACE + Duration::from_millis(50));
    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(stats.dropped.load(Ordering::SeqCst), 1);

    // Second close does not retry the disconnect
    manager.close(&mut session).await;
    assert_eq!(stats.closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_dropping_session_drops_connection() {
    let transport = FakeTransport::new(AuthBehaviour::Accept, &[]);
    let stats = Arc::clone(&transport.stats);
    let manager = SessionManager::new(transport);

    let session = manager.connect(&test_config()).await.unwrap();
    drop(session);

    assert_eq!(stats.dropped.load(Ordering::SeqCst), 1);
    assert_eq!(stats.closes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_list_directory() {
    let manager = SessionManager::new(FakeTransport::new(AuthBehaviour::Accept, &[]));
    let mut session = manager.connect(&test_config()).await.unwrap();

    let entries = FileTransfer::new()
        .list_directory(&mut session, "/var/www/app", Duration::from_secs(5))
        .await
        .unwrap();

    let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["data", "app-integrated.js"]);
    assert_eq!(entries[0].kind, EntryKind::Directory);
}

#[tokio::test]
async fn test_list_missing_directory_is_remote_file_error() {
    let manager = SessionManager::new(FakeTransport::new(AuthBehaviour::Accept, &[]));
    let mut session = manager.connect(&test_config()).await.unwrap();

    let err = FileTransfer::new()
        .list_directory(&mut session, "/var/www/gone", Duration::from_secs(5))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Transport);
    assert!(matches!(err, HarnessError::RemoteFile { ref path, .. } if path == "/var/www/gone"));
    assert_eq!(session.state(), SessionState::Ready);
}

#[tokio::test(start_paused = true)]
async fn test_list_timeout_closes_session() {
    let manager = SessionManager::new(FakeTransport::new(AuthBehaviour::Accept, &[]));
    let mut session = manager.connect(&test_config()).await.unwrap();

    let err = FileTransfer::new()
        .list_directory(&mut session, "/mnt/stale-nfs", Duration::from_secs(1))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert_eq!(session.state(), SessionState::Closed);
}

#[tokio::test]
async fn test_list_after_connection_loss_fails_session() {
    let manager = SessionManager::new(FakeTransport::new(AuthBehaviour::Accept, &[]));
    let mut session = manager.connect(&test_config()).await.unwrap();

    let err = FileTransfer::new()
        .list_directory(&mut session, "/dev/unplugged", Duration::from_secs(5))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Transport);
    assert_eq!(session.state(), SessionState::Failed);
}

#[tokio::test]
async fn test_list_on_closed_session_is_rejected_without_io() {
    let transport = FakeTransport::new(AuthBehaviour::Accept, &[]);
    let stats = Arc::clone(&transport.stats);
    let manager = SessionManager::new(transport);
    let mut session = manager.connect(&test_config()).await.unwrap();
    manager.close(&mut session).await;

    let err = FileTransfer::new()
        .list_directory(&mut session, "/var/www/app", Duration::from_secs(5))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidState);
    assert_eq!(stats.listings.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_upload_writes_contents() {
    let transport = FakeTransport::new(AuthBehaviour::Accept, &[]);
    let stats = Arc::clone(&transport.stats);
    let manager = SessionManager::new(transport);
    let mut session = manager.connect(&test_config()).await.unwrap();
    let transfer = FileTransfer::new();

    let written = transfer
        .upload(
            &mut session,
            Bytes::from_static(b"module.exports = {};\n"),
            "/var/www/app/src/routes.js",
            Duration::from_secs(5),
        )
        .await
        .unwrap();
    assert_eq!(written, 21);

    let mut local = tempfile::NamedTempFile::new().unwrap();
    std::io::Write::write_all(&mut local, b"[]").unwrap();
    transfer
        .upload_file(
            &mut session,
            local.path(),
            "/var/www/app/data/sellers.json",
            Duration::from_secs(5),
        )
        .await
        .unwrap();

    let files = stats.files.lock().unwrap();
    assert_eq!(
        files.get("/var/www/app/src/routes.js"),
        Some(&Bytes::from_static(b"module.exports = {};\n"))
    );
    assert_eq!(
        files.get("/var/www/app/data/sellers.json"),
        Some(&Bytes::from_static(b"[]"))
    );
}

#[tokio::test]
async fn test_upload_permission_denied() {
    let manager = SessionManager::new(FakeTransport::new(AuthBehaviour::Accept, &[]));
    let mut session = manager.connect(&test_config()).await.unwrap();

    let err = FileTransfer::new()
        .upload(
            &mut session,
            Bytes::from_static(b"x"),
            "/root/.bashrc",
            Duration::from_secs(5),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, HarnessError::RemoteFile { ref reason, .. } if reason == "Permission denied"));
    assert_eq!(session.state(), SessionState::Ready);
}

#[tokio::test]
async fn test_upload_missing_local_file() {
    let manager = SessionManager::new(FakeTransport::new(AuthBehaviour::Accept, &[]));
    let mut session = manager.connect(&test_config()).await.unwrap();
    let dir = tempfile::tempdir().unwrap();

    let err = FileTransfer::new()
        .upload_file(
            &mut session,
            &dir.path().join("absent.js"),
            "/var/www/app/absent.js",
            Duration::from_secs(5),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, HarnessError::Config(_)));
}

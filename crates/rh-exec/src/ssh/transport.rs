//! Outbound SSH connections and command channels

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use russh::client::{self, Config, Handle, Msg};
use russh::{Channel, ChannelMsg, Disconnect, Sig};
use russh_keys::key::KeyPair;
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

use rh_core::config::{ConnectionConfig, Credential};
use rh_core::exec::{ExecExit, ExecSink, ExecStream};
use rh_core::traits::{Transport, TransportConnection};
use rh_core::{RemoteEntry, TransportFault};

use super::handler::ClientHandler;
use super::sftp;

/// Opens SSH sessions with password or public-key authentication
#[derive(Clone)]
pub struct SshTransport {
    ssh_config: Arc<Config>,
}

impl SshTransport {
    /// Transport with russh defaults
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Transport with a caller-tuned russh client config
    pub fn with_config(config: Config) -> Self {
        Self {
            ssh_config: Arc::new(config),
        }
    }
}

impl Default for SshTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for SshTransport {
    type Connection = SshConnection;

    async fn authenticate(
        &self,
        config: &ConnectionConfig,
    ) -> Result<SshConnection, TransportFault> {
        // Load the key before touching the network so a bad path fails fast
        let method = match &config.credential {
            Credential::Password(password) => AuthMethod::Password(password.clone()),
            Credential::PrivateKey { path, passphrase } => {
                let key = russh_keys::load_secret_key(path, passphrase.as_deref()).map_err(|e| {
                    TransportFault::Other(format!(
                        "failed to load private key {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                AuthMethod::PublicKey(Arc::new(key))
            }
        };

        let addrs: Vec<SocketAddr> = tokio::net::lookup_host((config.host.as_str(), config.port))
            .await
            .map_err(|e| TransportFault::Dns {
                host: config.host.clone(),
                reason: e.to_string(),
            })?
            .collect();
        if addrs.is_empty() {
            return Err(TransportFault::Dns {
                host: config.host.clone(),
                reason: "no addresses returned".into(),
            });
        }

        tracing::debug!("Opening TCP connection to {:?}", addrs);
        let stream = TcpStream::connect(&addrs[..]).await?;
        stream.set_nodelay(true)?;

        let handler = ClientHandler::new(config.host_key_fingerprint.clone());
        let mut handle = client::connect_stream(Arc::clone(&self.ssh_config), stream, handler)
            .await
            .map_err(fault_from_russh)?;

        tracing::debug!("Authenticating as user '{}'", config.username);
        let authenticated = match method {
            AuthMethod::Password(password) => {
                handle.authenticate_password(&config.username, password).await
            }
            AuthMethod::PublicKey(key) => handle.authenticate_publickey(&config.username, key).await,
        }
        .map_err(fault_from_russh)?;

        if !authenticated {
            let _ = handle
                .disconnect(Disconnect::ByApplication, "authentication failed", "en")
                .await;
            return Err(TransportFault::AuthRejected);
        }

        tracing::debug!("Authentication successful");
        Ok(SshConnection {
            handle,
            alive: Arc::new(AtomicBool::new(true)),
        })
    }
}

enum AuthMethod {
    Password(String),
    PublicKey(Arc<KeyPair>),
}

/// An authenticated SSH connection
pub struct SshConnection {
    handle: Handle<ClientHandler>,
    /// Cleared when a channel observes the session going away
    alive: Arc<AtomicBool>,
}

#[async_trait]
impl TransportConnection for SshConnection {
    async fn exec(
        &mut self,
        command: &str,
        cancel: CancellationToken,
    ) -> Result<ExecStream, TransportFault> {
        let channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| self.lost(e))?;
        channel.exec(true, command).await.map_err(|e| self.lost(e))?;
        tracing::debug!("Started command on channel {:?}", channel.id());

        let (sink, stream) = ExecStream::channel();
        tokio::spawn(pump(channel, sink, cancel, Arc::clone(&self.alive)));
        Ok(stream)
    }

    async fn list_dir(&mut self, path: &str) -> Result<Vec<RemoteEntry>, TransportFault> {
        let session = self.open_sftp().await?;
        let listing = sftp::list_dir(&session, path).await;
        finish_sftp(session).await;
        listing
    }

    async fn upload(&mut self, contents: Bytes, remote_path: &str) -> Result<u64, TransportFault> {
        let session = self.open_sftp().await?;
        let written = sftp::upload(&session, contents, remote_path).await;
        finish_sftp(session).await;
        written
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst) && !self.handle.is_closed()
    }

    async fn close(&mut self) -> Result<(), TransportFault> {
        self.alive.store(false, Ordering::SeqCst);
        if self.handle.is_closed() {
            return Ok(());
        }
        self.handle
            .disconnect(Disconnect::ByApplication, "closing", "en")
            .await
            .map_err(fault_from_russh)
    }
}

impl SshConnection {
    async fn open_sftp(&self) -> Result<russh_sftp::client::SftpSession, TransportFault> {
        let opened = sftp::open(&self.handle).await;
        if opened.is_err() && self.handle.is_closed() {
            self.alive.store(false, Ordering::SeqCst);
        }
        opened
    }

    /// Convert an error, clearing liveness if the session itself is gone
    fn lost(&self, err: russh::Error) -> TransportFault {
        if self.handle.is_closed() {
            self.alive.store(false, Ordering::SeqCst);
        }
        fault_from_russh(err)
    }
}

async fn finish_sftp(session: russh_sftp::client::SftpSession) {
    if let Err(e) = session.close().await {
        tracing::debug!("Failed to close sftp session: {}", e);
    }
}

/// Demultiplex one exec channel into the sink until it closes or is cancelled
async fn pump(
    mut channel: Channel<Msg>,
    sink: ExecSink,
    cancel: CancellationToken,
    alive: Arc<AtomicBool>,
) {
    let mut exit: Option<ExecExit> = None;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!("Cancelling command on channel {:?}", channel.id());
                if let Err(e) = channel.signal(Sig::KILL).await {
                    tracing::debug!("Failed to signal remote process: {}", e);
                }
                let _ = channel.close().await;
                sink.finish(exit.unwrap_or(ExecExit::Closed));
                return;
            }
            msg = channel.wait() => match msg {
                Some(ChannelMsg::Data { data }) => {
                    sink.stdout(Bytes::copy_from_slice(&data));
                }
                Some(ChannelMsg::ExtendedData { data, ext: 1 }) => {
                    sink.stderr(Bytes::copy_from_slice(&data));
                }
                Some(ChannelMsg::ExtendedData { ext, .. }) => {
                    tracing::debug!("Ignoring extended data of type {}", ext);
                }
                Some(ChannelMsg::ExitStatus { exit_status }) => {
                    exit = Some(ExecExit::Status(exit_status as i32));
                }
                Some(ChannelMsg::ExitSignal { signal_name, .. }) => {
                    exit = Some(ExecExit::Signal {
                        name: format!("{:?}", signal_name),
                    });
                }
                Some(ChannelMsg::Eof) => {
                    tracing::trace!("Channel {:?} EOF", channel.id());
                }
                Some(ChannelMsg::Close) => break,
                Some(_) => {}
                None => {
                    if exit.is_none() {
                        alive.store(false, Ordering::SeqCst);
                        sink.finish(ExecExit::Lost(TransportFault::ConnectionReset(
                            "SSH session ended while the command was running".into(),
                        )));
                        return;
                    }
                    break;
                }
            }
        }
    }

    sink.finish(exit.unwrap_or(ExecExit::Closed));
}

/// Translate a russh error into a transport fault
pub(crate) fn fault_from_russh(err: russh::Error) -> TransportFault {
    let text = err.to_string();
    match err {
        russh::Error::IO(e) => TransportFault::Io(e),
        russh::Error::NotAuthenticated => TransportFault::AuthRejected,
        russh::Error::Disconnect | russh::Error::HUP => TransportFault::ConnectionReset(text),
        russh::Error::ConnectionTimeout => {
            TransportFault::Io(io::Error::new(io::ErrorKind::TimedOut, text))
        }
        russh::Error::UnknownKey => {
            TransportFault::Protocol("server host key was rejected".into())
        }
        _ => TransportFault::Protocol(text),
    }
}

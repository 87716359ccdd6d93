//! Connection configuration

use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use super::serde_utils::duration_millis;
use crate::error::ConfigError;

/// Default SSH port
pub const DEFAULT_PORT: u16 = 22;

/// Default deadline for TCP connect, handshake and authentication
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(20_000);

/// Environment variables read by [`ConnectionConfig::from_env`]
pub mod env {
    pub const HOST: &str = "VPS_HOST";
    pub const PORT: &str = "VPS_PORT";
    pub const USERNAME: &str = "VPS_USERNAME";
    pub const PASSWORD: &str = "VPS_PASSWORD";
    pub const PRIVATE_KEY: &str = "VPS_PRIVATE_KEY";
    pub const KEY_PASSPHRASE: &str = "VPS_KEY_PASSPHRASE";
    pub const CONNECT_TIMEOUT_MS: &str = "VPS_CONNECT_TIMEOUT_MS";
    pub const HOST_KEY: &str = "VPS_HOST_KEY";
}

/// How to authenticate to the remote host
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// Password authentication
    Password(String),
    /// Public-key authentication with a key file on disk
    PrivateKey {
        path: PathBuf,
        passphrase: Option<String>,
    },
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Password(_) => f.write_str("Password(<redacted>)"),
            Credential::PrivateKey { path, passphrase } => f
                .debug_struct("PrivateKey")
                .field("path", path)
                .field("passphrase", &passphrase.as_ref().map(|_| "<redacted>"))
                .finish(),
        }
    }
}

/// Everything needed to open one session to one host
///
/// Supplied by the caller and never mutated by the harness.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "ConnectionFile")]
pub struct ConnectionConfig {
    /// Remote host name or address
    pub host: String,
    /// Remote SSH port
    pub port: u16,
    /// Login user
    pub username: String,
    /// Authentication material
    pub credential: Credential,
    /// Deadline for the transport to report ready
    pub connect_timeout: Duration,
    /// Expected SHA-256 host key fingerprint; any key is accepted when unset
    pub host_key_fingerprint: Option<String>,
}

impl ConnectionConfig {
    /// Create a config with default port and timeout
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        credential: Credential,
    ) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            username: username.into(),
            credential,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            host_key_fingerprint: None,
        }
    }

    /// Override the port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Override the connect deadline
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Pin the expected host key fingerprint
    pub fn with_host_key(mut self, fingerprint: impl Into<String>) -> Self {
        self.host_key_fingerprint = Some(fingerprint.into());
        self
    }

    /// `host:port` for logging and error messages
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check the invariants `connect` relies on
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::MissingField("host".into()));
        }
        if self.username.trim().is_empty() {
            return Err(ConfigError::MissingField("username".into()));
        }
        if self.port == 0 {
            return Err(ConfigError::Invalid("port must be non-zero".into()));
        }
        if self.connect_timeout.is_zero() {
            return Err(ConfigError::Invalid("connect timeout must be non-zero".into()));
        }
        match &self.credential {
            Credential::Password(p) if p.is_empty() => {
                Err(ConfigError::Invalid("password is empty".into()))
            }
            Credential::PrivateKey { path, .. } if path.as_os_str().is_empty() => {
                Err(ConfigError::Invalid("private key path is empty".into()))
            }
            _ => Ok(()),
        }
    }

    /// Build a config from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup using the `VPS_*` names
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = match lookup(env::PORT) {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("{} is not a port: {}", env::PORT, raw)))?,
            None => DEFAULT_PORT,
        };
        let connect_timeout = match lookup(env::CONNECT_TIMEOUT_MS) {
            Some(raw) => Duration::from_millis(raw.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!("{} is not a number: {}", env::CONNECT_TIMEOUT_MS, raw))
            })?),
            None => DEFAULT_CONNECT_TIMEOUT,
        };

        let file = ConnectionFile {
            host: lookup(env::HOST).ok_or_else(|| ConfigError::MissingField(env::HOST.into()))?,
            port,
            username: lookup(env::USERNAME)
                .ok_or_else(|| ConfigError::MissingField(env::USERNAME.into()))?,
            password: lookup(env::PASSWORD),
            private_key: lookup(env::PRIVATE_KEY).map(PathBuf::from),
            passphrase: lookup(env::KEY_PASSPHRASE),
            connect_timeout_ms: connect_timeout,
            host_key: lookup(env::HOST_KEY),
        };
        Self::try_from(file)
    }
}

/// On-disk / environment shape of a connection config
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConnectionFile {
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    username: String,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    private_key: Option<PathBuf>,
    #[serde(default)]
    passphrase: Option<String>,
    #[serde(default = "default_connect_timeout", with = "duration_millis")]
    connect_timeout_ms: Duration,
    #[serde(default)]
    host_key: Option<String>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_connect_timeout() -> Duration {
    DEFAULT_CONNECT_TIMEOUT
}

impl TryFrom<ConnectionFile> for ConnectionConfig {
    type Error = ConfigError;

    fn try_from(file: ConnectionFile) -> Result<Self, Self::Error> {
        let credential = match (file.password, file.private_key) {
            (Some(password), None) => Credential::Password(password),
            (None, Some(path)) => Credential::PrivateKey {
                path,
                passphrase: file.passphrase,
            },
            (Some(_), Some(_)) => {
                return Err(ConfigError::Invalid(
                    "set either password or private_key, not both".into(),
                ))
            }
            (None, None) => return Err(ConfigError::MissingField("password or private_key".into())),
        };

        let config = ConnectionConfig {
            host: file.host,
            port: file.port,
            username: file.username,
            credential,
            connect_timeout: file.connect_timeout_ms,
            host_key_fingerprint: file.host_key,
        };
        config.validate()?;
        Ok(config)
    }
}

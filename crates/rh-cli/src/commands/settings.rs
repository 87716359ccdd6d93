//! Connection settings resolution
//!
//! Settings come from a config file if one is given or the default file
//! exists, otherwise from the `VPS_*` environment. The two are not merged:
//! with a file, the only variable read is `VPS_KEY_PASSPHRASE`, and only when
//! `--key` is given. Command-line flags win over either source.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};

use rh_core::config::{self, env, ConnectionConfig, Credential};

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct ConnectionOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub private_key: Option<PathBuf>,
    pub password: Option<String>,
    pub connect_timeout: Option<Duration>,
    pub host_key: Option<String>,
}

impl ConnectionOverrides {
    /// Override value under its `VPS_*` name
    fn lookup(&self, key: &str) -> Option<String> {
        match key {
            env::HOST => self.host.clone(),
            env::PORT => self.port.map(|p| p.to_string()),
            env::USERNAME => self.username.clone(),
            env::PASSWORD => self.password.clone(),
            env::PRIVATE_KEY => self
                .private_key
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned()),
            env::CONNECT_TIMEOUT_MS => self.connect_timeout.map(|t| t.as_millis().to_string()),
            env::HOST_KEY => self.host_key.clone(),
            _ => None,
        }
    }

    /// A credential flag hides the other credential form from the environment
    fn hides(&self, key: &str) -> bool {
        match key {
            env::PASSWORD => self.private_key.is_some(),
            env::PRIVATE_KEY | env::KEY_PASSPHRASE => self.password.is_some(),
            _ => false,
        }
    }

    fn apply<F>(self, mut config: ConnectionConfig, lookup: &F) -> ConnectionConfig
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(username) = self.username {
            config.username = username;
        }
        if let Some(timeout) = self.connect_timeout {
            config.connect_timeout = timeout;
        }
        if let Some(host_key) = self.host_key {
            config.host_key_fingerprint = Some(host_key);
        }
        if let Some(path) = self.private_key {
            config.credential = Credential::PrivateKey {
                path,
                passphrase: lookup(env::KEY_PASSPHRASE),
            };
        } else if let Some(password) = self.password {
            config.credential = Credential::Password(password);
        }
        config
    }
}

/// Resolve settings from `config_path` (or the default file if it exists),
/// the process environment and `overrides`
pub fn resolve_connection(
    config_path: Option<&Path>,
    overrides: ConnectionOverrides,
) -> Result<ConnectionConfig> {
    let file = match config_path {
        Some(path) => Some(path.to_path_buf()),
        None => {
            let default_path = config::default_config_path();
            default_path.exists().then_some(default_path)
        }
    };
    resolve_with(file.as_deref(), overrides, |key| std::env::var(key).ok())
}

/// Resolve settings against an explicit file and environment lookup
pub fn resolve_with<F>(
    file: Option<&Path>,
    overrides: ConnectionOverrides,
    lookup: F,
) -> Result<ConnectionConfig>
where
    F: Fn(&str) -> Option<String>,
{
    match file {
        Some(path) => {
            tracing::debug!("Loading connection settings from {:?}", path);
            let loaded: ConnectionConfig = config::load_config(path)
                .with_context(|| format!("Failed to load config from {:?}", path))?;
            let resolved = overrides.apply(loaded, &lookup);
            resolved.validate().context("Invalid connection settings")?;
            Ok(resolved)
        }
        None => {
            tracing::debug!("Reading connection settings from the environment");
            ConnectionConfig::from_lookup(|key| {
                overrides
                    .lookup(key)
                    .or_else(|| if overrides.hides(key) { None } else { lookup(key) })
            })
            .with_context(|| {
                format!(
                    "Incomplete connection settings; pass --config or set {}, {} and a credential",
                    env::HOST,
                    env::USERNAME
                )
            })
        }
    }
}

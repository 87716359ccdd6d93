//! russh client callbacks

use async_trait::async_trait;
use russh::client;
use russh_keys::key::PublicKey;

/// SSH client handler for harness connections
pub(crate) struct ClientHandler {
    /// Expected host key fingerprint (SHA-256, base64)
    expected_host_key: Option<String>,
}

impl ClientHandler {
    pub(crate) fn new(expected_host_key: Option<String>) -> Self {
        Self {
            expected_host_key: expected_host_key.map(|k| normalize_fingerprint(&k)),
        }
    }
}

/// Accept `SHA256:abc...` as well as the bare base64 digest
fn normalize_fingerprint(raw: &str) -> String {
    raw.trim()
        .strip_prefix("SHA256:")
        .unwrap_or(raw.trim())
        .trim_end_matches('=')
        .to_string()
}

fn host_key_matches(expected: Option<&str>, actual: &str) -> bool {
    match expected {
        Some(expected) => expected == normalize_fingerprint(actual),
        None => true,
    }
}

#[async_trait]
impl client::Handler for ClientHandler {
    type Error = russh::Error;

    /// Verify the server's host key against the pinned fingerprint, if any
    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        let fingerprint = server_public_key.fingerprint();
        tracing::debug!("Server host key: SHA256:{}", fingerprint);

        let accepted = host_key_matches(self.expected_host_key.as_deref(), &fingerprint);
        if !accepted {
            tracing::error!(
                "Host key mismatch: expected SHA256:{}, got SHA256:{}",
                self.expected_host_key.as_deref().unwrap_or_default(),
                fingerprint
            );
        }
        Ok(accepted)
    }
}

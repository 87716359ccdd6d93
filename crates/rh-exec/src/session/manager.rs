//! Session establishment and teardown

use futures::future::BoxFuture;

use rh_core::config::ConnectionConfig;
use rh_core::traits::Transport;
use rh_core::{HarnessError, Stage};

use super::Session;
use crate::policy::PolicyGuard;

/// Opens sessions through a [`Transport`]
///
/// Keeps no registry: every session is owned by whoever called `connect`.
pub struct SessionManager<T: Transport> {
    transport: T,
    policy: PolicyGuard,
}

impl<T: Transport> SessionManager<T> {
    /// Create a session manager over a transport
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            policy: PolicyGuard::new(),
        }
    }

    /// Authenticate to `config.host` within `config.connect_timeout`.
    ///
    /// On timeout the handshake is abandoned and no session is returned.
    pub async fn connect(
        &self,
        config: &ConnectionConfig,
    ) -> Result<Session<T::Connection>, HarnessError> {
        config.validate()?;
        let endpoint = config.endpoint();

        if config.host_key_fingerprint.is_none() {
            tracing::warn!("No host key pinned for {}; accepting any server key", endpoint);
        }
        tracing::info!("Connecting to {} as {}", endpoint, config.username);

        let connection = self
            .policy
            .with_timeout(
                Stage::Connect,
                config.connect_timeout,
                self.transport.authenticate(config),
            )
            .await?
            .map_err(|fault| self.policy.escalate(fault, &endpoint, &config.username))?;

        let session = Session::established(endpoint, config.username.clone(), connection);
        tracing::info!("{} ready on {}", session.id(), session.endpoint());
        Ok(session)
    }

    /// Close a session. Idempotent.
    pub async fn close(&self, session: &mut Session<T::Connection>) {
        session.close().await;
    }

    /// Non-blocking liveness check
    pub fn is_alive(&self, session: &Session<T::Connection>) -> bool {
        session.is_alive()
    }

    /// Connect, hand the session to `f`, and close it whatever `f` returns.
    ///
    /// ```ignore
    /// let uptime = manager
    ///     .with_session(&config, |session| {
    ///         Box::pin(async move { runner.run(session, &request).await })
    ///     })
    ///     .await?;
    /// ```
    pub async fn with_session<F, R>(&self, config: &ConnectionConfig, f: F) -> Result<R, HarnessError>
    where
        F: for<'s> FnOnce(&'s mut Session<T::Connection>) -> BoxFuture<'s, Result<R, HarnessError>>,
    {
        let mut session = self.connect(config).await?;
        let outcome = f(&mut session).await;
        session.close().await;
        outcome
    }
}

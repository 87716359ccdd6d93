//! A single authenticated session

use std::time::{Duration, Instant};

use rh_core::traits::TransportConnection;
use rh_core::{HarnessError, SessionId, SessionState, Stage};

use crate::policy::PolicyGuard;

/// How long a disconnect may take before the connection is dropped unannounced
pub const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// One live connection to one host, owned by the caller that opened it
///
/// Not shareable: every operation takes `&mut self`, so a session can drive
/// at most one command at a time. Dropping a session drops its connection
/// without a disconnect message; callers should prefer an explicit
/// [`close`](Self::close).
pub struct Session<C: TransportConnection> {
    id: SessionId,
    endpoint: String,
    username: String,
    state: SessionState,
    connection: Option<C>,
    connected_at: Instant,
}

impl<C: TransportConnection> Session<C> {
    /// Wrap a freshly authenticated connection; the session starts `Ready`
    pub(crate) fn established(
        endpoint: impl Into<String>,
        username: impl Into<String>,
        connection: C,
    ) -> Self {
        let mut session = Self {
            id: SessionId::new(),
            endpoint: endpoint.into(),
            username: username.into(),
            state: SessionState::Connecting,
            connection: Some(connection),
            connected_at: Instant::now(),
        };
        session.transition(SessionState::Ready);
        session
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// `host:port` this session is connected to
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// When authentication completed
    pub fn connected_at(&self) -> Instant {
        self.connected_at
    }

    /// Non-blocking liveness check.
    ///
    /// False once the transport reported an error or close, even before the
    /// caller has called [`close`](Self::close).
    pub fn is_alive(&self) -> bool {
        self.state == SessionState::Ready && self.connection_alive()
    }

    /// Release the connection. Idempotent and safe after failure.
    ///
    /// The disconnect is given [`CLOSE_GRACE`]; past that the connection is
    /// dropped and the session still ends `Closed`.
    pub async fn close(&mut self) {
        if matches!(self.state, SessionState::Closed | SessionState::Closing) {
            return;
        }
        if self.state == SessionState::Connecting {
            self.transition(SessionState::Failed);
        }

        self.transition(SessionState::Closing);
        if let Some(mut connection) = self.connection.take() {
            let closing = PolicyGuard::new()
                .with_timeout(Stage::Close, CLOSE_GRACE, connection.close())
                .await;
            match closing {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!("Error while closing {} ({}): {}", self.id, self.endpoint, e);
                }
                Err(e) => {
                    tracing::warn!("{} ({}): {}; dropping connection", self.id, self.endpoint, e);
                }
            }
        }
        self.transition(SessionState::Closed);
        tracing::info!(
            "Closed {} to {} after {:?}",
            self.id,
            self.endpoint,
            self.connected_at.elapsed()
        );
    }

    pub(crate) fn ensure_ready(&self) -> Result<(), HarnessError> {
        if self.state == SessionState::Ready {
            Ok(())
        } else {
            Err(HarnessError::invalid_state(format!(
                "{} is {}, expected ready",
                self.id, self.state
            )))
        }
    }

    pub(crate) fn connection_mut(&mut self) -> Result<&mut C, HarnessError> {
        let id = self.id;
        self.connection
            .as_mut()
            .ok_or_else(|| HarnessError::invalid_state(format!("{} has no connection", id)))
    }

    pub(crate) fn connection_alive(&self) -> bool {
        self.connection.as_ref().is_some_and(|c| c.is_alive())
    }

    /// Record an unrecoverable transport error. The connection is kept
    /// so that `close` can still release it.
    pub(crate) fn mark_failed(&mut self) {
        if self.state == SessionState::Ready {
            self.transition(SessionState::Failed);
        }
    }

    fn transition(&mut self, next: SessionState) {
        if !self.state.can_transition_to(next) {
            tracing::warn!(
                "Ignoring illegal transition of {} from {} to {}",
                self.id,
                self.state,
                next
            );
            return;
        }
        tracing::debug!("{}: {} -> {}", self.id, self.state, next);
        self.state = next;
    }
}

impl<C: TransportConnection> Drop for Session<C> {
    fn drop(&mut self) {
        if self.connection.is_some() {
            tracing::debug!(
                "{} dropped in state {} without close",
                self.id,
                self.state
            );
        }
    }
}

impl<C: TransportConnection> std::fmt::Debug for Session<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("endpoint", &self.endpoint)
            .field("username", &self.username)
            .field("state", &self.state)
            .finish()
    }
}

//! Session token state and the per-request retry coordinator
//!
//! The daemon hands out an opaque session token by rejecting a request
//! (HTTP 409) and attaching a fresh one. The token is shared by every request
//! on a client. A request that hits an expiry stores the new token and is
//! re-sent once, byte for byte; a second expiry on the same request is a
//! renegotiation loop and fails.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::error::{RpcError, RpcResult};
use super::transport::Transport;

/// Retries allowed per request after a session expiry
pub const MAX_SESSION_RETRIES: u8 = 1;

/// Shared session token
///
/// Absent at startup, replaced on every expiry, never refreshed proactively.
#[derive(Debug, Default)]
pub struct SessionState {
    token: Mutex<Option<String>>,
}

impl SessionState {
    /// Empty session state
    pub fn new() -> Self {
        Self::default()
    }

    /// Current token, if one has been issued
    pub fn current(&self) -> Option<String> {
        self.token.lock().clone()
    }

    /// Replace the token, returning the previous one.
    ///
    /// Last writer wins; the protocol does not version tokens.
    pub fn replace(&self, token: String) -> Option<String> {
        self.token.lock().replace(token)
    }
}

/// Why an exchange failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Two consecutive expiries on the same request
    SessionRenegotiationLoop,
    /// The transport reported an error
    Transport,
    /// The transport delivered no body for a non-expired reply
    MalformedEnvelope,
}

/// Lifecycle of one logical request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    /// Not yet sent
    Unsent,
    /// Sent and awaiting a reply
    InFlight {
        /// Expiry retries already spent
        retries: u8,
    },
    /// A response body was delivered
    Complete,
    /// Terminal failure
    Failed(FailureKind),
    /// The caller gave up; nothing more is sent
    Cancelled,
}

impl RequestState {
    /// Whether the state can no longer change
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RequestState::Complete | RequestState::Failed(_) | RequestState::Cancelled
        )
    }
}

/// One logical request moving through the retry state machine
#[derive(Debug)]
pub struct Exchange {
    tag: u64,
    state: RequestState,
    attempts: u32,
}

impl Exchange {
    /// New exchange for the request carrying `tag`
    pub fn new(tag: u64) -> Self {
        Self {
            tag,
            state: RequestState::Unsent,
            attempts: 0,
        }
    }

    /// Request tag
    pub fn tag(&self) -> u64 {
        self.tag
    }

    /// Current state
    pub fn state(&self) -> RequestState {
        self.state
    }

    /// Number of times the request was handed to the transport
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Mark the exchange cancelled unless it already finished.
    pub fn cancel(&mut self) {
        if !self.state.is_terminal() {
            self.state = RequestState::Cancelled;
        }
    }
}

/// Sends requests through a transport, renegotiating the session as needed
pub struct SessionCoordinator {
    transport: Arc<dyn Transport>,
    session: Arc<SessionState>,
}

impl SessionCoordinator {
    /// Coordinator over `transport` sharing `session`
    pub fn new(transport: Arc<dyn Transport>, session: Arc<SessionState>) -> Self {
        Self { transport, session }
    }

    /// Shared session state
    pub fn session(&self) -> &Arc<SessionState> {
        &self.session
    }

    /// Drive `exchange` to completion, sending `body` unchanged on every attempt.
    ///
    /// The token is read from the shared state before each attempt, so a retry
    /// uses whatever token is freshest at that moment, including one stored by
    /// a concurrent request.
    pub async fn run(&self, exchange: &mut Exchange, body: &[u8]) -> RpcResult<Vec<u8>> {
        self.run_while(exchange, body, || true).await
    }

    /// Like [`run`](Self::run), but consults `still_wanted` before every send.
    ///
    /// Once it returns false the exchange becomes `Cancelled` and nothing more
    /// is sent. An expiry that arrives for an abandoned exchange still stores
    /// its token.
    pub async fn run_while<F>(
        &self,
        exchange: &mut Exchange,
        body: &[u8],
        still_wanted: F,
    ) -> RpcResult<Vec<u8>>
    where
        F: Fn() -> bool,
    {
        let tag = exchange.tag;
        loop {
            let retries = match exchange.state {
                RequestState::Unsent => 0,
                RequestState::InFlight { retries } => retries,
                RequestState::Cancelled => return Err(RpcError::Cancelled),
                state => {
                    debug!(tag, ?state, "exchange already finished");
                    return Err(RpcError::Cancelled);
                }
            };

            if !still_wanted() {
                exchange.cancel();
                debug!(tag, attempt = exchange.attempts + 1, "caller went away; not sending");
                return Err(RpcError::Cancelled);
            }

            let token = self.session.current();
            exchange.state = RequestState::InFlight { retries };
            exchange.attempts += 1;
            debug!(
                tag,
                attempt = exchange.attempts,
                has_token = token.is_some(),
                "sending request"
            );

            let reply = match self.transport.send(token.as_deref(), body).await {
                Ok(reply) => reply,
                Err(err) => {
                    exchange.state = RequestState::Failed(FailureKind::Transport);
                    return Err(err.into());
                }
            };

            if reply.expired {
                if let Some(fresh) = reply.new_token {
                    self.session.replace(fresh);
                    info!(tag, "session token renegotiated");
                }
                if retries >= MAX_SESSION_RETRIES {
                    exchange.state = RequestState::Failed(FailureKind::SessionRenegotiationLoop);
                    warn!(tag, attempts = exchange.attempts, "session rejected again after renegotiation");
                    return Err(RpcError::SessionRenegotiationLoop { tag });
                }
                exchange.state = RequestState::InFlight {
                    retries: retries + 1,
                };
                continue;
            }

            return match reply.body {
                Some(bytes) => {
                    exchange.state = RequestState::Complete;
                    Ok(bytes)
                }
                None => {
                    exchange.state = RequestState::Failed(FailureKind::MalformedEnvelope);
                    Err(RpcError::MalformedEnvelope("transport delivered no response body".into()))
                }
            };
        }
    }
}

//! Client facade tying the codec, coordinator, and correlator together
//!
//! Each call allocates a tag, encodes its envelope once, and runs the exchange
//! on its own Tokio task. The caller only waits on its pending handle, so
//! dropping the caller's future releases the tag without aborting a transport
//! call that may still refresh the session token. An abandoned exchange is
//! never sent again.

use std::sync::Arc;

use tracing::{debug, warn};

use super::ClientConfig;
use super::entity::{TorrentAdded, TorrentsResult};
use super::envelope::{self, Arguments, Envelope};
use super::error::{RpcError, RpcResult};
use super::projector::{Projectable, Shape, project};
use super::requests::{TorrentAction, TorrentAddRequest, TorrentGetRequest, TorrentIds, TorrentRemoveRequest};
use super::session::{Exchange, SessionCoordinator, SessionState};
use super::tags::TagCorrelator;
use super::transport::{HttpTransport, Transport};

/// Asynchronous client for the daemon's RPC endpoint
#[derive(Clone)]
pub struct RpcClient {
    coordinator: Arc<SessionCoordinator>,
    correlator: TagCorrelator,
}

impl RpcClient {
    /// Client over `transport` with a fresh session
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_session(transport, Arc::new(SessionState::new()))
    }

    /// Client over `transport` sharing an existing session
    pub fn with_session(transport: Arc<dyn Transport>, session: Arc<SessionState>) -> Self {
        Self {
            coordinator: Arc::new(SessionCoordinator::new(transport, session)),
            correlator: TagCorrelator::new(),
        }
    }

    /// HTTP client built from configuration
    pub fn from_config(config: &ClientConfig) -> RpcResult<Self> {
        let transport = HttpTransport::new(config)?;
        Ok(Self::new(Arc::new(transport)))
    }

    /// Shared session state
    pub fn session(&self) -> &Arc<SessionState> {
        self.coordinator.session()
    }

    /// Tag correlator backing this client
    pub fn correlator(&self) -> &TagCorrelator {
        &self.correlator
    }

    /// Send `method` and return the daemon's response envelope.
    ///
    /// Fails with [`RpcError::DaemonRejected`] when `result` is not `"success"`.
    pub async fn request<A: Arguments>(&self, method: &str, arguments: A) -> RpcResult<Envelope> {
        let handle = self.correlator.register_next();
        let tag = handle.tag();
        let body = envelope::encode(method, arguments, tag).to_bytes()?;
        debug!(tag, method, "dispatching request");

        let coordinator = self.coordinator.clone();
        let correlator = self.correlator.clone();
        tokio::spawn(async move {
            run_exchange(coordinator, correlator, tag, body).await;
        });

        let response = handle.wait().await?;
        if !response.is_success() {
            return Err(RpcError::DaemonRejected {
                method: method.to_string(),
                result: response.result.unwrap_or_default(),
            });
        }
        Ok(response)
    }

    /// Send `method` and project its arguments onto `shape`.
    pub async fn call<A, E>(&self, method: &str, arguments: A, shape: &Shape<E>) -> RpcResult<E>
    where
        A: Arguments,
        E: Projectable,
    {
        let response = self.request(method, arguments).await?;
        let arguments = response.arguments.unwrap_or_default();
        Ok(project(&arguments, shape)?)
    }

    /// `torrent-get`
    pub async fn torrent_get(&self, request: &TorrentGetRequest) -> RpcResult<TorrentsResult> {
        let response = self.request("torrent-get", request).await?;
        let arguments = response.arguments.unwrap_or_default();
        Ok(TorrentsResult::project(&arguments, &request.shape)?)
    }

    /// `torrent-start`, `torrent-stop`, and the other id-only actions
    pub async fn torrent_action(&self, action: TorrentAction, ids: TorrentIds) -> RpcResult<()> {
        self.request(action.method(), ids).await?;
        Ok(())
    }

    /// `torrent-remove`
    pub async fn torrent_remove(&self, request: TorrentRemoveRequest) -> RpcResult<()> {
        self.request("torrent-remove", request).await?;
        Ok(())
    }

    /// `torrent-add`
    ///
    /// A success response without `torrent-added` or `torrent-duplicate` is
    /// reported as a malformed envelope.
    pub async fn torrent_add(&self, request: TorrentAddRequest) -> RpcResult<TorrentAdded> {
        let response = self.request("torrent-add", request).await?;
        let arguments = response.arguments.unwrap_or_default();
        TorrentAdded::project(&arguments)?.ok_or_else(|| {
            RpcError::MalformedEnvelope("torrent-add response names no torrent".to_string())
        })
    }
}

async fn run_exchange(
    coordinator: Arc<SessionCoordinator>,
    correlator: TagCorrelator,
    tag: u64,
    body: Vec<u8>,
) {
    let mut exchange = Exchange::new(tag);
    let outcome = match coordinator
        .run_while(&mut exchange, &body, || correlator.is_pending(tag))
        .await
    {
        Ok(bytes) => envelope::decode(&bytes),
        Err(err) => Err(err),
    };

    let response = match outcome {
        Ok(response) => response,
        Err(err) => {
            deliver(&correlator, tag, Err(err));
            return;
        }
    };

    // The body answers this exchange's own POST, whatever tag it echoes.
    // A foreign tag never reaches that tag's waiter.
    match response.tag {
        Some(received) if received != tag => {
            warn!(tag, received, "response tag does not match request; discarding body");
            deliver(&correlator, tag, Err(RpcError::UnmatchedTag(received)));
        }
        _ => deliver(&correlator, tag, Ok(response)),
    }
}

fn deliver(correlator: &TagCorrelator, tag: u64, outcome: RpcResult<Envelope>) {
    if let Err(err) = correlator.resolve(tag, outcome) {
        debug!(tag, %err, "dropping response");
    }
}

//! Transport boundary
//!
//! A transport moves opaque envelope bytes to the daemon and reports, per
//! attempt, whether the daemon rejected the session token. It knows nothing
//! about tags, arguments, or retries.

use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;

use super::ClientConfig;
use super::error::TransportError;

/// Outcome of one transport attempt
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportReply {
    /// The daemon rejected the session token
    pub expired: bool,
    /// Replacement token carried by an expiry reply
    pub new_token: Option<String>,
    /// Response body for non-expired replies
    pub body: Option<Vec<u8>>,
}

impl TransportReply {
    /// A delivered response body
    pub fn success(body: Vec<u8>) -> Self {
        Self {
            expired: false,
            new_token: None,
            body: Some(body),
        }
    }

    /// A session-expired signal
    pub fn expired(new_token: Option<String>) -> Self {
        Self {
            expired: true,
            new_token,
            body: None,
        }
    }
}

/// Sends envelope bytes to the daemon
///
/// Object-safe so clients can hold `Arc<dyn Transport>`.
pub trait Transport: Send + Sync + 'static {
    /// Send `body`, attaching `session_token` when present.
    fn send<'a>(
        &'a self,
        session_token: Option<&'a str>,
        body: &'a [u8],
    ) -> BoxFuture<'a, Result<TransportReply, TransportError>>;
}

/// HTTP transport for the daemon's `/transmission/rpc` endpoint
///
/// HTTP 409 is the session-expired signal; the replacement token travels in
/// the session header of that response.
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
    session_header: String,
    credentials: Option<(String, Option<String>)>,
}

impl HttpTransport {
    /// Build a transport from client configuration
    pub fn new(config: &ClientConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let credentials = config
            .username
            .clone()
            .map(|username| (username, config.password.clone()));
        Ok(Self {
            client,
            url: config.url.clone(),
            session_header: config.session_header.clone(),
            credentials,
        })
    }
}

impl Transport for HttpTransport {
    fn send<'a>(
        &'a self,
        session_token: Option<&'a str>,
        body: &'a [u8],
    ) -> BoxFuture<'a, Result<TransportReply, TransportError>> {
        Box::pin(async move {
            let mut request = self
                .client
                .post(&self.url)
                .header(CONTENT_TYPE, "application/json")
                .body(body.to_vec());
            if let Some(token) = session_token {
                request = request.header(self.session_header.as_str(), token);
            }
            if let Some((username, password)) = &self.credentials {
                request = request.basic_auth(username, password.as_ref());
            }

            let response = request.send().await?;
            let status = response.status();

            if status == StatusCode::CONFLICT {
                let token = response
                    .headers()
                    .get(self.session_header.as_str())
                    .and_then(|value| value.to_str().ok())
                    .map(str::to_owned);
                return Ok(TransportReply::expired(token));
            }

            if !status.is_success() {
                return Err(TransportError::Status {
                    status: status.as_u16(),
                });
            }

            let bytes = response.bytes().await?;
            Ok(TransportReply::success(bytes.to_vec()))
        })
    }
}

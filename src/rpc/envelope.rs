//! Request/response envelope codec
//!
//! Requests are `{"method", "arguments", "tag"}`; responses are
//! `{"result", "arguments", "tag"}`. Decoding keeps `arguments` as a dynamic
//! map; turning it into typed entities is the projector's job.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::{RpcError, RpcResult};

/// Result text the daemon uses for a successful call
pub const RESULT_SUCCESS: &str = "success";

/// A request or response envelope
///
/// Unknown top-level keys are ignored when decoding.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Method name (requests only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// Argument map
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Map<String, Value>>,
    /// Correlation tag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<u64>,
    /// `"success"` or error text (responses only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
}

impl Envelope {
    /// Whether the daemon reported success
    pub fn is_success(&self) -> bool {
        self.result.as_deref() == Some(RESULT_SUCCESS)
    }

    /// Serialize to UTF-8 JSON bytes
    pub fn to_bytes(&self) -> RpcResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|err| RpcError::MalformedEnvelope(err.to_string()))
    }

    /// Argument map, or an empty map when the envelope has none
    pub fn arguments_or_empty(&self) -> Map<String, Value> {
        self.arguments.clone().unwrap_or_default()
    }
}

/// Typed arguments that lower themselves into a wire map
///
/// Implementations insert only the arguments the caller actually set; an
/// omitted optional argument must not appear as `null`.
pub trait Arguments {
    /// Lower into an argument map, or `None` to omit `arguments` entirely.
    fn into_arguments(self) -> Option<Map<String, Value>>;
}

impl Arguments for () {
    fn into_arguments(self) -> Option<Map<String, Value>> {
        None
    }
}

/// Raw maps are passed through untouched, including explicit `null`s.
impl Arguments for Map<String, Value> {
    fn into_arguments(self) -> Option<Map<String, Value>> {
        Some(self)
    }
}

/// Build a request envelope.
pub fn encode<A: Arguments>(method: &str, arguments: A, tag: u64) -> Envelope {
    Envelope {
        method: Some(method.to_string()),
        arguments: arguments.into_arguments(),
        tag: Some(tag),
        result: None,
    }
}

/// Parse envelope bytes.
///
/// Fails only when the payload is not a JSON object or a known key has the
/// wrong shape.
pub fn decode(bytes: &[u8]) -> RpcResult<Envelope> {
    serde_json::from_slice(bytes).map_err(|err| RpcError::MalformedEnvelope(err.to_string()))
}

//! Error types for the RPC client core
//!
//! Domain errors use thiserror, one enum per concern, and fold into the
//! caller-facing [`RpcError`] at the client boundary.

use thiserror::Error;

use super::fields::{EntityKind, WireKind, WireType};

/// Field registry lookup errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The logical name is not registered for the entity kind
    #[error("unknown field '{name}' for {entity}")]
    UnknownField {
        /// Entity table that was searched
        entity: EntityKind,
        /// Logical name requested by the caller
        name: String,
    },
}

/// Convenience result alias for registry operations
pub type RegistryResult<T> = std::result::Result<T, RegistryError>;

/// Errors raised while projecting a dynamic map onto a typed entity
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProjectionError {
    /// Shape referenced a field the registry does not know
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// A present wire value could not be coerced to the registered type
    #[error("field '{field}' expected {expected} but the daemon sent {actual}")]
    FieldTypeMismatch {
        /// Logical field path (`files[1].length` for nested values)
        field: String,
        /// Registered wire type
        expected: WireType,
        /// Kind of the value actually present on the wire
        actual: WireKind,
    },
}

impl ProjectionError {
    /// Mismatch that has not yet been attributed to a field.
    pub(crate) fn mismatch(expected: WireType, actual: WireKind) -> Self {
        ProjectionError::FieldTypeMismatch {
            field: String::new(),
            expected,
            actual,
        }
    }

    /// Prefix the field path with an outer segment (a field name or `[index]`).
    pub(crate) fn at(self, segment: &str) -> Self {
        match self {
            ProjectionError::FieldTypeMismatch {
                field,
                expected,
                actual,
            } => {
                let field = if field.is_empty() {
                    segment.to_string()
                } else if field.starts_with('[') {
                    format!("{segment}{field}")
                } else {
                    format!("{segment}.{field}")
                };
                ProjectionError::FieldTypeMismatch {
                    field,
                    expected,
                    actual,
                }
            }
            other => other,
        }
    }
}

/// Convenience result alias for projection operations
pub type ProjectionResult<T> = std::result::Result<T, ProjectionError>;

/// Failures reported by a [`Transport`](super::transport::Transport)
#[derive(Debug, Error)]
pub enum TransportError {
    /// HTTP client failure (connect, TLS, timeout, body read)
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The daemon answered with a status other than success or 409
    #[error("unexpected HTTP status {status}")]
    Status {
        /// Numeric HTTP status code
        status: u16,
    },

    /// Transport-specific failure without a richer cause
    #[error("{0}")]
    Other(String),
}

/// Caller-facing error for a single RPC call
#[derive(Debug, Error)]
pub enum RpcError {
    /// Wire bytes were not a valid envelope
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// Response arguments did not match the registered field types
    #[error("projection failed: {0}")]
    Projection(#[from] ProjectionError),

    /// The daemon rejected the session again after a renegotiation
    #[error("session renegotiation loop for tag {tag}: daemon rejected a fresh session token")]
    SessionRenegotiationLoop {
        /// Tag of the request that could not be delivered
        tag: u64,
    },

    /// A response carried a tag no caller is waiting for
    #[error("no pending request for tag {0}")]
    UnmatchedTag(u64),

    /// The transport failed; not retried by this layer
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The daemon answered with a result other than `success`
    #[error("daemon rejected '{method}': {result}")]
    DaemonRejected {
        /// Method that was called
        method: String,
        /// Result text returned by the daemon
        result: String,
    },

    /// The exchange ended without delivering an outcome
    #[error("request cancelled")]
    Cancelled,
}

impl From<RegistryError> for RpcError {
    fn from(err: RegistryError) -> Self {
        RpcError::Projection(err.into())
    }
}

/// Result type using RpcError
pub type RpcResult<T> = std::result::Result<T, RpcError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_paths_compose() {
        let err = ProjectionError::mismatch(WireType::Int64, WireKind::String)
            .at("length")
            .at("[1]")
            .at("files");
        match err {
            ProjectionError::FieldTypeMismatch { field, .. } => {
                assert_eq!(field, "files[1].length");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_array_element_path() {
        let err = ProjectionError::mismatch(WireType::Enum, WireKind::Float)
            .at("[0]")
            .at("priorities");
        assert_eq!(
            err.to_string(),
            "field 'priorities[0]' expected enum but the daemon sent float"
        );
    }
}

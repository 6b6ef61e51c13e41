//! transmission-rpc – A typed, session-aware client core for the Transmission daemon
//!
//! This crate implements the client side of the daemon's JSON-RPC protocol:
//! - A registry mapping logical attribute names to wire keys and types
//! - An envelope codec for `{method, arguments, tag}` requests and responses
//! - Partial-field projection that keeps absent and mistyped attributes apart
//! - Transparent session-token renegotiation with a single retry
//! - Tag correlation for concurrent requests on one client

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

/// RPC client core
pub mod rpc;

// Re-export key types for convenience
pub use rpc::{ClientConfig, RpcClient, RpcError, RpcResult};

/// Current version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

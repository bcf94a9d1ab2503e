//! Identifiers for connection and request tracing.

use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Counter for connection identifiers.
static CONNECTION_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Identifier for one accepted client connection.
///
/// Counter-based, unique within a single process. Format: `conn-{counter}`
/// with the counter zero-padded to 12 hex digits.
#[derive(Clone, Debug)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Allocate the next connection identifier.
    pub fn next() -> Self {
        let count = CONNECTION_COUNTER.fetch_add(1, Ordering::Relaxed);
        Self(format!("conn-{:012x}", count))
    }

    /// Get the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ConnectionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Identifier for one proxied request, carried to the backend in the
/// `x-request-id` header. UUID-based, globally unique.
#[derive(Clone, Debug)]
pub struct RequestId(String);

impl RequestId {
    /// Create a new random request ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the request ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for RequestId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

//! A single upstream backend and its liveness flag.

use crate::pool::PoolError;
use hyper::Uri;
use parking_lot::RwLock;

/// One upstream server.
///
/// The base URL is the backend's identity and never changes after
/// construction. The liveness flag is the only mutable state and is guarded
/// by a lock private to this backend, so updating one backend never blocks
/// reads on another.
#[derive(Debug)]
pub struct Backend {
    /// Base URL (scheme + host + port) used to identify this backend.
    url: Uri,
    /// Pre-rendered `host:port` used to open connections.
    addr: String,
    /// Believed reachability. Starts `true`, set `false` on observed
    /// transport failure, never set back within a process lifetime.
    alive: RwLock<bool>,
}

impl Backend {
    /// Create a backend from its base URL.
    ///
    /// Fails when the URL carries no host. The port defaults to 80.
    pub(crate) fn new(url: Uri) -> Result<Self, PoolError> {
        let host = url
            .host()
            .ok_or_else(|| PoolError::InvalidAddress(url.to_string()))?;
        let port = url.port_u16().unwrap_or(80);
        let addr = format!("{}:{}", host, port);

        Ok(Self {
            url,
            addr,
            alive: RwLock::new(true),
        })
    }

    /// The backend's base URL.
    pub fn url(&self) -> &Uri {
        &self.url
    }

    /// The `host:port` pair to connect to.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Read the liveness flag.
    pub fn is_alive(&self) -> bool {
        *self.alive.read()
    }

    /// Set the liveness flag, returning the previous value.
    pub(crate) fn set_alive(&self, alive: bool) -> bool {
        let mut flag = self.alive.write();
        std::mem::replace(&mut *flag, alive)
    }
}

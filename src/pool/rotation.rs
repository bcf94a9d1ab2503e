//! Round-robin pool over a fixed set of backends.

use crate::pool::Backend;
use hyper::Uri;
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;

/// Errors that can occur while constructing a pool.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("backend pool requires at least one backend")]
    Empty,

    #[error("backend address '{0}' has no host")]
    InvalidAddress(String),
}

/// Fixed, ordered set of backends with a shared round-robin cursor.
///
/// The backend list is sealed at construction; only each backend's liveness
/// flag ever changes afterwards. The cursor is a single atomic counter whose
/// absolute value is meaningless; only `cursor mod size` matters, so integer
/// wraparound is harmless.
pub struct BackendPool {
    backends: Vec<Backend>,
    cursor: AtomicUsize,
}

impl BackendPool {
    /// Build a pool from an ordered list of backend base URLs.
    ///
    /// # Returns
    ///
    /// The pool, or an error when the list is empty or an address has no
    /// host. An empty list is a configuration mistake, never a runtime state.
    pub fn new(urls: Vec<Uri>) -> Result<Self, PoolError> {
        if urls.is_empty() {
            return Err(PoolError::Empty);
        }

        let backends = urls
            .into_iter()
            .map(Backend::new)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            backends,
            cursor: AtomicUsize::new(0),
        })
    }

    /// Number of backends in the pool (alive or not).
    pub fn len(&self) -> usize {
        self.backends.len()
    }

    /// Always false once constructed; provided for completeness.
    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Number of backends currently believed reachable.
    pub fn alive_count(&self) -> usize {
        self.backends.iter().filter(|b| b.is_alive()).count()
    }

    /// All backends, in configured order.
    pub fn backends(&self) -> &[Backend] {
        &self.backends
    }

    /// Select the next alive backend, round-robin.
    ///
    /// Advances the shared cursor by one and scans at most `len()` slots from
    /// there, wrapping around, for the first backend whose liveness flag
    /// reads true. When the scan lands past the starting slot, the cursor is
    /// moved up to the selected index so the next call continues from there.
    /// That store is a hint: concurrent callers may race it, which costs
    /// exact rotation order but never correctness.
    ///
    /// # Returns
    ///
    /// The selected backend, or `None` when every backend is dead.
    pub fn next_alive(&self) -> Option<&Backend> {
        let size = self.backends.len();
        let start = self.cursor.fetch_add(1, Ordering::Relaxed).wrapping_add(1) % size;

        for i in 0..size {
            let idx = (start + i) % size;
            let backend = &self.backends[idx];
            if backend.is_alive() {
                if idx != start {
                    self.cursor.store(idx, Ordering::Relaxed);
                }
                return Some(backend);
            }
        }

        None
    }

    /// Mark the backend with the given base URL dead.
    ///
    /// The backend is matched by address value, never by slot or reference
    /// identity. Silently does nothing when no backend matches, since the
    /// caller may be racing a request whose target already changed. Marking
    /// an already-dead backend again has no effect.
    pub fn mark_dead(&self, url: &Uri) {
        for backend in &self.backends {
            if backend.url() == url {
                if backend.set_alive(false) {
                    tracing::warn!(backend = %url, "backend marked dead");
                }
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri(s: &str) -> Uri {
        s.parse().unwrap()
    }

    fn pool(urls: &[&str]) -> BackendPool {
        BackendPool::new(urls.iter().map(|u| uri(u)).collect()).unwrap()
    }

    #[test]
    fn test_empty_pool_rejected() {
        let result = BackendPool::new(vec![]);
        assert!(matches!(result, Err(PoolError::Empty)));
    }

    #[test]
    fn test_two_backends_cycle() {
        let p = pool(&["http://127.0.0.1:9001", "http://127.0.0.1:9002"]);

        // Cursor starts at 0, so the first advance lands on slot 1
        let first = p.next_alive().unwrap();
        assert_eq!(first.url(), &uri("http://127.0.0.1:9002"));

        let second = p.next_alive().unwrap();
        assert_eq!(second.url(), &uri("http://127.0.0.1:9001"));

        let third = p.next_alive().unwrap();
        assert_eq!(third.url(), &uri("http://127.0.0.1:9002"));
    }

    #[test]
    fn test_every_alive_backend_selected_within_one_revolution() {
        let urls = [
            "http://127.0.0.1:9001",
            "http://127.0.0.1:9002",
            "http://127.0.0.1:9003",
        ];
        let p = pool(&urls);

        let mut seen: Vec<String> = (0..p.len())
            .map(|_| p.next_alive().unwrap().url().to_string())
            .collect();
        seen.sort();
        seen.dedup();

        // size consecutive calls with no liveness changes touch every backend
        assert_eq!(seen.len(), urls.len());
    }

    #[test]
    fn test_dead_backend_skipped() {
        let p = pool(&["http://127.0.0.1:9001", "http://127.0.0.1:9002"]);
        p.mark_dead(&uri("http://127.0.0.1:9002"));

        for _ in 0..10 {
            let selected = p.next_alive().unwrap();
            assert_eq!(selected.url(), &uri("http://127.0.0.1:9001"));
        }
    }

    #[test]
    fn test_all_dead_returns_none() {
        let p = pool(&["http://127.0.0.1:9001", "http://127.0.0.1:9002"]);
        p.mark_dead(&uri("http://127.0.0.1:9001"));
        p.mark_dead(&uri("http://127.0.0.1:9002"));

        assert!(p.next_alive().is_none());
        assert!(p.next_alive().is_none());
        assert_eq!(p.alive_count(), 0);
    }

    #[test]
    fn test_mark_dead_idempotent() {
        let p = pool(&["http://127.0.0.1:9001", "http://127.0.0.1:9002"]);
        let target = uri("http://127.0.0.1:9002");

        p.mark_dead(&target);
        p.mark_dead(&target);

        assert_eq!(p.alive_count(), 1);
        assert_eq!(p.next_alive().unwrap().url(), &uri("http://127.0.0.1:9001"));
    }

    #[test]
    fn test_mark_dead_unknown_address_is_noop() {
        let p = pool(&["http://127.0.0.1:9001"]);
        p.mark_dead(&uri("http://127.0.0.1:9999"));

        assert_eq!(p.alive_count(), 1);
        assert!(p.next_alive().is_some());
    }

    #[test]
    fn test_cursor_wraparound_is_harmless() {
        let p = pool(&["http://127.0.0.1:9001", "http://127.0.0.1:9002"]);
        p.cursor.store(usize::MAX, Ordering::Relaxed);

        // usize::MAX wraps to 0: slot 0 is selected
        let selected = p.next_alive().unwrap();
        assert_eq!(selected.url(), &uri("http://127.0.0.1:9001"));

        let selected = p.next_alive().unwrap();
        assert_eq!(selected.url(), &uri("http://127.0.0.1:9002"));
    }

    #[test]
    fn test_concurrent_selection_and_marking() {
        use std::sync::Arc;
        use std::thread;

        let urls: Vec<Uri> = (0..8)
            .map(|i| uri(&format!("http://127.0.0.1:{}", 9001 + i)))
            .collect();
        let p = Arc::new(BackendPool::new(urls.clone()).unwrap());

        let mut handles = Vec::new();

        for _ in 0..4 {
            let p = Arc::clone(&p);
            handles.push(thread::spawn(move || {
                for _ in 0..1000 {
                    if let Some(backend) = p.next_alive() {
                        // Selected backends were alive at scan time; their
                        // URL must be one of the configured addresses.
                        assert!(backend.url().port_u16().unwrap() >= 9001);
                    }
                }
            }));
        }

        for url in urls.iter().take(4).cloned() {
            let p = Arc::clone(&p);
            handles.push(thread::spawn(move || {
                p.mark_dead(&url);
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(p.alive_count(), 4);

        // The survivors keep rotating
        let mut seen: Vec<String> = (0..p.len())
            .filter_map(|_| p.next_alive().map(|b| b.url().to_string()))
            .collect();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 4);
    }
}

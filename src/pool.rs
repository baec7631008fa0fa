// src/pool.rs
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::backend::Backend;

/// The process-wide, ordered collection of Backends the Dispatcher selects
/// from. Created once at startup and never torn down.
///
/// Invariants: no two Backends share an identity key; order of appearance is
/// stable except where a retirement removes an element; the cursor is
/// monotone non-decreasing modulo Pool size and is read/written atomically.
pub struct Pool {
    backends: RwLock<Vec<Arc<Backend>>>,
    cursor: AtomicU64,
}

impl Pool {
    pub fn new() -> Self {
        Self {
            backends: RwLock::new(Vec::new()),
            cursor: AtomicU64::new(0),
        }
    }

    /// Append `backend` if its address is not already present; no-op otherwise.
    pub async fn add(&self, backend: Arc<Backend>) {
        let mut backends = self.backends.write().await;
        if backends.iter().any(|b| b.address() == backend.address()) {
            return;
        }
        backends.push(backend);
    }

    /// Linear search for a Backend with the given identity (address).
    pub async fn contains(&self, address: &str) -> bool {
        self.backends
            .read()
            .await
            .iter()
            .any(|b| b.address() == address)
    }

    /// Remove the first Backend with matching identity, preserving order of
    /// the remainder.
    pub async fn retire(&self, address: &str) {
        let mut backends = self.backends.write().await;
        if let Some(index) = backends.iter().position(|b| b.address() == address) {
            backends.remove(index);
        }
    }

    /// Find the Backend whose proxy URL string-equals `proxy_url` and set its
    /// liveness; silently no-op if absent.
    pub async fn mark_status(&self, proxy_url: &str, alive: bool) {
        let backends = self.backends.read().await;
        if let Some(backend) = backends.iter().find(|b| b.proxy_url().as_str() == proxy_url) {
            backend.set_alive(alive).await;
        }
    }

    /// Atomically increment the cursor and return `cursor mod size`.
    ///
    /// Undefined when the Pool is empty; callers must check `len()` first.
    fn next_index(&self, len: usize) -> usize {
        let previous = self.cursor.fetch_add(1, Ordering::SeqCst);
        let next = previous.wrapping_add(1);
        (next % len as u64) as usize
    }

    /// Round-robin over live Backends only. Starting from `next_index`, scans
    /// forward up to one full lap for the first live Backend. If the winner
    /// is not the starting slot, the cursor is stored to the winner's index
    /// so the next selection resumes from there. Returns `None` if the Pool
    /// is empty or no Backend is alive.
    pub async fn pick_next(&self) -> Option<Arc<Backend>> {
        let backends = self.backends.read().await;
        let len = backends.len();
        if len == 0 {
            return None;
        }

        let start = self.next_index(len);
        for offset in 0..len {
            let idx = (start + offset) % len;
            if backends[idx].is_alive().await {
                if idx != start {
                    self.cursor.store(idx as u64, Ordering::SeqCst);
                }
                return Some(backends[idx].clone());
            }
        }
        None
    }

    /// An iteration-safe view of the current Backends, for the Reconciler's
    /// diff step and the HealthProber's fan-out.
    pub async fn snapshot(&self) -> Vec<Arc<Backend>> {
        self.backends.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.backends.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for Pool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn add_is_idempotent_on_identity() {
        let pool = Pool::new();
        pool.add(Arc::new(Backend::new("10.0.0.1").unwrap())).await;
        pool.add(Arc::new(Backend::new("10.0.0.1").unwrap())).await;
        assert_eq!(pool.len().await, 1);
    }

    #[tokio::test]
    async fn retire_removes_only_matching_identity_and_preserves_order() {
        let pool = Pool::new();
        pool.add(Arc::new(Backend::new("10.0.0.1").unwrap())).await;
        pool.add(Arc::new(Backend::new("10.0.0.2").unwrap())).await;
        pool.add(Arc::new(Backend::new("10.0.0.3").unwrap())).await;

        pool.retire("10.0.0.2").await;

        let snapshot = pool.snapshot().await;
        let addresses: Vec<&str> = snapshot.iter().map(|b| b.address()).collect();
        assert_eq!(addresses, vec!["10.0.0.1", "10.0.0.3"]);
    }

    #[tokio::test]
    async fn add_then_retire_leaves_pool_unchanged() {
        let pool = Pool::new();
        pool.add(Arc::new(Backend::new("10.0.0.1").unwrap())).await;
        pool.retire("10.0.0.1").await;
        assert!(pool.is_empty().await);
    }

    #[tokio::test]
    async fn empty_pool_pick_next_returns_none() {
        let pool = Pool::new();
        assert!(pool.pick_next().await.is_none());
    }

    #[tokio::test]
    async fn all_dead_pick_next_returns_none_after_one_lap() {
        let pool = Pool::new();
        let a = Arc::new(Backend::new("10.0.0.1").unwrap());
        let b = Arc::new(Backend::new("10.0.0.2").unwrap());
        a.set_alive(false).await;
        b.set_alive(false).await;
        pool.add(a).await;
        pool.add(b).await;
        assert!(pool.pick_next().await.is_none());
    }

    #[tokio::test]
    async fn pick_next_round_robins_over_live_backends() {
        let pool = Pool::new();
        pool.add(Arc::new(Backend::new("10.0.0.1").unwrap())).await;
        pool.add(Arc::new(Backend::new("10.0.0.2").unwrap())).await;
        pool.add(Arc::new(Backend::new("10.0.0.3").unwrap())).await;

        let mut seen = Vec::new();
        for _ in 0..6 {
            let backend = pool.pick_next().await.unwrap();
            seen.push(backend.address().to_string());
        }

        // Every backend visited exactly twice across six picks.
        for addr in ["10.0.0.1", "10.0.0.2", "10.0.0.3"] {
            assert_eq!(seen.iter().filter(|a| a.as_str() == addr).count(), 2);
        }
    }

    #[tokio::test]
    async fn pick_next_skips_dead_backends() {
        let pool = Pool::new();
        pool.add(Arc::new(Backend::new("10.0.0.1").unwrap())).await;
        let dead = Arc::new(Backend::new("10.0.0.2").unwrap());
        dead.set_alive(false).await;
        pool.add(dead).await;
        pool.add(Arc::new(Backend::new("10.0.0.3").unwrap())).await;

        for _ in 0..6 {
            let backend = pool.pick_next().await.unwrap();
            assert_ne!(backend.address(), "10.0.0.2");
        }
    }

    #[tokio::test]
    async fn mark_status_is_noop_for_unknown_proxy_url() {
        let pool = Pool::new();
        pool.add(Arc::new(Backend::new("10.0.0.1").unwrap())).await;
        // Should not panic even though no backend matches.
        pool.mark_status("http://10.0.0.99:8200/", false).await;
        let backend = pool.snapshot().await.into_iter().next().unwrap();
        assert!(backend.is_alive().await);
    }

    #[tokio::test]
    async fn mark_status_flips_the_matching_backend() {
        let pool = Pool::new();
        let backend = Arc::new(Backend::new("10.0.0.1").unwrap());
        let proxy_url = backend.proxy_url().to_string();
        pool.add(backend).await;

        pool.mark_status(&proxy_url, false).await;

        let snapshot = pool.snapshot().await;
        assert!(!snapshot[0].is_alive().await);
    }
}

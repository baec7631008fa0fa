// src/health/prober.rs
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::backend::Backend;
use crate::health::status::SealStatus;
use crate::pool::Pool;

/// Probes each Backend's seal-status endpoint and updates its liveness.
///
/// A Backend is alive iff the GET completes without a transport error, the
/// response status is exactly `200 OK`, the body parses as JSON containing a
/// boolean `sealed` field, and `sealed` is `false`. Every other outcome marks
/// the Backend not-alive. The prober never removes Backends from the Pool;
/// retirement is the Reconciler's job.
pub struct HealthProber {
    client: reqwest::Client,
}

impl HealthProber {
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("failed to build health-probe HTTP client");
        Self { client }
    }

    /// Probe every Backend currently in `pool` once, concurrently, and wait
    /// for all probes to complete before returning.
    pub async fn probe_all(&self, pool: &Pool) {
        let backends = pool.snapshot().await;
        let probes = backends
            .into_iter()
            .map(|backend| self.probe_one(backend));
        futures::future::join_all(probes).await;
    }

    async fn probe_one(&self, backend: Arc<Backend>) {
        let alive = self.is_alive(&backend).await;
        backend.set_alive(alive).await;
        debug!(
            address = backend.address(),
            alive, "seal-status probe complete"
        );
    }

    async fn is_alive(&self, backend: &Backend) -> bool {
        let response = match self.client.get(backend.health_url().as_str()).send().await {
            Ok(response) => response,
            Err(err) => {
                warn!(address = backend.address(), error = %err, "health probe transport error");
                return false;
            }
        };

        if response.status() != reqwest::StatusCode::OK {
            warn!(
                address = backend.address(),
                status = %response.status(),
                "health probe returned non-200 status"
            );
            return false;
        }

        match response.json::<SealStatus>().await {
            Ok(status) if !status.sealed => true,
            Ok(_) => {
                debug!(address = backend.address(), "backend reports sealed");
                false
            }
            Err(err) => {
                warn!(address = backend.address(), error = %err, "health probe body did not parse");
                false
            }
        }
    }
}

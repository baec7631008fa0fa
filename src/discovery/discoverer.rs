// src/discovery/discoverer.rs
use std::collections::HashSet;
use std::sync::Arc;

use tracing::error;

use crate::discovery::orchestrator::{OrchestratorClient, PodPhase};
use crate::error::DiscoveryError;

/// Queries the orchestrator for pods matching a label selector and produces
/// the current set of ready replica addresses (pod IPs of `Running` pods).
pub struct Discoverer {
    client: Arc<dyn OrchestratorClient>,
}

impl Discoverer {
    pub fn new(client: Arc<dyn OrchestratorClient>) -> Self {
        Self { client }
    }

    /// Returns the set of pod IPs matching `label_selector` whose phase is
    /// `Running`. An empty selector yields the empty set without contacting
    /// the orchestrator. Orchestrator errors are returned to the caller,
    /// which treats them as fatal for the current tick only.
    pub async fn discover(&self, label_selector: &str) -> Result<HashSet<String>, DiscoveryError> {
        if label_selector.is_empty() {
            return Ok(HashSet::new());
        }

        let namespace = self.client.namespace().to_string();
        let pods = self
            .client
            .list_pods(&namespace, label_selector)
            .await
            .map_err(|err| {
                error!(error = %err, "discovery tick failed to list pods");
                err
            })?;

        Ok(pods
            .into_iter()
            .filter(|pod| pod.phase == PodPhase::Running)
            .filter_map(|pod| pod.pod_ip)
            .collect())
    }
}

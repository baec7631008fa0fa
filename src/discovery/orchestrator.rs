// src/discovery/orchestrator.rs
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod as K8sPod;
use kube::api::{Api, ListParams};
use kube::Client;

use crate::error::DiscoveryError;

/// A Kubernetes pod's phase, mirrored from `PodStatus.phase`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PodPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

impl From<Option<&str>> for PodPhase {
    fn from(phase: Option<&str>) -> Self {
        match phase {
            Some("Pending") => PodPhase::Pending,
            Some("Running") => PodPhase::Running,
            Some("Succeeded") => PodPhase::Succeeded,
            Some("Failed") => PodPhase::Failed,
            _ => PodPhase::Unknown,
        }
    }
}

/// The shape Discoverer needs out of a pod-list response: enough to decide
/// whether it contributes to the discovered address set.
#[derive(Debug, Clone)]
pub struct PodInfo {
    pub name: String,
    pub phase: PodPhase,
    pub pod_ip: Option<String>,
}

/// The orchestrator client boundary. `Discoverer` depends only on this trait,
/// never on a concrete Kubernetes client type, so it can be exercised with an
/// in-memory fake in tests.
#[async_trait]
pub trait OrchestratorClient: Send + Sync {
    /// The namespace this balancer is running in.
    fn namespace(&self) -> &str;

    /// The Kubernetes cluster version string, used only for a startup log line.
    async fn cluster_version(&self) -> Result<String, DiscoveryError>;

    /// List pods in `namespace` matching `label_selector`.
    async fn list_pods(
        &self,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<PodInfo>, DiscoveryError>;
}

/// The one concrete `OrchestratorClient`, backed by the `kube` crate's typed
/// API. This is the "external collaborator" named in the specification: it
/// has no interesting logic of its own beyond translating `k8s_openapi::Pod`
/// into `PodInfo`, so it is not unit-tested directly — `Discoverer` is
/// tested against a fake instead.
pub struct KubeOrchestratorClient {
    client: Client,
    namespace: String,
}

impl KubeOrchestratorClient {
    /// Build a client from the in-cluster (or local kubeconfig) environment,
    /// resolving the active namespace the same way the rest of the cluster's
    /// tooling does.
    pub async fn try_new() -> Result<Self, kube::Error> {
        let client = Client::try_default().await?;
        let namespace = client.default_namespace().to_string();
        Ok(Self { client, namespace })
    }
}

#[async_trait]
impl OrchestratorClient for KubeOrchestratorClient {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn cluster_version(&self) -> Result<String, DiscoveryError> {
        let version_info = self
            .client
            .apiserver_version()
            .await
            .map_err(DiscoveryError::Namespace)?;
        Ok(version_info.git_version)
    }

    async fn list_pods(
        &self,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<PodInfo>, DiscoveryError> {
        let api: Api<K8sPod> = Api::namespaced(self.client.clone(), namespace);
        let params = ListParams::default().labels(label_selector);
        let pods = api.list(&params).await.map_err(DiscoveryError::ListPods)?;

        Ok(pods
            .into_iter()
            .map(|pod| {
                let name = pod.metadata.name.unwrap_or_default();
                let status = pod.status.unwrap_or_default();
                let phase = PodPhase::from(status.phase.as_deref());
                PodInfo {
                    name,
                    phase,
                    pod_ip: status.pod_ip,
                }
            })
            .collect())
    }
}

//! Kubernetes implementation of the cluster collaborator.

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, ListParams, Patch, PatchParams};
use kube::{Client, ResourceExt};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{Cluster, DeploymentStatus, PodUsage};
use crate::{Error, Result};

/// Cluster client backed by the in-cluster (or kubeconfig) kube API.
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
    namespace: String,
}

impl KubeCluster {
    /// Connect using the default client inference (in-cluster service
    /// account first, then local kubeconfig).
    pub async fn connect(namespace: impl Into<String>) -> Result<Self> {
        let client = Client::try_default().await?;
        Ok(Self {
            client,
            namespace: namespace.into(),
        })
    }

    pub fn with_client(client: Client, namespace: impl Into<String>) -> Self {
        Self {
            client,
            namespace: namespace.into(),
        }
    }

    fn pods(&self) -> Api<Pod> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    fn deployments(&self) -> Api<Deployment> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }
}

/// Minimal projection of a `metrics.k8s.io/v1beta1` PodMetricsList.
///
/// k8s-openapi does not model the metrics API, so the list is fetched with a
/// raw request and deserialized into this shape.
#[derive(Debug, Deserialize)]
struct PodMetricsList {
    #[serde(default)]
    items: Vec<PodMetrics>,
}

#[derive(Debug, Deserialize)]
struct PodMetrics {
    metadata: PodMetricsMeta,
    #[serde(default)]
    containers: Vec<ContainerMetrics>,
}

#[derive(Debug, Deserialize)]
struct PodMetricsMeta {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ContainerMetrics {
    usage: ContainerUsage,
}

#[derive(Debug, Deserialize)]
struct ContainerUsage {
    #[serde(default)]
    cpu: String,
    #[serde(default)]
    memory: String,
}

impl PodMetrics {
    /// Collapse container usages into one per-pod CPU quantity. Worker pods
    /// run a single container; for anything else the nanocore sum is
    /// reported.
    fn cpu_quantity(&self) -> String {
        match self.containers.as_slice() {
            [only] => only.usage.cpu.clone(),
            containers => {
                let nanos: f64 = containers
                    .iter()
                    .filter_map(|c| super::parse_cpu_quantity(&c.usage.cpu))
                    .map(|cores| cores * 1e9)
                    .sum();
                format!("{}n", nanos.round() as u64)
            }
        }
    }

    fn memory_quantity(&self) -> String {
        self.containers
            .first()
            .map(|c| c.usage.memory.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Cluster for KubeCluster {
    async fn list_pods(&self, selector: &str) -> Result<Vec<String>> {
        let params = ListParams::default().labels(selector);
        let pods = self.pods().list(&params).await?;
        Ok(pods.into_iter().map(|pod| pod.name_any()).collect())
    }

    async fn pod_usage(&self, selector: &str) -> Result<Vec<PodUsage>> {
        let path = format!(
            "/apis/metrics.k8s.io/v1beta1/namespaces/{}/pods?labelSelector={}",
            self.namespace,
            urlencoding::encode(selector)
        );
        let request = http::Request::get(path)
            .body(Vec::new())
            .map_err(|e| Error::Other(format!("Failed to build metrics request: {e}")))?;

        let metrics: PodMetricsList = self.client.request(request).await?;

        Ok(metrics
            .items
            .iter()
            .map(|pod| PodUsage {
                name: pod.metadata.name.clone(),
                cpu: pod.cpu_quantity(),
                memory: pod.memory_quantity(),
            })
            .collect())
    }

    async fn patch_replicas(&self, deployment: &str, replicas: i32) -> Result<()> {
        let patch = json!({ "spec": { "replicas": replicas } });
        self.deployments()
            .patch(deployment, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;

        debug!(deployment, replicas, "Patched deployment replicas");
        Ok(())
    }

    async fn deployment_status(&self, deployment: &str) -> Result<DeploymentStatus> {
        let deployment = self.deployments().get(deployment).await?;
        let status = deployment.status.unwrap_or_default();
        Ok(DeploymentStatus {
            replicas: status.replicas.unwrap_or(0),
            ready_replicas: status.ready_replicas.unwrap_or(0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pod_metrics_list_deserializes() {
        let raw = json!({
            "kind": "PodMetricsList",
            "apiVersion": "metrics.k8s.io/v1beta1",
            "items": [{
                "metadata": { "name": "kiln-worker-abc", "namespace": "default" },
                "containers": [{
                    "name": "worker",
                    "usage": { "cpu": "301731584n", "memory": "86559744Ki" }
                }]
            }]
        });

        let parsed: PodMetricsList = serde_json::from_value(raw).unwrap();
        assert_eq!(parsed.items.len(), 1);
        assert_eq!(parsed.items[0].metadata.name, "kiln-worker-abc");
        assert_eq!(parsed.items[0].cpu_quantity(), "301731584n");
        assert_eq!(parsed.items[0].memory_quantity(), "86559744Ki");
    }

    #[test]
    fn multi_container_cpu_is_summed_in_nanocores() {
        let raw = json!({
            "items": [{
                "metadata": { "name": "pod" },
                "containers": [
                    { "name": "a", "usage": { "cpu": "250m", "memory": "1Ki" } },
                    { "name": "b", "usage": { "cpu": "250m", "memory": "1Ki" } }
                ]
            }]
        });

        let parsed: PodMetricsList = serde_json::from_value(raw).unwrap();
        assert_eq!(parsed.items[0].cpu_quantity(), "500000000n");
    }
}

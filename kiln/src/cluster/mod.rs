//! Cluster collaborator.
//!
//! A narrow seam over the cluster API: exactly the operations the scaling
//! loop and the status endpoint need. Keeping the surface this small
//! isolates the core from the kube SDK and lets the scaler run against a
//! fake in tests.

pub mod kube;

use async_trait::async_trait;

use crate::Result;

pub use kube::KubeCluster;

/// Point-in-time resource usage of one pod, as reported by the metrics API.
///
/// Quantities are kept as the API's strings (`"250m"`, `"86559744n"`);
/// parsing happens where the value is consumed.
#[derive(Debug, Clone)]
pub struct PodUsage {
    pub name: String,
    pub cpu: String,
    pub memory: String,
}

/// Replica counts of the worker deployment, for observability.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeploymentStatus {
    pub replicas: i32,
    pub ready_replicas: i32,
}

/// Read/write surface of the cluster needed by the control plane.
#[async_trait]
pub trait Cluster: Send + Sync {
    /// Names of pods matching the label selector.
    async fn list_pods(&self, selector: &str) -> Result<Vec<String>>;

    /// Number of pods matching the label selector.
    async fn count_pods(&self, selector: &str) -> Result<usize> {
        Ok(self.list_pods(selector).await?.len())
    }

    /// Per-pod CPU/memory usage for pods matching the label selector.
    async fn pod_usage(&self, selector: &str) -> Result<Vec<PodUsage>>;

    /// Patch the deployment's replica count.
    async fn patch_replicas(&self, deployment: &str, replicas: i32) -> Result<()>;

    /// Read the deployment's replica status.
    async fn deployment_status(&self, deployment: &str) -> Result<DeploymentStatus>;
}

/// Parse a Kubernetes CPU quantity into cores.
///
/// Suffixes: `n` nanocores, `u` microcores, `m` millicores; a bare number is
/// already in cores. Returns `None` for anything unparseable.
pub fn parse_cpu_quantity(quantity: &str) -> Option<f64> {
    let quantity = quantity.trim();

    if let Some(value) = quantity.strip_suffix('n') {
        return value.parse::<f64>().ok().map(|v| v / 1e9);
    }
    if let Some(value) = quantity.strip_suffix('u') {
        return value.parse::<f64>().ok().map(|v| v / 1e6);
    }
    if let Some(value) = quantity.strip_suffix('m') {
        return value.parse::<f64>().ok().map(|v| v / 1e3);
    }

    quantity.parse::<f64>().ok()
}

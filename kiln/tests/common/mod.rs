//! Shared helpers for integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use kiln::cluster::{Cluster, DeploymentStatus, PodUsage};
use kiln::domain::JobRequest;
use kiln::executor::{Executor, LanguageRegistry, Recipe};
use kiln::orchestrator::{AutoscalerConfig, Orchestrator};
use kiln::queue::MemoryQueue;

/// Cluster fake reporting a fixed pod count and no metrics.
pub struct FakeCluster {
    pub pods: usize,
}

#[async_trait]
impl Cluster for FakeCluster {
    async fn list_pods(&self, _selector: &str) -> kiln::Result<Vec<String>> {
        Ok((0..self.pods).map(|i| format!("kiln-worker-{i}")).collect())
    }

    async fn pod_usage(&self, _selector: &str) -> kiln::Result<Vec<PodUsage>> {
        Ok(Vec::new())
    }

    async fn patch_replicas(&self, _deployment: &str, _replicas: i32) -> kiln::Result<()> {
        Ok(())
    }

    async fn deployment_status(&self, _deployment: &str) -> kiln::Result<DeploymentStatus> {
        Ok(DeploymentStatus::default())
    }
}

/// Orchestrator over an in-memory queue and a fixed-size fake cluster.
pub fn orchestrator(queue: Arc<MemoryQueue>, pods: usize) -> Orchestrator {
    Orchestrator::new(
        queue,
        Arc::new(FakeCluster { pods }),
        AutoscalerConfig::default(),
    )
}

/// Registry with a single `sh` recipe under language id 1, so tests do not
/// depend on any external toolchain.
pub fn shell_registry() -> LanguageRegistry {
    let mut registry = LanguageRegistry::new();
    registry.register(1, Recipe::interpreted("sh", "sh {file}", 5000));
    registry
}

/// Executor over the shell registry, sandboxed under `root`.
pub fn shell_executor(root: &std::path::Path) -> Executor {
    Executor::new()
        .with_registry(shell_registry())
        .with_workspace_root(root)
}

/// A language-id-1 shell submission.
pub fn shell_request(source: &str, callback_url: Option<String>) -> JobRequest {
    JobRequest {
        source_code: source.to_string(),
        language_id: 1,
        problem_id: "it".to_string(),
        callback_url,
        timeout_ms: None,
        memory_limit_mb: None,
        expected_output: None,
    }
}

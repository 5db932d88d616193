//! Environment-driven configuration.
//!
//! Every setting has a default so a bare `kiln` / `kiln-worker` starts
//! against a local Redis; the deployment manifests override via env vars.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::api::ApiServerConfig;
use crate::orchestrator::AutoscalerConfig;
use crate::queue::DEFAULT_QUEUE_KEY;

/// Redis queue connection settings.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub host: String,
    pub port: u16,
    pub key: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6379,
            key: DEFAULT_QUEUE_KEY.to_string(),
        }
    }
}

impl QueueConfig {
    pub fn from_env_or_default() -> Self {
        let defaults = Self::default();
        Self {
            host: env_string("REDIS_HOST", defaults.host),
            port: env_parse("REDIS_PORT").unwrap_or(defaults.port),
            key: env_string("QUEUE_KEY", defaults.key),
        }
    }
}

/// Full process configuration, shared by both binaries.
#[derive(Debug, Clone)]
pub struct Settings {
    pub queue: QueueConfig,
    pub api: ApiServerConfig,
    /// Namespace holding the worker deployment.
    pub namespace: String,
    pub autoscaler: AutoscalerConfig,
    /// Timeout for the worker's callback POST.
    pub callback_timeout: Duration,
    /// Root directory for per-job temp workspaces; system temp when unset.
    pub workspace_root: Option<PathBuf>,
    /// Directory for rolling log files; console-only when unset.
    pub log_dir: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            queue: QueueConfig::default(),
            api: ApiServerConfig::default(),
            namespace: "default".to_string(),
            autoscaler: AutoscalerConfig::default(),
            callback_timeout: Duration::from_secs(5),
            workspace_root: None,
            log_dir: None,
        }
    }
}

impl Settings {
    /// Load settings from environment variables, falling back to defaults.
    pub fn from_env_or_default() -> Self {
        let defaults = Self::default();
        let scaler_defaults = defaults.autoscaler;

        let autoscaler = AutoscalerConfig {
            min_pods: env_parse("MIN_PODS").unwrap_or(scaler_defaults.min_pods),
            max_pods: env_parse("MAX_PODS").unwrap_or(scaler_defaults.max_pods),
            jobs_per_pod: env_parse("JOBS_PER_POD").unwrap_or(scaler_defaults.jobs_per_pod),
            check_interval: env_parse("CHECK_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(scaler_defaults.check_interval),
            cpu_high_watermark: env_parse("CPU_HIGH_WATERMARK")
                .unwrap_or(scaler_defaults.cpu_high_watermark),
            deployment: env_string("WORKER_DEPLOYMENT", scaler_defaults.deployment),
            pod_selector: env_string("WORKER_POD_SELECTOR", scaler_defaults.pod_selector),
        };

        Self {
            queue: QueueConfig::from_env_or_default(),
            api: ApiServerConfig::from_env_or_default(),
            namespace: env_string("KUBE_NAMESPACE", defaults.namespace),
            autoscaler,
            callback_timeout: env_parse("CALLBACK_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.callback_timeout),
            workspace_root: std::env::var("EXEC_WORKSPACE_ROOT").ok().map(PathBuf::from),
            log_dir: std::env::var("LOG_DIR").ok().filter(|v| !v.trim().is_empty()),
        }
    }
}

fn env_string(key: &str, default: String) -> String {
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => value,
        _ => default,
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|value| value.parse().ok())
}

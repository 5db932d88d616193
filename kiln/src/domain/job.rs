//! Job and result descriptors.
//!
//! A [`Job`] is the value that travels through the queue: a validated
//! submission plus the token assigned at submit time. An
//! [`ExecutionResult`] is the terminal descriptor produced by the executor
//! and delivered to the job's callback URL.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default address-space cap applied when a job does not set one.
pub const DEFAULT_MEMORY_LIMIT_MB: u64 = 512;

/// Exit code reported for a wall-clock kill.
pub const EXIT_CODE_TIMEOUT: i32 = 124;

/// Exit code reported for an OOM kill (128 + SIGKILL).
pub const EXIT_CODE_OOM: i32 = 137;

/// A validated submission, before a token has been assigned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRequest {
    pub source_code: String,
    pub language_id: u32,
    pub problem_id: String,
    #[serde(default)]
    pub callback_url: Option<String>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub memory_limit_mb: Option<u64>,
    #[serde(default)]
    pub expected_output: Option<String>,
}

/// A job as it lives in the queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Globally unique identifier, assigned at submission. Correlation key
    /// for the webhook callback.
    pub token: String,
    pub source_code: String,
    pub language_id: u32,
    /// Opaque submitter tag, passed through untouched.
    pub problem_id: String,
    /// Where to POST the result. When absent the result is logged and
    /// dropped.
    #[serde(default)]
    pub callback_url: Option<String>,
    /// Wall-clock budget for the execute phase, in milliseconds. Defaults to
    /// the language recipe's default.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    /// Address-space cap for the execute phase, in MiB. Defaults to
    /// [`DEFAULT_MEMORY_LIMIT_MB`].
    #[serde(default)]
    pub memory_limit_mb: Option<u64>,
    /// Passed through unused by the core.
    #[serde(default)]
    pub expected_output: Option<String>,
    /// When the job was accepted, used to report queue wait time.
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Job {
    /// Assign a fresh token to a validated submission.
    pub fn assign(request: JobRequest) -> Self {
        Self {
            token: uuid::Uuid::new_v4().to_string(),
            source_code: request.source_code,
            language_id: request.language_id,
            problem_id: request.problem_id,
            callback_url: request.callback_url,
            timeout_ms: request.timeout_ms,
            memory_limit_mb: request.memory_limit_mb,
            expected_output: request.expected_output,
            created_at: Utc::now(),
        }
    }

    /// Effective memory cap in MiB.
    pub fn memory_limit_mb(&self) -> u64 {
        self.memory_limit_mb.unwrap_or(DEFAULT_MEMORY_LIMIT_MB)
    }
}

/// Terminal status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    /// Program ran and exited 0.
    Completed,
    /// The compile phase produced stderr output.
    CompilationError,
    /// Program ran and exited non-zero (not a timeout or OOM kill).
    RuntimeError,
    /// Wall-clock kill.
    Timeout,
    /// OOM kill.
    MemoryLimitExceeded,
    /// Unsupported language or internal failure before the execute phase.
    Error,
}

impl ResultStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::CompilationError => "compilation_error",
            Self::RuntimeError => "runtime_error",
            Self::Timeout => "timeout",
            Self::MemoryLimitExceeded => "memory_limit_exceeded",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The result descriptor delivered to the callback URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub token: String,
    pub status: ResultStatus,
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    /// Wall-clock milliseconds of the phase that defined the terminal
    /// status; absent when no phase started.
    #[serde(rename = "execution_time", skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub execution_time_ms: Option<f64>,
    pub exit_code: i32,
}

impl ExecutionResult {
    pub fn new(token: impl Into<String>, status: ResultStatus) -> Self {
        Self {
            token: token.into(),
            status,
            stdout: String::new(),
            stderr: String::new(),
            execution_time_ms: None,
            exit_code: 0,
        }
    }

    /// An internal error that occurred before the execute phase.
    pub fn internal_error(token: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            status: ResultStatus::Error,
            stdout: String::new(),
            stderr: stderr.into(),
            execution_time_ms: None,
            exit_code: 1,
        }
    }

    pub fn with_stdout(mut self, stdout: impl Into<String>) -> Self {
        self.stdout = stdout.into();
        self
    }

    pub fn with_stderr(mut self, stderr: impl Into<String>) -> Self {
        self.stderr = stderr.into();
        self
    }

    pub fn with_execution_time_ms(mut self, millis: f64) -> Self {
        self.execution_time_ms = Some(round_millis(millis));
        self
    }

    pub fn with_exit_code(mut self, exit_code: i32) -> Self {
        self.exit_code = exit_code;
        self
    }
}

/// Round a millisecond measurement to two decimals.
pub fn round_millis(millis: f64) -> f64 {
    (millis * 100.0).round() / 100.0
}

//! The execution engine.
//!
//! Turns one job into one result: look up the language recipe, materialize
//! the source in a private temp workspace, optionally compile, run under
//! wall-clock and address-space bounds, classify the exit, clean up. The
//! public API is infallible — every failure mode is encoded into the
//! returned [`ExecutionResult`].

pub mod languages;

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use process_utils::CommandOutput;
use tracing::{debug, warn};

use crate::Result;
use crate::domain::{EXIT_CODE_OOM, EXIT_CODE_TIMEOUT, ExecutionResult, Job, ResultStatus};

pub use languages::{LanguageRegistry, Recipe};

/// Fixed cap for the compile phase.
const COMPILE_TIMEOUT: Duration = Duration::from_secs(30);

/// The worker-side executor.
pub struct Executor {
    registry: LanguageRegistry,
    workspace_root: PathBuf,
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}

impl Executor {
    /// Executor with the shipped language table, placing job workspaces
    /// under the system temp directory.
    pub fn new() -> Self {
        Self {
            registry: LanguageRegistry::with_defaults(),
            workspace_root: std::env::temp_dir(),
        }
    }

    pub fn with_registry(mut self, registry: LanguageRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_workspace_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.workspace_root = root.into();
        self
    }

    /// Execute one job and classify the outcome.
    ///
    /// Exactly one result is produced per call and its token always equals
    /// the job's token. No temp files are created for unknown language ids.
    pub async fn execute(&self, job: &Job) -> ExecutionResult {
        let Some(recipe) = self.registry.get(job.language_id) else {
            return ExecutionResult::internal_error(
                &job.token,
                format!("Unsupported language_id: {}", job.language_id),
            );
        };
        let recipe = recipe.clone();

        match self.execute_in_workspace(job, &recipe).await {
            Ok(result) => result,
            Err(e) => {
                warn!(token = %job.token, error = %e, "Executor internal failure");
                ExecutionResult::internal_error(
                    &job.token,
                    format!("Internal execution failure: {e}"),
                )
            }
        }
    }

    async fn execute_in_workspace(&self, job: &Job, recipe: &Recipe) -> Result<ExecutionResult> {
        let workspace = tempfile::Builder::new()
            .prefix("kiln-job-")
            .tempdir_in(&self.workspace_root)?;

        let result = self.run_phases(job, recipe, workspace.path()).await;

        // The workspace is removed on every exit path; a cleanup failure is
        // logged but never alters the result.
        if let Err(e) = workspace.close() {
            warn!(token = %job.token, error = %e, "Failed to remove job workspace");
        }

        result
    }

    async fn run_phases(&self, job: &Job, recipe: &Recipe, dir: &Path) -> Result<ExecutionResult> {
        let source_path = dir.join(format!("Main.{}", recipe.extension()));
        tokio::fs::write(&source_path, &job.source_code).await?;

        if let Some(compile_cmd) = recipe.compile_command(&source_path, dir) {
            debug!(token = %job.token, command = %compile_cmd, "Compiling");

            let started = Instant::now();
            let outcome =
                tokio::time::timeout(COMPILE_TIMEOUT, process_utils::run_shell(&compile_cmd, Some(dir)))
                    .await;
            let compile_ms = started.elapsed().as_secs_f64() * 1000.0;

            match outcome {
                Ok(output) => {
                    let output = output?;
                    // Non-empty stderr is a compile failure even when the
                    // compiler exited 0.
                    if !output.stderr.is_empty() {
                        return Ok(ExecutionResult::new(
                            &job.token,
                            ResultStatus::CompilationError,
                        )
                        .with_stderr(output.stderr)
                        .with_execution_time_ms(compile_ms)
                        .with_exit_code(1));
                    }
                }
                Err(_) => {
                    return Ok(
                        ExecutionResult::new(&job.token, ResultStatus::CompilationError)
                            .with_stderr("Compilation timed out")
                            .with_execution_time_ms(COMPILE_TIMEOUT.as_millis() as f64)
                            .with_exit_code(1),
                    );
                }
            }
        }

        let timeout_ms = job.timeout_ms.unwrap_or(recipe.default_timeout_ms());
        let run_cmd = recipe.run_command(&source_path, dir);
        let bounded = bounded_command(&run_cmd, job.memory_limit_mb(), timeout_ms);

        debug!(token = %job.token, command = %bounded, "Executing");
        let output = process_utils::run_shell(&bounded, Some(dir)).await?;

        Ok(classify(&job.token, timeout_ms, output))
    }
}

/// Compose the bounded shell invocation: address-space cap in KiB via
/// `ulimit -v`, wall-clock cap in whole (rounded-up) seconds via `timeout`.
fn bounded_command(run: &str, memory_limit_mb: u64, timeout_ms: u64) -> String {
    let limit_kib = memory_limit_mb * 1024;
    let timeout_secs = timeout_ms.div_ceil(1000).max(1);
    format!("ulimit -v {limit_kib}; timeout {timeout_secs} {run}")
}

/// Map a finished execute phase onto the result taxonomy.
fn classify(token: &str, timeout_ms: u64, output: CommandOutput) -> ExecutionResult {
    let elapsed_ms = output.duration.as_secs_f64() * 1000.0;

    match output.exit_code {
        EXIT_CODE_TIMEOUT => ExecutionResult::new(token, ResultStatus::Timeout)
            .with_stdout(output.stdout)
            .with_stderr("Execution timed out")
            .with_execution_time_ms(timeout_ms as f64)
            .with_exit_code(EXIT_CODE_TIMEOUT),
        EXIT_CODE_OOM => ExecutionResult::new(token, ResultStatus::MemoryLimitExceeded)
            .with_stdout(output.stdout)
            .with_stderr(output.stderr)
            .with_execution_time_ms(elapsed_ms)
            .with_exit_code(EXIT_CODE_OOM),
        0 => ExecutionResult::new(token, ResultStatus::Completed)
            .with_stdout(output.stdout)
            .with_stderr(output.stderr)
            .with_execution_time_ms(elapsed_ms)
            .with_exit_code(0),
        code => ExecutionResult::new(token, ResultStatus::RuntimeError)
            .with_stdout(output.stdout)
            .with_stderr(output.stderr)
            .with_execution_time_ms(elapsed_ms)
            .with_exit_code(code),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::JobRequest;

    fn shell_registry() -> LanguageRegistry {
        let mut registry = LanguageRegistry::new();
        registry.register(1, Recipe::interpreted("sh", "sh {file}", 5000));
        registry.register(
            2,
            Recipe::compiled("sh", "cp {file} {dir}/staged.sh", "sh {dir}/staged.sh", 5000),
        );
        // Compile step that warns on stderr but exits 0.
        registry.register(
            3,
            Recipe::compiled("sh", "echo warning >&2", "sh {file}", 5000),
        );
        registry
    }

    fn job(language_id: u32, source: &str) -> Job {
        Job::assign(JobRequest {
            source_code: source.to_string(),
            language_id,
            problem_id: "p".to_string(),
            callback_url: None,
            timeout_ms: None,
            memory_limit_mb: None,
            expected_output: None,
        })
    }

    fn executor(root: &Path) -> Executor {
        Executor::new()
            .with_registry(shell_registry())
            .with_workspace_root(root)
    }

    fn workspace_entries(root: &Path) -> usize {
        std::fs::read_dir(root).unwrap().count()
    }

    #[tokio::test]
    async fn completed_run_captures_stdout() {
        let root = tempfile::tempdir().unwrap();
        let job = job(1, "echo 'Hello, World!'");

        let result = executor(root.path()).execute(&job).await;

        assert_eq!(result.status, ResultStatus::Completed);
        assert_eq!(result.stdout, "Hello, World!\n");
        assert_eq!(result.stderr, "");
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.token, job.token);
        assert!(result.execution_time_ms.is_some());
    }

    #[tokio::test]
    async fn nonzero_exit_is_a_runtime_error() {
        let root = tempfile::tempdir().unwrap();
        let job = job(1, "echo boom >&2; exit 7");

        let result = executor(root.path()).execute(&job).await;

        assert_eq!(result.status, ResultStatus::RuntimeError);
        assert_eq!(result.exit_code, 7);
        assert_eq!(result.stderr, "boom\n");
    }

    #[tokio::test]
    async fn wall_clock_breach_is_a_timeout() {
        let root = tempfile::tempdir().unwrap();
        let mut job = job(1, "sleep 5");
        job.timeout_ms = Some(1000);

        let result = executor(root.path()).execute(&job).await;

        assert_eq!(result.status, ResultStatus::Timeout);
        assert_eq!(result.exit_code, 124);
        assert_eq!(result.stderr, "Execution timed out");
        assert_eq!(result.execution_time_ms, Some(1000.0));
    }

    #[tokio::test]
    async fn compile_stderr_is_a_compilation_error_even_on_exit_zero() {
        let root = tempfile::tempdir().unwrap();
        let job = job(3, "echo never-run");

        let result = executor(root.path()).execute(&job).await;

        assert_eq!(result.status, ResultStatus::CompilationError);
        assert_eq!(result.exit_code, 1);
        assert_eq!(result.stderr, "warning\n");
        assert_eq!(result.stdout, "");
    }

    #[tokio::test]
    async fn clean_compile_proceeds_to_execution() {
        let root = tempfile::tempdir().unwrap();
        let job = job(2, "echo staged-ok");

        let result = executor(root.path()).execute(&job).await;

        assert_eq!(result.status, ResultStatus::Completed);
        assert_eq!(result.stdout, "staged-ok\n");
    }

    #[tokio::test]
    async fn unknown_language_creates_no_artifacts() {
        let root = tempfile::tempdir().unwrap();
        let job = job(9999, "x");

        let result = executor(root.path()).execute(&job).await;

        assert_eq!(result.status, ResultStatus::Error);
        assert_eq!(result.exit_code, 1);
        assert!(result.stderr.contains("Unsupported language_id: 9999"));
        assert!(result.execution_time_ms.is_none());
        assert_eq!(workspace_entries(root.path()), 0);
    }

    #[tokio::test]
    async fn workspace_is_removed_on_every_path() {
        let root = tempfile::tempdir().unwrap();
        let executor = executor(root.path());

        for source in ["echo ok", "exit 1"] {
            let job = job(1, source);
            executor.execute(&job).await;
            assert_eq!(workspace_entries(root.path()), 0);
        }
    }

    #[test]
    fn bounded_command_composes_both_caps() {
        let cmd = bounded_command("python3 /w/Main.py", 128, 1500);
        assert_eq!(cmd, "ulimit -v 131072; timeout 2 python3 /w/Main.py");
    }

    #[test]
    fn bounded_command_has_a_floor_of_one_second() {
        let cmd = bounded_command("x", 512, 1);
        assert!(cmd.contains("timeout 1 "));
    }

    #[test]
    fn oom_exit_code_is_classified() {
        let output = CommandOutput {
            stdout: String::new(),
            stderr: "Killed".to_string(),
            exit_code: 137,
            duration: Duration::from_millis(300),
        };

        let result = classify("tok", 5000, output);
        assert_eq!(result.status, ResultStatus::MemoryLimitExceeded);
        assert_eq!(result.exit_code, 137);
    }
}

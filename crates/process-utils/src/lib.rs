//! Small process-related helpers shared across the workspace.
//!
//! The executor runs untrusted programs through `sh -c` so that resource
//! bounds (`ulimit`, `timeout`) can be composed into a single invocation.
//! These helpers capture the full output of such an invocation together
//! with its exit code and wall-clock duration.

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::process::Command;

/// Captured output of a finished child process.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Everything the process wrote to stdout, lossily decoded.
    pub stdout: String,
    /// Everything the process wrote to stderr, lossily decoded.
    pub stderr: String,
    /// Exit code of the process. Signal terminations on Unix are mapped to
    /// `128 + signal`, matching shell conventions.
    pub exit_code: i32,
    /// Wall-clock time from spawn to exit.
    pub duration: Duration,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Build a `sh -c <script>` command with stdin closed and both output
/// streams piped.
pub fn shell_command(script: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c")
        .arg(script)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        // Callers cap these invocations with tokio timeouts; the child must
        // not outlive a dropped future.
        .kill_on_drop(true);
    cmd
}

/// Run a command to completion, capturing stdout, stderr, exit code and
/// wall-clock duration.
pub async fn run_captured(cmd: &mut Command) -> std::io::Result<CommandOutput> {
    let start = Instant::now();
    let output = cmd.output().await?;
    let duration = start.elapsed();

    Ok(CommandOutput {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        exit_code: exit_code_of(output.status),
        duration,
    })
}

/// Run a shell script via `sh -c`, optionally in a working directory.
pub async fn run_shell(script: &str, cwd: Option<&Path>) -> std::io::Result<CommandOutput> {
    let mut cmd = shell_command(script);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    run_captured(&mut cmd).await
}

/// Map an [`std::process::ExitStatus`] to a shell-style exit code.
///
/// A process killed by signal `N` has no exit code; shells report it as
/// `128 + N` (e.g. SIGKILL -> 137), and the result classification relies on
/// that convention.
pub fn exit_code_of(status: std::process::ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    -1
}

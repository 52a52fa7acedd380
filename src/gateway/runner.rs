//! Gateway CLI process runner with a hard timeout.
//!
//! # Responsibilities
//! - Spawn the CLI in the active build directory
//! - Capture stdout/stderr in full
//! - Kill the process when the deadline passes
//!
//! # Design Decisions
//! - Each run is independent; nothing is kept between calls
//! - A timeout is reported like any other failure, never retried
//! - `kill_on_drop` covers callers that drop the future early

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

/// Exit code reported when the process never produced a status of its own
/// (spawn failure or timeout).
pub const NO_EXIT_CODE: i32 = -1;

/// Raw outcome of one CLI invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

impl CommandOutput {
    fn failed(stderr: String) -> Self {
        Self {
            code: NO_EXIT_CODE,
            stdout: String::new(),
            stderr,
            timed_out: false,
        }
    }
}

/// Spawns `<program> <args...>` with the configured working directory.
#[derive(Debug, Clone)]
pub struct CliRunner {
    program: String,
    cwd: PathBuf,
}

impl CliRunner {
    pub fn new(program: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            cwd: cwd.into(),
        }
    }

    /// Run to completion or until `timeout` expires.
    ///
    /// Arguments may carry a bearer token; they are never logged.
    pub async fn run(&self, args: &[String], timeout: Duration) -> CommandOutput {
        let mut cmd = Command::new(&self.program);
        cmd.args(args)
            .current_dir(&self.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                tracing::warn!(
                    program = %self.program,
                    cwd = %self.cwd.display(),
                    error = %e,
                    "Failed to spawn gateway CLI"
                );
                return CommandOutput::failed(format!("failed to start {}: {}", self.program, e));
            }
        };

        let stdout_task = tokio::spawn(read_to_string(child.stdout.take()));
        let stderr_task = tokio::spawn(read_to_string(child.stderr.take()));
        let stdout_abort = stdout_task.abort_handle();
        let stderr_abort = stderr_task.abort_handle();

        let outcome = tokio::time::timeout(timeout, async {
            let status = child.wait().await;
            let stdout = stdout_task.await.unwrap_or_default();
            let stderr = stderr_task.await.unwrap_or_default();
            (status, stdout, stderr)
        })
        .await;

        match outcome {
            Ok((Ok(status), stdout, stderr)) => CommandOutput {
                // Killed by a signal: no code, report a generic failure.
                code: status.code().unwrap_or(1),
                stdout,
                stderr,
                timed_out: false,
            },
            Ok((Err(e), _, _)) => {
                tracing::warn!(program = %self.program, error = %e, "Failed to wait for gateway CLI");
                CommandOutput::failed(format!("failed to wait for {}: {}", self.program, e))
            }
            Err(_) => {
                let _ = child.start_kill();
                let _ = child.wait().await;
                stdout_abort.abort();
                stderr_abort.abort();
                tracing::warn!(
                    program = %self.program,
                    timeout_ms = timeout.as_millis() as u64,
                    "Gateway CLI timed out, killed"
                );
                CommandOutput {
                    timed_out: true,
                    ..CommandOutput::failed(format!("timed out after {} ms", timeout.as_millis()))
                }
            }
        }
    }
}

async fn read_to_string<R: AsyncRead + Unpin>(reader: Option<R>) -> String {
    let mut buf = Vec::new();
    if let Some(mut reader) = reader {
        let _ = reader.read_to_end(&mut buf).await;
    }
    String::from_utf8_lossy(&buf).into_owned()
}

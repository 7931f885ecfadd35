//! External command execution.

use async_trait::async_trait;
use sessions_core::{Error, Result};
use std::process::Stdio;
use std::time::{Duration, Instant};
use telemetry::metrics;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

/// Exit status and combined output of a finished command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when killed by a signal
    pub status: Option<i32>,
    /// Standard output followed by standard error
    pub output: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

/// Runs a program with discrete arguments.
///
/// Errors mean the command could not be run at all (spawn failure or
/// timeout); a non-zero exit is a normal `CommandOutput`.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput>;
}

/// Runs commands as child processes, without a shell.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    timeout: Duration,
}

impl ProcessRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
        let start = Instant::now();

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = timeout(self.timeout, command.output())
            .await
            .map_err(|_| {
                Error::internal(format!(
                    "command '{} {}' timed out after {:?}",
                    program,
                    args.join(" "),
                    self.timeout
                ))
            })?
            .map_err(|e| Error::internal(format!("failed to execute '{}': {}", program, e)))?;

        metrics()
            .doveadm_latency_ms
            .observe(start.elapsed().as_millis() as u64);

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        debug!(
            program,
            args = ?args,
            status = ?output.status.code(),
            "Command finished"
        );

        Ok(CommandOutput {
            status: output.status.code(),
            output: combined,
        })
    }
}

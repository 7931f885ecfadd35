//! Dovecot session enumerator and kicker.

use sessions_core::{Error, ExternalRecord, KickTarget, Result};
use std::sync::Arc;
use telemetry::metrics;
use tracing::{debug, info, warn};

use crate::config::DoveadmConfig;
use crate::parser::parse_who;
use crate::runner::{CommandOutput, CommandRunner, ProcessRunner};

/// Client for the `doveadm` admin command.
///
/// Owns no state: every listing is read fresh from the live process table.
#[derive(Clone)]
pub struct DoveadmClient {
    config: DoveadmConfig,
    runner: Arc<dyn CommandRunner>,
}

impl DoveadmClient {
    /// Creates a client that spawns real processes.
    pub fn new(config: DoveadmConfig) -> Self {
        let runner = Arc::new(ProcessRunner::new(config.timeout()));
        Self::with_runner(config, runner)
    }

    /// Creates a client over a custom runner.
    pub fn with_runner(config: DoveadmConfig, runner: Arc<dyn CommandRunner>) -> Self {
        Self { config, runner }
    }

    pub fn config(&self) -> &DoveadmConfig {
        &self.config
    }

    async fn run(&self, args: &[&str]) -> Result<CommandOutput> {
        let (program, args) = self.config.command(args);
        self.runner.run(&program, &args).await
    }

    /// Runs `doveadm who` and returns its raw output.
    pub async fn who(&self) -> Result<String> {
        let out = self.run(&["who"]).await.map_err(|e| {
            Error::enumeration(format!("doveadm who could not run: {}", e))
        })?;

        if !out.success() {
            return Err(Error::enumeration(format!(
                "doveadm who exited with status {:?}: {}",
                out.status,
                out.output.trim()
            )));
        }

        Ok(out.output)
    }

    /// Connections belonging to `actor`, or the enumeration failure.
    pub async fn try_list_for_actor(&self, actor: &str) -> Result<Vec<ExternalRecord>> {
        let output = self.who().await?;
        let records = parse_who(&output, actor);
        debug!(actor, count = records.len(), "Parsed Dovecot sessions");
        Ok(records)
    }

    /// Connections belonging to `actor`; failures degrade to an empty list.
    pub async fn list_for_actor(&self, actor: &str) -> Vec<ExternalRecord> {
        match self.try_list_for_actor(actor).await {
            Ok(records) => records,
            Err(e) => {
                metrics().enumeration_failures.inc();
                warn!(actor, error = %e, "Dovecot session listing failed");
                Vec::new()
            }
        }
    }

    /// Asks Dovecot to drop the connections of `target`.
    pub async fn kick(&self, target: &KickTarget) -> Result<()> {
        let kick_error = |status: Option<i32>, output: String| Error::Kick {
            username: target.username().to_string(),
            ip: target.ip().to_string(),
            status,
            output,
        };

        let out = self
            .run(&["kick", target.username(), target.ip()])
            .await
            .map_err(|e| kick_error(None, e.to_string()))?;

        if out.success() {
            metrics().kicks_succeeded.inc();
            info!(
                username = target.username(),
                ip = target.ip(),
                "Dovecot session terminated"
            );
            Ok(())
        } else {
            metrics().kicks_failed.inc();
            warn!(
                username = target.username(),
                ip = target.ip(),
                status = ?out.status,
                output = %out.output.trim(),
                "Failed to terminate Dovecot session"
            );
            Err(kick_error(out.status, out.output.trim().to_string()))
        }
    }
}

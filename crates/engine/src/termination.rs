//! Session termination.
//!
//! Three requests are supported: drop one local session, kick one Dovecot
//! connection, or do both for everything the actor can see. Backend
//! failures land in the outcome instead of failing the request; only
//! malformed input and foreign targets are rejected outright.

use doveadm::DoveadmClient;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use sessions_core::{AuthErrorCode, Error, ExternalRecord, KickTarget, Result};
use session_store::{LocalSessionStore, ScopeMode, StoreScope};
use std::collections::HashSet;
use std::sync::Arc;
use telemetry::metrics;
use tracing::{debug, info, instrument, warn};

/// What to terminate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TerminationRequest {
    /// One local session by id.
    Local { sess_id: String },
    /// One Dovecot connection by user and source address.
    External { username: String, ip: String },
    /// Every local session in scope and every connection of the actor.
    All,
}

/// Kick results for a request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KickTally {
    pub succeeded: usize,
    pub failed: usize,
}

impl KickTally {
    pub fn attempted(&self) -> usize {
        self.succeeded + self.failed
    }
}

/// Result of a termination request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminationOutcome {
    /// Whether the caller should re-fetch the session list.
    pub refresh: bool,
    /// Local rows removed, when the local backend was reached.
    pub local_deleted: Option<u64>,
    pub kicks: KickTally,
    /// Codes of backend failures encountered along the way. Full error
    /// text goes to the log only.
    pub errors: Vec<String>,
}

/// Client-safe code for a backend failure.
fn failure_code(e: &Error) -> String {
    e.error_code().unwrap_or("INTERNAL_001").to_string()
}

/// Routes termination requests to the session backends.
pub struct TerminationDispatcher {
    store: Arc<dyn LocalSessionStore>,
    doveadm: Arc<DoveadmClient>,
    scope: ScopeMode,
}

impl TerminationDispatcher {
    pub fn new(
        store: Arc<dyn LocalSessionStore>,
        doveadm: Arc<DoveadmClient>,
        scope: ScopeMode,
    ) -> Self {
        Self {
            store,
            doveadm,
            scope,
        }
    }

    /// Execute `request` on behalf of `actor`.
    ///
    /// Returns `Err` only for invalid kick targets and for targets that do
    /// not belong to the actor.
    #[instrument(skip(self))]
    pub async fn dispatch(&self, actor: &str, request: TerminationRequest) -> Result<TerminationOutcome> {
        match request {
            TerminationRequest::Local { sess_id } => self.terminate_local(actor, &sess_id).await,
            TerminationRequest::External { username, ip } => {
                self.terminate_external(actor, &username, &ip).await
            }
            TerminationRequest::All => Ok(self.terminate_all(actor).await),
        }
    }

    async fn terminate_local(&self, actor: &str, sess_id: &str) -> Result<TerminationOutcome> {
        let mut outcome = TerminationOutcome::default();

        if self.scope == ScopeMode::Actor {
            match self.store.get_row(sess_id).await {
                Ok(Some(row)) if !StoreScope::for_actor(self.scope, actor).contains(&row) => {
                    return Err(Error::auth(
                        AuthErrorCode::ForeignSession,
                        "session belongs to another user",
                    ));
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(sess_id, error = %e, "Local session lookup failed");
                    outcome.errors.push(failure_code(&e));
                    return Ok(outcome);
                }
            }
        }

        match self.store.delete_one(sess_id).await {
            Ok(deleted) => {
                metrics().local_sessions_deleted.inc_by(deleted);
                info!(sess_id, deleted, "Local session terminated");
                outcome.local_deleted = Some(deleted);
                outcome.refresh = true;
            }
            Err(e) => {
                warn!(sess_id, error = %e, "Failed to delete local session");
                outcome.errors.push(failure_code(&e));
            }
        }

        Ok(outcome)
    }

    async fn terminate_external(
        &self,
        actor: &str,
        username: &str,
        ip: &str,
    ) -> Result<TerminationOutcome> {
        let target = KickTarget::new(username, ip)?;
        if target.username() != actor {
            return Err(Error::auth(
                AuthErrorCode::ForeignSession,
                "connection belongs to another user",
            ));
        }

        let mut outcome = TerminationOutcome::default();
        match self.doveadm.kick(&target).await {
            Ok(()) => {
                outcome.kicks.succeeded = 1;
                outcome.refresh = true;
            }
            Err(e) => {
                debug!(error = %e, "Single kick failed");
                outcome.kicks.failed = 1;
                outcome.errors.push(failure_code(&e));
            }
        }
        Ok(outcome)
    }

    async fn terminate_all(&self, actor: &str) -> TerminationOutcome {
        let mut outcome = TerminationOutcome::default();
        let scope = StoreScope::for_actor(self.scope, actor);

        let (local, external) = tokio::join!(
            self.store.delete_all_with_payload(&scope),
            self.doveadm.try_list_for_actor(actor),
        );

        let local_ok = match local {
            Ok(deleted) => {
                metrics().local_sessions_deleted.inc_by(deleted);
                outcome.local_deleted = Some(deleted);
                true
            }
            Err(e) => {
                warn!(error = %e, "Bulk local session delete failed");
                outcome.errors.push(failure_code(&e));
                false
            }
        };

        let external_ok = match external {
            Ok(records) => {
                outcome.kicks = self.kick_all(records, &mut outcome.errors).await;
                true
            }
            Err(e) => {
                metrics().enumeration_failures.inc();
                warn!(actor, error = %e, "Dovecot enumeration failed during terminate-all");
                outcome.errors.push(failure_code(&e));
                false
            }
        };

        outcome.refresh = local_ok || external_ok;
        info!(
            actor,
            local_deleted = ?outcome.local_deleted,
            kicked = outcome.kicks.succeeded,
            kick_failures = outcome.kicks.failed,
            "Terminated all sessions"
        );
        outcome
    }

    /// Kick every record, continuing past individual failures.
    async fn kick_all(&self, records: Vec<ExternalRecord>, errors: &mut Vec<String>) -> KickTally {
        let mut seen = HashSet::new();
        let targets: Vec<_> = records
            .into_iter()
            .filter(|r| seen.insert((r.username.clone(), r.ip.clone())))
            .collect();

        let results: Vec<Result<()>> = stream::iter(targets)
            .map(|record| async move {
                let target = KickTarget::new(&record.username, &record.ip)?;
                self.doveadm.kick(&target).await
            })
            .buffer_unordered(self.doveadm.config().kick_concurrency())
            .collect()
            .await;

        let mut tally = KickTally::default();
        for result in results {
            match result {
                Ok(()) => tally.succeeded += 1,
                Err(e) => {
                    debug!(error = %e, "Bulk kick failed");
                    tally.failed += 1;
                    errors.push(failure_code(&e));
                }
            }
        }
        tally
    }
}

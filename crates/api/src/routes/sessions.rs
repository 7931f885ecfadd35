//! Session listing, termination, and capture handlers.

use axum::{extract::State, Json};
use serde::Deserialize;
use session_engine::TerminationRequest;
use sessions_core::{Error, SessionRecord};
use tracing::{debug, warn};

use crate::extractors::{Actor, SessionId, UserAgent};
use crate::response::{ApiError, CaptureResponse, TerminationResponse};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct TerminateLocalBody {
    pub sess_id: String,
}

#[derive(Debug, Deserialize)]
pub struct TerminateExternalBody {
    pub username: String,
    pub ip: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct CaptureBody {
    #[serde(default)]
    pub client_ua: Option<String>,
}

/// GET /sessions - Unified local and Dovecot session list.
pub async fn list_handler(
    State(state): State<AppState>,
    Actor(actor): Actor,
) -> Json<Vec<SessionRecord>> {
    Json(state.aggregator.list_sessions(&actor).await)
}

/// POST /sessions/terminate - Drop one local session.
pub async fn terminate_handler(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Json(body): Json<TerminateLocalBody>,
) -> Result<Json<TerminationResponse>, ApiError> {
    if body.sess_id.trim().is_empty() {
        return Err(ApiError::bad_request("sess_id is required"));
    }

    let outcome = state
        .dispatcher
        .dispatch(&actor, TerminationRequest::Local { sess_id: body.sess_id })
        .await?;
    Ok(Json(outcome.into()))
}

/// POST /sessions/terminate-external - Kick one Dovecot connection.
pub async fn terminate_external_handler(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Json(body): Json<TerminateExternalBody>,
) -> Result<Json<TerminationResponse>, ApiError> {
    let outcome = state
        .dispatcher
        .dispatch(
            &actor,
            TerminationRequest::External {
                username: body.username,
                ip: body.ip,
            },
        )
        .await?;
    Ok(Json(outcome.into()))
}

/// POST /sessions/terminate-all - Drop every session the actor can reach.
pub async fn terminate_all_handler(
    State(state): State<AppState>,
    Actor(actor): Actor,
) -> Result<Json<TerminationResponse>, ApiError> {
    let outcome = state
        .dispatcher
        .dispatch(&actor, TerminationRequest::All)
        .await?;
    Ok(Json(outcome.into()))
}

/// POST /sessions/capture - Record user agent and location once per session.
///
/// Store failures are logged and reported as `written: false`. Capturing
/// another user's session is rejected.
pub async fn capture_handler(
    State(state): State<AppState>,
    Actor(actor): Actor,
    SessionId(sess_id): SessionId,
    UserAgent(server_ua): UserAgent,
    body: Option<Json<CaptureBody>>,
) -> Result<Json<CaptureResponse>, ApiError> {
    let Some(sess_id) = sess_id else {
        return Err(ApiError::bad_request("X-Session-Id header is required"));
    };
    let client_ua = body.and_then(|Json(b)| b.client_ua);

    let written = match state
        .enrichment
        .capture_once(&actor, &sess_id, server_ua.as_deref(), client_ua.as_deref())
        .await
    {
        Ok(outcome) => {
            debug!(actor = %actor, sess_id = %sess_id, ?outcome, "Capture handled");
            outcome.written()
        }
        Err(e @ Error::Auth { .. }) => {
            warn!(actor = %actor, sess_id = %sess_id, "Capture of foreign session rejected");
            return Err(e.into());
        }
        Err(e) => {
            warn!(actor = %actor, sess_id = %sess_id, error = %e, "Session capture failed");
            false
        }
    };

    Ok(Json(CaptureResponse { written }))
}

//! Request extractors.
//!
//! Authentication happens in front of this service; the authenticated
//! username arrives in `X-Remote-User` and the host application's session
//! id in `X-Session-Id`.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use sessions_core::{AuthErrorCode, Error};

use crate::response::ApiError;

pub const ACTOR_HEADER: &str = "X-Remote-User";
pub const SESSION_ID_HEADER: &str = "X-Session-Id";

fn header_value(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// The authenticated user making the request.
#[derive(Debug, Clone)]
pub struct Actor(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        header_value(parts, ACTOR_HEADER).map(Actor).ok_or_else(|| {
            Error::auth(AuthErrorCode::MissingActor, "missing authenticated user").into()
        })
    }
}

/// The caller's local session id, if it sent one.
#[derive(Debug, Clone)]
pub struct SessionId(pub Option<String>);

#[async_trait]
impl<S> FromRequestParts<S> for SessionId
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(SessionId(header_value(parts, SESSION_ID_HEADER)))
    }
}

/// Server-observed `User-Agent` header.
#[derive(Debug, Clone)]
pub struct UserAgent(pub Option<String>);

#[async_trait]
impl<S> FromRequestParts<S> for UserAgent
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(UserAgent(header_value(parts, header::USER_AGENT.as_str())))
    }
}

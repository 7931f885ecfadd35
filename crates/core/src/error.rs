//! Unified error types for the active sessions engine.
//!
//! Error codes:
//! - AUTH_001-002: Actor and ownership errors
//! - VALID_001-003: Request validation errors
//! - STORE_001: Local session store errors
//! - DOVEADM_001-002: External session backend errors

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Authentication error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorCode {
    /// AUTH_001: No authenticated user on the request
    MissingActor,
    /// AUTH_002: Target session belongs to another user
    ForeignSession,
}

impl AuthErrorCode {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingActor => "AUTH_001",
            Self::ForeignSession => "AUTH_002",
        }
    }

    /// Get the HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::MissingActor => 401,
            Self::ForeignSession => 403,
        }
    }
}

/// Validation error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationErrorCode {
    /// VALID_001: Username outside the allowed account-name charset
    InvalidUsername,
    /// VALID_002: Not a valid IPv4/IPv6 address
    InvalidIp,
    /// VALID_003: Missing or malformed request field
    InvalidField,
}

impl ValidationErrorCode {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidUsername => "VALID_001",
            Self::InvalidIp => "VALID_002",
            Self::InvalidField => "VALID_003",
        }
    }

    /// Get the HTTP status code.
    pub fn http_status(&self) -> u16 {
        400
    }
}

/// Unified error type for the active sessions engine.
#[derive(Debug, Error)]
pub enum Error {
    /// Authentication error with code.
    #[error("[{code}] {message}")]
    Auth {
        code: &'static str,
        message: String,
        http_status: u16,
    },

    /// Validation error with code.
    #[error("[{code}] {message}")]
    ValidationWithCode {
        code: &'static str,
        message: String,
        http_status: u16,
    },

    /// Session payload could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// Geolocation lookup failed.
    #[error("lookup error: {0}")]
    Lookup(String),

    /// The session listing command failed.
    #[error("[DOVEADM_001] enumeration failed: {0}")]
    Enumeration(String),

    /// A kick command failed for one connection.
    #[error("[DOVEADM_002] kick failed for {username} from {ip} (status {status:?}): {output}")]
    Kick {
        username: String,
        ip: String,
        status: Option<i32>,
        output: String,
    },

    /// The local session store is unreachable or errored.
    #[error("[STORE_001] store error: {0}")]
    Store(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an authentication error.
    pub fn auth(code: AuthErrorCode, msg: impl Into<String>) -> Self {
        Self::Auth {
            code: code.code(),
            message: msg.into(),
            http_status: code.http_status(),
        }
    }

    /// Create a validation error with code.
    pub fn validation_code(code: ValidationErrorCode, msg: impl Into<String>) -> Self {
        Self::ValidationWithCode {
            code: code.code(),
            message: msg.into(),
            http_status: code.http_status(),
        }
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn lookup(msg: impl Into<String>) -> Self {
        Self::Lookup(msg.into())
    }

    pub fn enumeration(msg: impl Into<String>) -> Self {
        Self::Enumeration(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Get the HTTP status code for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Auth { http_status, .. } => *http_status,
            Self::ValidationWithCode { http_status, .. } => *http_status,
            Self::Decode(_) => 400,
            Self::Serialization(_) => 400,
            Self::Lookup(_) => 502,
            Self::Enumeration(_) => 502,
            Self::Kick { .. } => 502,
            Self::Store(_) => 503,
            Self::Config(_) => 500,
            Self::Internal(_) => 500,
        }
    }

    /// Get the error code if this is a coded error.
    pub fn error_code(&self) -> Option<&'static str> {
        match self {
            Self::Auth { code, .. } => Some(code),
            Self::ValidationWithCode { code, .. } => Some(code),
            Self::Enumeration(_) => Some("DOVEADM_001"),
            Self::Kick { .. } => Some("DOVEADM_002"),
            Self::Store(_) => Some("STORE_001"),
            _ => None,
        }
    }
}

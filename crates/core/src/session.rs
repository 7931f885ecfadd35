//! Session record types.
//!
//! Two backends feed the unified view: the local session table (addressed by
//! an opaque session id) and live Dovecot connections (addressed by
//! username and source IP). `SessionRecord` keeps them apart as variants.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::payload::{self, Vars};

/// Terminal placeholder for unresolved fields.
pub const UNKNOWN: &str = "Unknown";

/// Protocol reported for external sessions.
pub const EXTERNAL_TASK: &str = "imap";

/// User agent shown for external sessions (Dovecot does not expose one).
pub const EXTERNAL_USER_AGENT: &str = "Client App";

/// Default theme when the payload has no skin configuration.
pub const DEFAULT_THEME: &str = "Default";

/// Which backend owns a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Local,
    External,
}

/// Raw row from the local session table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalRow {
    pub sess_id: String,
    pub ip: String,
    pub changed: Option<DateTime<Utc>>,
    /// Encoded session variables
    pub vars: String,
    pub user_agent: String,
    pub location: String,
}

impl LocalRow {
    pub fn has_payload(&self) -> bool {
        !self.vars.is_empty()
    }

    pub fn has_user_agent(&self) -> bool {
        !self.user_agent.is_empty()
    }

    /// Username recorded in the payload, if any.
    pub fn owner(&self) -> Option<String> {
        SessionAttributes::from_vars(&payload::decode(&self.vars)).username
    }
}

/// Partial update applied to a local row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowUpdate {
    pub user_agent: Option<String>,
    pub location: Option<String>,
}

impl RowUpdate {
    pub fn location(location: impl Into<String>) -> Self {
        Self {
            user_agent: None,
            location: Some(location.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.user_agent.is_none() && self.location.is_none()
    }

    /// Applies the update to a row in place.
    pub fn apply(&self, row: &mut LocalRow) {
        if let Some(ref ua) = self.user_agent {
            row.user_agent = ua.clone();
        }
        if let Some(ref location) = self.location {
            row.location = location.clone();
        }
    }
}

/// Attributes decoded from a local session payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionAttributes {
    pub language: String,
    pub task: String,
    pub theme: String,
    pub dark_mode: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl Default for SessionAttributes {
    fn default() -> Self {
        Self {
            language: UNKNOWN.to_string(),
            task: UNKNOWN.to_string(),
            theme: DEFAULT_THEME.to_string(),
            dark_mode: false,
            username: None,
        }
    }
}

impl SessionAttributes {
    /// Extracts display attributes from decoded session variables.
    pub fn from_vars(vars: &Vars) -> Self {
        let skin = vars.get("skin_config").and_then(Value::as_object);
        let defaults = Self::default();

        Self {
            language: vars
                .get("language")
                .and_then(scalar_string)
                .unwrap_or(defaults.language),
            task: vars
                .get("task")
                .and_then(scalar_string)
                .unwrap_or(defaults.task),
            theme: skin
                .and_then(|s| s.get("jquery_ui_colors_theme"))
                .and_then(scalar_string)
                .unwrap_or(defaults.theme),
            dark_mode: skin
                .and_then(|s| s.get("dark_mode_support"))
                .map(is_truthy)
                .unwrap_or(false),
            username: vars.get("username").and_then(scalar_string),
        }
    }
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(if *b { "1" } else { "" }.to_string()),
        _ => None,
    }
}

/// PHP `!empty()` semantics.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty() && s != "0",
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// One connection reported by `doveadm who`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalRecord {
    pub username: String,
    pub ip: String,
    pub pid: String,
}

/// Local session in the unified view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalSession {
    pub sess_id: String,
    pub ip: String,
    pub location: String,
    pub last_activity: Option<DateTime<Utc>>,
    pub user_agent: String,
    pub attributes: SessionAttributes,
}

impl LocalSession {
    /// Builds the view of a stored row; the stored payload is only read.
    pub fn from_row(row: &LocalRow, location: String) -> Self {
        Self::with_vars(row, &payload::decode(&row.vars), location)
    }

    /// Builds the view from variables the caller already decoded.
    pub fn with_vars(row: &LocalRow, vars: &Vars, location: String) -> Self {
        Self {
            sess_id: row.sess_id.clone(),
            ip: row.ip.clone(),
            location,
            last_activity: row.changed,
            user_agent: row.user_agent.clone(),
            attributes: SessionAttributes::from_vars(vars),
        }
    }
}

/// External session in the unified view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalSession {
    pub username: String,
    pub ip: String,
    pub pid: String,
    pub location: String,
    pub task: String,
    pub user_agent: String,
    /// Always `None`: Dovecot does not report activity time.
    pub last_activity: Option<DateTime<Utc>>,
}

impl ExternalSession {
    pub fn from_record(record: ExternalRecord, location: String) -> Self {
        Self {
            username: record.username,
            ip: record.ip,
            pid: record.pid,
            location,
            task: EXTERNAL_TASK.to_string(),
            user_agent: EXTERNAL_USER_AGENT.to_string(),
            last_activity: None,
        }
    }
}

/// Unified session view, tagged by origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "origin", rename_all = "lowercase")]
pub enum SessionRecord {
    Local(LocalSession),
    External(ExternalSession),
}

impl SessionRecord {
    pub fn origin(&self) -> Origin {
        match self {
            Self::Local(_) => Origin::Local,
            Self::External(_) => Origin::External,
        }
    }

    pub fn ip(&self) -> &str {
        match self {
            Self::Local(s) => &s.ip,
            Self::External(s) => &s.ip,
        }
    }

    pub fn location(&self) -> &str {
        match self {
            Self::Local(s) => &s.location,
            Self::External(s) => &s.location,
        }
    }
}

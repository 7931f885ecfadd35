//! Test data.

use serde_json::{json, Value};
use sessions_core::{payload, LocalRow};

pub const FIREFOX_UA: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

pub const CHROME_UA: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0 Safari/537.36";

/// `doveadm who` output with a header, two users, and a non-IMAP line.
pub const WHO_OUTPUT: &str = "\
username                 # proto (pids)              (ips)
alice                    2 imap  (123 456)           (1.2.3.4 5.6.7.8)
bob                      1 imap  (789)               (9.9.9.9)
alice                    1 pop3  (999)               (1.2.3.4)
";

/// Session variables for a logged-in user.
pub fn user_vars(username: &str) -> Value {
    json!({
        "username": username,
        "language": "de_DE",
        "task": "mail",
        "skin_config": {
            "jquery_ui_colors_theme": "bootstrap",
            "dark_mode_support": true
        }
    })
}

/// Encoded payload as the host application stores it.
pub fn encoded_payload(vars: &Value) -> String {
    vars.as_object().map(payload::encode).unwrap_or_default()
}

/// A session row owned by `username`.
pub fn session_row(sess_id: &str, username: &str, ip: &str, user_agent: &str) -> LocalRow {
    LocalRow {
        sess_id: sess_id.to_string(),
        ip: ip.to_string(),
        changed: Some(chrono::Utc::now()),
        vars: encoded_payload(&user_vars(username)),
        user_agent: user_agent.to_string(),
        location: String::new(),
    }
}

/// A row that already carries a location.
pub fn located_row(
    sess_id: &str,
    username: &str,
    ip: &str,
    user_agent: &str,
    location: &str,
) -> LocalRow {
    LocalRow {
        location: location.to_string(),
        ..session_row(sess_id, username, ip, user_agent)
    }
}

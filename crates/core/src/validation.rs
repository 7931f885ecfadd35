//! Validation of values that end up on an external command line.
//!
//! Kick targets are passed to `doveadm` as discrete arguments, never through
//! a shell, and must still match strict grammars before a command is built.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::sync::LazyLock;
use validator::Validate;

use crate::error::{Error, Result, ValidationErrorCode};

/// Account names: letters, digits and `._@+=-`, not starting with `-` or `.`.
pub const USERNAME_PATTERN: &str = r"^[A-Za-z0-9_][A-Za-z0-9._@+=-]*$";

/// Maximum username length accepted by the mail backend.
pub const MAX_USERNAME_LEN: u64 = 255;

static USERNAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(USERNAME_PATTERN).expect("invalid username pattern"));

/// A validated (username, IP) pair safe to hand to `doveadm kick`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct KickTarget {
    #[validate(length(min = 1, max = 255))]
    username: String,
    #[validate(ip)]
    ip: String,
}

impl KickTarget {
    /// Validate a username/IP pair.
    ///
    /// The IP is normalized to its canonical textual form.
    pub fn new(username: &str, ip: &str) -> Result<Self> {
        let target = Self {
            username: username.to_string(),
            ip: ip.trim().to_string(),
        };

        if let Err(errors) = target.validate() {
            let fields = errors.field_errors();
            return Err(if fields.contains_key("username") {
                invalid_username(username)
            } else {
                invalid_ip(ip)
            });
        }

        validate_username(&target.username)?;
        let ip = validate_ip(&target.ip)?;

        Ok(Self {
            username: target.username,
            ip: ip.to_string(),
        })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn ip(&self) -> &str {
        &self.ip
    }
}

/// Check a username against the account-name grammar.
pub fn validate_username(username: &str) -> Result<()> {
    if username.is_empty()
        || username.len() as u64 > MAX_USERNAME_LEN
        || !USERNAME_REGEX.is_match(username)
    {
        return Err(invalid_username(username));
    }
    Ok(())
}

/// Parse an IPv4 or IPv6 address.
pub fn validate_ip(ip: &str) -> Result<IpAddr> {
    ip.trim().parse::<IpAddr>().map_err(|_| invalid_ip(ip))
}

fn invalid_username(username: &str) -> Error {
    Error::validation_code(
        ValidationErrorCode::InvalidUsername,
        format!("invalid username: {:?}", username),
    )
}

fn invalid_ip(ip: &str) -> Error {
    Error::validation_code(
        ValidationErrorCode::InvalidIp,
        format!("invalid IP address: {:?}", ip),
    )
}

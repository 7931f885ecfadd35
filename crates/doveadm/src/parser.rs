//! `doveadm who` output parsing.
//!
//! Each connection line looks like:
//!
//! ```text
//! alice                    2 imap          (1234 5678) (10.0.0.1 10.0.0.2)
//! ```
//!
//! The pid list and IP list pair up positionally.

use regex::Regex;
use sessions_core::{ExternalRecord, UNKNOWN};
use std::sync::LazyLock;
use telemetry::metrics;
use tracing::debug;

static WHO_LINE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\S+)\s+\d+\s+imap\s+\(([^)]+)\)\s+\(([^)]+)\)$").expect("invalid who pattern")
});

/// One parsed `doveadm who` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhoLine {
    pub username: String,
    pub pids: Vec<String>,
    pub ips: Vec<String>,
}

impl WhoLine {
    /// Parse a single line, `None` when it does not match the format.
    pub fn parse(line: &str) -> Option<Self> {
        let caps = WHO_LINE_REGEX.captures(line.trim_end())?;
        Some(Self {
            username: caps[1].to_string(),
            pids: caps[2].split(' ').map(str::to_string).collect(),
            ips: caps[3].split(' ').map(str::to_string).collect(),
        })
    }

    /// One record per IP; the pid at the same index, or `Unknown`.
    pub fn into_records(self) -> Vec<ExternalRecord> {
        let Self {
            username,
            pids,
            ips,
        } = self;

        ips.into_iter()
            .enumerate()
            .map(|(idx, ip)| ExternalRecord {
                username: username.clone(),
                ip,
                pid: pids.get(idx).cloned().unwrap_or_else(|| UNKNOWN.to_string()),
            })
            .collect()
    }
}

/// Records for `actor` from raw `doveadm who` output.
///
/// Lines that do not match the format (headers, other protocols) are
/// skipped without affecting their neighbours.
pub fn parse_who(output: &str, actor: &str) -> Vec<ExternalRecord> {
    let mut records = Vec::new();

    for line in output.lines() {
        if line.trim().is_empty() {
            continue;
        }

        match WhoLine::parse(line) {
            Some(parsed) if parsed.username == actor => records.extend(parsed.into_records()),
            Some(_) => {}
            None => {
                metrics().who_lines_skipped.inc();
                debug!(line, "Skipping unparseable doveadm who line");
            }
        }
    }

    records
}

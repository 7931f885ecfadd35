//! Dovecot admin command health checks.

use crate::client::DoveadmClient;
use tracing::{debug, error};

/// Check that `doveadm who` runs and exits cleanly.
pub async fn check_connection(client: &DoveadmClient) -> bool {
    match client.who().await {
        Ok(output) => {
            debug!(lines = output.lines().count(), "doveadm reachable");
            true
        }
        Err(e) => {
            error!("doveadm health check failed: {}", e);
            false
        }
    }
}

//! Session store health checks.

use crate::store::LocalSessionStore;
use tracing::{debug, error};

/// Check session store connection health.
pub async fn check_connection(store: &dyn LocalSessionStore) -> bool {
    match store.ping().await {
        Ok(()) => {
            debug!("Session store connection healthy");
            true
        }
        Err(e) => {
            error!("Session store health check failed: {}", e);
            false
        }
    }
}

//! Background cleanup job for expired auth state.
//!
//! Lookups already treat expired nonces and sessions as absent, but entries
//! that are never looked up again would stay in memory forever. This job
//! periodically sweeps them out.

use crate::auth::service::PurgeStats;
use crate::auth::AuthService;
use std::sync::Arc;
use std::time::Duration;

/// Run the cleanup loop.
///
/// Sweeps expired nonces, pending challenges and sessions every `interval`.
pub async fn run_cleanup_loop(auth: Arc<AuthService>, interval: Duration) {
    loop {
        tokio::time::sleep(interval).await;
        sweep(&auth);
    }
}

/// Purge expired entries once and log what was removed.
pub fn sweep(auth: &AuthService) -> PurgeStats {
    let stats = auth.purge_expired();

    if stats.total() > 0 {
        tracing::info!(
            nonces = stats.nonces,
            challenges = stats.challenges,
            sessions = stats.sessions,
            "Cleanup job completed"
        );
    }

    stats
}

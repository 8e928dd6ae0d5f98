use std::time::Duration;
use tokio::task::JoinHandle;

use crate::services::{sessions, shares};
use crate::state::AppState;

/// Starts the background sweeper: session expiry, cache GC, share lifecycle and
/// rate-window pruning, once per configured interval.
pub fn start_sweeper(state: AppState) -> JoinHandle<()> {
    let interval = Duration::from_secs(state.config.sweep_interval_secs.max(1));

    tokio::spawn(async move {
        let mut interval_timer = tokio::time::interval(interval);

        loop {
            interval_timer.tick().await;
            run_sweep(&state).await;
        }
    })
}

/// One pass of every sweep. Failures are logged; the next tick tries again.
pub async fn run_sweep(state: &AppState) {
    tracing::debug!("🧹 Running sweep");

    match sessions::expire_sweep(state).await {
        Ok(count) if count > 0 => tracing::debug!("Expired sessions removed: {}", count),
        Err(e) => tracing::error!("❌ Session sweep failed: {}", e),
        _ => {}
    }

    let evicted = state.cache.sweep(state.now()).await;
    if evicted > 0 {
        tracing::debug!("Stale cache entries evicted: {}", evicted);
    }

    if let Err(e) = shares::sweep_shares(state).await {
        tracing::error!("❌ Share sweep failed: {}", e);
    }

    let pruned = state.limiter.prune(state.now()).await;
    if pruned > 0 {
        tracing::debug!("Idle rate windows dropped: {}", pruned);
    }
}

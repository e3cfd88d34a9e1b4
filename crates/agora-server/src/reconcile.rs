use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use agora_api::AppStateInner;

/// Background task that recomputes post counters from the comment and like
/// rows, repairing any drift left by a failed request.
pub async fn run_reconcile_loop(state: Arc<AppStateInner>, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        interval.tick().await;

        let db_state = state.clone();
        match tokio::task::spawn_blocking(move || db_state.db.reconcile_counters()).await {
            Ok(Ok(count)) => {
                if count > 0 {
                    info!("Reconcile: corrected counters on {} posts", count);
                }
            }
            Ok(Err(e)) => warn!("Reconcile error: {}", e),
            Err(e) => warn!("Reconcile task failed: {}", e),
        }
    }
}

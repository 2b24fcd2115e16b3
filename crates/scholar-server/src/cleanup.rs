use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use scholar_api::AppState;

/// Background task that prunes expired verification codes and token
/// revocations. Both tables are only ever consulted for unexpired rows.
pub async fn run_cleanup_loop(state: AppState, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        interval.tick().await;

        let db_state = Arc::clone(&state);
        let outcome = tokio::task::spawn_blocking(move || {
            let now = chrono::Utc::now().timestamp();
            let codes = db_state.db.delete_expired_codes(now)?;
            let tokens = db_state.db.delete_expired_revocations(now)?;
            anyhow::Ok((codes, tokens))
        })
        .await;

        match outcome {
            Ok(Ok((codes, tokens))) => {
                if codes + tokens > 0 {
                    info!(
                        "Cleanup: pruned {} expired codes and {} expired revocations",
                        codes, tokens
                    );
                }
            }
            Ok(Err(e)) => warn!("Cleanup error: {}", e),
            Err(e) => warn!("Cleanup task join error: {}", e),
        }
    }
}

//! Retention pass
//!
//! Runs on its own loop next to the scheduler: purge dead tokens from every
//! table, then trim snapshots, candles and AI decisions to their bounds.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{error, info};

use crate::config::SettingsHandle;
use crate::ports::store::{AnalysisStore, PruneReport, RetentionPolicy, StoreError};

pub fn run_maintenance(store: &dyn AnalysisStore, policy: &RetentionPolicy) -> Result<PruneReport, StoreError> {
    let purged = store.purge_dead_tokens()?;
    let mut report = store.prune_history(policy)?;
    report.dead_tokens_purged = purged;

    info!(
        "[CLEANUP] purged {} dead tokens; pruned {} snapshots, {} candles, {} AI decisions",
        report.dead_tokens_purged, report.snapshots_pruned, report.candles_pruned, report.ai_decisions_pruned
    );
    Ok(report)
}

/// Run the retention pass every cleanup period until `is_running` clears
pub async fn run_cleanup_loop(
    store: Arc<dyn AnalysisStore>,
    settings: Arc<SettingsHandle>,
    is_running: Arc<RwLock<bool>>,
) {
    loop {
        let config = settings.current();
        tokio::time::sleep(config.scheduler.cleanup_period()).await;

        if !*is_running.read().await {
            break;
        }
        if let Err(e) = run_maintenance(store.as_ref(), &config.retention_policy()) {
            error!("[CLEANUP] Pass failed: {}", e);
        }
    }
    info!("[CLEANUP] Loop stopped");
}

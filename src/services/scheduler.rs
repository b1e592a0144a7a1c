use anyhow::Result;
use sqlx::SqlitePool;
use std::time::Duration;
use tracing::{info, warn};

use crate::crypto::CredentialCipher;
use crate::services::{account_service, sync_service};

/// Starts the auto-sync driver. Every tick it checks which accounts are due
/// (auto_sync_enabled and past their sync_interval_minutes since last_sync)
/// and runs an incremental INBOX sync for each, independently.
pub fn start(pool: SqlitePool, cipher: CredentialCipher) {
    tokio::spawn(async move {
        loop {
            // Safety tick: run every 60s; per-account cadence is throttled inside the loop
            let tick_start = std::time::Instant::now();
            if let Err(e) = tick(&pool, &cipher).await {
                warn!("scheduler tick failed: {e}");
            }
            let elapsed = tick_start.elapsed();
            let sleep_ms = 60_000u64.saturating_sub(elapsed.as_millis() as u64);
            tokio::time::sleep(Duration::from_millis(sleep_ms.max(1))).await;
        }
    });
}

async fn tick(pool: &SqlitePool, cipher: &CredentialCipher) -> Result<()> {
    let accounts = account_service::list_accounts(pool).await?;
    let now = crate::db::now_epoch();

    for acc in accounts {
        if !acc.is_active || !acc.needs_sync(now) {
            continue;
        }
        let p = pool.clone();
        let c = cipher.clone();
        tokio::spawn(async move {
            let outcome = sync_service::sync_account(
                &p,
                &acc,
                &c,
                "INBOX",
                sync_service::DEFAULT_SYNC_LIMIT,
                false,
            )
            .await;
            if outcome.success {
                info!(
                    email = %acc.email,
                    synced = outcome.synced_count,
                    "scheduled sync completed"
                );
            } else {
                warn!(
                    email = %acc.email,
                    error = outcome.error.as_deref().unwrap_or("unknown"),
                    "scheduled sync failed"
                );
            }
        });
    }
    Ok(())
}

//! Sync orchestration: decides the fetch window, imports new rows
//! idempotently and advances the account watermark.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::crypto::CredentialCipher;
use crate::db::{now_epoch, store};
use crate::imap::{conn, fetch, mapper};
use crate::models::account::Account;
use crate::services::account_service;

pub const DEFAULT_SYNC_LIMIT: usize = 50;
pub const MAX_SYNC_LIMIT: usize = 200;

#[derive(Debug, Clone, Serialize)]
pub struct SyncOutcome {
    pub success: bool,
    pub synced_count: u32,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AccountSyncResult {
    pub account: String,
    pub success: bool,
    pub synced_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DomainSyncSummary {
    pub synced_accounts: u32,
    pub total_accounts: u32,
    pub total_synced: u32,
    pub results: Vec<AccountSyncResult>,
}

/// One sync attempt for one account. Connection failures come back as a
/// structured outcome, never an Err crossing into the HTTP layer; the
/// watermark only moves after a batch actually ran.
pub async fn sync_account(
    pool: &SqlitePool,
    account: &Account,
    cipher: &CredentialCipher,
    folder: &str,
    limit: usize,
    full_sync: bool,
) -> SyncOutcome {
    let since = if full_sync {
        None
    } else {
        account
            .last_sync
            .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
    };

    match sync_inner(pool, account, cipher, folder, limit, since).await {
        Ok(synced_count) => {
            info!(
                email = %account.email,
                folder = %folder,
                synced_count,
                full_sync,
                "sync completed"
            );
            SyncOutcome {
                success: true,
                synced_count,
                error: None,
            }
        }
        Err(e) => {
            warn!(email = %account.email, folder = %folder, error = %e, "sync failed");
            SyncOutcome {
                success: false,
                synced_count: 0,
                error: Some(e.to_string()),
            }
        }
    }
}

/// Upper bound on one select+fetch+import cycle; a stalled server read must
/// not wedge the scheduler's per-account task.
const BATCH_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(120);

async fn sync_inner(
    pool: &SqlitePool,
    account: &Account,
    cipher: &CredentialCipher,
    folder: &str,
    limit: usize,
    since: Option<DateTime<Utc>>,
) -> anyhow::Result<u32> {
    let config = account.imap_config(cipher)?;
    let mut session = conn::connect(&config).await?;
    let result = tokio::time::timeout(
        BATCH_TIMEOUT,
        run_batch(pool, account, &mut session, folder, limit, since),
    )
    .await
    .unwrap_or_else(|_| Err(anyhow::anyhow!("sync batch timed out")));
    session.logout().await;
    result
}

async fn run_batch(
    pool: &SqlitePool,
    account: &Account,
    session: &mut conn::ImapSession,
    folder: &str,
    limit: usize,
    since: Option<DateTime<Utc>>,
) -> anyhow::Result<u32> {
    let exists = session.select(folder).await?;

    let mut synced_count: u32 = 0;
    if exists > 0 {
        let batch = fetch::fetch_batch(session, limit, since).await?;
        for raw in &batch {
            let mapped = mapper::map_message(account.id, folder, raw);

            if let Some(ref message_id) = mapped.message_id {
                if store::message_exists(pool, account.id, message_id).await? {
                    continue;
                }
            }
            match store::insert_message(pool, &mapped).await {
                Ok(true) => synced_count += 1,
                // unique index fired: a concurrent cycle got there first
                Ok(false) => {}
                Err(e) => {
                    warn!(
                        email = %account.email,
                        uid = raw.uid,
                        error = %e,
                        "failed to store message, skipping"
                    );
                }
            }
        }
    }

    // The batch ran (even if some messages were skipped), so the window
    // is covered up to now.
    account_service::update_last_sync(pool, account.id, now_epoch()).await?;
    Ok(synced_count)
}

/// Fan out over a domain's active accounts. Accounts fail independently;
/// one broken IMAP config never aborts the rest.
pub async fn sync_domain(
    pool: &SqlitePool,
    domain_id: i64,
    cipher: &CredentialCipher,
    folder: &str,
    limit: usize,
    full_sync: bool,
) -> anyhow::Result<DomainSyncSummary> {
    let accounts = account_service::accounts_for_domain(pool, domain_id, true).await?;

    let mut results = Vec::with_capacity(accounts.len());
    let mut synced_accounts = 0u32;
    let mut total_synced = 0u32;

    for account in &accounts {
        let outcome = sync_account(pool, account, cipher, folder, limit, full_sync).await;
        if outcome.success {
            synced_accounts += 1;
            total_synced += outcome.synced_count;
        }
        results.push(AccountSyncResult {
            account: account.email.clone(),
            success: outcome.success,
            synced_count: outcome.synced_count,
            error: outcome.error,
        });
    }

    Ok(DomainSyncSummary {
        synced_accounts,
        total_accounts: accounts.len() as u32,
        total_synced,
        results,
    })
}

pub fn clamp_limit(limit: Option<usize>) -> usize {
    match limit {
        Some(l) if (1..=MAX_SYNC_LIMIT).contains(&l) => l,
        _ => DEFAULT_SYNC_LIMIT,
    }
}

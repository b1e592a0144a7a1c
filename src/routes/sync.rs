use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::AppState;
use crate::db::store;
use crate::services::{account_service, sync_service};

#[derive(Debug, Default, Deserialize)]
pub struct SyncRequest {
    pub folder: Option<String>,
    pub limit: Option<usize>,
    pub full_sync: Option<bool>,
}

/// POST /sync/:account_id - sync one account's folder from the IMAP server.
/// Connection failures are a 200 with success:false; 404 only when the
/// account does not exist.
pub async fn sync_account(
    State(state): State<AppState>,
    Path(account_id): Path<i64>,
    body: Option<Json<SyncRequest>>,
) -> Result<Json<Value>, (StatusCode, String)> {
    let req = body.map(|Json(b)| b).unwrap_or_default();
    let folder = req.folder.unwrap_or_else(|| "INBOX".to_string());
    let limit = sync_service::clamp_limit(req.limit);
    let full_sync = req.full_sync.unwrap_or(false);

    let account = account_service::get_account(&state.pool, account_id)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .ok_or_else(|| (StatusCode::NOT_FOUND, "Account not found".to_string()))?;

    let outcome = sync_service::sync_account(
        &state.pool,
        &account,
        &state.cipher,
        &folder,
        limit,
        full_sync,
    )
    .await;

    if !outcome.success {
        return Ok(Json(json!({
            "success": false,
            "error": outcome.error,
            "synced_count": 0,
            "folder": folder,
        })));
    }

    let total_emails = store::total_count(&state.pool, account.id, Some(&folder))
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    let unread_count = store::unread_count(&state.pool, account.id, Some(&folder))
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    // re-read for the watermark the sync just advanced
    let last_sync = account_service::get_account(&state.pool, account.id)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .and_then(|a| a.last_sync_rfc3339());

    Ok(Json(json!({
        "success": true,
        "synced_count": outcome.synced_count,
        "total_emails": total_emails,
        "unread_count": unread_count,
        "last_sync": last_sync,
        "folder": folder,
    })))
}

/// POST /domains/:domain_id/sync-all - fan out over the domain's active
/// accounts; per-account failures land in `results`, not in the status code.
pub async fn sync_domain_accounts(
    State(state): State<AppState>,
    Path(domain_id): Path<i64>,
    body: Option<Json<SyncRequest>>,
) -> Result<Json<Value>, (StatusCode, String)> {
    let req = body.map(|Json(b)| b).unwrap_or_default();
    let folder = req.folder.unwrap_or_else(|| "INBOX".to_string());
    let limit = sync_service::clamp_limit(req.limit);
    let full_sync = req.full_sync.unwrap_or(false);

    let domain = account_service::get_domain(&state.pool, domain_id)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .ok_or_else(|| (StatusCode::NOT_FOUND, "Domain not found".to_string()))?;

    let summary = sync_service::sync_domain(
        &state.pool,
        domain.id,
        &state.cipher,
        &folder,
        limit,
        full_sync,
    )
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    if summary.total_accounts == 0 {
        return Ok(Json(json!({
            "success": true,
            "domain": domain.name,
            "message": "No active accounts found for this domain",
            "synced_accounts": 0,
            "total_accounts": 0,
            "total_synced": 0,
            "results": [],
        })));
    }

    Ok(Json(json!({
        "success": true,
        "domain": domain.name,
        "synced_accounts": summary.synced_accounts,
        "total_accounts": summary.total_accounts,
        "total_synced": summary.total_synced,
        "results": summary.results,
    })))
}

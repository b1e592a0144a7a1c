//! Inbox read and mutation endpoints. Mutations commit locally first, then
//! mirror to the IMAP server best-effort; a mirror failure never fails the
//! request.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use super::AppState;
use crate::db::store::{self, InboxFilter};
use crate::models::message::InboxMessage;
use crate::services::account_service;
use crate::services::reconcile_service::{self, ReconcileAction};

#[derive(Debug, Deserialize)]
pub struct InboxQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub folder: Option<String>,
    pub unread_only: Option<bool>,
    pub has_attachments: Option<bool>,
    pub search: Option<String>,
}

/// GET /inbox/:account_id - paginated listing.
pub async fn list_inbox(
    State(state): State<AppState>,
    Path(account_id): Path<i64>,
    Query(q): Query<InboxQuery>,
) -> Result<Json<Value>, (StatusCode, String)> {
    let account = account_service::get_account(&state.pool, account_id)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .ok_or_else(|| (StatusCode::NOT_FOUND, "Account not found".to_string()))?;

    let page = q.page.unwrap_or(1).max(1);
    let per_page = match q.per_page {
        Some(p) if (1..=100).contains(&p) => p,
        _ => 50,
    };
    let filter = InboxFilter {
        folder: q.folder.unwrap_or_else(|| "INBOX".to_string()),
        unread_only: q.unread_only.unwrap_or(false),
        has_attachments_only: q.has_attachments.unwrap_or(false),
        search: q.search,
    };

    let result = store::list_inbox(&state.pool, account.id, page, per_page, &filter)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(Json(json!({
        "emails": result.emails,
        "total": result.total,
        "page": result.page,
        "pages": result.pages,
        "per_page": result.per_page,
        "has_prev": result.has_prev,
        "has_next": result.has_next,
        "account": {
            "id": account.id,
            "email": account.email,
            "display_name": account.display_name,
            "last_sync": account.last_sync_rfc3339(),
        },
    })))
}

/// GET /inbox/:account_id/:email_id - full message; opening it marks it read.
pub async fn get_email(
    State(state): State<AppState>,
    Path((account_id, email_id)): Path<(i64, i64)>,
) -> Result<Json<Value>, (StatusCode, String)> {
    let mut email = store::get_message(&state.pool, account_id, email_id)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .ok_or_else(|| (StatusCode::NOT_FOUND, "Email not found".to_string()))?;

    if !email.is_read {
        store::set_read(&state.pool, account_id, email_id, true)
            .await
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
        email.is_read = true;
        mirror(&state, account_id, &email, &email.folder, ReconcileAction::MarkRead).await;
    }

    Ok(Json(json!({ "email": email })))
}

/// GET /inbox/:account_id/threads - conversations grouped by thread_id.
#[derive(Debug, Deserialize)]
pub struct ThreadsQuery {
    pub limit: Option<i64>,
}

pub async fn list_threads(
    State(state): State<AppState>,
    Path(account_id): Path<i64>,
    Query(q): Query<ThreadsQuery>,
) -> Result<Json<Value>, (StatusCode, String)> {
    let account = account_service::get_account(&state.pool, account_id)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .ok_or_else(|| (StatusCode::NOT_FOUND, "Account not found".to_string()))?;

    let limit = match q.limit {
        Some(l) if (1..=100).contains(&l) => l,
        _ => 50,
    };

    let threads = store::list_threads(&state.pool, account.id, limit)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(Json(json!({
        "total": threads.len(),
        "threads": threads,
        "account": { "id": account.id, "email": account.email },
    })))
}

/// GET /inbox/:account_id/stats - counters, excluding soft-deleted rows.
pub async fn inbox_stats(
    State(state): State<AppState>,
    Path(account_id): Path<i64>,
) -> Result<Json<Value>, (StatusCode, String)> {
    let account = account_service::get_account(&state.pool, account_id)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .ok_or_else(|| (StatusCode::NOT_FOUND, "Account not found".to_string()))?;

    let stats = store::stats(&state.pool, account.id)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(Json(json!({
        "account": {
            "id": account.id,
            "email": account.email,
            "last_sync": account.last_sync_rfc3339(),
        },
        "stats": stats,
    })))
}

#[derive(Debug, Deserialize)]
pub struct ReadBody {
    pub is_read: Option<bool>,
}

/// PUT /inbox/:account_id/:email_id/read
pub async fn mark_read(
    State(state): State<AppState>,
    Path((account_id, email_id)): Path<(i64, i64)>,
    body: Option<Json<ReadBody>>,
) -> Result<Json<Value>, (StatusCode, String)> {
    let is_read = body
        .and_then(|Json(b)| b.is_read)
        .ok_or_else(|| (StatusCode::BAD_REQUEST, "Missing 'is_read' parameter".to_string()))?;

    let email = store::get_message(&state.pool, account_id, email_id)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .ok_or_else(|| (StatusCode::NOT_FOUND, "Email not found".to_string()))?;

    store::set_read(&state.pool, account_id, email_id, is_read)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    let action = if is_read {
        ReconcileAction::MarkRead
    } else {
        ReconcileAction::MarkUnread
    };
    mirror(&state, account_id, &email, &email.folder, action).await;

    Ok(Json(json!({
        "success": true,
        "email_id": email_id,
        "is_read": is_read,
    })))
}

/// PUT /inbox/:account_id/:email_id/flag - toggle.
pub async fn toggle_flag(
    State(state): State<AppState>,
    Path((account_id, email_id)): Path<(i64, i64)>,
) -> Result<Json<Value>, (StatusCode, String)> {
    let email = store::get_message(&state.pool, account_id, email_id)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .ok_or_else(|| (StatusCode::NOT_FOUND, "Email not found".to_string()))?;

    let is_flagged = store::toggle_flag(&state.pool, account_id, email_id)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .ok_or_else(|| (StatusCode::NOT_FOUND, "Email not found".to_string()))?;

    let action = if is_flagged {
        ReconcileAction::Flag
    } else {
        ReconcileAction::Unflag
    };
    mirror(&state, account_id, &email, &email.folder, action).await;

    Ok(Json(json!({
        "success": true,
        "email_id": email_id,
        "is_flagged": is_flagged,
    })))
}

#[derive(Debug, Deserialize)]
pub struct MoveBody {
    pub folder: Option<String>,
}

/// PUT /inbox/:account_id/:email_id/move
pub async fn move_email(
    State(state): State<AppState>,
    Path((account_id, email_id)): Path<(i64, i64)>,
    body: Option<Json<MoveBody>>,
) -> Result<Json<Value>, (StatusCode, String)> {
    let target_folder = body
        .and_then(|Json(b)| b.folder)
        .filter(|f| !f.is_empty())
        .ok_or_else(|| (StatusCode::BAD_REQUEST, "Missing 'folder' parameter".to_string()))?;

    let email = store::get_message(&state.pool, account_id, email_id)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .ok_or_else(|| (StatusCode::NOT_FOUND, "Email not found".to_string()))?;
    let old_folder = email.folder.clone();

    store::move_folder(&state.pool, account_id, email_id, &target_folder)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    // the message still lives in the old folder on the server
    mirror(
        &state,
        account_id,
        &email,
        &old_folder,
        ReconcileAction::Move(target_folder.clone()),
    )
    .await;

    Ok(Json(json!({
        "success": true,
        "email_id": email_id,
        "folder": target_folder,
        "old_folder": old_folder,
    })))
}

#[derive(Debug, Deserialize)]
pub struct DeleteQuery {
    pub permanent: Option<bool>,
}

/// DELETE /inbox/:account_id/:email_id - soft delete unless ?permanent=true.
pub async fn delete_email(
    State(state): State<AppState>,
    Path((account_id, email_id)): Path<(i64, i64)>,
    Query(q): Query<DeleteQuery>,
) -> Result<Json<Value>, (StatusCode, String)> {
    let permanent = q.permanent.unwrap_or(false);

    let email = store::get_message(&state.pool, account_id, email_id)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .ok_or_else(|| (StatusCode::NOT_FOUND, "Email not found".to_string()))?;

    if permanent {
        store::delete_permanent(&state.pool, account_id, email_id)
            .await
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
        mirror(
            &state,
            account_id,
            &email,
            &email.folder,
            ReconcileAction::Delete { permanent: true },
        )
        .await;
    } else {
        store::soft_delete(&state.pool, account_id, email_id)
            .await
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    }

    Ok(Json(json!({
        "success": true,
        "message": "Email deleted successfully",
        "permanent": permanent,
    })))
}

/// Best-effort server mirroring after a committed local mutation.
async fn mirror(
    state: &AppState,
    account_id: i64,
    email: &InboxMessage,
    folder: &str,
    action: ReconcileAction,
) {
    let account = match account_service::get_account(&state.pool, account_id).await {
        Ok(Some(a)) => a,
        Ok(None) => return,
        Err(e) => {
            warn!(account_id, error = %e, "could not load account for reconciliation");
            return;
        }
    };
    let uid = match email.uid {
        Some(uid) => uid,
        None => {
            tracing::debug!(email_id = email.id, "no server uid, skipping reconciliation");
            return;
        }
    };
    if let Err(e) = reconcile_service::push(&account, &state.cipher, folder, uid, &action).await {
        warn!(
            email = %account.email,
            email_id = email.id,
            error = %e,
            "could not update IMAP server"
        );
    }
}

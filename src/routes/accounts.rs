//! Minimal registration surface for domains and accounts. The account
//! management subsystem owns the full CRUD; the sync core only needs enough
//! to know what to connect to.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::AppState;
use crate::services::account_service::{self, NewAccount};

#[derive(Debug, Deserialize)]
pub struct CreateDomainReq {
    pub name: String,
}

pub async fn create_domain(
    State(state): State<AppState>,
    Json(req): Json<CreateDomainReq>,
) -> Result<Json<Value>, (StatusCode, String)> {
    if req.name.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Missing 'name' parameter".to_string()));
    }
    let domain = account_service::create_domain(&state.pool, req.name.trim())
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    Ok(Json(json!({ "success": true, "domain": domain })))
}

pub async fn list_domains(
    State(state): State<AppState>,
) -> Result<Json<Value>, (StatusCode, String)> {
    let domains = account_service::list_domains(&state.pool)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(json!({ "total": domains.len(), "domains": domains })))
}

#[derive(Debug, Deserialize)]
pub struct AddAccountReq {
    pub domain_id: i64,
    pub email: String,
    pub password: String,
    pub imap_host: String,
    pub imap_port: Option<u16>,
    pub use_ssl: Option<bool>,
    pub use_tls: Option<bool>,
    pub display_name: Option<String>,
    pub sync_interval_minutes: Option<i64>,
}

pub async fn add_account(
    State(state): State<AppState>,
    Json(req): Json<AddAccountReq>,
) -> Result<Json<Value>, (StatusCode, String)> {
    if req.email.is_empty() || req.password.is_empty() || req.imap_host.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "email, password and imap_host are required".to_string(),
        ));
    }

    account_service::get_domain(&state.pool, req.domain_id)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .ok_or_else(|| (StatusCode::NOT_FOUND, "Domain not found".to_string()))?;

    let account = account_service::add_account(
        &state.pool,
        &state.cipher,
        NewAccount {
            domain_id: req.domain_id,
            email: req.email,
            password: req.password,
            imap_host: req.imap_host,
            imap_port: req.imap_port.unwrap_or(993),
            use_ssl: req.use_ssl.unwrap_or(true),
            use_tls: req.use_tls.unwrap_or(false),
            display_name: req.display_name,
            sync_interval_minutes: req.sync_interval_minutes.unwrap_or(5),
        },
    )
    .await
    .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    Ok(Json(json!({ "success": true, "account": account })))
}

pub async fn list_accounts(
    State(state): State<AppState>,
) -> Result<Json<Value>, (StatusCode, String)> {
    let accounts = account_service::list_accounts(&state.pool)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(json!({ "total": accounts.len(), "accounts": accounts })))
}

pub async fn get_account(
    State(state): State<AppState>,
    Path(account_id): Path<i64>,
) -> Result<Json<Value>, (StatusCode, String)> {
    let account = account_service::get_account(&state.pool, account_id)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .ok_or_else(|| (StatusCode::NOT_FOUND, "Account not found".to_string()))?;
    Ok(Json(json!({ "account": account })))
}

pub async fn delete_account(
    State(state): State<AppState>,
    Path(account_id): Path<i64>,
) -> Result<Json<Value>, (StatusCode, String)> {
    let deleted = account_service::delete_account(&state.pool, account_id)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    if !deleted {
        return Err((StatusCode::NOT_FOUND, "Account not found".to_string()));
    }
    Ok(Json(json!({ "success": true })))
}

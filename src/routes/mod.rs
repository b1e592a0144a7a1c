use axum::extract::FromRef;
use axum::routing::{get, post, put};
use axum::Router;
use sqlx::SqlitePool;

use crate::crypto::CredentialCipher;

pub mod accounts;
pub mod inbox;
pub mod sync;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub cipher: CredentialCipher,
}

impl FromRef<AppState> for SqlitePool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}

impl FromRef<AppState> for CredentialCipher {
    fn from_ref(state: &AppState) -> Self {
        state.cipher.clone()
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/sync/:account_id", post(sync::sync_account))
        .route(
            "/domains/:domain_id/sync-all",
            post(sync::sync_domain_accounts),
        )
        .route("/inbox/:account_id", get(inbox::list_inbox))
        .route("/inbox/:account_id/threads", get(inbox::list_threads))
        .route("/inbox/:account_id/stats", get(inbox::inbox_stats))
        .route(
            "/inbox/:account_id/:email_id",
            get(inbox::get_email).delete(inbox::delete_email),
        )
        .route("/inbox/:account_id/:email_id/read", put(inbox::mark_read))
        .route("/inbox/:account_id/:email_id/flag", put(inbox::toggle_flag))
        .route("/inbox/:account_id/:email_id/move", put(inbox::move_email))
        .route(
            "/domains",
            post(accounts::create_domain).get(accounts::list_domains),
        )
        .route(
            "/accounts",
            post(accounts::add_account).get(accounts::list_accounts),
        )
        .route(
            "/accounts/:account_id",
            get(accounts::get_account).delete(accounts::delete_account),
        )
}

//! Domain and account queries. The sync core reads accounts and writes back
//! only the last_sync watermark; everything else is registration plumbing.

use anyhow::{bail, Result};
use sqlx::SqlitePool;

use crate::crypto::CredentialCipher;
use crate::db::now_epoch;
use crate::models::account::{Account, Domain};

pub async fn create_domain(pool: &SqlitePool, name: &str) -> Result<Domain> {
    let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM domains WHERE name = ?")
        .bind(name)
        .fetch_optional(pool)
        .await?;
    if existing.is_some() {
        bail!("domain already exists: {name}");
    }

    let now = now_epoch();
    let res = sqlx::query(
        "INSERT INTO domains (name, is_active, created_at, updated_at) VALUES (?, 1, ?, ?)",
    )
    .bind(name)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(Domain {
        id: res.last_insert_rowid(),
        name: name.to_string(),
        is_active: true,
        created_at: now,
        updated_at: now,
    })
}

pub async fn list_domains(pool: &SqlitePool) -> Result<Vec<Domain>> {
    let domains = sqlx::query_as::<_, Domain>("SELECT * FROM domains ORDER BY created_at DESC")
        .fetch_all(pool)
        .await?;
    Ok(domains)
}

pub async fn get_domain(pool: &SqlitePool, domain_id: i64) -> Result<Option<Domain>> {
    let domain = sqlx::query_as::<_, Domain>("SELECT * FROM domains WHERE id = ?")
        .bind(domain_id)
        .fetch_optional(pool)
        .await?;
    Ok(domain)
}

pub struct NewAccount {
    pub domain_id: i64,
    pub email: String,
    pub password: String,
    pub imap_host: String,
    pub imap_port: u16,
    pub use_ssl: bool,
    pub use_tls: bool,
    pub display_name: Option<String>,
    pub sync_interval_minutes: i64,
}

pub async fn add_account(
    pool: &SqlitePool,
    cipher: &CredentialCipher,
    new: NewAccount,
) -> Result<Account> {
    let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM accounts WHERE email = ?")
        .bind(&new.email)
        .fetch_optional(pool)
        .await?;
    if existing.is_some() {
        bail!("account already exists: {}", new.email);
    }

    let credentials_encrypted = cipher.encrypt(&new.password)?;
    let now = now_epoch();

    let res = sqlx::query(
        r#"
        INSERT INTO accounts (
            domain_id, email, display_name,
            imap_host, imap_port, imap_use_ssl, imap_use_tls,
            credentials_encrypted, is_active, auto_sync_enabled,
            sync_interval_minutes, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, 1, 1, ?, ?, ?)
        "#,
    )
    .bind(new.domain_id)
    .bind(&new.email)
    .bind(&new.display_name)
    .bind(&new.imap_host)
    .bind(new.imap_port)
    .bind(new.use_ssl)
    .bind(new.use_tls)
    .bind(&credentials_encrypted)
    .bind(new.sync_interval_minutes)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(Account {
        id: res.last_insert_rowid(),
        domain_id: new.domain_id,
        email: new.email,
        display_name: new.display_name,
        imap_host: new.imap_host,
        imap_port: new.imap_port,
        imap_use_ssl: new.use_ssl,
        imap_use_tls: new.use_tls,
        credentials_encrypted,
        is_active: true,
        auto_sync_enabled: true,
        sync_interval_minutes: new.sync_interval_minutes,
        last_sync: None,
        created_at: now,
        updated_at: now,
    })
}

pub async fn list_accounts(pool: &SqlitePool) -> Result<Vec<Account>> {
    let accounts =
        sqlx::query_as::<_, Account>("SELECT * FROM accounts ORDER BY created_at DESC")
            .fetch_all(pool)
            .await?;
    Ok(accounts)
}

pub async fn get_account(pool: &SqlitePool, account_id: i64) -> Result<Option<Account>> {
    let account = sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE id = ?")
        .bind(account_id)
        .fetch_optional(pool)
        .await?;
    Ok(account)
}

pub async fn accounts_for_domain(
    pool: &SqlitePool,
    domain_id: i64,
    active_only: bool,
) -> Result<Vec<Account>> {
    let sql = if active_only {
        "SELECT * FROM accounts WHERE domain_id = ? AND is_active = 1 ORDER BY id"
    } else {
        "SELECT * FROM accounts WHERE domain_id = ? ORDER BY id"
    };
    let accounts = sqlx::query_as::<_, Account>(sql)
        .bind(domain_id)
        .fetch_all(pool)
        .await?;
    Ok(accounts)
}

pub async fn delete_account(pool: &SqlitePool, account_id: i64) -> Result<bool> {
    sqlx::query("DELETE FROM inbox_messages WHERE account_id = ?")
        .bind(account_id)
        .execute(pool)
        .await?;
    let res = sqlx::query("DELETE FROM accounts WHERE id = ?")
        .bind(account_id)
        .execute(pool)
        .await?;
    Ok(res.rows_affected() > 0)
}

/// Advance the incremental-sync watermark.
pub async fn update_last_sync(pool: &SqlitePool, account_id: i64, ts: i64) -> Result<()> {
    sqlx::query("UPDATE accounts SET last_sync = ?, updated_at = ? WHERE id = ?")
        .bind(ts)
        .bind(ts)
        .bind(account_id)
        .execute(pool)
        .await?;
    Ok(())
}

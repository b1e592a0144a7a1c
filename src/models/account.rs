use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::crypto::CredentialCipher;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Domain {
    pub id: i64,
    pub name: String,
    pub is_active: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Account {
    pub id: i64,
    pub domain_id: i64,
    pub email: String,
    pub display_name: Option<String>,
    pub imap_host: String,
    pub imap_port: u16,
    pub imap_use_ssl: bool,
    pub imap_use_tls: bool,
    #[serde(skip_serializing)]
    pub credentials_encrypted: String,
    pub is_active: bool,
    pub auto_sync_enabled: bool,
    pub sync_interval_minutes: i64,
    /// Watermark for incremental sync, epoch seconds. None = never synced.
    pub last_sync: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Everything the IMAP layer needs to open one session. The password lives
/// only in this short-lived projection, never on the row itself.
pub struct ImapConfig {
    pub server: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub use_ssl: bool,
    pub use_tls: bool,
}

impl Account {
    pub fn imap_config(&self, cipher: &CredentialCipher) -> Result<ImapConfig> {
        let password = cipher
            .decrypt(&self.credentials_encrypted)
            .with_context(|| format!("decrypt credentials for {}", self.email))?;
        Ok(ImapConfig {
            server: self.imap_host.clone(),
            port: self.imap_port,
            username: self.email.clone(),
            password,
            use_ssl: self.imap_use_ssl,
            use_tls: self.imap_use_tls,
        })
    }

    pub fn needs_sync(&self, now_epoch: i64) -> bool {
        if !self.auto_sync_enabled {
            return false;
        }
        match self.last_sync {
            None => true,
            Some(last) => now_epoch - last >= self.sync_interval_minutes * 60,
        }
    }

    pub fn last_sync_rfc3339(&self) -> Option<String> {
        self.last_sync
            .and_then(|ts| chrono::DateTime::from_timestamp(ts, 0))
            .map(|dt| dt.to_rfc3339())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(auto_sync: bool, interval_minutes: i64, last_sync: Option<i64>) -> Account {
        Account {
            id: 1,
            domain_id: 1,
            email: "orders@example.pt".into(),
            display_name: None,
            imap_host: "mail.example.pt".into(),
            imap_port: 993,
            imap_use_ssl: true,
            imap_use_tls: false,
            credentials_encrypted: String::new(),
            is_active: true,
            auto_sync_enabled: auto_sync,
            sync_interval_minutes: interval_minutes,
            last_sync,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn never_synced_account_is_due() {
        assert!(account(true, 5, None).needs_sync(1_000_000));
    }

    #[test]
    fn interval_gates_resync() {
        let acc = account(true, 5, Some(1_000_000));
        assert!(!acc.needs_sync(1_000_000 + 299));
        assert!(acc.needs_sync(1_000_000 + 300));
    }

    #[test]
    fn disabled_account_is_never_due() {
        assert!(!account(false, 5, None).needs_sync(1_000_000));
    }
}

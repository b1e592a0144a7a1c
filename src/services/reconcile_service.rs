//! Best-effort mirroring of local mutations back to the IMAP server.
//!
//! The local row has already committed and is authoritative; a failure here
//! is logged by the caller and dropped. There is no retry queue.

use anyhow::Result;

use crate::crypto::CredentialCipher;
use crate::imap::conn::{self, ImapSession};
use crate::models::account::Account;

#[derive(Debug, Clone)]
pub enum ReconcileAction {
    MarkRead,
    MarkUnread,
    Flag,
    Unflag,
    Move(String),
    Delete { permanent: bool },
}

/// Push one mutation for one message, keyed by its server UID in the
/// message's current (pre-mutation for moves) folder.
pub async fn push(
    account: &Account,
    cipher: &CredentialCipher,
    folder: &str,
    uid: i64,
    action: &ReconcileAction,
) -> Result<()> {
    let config = account.imap_config(cipher)?;
    let mut session = conn::connect(&config).await?;
    let result = tokio::time::timeout(
        std::time::Duration::from_secs(30),
        apply(&mut session, folder, uid, action),
    )
    .await
    .unwrap_or_else(|_| Err(anyhow::anyhow!("reconciliation timed out")));
    session.logout().await;
    result
}

async fn apply(
    session: &mut ImapSession,
    folder: &str,
    uid: i64,
    action: &ReconcileAction,
) -> Result<()> {
    session.select(folder).await?;
    let uid_set = uid.to_string();
    match action {
        ReconcileAction::MarkRead => session.uid_store(&uid_set, "+FLAGS (\\Seen)").await,
        ReconcileAction::MarkUnread => session.uid_store(&uid_set, "-FLAGS (\\Seen)").await,
        ReconcileAction::Flag => session.uid_store(&uid_set, "+FLAGS (\\Flagged)").await,
        ReconcileAction::Unflag => session.uid_store(&uid_set, "-FLAGS (\\Flagged)").await,
        ReconcileAction::Move(target) => session.uid_mv(&uid_set, target).await,
        ReconcileAction::Delete { permanent } => {
            session.uid_store(&uid_set, "+FLAGS (\\Deleted)").await?;
            if *permanent {
                session.expunge().await?;
            }
            Ok(())
        }
    }
}

//! Local mailbox store: the relational mirror of synced messages.
//!
//! Every read here excludes soft-deleted rows unless the caller asks for a
//! specific message by id. Mutations are single-row and visible to the next
//! query immediately.

use anyhow::Result;
use serde::Serialize;
use sqlx::{Row, SqlitePool};
use std::collections::BTreeMap;

use crate::models::message::{InboxMessage, MappedMessage};

#[derive(Debug, Clone, Default)]
pub struct InboxFilter {
    pub folder: String,
    pub unread_only: bool,
    pub has_attachments_only: bool,
    pub search: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct InboxPage {
    pub emails: Vec<InboxMessage>,
    pub total: i64,
    pub page: i64,
    pub pages: i64,
    pub per_page: i64,
    pub has_prev: bool,
    pub has_next: bool,
}

#[derive(Debug, Serialize)]
pub struct ThreadSummary {
    pub thread_id: String,
    pub subject: Option<String>,
    pub email_count: i64,
    pub unread_count: i64,
    pub has_attachments: bool,
    pub participants: Vec<String>,
    pub last_received: String,
    pub emails: Vec<InboxMessage>,
}

#[derive(Debug, Serialize)]
pub struct InboxStats {
    pub total_emails: i64,
    pub unread_emails: i64,
    pub flagged_emails: i64,
    pub with_attachments: i64,
    pub folders: BTreeMap<String, i64>,
}

/// Insert a freshly mapped message. Returns false when the row already
/// exists (the unique (account_id, message_id) index fired) - duplicate
/// imports are expected across overlapping sync windows, not an error.
pub async fn insert_message(pool: &SqlitePool, msg: &MappedMessage) -> Result<bool> {
    let res = sqlx::query(
        r#"
        INSERT INTO inbox_messages (
            account_id, message_id, uid, folder,
            from_address, from_name, to_addresses, cc_addresses, bcc_addresses, reply_to,
            subject, body_text, body_html,
            has_attachments, attachment_count, attachments_json,
            is_read, is_flagged, is_answered, is_draft,
            thread_id, in_reply_to, refs,
            size_bytes, received_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(msg.account_id)
    .bind(&msg.message_id)
    .bind(msg.uid)
    .bind(&msg.folder)
    .bind(&msg.from_address)
    .bind(&msg.from_name)
    .bind(&msg.to_addresses)
    .bind(&msg.cc_addresses)
    .bind(&msg.bcc_addresses)
    .bind(&msg.reply_to)
    .bind(&msg.subject)
    .bind(&msg.body_text)
    .bind(&msg.body_html)
    .bind(msg.has_attachments)
    .bind(msg.attachment_count)
    .bind(&msg.attachments_json)
    .bind(msg.is_read)
    .bind(msg.is_flagged)
    .bind(msg.is_answered)
    .bind(msg.is_draft)
    .bind(&msg.thread_id)
    .bind(&msg.in_reply_to)
    .bind(&msg.references)
    .bind(msg.size_bytes)
    .bind(&msg.received_at)
    .execute(pool)
    .await;

    match res {
        Ok(_) => Ok(true),
        Err(sqlx::Error::Database(e)) if e.message().contains("UNIQUE") => Ok(false),
        Err(e) => Err(e.into()),
    }
}

pub async fn message_exists(
    pool: &SqlitePool,
    account_id: i64,
    message_id: &str,
) -> Result<bool> {
    let exists: bool = sqlx::query_scalar(
        "SELECT COUNT(*) > 0 FROM inbox_messages WHERE account_id = ? AND message_id = ?",
    )
    .bind(account_id)
    .bind(message_id)
    .fetch_one(pool)
    .await?;
    Ok(exists)
}

/// Direct lookup by id. Finds soft-deleted rows too.
pub async fn get_message(
    pool: &SqlitePool,
    account_id: i64,
    id: i64,
) -> Result<Option<InboxMessage>> {
    let row = sqlx::query_as::<_, InboxMessage>(
        "SELECT * FROM inbox_messages WHERE account_id = ? AND id = ?",
    )
    .bind(account_id)
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn list_inbox(
    pool: &SqlitePool,
    account_id: i64,
    page: i64,
    per_page: i64,
    filter: &InboxFilter,
) -> Result<InboxPage> {
    let mut where_sql =
        String::from("account_id = ? AND folder = ? AND is_deleted = 0");
    if filter.unread_only {
        where_sql.push_str(" AND is_read = 0");
    }
    if filter.has_attachments_only {
        where_sql.push_str(" AND has_attachments = 1");
    }
    let search_pattern = filter
        .search
        .as_deref()
        .filter(|q| !q.is_empty())
        .map(|q| format!("%{}%", q));
    if search_pattern.is_some() {
        where_sql.push_str(
            " AND (subject LIKE ? OR from_address LIKE ? OR from_name LIKE ? OR body_text LIKE ?)",
        );
    }

    let count_sql = format!("SELECT COUNT(*) FROM inbox_messages WHERE {where_sql}");
    let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql)
        .bind(account_id)
        .bind(&filter.folder);
    if let Some(ref p) = search_pattern {
        count_q = count_q.bind(p).bind(p).bind(p).bind(p);
    }
    let total = count_q.fetch_one(pool).await?;

    let offset = (page - 1) * per_page;
    let list_sql = format!(
        "SELECT * FROM inbox_messages WHERE {where_sql} \
         ORDER BY received_at DESC LIMIT ? OFFSET ?"
    );
    let mut list_q = sqlx::query_as::<_, InboxMessage>(&list_sql)
        .bind(account_id)
        .bind(&filter.folder);
    if let Some(ref p) = search_pattern {
        list_q = list_q.bind(p).bind(p).bind(p).bind(p);
    }
    let emails = list_q.bind(per_page).bind(offset).fetch_all(pool).await?;

    let pages = if total == 0 {
        0
    } else {
        (total + per_page - 1) / per_page
    };
    Ok(InboxPage {
        emails,
        total,
        page,
        pages,
        per_page,
        has_prev: page > 1,
        has_next: page < pages,
    })
}

/// Conversations grouped by thread_id, newest activity first. Threadless
/// messages carry a synthetic per-message thread id, so each shows up as a
/// single-message thread.
pub async fn list_threads(
    pool: &SqlitePool,
    account_id: i64,
    limit: i64,
) -> Result<Vec<ThreadSummary>> {
    let heads = sqlx::query(
        r#"
        SELECT thread_id, MAX(received_at) AS last_received
        FROM inbox_messages
        WHERE account_id = ? AND is_deleted = 0 AND thread_id IS NOT NULL
        GROUP BY thread_id
        ORDER BY last_received DESC
        LIMIT ?
        "#,
    )
    .bind(account_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    let mut threads = Vec::with_capacity(heads.len());
    for head in heads {
        let thread_id: String = head.try_get("thread_id")?;
        let last_received: String = head.try_get("last_received")?;

        let emails = sqlx::query_as::<_, InboxMessage>(
            "SELECT * FROM inbox_messages \
             WHERE account_id = ? AND thread_id = ? AND is_deleted = 0 \
             ORDER BY received_at ASC",
        )
        .bind(account_id)
        .bind(&thread_id)
        .fetch_all(pool)
        .await?;

        if emails.is_empty() {
            continue;
        }

        let unread_count = emails.iter().filter(|e| !e.is_read).count() as i64;
        let has_attachments = emails.iter().any(|e| e.has_attachments);
        let mut participants: Vec<String> = emails
            .iter()
            .filter_map(|e| e.from_address.clone())
            .collect();
        participants.sort();
        participants.dedup();

        threads.push(ThreadSummary {
            thread_id,
            subject: emails[0].subject.clone(),
            email_count: emails.len() as i64,
            unread_count,
            has_attachments,
            participants,
            last_received,
            emails,
        });
    }
    Ok(threads)
}

pub async fn unread_count(
    pool: &SqlitePool,
    account_id: i64,
    folder: Option<&str>,
) -> Result<i64> {
    let count = match folder {
        Some(folder) => {
            sqlx::query_scalar(
                "SELECT COUNT(*) FROM inbox_messages \
                 WHERE account_id = ? AND folder = ? AND is_read = 0 AND is_deleted = 0",
            )
            .bind(account_id)
            .bind(folder)
            .fetch_one(pool)
            .await?
        }
        None => {
            sqlx::query_scalar(
                "SELECT COUNT(*) FROM inbox_messages \
                 WHERE account_id = ? AND is_read = 0 AND is_deleted = 0",
            )
            .bind(account_id)
            .fetch_one(pool)
            .await?
        }
    };
    Ok(count)
}

pub async fn total_count(
    pool: &SqlitePool,
    account_id: i64,
    folder: Option<&str>,
) -> Result<i64> {
    let count = match folder {
        Some(folder) => {
            sqlx::query_scalar(
                "SELECT COUNT(*) FROM inbox_messages \
                 WHERE account_id = ? AND folder = ? AND is_deleted = 0",
            )
            .bind(account_id)
            .bind(folder)
            .fetch_one(pool)
            .await?
        }
        None => {
            sqlx::query_scalar(
                "SELECT COUNT(*) FROM inbox_messages WHERE account_id = ? AND is_deleted = 0",
            )
            .bind(account_id)
            .fetch_one(pool)
            .await?
        }
    };
    Ok(count)
}

pub async fn stats(pool: &SqlitePool, account_id: i64) -> Result<InboxStats> {
    let total_emails = total_count(pool, account_id, None).await?;
    let unread_emails = unread_count(pool, account_id, None).await?;

    let flagged_emails: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM inbox_messages \
         WHERE account_id = ? AND is_flagged = 1 AND is_deleted = 0",
    )
    .bind(account_id)
    .fetch_one(pool)
    .await?;

    let with_attachments: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM inbox_messages \
         WHERE account_id = ? AND has_attachments = 1 AND is_deleted = 0",
    )
    .bind(account_id)
    .fetch_one(pool)
    .await?;

    let folder_rows = sqlx::query(
        "SELECT folder, COUNT(*) AS c FROM inbox_messages \
         WHERE account_id = ? AND is_deleted = 0 GROUP BY folder",
    )
    .bind(account_id)
    .fetch_all(pool)
    .await?;

    let mut folders = BTreeMap::new();
    for row in folder_rows {
        let folder: String = row.try_get("folder")?;
        let count: i64 = row.try_get("c")?;
        folders.insert(folder, count);
    }

    Ok(InboxStats {
        total_emails,
        unread_emails,
        flagged_emails,
        with_attachments,
        folders,
    })
}

pub async fn set_read(
    pool: &SqlitePool,
    account_id: i64,
    id: i64,
    is_read: bool,
) -> Result<bool> {
    let res = sqlx::query(
        "UPDATE inbox_messages SET is_read = ?, updated_at = datetime('now') \
         WHERE account_id = ? AND id = ?",
    )
    .bind(is_read)
    .bind(account_id)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(res.rows_affected() > 0)
}

/// Flip the flag and report the new state; None when the row is missing.
pub async fn toggle_flag(
    pool: &SqlitePool,
    account_id: i64,
    id: i64,
) -> Result<Option<bool>> {
    let res = sqlx::query(
        "UPDATE inbox_messages SET is_flagged = 1 - is_flagged, updated_at = datetime('now') \
         WHERE account_id = ? AND id = ?",
    )
    .bind(account_id)
    .bind(id)
    .execute(pool)
    .await?;
    if res.rows_affected() == 0 {
        return Ok(None);
    }
    let is_flagged: bool = sqlx::query_scalar(
        "SELECT is_flagged FROM inbox_messages WHERE account_id = ? AND id = ?",
    )
    .bind(account_id)
    .bind(id)
    .fetch_one(pool)
    .await?;
    Ok(Some(is_flagged))
}

pub async fn move_folder(
    pool: &SqlitePool,
    account_id: i64,
    id: i64,
    folder: &str,
) -> Result<bool> {
    let res = sqlx::query(
        "UPDATE inbox_messages SET folder = ?, updated_at = datetime('now') \
         WHERE account_id = ? AND id = ?",
    )
    .bind(folder)
    .bind(account_id)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(res.rows_affected() > 0)
}

pub async fn soft_delete(pool: &SqlitePool, account_id: i64, id: i64) -> Result<bool> {
    let res = sqlx::query(
        "UPDATE inbox_messages SET is_deleted = 1, updated_at = datetime('now') \
         WHERE account_id = ? AND id = ?",
    )
    .bind(account_id)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(res.rows_affected() > 0)
}

pub async fn delete_permanent(pool: &SqlitePool, account_id: i64, id: i64) -> Result<bool> {
    let res = sqlx::query("DELETE FROM inbox_messages WHERE account_id = ? AND id = ?")
        .bind(account_id)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(res.rows_affected() > 0)
}

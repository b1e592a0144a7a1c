use serde::{Deserialize, Serialize};

/// One locally mirrored message. `(account_id, message_id)` is the
/// idempotency key; `uid` is the server-side correlation key used when
/// mirroring mutations back.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct InboxMessage {
    pub id: i64,
    pub account_id: i64,
    pub message_id: Option<String>,
    pub uid: Option<i64>,
    pub folder: String,
    pub from_address: Option<String>,
    pub from_name: Option<String>,
    pub to_addresses: Option<String>,
    pub cc_addresses: Option<String>,
    pub bcc_addresses: Option<String>,
    pub reply_to: Option<String>,
    pub subject: Option<String>,
    pub body_text: Option<String>,
    pub body_html: Option<String>,
    pub has_attachments: bool,
    pub attachment_count: i64,
    pub attachments_json: Option<String>,
    pub is_read: bool,
    pub is_flagged: bool,
    pub is_deleted: bool,
    pub is_answered: bool,
    pub is_draft: bool,
    pub thread_id: Option<String>,
    pub in_reply_to: Option<String>,
    #[sqlx(rename = "refs")]
    pub references: Option<String>,
    pub labels: Option<String>,
    pub priority: i64,
    pub size_bytes: i64,
    pub received_at: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentMeta {
    pub filename: String,
    pub content_type: String,
    pub size: u64,
}

/// Output of the message mapper; what the orchestrator hands to the store.
#[derive(Debug, Clone)]
pub struct MappedMessage {
    pub account_id: i64,
    pub message_id: Option<String>,
    pub uid: i64,
    pub folder: String,
    pub from_address: Option<String>,
    pub from_name: Option<String>,
    pub to_addresses: Option<String>,
    pub cc_addresses: Option<String>,
    pub bcc_addresses: Option<String>,
    pub reply_to: Option<String>,
    pub subject: Option<String>,
    pub body_text: Option<String>,
    pub body_html: Option<String>,
    pub has_attachments: bool,
    pub attachment_count: i64,
    pub attachments_json: Option<String>,
    pub is_read: bool,
    pub is_flagged: bool,
    pub is_answered: bool,
    pub is_draft: bool,
    pub thread_id: String,
    pub in_reply_to: Option<String>,
    pub references: Option<String>,
    pub size_bytes: i64,
    pub received_at: String,
}

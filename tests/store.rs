//! Store-level behavior against an in-memory SQLite database: idempotent
//! import, soft-delete visibility, counters, pagination, threads, search
//! and single-row mutations.

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use sendcraft_imap::crypto::CredentialCipher;
use sendcraft_imap::db::store::{self, InboxFilter};
use sendcraft_imap::db::{self, now_epoch};
use sendcraft_imap::models::message::MappedMessage;
use sendcraft_imap::services::account_service::{self, NewAccount};

async fn test_pool() -> SqlitePool {
    // one connection, or every pool checkout would see its own :memory: db
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    db::run_migrations(&pool).await.unwrap();
    pool
}

async fn seed_account(pool: &SqlitePool) -> i64 {
    let cipher = CredentialCipher::new("test-key");
    let domain = account_service::create_domain(pool, "example.pt")
        .await
        .unwrap();
    let account = account_service::add_account(
        pool,
        &cipher,
        NewAccount {
            domain_id: domain.id,
            email: "orders@example.pt".to_string(),
            password: "secret".to_string(),
            imap_host: "mail.example.pt".to_string(),
            imap_port: 993,
            use_ssl: true,
            use_tls: false,
            display_name: None,
            sync_interval_minutes: 5,
        },
    )
    .await
    .unwrap();
    account.id
}

fn message(account_id: i64, n: i64) -> MappedMessage {
    let message_id = format!("msg-{n}@example.pt");
    MappedMessage {
        account_id,
        message_id: Some(message_id.clone()),
        uid: n,
        folder: "INBOX".to_string(),
        from_address: Some(format!("sender{n}@example.pt")),
        from_name: Some(format!("Sender {n}")),
        to_addresses: Some("orders@example.pt".to_string()),
        cc_addresses: None,
        bcc_addresses: None,
        reply_to: None,
        subject: Some(format!("Subject {n}")),
        body_text: Some(format!("body of message {n}")),
        body_html: None,
        has_attachments: false,
        attachment_count: 0,
        attachments_json: None,
        is_read: false,
        is_flagged: false,
        is_answered: false,
        is_draft: false,
        thread_id: message_id,
        in_reply_to: None,
        references: None,
        size_bytes: 512,
        received_at: format!("2025-07-01T10:00:{:02}+00:00", n),
    }
}

fn default_filter() -> InboxFilter {
    InboxFilter {
        folder: "INBOX".to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn duplicate_import_is_skipped() {
    let pool = test_pool().await;
    let account_id = seed_account(&pool).await;

    let msg = message(account_id, 1);
    assert!(store::insert_message(&pool, &msg).await.unwrap());
    // second import of the same (account_id, message_id) is a no-op
    assert!(!store::insert_message(&pool, &msg).await.unwrap());

    assert!(store::message_exists(&pool, account_id, "msg-1@example.pt")
        .await
        .unwrap());
    assert_eq!(store::total_count(&pool, account_id, None).await.unwrap(), 1);
}

#[tokio::test]
async fn soft_delete_hides_from_listing_but_not_lookup() {
    let pool = test_pool().await;
    let account_id = seed_account(&pool).await;

    for n in 1..=3 {
        store::insert_message(&pool, &message(account_id, n))
            .await
            .unwrap();
    }
    let page = store::list_inbox(&pool, account_id, 1, 50, &default_filter())
        .await
        .unwrap();
    let victim_id = page.emails[0].id;

    assert!(store::soft_delete(&pool, account_id, victim_id).await.unwrap());

    let page = store::list_inbox(&pool, account_id, 1, 50, &default_filter())
        .await
        .unwrap();
    assert_eq!(page.total, 2);
    assert!(page.emails.iter().all(|e| e.id != victim_id));
    assert_eq!(store::total_count(&pool, account_id, None).await.unwrap(), 2);
    assert_eq!(store::unread_count(&pool, account_id, None).await.unwrap(), 2);

    // still reachable by direct id lookup
    let victim = store::get_message(&pool, account_id, victim_id)
        .await
        .unwrap()
        .unwrap();
    assert!(victim.is_deleted);
}

#[tokio::test]
async fn permanent_delete_removes_row() {
    let pool = test_pool().await;
    let account_id = seed_account(&pool).await;

    store::insert_message(&pool, &message(account_id, 1))
        .await
        .unwrap();
    let page = store::list_inbox(&pool, account_id, 1, 50, &default_filter())
        .await
        .unwrap();
    let id = page.emails[0].id;

    assert!(store::delete_permanent(&pool, account_id, id).await.unwrap());
    assert!(store::get_message(&pool, account_id, id)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn pagination_envelope() {
    let pool = test_pool().await;
    let account_id = seed_account(&pool).await;

    for n in 1..=5 {
        store::insert_message(&pool, &message(account_id, n))
            .await
            .unwrap();
    }

    let page1 = store::list_inbox(&pool, account_id, 1, 2, &default_filter())
        .await
        .unwrap();
    assert_eq!(page1.total, 5);
    assert_eq!(page1.pages, 3);
    assert_eq!(page1.emails.len(), 2);
    assert!(!page1.has_prev);
    assert!(page1.has_next);
    // newest first
    assert_eq!(page1.emails[0].subject.as_deref(), Some("Subject 5"));

    let page3 = store::list_inbox(&pool, account_id, 3, 2, &default_filter())
        .await
        .unwrap();
    assert_eq!(page3.emails.len(), 1);
    assert!(page3.has_prev);
    assert!(!page3.has_next);
}

#[tokio::test]
async fn filters_and_search() {
    let pool = test_pool().await;
    let account_id = seed_account(&pool).await;

    let mut with_attachment = message(account_id, 1);
    with_attachment.has_attachments = true;
    with_attachment.attachment_count = 1;
    store::insert_message(&pool, &with_attachment).await.unwrap();

    let mut read = message(account_id, 2);
    read.is_read = true;
    store::insert_message(&pool, &read).await.unwrap();

    let mut special = message(account_id, 3);
    special.subject = Some("Fatura 2025".to_string());
    store::insert_message(&pool, &special).await.unwrap();

    let unread = store::list_inbox(
        &pool,
        account_id,
        1,
        50,
        &InboxFilter {
            folder: "INBOX".to_string(),
            unread_only: true,
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(unread.total, 2);

    let attachments_only = store::list_inbox(
        &pool,
        account_id,
        1,
        50,
        &InboxFilter {
            folder: "INBOX".to_string(),
            has_attachments_only: true,
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(attachments_only.total, 1);
    assert_eq!(attachments_only.emails[0].subject.as_deref(), Some("Subject 1"));

    let searched = store::list_inbox(
        &pool,
        account_id,
        1,
        50,
        &InboxFilter {
            folder: "INBOX".to_string(),
            search: Some("Fatura".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(searched.total, 1);
    assert_eq!(searched.emails[0].subject.as_deref(), Some("Fatura 2025"));
}

#[tokio::test]
async fn stats_counters() {
    let pool = test_pool().await;
    let account_id = seed_account(&pool).await;

    let mut flagged = message(account_id, 1);
    flagged.is_flagged = true;
    store::insert_message(&pool, &flagged).await.unwrap();

    let mut read_with_attachment = message(account_id, 2);
    read_with_attachment.is_read = true;
    read_with_attachment.has_attachments = true;
    read_with_attachment.attachment_count = 2;
    store::insert_message(&pool, &read_with_attachment)
        .await
        .unwrap();

    let mut archived = message(account_id, 3);
    archived.folder = "Archive".to_string();
    store::insert_message(&pool, &archived).await.unwrap();

    let stats = store::stats(&pool, account_id).await.unwrap();
    assert_eq!(stats.total_emails, 3);
    assert_eq!(stats.unread_emails, 2);
    assert_eq!(stats.flagged_emails, 1);
    assert_eq!(stats.with_attachments, 1);
    assert_eq!(stats.folders.get("INBOX"), Some(&2));
    assert_eq!(stats.folders.get("Archive"), Some(&1));

    // folder-scoped counters
    assert_eq!(
        store::unread_count(&pool, account_id, Some("INBOX"))
            .await
            .unwrap(),
        1
    );
    assert_eq!(
        store::total_count(&pool, account_id, Some("Archive"))
            .await
            .unwrap(),
        1
    );
}

#[tokio::test]
async fn threads_group_by_thread_id() {
    let pool = test_pool().await;
    let account_id = seed_account(&pool).await;

    // two messages in one conversation
    let mut first = message(account_id, 1);
    first.thread_id = "root@example.pt".to_string();
    first.is_read = true;
    store::insert_message(&pool, &first).await.unwrap();

    let mut reply = message(account_id, 2);
    reply.thread_id = "root@example.pt".to_string();
    reply.in_reply_to = Some("msg-1@example.pt".to_string());
    store::insert_message(&pool, &reply).await.unwrap();

    // a threadless message forms its own singleton thread
    store::insert_message(&pool, &message(account_id, 3))
        .await
        .unwrap();

    let threads = store::list_threads(&pool, account_id, 50).await.unwrap();
    assert_eq!(threads.len(), 2);

    // newest activity first: the singleton (received :03) beats the
    // conversation (latest :02)
    assert_eq!(threads[0].thread_id, "msg-3@example.pt");
    assert_eq!(threads[0].email_count, 1);

    let convo = &threads[1];
    assert_eq!(convo.thread_id, "root@example.pt");
    assert_eq!(convo.email_count, 2);
    assert_eq!(convo.unread_count, 1);
    assert_eq!(convo.subject.as_deref(), Some("Subject 1"));
    assert_eq!(
        convo.participants,
        vec![
            "sender1@example.pt".to_string(),
            "sender2@example.pt".to_string()
        ]
    );
    // oldest first inside the thread
    assert_eq!(convo.emails[0].subject.as_deref(), Some("Subject 1"));

    // deleting part of a thread shrinks it
    store::soft_delete(&pool, account_id, convo.emails[1].id)
        .await
        .unwrap();
    let threads = store::list_threads(&pool, account_id, 50).await.unwrap();
    let convo = threads
        .iter()
        .find(|t| t.thread_id == "root@example.pt")
        .unwrap();
    assert_eq!(convo.email_count, 1);
}

#[tokio::test]
async fn mutations_are_immediately_visible() {
    let pool = test_pool().await;
    let account_id = seed_account(&pool).await;

    store::insert_message(&pool, &message(account_id, 1))
        .await
        .unwrap();
    let id = store::list_inbox(&pool, account_id, 1, 50, &default_filter())
        .await
        .unwrap()
        .emails[0]
        .id;

    assert!(store::set_read(&pool, account_id, id, true).await.unwrap());
    assert!(store::get_message(&pool, account_id, id)
        .await
        .unwrap()
        .unwrap()
        .is_read);
    assert_eq!(store::unread_count(&pool, account_id, None).await.unwrap(), 0);

    assert_eq!(
        store::toggle_flag(&pool, account_id, id).await.unwrap(),
        Some(true)
    );
    assert_eq!(
        store::toggle_flag(&pool, account_id, id).await.unwrap(),
        Some(false)
    );
    assert_eq!(store::toggle_flag(&pool, account_id, 9999).await.unwrap(), None);

    assert!(store::move_folder(&pool, account_id, id, "Archive")
        .await
        .unwrap());
    let moved = store::get_message(&pool, account_id, id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(moved.folder, "Archive");
    // gone from the INBOX listing, present under the new folder
    assert_eq!(
        store::list_inbox(&pool, account_id, 1, 50, &default_filter())
            .await
            .unwrap()
            .total,
        0
    );
    assert_eq!(
        store::total_count(&pool, account_id, Some("Archive"))
            .await
            .unwrap(),
        1
    );
}

#[tokio::test]
async fn watermark_round_trip() {
    let pool = test_pool().await;
    let account_id = seed_account(&pool).await;

    let account = account_service::get_account(&pool, account_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(account.last_sync, None);
    assert!(account.needs_sync(now_epoch()));

    let ts = now_epoch();
    account_service::update_last_sync(&pool, account_id, ts)
        .await
        .unwrap();

    let account = account_service::get_account(&pool, account_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(account.last_sync, Some(ts));
    assert!(!account.needs_sync(ts + 1));
    assert!(account.needs_sync(ts + account.sync_interval_minutes * 60));
}

#[tokio::test]
async fn messages_without_message_id_can_repeat() {
    let pool = test_pool().await;
    let account_id = seed_account(&pool).await;

    // no message_id means no idempotency key; both inserts land
    let mut a = message(account_id, 1);
    a.message_id = None;
    a.thread_id = "1@INBOX".to_string();
    let mut b = message(account_id, 2);
    b.message_id = None;
    b.thread_id = "2@INBOX".to_string();

    assert!(store::insert_message(&pool, &a).await.unwrap());
    assert!(store::insert_message(&pool, &b).await.unwrap());
    assert_eq!(store::total_count(&pool, account_id, None).await.unwrap(), 2);
}

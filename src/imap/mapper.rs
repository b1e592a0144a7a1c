//! Raw RFC822 bytes -> local row fields.
//!
//! Total: a malformed message degrades to empty fields, it never aborts the
//! batch. Header decoding, body splitting and attachment metadata all come
//! from mail-parser.

use chrono::Utc;
use mail_parser::{HeaderValue, Message, MessageParser, MimeHeaders};

use super::fetch::RawMessage;
use crate::models::message::{AttachmentMeta, MappedMessage};

pub fn map_message(account_id: i64, folder: &str, raw: &RawMessage) -> MappedMessage {
    let parsed = MessageParser::default().parse(&raw.body);

    let (subject, from_address, from_name, to_addresses, cc_addresses, bcc_addresses, reply_to) =
        match parsed.as_ref() {
            Some(msg) => (
                msg.subject().map(|s| s.to_string()),
                first_address(msg.from()),
                first_name(msg.from()),
                address_list(msg.to()),
                address_list(msg.cc()),
                address_list(msg.bcc()),
                first_address(msg.reply_to()),
            ),
            None => (None, None, None, None, None, None, None),
        };

    let message_id = parsed
        .as_ref()
        .and_then(|m| m.message_id())
        .map(|s| s.to_string());
    let in_reply_to = parsed
        .as_ref()
        .and_then(|m| header_ids(m, "In-Reply-To").into_iter().next());
    let references = parsed.as_ref().map(|m| header_ids(m, "References"));
    let references_joined = references
        .as_ref()
        .filter(|r| !r.is_empty())
        .map(|r| r.join(" "));

    // Thread lineage: root reference, else the replied-to id, else the
    // message's own id. A message with none of those still gets a stable
    // per-message thread, so every message belongs to some thread.
    let thread_id = references
        .as_ref()
        .and_then(|r| r.first().cloned())
        .or_else(|| in_reply_to.clone())
        .or_else(|| message_id.clone())
        .unwrap_or_else(|| format!("{}@{}", raw.uid, folder));

    let body_text = parsed
        .as_ref()
        .and_then(|m| m.body_text(0))
        .map(|s| s.to_string());
    let body_html = parsed
        .as_ref()
        .and_then(|m| m.body_html(0))
        .map(|s| s.to_string());

    let attachments = parsed
        .as_ref()
        .map(|m| attachment_metadata(m))
        .unwrap_or_default();
    let attachment_count = attachments.len() as i64;
    let attachments_json = if attachments.is_empty() {
        None
    } else {
        serde_json::to_string(&attachments).ok()
    };

    let received_at = raw
        .internal_date
        .map(|d| d.with_timezone(&Utc).to_rfc3339())
        .or_else(|| {
            parsed
                .as_ref()
                .and_then(|m| m.date())
                .and_then(|d| chrono::DateTime::from_timestamp(d.to_timestamp(), 0))
                .map(|d| d.to_rfc3339())
        })
        .unwrap_or_else(|| Utc::now().to_rfc3339());

    let size_bytes = raw.size.map(|s| s as i64).unwrap_or(raw.body.len() as i64);

    MappedMessage {
        account_id,
        message_id,
        uid: raw.uid as i64,
        folder: folder.to_string(),
        from_address,
        from_name,
        to_addresses,
        cc_addresses,
        bcc_addresses,
        reply_to,
        subject,
        body_text,
        body_html,
        has_attachments: attachment_count > 0,
        attachment_count,
        attachments_json,
        is_read: raw.flags.seen,
        is_flagged: raw.flags.flagged,
        is_answered: raw.flags.answered,
        is_draft: raw.flags.draft,
        thread_id,
        in_reply_to,
        references: references_joined,
        size_bytes,
        received_at,
    }
}

fn first_address(addr: Option<&mail_parser::Address>) -> Option<String> {
    addr.and_then(|a| a.first())
        .and_then(|a| a.address())
        .map(|s| s.to_string())
}

fn first_name(addr: Option<&mail_parser::Address>) -> Option<String> {
    addr.and_then(|a| a.first())
        .and_then(|a| a.name())
        .map(|s| s.to_string())
}

/// Comma-delimited "Name <addr>" list, matching the stored column format.
fn address_list(addr: Option<&mail_parser::Address>) -> Option<String> {
    let list: Vec<String> = addr
        .map(|a| {
            a.iter()
                .filter_map(|entry| {
                    let address = entry.address()?;
                    Some(match entry.name() {
                        Some(name) if !name.is_empty() => format!("{} <{}>", name, address),
                        _ => address.to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default();
    if list.is_empty() {
        None
    } else {
        Some(list.join(", "))
    }
}

fn header_ids(msg: &Message, name: &str) -> Vec<String> {
    match msg.header(name) {
        Some(HeaderValue::Text(t)) => vec![t.to_string()],
        Some(HeaderValue::TextList(l)) => l.iter().map(|t| t.to_string()).collect(),
        _ => Vec::new(),
    }
}

fn attachment_metadata(msg: &Message) -> Vec<AttachmentMeta> {
    let mut out = Vec::new();
    for (idx, part) in msg.attachments().enumerate() {
        let content_type = part
            .content_type()
            .map(|c| match c.subtype() {
                Some(sub) => format!("{}/{}", c.c_type, sub),
                None => c.c_type.to_string(),
            })
            .unwrap_or_else(|| "application/octet-stream".to_string());
        let filename = part
            .attachment_name()
            .map(|s| s.to_string())
            .unwrap_or_else(|| format!("unnamed-{}", idx + 1));
        out.push(AttachmentMeta {
            filename,
            content_type,
            size: part.contents().len() as u64,
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imap::fetch::FlagSet;

    fn raw(body: &[u8]) -> RawMessage {
        RawMessage {
            uid: 7,
            flags: FlagSet::default(),
            internal_date: None,
            size: None,
            body: body.to_vec(),
        }
    }

    #[test]
    fn maps_simple_message() {
        let body = concat!(
            "From: Ana Silva <ana@example.pt>\r\n",
            "To: orders@example.pt\r\n",
            "Subject: Encomenda 42\r\n",
            "Message-ID: <abc123@example.pt>\r\n",
            "Date: Tue, 1 Jul 2025 10:00:00 +0000\r\n",
            "\r\n",
            "Obrigado pela encomenda.\r\n",
        );
        let mapped = map_message(1, "INBOX", &raw(body.as_bytes()));

        assert_eq!(mapped.from_address.as_deref(), Some("ana@example.pt"));
        assert_eq!(mapped.from_name.as_deref(), Some("Ana Silva"));
        assert_eq!(mapped.to_addresses.as_deref(), Some("orders@example.pt"));
        assert_eq!(mapped.subject.as_deref(), Some("Encomenda 42"));
        assert_eq!(mapped.message_id.as_deref(), Some("abc123@example.pt"));
        // no reply lineage: the message's own id is the thread
        assert_eq!(mapped.thread_id, "abc123@example.pt");
        assert!(mapped
            .body_text
            .as_deref()
            .unwrap()
            .contains("Obrigado pela encomenda"));
        assert!(!mapped.has_attachments);
        assert_eq!(mapped.attachment_count, 0);
        assert_eq!(mapped.received_at, "2025-07-01T10:00:00+00:00");
    }

    #[test]
    fn decodes_encoded_word_subject() {
        let body = concat!(
            "From: ana@example.pt\r\n",
            "Subject: =?UTF-8?B?T2zDoSBNdW5kbw==?=\r\n",
            "\r\n",
            "hi\r\n",
        );
        let mapped = map_message(1, "INBOX", &raw(body.as_bytes()));
        assert_eq!(mapped.subject.as_deref(), Some("Olá Mundo"));
    }

    #[test]
    fn splits_multipart_and_extracts_attachment_metadata() {
        let body = concat!(
            "From: ana@example.pt\r\n",
            "Subject: fatura\r\n",
            "MIME-Version: 1.0\r\n",
            "Content-Type: multipart/mixed; boundary=\"outer\"\r\n",
            "\r\n",
            "--outer\r\n",
            "Content-Type: multipart/alternative; boundary=\"inner\"\r\n",
            "\r\n",
            "--inner\r\n",
            "Content-Type: text/plain\r\n",
            "\r\n",
            "plain body\r\n",
            "--inner\r\n",
            "Content-Type: text/html\r\n",
            "\r\n",
            "<p>html body</p>\r\n",
            "--inner--\r\n",
            "--outer\r\n",
            "Content-Type: application/pdf; name=\"invoice.pdf\"\r\n",
            "Content-Disposition: attachment; filename=\"invoice.pdf\"\r\n",
            "Content-Transfer-Encoding: base64\r\n",
            "\r\n",
            "JVBERi0xLjQ=\r\n",
            "--outer--\r\n",
        );
        let mapped = map_message(1, "INBOX", &raw(body.as_bytes()));

        assert!(mapped.body_text.as_deref().unwrap().contains("plain body"));
        assert!(mapped.body_html.as_deref().unwrap().contains("html body"));
        assert!(mapped.has_attachments);
        assert_eq!(mapped.attachment_count, 1);

        let metas: Vec<AttachmentMeta> =
            serde_json::from_str(mapped.attachments_json.as_deref().unwrap()).unwrap();
        assert_eq!(metas.len(), 1);
        assert_eq!(metas[0].filename, "invoice.pdf");
        assert_eq!(metas[0].content_type, "application/pdf");
        assert!(metas[0].size > 0);
    }

    #[test]
    fn thread_id_prefers_reference_root() {
        let body = concat!(
            "From: ana@example.pt\r\n",
            "Subject: Re: fio\r\n",
            "Message-ID: <m3@example.pt>\r\n",
            "In-Reply-To: <m2@example.pt>\r\n",
            "References: <m1@example.pt> <m2@example.pt>\r\n",
            "\r\n",
            "resposta\r\n",
        );
        let mapped = map_message(1, "INBOX", &raw(body.as_bytes()));

        assert_eq!(mapped.thread_id, "m1@example.pt");
        assert_eq!(mapped.in_reply_to.as_deref(), Some("m2@example.pt"));
        assert_eq!(
            mapped.references.as_deref(),
            Some("m1@example.pt m2@example.pt")
        );
    }

    #[test]
    fn thread_id_falls_back_to_in_reply_to() {
        let body = concat!(
            "From: ana@example.pt\r\n",
            "Message-ID: <m2@example.pt>\r\n",
            "In-Reply-To: <m1@example.pt>\r\n",
            "\r\n",
            "resposta\r\n",
        );
        let mapped = map_message(1, "INBOX", &raw(body.as_bytes()));
        assert_eq!(mapped.thread_id, "m1@example.pt");
    }

    #[test]
    fn malformed_input_degrades_without_panic() {
        let mapped = map_message(1, "INBOX", &raw(&[0xff, 0xfe, 0x00, 0x13, 0x37]));

        assert_eq!(mapped.message_id, None);
        // synthetic per-message thread id
        assert_eq!(mapped.thread_id, "7@INBOX");
        assert!(!mapped.has_attachments);
    }

    #[test]
    fn server_flags_carry_over() {
        let mut r = raw(b"Subject: x\r\n\r\nbody\r\n");
        r.flags = FlagSet {
            seen: true,
            flagged: true,
            answered: false,
            draft: false,
        };
        let mapped = map_message(1, "INBOX", &r);
        assert!(mapped.is_read);
        assert!(mapped.is_flagged);
        assert!(!mapped.is_answered);
        assert!(!mapped.is_draft);
    }
}

//! Bounded, read-only retrieval of raw messages from a selected folder.

use anyhow::Result;
use async_imap::types::Flag;
use chrono::{DateTime, FixedOffset, Utc};

use super::conn::ImapSession;

const FETCH_CHUNK: usize = 50;
const FETCH_ITEMS: &str = "(UID FLAGS INTERNALDATE RFC822.SIZE BODY.PEEK[])";

/// Server-side flags that map onto the local state booleans.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlagSet {
    pub seen: bool,
    pub flagged: bool,
    pub answered: bool,
    pub draft: bool,
}

#[derive(Debug, Clone)]
pub struct RawMessage {
    pub uid: u32,
    pub flags: FlagSet,
    pub internal_date: Option<DateTime<FixedOffset>>,
    pub size: Option<u32>,
    pub body: Vec<u8>,
}

/// Fetch up to `limit` messages from the currently selected folder. With a
/// watermark, the search window is `SINCE <date>` (IMAP SINCE is
/// date-granular; the store's uniqueness constraint absorbs the overlap),
/// otherwise `ALL`. Pure read - no local side effects, no deduplication.
pub async fn fetch_batch(
    session: &mut ImapSession,
    limit: usize,
    since: Option<DateTime<Utc>>,
) -> Result<Vec<RawMessage>> {
    let query = match since {
        Some(ts) => format!("SINCE {}", ts.format("%d-%b-%Y")),
        None => "ALL".to_string(),
    };

    let mut uids = session.uid_search(&query).await?;
    if uids.is_empty() {
        return Ok(Vec::new());
    }
    uids.sort_unstable();

    // Highest UIDs are the most recently delivered; the limit keeps the
    // newest ones.
    let start = uids.len().saturating_sub(limit);
    let wanted = &uids[start..];

    tracing::debug!(
        query = %query,
        matched = uids.len(),
        fetching = wanted.len(),
        "fetch_batch resolved uid window"
    );

    let mut out = Vec::with_capacity(wanted.len());
    for chunk in wanted.chunks(FETCH_CHUNK) {
        let uid_set = chunk
            .iter()
            .map(|u| u.to_string())
            .collect::<Vec<_>>()
            .join(",");
        let fetches = session.uid_fetch_collect(&uid_set, FETCH_ITEMS).await?;
        for f in fetches {
            let uid = match f.uid {
                Some(u) => u,
                None => continue,
            };
            let mut flags = FlagSet::default();
            for flag in f.flags() {
                match flag {
                    Flag::Seen => flags.seen = true,
                    Flag::Flagged => flags.flagged = true,
                    Flag::Answered => flags.answered = true,
                    Flag::Draft => flags.draft = true,
                    _ => {}
                }
            }
            let body = f.body().map(|b| b.to_vec()).unwrap_or_default();
            out.push(RawMessage {
                uid,
                flags,
                internal_date: f.internal_date(),
                size: f.size,
                body,
            });
        }
    }
    Ok(out)
}

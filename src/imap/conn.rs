//! One authenticated IMAP session per sync or reconcile attempt.
//!
//! All failure modes (DNS, TCP, TLS, auth, timeout) surface as an error from
//! `connect`; callers treat them identically and must call `logout` on every
//! exit path - IMAP servers cap concurrent sessions.

use anyhow::{anyhow, Context, Result};
use async_imap::types::Fetch;
use futures::StreamExt;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_native_tls::native_tls::TlsConnector;

use crate::models::account::ImapConfig;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

type TlsSession = async_imap::Session<tokio_native_tls::TlsStream<TcpStream>>;
type PlainSession = async_imap::Session<TcpStream>;

pub enum ImapSession {
    Tls(TlsSession),
    Plain(PlainSession),
}

macro_rules! with_session {
    ($self:expr, $s:ident => $body:expr) => {
        match $self {
            ImapSession::Tls($s) => $body,
            ImapSession::Plain($s) => $body,
        }
    };
}

pub async fn connect(config: &ImapConfig) -> Result<ImapSession> {
    let attempt = async {
        let tcp = TcpStream::connect((config.server.as_str(), config.port))
            .await
            .with_context(|| format!("tcp connect to {}:{}", config.server, config.port))?;
        if config.use_ssl || config.use_tls {
            let tls = TlsConnector::builder().build()?;
            let tls = tokio_native_tls::TlsConnector::from(tls);
            let tls_stream = tls
                .connect(&config.server, tcp)
                .await
                .with_context(|| format!("tls handshake with {}", config.server))?;
            let client = async_imap::Client::new(tls_stream);
            let session = client
                .login(&config.username, &config.password)
                .await
                .map_err(|(e, _)| anyhow!("login failed: {:?}", e))?;
            Ok(ImapSession::Tls(session))
        } else {
            let client = async_imap::Client::new(tcp);
            let session = client
                .login(&config.username, &config.password)
                .await
                .map_err(|(e, _)| anyhow!("login failed: {:?}", e))?;
            Ok(ImapSession::Plain(session))
        }
    };
    timeout(CONNECT_TIMEOUT, attempt)
        .await
        .map_err(|_| anyhow!("connect to {}:{} timed out", config.server, config.port))?
}

impl ImapSession {
    /// Select a folder, returning the server-reported message count.
    pub async fn select(&mut self, folder: &str) -> Result<u32> {
        with_session!(self, s => {
            let mailbox = s
                .select(folder)
                .await
                .with_context(|| format!("select folder {folder}"))?;
            Ok(mailbox.exists)
        })
    }

    pub async fn uid_search(&mut self, query: &str) -> Result<Vec<u32>> {
        with_session!(self, s => {
            let uids = s.uid_search(query).await?;
            Ok(uids.into_iter().collect())
        })
    }

    /// Fetch and drain the response stream. Per-item protocol errors are
    /// logged and skipped so one bad message never sinks the batch.
    pub async fn uid_fetch_collect(&mut self, uid_set: &str, items: &str) -> Result<Vec<Fetch>> {
        with_session!(self, s => {
            let mut stream = s.uid_fetch(uid_set, items).await?;
            let mut out = Vec::new();
            while let Some(item) = stream.next().await {
                match item {
                    Ok(f) => out.push(f),
                    Err(e) => tracing::warn!(error = %e, "fetch item error, skipping"),
                }
            }
            Ok(out)
        })
    }

    pub async fn uid_store(&mut self, uid_set: &str, flags: &str) -> Result<()> {
        with_session!(self, s => {
            let mut stream = s.uid_store(uid_set, flags).await?;
            while let Some(item) = stream.next().await {
                let _ = item;
            }
            Ok(())
        })
    }

    /// UID MOVE, falling back to COPY + \Deleted + EXPUNGE for servers
    /// without the MOVE capability.
    pub async fn uid_mv(&mut self, uid_set: &str, folder: &str) -> Result<()> {
        with_session!(self, s => {
            if s.uid_mv(uid_set, folder).await.is_ok() {
                return Ok(());
            }
            s.uid_copy(uid_set, folder).await?;
            let mut store = s.uid_store(uid_set, "+FLAGS (\\Deleted)").await?;
            while let Some(item) = store.next().await {
                let _ = item;
            }
            drop(store);
            let expunge = s.expunge().await?;
            futures::pin_mut!(expunge);
            while let Some(item) = expunge.next().await {
                let _ = item;
            }
            Ok(())
        })
    }

    pub async fn expunge(&mut self) -> Result<()> {
        with_session!(self, s => {
            let stream = s.expunge().await?;
            futures::pin_mut!(stream);
            while let Some(item) = stream.next().await {
                let _ = item;
            }
            Ok(())
        })
    }

    /// Best-effort; safe to call on an already-broken session.
    pub async fn logout(&mut self) {
        with_session!(self, s => {
            let _ = s.logout().await;
        })
    }
}

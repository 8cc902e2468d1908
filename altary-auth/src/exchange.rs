//! Obtaining a token from a browser sign-in.
//!
//! A [`TokenExchange`] starts an attempt and hands back a [`PendingExchange`]
//! that the flow polls until the service issues a token, refuses, or the
//! flow's deadline passes.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use altary_types::{AltaryError, Token};
use async_trait::async_trait;
use reqwest::Url;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::{JoinHandle, JoinSet};

/// Result of one poll of a pending exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeStatus {
    /// Nothing yet; poll again later.
    Pending,
    /// The service issued a token.
    Ready(Token),
    /// The sign-in was refused, with the reason reported by the service.
    Rejected(String),
}

/// Starts browser sign-in attempts.
#[async_trait]
pub trait TokenExchange: Send + Sync {
    /// Start an attempt against the service at `api_base_url`.
    ///
    /// # Errors
    ///
    /// [`AltaryError::Transport`] when the attempt cannot be set up.
    async fn begin(&self, api_base_url: &str) -> Result<Box<dyn PendingExchange>, AltaryError>;
}

/// An attempt in progress. Dropping it releases whatever it holds.
#[async_trait]
pub trait PendingExchange: Send {
    /// URL the user opens to sign in.
    fn auth_url(&self) -> &str;

    /// Check once whether the attempt has finished. Must not block.
    ///
    /// # Errors
    ///
    /// [`AltaryError::Transport`] when the attempt can no longer be observed.
    async fn poll(&mut self) -> Result<ExchangeStatus, AltaryError>;
}

/// Receives the token on a loopback HTTP listener.
///
/// The sign-in page is opened with `callback=http://localhost:{port}/callback`;
/// once the user approves, the service redirects the browser there with
/// `?token=...` (or `?error=...`). The first callback request settles the
/// attempt; the listener keeps answering until the attempt is dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoopbackExchange;

impl LoopbackExchange {
    /// Create a loopback exchange.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TokenExchange for LoopbackExchange {
    async fn begin(&self, api_base_url: &str) -> Result<Box<dyn PendingExchange>, AltaryError> {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
            .await
            .map_err(|e| AltaryError::Transport(Box::new(e)))?;
        let port = listener
            .local_addr()
            .map_err(|e| AltaryError::Transport(Box::new(e)))?
            .port();

        let callback = format!("http://localhost:{port}/callback");
        let auth_url = callback_auth_url(api_base_url, &callback)?;
        tracing::debug!(port, "callback listener bound");

        let (tx, rx) = oneshot::channel();
        let task = tokio::spawn(serve_callback(listener, tx));
        Ok(Box::new(LoopbackPending { auth_url, rx, task }))
    }
}

struct LoopbackPending {
    auth_url: String,
    rx: oneshot::Receiver<Result<Token, String>>,
    task: JoinHandle<()>,
}

#[async_trait]
impl PendingExchange for LoopbackPending {
    fn auth_url(&self) -> &str {
        &self.auth_url
    }

    async fn poll(&mut self) -> Result<ExchangeStatus, AltaryError> {
        match self.rx.try_recv() {
            Ok(Ok(token)) => Ok(ExchangeStatus::Ready(token)),
            Ok(Err(reason)) => Ok(ExchangeStatus::Rejected(reason)),
            Err(oneshot::error::TryRecvError::Empty) => Ok(ExchangeStatus::Pending),
            Err(oneshot::error::TryRecvError::Closed) => Err(AltaryError::Transport(
                "callback listener stopped before receiving a token".into(),
            )),
        }
    }
}

impl Drop for LoopbackPending {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// `{base}/users/claude-auth?callback={callback}`.
fn callback_auth_url(api_base_url: &str, callback: &str) -> Result<String, AltaryError> {
    let mut url = Url::parse(&crate::flow::auth_page_url(api_base_url)).map_err(|e| {
        AltaryError::InvalidInput(format!("invalid API base URL {api_base_url:?}: {e}"))
    })?;
    url.query_pairs_mut().append_pair("callback", callback);
    Ok(url.into())
}

const MAX_REQUEST_HEAD: usize = 16 * 1024;

/// How long a connection may take to send its request head.
const REQUEST_READ_TIMEOUT: Duration = Duration::from_secs(5);

const SUCCESS_PAGE: &str = concat!(
    "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>Altary</title></head>",
    "<body><h1>Authentication complete</h1>",
    "<p>You can close this window and return to your assistant.</p></body></html>",
);

const FAILURE_PAGE: &str = concat!(
    "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>Altary</title></head>",
    "<body><h1>Authentication failed</h1>",
    "<p>Return to your assistant and try again.</p></body></html>",
);

type CallbackSlot = Arc<Mutex<Option<oneshot::Sender<Result<Token, String>>>>>;

/// Accept connections until the attempt is dropped. Each connection is
/// served on its own task so an idle socket cannot hold up the callback.
async fn serve_callback(listener: TcpListener, tx: oneshot::Sender<Result<Token, String>>) {
    let slot: CallbackSlot = Arc::new(Mutex::new(Some(tx)));
    let mut connections = JoinSet::new();
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!(error = %e, "callback listener failed");
                return;
            }
        };
        while connections.try_join_next().is_some() {}
        connections.spawn(serve_connection(stream, peer, Arc::clone(&slot)));
    }
}

async fn serve_connection(mut stream: TcpStream, peer: SocketAddr, slot: CallbackSlot) {
    let read = tokio::time::timeout(REQUEST_READ_TIMEOUT, read_request_target(&mut stream)).await;
    let target = match read {
        Ok(Ok(Some(target))) => target,
        Ok(Ok(None)) => {
            respond(&mut stream, "400 Bad Request", "").await;
            return;
        }
        Ok(Err(e)) => {
            tracing::debug!(error = %e, %peer, "unreadable callback request");
            return;
        }
        Err(_) => {
            tracing::debug!(%peer, "callback connection idle, closing");
            return;
        }
    };

    let Some(outcome) = parse_callback(&target) else {
        respond(&mut stream, "404 Not Found", "").await;
        return;
    };

    let page = if outcome.is_ok() { SUCCESS_PAGE } else { FAILURE_PAGE };
    let tx = slot.lock().ok().and_then(|mut tx| tx.take());
    match tx {
        Some(tx) => {
            if tx.send(outcome).is_err() {
                tracing::debug!("callback arrived after the attempt was abandoned");
            }
        }
        None => tracing::debug!(%peer, "duplicate callback ignored"),
    }
    respond(&mut stream, "200 OK", page).await;
}

/// Read the request head and return the target of a `GET`.
async fn read_request_target(stream: &mut TcpStream) -> std::io::Result<Option<String>> {
    let mut head = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        head.extend_from_slice(&chunk[..n]);
        if head.windows(4).any(|w| w == b"\r\n\r\n") || head.len() > MAX_REQUEST_HEAD {
            break;
        }
    }

    let head = String::from_utf8_lossy(&head);
    let mut parts = head.lines().next().unwrap_or_default().split_whitespace();
    match (parts.next(), parts.next()) {
        (Some("GET"), Some(target)) => Ok(Some(target.to_string())),
        _ => Ok(None),
    }
}

/// Interpret a request target. `None` when it is not the callback path.
fn parse_callback(target: &str) -> Option<Result<Token, String>> {
    let url = Url::parse(&format!("http://localhost{target}")).ok()?;
    if url.path() != "/callback" {
        return None;
    }

    let mut token = None;
    let mut error = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "token" => token = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }

    Some(match (error, token.and_then(Token::new)) {
        (Some(error), _) => Err(error),
        (None, Some(token)) => Ok(token),
        (None, None) => Err("callback did not include a token".to_string()),
    })
}

async fn respond(stream: &mut TcpStream, status: &str, body: &str) {
    let response = format!(
        "HTTP/1.1 {status}\r\n\
         Content-Type: text/html; charset=utf-8\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\r\n{body}",
        body.len()
    );
    if let Err(e) = stream.write_all(response.as_bytes()).await {
        tracing::debug!(error = %e, "failed to answer callback request");
    }
    let _ = stream.shutdown().await;
}

//! Ledger peer session
//!
//! Maintains one WebSocket connection to the ledger peer. A background pump
//! task owns both halves of the socket and processes requests strictly one
//! at a time: each request is sent and its reply awaited before the next is
//! taken off the queue, so a pooled session never has two submissions in
//! flight.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, RwLock};
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, warn};

use super::LedgerTransport;
use crate::types::{ConnectReason, GatewayError, Result};

/// Transport-level failure, classified by the caller: during the bind
/// handshake these become `ConnectionError`s, during submission they become
/// `SubmissionError`s (a lost or timed-out submission is an unknown outcome,
/// surfaced as `commit_timeout`).
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    #[error("request timed out")]
    TimedOut,
    #[error("session closed: {0}")]
    Closed(String),
}

enum Command {
    Request {
        payload: Vec<u8>,
        reply: oneshot::Sender<Vec<u8>>,
    },
    Close,
}

/// One live connection to the ledger peer
pub struct LedgerSession {
    tx: mpsc::Sender<Command>,
    connected: Arc<RwLock<bool>>,
    next_id: AtomicU64,
}

impl LedgerSession {
    /// Open a WebSocket connection to the peer and start the pump task
    pub async fn connect(url: &str) -> Result<Self> {
        let (ws, _) = connect_async(url).await.map_err(|e| {
            GatewayError::Connection(ConnectReason::NetworkUnreachable(e.to_string()))
        })?;

        let (tx, rx) = mpsc::channel::<Command>(64);
        let connected = Arc::new(RwLock::new(true));

        let flag = Arc::clone(&connected);
        let peer = url.to_string();
        tokio::spawn(async move {
            pump(ws, rx, flag, peer).await;
        });

        Ok(Self {
            tx,
            connected,
            next_id: AtomicU64::new(1),
        })
    }
}

#[async_trait]
impl LedgerTransport for LedgerSession {
    async fn request(
        &self,
        payload: Vec<u8>,
        timeout_ms: u64,
    ) -> std::result::Result<Vec<u8>, SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();

        self.tx
            .send(Command::Request {
                payload,
                reply: reply_tx,
            })
            .await
            .map_err(|_| SessionError::Closed("session task ended".to_string()))?;

        match timeout(Duration::from_millis(timeout_ms), reply_rx).await {
            Ok(Ok(data)) => Ok(data),
            Ok(Err(_)) => Err(SessionError::Closed(
                "connection lost mid-request".to_string(),
            )),
            Err(_) => {
                // The session may still deliver a late reply into the void;
                // mark it unusable so the pool evicts and closes it.
                *self.connected.write().await = false;
                Err(SessionError::TimedOut)
            }
        }
    }

    async fn is_connected(&self) -> bool {
        *self.connected.read().await
    }

    async fn close(&self) {
        *self.connected.write().await = false;
        let _ = self.tx.send(Command::Close).await;
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

/// Pump task: owns the socket, answers pings, and completes one request at
/// a time until the command channel closes or the peer goes away.
async fn pump(
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    mut rx: mpsc::Receiver<Command>,
    connected: Arc<RwLock<bool>>,
    peer: String,
) {
    let (mut sink, mut stream) = ws.split();

    'commands: while let Some(cmd) = rx.recv().await {
        let (payload, reply) = match cmd {
            Command::Close => break,
            Command::Request { payload, reply } => (payload, reply),
        };

        if let Err(e) = sink.send(Message::Binary(payload)).await {
            error!(peer = %peer, error = %e, "failed to send to ledger peer");
            break;
        }

        // Wait for the reply to this request, answering pings in between
        loop {
            match stream.next().await {
                Some(Ok(Message::Binary(data))) => {
                    let _ = reply.send(data);
                    break;
                }
                Some(Ok(Message::Ping(data))) => {
                    let _ = sink.send(Message::Pong(data)).await;
                }
                Some(Ok(Message::Close(frame))) => {
                    debug!(peer = %peer, frame = ?frame, "ledger peer closed connection");
                    break 'commands;
                }
                Some(Err(e)) => {
                    error!(peer = %peer, error = %e, "ledger peer socket error");
                    break 'commands;
                }
                None => {
                    warn!(peer = %peer, "ledger peer stream ended");
                    break 'commands;
                }
                _ => {}
            }
        }
    }

    *connected.write().await = false;
    let _ = sink.send(Message::Close(None)).await;
    debug!(peer = %peer, "ledger session closed");
}

//! WebSocket upgrade handler and per-socket loop.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::http::{HeaderMap, header};
use axum::response::Response;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use relay_core::error::{AppError, AuthFailure};
use relay_core::types::id::ConnectionId;
use relay_realtime::connection::{ConnectionHandle, Transport};
use relay_realtime::message::OutboundMessage;
use relay_realtime::GatewaySession;

use crate::error::ApiError;

/// Query parameters accepted on the upgrade request.
#[derive(Debug, Default, Deserialize)]
pub struct WsQuery {
    /// Bearer credential, as an alternative to the `Authorization` header.
    #[serde(default)]
    pub token: Option<String>,
}

/// Tears the connection down when dropped, whether or not the upgrade ran.
struct ConnectionGuard {
    session: Arc<GatewaySession>,
    conn_id: ConnectionId,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.session.disconnect(&self.conn_id, "connection closed");
    }
}

/// GET {ws_path}?token=...: authenticate, admit, then upgrade.
pub async fn ws_upgrade(
    State(session): State<Arc<GatewaySession>>,
    Query(query): Query<WsQuery>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let credential = credential_from(&query, &headers).ok_or_else(|| {
        AppError::from(AuthFailure::Format("no credential presented".into()))
    })?;

    let buffer = session.admission().config().channel_buffer_size;
    let (transport, outbound_rx) = Transport::new(buffer);
    let handle = session.open(&credential, transport).await?;

    let guard = ConnectionGuard {
        session: session.clone(),
        conn_id: handle.id,
    };
    Ok(ws.on_upgrade(move |socket| run_socket(session, handle, outbound_rx, socket, guard)))
}

fn credential_from(query: &WsQuery, headers: &HeaderMap) -> Option<String> {
    query
        .token
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .or_else(|| {
            headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(String::from)
        })
}

async fn run_socket(
    session: Arc<GatewaySession>,
    handle: Arc<ConnectionHandle>,
    outbound_rx: mpsc::Receiver<OutboundMessage>,
    socket: WebSocket,
    guard: ConnectionGuard,
) {
    let conn_id = handle.id;
    let cancel = handle.transport().cancellation().clone();
    let (ws_tx, mut ws_rx) = socket.split();

    info!(
        conn_id = %conn_id,
        identity_id = %handle.identity.id,
        "WebSocket connection established"
    );

    let writer = tokio::spawn(forward_outbound(ws_tx, outbound_rx, cancel.clone()));

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            frame = ws_rx.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    session.handle_inbound(&conn_id, text.as_str()).await;
                }
                Some(Ok(Message::Binary(_))) => {
                    handle.send(OutboundMessage::error(
                        "INVALID_MESSAGE",
                        "binary frames are not supported",
                    ));
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => handle.touch(),
                Some(Err(e)) => {
                    warn!(conn_id = %conn_id, error = %e, "WebSocket error");
                    break;
                }
            }
        }
    }

    handle.transport().mark_disconnected();
    if writer.await.is_err() {
        debug!(conn_id = %conn_id, "Writer task aborted");
    }
    drop(guard);

    info!(
        conn_id = %conn_id,
        identity_id = %handle.identity.id,
        "WebSocket connection closed"
    );
}

/// Writes queued frames until the connection is cancelled, then flushes
/// whatever is still queued and sends a close frame.
async fn forward_outbound(
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut outbound_rx: mpsc::Receiver<OutboundMessage>,
    cancel: tokio_util::sync::CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            msg = outbound_rx.recv() => match msg {
                Some(msg) => {
                    if write_frame(&mut ws_tx, &msg).await.is_err() {
                        return;
                    }
                }
                None => break,
            },
            _ = cancel.cancelled() => {
                while let Ok(msg) = outbound_rx.try_recv() {
                    if write_frame(&mut ws_tx, &msg).await.is_err() {
                        return;
                    }
                }
                break;
            }
        }
    }
    let _ = ws_tx.send(Message::Close(None)).await;
}

async fn write_frame(
    ws_tx: &mut SplitSink<WebSocket, Message>,
    msg: &OutboundMessage,
) -> Result<(), axum::Error> {
    match msg.to_json() {
        Ok(text) => ws_tx.send(Message::Text(text.into())).await,
        Err(e) => {
            warn!(error = %e, "Failed to serialize outbound frame");
            Ok(())
        }
    }
}

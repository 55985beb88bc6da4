//! The chat socket.
//!
//! A connection is authenticated before the upgrade, registered with the
//! presence registry once open, and removed again exactly once however it
//! ends: a `{disconnect: true}` frame, a close frame, a transport error, a
//! missed heartbeat, or replacement by a newer connection of the same user.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::HeaderMap,
    response::Response,
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use relaychat_auth::Identity;
use relaychat_chats::{ClientFrame, ConnectionHandle, ServerFrame};
use serde::Deserialize;
use tokio::sync::{mpsc, Notify};
use tokio::time::{interval_at, Instant};
use tracing::{debug, error, info, warn};

use crate::credentials::authenticate;
use crate::error::GatewayResult;
use crate::state::GatewayState;

/// Room for the JSON envelope around a base64 attachment.
const FRAME_OVERHEAD: usize = 64 * 1024;
const CLOSE_GRACE: Duration = Duration::from_secs(1);

pub fn create_websocket_routes() -> Router<Arc<GatewayState>> {
    Router::new().route("/ws", get(websocket_handler))
}

#[derive(Debug, Deserialize)]
pub struct WebSocketQuery {
    token: Option<String>,
}

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<GatewayState>>,
    Query(params): Query<WebSocketQuery>,
    headers: HeaderMap,
) -> GatewayResult<Response> {
    let identity = authenticate(&state, &headers, params.token.as_deref()).map_err(|error| {
        warn!(%error, "rejecting websocket upgrade");
        error
    })?;

    let frame_limit = max_frame_size(state.attachments().max_bytes());
    Ok(ws
        .max_message_size(frame_limit)
        .max_frame_size(frame_limit)
        .on_upgrade(move |socket| handle_socket(socket, state, identity)))
}

fn max_frame_size(max_attachment_bytes: u64) -> usize {
    let encoded = max_attachment_bytes.saturating_add(2) / 3 * 4;
    usize::try_from(encoded)
        .unwrap_or(usize::MAX)
        .saturating_add(FRAME_OVERHEAD)
}

async fn handle_socket(socket: WebSocket, state: Arc<GatewayState>, identity: Identity) {
    let (mut ws_sender, mut receiver) = socket.split();

    let (out_tx, mut out_rx) = mpsc::channel::<ServerFrame>(state.websocket.outbound_buffer.max(1));
    let handle = ConnectionHandle::new(identity.clone(), out_tx);
    let connection_id = handle.connection_id();
    let closing = Arc::new(Notify::new());

    state.presence().add(handle.clone()).await;

    let ping_every = Duration::from_secs(state.websocket.ping_interval_seconds.max(1));
    let sender_handle = handle.clone();
    let sender_closing = closing.clone();
    let mut sender_task = tokio::spawn(async move {
        let mut heartbeat = interval_at(Instant::now() + ping_every, ping_every);
        loop {
            tokio::select! {
                frame = out_rx.recv() => {
                    let Some(frame) = frame else { break };
                    let json = match serde_json::to_string(&frame) {
                        Ok(json) => json,
                        Err(error) => {
                            error!(?error, "failed to encode server frame");
                            continue;
                        }
                    };
                    if let Err(error) = ws_sender.send(Message::Text(json)).await {
                        debug!(%error, "websocket send failed");
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if !sender_handle.take_alive() {
                        info!(user = %sender_handle.identity().id, "peer missed heartbeat, closing");
                        break;
                    }
                    if ws_sender.send(Message::Ping(Vec::new())).await.is_err() {
                        break;
                    }
                }
                _ = sender_handle.evicted() => {
                    let _ = ws_sender
                        .send(Message::Close(Some(CloseFrame {
                            code: close_code::POLICY,
                            reason: "replaced by a newer connection".into(),
                        })))
                        .await;
                    break;
                }
                _ = sender_closing.notified() => {
                    let _ = ws_sender.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    });

    let receiver_state = state.clone();
    let receiver_handle = handle.clone();
    let mut receiver_task = tokio::spawn(async move {
        while let Some(message) = receiver.next().await {
            let message = match message {
                Ok(message) => message,
                Err(error) => {
                    debug!(%error, user = %receiver_handle.identity().id, "websocket receive failed");
                    break;
                }
            };
            receiver_handle.mark_alive();

            match message {
                Message::Text(text) => {
                    // Pongs queue up unread while a large attachment is stored.
                    let _busy = receiver_handle.busy();
                    if handle_text(&receiver_state, &receiver_handle, &text).await.is_break() {
                        break;
                    }
                }
                Message::Binary(_) => {
                    warn!(user = %receiver_handle.identity().id, "binary frame dropped");
                    receiver_handle.send(ServerFrame::error("binary frames are not supported"));
                }
                Message::Close(_) => break,
                Message::Ping(_) | Message::Pong(_) => {}
            }
        }
    });

    tokio::select! {
        _ = &mut sender_task => receiver_task.abort(),
        _ = &mut receiver_task => {
            closing.notify_one();
            if tokio::time::timeout(CLOSE_GRACE, &mut sender_task).await.is_err() {
                sender_task.abort();
            }
        }
    }

    state.presence().remove(&identity.id, connection_id).await;
    info!(user = %identity.id, connection = %connection_id, "websocket closed");
}

async fn handle_text(state: &GatewayState, handle: &ConnectionHandle, text: &str) -> ControlFlow<()> {
    let frame = match ClientFrame::parse(text) {
        Ok(frame) => frame,
        Err(error) => {
            warn!(user = %handle.identity().id, %error, "dropping malformed frame");
            handle.send(ServerFrame::error("malformed frame"));
            return ControlFlow::Continue(());
        }
    };

    match frame {
        ClientFrame::Disconnect => {
            info!(user = %handle.identity().id, "client announced disconnect");
            state
                .presence()
                .remove(&handle.identity().id, handle.connection_id())
                .await;
            ControlFlow::Break(())
        }
        ClientFrame::Message(outgoing) => {
            if let Err(error) = state.relay.relay(handle.identity(), outgoing).await {
                if error.is_client_error() {
                    warn!(user = %handle.identity().id, %error, "message rejected");
                } else {
                    error!(user = %handle.identity().id, %error, "message relay failed");
                }
                handle.send(ServerFrame::error(error.to_string()));
            }
            ControlFlow::Continue(())
        }
    }
}

//! A long-lived chat socket that reconnects when the connection drops.

use std::collections::VecDeque;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use relaychat_chats::{ClientFrame, DeliveredMessage, OutgoingMessage, PresenceEntry, ServerFrame};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header::AUTHORIZATION, HeaderValue, StatusCode};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::backoff::ReconnectPolicy;
use crate::error::ClientError;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone)]
pub enum ClientCommand {
    Send(OutgoingMessage),
    /// Announce the disconnect to the server and stop.
    Quit,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Connected,
    Presence(Vec<PresenceEntry>),
    Message(DeliveredMessage),
    ServerError(String),
    /// The socket is gone; the next attempt happens after `retry_in`.
    Disconnected { retry_in: Duration },
}

impl From<ServerFrame> for ClientEvent {
    fn from(frame: ServerFrame) -> Self {
        match frame {
            ServerFrame::Presence { online } => ClientEvent::Presence(online),
            ServerFrame::Message(message) => ClientEvent::Message(message),
            ServerFrame::Error { error } => ClientEvent::ServerError(error),
        }
    }
}

enum SessionEnd {
    Quit,
    Dropped,
}

pub struct ChatSession {
    url: String,
    token: String,
    policy: ReconnectPolicy,
}

impl ChatSession {
    pub fn new(url: impl Into<String>, token: impl Into<String>, policy: ReconnectPolicy) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
            policy,
        }
    }

    /// Drive the session until `Quit`, until either channel closes, or until
    /// the reconnect policy gives up.
    ///
    /// Messages sent while disconnected are queued and flushed after the
    /// next successful connect. A rejected token ends the session instead of
    /// retrying.
    pub async fn run(
        &self,
        mut commands: mpsc::Receiver<ClientCommand>,
        events: mpsc::Sender<ClientEvent>,
    ) -> Result<(), ClientError> {
        let mut backoff = self.policy.backoff();
        let mut pending = VecDeque::new();

        loop {
            match self.connect().await {
                Ok(socket) => {
                    backoff.reset();
                    info!(url = %self.url, "chat socket connected");
                    if events.send(ClientEvent::Connected).await.is_err() {
                        return Ok(());
                    }
                    if let SessionEnd::Quit = pump(socket, &mut commands, &events, &mut pending).await? {
                        return Ok(());
                    }
                }
                Err(ClientError::WebSocket(WsError::Http(response)))
                    if response.status() == StatusCode::UNAUTHORIZED =>
                {
                    return Err(ClientError::Unauthorized);
                }
                Err(error) => warn!(%error, url = %self.url, "connection attempt failed"),
            }

            let Some(delay) = backoff.next_delay() else {
                return Err(ClientError::ReconnectExhausted {
                    attempts: backoff.attempts(),
                });
            };
            info!(delay_ms = delay.as_millis() as u64, "reconnecting after delay");
            if events.send(ClientEvent::Disconnected { retry_in: delay }).await.is_err() {
                return Ok(());
            }

            let wait = sleep(delay);
            tokio::pin!(wait);
            loop {
                tokio::select! {
                    _ = &mut wait => break,
                    command = commands.recv() => match command {
                        Some(ClientCommand::Send(message)) => pending.push_back(message),
                        Some(ClientCommand::Quit) | None => return Ok(()),
                    },
                }
            }
        }
    }

    async fn connect(&self) -> Result<Socket, ClientError> {
        let mut request = self.url.as_str().into_client_request()?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.token))
            .map_err(|_| ClientError::Unauthorized)?;
        request.headers_mut().insert(AUTHORIZATION, bearer);

        let (socket, _) = connect_async(request).await?;
        Ok(socket)
    }
}

async fn pump(
    socket: Socket,
    commands: &mut mpsc::Receiver<ClientCommand>,
    events: &mpsc::Sender<ClientEvent>,
    pending: &mut VecDeque<OutgoingMessage>,
) -> Result<SessionEnd, ClientError> {
    let (mut sink, mut stream) = socket.split();

    while let Some(message) = pending.pop_front() {
        let text = serde_json::to_string(&ClientFrame::Message(message.clone()))?;
        if let Err(error) = sink.send(Message::Text(text)).await {
            debug!(%error, "flush failed, keeping message queued");
            pending.push_front(message);
            return Ok(SessionEnd::Dropped);
        }
    }

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(ClientCommand::Send(message)) => {
                    let text = serde_json::to_string(&ClientFrame::Message(message.clone()))?;
                    if let Err(error) = sink.send(Message::Text(text)).await {
                        debug!(%error, "send failed, queueing message for reconnect");
                        pending.push_back(message);
                        return Ok(SessionEnd::Dropped);
                    }
                }
                Some(ClientCommand::Quit) | None => {
                    let sentinel = serde_json::to_string(&ClientFrame::Disconnect)?;
                    let _ = sink.send(Message::Text(sentinel)).await;
                    let _ = sink.close().await;
                    info!("chat session closed by client");
                    return Ok(SessionEnd::Quit);
                }
            },
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Text(text))) => match serde_json::from_str::<ServerFrame>(&text) {
                    Ok(frame) => {
                        if events.send(frame.into()).await.is_err() {
                            let _ = sink.close().await;
                            return Ok(SessionEnd::Quit);
                        }
                    }
                    Err(error) => warn!(%error, "ignoring unreadable server frame"),
                },
                Some(Ok(Message::Close(frame))) => {
                    info!(?frame, "server closed the chat socket");
                    return Ok(SessionEnd::Dropped);
                }
                Some(Ok(_)) => {}
                Some(Err(error)) => {
                    warn!(%error, "chat socket failed");
                    return Ok(SessionEnd::Dropped);
                }
                None => return Ok(SessionEnd::Dropped),
            },
        }
    }
}

use futures_util::{SinkExt, StreamExt};
use research_logging::{research_debug, research_info, research_trace, research_warn};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::frame::{initiation_frame, parse_frame};
use crate::{CloseReason, ConnectionId, EngineEvent, EngineSettings};

pub trait EventSink: Send + Sync {
    fn emit(&self, event: EngineEvent);
}

pub struct ChannelEventSink {
    tx: std::sync::mpsc::Sender<EngineEvent>,
}

impl ChannelEventSink {
    pub fn new(tx: std::sync::mpsc::Sender<EngineEvent>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelEventSink {
    fn emit(&self, event: EngineEvent) {
        let _ = self.tx.send(event);
    }
}

/// Runs one job connection from connect to close.
///
/// Implementations send `query` as the initiation frame once the connection
/// is ready, emit `Opened`, `Frame` and `Malformed` events through `sink`
/// while it is up, and return as soon as `cancel` fires. The returned reason
/// becomes the connection's single `Closed` event.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn run(
        &self,
        conn: ConnectionId,
        query: &str,
        sink: &dyn EventSink,
        cancel: CancellationToken,
    ) -> CloseReason;
}

#[derive(Debug, Clone)]
pub struct WsTransport {
    settings: EngineSettings,
}

impl WsTransport {
    pub fn new(settings: EngineSettings) -> Self {
        Self { settings }
    }
}

#[async_trait::async_trait]
impl Transport for WsTransport {
    async fn run(
        &self,
        conn: ConnectionId,
        query: &str,
        sink: &dyn EventSink,
        cancel: CancellationToken,
    ) -> CloseReason {
        let initiation = match initiation_frame(query) {
            Ok(text) => text,
            Err(err) => return CloseReason::Transport(err.to_string()),
        };

        let connect = tokio::time::timeout(
            self.settings.connect_timeout,
            tokio_tungstenite::connect_async(self.settings.ws_url.as_str()),
        );
        let mut socket = tokio::select! {
            _ = cancel.cancelled() => return CloseReason::Requested,
            result = connect => match result {
                Ok(Ok((socket, _response))) => socket,
                Ok(Err(err)) => return CloseReason::ConnectFailed(err.to_string()),
                Err(_) => return CloseReason::ConnectFailed("connect timed out".to_string()),
            },
        };
        research_info!("Connection {} established to {}", conn, self.settings.ws_url);

        if let Err(err) = socket.send(Message::text(initiation)).await {
            return CloseReason::Transport(err.to_string());
        }
        sink.emit(EngineEvent::Opened { conn });

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    if let Err(err) = socket.close(None).await {
                        research_debug!("Close handshake on connection {} failed: {}", conn, err);
                    }
                    return CloseReason::Requested;
                }
                next = socket.next() => match next {
                    Some(Ok(Message::Text(text))) => sink.emit(decode(conn, text.as_str())),
                    Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                        Ok(text) => sink.emit(decode(conn, text)),
                        Err(err) => sink.emit(EngineEvent::Malformed {
                            conn,
                            error: crate::FrameError::InvalidJson(err.to_string()),
                        }),
                    },
                    Some(Ok(Message::Close(_))) | None => return CloseReason::ServerClosed,
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        research_warn!("Connection {} read failed: {}", conn, err);
                        return CloseReason::Transport(err.to_string());
                    }
                },
            }
        }
    }
}

fn decode(conn: ConnectionId, text: &str) -> EngineEvent {
    research_trace!("Frame on connection {}: {}", conn, text);
    match parse_frame(text) {
        Ok(frame) => EngineEvent::Frame { conn, frame },
        Err(error) => {
            research_warn!("Malformed frame on connection {}: {}", conn, error);
            EngineEvent::Malformed { conn, error }
        }
    }
}

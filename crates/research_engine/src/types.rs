use std::fmt;

use crate::{FrameError, InboundFrame, ReportError};

/// Identity of one connection instance, assigned by the caller.
pub type ConnectionId = u64;

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Handshake done and the initiation frame was sent.
    Opened { conn: ConnectionId },
    Frame {
        conn: ConnectionId,
        frame: InboundFrame,
    },
    Malformed {
        conn: ConnectionId,
        error: FrameError,
    },
    /// Emitted exactly once per opened connection, last.
    Closed {
        conn: ConnectionId,
        reason: CloseReason,
    },
    ReportFetched { result: Result<String, ReportError> },
}

impl EngineEvent {
    pub fn conn(&self) -> Option<ConnectionId> {
        match self {
            EngineEvent::Opened { conn }
            | EngineEvent::Frame { conn, .. }
            | EngineEvent::Malformed { conn, .. }
            | EngineEvent::Closed { conn, .. } => Some(*conn),
            EngineEvent::ReportFetched { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The connection was closed on request (or its owner went away).
    Requested,
    /// The server sent a close frame or the stream ended.
    ServerClosed,
    ConnectFailed(String),
    Transport(String),
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::Requested => write!(f, "closed on request"),
            CloseReason::ServerClosed => write!(f, "closed by server"),
            CloseReason::ConnectFailed(detail) => write!(f, "connect failed: {detail}"),
            CloseReason::Transport(detail) => write!(f, "transport error: {detail}"),
        }
    }
}

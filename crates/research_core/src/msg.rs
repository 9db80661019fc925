use crate::{ConnectionId, Frame};

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// User submitted a research query. Replaces any running job.
    QuerySubmitted(String),
    /// Handshake finished and the initiation frame went out.
    ConnectionOpened { conn: ConnectionId },
    /// A validated frame arrived on `conn`.
    FrameReceived { conn: ConnectionId, frame: Frame },
    /// A frame on `conn` could not be parsed.
    FrameRejected { conn: ConnectionId, reason: String },
    /// The connection ended, for whatever reason.
    ConnectionClosed { conn: ConnectionId, cause: CloseCause },
    /// The client is going away.
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseCause {
    /// We asked for the close.
    Local,
    /// The server closed the connection or the stream ended.
    Remote,
    /// Connect or read failure.
    Transport(String),
}

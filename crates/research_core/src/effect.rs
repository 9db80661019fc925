use crate::ConnectionId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Open `conn` and send `query` as the initiation frame once it is ready.
    OpenConnection { conn: ConnectionId, query: String },
    /// Close `conn`. Closing an unknown or already closed connection is a no-op.
    CloseConnection { conn: ConnectionId },
}

//! Research engine: connection management, frame decoding and report fetching.
mod connection;
mod engine;
mod frame;
mod report;
mod settings;
mod types;

pub use connection::{ChannelEventSink, EventSink, Transport, WsTransport};
pub use engine::{EngineError, EngineHandle};
pub use frame::{initiation_frame, parse_frame, FrameError, InboundFrame, StepUpdate};
pub use report::{ReportClient, ReportError};
pub use settings::{EngineSettings, DEFAULT_REPORT_URL, DEFAULT_WS_URL};
pub use types::{CloseReason, ConnectionId, EngineEvent};

use research_core::{CloseCause, Effect, Frame, Msg, StepEvent};
use research_engine::{CloseReason, EngineEvent, EngineHandle, InboundFrame, ReportError};
use research_logging::research_info;

/// Executes core effects against the engine and turns engine events back
/// into core messages.
pub struct EffectRunner {
    engine: EngineHandle,
}

impl EffectRunner {
    pub fn new(engine: EngineHandle) -> Self {
        Self { engine }
    }

    pub fn enqueue(&self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::OpenConnection { conn, query } => {
                    research_info!("OpenConnection conn={} query_len={}", conn, query.len());
                    self.engine.open(conn, query);
                }
                Effect::CloseConnection { conn } => {
                    research_info!("CloseConnection conn={}", conn);
                    self.engine.close(conn);
                }
            }
        }
    }

    /// Next pending message from the engine, without blocking.
    pub fn poll(&self) -> Option<Msg> {
        while let Some(event) = self.engine.try_recv() {
            if let Some(msg) = map_event(event) {
                return Some(msg);
            }
        }
        None
    }

    pub fn fetch_report(&self, query: &str) {
        self.engine.fetch_report(query);
    }

    pub fn wait_report(&self, poll: std::time::Duration) -> Option<Result<String, ReportError>> {
        match self.engine.recv_timeout(poll)? {
            EngineEvent::ReportFetched { result } => Some(result),
            _ => None,
        }
    }
}

pub fn map_event(event: EngineEvent) -> Option<Msg> {
    let msg = match event {
        EngineEvent::Opened { conn } => Msg::ConnectionOpened { conn },
        EngineEvent::Frame { conn, frame } => Msg::FrameReceived {
            conn,
            frame: map_frame(frame),
        },
        EngineEvent::Malformed { conn, error } => Msg::FrameRejected {
            conn,
            reason: error.to_string(),
        },
        EngineEvent::Closed { conn, reason } => Msg::ConnectionClosed {
            conn,
            cause: map_reason(reason),
        },
        EngineEvent::ReportFetched { .. } => return None,
    };
    Some(msg)
}

fn map_frame(frame: InboundFrame) -> Frame {
    match frame {
        InboundFrame::Complete { final_report } => Frame::Complete { final_report },
        InboundFrame::Failed { message } => Frame::Failed { message },
        InboundFrame::Step(update) => Frame::Step(StepEvent {
            step: update.step,
            status: update.status,
            message: update.message,
            progress: update.progress,
        }),
    }
}

fn map_reason(reason: CloseReason) -> CloseCause {
    match reason {
        CloseReason::Requested => CloseCause::Local,
        CloseReason::ServerClosed => CloseCause::Remote,
        CloseReason::ConnectFailed(detail) | CloseReason::Transport(detail) => {
            CloseCause::Transport(detail)
        }
    }
}

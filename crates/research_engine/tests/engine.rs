use std::sync::Arc;
use std::time::Duration;

use research_engine::{
    CloseReason, ConnectionId, EngineEvent, EngineHandle, EngineSettings, EventSink,
    InboundFrame, ReportClient, StepUpdate, Transport,
};
use tokio_util::sync::CancellationToken;

/// Emits one step frame per connection, then idles until cancelled.
struct ScriptedTransport;

#[async_trait::async_trait]
impl Transport for ScriptedTransport {
    async fn run(
        &self,
        conn: ConnectionId,
        query: &str,
        sink: &dyn EventSink,
        cancel: CancellationToken,
    ) -> CloseReason {
        sink.emit(EngineEvent::Opened { conn });
        sink.emit(EngineEvent::Frame {
            conn,
            frame: InboundFrame::Step(StepUpdate {
                step: "planner".to_string(),
                status: "in_progress".to_string(),
                message: Some(query.to_string()),
                progress: None,
            }),
        });
        cancel.cancelled().await;
        CloseReason::Requested
    }
}

fn engine() -> EngineHandle {
    let report = ReportClient::new(&EngineSettings::default()).unwrap();
    EngineHandle::with_transport(Arc::new(ScriptedTransport), report).unwrap()
}

fn next_event(engine: &EngineHandle) -> EngineEvent {
    engine
        .recv_timeout(Duration::from_secs(5))
        .expect("engine event")
}

#[test]
fn events_are_tagged_with_their_connection() {
    let engine = engine();
    engine.open(1, "first");

    assert_eq!(next_event(&engine), EngineEvent::Opened { conn: 1 });
    match next_event(&engine) {
        EngineEvent::Frame {
            conn,
            frame: InboundFrame::Step(update),
        } => {
            assert_eq!(conn, 1);
            assert_eq!(update.message.as_deref(), Some("first"));
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[test]
fn close_is_idempotent_and_reports_one_closed_event() {
    let engine = engine();
    engine.open(4, "topic");
    assert_eq!(next_event(&engine), EngineEvent::Opened { conn: 4 });
    let _frame = next_event(&engine);

    engine.close(4);
    engine.close(4);
    engine.close(99);

    assert_eq!(
        next_event(&engine),
        EngineEvent::Closed {
            conn: 4,
            reason: CloseReason::Requested
        }
    );
    assert_eq!(engine.recv_timeout(Duration::from_millis(200)), None);
}

#[test]
fn closing_one_connection_leaves_the_next_running() {
    let engine = engine();
    engine.open(1, "old");
    engine.close(1);
    engine.open(2, "new");

    let mut closed = Vec::new();
    let mut opened = Vec::new();
    while let Some(event) = engine.recv_timeout(Duration::from_millis(500)) {
        match event {
            EngineEvent::Closed { conn, .. } => closed.push(conn),
            EngineEvent::Opened { conn } => opened.push(conn),
            _ => {}
        }
    }

    assert_eq!(closed, vec![1]);
    assert!(opened.contains(&2));
}

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use pretty_assertions::assert_eq;
use research_engine::{
    CloseReason, EngineEvent, EngineSettings, EventSink, FrameError, InboundFrame, Transport,
    WsTransport,
};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct TestSink {
    events: Arc<Mutex<Vec<EngineEvent>>>,
}

impl TestSink {
    fn take(&self) -> Vec<EngineEvent> {
        self.events.lock().unwrap().drain(..).collect()
    }
}

impl EventSink for TestSink {
    fn emit(&self, event: EngineEvent) {
        self.events.lock().unwrap().push(event);
    }
}

fn settings_for(addr: std::net::SocketAddr) -> EngineSettings {
    EngineSettings {
        ws_url: format!("ws://{addr}/api/v1/ws/jobs"),
        connect_timeout: Duration::from_secs(2),
        ..EngineSettings::default()
    }
}

/// Accepts one client, checks the initiation frame, then plays `frames`.
/// With `hold_open` the server waits for the client to close instead of
/// closing itself; the received query and whether a close arrived are reported.
async fn serve_once(
    listener: TcpListener,
    frames: Vec<&'static str>,
    hold_open: bool,
    ready: oneshot::Sender<String>,
) -> bool {
    let (tcp, _) = listener.accept().await.unwrap();
    let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();

    let query = match ws.next().await {
        Some(Ok(Message::Text(text))) => {
            let value: serde_json::Value = serde_json::from_str(text.as_str()).unwrap();
            value["query"].as_str().unwrap().to_string()
        }
        other => panic!("expected initiation frame, got {other:?}"),
    };
    let _ = ready.send(query);

    for frame in frames {
        ws.send(Message::text(frame)).await.unwrap();
    }

    if hold_open {
        loop {
            match ws.next().await {
                Some(Ok(Message::Close(_))) | None => return true,
                Some(Ok(_)) => {}
                Some(Err(_)) => return false,
            }
        }
    }
    ws.close(None).await.unwrap();
    false
}

#[tokio::test]
async fn streams_frames_until_server_closes() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let transport = WsTransport::new(settings_for(listener.local_addr().unwrap()));
    let (ready_tx, ready_rx) = oneshot::channel();
    let server = tokio::spawn(serve_once(
        listener,
        vec![
            r#"{"step":"planner","status":"complete"}"#,
            "{ broken",
            r##"{"status":"complete","final_report":"# Done"}"##,
        ],
        false,
        ready_tx,
    ));

    let sink = TestSink::default();
    let reason = transport
        .run(7, "solid state batteries", &sink, CancellationToken::new())
        .await;

    assert_eq!(reason, CloseReason::ServerClosed);
    assert_eq!(ready_rx.await.unwrap(), "solid state batteries");
    server.await.unwrap();

    let events = sink.take();
    assert_eq!(events.len(), 4);
    assert_eq!(events[0], EngineEvent::Opened { conn: 7 });
    assert!(matches!(
        &events[1],
        EngineEvent::Frame { conn: 7, frame: InboundFrame::Step(update) } if update.step == "planner"
    ));
    assert!(matches!(
        &events[2],
        EngineEvent::Malformed { conn: 7, error: FrameError::InvalidJson(_) }
    ));
    assert_eq!(
        events[3],
        EngineEvent::Frame {
            conn: 7,
            frame: InboundFrame::Complete {
                final_report: Some("# Done".to_string())
            }
        }
    );
}

#[tokio::test]
async fn cancellation_closes_the_socket() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let transport = WsTransport::new(settings_for(listener.local_addr().unwrap()));
    let (ready_tx, ready_rx) = oneshot::channel();
    let server = tokio::spawn(serve_once(listener, Vec::new(), true, ready_tx));

    let cancel = CancellationToken::new();
    let client = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let sink = TestSink::default();
            transport.run(1, "topic", &sink, cancel).await
        })
    };

    assert_eq!(ready_rx.await.unwrap(), "topic");
    cancel.cancel();

    assert_eq!(client.await.unwrap(), CloseReason::Requested);
    assert!(server.await.unwrap(), "server should observe a close");
}

#[tokio::test]
async fn connect_failure_is_reported() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let transport = WsTransport::new(settings_for(addr));
    let sink = TestSink::default();
    let reason = transport.run(3, "topic", &sink, CancellationToken::new()).await;

    assert!(matches!(reason, CloseReason::ConnectFailed(_)));
    assert!(sink.take().is_empty());
}

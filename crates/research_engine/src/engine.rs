use std::collections::HashMap;
use std::sync::{mpsc, Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use research_logging::{research_debug, research_info};
use thiserror::Error;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::connection::{ChannelEventSink, EventSink, Transport, WsTransport};
use crate::{ConnectionId, EngineEvent, EngineSettings, ReportClient, ReportError};

enum EngineCommand {
    Open { conn: ConnectionId, query: String },
    Close { conn: ConnectionId },
    FetchReport { query: String },
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("could not start engine runtime: {0}")]
    Runtime(#[from] std::io::Error),
    #[error(transparent)]
    Report(#[from] ReportError),
}

/// Open connections by id. Dropping a guard cancels its connection, so
/// removing an entry (or dropping the map) is the close operation.
type LiveConnections = Arc<Mutex<HashMap<ConnectionId, DropGuard>>>;

/// Handle to the engine thread. Commands never block; results arrive as
/// [`EngineEvent`]s.
pub struct EngineHandle {
    cmd_tx: mpsc::Sender<EngineCommand>,
    event_rx: mpsc::Receiver<EngineEvent>,
}

impl EngineHandle {
    pub fn new(settings: EngineSettings) -> Result<Self, EngineError> {
        let report = ReportClient::new(&settings)?;
        Self::with_transport(Arc::new(WsTransport::new(settings)), report)
    }

    pub fn with_transport(
        transport: Arc<dyn Transport>,
        report: ReportClient,
    ) -> Result<Self, EngineError> {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("research-engine-worker")
            .build()?;
        let report = Arc::new(report);

        thread::Builder::new()
            .name("research-engine".to_string())
            .spawn(move || {
                let live: LiveConnections = Arc::default();
                while let Ok(command) = cmd_rx.recv() {
                    match command {
                        EngineCommand::Open { conn, query } => {
                            let token = CancellationToken::new();
                            lock(&live).insert(conn, token.clone().drop_guard());
                            let transport = transport.clone();
                            let live = live.clone();
                            let sink = ChannelEventSink::new(event_tx.clone());
                            runtime.spawn(async move {
                                let reason = transport.run(conn, &query, &sink, token).await;
                                lock(&live).remove(&conn);
                                research_info!("Connection {} finished: {}", conn, reason);
                                sink.emit(EngineEvent::Closed { conn, reason });
                            });
                        }
                        EngineCommand::Close { conn } => {
                            if lock(&live).remove(&conn).is_some() {
                                research_debug!("Closing connection {}", conn);
                            }
                        }
                        EngineCommand::FetchReport { query } => {
                            let report = report.clone();
                            let event_tx = event_tx.clone();
                            runtime.spawn(async move {
                                let result = report.fetch_report(&query).await;
                                let _ = event_tx.send(EngineEvent::ReportFetched { result });
                            });
                        }
                    }
                }
                // Handle dropped: cancel whatever is still open.
                lock(&live).clear();
            })?;

        Ok(Self { cmd_tx, event_rx })
    }

    /// Opens `conn` and sends `query` once it is ready.
    pub fn open(&self, conn: ConnectionId, query: impl Into<String>) {
        let _ = self.cmd_tx.send(EngineCommand::Open {
            conn,
            query: query.into(),
        });
    }

    /// Closes `conn`. Unknown or already closed connections are ignored.
    pub fn close(&self, conn: ConnectionId) {
        let _ = self.cmd_tx.send(EngineCommand::Close { conn });
    }

    pub fn fetch_report(&self, query: impl Into<String>) {
        let _ = self.cmd_tx.send(EngineCommand::FetchReport {
            query: query.into(),
        });
    }

    pub fn try_recv(&self) -> Option<EngineEvent> {
        self.event_rx.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<EngineEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

use research_logging::{research_debug, research_info, research_warn};

use crate::{AppState, CloseCause, Effect, FoldOutcome, Msg, CONNECTION_CLOSED_UNEXPECTEDLY};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    let effects = match msg {
        Msg::QuerySubmitted(raw) => {
            let query = raw.trim();
            if query.is_empty() {
                return (state, Vec::new());
            }

            let mut effects = Vec::with_capacity(2);
            if let Some(old) = state.live_connection() {
                research_info!("Replacing job on connection {}", old);
                state.mark_closed(old);
                effects.push(Effect::CloseConnection { conn: old });
            }
            let conn = state.start_job(query.to_string());
            research_info!("Submitting query on connection {} ({} chars)", conn, query.len());
            effects.push(Effect::OpenConnection {
                conn,
                query: query.to_string(),
            });
            effects
        }
        Msg::ConnectionOpened { conn } => {
            if !state.mark_open(conn) {
                research_debug!("Ignoring open event for stale connection {}", conn);
            }
            Vec::new()
        }
        Msg::FrameReceived { conn, frame } => {
            if !state.is_live(conn) {
                research_debug!("Dropping frame from stale connection {}: {:?}", conn, frame);
                return (state, Vec::new());
            }
            let terminal = frame.is_terminal();
            if state.apply_frame(conn, frame) == FoldOutcome::Settled {
                if let Some(job) = state.job() {
                    research_info!(
                        "Job on connection {} settled as {:?}",
                        conn,
                        job.progress().status()
                    );
                }
            }
            if terminal {
                state.mark_closed(conn);
                vec![Effect::CloseConnection { conn }]
            } else {
                Vec::new()
            }
        }
        Msg::FrameRejected { conn, reason } => {
            research_warn!("Skipping malformed frame on connection {}: {}", conn, reason);
            Vec::new()
        }
        Msg::ConnectionClosed { conn, cause } => {
            if !state.mark_closed(conn) {
                return (state, Vec::new());
            }
            match &cause {
                CloseCause::Transport(detail) => {
                    research_warn!("Connection {} failed: {}", conn, detail)
                }
                CloseCause::Local | CloseCause::Remote => {
                    research_info!("Connection {} closed ({:?})", conn, cause)
                }
            }
            if state.fail_job(conn, CONNECTION_CLOSED_UNEXPECTEDLY) {
                research_warn!("Job on connection {} ended without an outcome", conn);
            }
            Vec::new()
        }
        Msg::Shutdown => match state.live_connection() {
            Some(conn) => {
                state.mark_closed(conn);
                vec![Effect::CloseConnection { conn }]
            }
            None => Vec::new(),
        },
    };

    (state, effects)
}

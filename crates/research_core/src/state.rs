use crate::step::{self, STEP_SEQUENCE};
use crate::view_model::{AppViewModel, JobSnapshot, StepRowView};
use crate::{FoldOutcome, Frame, JobProgress};

/// Identity of one connection instance. Assigned monotonically, never reused.
pub type ConnectionId = u64;

/// Error reported when the connection ends while the job is still running.
pub const CONNECTION_CLOSED_UNEXPECTEDLY: &str = "Connection closed unexpectedly";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Connecting,
    Open,
    Closed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    conn: ConnectionId,
    query: String,
    connection: ConnectionState,
    progress: JobProgress,
}

impl Job {
    pub fn conn(&self) -> ConnectionId {
        self.conn
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    pub fn progress(&self) -> &JobProgress {
        &self.progress
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppState {
    last_conn: ConnectionId,
    job: Option<Job>,
    dirty: bool,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn job(&self) -> Option<&Job> {
        self.job.as_ref()
    }

    /// Connection of the current job, if it has not been closed yet.
    pub fn live_connection(&self) -> Option<ConnectionId> {
        self.job
            .as_ref()
            .filter(|job| job.connection != ConnectionState::Closed)
            .map(|job| job.conn)
    }

    pub fn view(&self) -> AppViewModel {
        let progress = self.job.as_ref().map(|job| &job.progress);
        let snapshot = progress.map(JobSnapshot::from_progress).unwrap_or_default();

        let steps = STEP_SEQUENCE
            .iter()
            .map(|key| {
                let latest = progress.and_then(|p| p.step(key));
                StepRowView {
                    step: (*key).to_string(),
                    label: step::step_label(key).to_string(),
                    status: step::derive_step_status(key, &snapshot.progress, snapshot.status),
                    message: latest.and_then(|event| event.message.clone()),
                    progress: latest.and_then(|event| event.progress),
                }
            })
            .collect();

        let completed_steps = progress.map(JobProgress::completed_steps).unwrap_or(0);
        AppViewModel {
            conn: self.job.as_ref().map(|job| job.conn),
            query: self.job.as_ref().map(|job| job.query.clone()),
            connection: self.job.as_ref().map(|job| job.connection),
            completed_steps,
            total_steps: STEP_SEQUENCE.len(),
            percent_complete: completed_steps as f64 / STEP_SEQUENCE.len() as f64 * 100.0,
            steps,
            snapshot,
            dirty: self.dirty,
        }
    }

    /// Returns whether the state changed since the last call and clears the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Replaces the current job with a fresh running one on a new connection.
    pub(crate) fn start_job(&mut self, query: String) -> ConnectionId {
        self.last_conn += 1;
        self.job = Some(Job {
            conn: self.last_conn,
            query,
            connection: ConnectionState::Connecting,
            progress: JobProgress::running(),
        });
        self.mark_dirty();
        self.last_conn
    }

    /// The job owning `conn`, as long as its connection is still live.
    fn live_job_mut(&mut self, conn: ConnectionId) -> Option<&mut Job> {
        self.job
            .as_mut()
            .filter(|job| job.conn == conn && job.connection != ConnectionState::Closed)
    }

    pub(crate) fn is_live(&self, conn: ConnectionId) -> bool {
        self.live_connection() == Some(conn)
    }

    pub(crate) fn mark_open(&mut self, conn: ConnectionId) -> bool {
        match self.live_job_mut(conn) {
            Some(job) if job.connection == ConnectionState::Connecting => {
                job.connection = ConnectionState::Open;
                self.mark_dirty();
                true
            }
            _ => false,
        }
    }

    pub(crate) fn mark_closed(&mut self, conn: ConnectionId) -> bool {
        match self.live_job_mut(conn) {
            Some(job) => {
                job.connection = ConnectionState::Closed;
                self.mark_dirty();
                true
            }
            None => false,
        }
    }

    pub(crate) fn apply_frame(&mut self, conn: ConnectionId, frame: Frame) -> FoldOutcome {
        let outcome = match self.live_job_mut(conn) {
            Some(job) => job.progress.fold(frame),
            None => FoldOutcome::Ignored,
        };
        if outcome != FoldOutcome::Ignored {
            self.mark_dirty();
        }
        outcome
    }

    /// Fails the job on `conn` if it is still running.
    pub(crate) fn fail_job(&mut self, conn: ConnectionId, message: &str) -> bool {
        let failed = self
            .job
            .as_mut()
            .filter(|job| job.conn == conn)
            .is_some_and(|job| job.progress.fail(message));
        if failed {
            self.mark_dirty();
        }
        failed
    }
}

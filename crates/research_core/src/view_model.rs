use serde::Serialize;

use crate::{ConnectionId, ConnectionState, JobProgress, OverallStatus, StepEvent, StepStatus};

/// State surface handed to the rendering collaborator.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSnapshot {
    pub progress: Vec<StepEvent>,
    pub status: OverallStatus,
    pub error: Option<String>,
    pub final_report: Option<String>,
}

impl JobSnapshot {
    pub fn from_progress(progress: &JobProgress) -> Self {
        Self {
            progress: progress.steps().to_vec(),
            status: progress.status(),
            error: progress.error().map(ToOwned::to_owned),
            final_report: progress.final_report().map(ToOwned::to_owned),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppViewModel {
    pub conn: Option<ConnectionId>,
    pub query: Option<String>,
    pub connection: Option<ConnectionState>,
    pub snapshot: JobSnapshot,
    /// One row per sequence step, in sequence order.
    pub steps: Vec<StepRowView>,
    pub completed_steps: usize,
    pub total_steps: usize,
    pub percent_complete: f64,
    pub dirty: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepRowView {
    pub step: String,
    pub label: String,
    pub status: StepStatus,
    pub message: Option<String>,
    pub progress: Option<f64>,
}

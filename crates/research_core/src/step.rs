use serde::Serialize;

use crate::OverallStatus;

/// Pipeline steps in execution order. Display order and the "next expected
/// step" both come from this list, never from the server.
pub const STEP_SEQUENCE: [&str; 4] = ["planner", "searcher", "summarizer", "writer"];

/// Server-side step names that share a slot with a canonical step.
const STEP_SYNONYMS: &[(&str, &str)] = &[("summarize_and_review", "summarizer")];

const STEP_LABELS: &[(&str, &str)] = &[
    ("planner", "Planner"),
    ("searcher", "Searcher"),
    ("summarizer", "Summarizer & Reviewer"),
    ("writer", "Writer"),
];

/// Reported status value that marks a step as done.
pub const STATUS_COMPLETE: &str = "complete";

/// Maps a server step identifier onto the client's canonical identifier.
/// Unknown identifiers pass through unchanged.
pub fn canonical_step(raw: &str) -> &str {
    let raw = raw.trim();
    STEP_SYNONYMS
        .iter()
        .find(|(synonym, _)| *synonym == raw)
        .map(|(_, canonical)| *canonical)
        .unwrap_or(raw)
}

pub fn step_label(step: &str) -> &str {
    STEP_LABELS
        .iter()
        .find(|(key, _)| *key == step)
        .map(|(_, label)| *label)
        .unwrap_or(step)
}

pub fn is_sequence_step(step: &str) -> bool {
    STEP_SEQUENCE.contains(&step)
}

/// Display status of one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    InProgress,
    Complete,
}

/// Latest known state of one step. `step` is always canonical once the event
/// has been folded into a job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepEvent {
    pub step: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Advisory percentage, display only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
}

impl StepEvent {
    pub fn new(step: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            status: status.into(),
            message: None,
            progress: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_progress(mut self, progress: f64) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn is_complete(&self) -> bool {
        self.status.trim().eq_ignore_ascii_case(STATUS_COMPLETE)
    }

    /// Overwrites only the fields the newer event carries.
    pub(crate) fn merge(&mut self, newer: StepEvent) {
        self.status = newer.status;
        if newer.message.is_some() {
            self.message = newer.message;
        }
        if newer.progress.is_some() {
            self.progress = newer.progress;
        }
    }
}

pub(crate) fn find_step<'a>(progress: &'a [StepEvent], step: &str) -> Option<&'a StepEvent> {
    progress.iter().find(|event| event.step == step)
}

fn is_step_complete(progress: &[StepEvent], step: &str) -> bool {
    find_step(progress, step).is_some_and(StepEvent::is_complete)
}

/// Earliest step of [`STEP_SEQUENCE`] without a complete entry.
pub fn first_incomplete_step(progress: &[StepEvent]) -> Option<&'static str> {
    STEP_SEQUENCE
        .iter()
        .copied()
        .find(|step| !is_step_complete(progress, step))
}

pub fn all_steps_complete(progress: &[StepEvent]) -> bool {
    first_incomplete_step(progress).is_none()
}

pub fn completed_step_count(progress: &[StepEvent]) -> usize {
    STEP_SEQUENCE
        .iter()
        .filter(|step| is_step_complete(progress, step))
        .count()
}

/// Derives the display status of `step` from accumulated progress.
///
/// Only the earliest incomplete sequence step can be in progress, and only
/// while the job is running or has stopped on an error (the view then stays
/// frozen at the step that was active). Everything else that is not complete
/// is pending.
pub fn derive_step_status(step: &str, progress: &[StepEvent], overall: OverallStatus) -> StepStatus {
    let step = canonical_step(step);
    if is_step_complete(progress, step) {
        return StepStatus::Complete;
    }
    let active = matches!(overall, OverallStatus::Running | OverallStatus::Error);
    if active && first_incomplete_step(progress) == Some(step) {
        StepStatus::InProgress
    } else {
        StepStatus::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synonyms_map_to_canonical_slot() {
        assert_eq!(canonical_step("summarize_and_review"), "summarizer");
        assert_eq!(canonical_step(" planner "), "planner");
        assert_eq!(canonical_step("fact_checker"), "fact_checker");
    }

    #[test]
    fn merge_keeps_fields_missing_from_newer_event() {
        let mut event = StepEvent::new("planner", "in_progress")
            .with_message("Planning...")
            .with_progress(10.0);
        event.merge(StepEvent::new("planner", "complete"));

        assert_eq!(event.status, "complete");
        assert_eq!(event.message.as_deref(), Some("Planning..."));
        assert_eq!(event.progress, Some(10.0));
    }

    #[test]
    fn first_incomplete_step_is_the_only_one_in_progress() {
        let progress = vec![
            StepEvent::new("planner", "complete"),
            StepEvent::new("summarizer", "complete"),
        ];
        let statuses: Vec<_> = STEP_SEQUENCE
            .iter()
            .map(|step| derive_step_status(step, &progress, OverallStatus::Running))
            .collect();

        assert_eq!(
            statuses,
            vec![
                StepStatus::Complete,
                StepStatus::InProgress,
                StepStatus::Complete,
                StepStatus::Pending,
            ]
        );
    }

    #[test]
    fn idle_or_complete_jobs_show_no_step_in_progress() {
        let progress = vec![StepEvent::new("planner", "complete")];
        for overall in [OverallStatus::Idle, OverallStatus::Complete] {
            assert_eq!(
                derive_step_status("searcher", &progress, overall),
                StepStatus::Pending
            );
        }
    }

    #[test]
    fn unknown_steps_never_count_towards_the_sequence() {
        let progress = vec![
            StepEvent::new("fact_checker", "complete"),
            StepEvent::new("planner", "complete"),
        ];
        assert_eq!(completed_step_count(&progress), 1);
        assert_eq!(
            derive_step_status("fact_checker", &progress, OverallStatus::Running),
            StepStatus::Complete
        );
        assert!(!all_steps_complete(&progress));
    }
}

use serde::Serialize;

use crate::step::{self, StepEvent, StepStatus};

/// Error text used when the server ends a job without saying why.
pub const UNKNOWN_ERROR: &str = "Unknown error";

/// One validated inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// The job finished. Some servers omit the report.
    Complete { final_report: Option<String> },
    /// The job failed on the server side.
    Failed { message: Option<String> },
    /// A step reported progress.
    Step(StepEvent),
}

impl Frame {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Frame::Step(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallStatus {
    #[default]
    Idle,
    Running,
    Complete,
    Error,
}

impl OverallStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, OverallStatus::Complete | OverallStatus::Error)
    }
}

/// How a job reached [`OverallStatus::Complete`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// A terminal success frame arrived.
    Reported,
    /// Every sequence step completed but no terminal frame arrived (yet).
    Inferred,
}

/// Result of folding one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FoldOutcome {
    /// The frame did not change anything.
    Ignored,
    /// Progress changed, the job keeps its status.
    Updated,
    /// The job reached a terminal status with this frame.
    Settled,
}

/// Accumulated progress of one job: a pure fold over its inbound frames.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct JobProgress {
    status: OverallStatus,
    steps: Vec<StepEvent>,
    error: Option<String>,
    final_report: Option<String>,
    completion: Option<Completion>,
}

impl JobProgress {
    /// Empty progress for a job that has just been submitted.
    pub fn running() -> Self {
        Self {
            status: OverallStatus::Running,
            ..Self::default()
        }
    }

    /// Rebuilds progress from a full frame history.
    pub fn replay(frames: impl IntoIterator<Item = Frame>) -> Self {
        let mut progress = Self::running();
        for frame in frames {
            progress.fold(frame);
        }
        progress
    }

    pub fn fold(&mut self, frame: Frame) -> FoldOutcome {
        match frame {
            Frame::Step(event) => self.apply_step(event),
            Frame::Complete { final_report } => self.apply_complete(final_report),
            Frame::Failed { message } => {
                if self.status != OverallStatus::Running {
                    return FoldOutcome::Ignored;
                }
                self.fail(message.unwrap_or_else(|| UNKNOWN_ERROR.to_string()));
                FoldOutcome::Settled
            }
        }
    }

    /// Moves a running job to [`OverallStatus::Error`], setting status and
    /// message together. No-op once the job is terminal.
    pub fn fail(&mut self, message: impl Into<String>) -> bool {
        if self.status != OverallStatus::Running {
            return false;
        }
        self.status = OverallStatus::Error;
        self.error = Some(message.into());
        true
    }

    fn apply_step(&mut self, mut event: StepEvent) -> FoldOutcome {
        if self.status != OverallStatus::Running {
            return FoldOutcome::Ignored;
        }
        event.step = step::canonical_step(&event.step).to_string();
        match self.steps.iter_mut().find(|known| known.step == event.step) {
            Some(known) => known.merge(event),
            None => self.steps.push(event),
        }

        if step::all_steps_complete(&self.steps) {
            self.status = OverallStatus::Complete;
            self.completion = Some(Completion::Inferred);
            return FoldOutcome::Settled;
        }
        FoldOutcome::Updated
    }

    fn apply_complete(&mut self, final_report: Option<String>) -> FoldOutcome {
        match (self.status, self.completion) {
            (OverallStatus::Running, _) => {
                self.status = OverallStatus::Complete;
                self.final_report = final_report;
                self.completion = Some(Completion::Reported);
                FoldOutcome::Settled
            }
            // A report that trails an inferred completion is still the job's report.
            (OverallStatus::Complete, Some(Completion::Inferred)) if final_report.is_some() => {
                self.completion = Some(Completion::Reported);
                self.final_report = final_report;
                FoldOutcome::Updated
            }
            _ => FoldOutcome::Ignored,
        }
    }

    pub fn status(&self) -> OverallStatus {
        self.status
    }

    /// Step events in first-arrival order, keyed by canonical step.
    pub fn steps(&self) -> &[StepEvent] {
        &self.steps
    }

    pub fn step(&self, step: &str) -> Option<&StepEvent> {
        step::find_step(&self.steps, step::canonical_step(step))
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn final_report(&self) -> Option<&str> {
        self.final_report.as_deref()
    }

    pub fn completion(&self) -> Option<Completion> {
        self.completion
    }

    pub fn step_status(&self, step: &str) -> StepStatus {
        step::derive_step_status(step, &self.steps, self.status)
    }

    pub fn completed_steps(&self) -> usize {
        step::completed_step_count(&self.steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(step: &str, status: &str) -> Frame {
        Frame::Step(StepEvent::new(step, status))
    }

    #[test]
    fn duplicate_events_keep_one_entry_per_step() {
        let mut progress = JobProgress::running();
        progress.fold(step("planner", "in_progress"));
        progress.fold(step("searcher", "in_progress"));
        progress.fold(step("planner", "complete"));

        let keys: Vec<_> = progress.steps().iter().map(|s| s.step.as_str()).collect();
        assert_eq!(keys, vec!["planner", "searcher"]);
        assert_eq!(progress.step("planner").unwrap().status, "complete");
    }

    #[test]
    fn synonym_and_canonical_share_an_entry() {
        let progress = JobProgress::replay(vec![
            step("summarize_and_review", "in_progress"),
            step("summarizer", "complete"),
        ]);
        assert_eq!(progress.steps().len(), 1);
        assert_eq!(progress.steps()[0].step, "summarizer");
        assert!(progress.steps()[0].is_complete());

        let reversed = JobProgress::replay(vec![
            step("summarizer", "in_progress"),
            step("summarize_and_review", "complete"),
        ]);
        assert_eq!(reversed.steps().len(), 1);
    }

    #[test]
    fn inferred_completion_fires_on_the_last_step() {
        let mut progress = JobProgress::running();
        for name in ["writer", "planner", "summarize_and_review"] {
            assert_eq!(progress.fold(step(name, "complete")), FoldOutcome::Updated);
        }
        assert_eq!(progress.status(), OverallStatus::Running);

        assert_eq!(progress.fold(step("searcher", "complete")), FoldOutcome::Settled);
        assert_eq!(progress.status(), OverallStatus::Complete);
        assert_eq!(progress.completion(), Some(Completion::Inferred));
    }

    #[test]
    fn missing_steps_never_infer_completion() {
        let progress = JobProgress::replay(vec![
            step("planner", "complete"),
            step("searcher", "complete"),
            step("writer", "complete"),
            step("fact_checker", "complete"),
        ]);
        assert_eq!(progress.status(), OverallStatus::Running);
    }

    #[test]
    fn report_after_inferred_completion_is_attached() {
        let mut progress = JobProgress::replay(
            crate::STEP_SEQUENCE
                .iter()
                .map(|name| step(name, "complete"))
                .collect::<Vec<_>>(),
        );
        let outcome = progress.fold(Frame::Complete {
            final_report: Some("# Report".to_string()),
        });

        assert_eq!(outcome, FoldOutcome::Updated);
        assert_eq!(progress.final_report(), Some("# Report"));
        assert_eq!(progress.completion(), Some(Completion::Reported));
    }

    #[test]
    fn error_after_completion_is_ignored() {
        let mut progress = JobProgress::replay(vec![Frame::Complete {
            final_report: Some("done".to_string()),
        }]);
        let outcome = progress.fold(Frame::Failed {
            message: Some("late".to_string()),
        });

        assert_eq!(outcome, FoldOutcome::Ignored);
        assert_eq!(progress.status(), OverallStatus::Complete);
        assert_eq!(progress.error(), None);
    }

    #[test]
    fn error_without_message_uses_fallback_text() {
        let progress = JobProgress::replay(vec![Frame::Failed { message: None }]);
        assert_eq!(progress.status(), OverallStatus::Error);
        assert_eq!(progress.error(), Some(UNKNOWN_ERROR));
    }

    #[test]
    fn idle_progress_ignores_frames() {
        let mut progress = JobProgress::default();
        assert_eq!(progress.fold(step("planner", "complete")), FoldOutcome::Ignored);
        assert!(progress.steps().is_empty());
    }
}

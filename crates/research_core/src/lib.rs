//! Research core: pure job-progress state machine and view-model helpers.
mod effect;
mod msg;
mod progress;
mod state;
mod step;
mod update;
mod view_model;

pub use effect::Effect;
pub use msg::{CloseCause, Msg};
pub use progress::{Completion, FoldOutcome, Frame, JobProgress, OverallStatus, UNKNOWN_ERROR};
pub use state::{AppState, ConnectionId, ConnectionState, Job, CONNECTION_CLOSED_UNEXPECTEDLY};
pub use step::{
    all_steps_complete, canonical_step, completed_step_count, derive_step_status,
    first_incomplete_step, is_sequence_step, step_label, StepEvent, StepStatus, STATUS_COMPLETE,
    STEP_SEQUENCE,
};
pub use update::update;
pub use view_model::{AppViewModel, JobSnapshot, StepRowView};

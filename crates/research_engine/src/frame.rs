use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

const STATUS_COMPLETE: &str = "complete";
const STATUS_ERROR: &str = "error";

/// Inbound frame after validation. Anything that fits none of these shapes is
/// rejected with a [`FrameError`].
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    Complete { final_report: Option<String> },
    Failed { message: Option<String> },
    Step(StepUpdate),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepUpdate {
    pub step: String,
    pub status: String,
    pub message: Option<String>,
    pub progress: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("invalid json: {0}")]
    InvalidJson(String),
    #[error("step {step:?} has no status")]
    MissingStatus { step: String },
    #[error("frame matches no known shape")]
    UnknownShape,
    #[error("could not encode frame: {0}")]
    Encode(String),
}

#[derive(Serialize)]
struct Initiation<'a> {
    query: &'a str,
}

/// Decides the frame kind by content. Only a JSON object can be a frame.
/// `message` and `progress` are display data: a value of the wrong type is
/// dropped rather than failing the frame.
pub fn parse_frame(text: &str) -> Result<InboundFrame, FrameError> {
    let value: Value =
        serde_json::from_str(text).map_err(|err| FrameError::InvalidJson(err.to_string()))?;
    let Value::Object(fields) = value else {
        return Err(FrameError::UnknownShape);
    };
    let step = string_field(&fields, "step");
    let status = string_field(&fields, "status");
    let message = string_field(&fields, "message");
    let progress = fields.get("progress").and_then(Value::as_f64);
    let final_report = string_field(&fields, "final_report");

    if status_is(status.as_deref(), STATUS_COMPLETE) && (final_report.is_some() || step.is_none()) {
        return Ok(InboundFrame::Complete { final_report });
    }
    if status_is(status.as_deref(), STATUS_ERROR) {
        return Ok(InboundFrame::Failed { message });
    }

    match step {
        Some(step) if !step.trim().is_empty() => match status {
            Some(status) => Ok(InboundFrame::Step(StepUpdate {
                step,
                status,
                message,
                progress,
            })),
            None => Err(FrameError::MissingStatus { step }),
        },
        _ => Err(FrameError::UnknownShape),
    }
}

fn string_field(fields: &Map<String, Value>, key: &str) -> Option<String> {
    fields.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Status keywords match after trimming, ignoring ASCII case.
fn status_is(status: Option<&str>, keyword: &str) -> bool {
    status.is_some_and(|status| status.trim().eq_ignore_ascii_case(keyword))
}

/// The single outbound frame: `{"query": ...}`.
pub fn initiation_frame(query: &str) -> Result<String, FrameError> {
    serde_json::to_string(&Initiation { query }).map_err(|err| FrameError::Encode(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initiation_frame_escapes_query() {
        let frame = initiation_frame("say \"hi\"").unwrap();
        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["query"], "say \"hi\"");
    }

    #[test]
    fn step_without_status_is_rejected() {
        assert_eq!(
            parse_frame(r#"{"step":"planner"}"#),
            Err(FrameError::MissingStatus {
                step: "planner".to_string()
            })
        );
    }
}

use research_core::{is_sequence_step, AppViewModel, OverallStatus, StepRowView, StepStatus};
use research_logging::research_warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Progress lines on stderr, the final report on stdout.
    Text,
    /// One JSON snapshot per state change on stdout.
    Json,
}

pub struct Printer {
    format: OutputFormat,
    previous: AppViewModel,
}

impl Printer {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            previous: AppViewModel::default(),
        }
    }

    pub fn show(&mut self, view: &AppViewModel) {
        match self.format {
            OutputFormat::Json => match serde_json::to_string(&view.snapshot) {
                Ok(line) => println!("{line}"),
                Err(err) => research_warn!("Could not encode snapshot: {}", err),
            },
            OutputFormat::Text => {
                let now = chrono::Local::now().format("%H:%M:%S").to_string();
                for line in render_changes(&self.previous, view, &now) {
                    eprintln!("{line}");
                }
                if let Some(report) = new_report(&self.previous, view) {
                    println!("{report}");
                }
            }
        }
        self.previous = view.clone();
    }
}

/// Lines describing what changed between two views.
pub fn render_changes(previous: &AppViewModel, next: &AppViewModel, now: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let new_job = previous.conn != next.conn;
    if new_job {
        if let Some(query) = &next.query {
            lines.push(format!("[{now}] submitted: {query}"));
        }
    }

    for (idx, row) in next.steps.iter().enumerate() {
        let changed = match previous.steps.get(idx) {
            Some(before) if !new_job => before != row,
            _ => row.status != StepStatus::Pending || row.message.is_some(),
        };
        if changed {
            lines.push(format!("[{now}]   {}", step_line(row)));
        }
    }

    for event in next
        .snapshot
        .progress
        .iter()
        .filter(|event| !is_sequence_step(&event.step))
    {
        let seen = !new_job && previous.snapshot.progress.contains(event);
        if !seen {
            lines.push(format!("[{now}]   + {}: {}", event.step, event.status));
        }
    }

    if new_job || previous.snapshot.status != next.snapshot.status {
        match next.snapshot.status {
            OverallStatus::Idle | OverallStatus::Running => {}
            OverallStatus::Complete => lines.push(format!(
                "[{now}] complete ({}/{} steps)",
                next.completed_steps, next.total_steps
            )),
            OverallStatus::Error => lines.push(format!(
                "[{now}] error: {}",
                next.snapshot.error.as_deref().unwrap_or("unknown error")
            )),
        }
    }
    lines
}

fn step_line(row: &StepRowView) -> String {
    let marker = match row.status {
        StepStatus::Complete => "[x]",
        StepStatus::InProgress => "[>]",
        StepStatus::Pending => "[ ]",
    };
    let mut line = format!("{marker} {}", row.label);
    if let Some(message) = &row.message {
        line.push_str(&format!(": {message}"));
    }
    if let Some(progress) = row.progress {
        line.push_str(&format!(" ({progress:.0}%)"));
    }
    line
}

fn new_report<'a>(previous: &AppViewModel, next: &'a AppViewModel) -> Option<&'a str> {
    let report = next.snapshot.final_report.as_deref()?;
    let already_shown =
        previous.conn == next.conn && previous.snapshot.final_report.as_deref() == Some(report);
    (!already_shown).then_some(report)
}

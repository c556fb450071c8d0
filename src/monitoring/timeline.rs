//! Execution Timeline
//!
//! Records when each step run starts and how it ends, for the summary
//! printed after the interactive session.

use std::fmt::Write;
use std::time::{Duration, Instant};

/// Type of timeline event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    /// Step run started
    Started,
    /// Step run finished successfully
    Completed,
    /// Step run finished with an error
    Failed,
}

/// A single event in the execution timeline.
#[derive(Debug, Clone)]
pub struct TimelineEvent {
    pub step: String,
    pub event_type: EventType,
    pub timestamp: Instant,
}

/// One finished run of a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRecord {
    pub step: String,
    pub duration: Duration,
    pub succeeded: bool,
}

/// Tracks step runs in the order they happen.
///
/// A step may appear several times when it was re-run.
#[derive(Debug, Clone)]
pub struct ExecutionTimeline {
    events: Vec<TimelineEvent>,
    start_time: Instant,
}

impl ExecutionTimeline {
    /// Creates a new timeline starting now.
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            start_time: Instant::now(),
        }
    }

    /// Records an event for a step.
    pub fn add_event(&mut self, step: impl Into<String>, event_type: EventType) {
        self.events.push(TimelineEvent {
            step: step.into(),
            event_type,
            timestamp: Instant::now(),
        });
    }

    pub fn events(&self) -> &[TimelineEvent] {
        &self.events
    }

    /// Total time since the timeline was created.
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Pairs every finish event with the start before it.
    ///
    /// A run still in progress has no record.
    pub fn runs(&self) -> Vec<RunRecord> {
        let mut records = Vec::new();
        let mut started: Option<&TimelineEvent> = None;

        for event in &self.events {
            match event.event_type {
                EventType::Started => started = Some(event),
                EventType::Completed | EventType::Failed => {
                    if let Some(start) = started.take().filter(|s| s.step == event.step) {
                        records.push(RunRecord {
                            step: event.step.clone(),
                            duration: event.timestamp.duration_since(start.timestamp),
                            succeeded: event.event_type == EventType::Completed,
                        });
                    }
                }
            }
        }

        records
    }

    /// Formats one line per finished run plus the total session time.
    pub fn summary(&self) -> String {
        let mut output = String::from("Step runs:\n");

        let runs = self.runs();
        if runs.is_empty() {
            output.push_str("  (none)\n");
        }
        for run in runs {
            let _ = writeln!(
                output,
                "  {} {:30} {:>8.2?}",
                if run.succeeded { "ok  " } else { "FAIL" },
                truncate(&run.step, 30),
                run.duration
            );
        }

        let _ = writeln!(output, "Total: {:.2?}", self.elapsed());
        output
    }
}

impl Default for ExecutionTimeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Truncates a string to `max_len` characters, marking the cut with `~`.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let mut cut: String = s.chars().take(max_len.saturating_sub(1)).collect();
        cut.push('~');
        cut
    }
}

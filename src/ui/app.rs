//! Front-End State Machine
//!
//! `App` owns the executor and is the only code that advances it. Terminal
//! events and run events are fed in by the runtime loop; nothing here talks
//! to the terminal, so the whole flow is testable without one.
//!
//! ```text
//! Initializing --resize--> Running --finished--> Idle --n--> Running
//!                                                 |  \--r--> Running (same step)
//!                                                 \--n at last step--> Finished
//! ```

use crossterm::event::{
    KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseEvent, MouseEventKind,
};
use log::{error, info};
use tokio_util::sync::CancellationToken;

use super::transcript::Transcript;
use crate::error::RunError;
use crate::execution::{spawn_run, CurrentStep, Executor, RunEvent, RunEventSender};
use crate::monitoring::{EventType, ExecutionTimeline};
use crate::workflow::StateStore;

/// Lines scrolled by PageUp/PageDown.
const PAGE_SCROLL: usize = 10;

/// Lines scrolled per mouse wheel notch.
const WHEEL_SCROLL: usize = 3;

/// Where the front-end is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Terminal size not known yet
    Initializing,
    /// The current step's process is in flight
    Running,
    /// The last run finished; waiting for the operator
    Idle,
    /// The operator advanced past the last step
    Finished,
}

/// What the runtime loop should do after an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Continue,
    Quit,
}

/// Interactive session over one workflow.
pub struct App {
    executor: Executor,
    events: RunEventSender,
    store: Option<StateStore>,
    transcript: Option<Transcript>,
    timeline: ExecutionTimeline,
    phase: Phase,
    run_id: u64,
    cancel: Option<CancellationToken>,
    output: Vec<u8>,
    last_result: Option<Result<(), String>>,
    notice: Option<String>,
    scroll_back: usize,
    output_rows: usize,
    spinner: usize,
}

impl App {
    /// Creates the front-end for a prepared executor.
    pub fn new(executor: Executor, events: RunEventSender) -> Self {
        Self {
            executor,
            events,
            store: None,
            transcript: None,
            timeline: ExecutionTimeline::new(),
            phase: Phase::Initializing,
            run_id: 0,
            cancel: None,
            output: Vec::new(),
            last_result: None,
            notice: None,
            scroll_back: 0,
            output_rows: 0,
            spinner: 0,
        }
    }

    /// Saves executor state to `store` after every change.
    pub fn with_state_store(mut self, store: StateStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Copies all displayed output to `transcript`.
    pub fn with_transcript(mut self, transcript: Transcript) -> Self {
        self.transcript = Some(transcript);
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    pub fn current_step(&self) -> Option<CurrentStep<'_>> {
        self.executor.current_step().ok()
    }

    /// Output of the current run, as received so far.
    pub fn output(&self) -> &[u8] {
        &self.output
    }

    /// Result of the last finished run, rendered for display.
    pub fn last_result(&self) -> Option<&Result<(), String>> {
        self.last_result.as_ref()
    }

    /// Problem worth showing that is not tied to a run (e.g. state saving).
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    /// Lines the output view is scrolled up from the bottom.
    pub fn scroll_back(&self) -> usize {
        self.scroll_back
    }

    /// Number of lines the output view shows, as of the last draw.
    pub fn set_output_rows(&mut self, rows: usize) {
        self.output_rows = rows;
        self.scroll_back = self.scroll_back.min(self.max_scroll_back());
    }

    /// Lines in the output, counted the way the view splits them.
    pub fn output_line_count(&self) -> usize {
        let newlines = self.output.iter().filter(|&&b| b == b'\n').count();
        match self.output.last() {
            Some(b'\n') | None => newlines,
            Some(_) => newlines + 1,
        }
    }

    fn max_scroll_back(&self) -> usize {
        self.output_line_count().saturating_sub(self.output_rows)
    }

    fn scroll_up(&mut self, lines: usize) {
        self.scroll_back = self.scroll_back.saturating_add(lines).min(self.max_scroll_back());
    }

    fn scroll_down(&mut self, lines: usize) {
        self.scroll_back = self.scroll_back.saturating_sub(lines);
    }

    pub fn spinner(&self) -> usize {
        self.spinner
    }

    pub fn timeline(&self) -> &ExecutionTimeline {
        &self.timeline
    }

    /// Stops any in-flight run and returns the timeline.
    pub fn shutdown(mut self) -> ExecutionTimeline {
        self.cancel_run();
        self.timeline
    }

    /// Terminal size became known or changed.
    pub fn resize(&mut self, width: u16, height: u16) {
        if self.phase == Phase::Initializing {
            info!("Terminal ready ({}x{})", width, height);
            self.start_run();
        }
    }

    /// Advances the spinner animation.
    pub fn tick(&mut self) {
        if self.phase == Phase::Running {
            self.spinner = self.spinner.wrapping_add(1);
        }
    }

    /// Handles a key press.
    pub fn handle_key(&mut self, key: KeyEvent) -> Action {
        if key.kind != KeyEventKind::Press {
            return Action::Continue;
        }

        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                return self.quit()
            }
            KeyCode::Char('q') | KeyCode::Esc => return self.quit(),
            KeyCode::Char('n') if self.phase == Phase::Idle => self.advance(),
            KeyCode::Char('r') if self.phase == Phase::Idle => self.start_run(),
            KeyCode::Up => self.scroll_up(1),
            KeyCode::Down => self.scroll_down(1),
            KeyCode::PageUp => self.scroll_up(PAGE_SCROLL),
            KeyCode::PageDown => self.scroll_down(PAGE_SCROLL),
            KeyCode::Home => self.scroll_back = self.max_scroll_back(),
            KeyCode::End => self.scroll_back = 0,
            _ => {}
        }
        Action::Continue
    }

    /// Scrolls the output view with the mouse wheel.
    pub fn handle_mouse(&mut self, mouse: MouseEvent) {
        match mouse.kind {
            MouseEventKind::ScrollUp => self.scroll_up(WHEEL_SCROLL),
            MouseEventKind::ScrollDown => self.scroll_down(WHEEL_SCROLL),
            _ => {}
        }
    }

    /// Applies an event from a background run.
    pub fn handle_run_event(&mut self, event: RunEvent) {
        if event.run_id() != self.run_id || self.phase != Phase::Running {
            return;
        }

        match event {
            RunEvent::Output { data, .. } => {
                if let Some(transcript) = self.transcript.as_mut() {
                    transcript.output(&data);
                }
                self.output.extend_from_slice(&data);
            }
            RunEvent::Finished { outcome, .. } => {
                self.cancel = None;
                let result = self.executor.complete_run(outcome);
                self.finish_run(result);
                self.persist();
            }
        }
    }

    fn quit(&mut self) -> Action {
        info!("Quit requested");
        self.cancel_run();
        Action::Quit
    }

    fn cancel_run(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
    }

    fn advance(&mut self) {
        match self.executor.next_step() {
            Ok(_) => {
                self.persist();
                self.start_run();
            }
            Err(e) if e.is_end_of_workflow() => {
                info!("Workflow finished");
                self.phase = Phase::Finished;
            }
            Err(e) => {
                error!("Cannot advance: {}", e);
                self.notice = Some(e.to_string());
            }
        }
    }

    /// Runs the current step, replacing whatever the last run showed.
    fn start_run(&mut self) {
        self.run_id += 1;
        self.output.clear();
        self.scroll_back = 0;
        self.last_result = None;
        self.phase = Phase::Running;

        let (index, name) = match self.executor.current_step() {
            Ok(current) => (current.index, current.name.to_string()),
            Err(e) => {
                self.finish_run(Err(e.into()));
                return;
            }
        };
        self.timeline.add_event(name.as_str(), EventType::Started);
        if let Some(transcript) = self.transcript.as_mut() {
            transcript.begin_step(index, self.executor.len(), &name);
        }

        let cancel = CancellationToken::new();
        let started = self
            .executor
            .prepare_run(cancel.clone())
            .and_then(|handle| spawn_run(self.run_id, handle, self.events.clone()));

        match started {
            Ok(_) => self.cancel = Some(cancel),
            Err(e) => self.finish_run(Err(e)),
        }
    }

    fn finish_run(&mut self, result: Result<(), RunError>) {
        if let Ok(current) = self.executor.current_step() {
            let event_type = if result.is_ok() {
                EventType::Completed
            } else {
                EventType::Failed
            };
            self.timeline.add_event(current.name, event_type);
        }
        if let Some(transcript) = self.transcript.as_mut() {
            transcript.end_step(&result);
        }

        self.last_result = Some(result.map_err(|e| e.to_string()));
        self.phase = Phase::Idle;
        self.spinner = 0;
    }

    fn persist(&mut self) {
        let Some(store) = self.store.as_ref() else {
            return;
        };
        match store.save(self.executor.state()) {
            Ok(()) => self.notice = None,
            Err(e) => {
                error!("{}", e);
                self.notice = Some(e.to_string());
            }
        }
    }
}

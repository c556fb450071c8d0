//! Terminal runtime: owns raw mode and the alternate screen, and runs the
//! event loop that feeds terminal input, run events and ticks into [`App`].

use std::io::{self, Stdout};
use std::time::Duration;

use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture, Event, EventStream},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures_util::StreamExt;
use log::{debug, warn};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::time::{self, MissedTickBehavior};

use super::app::{Action, App};
use super::view;
use crate::execution::RunEventReceiver;

type Term = Terminal<CrosstermBackend<Stdout>>;

const TICK_INTERVAL: Duration = Duration::from_millis(100);

fn setup_terminal() -> io::Result<Term> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    Terminal::new(CrosstermBackend::new(stdout))
}

fn cleanup_terminal(terminal: &mut Term) -> io::Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()
}

/// Runs the interactive session until the operator quits.
///
/// The terminal is restored on every exit path. The app is returned so the
/// caller can report on the session.
pub async fn run_app(mut app: App, run_events: RunEventReceiver) -> io::Result<App> {
    let mut terminal = setup_terminal()?;
    let result = event_loop(&mut terminal, &mut app, run_events).await;

    if let Err(e) = cleanup_terminal(&mut terminal) {
        warn!("Failed to restore terminal: {}", e);
    }
    result.map(|()| app)
}

/// Draws a frame and tells the app how much output fits on screen.
fn render(terminal: &mut Term, app: &mut App) -> io::Result<()> {
    let mut output_rows = 0;
    terminal.draw(|frame| output_rows = view::draw(frame, app))?;
    app.set_output_rows(output_rows);
    Ok(())
}

async fn event_loop(
    terminal: &mut Term,
    app: &mut App,
    mut run_events: RunEventReceiver,
) -> io::Result<()> {
    let mut input = EventStream::new();
    let mut ticker = time::interval(TICK_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    render(terminal, app)?;
    let size = terminal.size()?;
    app.resize(size.width, size.height);

    loop {
        render(terminal, app)?;

        tokio::select! {
            maybe_event = input.next() => match maybe_event {
                Some(Ok(Event::Key(key))) => {
                    if app.handle_key(key) == Action::Quit {
                        return Ok(());
                    }
                }
                Some(Ok(Event::Mouse(mouse))) => app.handle_mouse(mouse),
                Some(Ok(Event::Resize(width, height))) => app.resize(width, height),
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e),
                None => {
                    debug!("Terminal input closed");
                    return Ok(());
                }
            },
            Some(event) = run_events.recv() => app.handle_run_event(event),
            _ = ticker.tick() => app.tick(),
        }
    }
}

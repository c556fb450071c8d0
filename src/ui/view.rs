//! Rendering of [`App`] with ratatui.

use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use super::app::{App, Phase};
use crate::execution::CurrentStep;

const SPINNER_FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const KEY_HELP: &str = "n: next step • r: rerun • q: quit";

/// Draws the whole screen for the app's current phase.
///
/// Returns how many output lines fit on screen, or 0 when no output view
/// was drawn.
pub fn draw(frame: &mut Frame, app: &App) -> usize {
    match app.phase() {
        Phase::Initializing => {
            draw_message(frame, "Initializing...");
            0
        }
        Phase::Finished => {
            draw_finished(frame, app);
            0
        }
        Phase::Running | Phase::Idle => draw_step(frame, app),
    }
}

fn draw_message(frame: &mut Frame, message: &str) {
    frame.render_widget(Paragraph::new(message), frame.area());
}

fn draw_finished(frame: &mut Frame, app: &App) {
    let mut lines = vec![
        Line::from("Workflow finished.".bold()),
        Line::default(),
        Line::from("Captured outputs:"),
    ];

    let mut outputs: Vec<_> = app.executor().captured_outputs().iter().collect();
    outputs.sort();
    if outputs.is_empty() {
        lines.push(Line::from("  (none)".dark_gray()));
    }
    for (name, value) in outputs {
        lines.push(Line::from(vec![
            Span::raw("  "),
            Span::styled(name.clone(), Style::default().fg(Color::Cyan)),
            Span::raw(format!(" = {}", value)),
        ]));
    }
    lines.push(Line::default());
    lines.push(Line::from("q: quit".dark_gray()));

    frame.render_widget(Paragraph::new(lines), frame.area());
}

fn draw_step(frame: &mut Frame, app: &App) -> usize {
    let Some(current) = app.current_step() else {
        draw_message(frame, "No current step");
        return 0;
    };

    let details = step_details(app, &current);
    let details_height = (details.height() as u16).saturating_add(2);
    let [header, details_area, output_area, footer] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Max(details_height),
        Constraint::Min(3),
        Constraint::Length(1),
    ])
    .areas(frame.area());

    let title = Line::from(vec![
        Span::styled(
            current.name.to_string(),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!(" ({}/{})", current.index + 1, app.executor().len())),
    ]);
    frame.render_widget(Paragraph::new(title), header);

    frame.render_widget(
        Paragraph::new(details)
            .wrap(Wrap { trim: false })
            .block(Block::default().borders(Borders::ALL).title("Step")),
        details_area,
    );

    let output_rows = draw_output(frame, app, output_area);
    frame.render_widget(Paragraph::new(footer_line(app)), footer);
    output_rows
}

fn step_details(app: &App, current: &CurrentStep<'_>) -> Text<'static> {
    let step = current.step;
    let mut lines = Vec::new();

    if step.description.trim().is_empty() {
        lines.push(Line::from("(no description provided)".dark_gray()));
    } else {
        lines.extend(step.description.lines().map(|l| Line::from(l.to_string())));
    }

    if !step.inputs.is_empty() {
        lines.push(Line::default());
        lines.push(Line::from("Inputs:".bold()));
        for input in &step.inputs {
            let value = app.executor().captured(&input.name);
            lines.push(parameter_line(&input.name, &input.description, value));
        }
    }

    if !step.outputs.is_empty() {
        lines.push(Line::default());
        lines.push(Line::from("Outputs:".bold()));
        for output in &step.outputs {
            let value = app.executor().captured(&output.name);
            lines.push(parameter_line(&output.name, &output.description, value));
        }
    }

    match app.last_result() {
        Some(Ok(())) => {
            lines.push(Line::default());
            lines.push(Line::from("(Finished successfully)".green()));
        }
        Some(Err(message)) => {
            lines.push(Line::default());
            let status = format!("(Finished with error: {})", message);
            lines.push(Line::from(Span::raw(status).red()));
        }
        None => {}
    }

    Text::from(lines)
}

fn parameter_line(name: &str, description: &str, value: Option<&str>) -> Line<'static> {
    let mut spans = vec![
        Span::raw("  "),
        Span::styled(name.to_string(), Style::default().fg(Color::Cyan)),
    ];
    if !description.is_empty() {
        spans.push(Span::raw(format!(": {}", description)));
    }
    match value {
        Some(value) => spans.push(Span::raw(format!(" = {}", value)).green()),
        None => spans.push(Span::raw(" (not set)").dark_gray()),
    }
    Line::from(spans)
}

fn draw_output(frame: &mut Frame, app: &App, area: Rect) -> usize {
    let text = String::from_utf8_lossy(app.output());
    let lines: Vec<Line> = text
        .lines()
        .map(|l| Line::from(last_carriage_segment(l).to_string()))
        .collect();

    let visible = area.height.saturating_sub(2) as usize;
    let top = scroll_top(lines.len(), visible, app.scroll_back());

    let title = if app.scroll_back() > 0 && lines.len() > visible {
        "Output (scrolled, End to follow)"
    } else {
        "Output"
    };
    let paragraph = Paragraph::new(lines)
        .scroll((top.min(u16::MAX as usize) as u16, 0))
        .block(Block::default().borders(Borders::ALL).title(title));
    frame.render_widget(paragraph, area);
    visible
}

/// First visible line when the view is `scroll_back` lines above the bottom.
fn scroll_top(total: usize, visible: usize, scroll_back: usize) -> usize {
    let bottom = total.saturating_sub(visible);
    bottom - scroll_back.min(bottom)
}

/// Progress bars redraw a line with `\r`; only the last redraw is shown.
fn last_carriage_segment(line: &str) -> &str {
    line.trim_end_matches('\r').rsplit('\r').next().unwrap_or(line)
}

fn footer_line(app: &App) -> Line<'static> {
    let mut spans = Vec::new();
    match (app.phase(), app.last_result()) {
        (Phase::Running, _) => {
            let frame = SPINNER_FRAMES[app.spinner() % SPINNER_FRAMES.len()];
            spans.push(Span::raw(format!("{} running ", frame)).yellow());
        }
        (_, Some(Ok(()))) => spans.push(Span::raw("✔ ").green()),
        (_, Some(Err(_))) => spans.push(Span::raw("✘ ").red()),
        _ => {}
    }
    spans.push(Span::raw(KEY_HELP).dark_gray());
    if let Some(notice) = app.notice() {
        spans.push(Span::raw(format!("  {}", notice)).red());
    }
    Line::from(spans)
}

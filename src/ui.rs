use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Widget},
};

use mathsprint::{util::format_secs, Phase};

use crate::App;

const HORIZONTAL_MARGIN: u16 = 5;
const UPCOMING_EQUATIONS: usize = 3;

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let area = Layout::default()
            .horizontal_margin(HORIZONTAL_MARGIN)
            .constraints([Constraint::Min(0)])
            .split(area)[0];

        match self.session.phase() {
            Phase::Idle => render_splash(self, area, buf),
            Phase::Countdown => render_countdown(self, area, buf),
            Phase::Active => render_game(self, area, buf),
            Phase::Complete => render_score(self, area, buf),
        }
    }
}

// Splits `area` into a vertically centered block of `height` lines and a footer line.
fn centered(area: Rect, height: u16) -> (Rect, Rect) {
    let padding = area.height.saturating_sub(height + 1) / 2;
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(padding),
            Constraint::Length(height),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(area);
    (chunks[1], chunks[3])
}

fn footer(text: &str, area: Rect, buf: &mut Buffer) {
    Paragraph::new(Span::styled(
        text.to_string(),
        Style::default().add_modifier(Modifier::DIM | Modifier::ITALIC),
    ))
    .alignment(Alignment::Center)
    .render(area, buf);
}

fn render_splash(app: &App, area: Rect, buf: &mut Buffer) {
    let bold_style = Style::default().add_modifier(Modifier::BOLD);
    let selected_style = Style::default().patch(bold_style).fg(Color::Magenta);
    let dim_style = Style::default().add_modifier(Modifier::DIM);

    let mut lines = vec![
        Line::from(Span::styled("MATH SPRINT", bold_style)),
        Line::from(""),
    ];
    lines.extend(app.round_sizes.iter().enumerate().map(|(idx, &size)| {
        let best = match app.best_for(size) {
            Some(secs) => format!("{}s", format_secs(secs)),
            None => "--".to_string(),
        };
        let (marker, style) = if idx == app.selected {
            ("> ", selected_style)
        } else {
            ("  ", bold_style)
        };
        Line::from(vec![
            Span::styled(format!("{marker}{size:>3} Questions"), style),
            Span::styled(format!("   Best Score {best:>6}"), dim_style),
        ])
    }));

    let (body, foot) = centered(area, lines.len() as u16);
    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .render(body, buf);
    footer("↑/↓ select · enter start round · esc quit", foot, buf);
}

fn render_countdown(app: &App, area: Rect, buf: &mut Buffer) {
    let (body, foot) = centered(area, 1);
    Paragraph::new(Span::styled(
        app.countdown.label(),
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
    ))
    .alignment(Alignment::Center)
    .render(body, buf);
    footer("esc cancel", foot, buf);
}

fn render_game(app: &App, area: Rect, buf: &mut Buffer) {
    let session = &app.session;
    let bold_style = Style::default().add_modifier(Modifier::BOLD);
    let dim_style = Style::default().add_modifier(Modifier::DIM);
    let answered = session.answers().len();
    let total = session.equations().len();

    let status = Line::from(vec![
        Span::styled(format!("{}s", format_secs(session.elapsed_secs())), bold_style),
        Span::styled(
            format!("  +{}s", format_secs(session.penalty_secs())),
            Style::default().fg(Color::Red),
        ),
        Span::styled(format!("  {}/{}", answered, total), dim_style),
    ]);

    let mut lines = vec![status, Line::from("")];

    // the answered equation stays visible, marked, while its feedback lasts
    let previous = match app.feedback {
        Some(feedback) => session.equations().get(feedback.index).map(|eq| {
            let (mark, color) = if feedback.correct {
                ("✓", Color::Green)
            } else {
                ("✗", Color::Red)
            };
            Line::from(Span::styled(
                format!("{eq} {mark}"),
                Style::default().fg(color),
            ))
        }),
        None => None,
    };
    lines.push(previous.unwrap_or_else(|| Line::from("")));

    if let Some(current) = session.current_equation() {
        lines.push(Line::from(Span::styled(
            current.text.clone(),
            Style::default().patch(bold_style).fg(Color::Cyan),
        )));
    }
    lines.extend(
        session
            .equations()
            .iter()
            .skip(answered + 1)
            .take(UPCOMING_EQUATIONS)
            .map(|eq| Line::from(Span::styled(eq.text.clone(), dim_style))),
    );

    let (body, foot) = centered(area, (3 + 1 + UPCOMING_EQUATIONS) as u16);
    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .render(body, buf);
    footer("← wrong (f) · right (t) → · esc abandon", foot, buf);
}

fn render_score(app: &App, area: Rect, buf: &mut Buffer) {
    let Some(result) = app.session.result() else {
        return;
    };
    let bold_style = Style::default().add_modifier(Modifier::BOLD);
    let italic_style = Style::default().add_modifier(Modifier::ITALIC);

    let mut lines = vec![
        Line::from(Span::styled("Your Time", italic_style)),
        Line::from(Span::styled(
            format!("{}s", format_secs(result.final_time_secs)),
            Style::default().patch(bold_style).fg(Color::Magenta),
        )),
        Line::from(""),
        Line::from(format!("Base Time: {}s", format_secs(result.elapsed_secs))),
        Line::from(Span::styled(
            format!("Penalty: +{}s", format_secs(result.penalty_secs)),
            Style::default().fg(Color::Red),
        )),
        Line::from(format!(
            "{}/{} correct",
            result.correct_count, result.question_count
        )),
        Line::from(""),
    ];

    lines.push(if result.is_new_best {
        Line::from(Span::styled(
            "New best!",
            Style::default().patch(bold_style).fg(Color::Green),
        ))
    } else {
        match result.best_time_secs {
            Some(best) => Line::from(format!("Best: {}s", format_secs(best))),
            None => Line::from(""),
        }
    });

    if let Some(status) = &app.status {
        lines.push(Line::from(Span::styled(
            status.clone(),
            Style::default().fg(Color::Yellow),
        )));
    }

    let (body, foot) = centered(area, lines.len() as u16);
    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .render(body, buf);
    footer("enter play again · esc quit", foot, buf);
}

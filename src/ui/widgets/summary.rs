// src/ui/widgets/summary.rs

use crate::app::{App, AppState};
use crate::core::models::TrustBand;
use ratatui::{
    prelude::*,
    text::Line,
    widgets::{Block, Borders, Gauge, Paragraph},
};

/// Renders the summary sidebar: final score, trust band gauge, and the
/// include/exclude tallies.
pub fn render_summary(frame: &mut Frame, app: &App, area: Rect) {
    let summary_container = Block::default().borders(Borders::ALL).title("Summary");
    frame.render_widget(summary_container, area);

    let summary_chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3), // Score & band
            Constraint::Length(1), // Gauge
            Constraint::Length(2), // Spacer
            Constraint::Length(5), // Module tallies
            Constraint::Min(0),
        ])
        .split(area);

    if !matches!(app.state, AppState::Finished) {
        return;
    }

    // --- Score & Band ---
    let band = app.summary.band.unwrap_or(TrustBand::Unreachable);
    let band_style = Style::default().fg(match band {
        TrustBand::CanBeTrusted => Color::Green,
        TrustBand::UseWithCaution => Color::Yellow,
        TrustBand::PotentiallyUnsafe => Color::Red,
        TrustBand::Unreachable => Color::Gray,
    });
    let score_line = match app.summary.final_score {
        Some(score) => Line::from(format!("{score:.2}/5.00 ({})", band.label())).style(band_style),
        None => Line::from(band.label()).style(band_style),
    };
    let score_text = Text::from(vec![Line::from("Trust Score".bold()), score_line]);
    frame.render_widget(
        Paragraph::new(score_text).alignment(Alignment::Center),
        summary_chunks[0],
    );

    // --- Gauge ---
    if let Some(score) = app.summary.final_score {
        let percent = ((score / 5.0) * 100.0).round().clamp(0.0, 100.0) as u16;
        let gauge = Gauge::default()
            .percent(percent)
            .label("")
            .style(band_style);
        frame.render_widget(gauge, summary_chunks[1]);
    }

    // --- Module Tallies ---
    let modules_block = Block::default().title("MODULES".bold());
    let tally_text = Text::from(vec![
        Line::from(vec![
            Span::raw("Included: "),
            Span::styled(
                app.summary.included.to_string(),
                Style::default().fg(Color::Green),
            ),
        ]),
        Line::from(vec![
            Span::raw("Errors: "),
            Span::styled(
                app.summary.errors.to_string(),
                Style::default().fg(Color::Red),
            ),
        ]),
        Line::from(vec![
            Span::raw("No data: "),
            Span::styled(
                app.summary.no_data.to_string(),
                Style::default().fg(Color::Yellow),
            ),
        ]),
    ]);
    frame.render_widget(
        Paragraph::new(tally_text).block(modules_block),
        summary_chunks[3],
    );
}

// src/ui/widgets/report_view.rs

use crate::app::{App, AppState};
use crate::core::config::SCORE_WEIGHTS;
use crate::core::models::{Exclusion, ScanReport, TrustBand};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, Wrap},
};

/// Renders the main report area for the current application state.
pub fn render_report(frame: &mut Frame, app: &mut App, area: Rect) {
    let report_block = Block::default().borders(Borders::ALL).title("Trust Report");

    match app.state {
        AppState::Idle => {
            let instructions = Paragraph::new(
                "Enter a URL and press Enter to score it.\nPress 'q' to quit.",
            )
            .block(report_block)
            .wrap(Wrap { trim: true });
            frame.render_widget(instructions, area);
        }
        AppState::Scanning => {
            let scanning_text = Paragraph::new("Running all checks... Please wait.")
                .block(report_block)
                .style(Style::default().fg(Color::Cyan));
            frame.render_widget(scanning_text, area);
        }
        AppState::Finished => {
            let Some(verdict) = &app.verdict else {
                return;
            };
            let text = build_report_text(&verdict.report);
            let line_count = text.lines.len();

            let paragraph = Paragraph::new(text)
                .block(report_block)
                .wrap(Wrap { trim: false })
                .scroll((app.scroll_offset as u16, 0));
            frame.render_widget(paragraph, area);

            app.report_scroll_state = app
                .report_scroll_state
                .content_length(line_count)
                .position(app.scroll_offset);
            frame.render_stateful_widget(
                Scrollbar::new(ScrollbarOrientation::VerticalRight),
                area,
                &mut app.report_scroll_state,
            );
        }
    }
}

/// Turns a `ScanReport` into styled text: score banner first, then the
/// per-module breakdown with error/no-data modules visually set apart.
fn build_report_text(report: &ScanReport) -> Text<'static> {
    let mut lines: Vec<Line> = Vec::new();

    if let Some(message) = &report.connection_error {
        lines.push(Line::from(Span::styled(
            "Cannot connect to the website",
            Style::default().fg(Color::Red).bold(),
        )));
        lines.push(Line::from(format!("Reason: {message}")));
        lines.push(Line::from(
            "The site may be temporarily down, blocked by a firewall, or offline. \
This does not by itself indicate malicious intent.",
        ));
        return Text::from(lines);
    }

    let band = report.band();
    let band_style = Style::default().fg(band_color(band)).bold();
    let score_text = report
        .final_score
        .map(|s| format!("{s:.2} / 5.00"))
        .unwrap_or_else(|| "-".to_string());
    lines.push(Line::from(vec![
        Span::raw("Trust score: "),
        Span::styled(score_text, band_style),
        Span::raw("  |  "),
        Span::styled(band.label(), band_style),
    ]));
    lines.push(Line::from(""));

    // Walk the weight table so modules always render in the same order.
    for (name, _) in SCORE_WEIGHTS {
        let exclusion = report
            .excluded
            .get(name)
            .copied()
            .unwrap_or(Exclusion::Included);
        let displayed = report.component_scores.get(name).copied().unwrap_or(0.0);

        let header = match exclusion {
            Exclusion::Included => Line::from(vec![
                Span::styled(format!("{name}"), Style::default().bold()),
                Span::raw("  "),
                Span::styled(
                    format!("{displayed:.1}/10"),
                    Style::default().fg(subscore_color(displayed)),
                ),
            ]),
            Exclusion::Error => Line::from(vec![
                Span::styled(format!("{name}"), Style::default().bold()),
                Span::raw("  "),
                Span::styled("[error - excluded]", Style::default().fg(Color::Red)),
            ]),
            Exclusion::NoData => Line::from(vec![
                Span::styled(format!("{name}"), Style::default().bold()),
                Span::raw("  "),
                Span::styled("[no data - excluded]", Style::default().fg(Color::Yellow)),
            ]),
        };
        lines.push(header);

        if let Some(details) = report.details.get(name) {
            for detail in details {
                lines.push(Line::from(format!("  {detail}")));
            }
        }
        lines.push(Line::from(""));
    }

    Text::from(lines)
}

fn band_color(band: TrustBand) -> Color {
    match band {
        TrustBand::CanBeTrusted => Color::Green,
        TrustBand::UseWithCaution => Color::Yellow,
        TrustBand::PotentiallyUnsafe => Color::Red,
        TrustBand::Unreachable => Color::Gray,
    }
}

fn subscore_color(displayed: f64) -> Color {
    if displayed >= 7.0 {
        Color::Green
    } else if displayed >= 4.0 {
        Color::Yellow
    } else {
        Color::Red
    }
}

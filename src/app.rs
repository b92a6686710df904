// src/app.rs

use crate::core::models::{Exclusion, ScanVerdict, TrustBand};
use ratatui::widgets::ScrollbarState;

pub enum AppState {
    Idle,
    Scanning,
    Finished,
}

/// Headline numbers derived from the last report for the summary bar.
#[derive(Debug, Default)]
pub struct ScanSummary {
    pub final_score: Option<f64>,
    pub band: Option<TrustBand>,
    pub included: usize,
    pub errors: usize,
    pub no_data: usize,
}

pub struct App {
    pub should_quit: bool,
    pub state: AppState,
    pub input: String,
    pub verdict: Option<ScanVerdict>,
    pub summary: ScanSummary,
    pub scroll_offset: usize,
    pub report_scroll_state: ScrollbarState,
}

impl App {
    pub fn new() -> Self {
        Self {
            should_quit: false,
            state: AppState::Idle,
            input: String::new(),
            verdict: None,
            summary: ScanSummary::default(),
            scroll_offset: 0,
            report_scroll_state: ScrollbarState::default(),
        }
    }

    pub fn scroll_up(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_sub(1);
        self.report_scroll_state = self.report_scroll_state.position(self.scroll_offset);
    }

    pub fn scroll_down(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_add(1);
        self.report_scroll_state = self.report_scroll_state.position(self.scroll_offset);
    }

    /// Recomputes the summary bar from the current verdict.
    pub fn update_summary(&mut self) {
        let Some(verdict) = &self.verdict else {
            self.summary = ScanSummary::default();
            return;
        };
        let report = &verdict.report;

        let included = report
            .excluded
            .values()
            .filter(|e| **e == Exclusion::Included)
            .count();
        let errors = report
            .excluded
            .values()
            .filter(|e| **e == Exclusion::Error)
            .count();
        let no_data = report
            .excluded
            .values()
            .filter(|e| **e == Exclusion::NoData)
            .count();

        self.summary = ScanSummary {
            final_score: report.final_score,
            band: Some(report.band()),
            included,
            errors,
            no_data,
        };
    }

    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    pub fn reset(&mut self) {
        self.state = AppState::Idle;
        self.input = String::new();
        self.verdict = None;
        self.summary = ScanSummary::default();
        self.scroll_offset = 0;
        self.report_scroll_state = ScrollbarState::default();
    }
}

// src/main.rs

use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::prelude::*;
use std::io::stdout;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

mod app;
mod core;
mod logging;
mod ui;

use app::{App, AppState};
use core::config::ScanOptions;
use core::models::ScanVerdict;
use core::services::reviews::InMemoryReviewStore;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    logging::initialize_logging()?;

    // --- Setup ---
    stdout().execute(EnterAlternateScreen)?;
    stdout().execute(EnableMouseCapture)?;
    enable_raw_mode()?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
    terminal.clear()?;

    let mut app = App::new();
    let review_store = Arc::new(InMemoryReviewStore::new());
    // Completed scans arrive over this channel; the scan itself runs on its
    // own task so the UI never blocks on network work.
    let (tx, mut rx) = mpsc::channel::<ScanVerdict>(1);

    while !app.should_quit {
        terminal.draw(|frame| ui::render(&mut app, frame))?;

        if event::poll(Duration::from_millis(100))? {
            handle_events(&mut app, &tx, &review_store)?;
        }

        if let Ok(verdict) = rx.try_recv() {
            app.verdict = Some(verdict);
            app.state = AppState::Finished;
            app.update_summary();
        }
    }

    // --- Restore Terminal ---
    stdout().execute(LeaveAlternateScreen)?;
    stdout().execute(DisableMouseCapture)?;
    disable_raw_mode()?;
    Ok(())
}

/// Single event handler keeping the main loop readable.
fn handle_events(
    app: &mut App,
    tx: &mpsc::Sender<ScanVerdict>,
    review_store: &Arc<InMemoryReviewStore>,
) -> color_eyre::Result<()> {
    if let Event::Key(key) = event::read()? {
        if key.kind == KeyEventKind::Press {
            match app.state {
                AppState::Idle => handle_idle_input(app, key.code, tx, review_store),
                AppState::Finished => handle_finished_input(app, key.code),
                AppState::Scanning => {
                    if key.code == KeyCode::Char('q') {
                        app.quit();
                    }
                }
            }
        }
    }
    Ok(())
}

/// Input handling while the app waits for a URL.
fn handle_idle_input(
    app: &mut App,
    key_code: KeyCode,
    tx: &mpsc::Sender<ScanVerdict>,
    review_store: &Arc<InMemoryReviewStore>,
) {
    match key_code {
        KeyCode::Char('q') => app.quit(),
        KeyCode::Char(c) => app.input.push(c),
        KeyCode::Backspace => {
            app.input.pop();
        }
        KeyCode::Enter => {
            if app.input.is_empty() {
                return;
            }
            app.state = AppState::Scanning;
            let tx_clone = tx.clone();
            let target = app.input.clone();
            let store = Arc::clone(review_store);

            tokio::spawn(async move {
                let options = ScanOptions::default();
                let verdict = core::scan::scan_url(&target, &options, store.as_ref(), None).await;
                let _ = tx_clone.send(verdict).await;
            });
        }
        _ => {}
    }
}

/// Input handling while the report is on screen.
fn handle_finished_input(app: &mut App, key_code: KeyCode) {
    match key_code {
        KeyCode::Char('q') => app.quit(),
        KeyCode::Char('n') => app.reset(),
        KeyCode::Up => app.scroll_up(),
        KeyCode::Down => app.scroll_down(),
        _ => {}
    }
}

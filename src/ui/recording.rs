//! Terminal user interface for recording a voice note.
//!
//! Draws the live spectrum as mirrored bars with a one-line footer carrying
//! the status indicator and elapsed time, and maps key presses to recorder
//! controls.

use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    prelude::*,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Paragraph, Sparkline},
};
use std::io::{stdout, Stdout};
use std::time::Duration;

use crate::recorder::RecorderState;

/// Percentage of the analysis bins drawn; the top of the range carries little speech.
const VISIBLE_BINS_PERCENT: usize = 70;

/// User input command during recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingCommand {
    /// No key, or a key with no binding
    Continue,
    /// Stop and keep the voice note (Enter)
    Stop,
    /// Discard the voice note (Escape, 'q' or Ctrl+C)
    Cancel,
    /// Pause/resume (Space)
    TogglePause,
}

/// Full-screen recording view.
pub struct RecordingScreen {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl RecordingScreen {
    /// Enters raw mode and the alternate screen.
    ///
    /// # Errors
    /// - If raw mode cannot be enabled
    /// - If the alternate screen cannot be entered
    pub fn new() -> anyhow::Result<Self> {
        enable_raw_mode()?;
        let mut stdout = stdout();
        execute!(stdout, EnterAlternateScreen)?;

        let terminal = Terminal::new(CrosstermBackend::new(stdout))?;
        Ok(Self { terminal })
    }

    /// Draws one frame for `state`.
    ///
    /// # Errors
    /// - If terminal rendering fails
    pub fn render(&mut self, state: &RecorderState) -> anyhow::Result<()> {
        self.terminal.draw(|frame| {
            let area = frame.area();
            let footer_height = 1;

            let content_area = Rect {
                height: area.height.saturating_sub(footer_height),
                ..area
            };
            let top_height = content_area.height / 3 * 2;

            let bars = spectrum_bars(&state.spectrum, content_area.width as usize);

            let top_area = Rect {
                height: top_height,
                ..content_area
            };
            let top = Sparkline::default().data(&bars).max(255).style(
                Style::default()
                    .bg(Color::Rgb(0, 0, 0))
                    .fg(Color::Rgb(206, 224, 220)),
            );
            frame.render_widget(top, top_area);

            let bottom_area = Rect {
                y: content_area.y + top_height,
                height: content_area.height.saturating_sub(top_height),
                ..content_area
            };
            let inverted: Vec<u64> = bars.iter().map(|&v| 255 - v.min(255)).collect();
            let bottom = Sparkline::default().data(&inverted).max(255).style(
                Style::default()
                    .bg(Color::Rgb(185, 207, 212))
                    .fg(Color::Rgb(0, 0, 0)),
            );
            frame.render_widget(bottom, bottom_area);

            let footer_area = Rect {
                y: area.y + area.height.saturating_sub(footer_height),
                height: footer_height,
                ..area
            };
            let footer = Paragraph::new(footer_line(state)).style(
                Style::default()
                    .fg(Color::Rgb(185, 207, 212))
                    .bg(Color::Rgb(0, 0, 0)),
            );
            frame.render_widget(footer, footer_area);
        })?;
        Ok(())
    }

    /// Waits up to `timeout` for a key and maps it to a command.
    ///
    /// # Errors
    /// - If event polling fails
    pub fn handle_input(&mut self, timeout: Duration) -> anyhow::Result<RecordingCommand> {
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                return Ok(command_for_key(key));
            }
        }
        Ok(RecordingCommand::Continue)
    }

    /// Leaves the alternate screen and restores the terminal.
    ///
    /// # Errors
    /// - If terminal mode cannot be disabled
    /// - If cursor cannot be shown
    pub fn cleanup(&mut self) -> anyhow::Result<()> {
        disable_raw_mode()?;
        execute!(self.terminal.backend_mut(), LeaveAlternateScreen)?;
        self.terminal.show_cursor()?;
        Ok(())
    }
}

impl Drop for RecordingScreen {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}

pub(crate) fn command_for_key(key: KeyEvent) -> RecordingCommand {
    if key.kind == KeyEventKind::Release {
        return RecordingCommand::Continue;
    }
    match key.code {
        KeyCode::Enter => {
            tracing::debug!("Enter pressed: stopping recording");
            RecordingCommand::Stop
        }
        KeyCode::Char('q') | KeyCode::Esc => {
            tracing::debug!("Escape or 'q' pressed: cancelling recording");
            RecordingCommand::Cancel
        }
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            tracing::debug!("Ctrl+C pressed: cancelling recording");
            RecordingCommand::Cancel
        }
        KeyCode::Char(' ') => RecordingCommand::TogglePause,
        _ => RecordingCommand::Continue,
    }
}

fn footer_line(state: &RecorderState) -> Line<'static> {
    let indicator = if state.is_paused() {
        Span::styled("⏸ ", Style::default().fg(Color::Yellow))
    } else {
        Span::styled("● ", Style::default().fg(Color::Red))
    };
    let hint = if state.is_paused() {
        " / space resume · enter save · esc discard"
    } else {
        " / space pause · enter save · esc discard"
    };
    Line::from(vec![
        indicator,
        Span::raw(format_elapsed(state.elapsed_seconds)),
        Span::raw(hint),
    ])
}

/// `m:ss`
pub(crate) fn format_elapsed(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

/// Maps the lower part of the spectrum onto `width` columns.
///
/// Each column takes the loudest bin it covers; when there are more columns
/// than bins, bins are repeated.
pub(crate) fn spectrum_bars(spectrum: &[u8], width: usize) -> Vec<u64> {
    let visible = (spectrum.len() * VISIBLE_BINS_PERCENT).div_ceil(100);
    let bins = &spectrum[..visible];
    if bins.is_empty() {
        return vec![0; width];
    }

    (0..width)
        .map(|column| {
            let start = column * bins.len() / width;
            let end = ((column + 1) * bins.len() / width).max(start + 1);
            bins[start..end].iter().copied().max().unwrap_or(0) as u64
        })
        .collect()
}

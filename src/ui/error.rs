//! Full-screen error display.
//!
//! Shows a message centered on a red background and reports which key
//! dismissed it, so callers can offer a retry.

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    prelude::*,
    text::{Line, Span},
    widgets::{Paragraph, Wrap},
};
use std::io::{self, Stdout};
use std::time::Duration;

pub struct ErrorScreen {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl ErrorScreen {
    /// Creates a new error screen and enters alternate screen mode.
    ///
    /// # Errors
    /// - If raw mode cannot be enabled
    /// - If alternate screen cannot be entered
    pub fn new() -> anyhow::Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;

        let terminal = Terminal::new(CrosstermBackend::new(stdout))?;
        Ok(ErrorScreen { terminal })
    }

    /// Shows `message` with an optional `hint` below it until a key is pressed.
    ///
    /// Returns the key that dismissed the screen. Text wraps to 80% of the
    /// screen width.
    ///
    /// # Errors
    /// - If terminal rendering fails
    pub fn show_error(&mut self, message: &str, hint: Option<&str>) -> anyhow::Result<KeyCode> {
        let text_style = Style::default()
            .fg(Color::Rgb(255, 255, 255))
            .bg(Color::Rgb(255, 0, 0));

        let mut lines = vec![Line::from(Span::styled(message, text_style))];
        if let Some(hint) = hint {
            lines.push(Line::default());
            lines.push(Line::from(Span::styled(
                hint,
                text_style.add_modifier(Modifier::DIM),
            )));
        }

        loop {
            self.terminal.draw(|frame| {
                let area = frame.area();
                frame
                    .buffer_mut()
                    .set_style(area, Style::default().bg(Color::Rgb(255, 0, 0)));

                let centered_area = Rect {
                    x: area.x + area.width / 10,
                    y: area.y + area.height / 2,
                    width: area.width * 8 / 10,
                    height: area.height / 2,
                };
                let paragraph = Paragraph::new(lines.clone())
                    .alignment(Alignment::Center)
                    .wrap(Wrap { trim: true });
                frame.render_widget(paragraph, centered_area);
            })?;

            if event::poll(Duration::from_millis(100))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind != KeyEventKind::Release {
                        return Ok(key.code);
                    }
                }
            }
        }
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

impl Drop for ErrorScreen {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}

/*
[INPUT]:  WatchSession board snapshots, crossterm input, and log buffer
[OUTPUT]: Ratatui-based TUI run loop, rendering, and log buffer utilities
[POS]:    TUI runtime loop and shared helpers
[UPDATE]: When changing TUI layout, keybindings, or runtime controls
*/

use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use anyhow::Result;
use crossterm::event::{Event as CrosstermEvent, KeyEventKind};
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::fmt::MakeWriter;

use esp_sensor_monitor::WatchSession;

use super::app::AppState;
use super::events::handle_key_event;
use super::terminal::TerminalGuard;
use super::ui::{draw_board, draw_header, draw_logs};

const UI_TICK_INTERVAL: Duration = Duration::from_millis(250);
const INPUT_POLL_INTERVAL: Duration = Duration::from_millis(200);
pub const LOG_BUFFER_CAPACITY: usize = 2000;

pub type LogBufferHandle = Arc<StdMutex<LogBuffer>>;

#[derive(Debug, Default)]
pub struct LogBuffer {
    lines: VecDeque<String>,
    capacity: usize,
}

impl LogBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::new(),
            capacity,
        }
    }

    pub fn push_line(&mut self, line: String) {
        if self.capacity == 0 {
            return;
        }
        if self.lines.len() >= self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.lines.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }
}

fn push_to_buffer(buffer: &LogBufferHandle, line: String) {
    match buffer.lock() {
        Ok(mut guard) => guard.push_line(line),
        Err(poisoned) => poisoned.into_inner().push_line(line),
    }
}

/// `MakeWriter` that routes tracing output into a [`LogBuffer`].
#[derive(Clone)]
pub struct LogWriterFactory {
    buffer: LogBufferHandle,
}

impl LogWriterFactory {
    pub fn new(buffer: LogBufferHandle) -> Self {
        Self { buffer }
    }
}

pub struct LogWriter {
    buffer: LogBufferHandle,
    partial: String,
}

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let chunk = String::from_utf8_lossy(buf);
        self.partial.push_str(&chunk);
        while let Some(pos) = self.partial.find('\n') {
            let line = self.partial[..pos].trim_end_matches('\r').to_string();
            self.partial = self.partial[pos + 1..].to_string();
            push_to_buffer(&self.buffer, line);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.partial.is_empty() {
            let line = std::mem::take(&mut self.partial);
            push_to_buffer(&self.buffer, line);
        }
        Ok(())
    }
}

impl Drop for LogWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

impl<'a> MakeWriter<'a> for LogWriterFactory {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogWriter {
            buffer: self.buffer.clone(),
            partial: String::new(),
        }
    }
}

enum UiEvent {
    Input(CrosstermEvent),
}

pub(super) fn border_style() -> Style {
    Style::default().fg(Color::Magenta)
}

pub(super) fn header_style() -> Style {
    Style::default()
        .fg(Color::Black)
        .bg(Color::Cyan)
        .add_modifier(Modifier::BOLD)
}

pub(super) fn value_style() -> Style {
    Style::default()
        .fg(Color::LightGreen)
        .add_modifier(Modifier::BOLD)
}

/// Run the dashboard until the user quits or `shutdown` fires.
///
/// `exit_after_ticks` stops the loop after that many UI ticks.
pub async fn run_dashboard(
    session: &WatchSession,
    log_buffer: LogBufferHandle,
    shutdown: CancellationToken,
    exit_after_ticks: Option<u64>,
) -> Result<()> {
    let mut terminal = TerminalGuard::new()?;
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let input_shutdown = CancellationToken::new();
    let input_shutdown_clone = input_shutdown.clone();

    tokio::task::spawn_blocking(move || {
        while !input_shutdown_clone.is_cancelled() {
            if crossterm::event::poll(INPUT_POLL_INTERVAL).unwrap_or(false) {
                if let Ok(event) = crossterm::event::read() {
                    if event_tx.send(UiEvent::Input(event)).is_err() {
                        break;
                    }
                }
            }
        }
    });

    let mut app = AppState::new(
        session.url().to_string(),
        session.board().subscribe(),
        log_buffer,
    );

    let mut tick = tokio::time::interval(UI_TICK_INTERVAL);
    let mut should_quit = false;

    while !should_quit {
        tokio::select! {
            _ = tick.tick() => {
                app.ticks += 1;
                if session.is_finished() {
                    app.mark_feed_closed();
                }
                if exit_after_ticks.is_some_and(|limit| app.ticks >= limit) {
                    should_quit = true;
                }
            }
            _ = shutdown.cancelled() => {
                should_quit = true;
            }
            changed = app.board.changed() => {
                if changed.is_err() {
                    app.mark_feed_closed();
                }
            }
            maybe_event = event_rx.recv() => {
                if let Some(UiEvent::Input(CrosstermEvent::Key(key))) = maybe_event {
                    if key.kind == KeyEventKind::Press && handle_key_event(&mut app, key.code) {
                        should_quit = true;
                    }
                }
            }
        }

        terminal.draw(|frame| draw_ui(frame, &app))?;
    }

    input_shutdown.cancel();
    Ok(())
}

fn draw_ui(frame: &mut ratatui::Frame, app: &AppState) {
    let area = frame.area();
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(8),
            Constraint::Min(5),
            Constraint::Length(3),
        ])
        .split(area);

    let snapshot = app.snapshot();
    draw_header(frame, layout[0], app, &snapshot);
    draw_board(frame, layout[1], &snapshot);
    draw_logs(frame, layout[2], &app.log_buffer);
    draw_footer(frame, layout[3], app);
}

fn draw_footer(frame: &mut ratatui::Frame, area: ratatui::layout::Rect, app: &AppState) {
    let key_style = Style::default()
        .fg(Color::Black)
        .bg(Color::Yellow)
        .add_modifier(Modifier::BOLD);
    let line = Line::from(vec![
        Span::styled("[c]", key_style),
        Span::raw(" Clear logs  "),
        Span::styled("[q/Esc]", key_style),
        Span::raw(" Quit  "),
        Span::raw(format!("Status: {}", app.status_message)),
    ]);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style())
        .title("Hotkeys");
    let widget = Paragraph::new(Text::from(vec![line]))
        .block(block)
        .wrap(Wrap { trim: true });
    frame.render_widget(widget, area);
}

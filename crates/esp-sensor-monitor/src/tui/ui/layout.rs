/*
[INPUT]:  AppState connection details and the current board snapshot
[OUTPUT]: Header line with feed URL, status and update count
[POS]:    TUI UI header rendering
[UPDATE]: When changing what the header summarises
*/

use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};

use esp_sensor_feed::BoardSnapshot;

use crate::tui::app::{AppState, FeedStatus};
use crate::tui::runtime::{border_style, header_style};

pub(in crate::tui) fn draw_header(
    frame: &mut ratatui::Frame,
    area: ratatui::layout::Rect,
    app: &AppState,
    snapshot: &BoardSnapshot,
) {
    let status = match app.feed_status {
        FeedStatus::Listening => " LISTENING ",
        FeedStatus::Closed => " CLOSED ",
    };
    let line = Line::from(vec![
        Span::styled(status, header_style()),
        Span::raw(format!("  {}  ", app.url)),
        Span::raw(format!("updates: {}  ", snapshot.revision)),
        Span::raw(format!("uptime: {}s", app.started_at.elapsed().as_secs())),
    ]);
    let widget = Paragraph::new(line).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(border_style())
            .title("Sensor feed"),
    );
    frame.render_widget(widget, area);
}

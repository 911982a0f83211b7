/*
[INPUT]:  BoardSnapshot element texts and update instants
[OUTPUT]: Element table rendered into Ratatui frame
[POS]:    TUI UI display board panel
[UPDATE]: When changing how display elements are presented
*/

use std::time::Instant;

use ratatui::layout::Constraint;
use ratatui::text::Span;
use ratatui::widgets::{Block, Borders, Cell, Row, Table};

use esp_sensor_feed::{BoardSnapshot, ElementState};

use crate::tui::runtime::{border_style, header_style, value_style};

pub(in crate::tui) fn draw_board(
    frame: &mut ratatui::Frame,
    area: ratatui::layout::Rect,
    snapshot: &BoardSnapshot,
) {
    let now = Instant::now();
    let rows = snapshot
        .elements
        .iter()
        .map(|element| {
            Row::new(vec![
                Cell::from(element.id.clone()),
                Cell::from(Span::styled(display_text(element), value_style())),
                Cell::from(age_label(element, now)),
            ])
        })
        .collect::<Vec<_>>();

    let header = Row::new(vec!["Element", "Text", "Updated"]).style(header_style());
    let table = Table::new(
        rows,
        [
            Constraint::Length(14),
            Constraint::Min(24),
            Constraint::Length(14),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(border_style())
            .title("Display"),
    );
    frame.render_widget(table, area);
}

fn display_text(element: &ElementState) -> String {
    if element.text.is_empty() {
        "-".to_string()
    } else {
        element.text.clone()
    }
}

fn age_label(element: &ElementState, now: Instant) -> String {
    match element.updated_at {
        Some(at) => format!("{}s ago", now.saturating_duration_since(at).as_secs()),
        None => "never".to_string(),
    }
}

/*
[INPUT]:  TUI app state and board snapshots for UI components
[OUTPUT]: UI component render functions and module exports
[POS]:    TUI UI module root
[UPDATE]: When adding or removing dashboard panels
*/

mod board;
mod layout;
mod logs;

pub(in crate::tui) use board::draw_board;
pub(in crate::tui) use layout::draw_header;
pub(in crate::tui) use logs::draw_logs;

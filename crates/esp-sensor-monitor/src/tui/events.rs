/*
[INPUT]:  Crossterm key codes
[OUTPUT]: AppState mutations and quit requests
[POS]:    TUI key handling
[UPDATE]: When adding or changing hotkeys
*/

use crossterm::event::KeyCode;

use super::app::AppState;

/// Handles key events for the TUI.
///
/// Returns `true` if quit is requested, `false` otherwise.
pub(super) fn handle_key_event(app: &mut AppState, key: KeyCode) -> bool {
    match key {
        KeyCode::Char('q') | KeyCode::Esc => true,
        KeyCode::Char('c') => {
            app.clear_logs();
            false
        }
        _ => false,
    }
}

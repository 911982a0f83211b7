/*
[INPUT]:  Watch session board snapshots and the log buffer
[OUTPUT]: Ratatui dashboard for live sensor values and logs
[POS]:    TUI module for esp-sensor-monitor binary
[UPDATE]: When changing TUI layout, keybindings, or runtime controls
*/

mod app;
mod events;
mod runtime;
mod terminal;
mod ui;

pub use runtime::{LOG_BUFFER_CAPACITY, LogBuffer, LogBufferHandle, LogWriterFactory, run_dashboard};

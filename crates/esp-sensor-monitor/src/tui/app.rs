/*
[INPUT]:  Board snapshot receiver, feed URL, and log buffer handle
[OUTPUT]: AppState shared by the TUI event handlers and renderers
[POS]:    TUI application state
[UPDATE]: When adding dashboard state or status fields
*/

use std::time::Instant;

use tokio::sync::watch;

use esp_sensor_feed::BoardSnapshot;

use super::runtime::LogBufferHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum FeedStatus {
    Listening,
    Closed,
}

pub(super) struct AppState {
    pub(super) url: String,
    pub(super) board: watch::Receiver<BoardSnapshot>,
    pub(super) log_buffer: LogBufferHandle,
    pub(super) feed_status: FeedStatus,
    pub(super) status_message: String,
    pub(super) started_at: Instant,
    pub(super) ticks: u64,
}

impl AppState {
    pub(super) fn new(
        url: String,
        board: watch::Receiver<BoardSnapshot>,
        log_buffer: LogBufferHandle,
    ) -> Self {
        Self {
            url,
            board,
            log_buffer,
            feed_status: FeedStatus::Listening,
            status_message: "Waiting for device frames".to_string(),
            started_at: Instant::now(),
            ticks: 0,
        }
    }

    pub(super) fn snapshot(&self) -> BoardSnapshot {
        self.board.borrow().clone()
    }

    pub(super) fn mark_feed_closed(&mut self) {
        if self.feed_status == FeedStatus::Closed {
            return;
        }
        self.feed_status = FeedStatus::Closed;
        self.status_message = "Feed closed; press [q] to exit".to_string();
    }

    pub(super) fn clear_logs(&mut self) {
        match self.log_buffer.lock() {
            Ok(mut guard) => guard.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
        self.status_message = "Log view cleared".to_string();
    }
}

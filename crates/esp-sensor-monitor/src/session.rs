/*
[INPUT]:  Feed configuration and a shutdown token
[OUTPUT]: Running listener task bound to a shared DisplayBoard
[POS]:    Orchestration layer - wires socket, listener and board together
[UPDATE]: When changing watch startup order or stop conditions
*/

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use esp_sensor_feed::{DisplayBoard, FeedConfig, FeedListener, FeedSocket, FeedStats};

/// A connected feed listener running in the background.
#[derive(Debug)]
pub struct WatchSession {
    url: String,
    board: Arc<DisplayBoard>,
    shutdown: CancellationToken,
    handle: JoinHandle<FeedStats>,
}

impl WatchSession {
    /// Bind the display, connect to the device and start listening.
    ///
    /// Elements are resolved before the connection is opened so a broken
    /// display never holds a socket.
    pub async fn start(feed: &FeedConfig, shutdown: CancellationToken) -> Result<Self> {
        let board = Arc::new(DisplayBoard::with_tracked_elements());
        let listener = FeedListener::new(board.clone()).context("bind display elements")?;
        listener.on_load().context("format start-up time")?;

        let socket = FeedSocket::connect(feed)
            .await
            .with_context(|| format!("connect to {}", feed.url))?;

        let handle = tokio::spawn(listener.run(socket, shutdown.clone()));
        info!(url = %feed.url, "watch session started");

        Ok(Self {
            url: feed.url.clone(),
            board,
            shutdown,
            handle,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn board(&self) -> &Arc<DisplayBoard> {
        &self.board
    }

    /// `true` once the listener has stopped (socket closed or shutdown).
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Request a stop; [`WatchSession::wait`] returns once it took effect.
    pub fn stop(&self) {
        self.shutdown.cancel();
    }

    pub async fn wait(self) -> Result<FeedStats> {
        self.handle.await.context("join feed listener")
    }
}

/// Cancel `shutdown` once the board has seen `updates` counter updates.
///
/// Each update is one published batch, so board revisions count updates.
pub fn cancel_after_updates(
    board: &DisplayBoard,
    updates: u64,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    let mut snapshots = board.subscribe();

    tokio::spawn(async move {
        loop {
            if snapshots.borrow_and_update().revision >= updates {
                info!(updates, "update limit reached");
                shutdown.cancel();
                return;
            }
            tokio::select! {
                _ = shutdown.cancelled() => return,
                changed = snapshots.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
            }
        }
    })
}

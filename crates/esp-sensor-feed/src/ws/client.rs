/*
[INPUT]:  Device WebSocket URL and connection options
[OUTPUT]: Inbound text frames via a bounded channel
[POS]:    WebSocket layer - owned connection with scoped teardown
[UPDATE]: When changing connection options or frame forwarding rules
*/

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{FeedError, Result};

/// Address the ESP32 firmware announces over mDNS.
pub const DEFAULT_FEED_URL: &str = "ws://esp32-ws.local:8080";

/// Feed connection configuration
#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub url: String,
    pub connect_timeout: Duration,
    /// Frames buffered between the socket reader and the listener.
    pub channel_capacity: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_FEED_URL.to_string(),
            connect_timeout: Duration::from_secs(10),
            channel_capacity: 100,
        }
    }
}

/// Owned connection to the sensor device.
///
/// The reader task lives exactly as long as this value: [`FeedSocket::close`]
/// tears it down and waits for it, dropping the socket cancels it.
#[derive(Debug)]
pub struct FeedSocket {
    frames: mpsc::Receiver<String>,
    shutdown: CancellationToken,
    reader: Option<JoinHandle<()>>,
}

impl FeedSocket {
    /// Connect to the device and start forwarding text frames.
    pub async fn connect(config: &FeedConfig) -> Result<Self> {
        let url = Url::parse(&config.url)?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(FeedError::Config(format!(
                "feed url must use ws:// or wss://, got {}",
                url.scheme()
            )));
        }

        let (ws_stream, _response) =
            tokio::time::timeout(config.connect_timeout, connect_async(url.as_str()))
                .await
                .map_err(|_| FeedError::Timeout {
                    duration: config.connect_timeout.as_secs(),
                })?
                .map_err(|err| FeedError::Connect {
                    url: config.url.clone(),
                    message: err.to_string(),
                })?;

        info!(url = %url, "feed socket connected");

        let (frame_tx, frame_rx) = mpsc::channel(config.channel_capacity.max(1));
        let shutdown = CancellationToken::new();
        let reader = tokio::spawn(read_frames(ws_stream, frame_tx, shutdown.clone()));

        Ok(Self {
            frames: frame_rx,
            shutdown,
            reader: Some(reader),
        })
    }

    /// Socket fed from an in-process channel instead of the network.
    pub fn from_frames(frames: mpsc::Receiver<String>) -> Self {
        Self {
            frames,
            shutdown: CancellationToken::new(),
            reader: None,
        }
    }

    /// Next text frame, `None` once the connection is gone.
    pub async fn recv(&mut self) -> Option<String> {
        self.frames.recv().await
    }

    /// Close the connection and wait for the reader task to finish.
    pub async fn close(mut self) {
        self.shutdown.cancel();
        self.frames.close();
        if let Some(reader) = self.reader.take() {
            if let Err(err) = reader.await {
                warn!(error = %err, "feed socket reader task failed");
            }
        }
    }
}

impl Drop for FeedSocket {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn read_frames(
    ws_stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    frame_tx: mpsc::Sender<String>,
    shutdown: CancellationToken,
) {
    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                let _ = write.send(WsMessage::Close(None)).await;
                break;
            }
            incoming = read.next() => {
                match incoming {
                    Some(Ok(WsMessage::Close(frame))) => {
                        debug!(?frame, "feed socket closed by device");
                        break;
                    }
                    Some(Ok(WsMessage::Ping(_))) | Some(Ok(WsMessage::Pong(_))) => {}
                    Some(Ok(message)) => {
                        let Some(text) = frame_text(message) else {
                            continue;
                        };
                        if frame_tx.send(text).await.is_err() {
                            let _ = write.send(WsMessage::Close(None)).await;
                            break;
                        }
                    }
                    Some(Err(err)) => {
                        warn!(error = %err, "feed socket read failed");
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    info!("feed socket reader stopped");
}

fn frame_text(message: WsMessage) -> Option<String> {
    match message {
        WsMessage::Text(text) => Some(text.to_string()),
        WsMessage::Binary(bytes) => match String::from_utf8(bytes.to_vec()) {
            Ok(text) => Some(text),
            Err(_) => {
                debug!(bytes = bytes.len(), "dropping non-utf8 binary frame");
                None
            }
        },
        _ => None,
    }
}

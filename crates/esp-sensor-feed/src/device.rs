/*
[INPUT]:  Bind address, broadcast interval and connection limits
[OUTPUT]: WebSocket server pushing counter frames like the ESP32 firmware
[POS]:    Device layer - local stand-in for the sensor board
[UPDATE]: When the firmware message format or cadence changes
*/

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_tungstenite::accept_async_with_config;
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::{CloseFrame, WebSocketConfig};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{FeedError, Result};
use crate::ws::FeedMessage;

pub const DEFAULT_DEVICE_BIND: &str = "0.0.0.0:8080";
pub const DEFAULT_COUNTER_INTERVAL: Duration = Duration::from_secs(5);
/// Open sockets the board serves at once.
pub const DEFAULT_MAX_CLIENTS: usize = 5;
/// Largest inbound frame the board accepts; bigger ones close with 1009.
pub const MAX_PAYLOAD_LEN: usize = 1024;
const BROADCAST_CAPACITY: usize = 64;
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Emulated device configuration
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    pub bind: String,
    pub interval: Duration,
    pub max_clients: usize,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_DEVICE_BIND.to_string(),
            interval: DEFAULT_COUNTER_INTERVAL,
            max_clients: DEFAULT_MAX_CLIENTS,
        }
    }
}

/// WebSocket server that broadcasts an incrementing counter to every client.
///
/// The first frame goes out one interval after start and carries the value 1.
/// The firmware sleeps one extra period before its loop starts; the emulator
/// does not. Connections past `max_clients` are dropped before the handshake.
#[derive(Debug)]
pub struct CounterDevice {
    local_addr: SocketAddr,
    shutdown: CancellationToken,
    client_count: Arc<AtomicUsize>,
    sent_count: Arc<AtomicU64>,
    tasks: Vec<JoinHandle<()>>,
}

impl CounterDevice {
    pub async fn start(config: DeviceConfig) -> Result<Self> {
        if config.interval.is_zero() {
            return Err(FeedError::Config(
                "counter interval must be greater than zero".to_string(),
            ));
        }
        if config.max_clients == 0 {
            return Err(FeedError::Config(
                "max clients must be greater than zero".to_string(),
            ));
        }

        let listener = TcpListener::bind(&config.bind).await?;
        let local_addr = listener.local_addr()?;
        info!(addr = %local_addr, interval_ms = config.interval.as_millis() as u64, "counter device listening");

        let (frame_tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        let shutdown = CancellationToken::new();
        let client_count = Arc::new(AtomicUsize::new(0));
        let sent_count = Arc::new(AtomicU64::new(0));

        let ticker = tokio::spawn(run_counter(
            config.interval,
            frame_tx.clone(),
            shutdown.clone(),
            sent_count.clone(),
        ));
        let acceptor = tokio::spawn(accept_clients(
            listener,
            frame_tx,
            shutdown.clone(),
            client_count.clone(),
            config.max_clients,
        ));

        Ok(Self {
            local_addr,
            shutdown,
            client_count,
            sent_count,
            tasks: vec![ticker, acceptor],
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// `ws://` URL a listener can connect to.
    pub fn url(&self) -> String {
        format!("ws://{}", self.local_addr)
    }

    pub fn client_count(&self) -> usize {
        self.client_count.load(Ordering::SeqCst)
    }

    /// Counter frames delivered to at least one client.
    pub fn sent_count(&self) -> u64 {
        self.sent_count.load(Ordering::SeqCst)
    }

    /// Stop accepting, close every client connection and wait for the tasks.
    pub async fn shutdown(mut self) {
        self.shutdown.cancel();
        for handle in self.tasks.drain(..) {
            match tokio::time::timeout(SHUTDOWN_GRACE, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => warn!(error = %err, "counter device task failed"),
                Err(_) => warn!("counter device task did not stop in time"),
            }
        }
        info!("counter device stopped");
    }
}

impl Drop for CounterDevice {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn run_counter(
    interval: Duration,
    frame_tx: broadcast::Sender<String>,
    shutdown: CancellationToken,
    sent_count: Arc<AtomicU64>,
) {
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
    let mut counter: u64 = 0;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                counter += 1;
                let frame = match serde_json::to_string(&FeedMessage::counter(counter)) {
                    Ok(frame) => frame,
                    Err(err) => {
                        warn!(error = %err, "counter frame encode failed");
                        continue;
                    }
                };
                match frame_tx.send(frame) {
                    Ok(receivers) => {
                        sent_count.fetch_add(1, Ordering::SeqCst);
                        debug!(counter, receivers, "counter frame broadcast");
                    }
                    Err(_) => debug!(counter, "no clients connected"),
                }
            }
        }
    }
}

async fn accept_clients(
    listener: TcpListener,
    frame_tx: broadcast::Sender<String>,
    shutdown: CancellationToken,
    client_count: Arc<AtomicUsize>,
    max_clients: usize,
) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) if client_count.load(Ordering::SeqCst) >= max_clients => {
                        warn!(peer = %peer, max_clients, "client limit reached, refusing connection");
                        drop(stream);
                    }
                    Ok((stream, peer)) => {
                        client_count.fetch_add(1, Ordering::SeqCst);
                        let frames = frame_tx.subscribe();
                        let shutdown = shutdown.clone();
                        let client_count = client_count.clone();
                        tokio::spawn(async move {
                            if let Err(err) = serve_client(stream, peer, frames, shutdown).await {
                                debug!(peer = %peer, error = %err, "client disconnected");
                            }
                            client_count.fetch_sub(1, Ordering::SeqCst);
                        });
                    }
                    Err(err) => warn!(error = %err, "accept failed"),
                }
            }
        }
    }
}

async fn serve_client(
    stream: TcpStream,
    peer: SocketAddr,
    mut frames: broadcast::Receiver<String>,
    shutdown: CancellationToken,
) -> Result<()> {
    let ws_config = WebSocketConfig::default()
        .max_message_size(Some(MAX_PAYLOAD_LEN))
        .max_frame_size(Some(MAX_PAYLOAD_LEN));
    let ws_stream = accept_async_with_config(stream, Some(ws_config))
        .await
        .map_err(|err| FeedError::WebSocket(format!("handshake with {peer} failed: {err}")))?;
    info!(peer = %peer, "client connected");

    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                let _ = write.send(WsMessage::Close(None)).await;
                break;
            }
            frame = frames.recv() => {
                match frame {
                    Ok(text) => {
                        write
                            .send(WsMessage::Text(text.into()))
                            .await
                            .map_err(|err| FeedError::WebSocket(err.to_string()))?;
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(peer = %peer, skipped, "client lagged behind counter");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            incoming = read.next() => {
                match incoming {
                    Some(Ok(WsMessage::Text(text))) => {
                        info!(peer = %peer, message = %text.as_str(), "frame received from client");
                    }
                    Some(Ok(WsMessage::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(WsError::Capacity(err))) => {
                        warn!(peer = %peer, error = %err, limit = MAX_PAYLOAD_LEN, "client frame too large");
                        let close = CloseFrame {
                            code: CloseCode::Size,
                            reason: "payload too large".into(),
                        };
                        let _ = write.send(WsMessage::Close(Some(close))).await;
                        break;
                    }
                    Some(Err(err)) => return Err(FeedError::WebSocket(err.to_string())),
                }
            }
        }
    }

    info!(peer = %peer, "client disconnected");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_config(interval: Duration) -> DeviceConfig {
        DeviceConfig {
            bind: "127.0.0.1:0".to_string(),
            interval,
            ..DeviceConfig::default()
        }
    }

    #[test]
    fn test_default_config_matches_firmware() {
        let config = DeviceConfig::default();
        assert_eq!(config.bind, "0.0.0.0:8080");
        assert_eq!(config.interval, Duration::from_secs(5));
        assert_eq!(config.max_clients, 5);
    }

    #[tokio::test]
    async fn test_zero_client_limit_rejected() {
        let config = DeviceConfig {
            max_clients: 0,
            ..local_config(Duration::from_secs(60))
        };
        let err = CounterDevice::start(config).await.unwrap_err();
        assert!(matches!(err, FeedError::Config(_)));
    }

    #[tokio::test]
    async fn test_zero_interval_rejected() {
        let err = CounterDevice::start(local_config(Duration::ZERO))
            .await
            .unwrap_err();
        assert!(matches!(err, FeedError::Config(_)));
    }

    #[tokio::test]
    async fn test_start_reports_bound_address() {
        let device = CounterDevice::start(local_config(Duration::from_secs(60)))
            .await
            .unwrap();
        assert_ne!(device.local_addr().port(), 0);
        assert!(device.url().starts_with("ws://127.0.0.1:"));
        assert_eq!(device.client_count(), 0);
        assert_eq!(device.sent_count(), 0);
        device.shutdown().await;
    }
}

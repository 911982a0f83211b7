/*
[INPUT]:  Test requirements for a local device and display
[OUTPUT]: Shared fixtures for feed integration tests
[POS]:    Test infrastructure - shared across all test modules
[UPDATE]: When adding new test patterns or fixtures
*/

//! Common test utilities for esp-sensor-feed tests

use std::sync::Arc;
use std::time::Duration;

use esp_sensor_feed::{CounterDevice, DeviceConfig, DisplayBoard, FeedConfig};

/// Start an emulated device on an ephemeral loopback port
pub async fn start_device(interval: Duration) -> CounterDevice {
    CounterDevice::start(DeviceConfig {
        bind: "127.0.0.1:0".to_string(),
        interval,
        ..DeviceConfig::default()
    })
    .await
    .expect("start counter device")
}

/// Start an emulated device that serves at most `max_clients` sockets
pub async fn start_device_with_limit(interval: Duration, max_clients: usize) -> CounterDevice {
    CounterDevice::start(DeviceConfig {
        bind: "127.0.0.1:0".to_string(),
        interval,
        max_clients,
    })
    .await
    .expect("start counter device")
}

/// Poll until the device reports `expected` open clients
pub async fn wait_for_clients(device: &CounterDevice, expected: usize) -> bool {
    for _ in 0..100 {
        if device.client_count() == expected {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

/// Feed configuration pointing at a running device
pub fn feed_config(device: &CounterDevice) -> FeedConfig {
    FeedConfig {
        url: device.url(),
        connect_timeout: Duration::from_secs(5),
        ..FeedConfig::default()
    }
}

/// Board holding the four elements the listener expects
pub fn tracked_board() -> Arc<DisplayBoard> {
    Arc::new(DisplayBoard::with_tracked_elements())
}

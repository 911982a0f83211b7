/*
[INPUT]:  Crate modules and public type definitions
[OUTPUT]: Public sensor feed crate surface
[POS]:    Crate root - module wiring
[UPDATE]: When public modules or exports change
*/

pub mod device;
pub mod display;
pub mod error;
pub mod format;
pub mod listener;
pub mod ws;

pub use device::{CounterDevice, DeviceConfig};
pub use display::{BoardSnapshot, DisplayBoard, DisplaySurface, ElementState};
pub use error::{FeedError, Result};
pub use format::{format_timestamp, format_timestamp_in};
pub use listener::{Clock, FeedListener, FeedStats, FrameOutcome, IgnoreReason, SystemClock};
pub use ws::{
    CounterReading,
    DEFAULT_FEED_URL,
    FeedConfig,
    FeedMessage,
    FeedSocket,
    ReadingValue,
    SensorPayload,
};

/*
[INPUT]:  Device WebSocket URL and inbound text frames
[OUTPUT]: Owned feed connection and typed feed messages
[POS]:    WebSocket layer - real-time sensor stream
[UPDATE]: When adding message types or changing connection logic
*/

pub mod client;
pub mod message;

pub use client::{DEFAULT_FEED_URL, FeedConfig, FeedSocket};
pub use message::{CounterReading, FeedMessage, ReadingValue, SensorPayload};

/*
[INPUT]:  Public API exports for esp-sensor-monitor crate
[OUTPUT]: Module declarations and public re-exports
[POS]:    Crate root - library entry point
[UPDATE]: When adding new modules or public exports
*/

pub mod config;
pub mod session;

// Re-export main types for convenience
pub use config::MonitorConfig;
pub use session::{WatchSession, cancel_after_updates};

/*
[INPUT]:  Text frames from a FeedSocket, a DisplaySurface, and a wall clock
[OUTPUT]: Counter value and arrival time written to display elements
[POS]:    Listener layer - frame dispatch (decode -> match -> display writes)
[UPDATE]: When adding handled message types or sensors
*/

use std::sync::atomic::{AtomicUsize, Ordering};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::display::{
    COUNTER_TIME_ID, COUNTER_VALUE_ID, DisplaySurface, LED_PICTURE_ID, SENSOR_TWO_ID,
};
use crate::error::{FeedError, Result};
use crate::format::{format_timestamp, now_millis};
use crate::ws::{FeedMessage, FeedSocket, SensorPayload};

const FAILURE_LOG_LIMIT: usize = 5;
const RAW_LOG_MAX_BYTES: usize = 256;

/// Source of the wall-clock time written next to each reading.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        now_millis()
    }
}

impl<F> Clock for F
where
    F: Fn() -> i64 + Send + Sync,
{
    fn now_millis(&self) -> i64 {
        self()
    }
}

/// What a single frame did to the display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOutcome {
    CounterUpdated { value: String, time: String },
    Ignored(IgnoreReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    UnhandledType,
    UnhandledSensor,
}

/// Frame counters reported when the listening loop ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedStats {
    pub updated: u64,
    pub ignored: u64,
    pub failed: u64,
}

impl FeedStats {
    pub fn total(&self) -> u64 {
        self.updated + self.ignored + self.failed
    }
}

struct BoundElements<H> {
    // Resolved so a page without them fails at bind time; nothing writes here yet.
    #[allow(dead_code)]
    sensor_two: H,
    #[allow(dead_code)]
    led_picture: H,
    counter_value: H,
    counter_time: H,
}

/// Decodes device frames and writes matching readings to the display.
pub struct FeedListener<S: DisplaySurface, C: Clock = SystemClock> {
    surface: S,
    elements: BoundElements<S::Handle>,
    clock: C,
    failures_logged: AtomicUsize,
}

impl<S: DisplaySurface> FeedListener<S, SystemClock> {
    /// Bind to a surface using the system clock.
    pub fn new(surface: S) -> Result<Self> {
        Self::bind(surface, SystemClock)
    }
}

impl<S: DisplaySurface, C: Clock> FeedListener<S, C> {
    /// Resolve every tracked element once.
    ///
    /// Fails with [`FeedError::MissingElement`] if the surface lacks any of
    /// them; no frame is handled against a partial display.
    pub fn bind(surface: S, clock: C) -> Result<Self> {
        let resolve = |id: &str| {
            surface.element(id).ok_or_else(|| FeedError::MissingElement {
                id: id.to_string(),
            })
        };

        let elements = BoundElements {
            sensor_two: resolve(SENSOR_TWO_ID)?,
            led_picture: resolve(LED_PICTURE_ID)?,
            counter_value: resolve(COUNTER_VALUE_ID)?,
            counter_time: resolve(COUNTER_TIME_ID)?,
        };

        Ok(Self {
            surface,
            elements,
            clock,
            failures_logged: AtomicUsize::new(0),
        })
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Log the current formatted time once, as the page did on load.
    pub fn on_load(&self) -> Result<String> {
        let time = format_timestamp(self.clock.now_millis())?;
        info!(time = %time, "feed listener loaded");
        Ok(time)
    }

    /// Handle one raw text frame.
    ///
    /// A counter message writes the reading to `s4_value` and the current
    /// time to `s4_time`; any other message leaves the display untouched.
    pub fn handle_frame(&self, raw: &str) -> Result<FrameOutcome> {
        let message: FeedMessage = serde_json::from_str(raw)?;

        match message {
            FeedMessage::Message { data } => match data {
                SensorPayload::Counter { value } => {
                    let time = format_timestamp(self.clock.now_millis())?;
                    let value = value.parse_counter().to_string();
                    self.surface.set_texts(&[
                        (&self.elements.counter_value, value.as_str()),
                        (&self.elements.counter_time, time.as_str()),
                    ]);
                    Ok(FrameOutcome::CounterUpdated { value, time })
                }
                SensorPayload::Unhandled => Ok(FrameOutcome::Ignored(IgnoreReason::UnhandledSensor)),
            },
            FeedMessage::Unhandled => Ok(FrameOutcome::Ignored(IgnoreReason::UnhandledType)),
        }
    }

    /// Handle frames until the socket closes or `shutdown` fires.
    ///
    /// Frame-level failures are logged and counted; the loop keeps going.
    pub async fn run(self, mut socket: FeedSocket, shutdown: CancellationToken) -> FeedStats {
        let mut stats = FeedStats::default();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("feed listener shutdown requested");
                    break;
                }
                frame = socket.recv() => {
                    let Some(raw) = frame else {
                        info!("feed socket closed");
                        break;
                    };
                    self.record(&raw, self.handle_frame(&raw), &mut stats);
                }
            }
        }

        socket.close().await;
        info!(
            updated = stats.updated,
            ignored = stats.ignored,
            failed = stats.failed,
            "feed listener stopped"
        );
        stats
    }

    fn record(&self, raw: &str, result: Result<FrameOutcome>, stats: &mut FeedStats) {
        match result {
            Ok(FrameOutcome::CounterUpdated { value, time }) => {
                stats.updated += 1;
                info!(sensor = "counter", value = %value, time = %time, "display updated");
            }
            Ok(FrameOutcome::Ignored(reason)) => {
                stats.ignored += 1;
                debug!(?reason, bytes = raw.len(), "frame ignored");
            }
            Err(err) => {
                stats.failed += 1;
                self.log_failure(&err, raw);
            }
        }
    }

    fn log_failure(&self, err: &FeedError, raw: &str) {
        let count = self.failures_logged.fetch_add(1, Ordering::Relaxed);
        let preview = truncate_for_log(raw, RAW_LOG_MAX_BYTES);
        if count < FAILURE_LOG_LIMIT {
            warn!(
                sample_index = count + 1,
                sample_limit = FAILURE_LOG_LIMIT,
                error = %err,
                message = %preview,
                "frame handling failed"
            );
        } else {
            debug!(error = %err, message = %preview, "frame handling failed");
        }
    }
}

fn truncate_for_log(value: &str, max_len: usize) -> String {
    if value.len() <= max_len {
        return value.to_string();
    }
    let mut end = max_len;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    let mut out = String::with_capacity(end + 3);
    out.push_str(&value[..end]);
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::{DisplayBoard, TRACKED_ELEMENT_IDS};
    use crate::format::format_timestamp;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    const FIXED_NOW: i64 = 1_700_000_000_000;

    fn fixed_clock() -> i64 {
        FIXED_NOW
    }

    fn listener() -> FeedListener<Arc<DisplayBoard>, fn() -> i64> {
        let board = Arc::new(DisplayBoard::with_tracked_elements());
        FeedListener::bind(board, fixed_clock as fn() -> i64).unwrap()
    }

    fn texts(listener: &FeedListener<Arc<DisplayBoard>, fn() -> i64>) -> Vec<String> {
        let snapshot = listener.surface().snapshot();
        TRACKED_ELEMENT_IDS
            .iter()
            .map(|id| snapshot.text(id).unwrap_or_default().to_string())
            .collect()
    }

    #[test]
    fn test_counter_frame_updates_value_and_time() {
        let listener = listener();
        let outcome = listener
            .handle_frame(r#"{"type":"message","data":{"sensor":"counter","value":"42"}}"#)
            .unwrap();

        let expected_time = format_timestamp(FIXED_NOW).unwrap();
        assert_eq!(
            outcome,
            FrameOutcome::CounterUpdated {
                value: "42".to_string(),
                time: expected_time.clone(),
            }
        );

        let snapshot = listener.surface().snapshot();
        assert_eq!(snapshot.text(COUNTER_VALUE_ID), Some("42"));
        assert_eq!(snapshot.text(COUNTER_TIME_ID), Some(expected_time.as_str()));
        assert_eq!(snapshot.text(SENSOR_TWO_ID), Some(""));
        assert_eq!(snapshot.text(LED_PICTURE_ID), Some(""));
        assert_eq!(snapshot.revision, 1);
    }

    /// Records every write call as one batch of `(element index, text)`.
    #[derive(Default)]
    struct RecordingSurface {
        batches: std::sync::Mutex<Vec<Vec<(usize, String)>>>,
    }

    impl DisplaySurface for RecordingSurface {
        type Handle = usize;

        fn element(&self, id: &str) -> Option<usize> {
            TRACKED_ELEMENT_IDS.iter().position(|known| *known == id)
        }

        fn set_text(&self, handle: &usize, text: &str) {
            self.set_texts(&[(handle, text)]);
        }

        fn set_texts(&self, writes: &[(&usize, &str)]) {
            let batch = writes
                .iter()
                .map(|(handle, text)| (**handle, text.to_string()))
                .collect();
            self.batches.lock().unwrap().push(batch);
        }
    }

    #[test]
    fn test_counter_value_and_time_written_together() {
        let listener =
            FeedListener::bind(RecordingSurface::default(), fixed_clock as fn() -> i64).unwrap();
        listener
            .handle_frame(r#"{"type":"message","data":{"sensor":"counter","value":5}}"#)
            .unwrap();

        let batches = listener.surface().batches.lock().unwrap().clone();
        assert_eq!(batches.len(), 1);
        assert_eq!(
            batches[0],
            vec![
                (2, "5".to_string()),
                (3, format_timestamp(FIXED_NOW).unwrap()),
            ]
        );
    }

    #[test]
    fn test_unparseable_counter_shows_nan() {
        let listener = listener();
        listener
            .handle_frame(r#"{"type":"message","data":{"sensor":"counter","value":"abc"}}"#)
            .unwrap();
        assert_eq!(
            listener.surface().snapshot().text(COUNTER_VALUE_ID),
            Some("NaN")
        );
    }

    #[test]
    fn test_other_type_leaves_display_unchanged() {
        let listener = listener();
        let before = texts(&listener);
        let outcome = listener
            .handle_frame(r#"{"type":"hello","data":{"sensor":"counter","value":"1"}}"#)
            .unwrap();
        assert_eq!(outcome, FrameOutcome::Ignored(IgnoreReason::UnhandledType));
        assert_eq!(texts(&listener), before);
        assert_eq!(listener.surface().snapshot().revision, 0);
    }

    #[test]
    fn test_other_sensor_leaves_display_unchanged() {
        let listener = listener();
        let before = texts(&listener);
        let outcome = listener
            .handle_frame(r#"{"type":"message","data":{"sensor":"humidity","value":"55"}}"#)
            .unwrap();
        assert_eq!(outcome, FrameOutcome::Ignored(IgnoreReason::UnhandledSensor));
        assert_eq!(texts(&listener), before);
    }

    #[test]
    fn test_malformed_frame_is_frame_local_error() {
        let listener = listener();
        let err = listener.handle_frame("{not json").unwrap_err();
        assert!(matches!(err, FeedError::Decode(_)));
        assert!(err.is_frame_local());
        assert_eq!(listener.surface().snapshot().revision, 0);
    }

    #[test]
    fn test_out_of_range_clock_writes_nothing() {
        let board = Arc::new(DisplayBoard::with_tracked_elements());
        let listener = FeedListener::bind(board, || i64::MAX).unwrap();
        let err = listener
            .handle_frame(r#"{"type":"message","data":{"sensor":"counter","value":1}}"#)
            .unwrap_err();
        assert!(matches!(err, FeedError::TimestampOutOfRange { .. }));
        assert_eq!(listener.surface().snapshot().revision, 0);
    }

    #[test]
    fn test_bind_fails_on_missing_element() {
        let board = DisplayBoard::new([SENSOR_TWO_ID, LED_PICTURE_ID, COUNTER_VALUE_ID]);
        let err = FeedListener::new(board).err().unwrap();
        assert!(matches!(err, FeedError::MissingElement { ref id } if id == COUNTER_TIME_ID));
    }

    #[test]
    fn test_on_load_formats_clock() {
        let listener = listener();
        assert_eq!(
            listener.on_load().unwrap(),
            format_timestamp(FIXED_NOW).unwrap()
        );
    }

    #[tokio::test]
    async fn test_run_continues_after_bad_frame() {
        let listener = listener();
        let board = listener.surface().clone();
        let (tx, rx) = mpsc::channel(8);
        let socket = FeedSocket::from_frames(rx);

        for frame in [
            r#"{"type":"message","data":{"sensor":"counter","value":1}}"#,
            "garbage",
            r#"{"type":"ping"}"#,
            r#"{"type":"message","data":{"sensor":"counter","value":2}}"#,
        ] {
            tx.send(frame.to_string()).await.unwrap();
        }
        drop(tx);

        let stats = listener.run(socket, CancellationToken::new()).await;

        assert_eq!(
            stats,
            FeedStats {
                updated: 2,
                ignored: 1,
                failed: 1
            }
        );
        assert_eq!(stats.total(), 4);
        assert_eq!(board.snapshot().text(COUNTER_VALUE_ID), Some("2"));
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let listener = listener();
        let (_tx, rx) = mpsc::channel::<String>(1);
        let socket = FeedSocket::from_frames(rx);
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        let stats = listener.run(socket, shutdown).await;
        assert_eq!(stats, FeedStats::default());
    }

    #[test]
    fn test_truncate_for_log_respects_char_boundary() {
        assert_eq!(truncate_for_log("short", 10), "short");
        assert_eq!(truncate_for_log("abcdef", 3), "abc...");
        assert_eq!(truncate_for_log("ééé", 3), "é...");
    }
}

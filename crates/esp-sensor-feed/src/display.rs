/*
[INPUT]:  Element ids registered by the host and text writes from the listener
[OUTPUT]: Latest element texts via `watch` snapshots
[POS]:    Display layer - the surface sensor values are written to
[UPDATE]: When adding display elements or changing snapshot contents
*/

use std::sync::{Arc, RwLock};
use std::time::Instant;

use tokio::sync::watch;
use tracing::warn;

/// Element showing the LED label (tracked, never written by the listener).
pub const SENSOR_TWO_ID: &str = "sensorTwo";
/// Element showing the LED picture (tracked, never written by the listener).
pub const LED_PICTURE_ID: &str = "led_picture";
/// Element receiving the counter value.
pub const COUNTER_VALUE_ID: &str = "s4_value";
/// Element receiving the time the counter value arrived.
pub const COUNTER_TIME_ID: &str = "s4_time";

/// All element ids the listener resolves at bind time.
pub const TRACKED_ELEMENT_IDS: [&str; 4] =
    [SENSOR_TWO_ID, LED_PICTURE_ID, COUNTER_VALUE_ID, COUNTER_TIME_ID];

/// A set of text elements addressed by id.
///
/// Handles are resolved once and reused for every write.
pub trait DisplaySurface: Send + Sync {
    type Handle: Clone + Send + Sync;

    /// Resolve an element id, `None` when the surface has no such element.
    fn element(&self, id: &str) -> Option<Self::Handle>;

    /// Replace the text content of a resolved element.
    fn set_text(&self, handle: &Self::Handle, text: &str);

    /// Replace several elements as one change.
    ///
    /// Observers never see part of the batch applied.
    fn set_texts(&self, writes: &[(&Self::Handle, &str)]) {
        for (handle, text) in writes {
            self.set_text(handle, text);
        }
    }
}

impl<S: DisplaySurface> DisplaySurface for Arc<S> {
    type Handle = S::Handle;

    fn element(&self, id: &str) -> Option<Self::Handle> {
        (**self).element(id)
    }

    fn set_text(&self, handle: &Self::Handle, text: &str) {
        (**self).set_text(handle, text)
    }

    fn set_texts(&self, writes: &[(&Self::Handle, &str)]) {
        (**self).set_texts(writes)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElementState {
    pub id: String,
    pub text: String,
    pub updated_at: Option<Instant>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoardSnapshot {
    pub elements: Vec<ElementState>,
    /// Published changes since the board was created; a batch counts once.
    pub revision: u64,
}

impl BoardSnapshot {
    pub fn text(&self, id: &str) -> Option<&str> {
        self.elements
            .iter()
            .find(|element| element.id == id)
            .map(|element| element.text.as_str())
    }
}

/// Index of an element inside a [`DisplayBoard`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementHandle(usize);

/// In-memory display surface.
///
/// Every write or batch publishes one fresh [`BoardSnapshot`] to subscribers.
#[derive(Debug)]
pub struct DisplayBoard {
    state: RwLock<BoardSnapshot>,
    snapshots: watch::Sender<BoardSnapshot>,
}

impl DisplayBoard {
    /// Create a board with empty elements for the given ids.
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut elements: Vec<ElementState> = Vec::new();
        for id in ids {
            let id = id.into();
            if elements.iter().any(|element| element.id == id) {
                continue;
            }
            elements.push(ElementState {
                id,
                text: String::new(),
                updated_at: None,
            });
        }

        let initial = BoardSnapshot {
            elements,
            revision: 0,
        };
        let (snapshots, _rx) = watch::channel(initial.clone());
        Self {
            state: RwLock::new(initial),
            snapshots,
        }
    }

    /// Board holding every element the listener tracks.
    pub fn with_tracked_elements() -> Self {
        Self::new(TRACKED_ELEMENT_IDS)
    }

    pub fn snapshot(&self) -> BoardSnapshot {
        match self.state.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<BoardSnapshot> {
        self.snapshots.subscribe()
    }
}

impl DisplaySurface for DisplayBoard {
    type Handle = ElementHandle;

    fn element(&self, id: &str) -> Option<Self::Handle> {
        let guard = match self.state.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard
            .elements
            .iter()
            .position(|element| element.id == id)
            .map(ElementHandle)
    }

    fn set_text(&self, handle: &Self::Handle, text: &str) {
        self.set_texts(&[(handle, text)]);
    }

    fn set_texts(&self, writes: &[(&Self::Handle, &str)]) {
        let snapshot = {
            let mut guard = match self.state.write() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            let now = Instant::now();
            let mut applied = 0;
            for (handle, text) in writes {
                let Some(element) = guard.elements.get_mut(handle.0) else {
                    warn!(index = handle.0, "display handle does not belong to this board");
                    continue;
                };
                element.text = text.to_string();
                element.updated_at = Some(now);
                applied += 1;
            }
            if applied == 0 {
                return;
            }
            guard.revision += 1;
            guard.clone()
        };
        self.snapshots.send_replace(snapshot);
    }
}

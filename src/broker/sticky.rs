//! Sticky event store: last payload per exact topic, kept for replay to late
//! subscribers.

use std::sync::Arc;

use dashmap::DashMap;

use super::event_data::EventData;

/// Concurrent map from exact (non-wildcard) topic string to the most recently
/// sticky-triggered payload under it. Entries persist for the life of the
/// broker; a later sticky trigger overwrites, so late subscribers always see
/// the most recent value.
#[derive(Default)]
pub struct StickyStore {
    events: DashMap<String, Arc<dyn EventData>>,
}

impl StickyStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the payload for a topic.
    pub fn set(&self, topic: impl Into<String>, payload: Arc<dyn EventData>) {
        self.events.insert(topic.into(), payload);
    }

    /// The current payload for a topic, if any sticky trigger stored one.
    pub fn get(&self, topic: &str) -> Option<Arc<dyn EventData>> {
        self.events.get(topic).map(|entry| Arc::clone(entry.value()))
    }

    /// Whether a payload is stored for a topic.
    pub fn contains(&self, topic: &str) -> bool {
        self.events.contains_key(topic)
    }

    /// Number of topics with a stored payload.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether no payload has been stored yet.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

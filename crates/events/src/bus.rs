//! Notification sinks.
//!
//! The coordinator hands every [`SessionNotification`] to one sink. Hosts
//! that speak topic/JSON (a UI bridge, an FFI callback) wrap their emitter
//! in [`JsonEventBus`]; tests use [`RecordingEventBus`].

use crate::{ActivationState, SessionNotification};
use std::sync::{Arc, Mutex};

/// Receives session notifications in publication order.
pub trait EventBus: Send + Sync {
    fn emit(&self, notification: &SessionNotification);
}

pub type EventBusRef = Arc<dyn EventBus>;

/// Forwards each notification as `(topic, payload)` to a host callback.
pub struct JsonEventBus<F> {
    sink: F,
}

impl<F> JsonEventBus<F>
where
    F: Fn(&'static str, serde_json::Value) + Send + Sync,
{
    pub fn new(sink: F) -> Self {
        Self { sink }
    }
}

impl<F> EventBus for JsonEventBus<F>
where
    F: Fn(&'static str, serde_json::Value) + Send + Sync,
{
    fn emit(&self, notification: &SessionNotification) {
        (self.sink)(notification.topic(), notification.payload());
    }
}

/// Keeps every notification it receives.
#[derive(Default)]
pub struct RecordingEventBus {
    received: Mutex<Vec<SessionNotification>>,
}

impl RecordingEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<SessionNotification> {
        self.received().clone()
    }

    /// Notifications published under `topic`.
    pub fn on_topic(&self, topic: &str) -> Vec<SessionNotification> {
        self.received()
            .iter()
            .filter(|n| n.topic() == topic)
            .cloned()
            .collect()
    }

    /// `(from, to)` of every state change, oldest first.
    pub fn transitions(&self) -> Vec<(ActivationState, ActivationState)> {
        self.received()
            .iter()
            .filter_map(|n| match n {
                SessionNotification::StateChanged(e) => Some((e.from, e.to)),
                _ => None,
            })
            .collect()
    }

    pub fn topics(&self) -> Vec<&'static str> {
        self.received().iter().map(SessionNotification::topic).collect()
    }

    pub fn clear(&self) {
        self.received().clear();
    }

    pub fn len(&self) -> usize {
        self.received().len()
    }

    pub fn is_empty(&self) -> bool {
        self.received().is_empty()
    }

    fn received(&self) -> std::sync::MutexGuard<'_, Vec<SessionNotification>> {
        self.received.lock().expect("recording bus mutex poisoned")
    }
}

impl EventBus for RecordingEventBus {
    fn emit(&self, notification: &SessionNotification) {
        self.received().push(notification.clone());
    }
}

/// Drops everything. Used when the host does not observe the session.
pub struct NullEventBus;

impl EventBus for NullEventBus {
    fn emit(&self, _notification: &SessionNotification) {}
}

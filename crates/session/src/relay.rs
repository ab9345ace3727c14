//! Notification relay - feeds platform events into the coordinator and
//! publishes session notifications to observers.

use crate::coordinator::{record_transition, AudioSessionCoordinator};
use crate::platform::{new_event_handler, PlatformEvent};
use crate::routing::DeviceChange;
use crate::state::SessionRecord;
use crossbeam_channel::{Receiver, Sender, TrySendError};
use rtcaudio_events::{
    now_ms, ActivationState, AudioDevice, EventBusRef, InterruptionBeganEvent,
    InterruptionEndedEvent, MediaServicesResetEvent, RouteChangeReason, RouteChangedEvent,
    SessionNotification,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

/// Registered as the platform's event handler.
///
/// Holds only a weak reference to the coordinator; events that arrive after
/// the session is gone are ignored.
pub struct NotificationRelay {
    coordinator: Weak<AudioSessionCoordinator>,
    publisher: Arc<Publisher>,
    delivered: AtomicU64,
}

impl NotificationRelay {
    /// Create a relay and register it with the coordinator's platform.
    pub fn attach(coordinator: &Arc<AudioSessionCoordinator>) -> Arc<Self> {
        let relay = Arc::new(Self {
            coordinator: Arc::downgrade(coordinator),
            publisher: Arc::clone(coordinator.publisher()),
            delivered: AtomicU64::new(0),
        });

        let handler_relay = Arc::clone(&relay);
        coordinator
            .platform()
            .set_event_handler(new_event_handler(move |event| handler_relay.deliver(event)));

        tracing::debug!("notification relay attached to platform");
        relay
    }

    /// Deliver a platform event. Safe to call from any thread.
    pub fn deliver(&self, event: PlatformEvent) {
        let Some(coordinator) = self.coordinator.upgrade() else {
            tracing::debug!(?event, "audio session dropped; ignoring platform event");
            return;
        };
        self.delivered.fetch_add(1, Ordering::Relaxed);
        coordinator.handle_platform_event(event);
    }

    /// Receive every notification published from now on.
    pub fn subscribe(&self) -> Receiver<SessionNotification> {
        self.publisher.subscribe()
    }

    /// Number of platform events delivered so far.
    pub fn delivered_events(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }
}

/// State policy for platform events. Runs under the serialization point.
pub(crate) fn apply_platform_event(
    record: &mut SessionRecord,
    event: PlatformEvent,
    notes: &mut Vec<SessionNotification>,
) {
    match event {
        PlatformEvent::InterruptionBegan => {
            let previous = record.request_count;
            record.request_count = 0;
            record_transition(record, ActivationState::Inactive, None, notes);
            // Not restored on interruption end; callers re-activate explicitly.
            tracing::warn!(
                previous_request_count = previous,
                "audio session interrupted; activation requests discarded"
            );
            notes.push(SessionNotification::InterruptionBegan(InterruptionBeganEvent {
                previous_request_count: previous,
                timestamp_ms: now_ms(),
            }));
        }
        PlatformEvent::InterruptionEnded { should_resume } => {
            tracing::info!(should_resume, "audio session interruption ended");
            notes.push(SessionNotification::InterruptionEnded(InterruptionEndedEvent {
                should_resume,
                timestamp_ms: now_ms(),
            }));
        }
        PlatformEvent::RouteChanged {
            reason,
            previous_output,
            current_output,
        } => {
            tracing::debug!(?reason, ?previous_output, ?current_output, "audio route changed");
            let change =
                route_device_change(reason, previous_output.as_deref(), current_output.as_deref());
            notes.push(SessionNotification::RouteChanged(RouteChangedEvent {
                reason,
                previous_output,
                current_output,
                timestamp_ms: now_ms(),
            }));
            if let Some(change) = change {
                let mode = record.mode;
                record.routing.update_devices(change, mode, notes);
            }
        }
        PlatformEvent::MediaServicesWereReset => {
            let previous = record.request_count;
            record.request_count = 0;
            record_transition(record, ActivationState::Inactive, None, notes);
            record.configuration_stale = true;
            record.routing.invalidate_applied();
            tracing::warn!(
                previous_request_count = previous,
                "media services reset; session and configuration invalidated"
            );
            notes.push(SessionNotification::MediaServicesReset(MediaServicesResetEvent {
                previous_request_count: previous,
                timestamp_ms: now_ms(),
            }));
        }
        PlatformEvent::DeviceAdded(device) => {
            let mode = record.mode;
            record.routing.update_devices(DeviceChange::Added(device), mode, notes);
        }
        PlatformEvent::DeviceRemoved(device) => {
            let mode = record.mode;
            record.routing.update_devices(DeviceChange::Removed(device), mode, notes);
        }
        PlatformEvent::DevicesChanged(devices) => {
            let mode = record.mode;
            record.routing.update_devices(DeviceChange::Replaced(devices), mode, notes);
        }
    }
}

/// Device set change implied by a route change, when the port is one we route to.
fn route_device_change(
    reason: RouteChangeReason,
    previous_output: Option<&str>,
    current_output: Option<&str>,
) -> Option<DeviceChange> {
    let port = |name: Option<&str>| name.and_then(|n| n.parse::<AudioDevice>().ok());
    match reason {
        RouteChangeReason::NewDeviceAvailable => port(current_output).map(DeviceChange::Added),
        RouteChangeReason::OldDeviceUnavailable => port(previous_output).map(DeviceChange::Removed),
        _ => None,
    }
}

/// Fans notifications out to the event bus and typed subscribers.
///
/// Always called outside the state lock, so observers may call back into the
/// coordinator.
pub(crate) struct Publisher {
    bus: EventBusRef,
    subscribers: Mutex<Vec<Sender<SessionNotification>>>,
    capacity: usize,
    dropped: AtomicU64,
}

impl Publisher {
    pub(crate) fn new(bus: EventBusRef, capacity: usize) -> Self {
        Self {
            bus,
            subscribers: Mutex::new(Vec::new()),
            capacity,
            dropped: AtomicU64::new(0),
        }
    }

    pub(crate) fn subscribe(&self) -> Receiver<SessionNotification> {
        let (tx, rx) = crossbeam_channel::bounded(self.capacity);
        self.subscribers
            .lock()
            .expect("subscriber mutex poisoned")
            .push(tx);
        rx
    }

    pub(crate) fn publish_all(&self, notes: Vec<SessionNotification>) {
        for note in notes {
            self.publish(note);
        }
    }

    fn publish(&self, note: SessionNotification) {
        self.bus.emit(&note);

        let mut subscribers = self.subscribers.lock().expect("subscriber mutex poisoned");
        subscribers.retain(|tx| match tx.try_send(note.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                // Rate-limit logging: only log every 10th drop
                if dropped % 10 == 1 {
                    tracing::warn!(dropped, topic = note.topic(), "subscriber full, dropping notification");
                }
                true
            }
            Err(TrySendError::Disconnected(_)) => {
                tracing::debug!("notification subscriber disconnected");
                false
            }
        });
    }

    #[cfg(test)]
    fn subscriber_count(&self) -> usize {
        self.subscribers.lock().expect("subscriber mutex poisoned").len()
    }
}

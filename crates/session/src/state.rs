//! Session state store.
//!
//! Holds `(ActivationState, request count, pending transition)` behind a single
//! mutex. The paired condition variable is signalled every time an in-flight
//! transition settles, so waiters block instead of polling.

use crate::mode::AudioMode;
use crate::platform::PlatformEvent;
use crate::routing::DeviceRouting;
use rtcaudio_events::{ActivationState, AudioDevice, SessionNotification};
use serde::Serialize;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::thread::{self, ThreadId};

/// Kind of platform call currently in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    Activating,
    Deactivating,
    /// Live reconfiguration while active. The state stays `Active`.
    Configuring,
    /// Output route change. Never moves the activation state.
    Routing,
}

/// Marker for the transition that currently owns the platform.
#[derive(Debug, Clone)]
pub(crate) struct PendingTransition {
    pub(crate) kind: TransitionKind,
    /// Thread issuing the platform call.
    pub(crate) owner: ThreadId,
    pub(crate) requester: String,
}

impl PendingTransition {
    fn is_owned_by_current_thread(&self) -> bool {
        self.owner == thread::current().id()
    }
}

/// Consistent view of the store, read under the lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub state: ActivationState,
    pub request_count: u32,
    pub pending: Option<TransitionKind>,
    pub mode: AudioMode,
    /// The mode still has to be pushed to the platform.
    pub configuration_stale: bool,
    /// Output device audio is routed to, if any.
    pub selected_device: Option<AudioDevice>,
}

/// The guarded record.
#[derive(Debug)]
pub(crate) struct SessionRecord {
    pub(crate) state: ActivationState,
    pub(crate) request_count: u32,
    pub(crate) pending: Option<PendingTransition>,
    pub(crate) mode: AudioMode,
    pub(crate) configuration_stale: bool,
    /// Platform events that arrived on the owning thread mid-transition.
    pub(crate) deferred: Vec<PlatformEvent>,
    pub(crate) routing: DeviceRouting,
}

impl SessionRecord {
    fn new(mode: AudioMode) -> Self {
        Self {
            state: ActivationState::Inactive,
            request_count: 0,
            pending: None,
            mode,
            // Nothing has been pushed to the platform yet.
            configuration_stale: true,
            deferred: Vec::new(),
            routing: DeviceRouting::default(),
        }
    }

    pub(crate) fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            request_count: self.request_count,
            pending: self.pending.as_ref().map(|p| p.kind),
            mode: self.mode,
            configuration_stale: self.configuration_stale,
            selected_device: self.routing.selected(),
        }
    }

    /// Add one activation request. Returns the new count.
    pub(crate) fn retain(&mut self) -> u32 {
        self.request_count = self.request_count.saturating_add(1);
        self.request_count
    }

    /// Drop one activation request. Returns `None` when the count was
    /// already zero; the count never goes negative.
    pub(crate) fn release(&mut self) -> Option<u32> {
        if self.request_count == 0 {
            return None;
        }
        self.request_count -= 1;
        Some(self.request_count)
    }

    /// Re-run output selection for the current mode.
    pub(crate) fn reroute(&mut self, notes: &mut Vec<SessionNotification>) {
        self.routing.reroute(self.mode, notes);
    }

    pub(crate) fn begin(&mut self, kind: TransitionKind, requester: &str) {
        debug_assert!(self.pending.is_none(), "overlapping session transitions");
        self.pending = Some(PendingTransition {
            kind,
            owner: thread::current().id(),
            requester: requester.to_string(),
        });
    }
}

/// Outcome of [`SessionStateStore::acquire`].
pub(crate) enum Acquired<'a> {
    /// No transition is in flight.
    Settled(MutexGuard<'a, SessionRecord>),
    /// The calling thread owns the in-flight transition, i.e. it re-entered
    /// from inside a platform call.
    Reentrant(MutexGuard<'a, SessionRecord>),
}

/// Single serialization point for all session state.
#[derive(Debug)]
pub(crate) struct SessionStateStore {
    record: Mutex<SessionRecord>,
    settled: Condvar,
}

impl SessionStateStore {
    pub(crate) fn new(mode: AudioMode) -> Self {
        Self {
            record: Mutex::new(SessionRecord::new(mode)),
            settled: Condvar::new(),
        }
    }

    pub(crate) fn snapshot(&self) -> SessionSnapshot {
        self.lock().snapshot()
    }

    /// Lock without waiting for a pending transition. Only the owner of the
    /// pending transition should use this to complete it.
    pub(crate) fn lock(&self) -> MutexGuard<'_, SessionRecord> {
        self.record.lock().expect("session state mutex poisoned")
    }

    /// Lock and block until no other thread has a transition in flight.
    pub(crate) fn acquire(&self) -> Acquired<'_> {
        let guard = self
            .settled
            .wait_while(self.lock(), |record| {
                record
                    .pending
                    .as_ref()
                    .is_some_and(|p| !p.is_owned_by_current_thread())
            })
            .expect("session state mutex poisoned");

        if guard.pending.is_some() {
            Acquired::Reentrant(guard)
        } else {
            Acquired::Settled(guard)
        }
    }

    /// Wake every thread blocked in `acquire`.
    pub(crate) fn notify_settled(&self) {
        self.settled.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_initial_snapshot() {
        let store = SessionStateStore::new(AudioMode::VideoCall);
        let snapshot = store.snapshot();
        assert_eq!(snapshot.state, ActivationState::Inactive);
        assert_eq!(snapshot.request_count, 0);
        assert_eq!(snapshot.pending, None);
        assert_eq!(snapshot.mode, AudioMode::VideoCall);
        assert!(snapshot.configuration_stale);
        assert_eq!(snapshot.selected_device, None);
    }

    #[test]
    fn test_release_floors_at_zero() {
        let mut record = SessionRecord::new(AudioMode::Default);
        assert_eq!(record.release(), None);
        assert_eq!(record.retain(), 1);
        assert_eq!(record.retain(), 2);
        assert_eq!(record.release(), Some(1));
        assert_eq!(record.release(), Some(0));
        assert_eq!(record.release(), None);
        assert_eq!(record.request_count, 0);
    }

    #[test]
    fn test_acquire_on_owner_thread_is_reentrant() {
        let store = SessionStateStore::new(AudioMode::Default);
        store.lock().begin(TransitionKind::Activating, "engine");

        assert!(matches!(store.acquire(), Acquired::Reentrant(_)));
        assert_eq!(store.snapshot().pending, Some(TransitionKind::Activating));
    }

    #[test]
    fn test_acquire_waits_for_settle() {
        let store = Arc::new(SessionStateStore::new(AudioMode::Default));
        store.lock().begin(TransitionKind::Deactivating, "lifecycle");

        let waiter_store = Arc::clone(&store);
        let waiter = std::thread::spawn(move || match waiter_store.acquire() {
            Acquired::Settled(record) => record.pending.is_none(),
            Acquired::Reentrant(_) => false,
        });

        std::thread::sleep(Duration::from_millis(50));
        assert!(!waiter.is_finished());

        store.lock().pending = None;
        store.notify_settled();

        assert!(waiter.join().unwrap());
    }
}

//! Scripted platform for tests and simulations.
//!
//! Records every call, fails on demand, can slow calls down to widen race
//! windows, and fires platform events through the registered handler.

use crate::error::PlatformError;
use crate::mode::AudioMode;
use crate::platform::{PlatformAudio, PlatformEvent, PlatformEventHandler};
use rtcaudio_events::AudioDevice;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A call received by [`ScriptedPlatform`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformCall {
    Configure(AudioMode),
    Activate,
    Deactivate,
    Route(AudioDevice),
}

/// Runs inside a platform call, before it returns.
pub type CallHook = Arc<dyn Fn(PlatformCall) + Send + Sync + 'static>;

#[derive(Default)]
pub struct ScriptedPlatform {
    calls: Mutex<Vec<PlatformCall>>,
    configure_failures: Mutex<VecDeque<PlatformError>>,
    activate_failures: Mutex<VecDeque<PlatformError>>,
    deactivate_failures: Mutex<VecDeque<PlatformError>>,
    route_failures: Mutex<VecDeque<PlatformError>>,
    handler: Mutex<Option<PlatformEventHandler>>,
    hook: Mutex<Option<CallHook>>,
    delay: Mutex<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// All calls in the order they were received.
    pub fn calls(&self) -> Vec<PlatformCall> {
        self.calls.lock().expect("platform mutex poisoned").clone()
    }

    pub fn activate_count(&self) -> usize {
        self.count(|call| call == PlatformCall::Activate)
    }

    pub fn deactivate_count(&self) -> usize {
        self.count(|call| call == PlatformCall::Deactivate)
    }

    pub fn configure_count(&self) -> usize {
        self.count(|call| matches!(call, PlatformCall::Configure(_)))
    }

    /// Devices passed to `set_output_route`, in order.
    pub fn routes(&self) -> Vec<AudioDevice> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                PlatformCall::Route(device) => Some(device),
                _ => None,
            })
            .collect()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().expect("platform mutex poisoned").clear();
    }

    /// Highest number of platform calls observed running at the same time.
    pub fn max_concurrent_calls(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn fail_next_configure(&self, error: PlatformError) {
        push(&self.configure_failures, error);
    }

    pub fn fail_next_activate(&self, error: PlatformError) {
        push(&self.activate_failures, error);
    }

    pub fn fail_next_deactivate(&self, error: PlatformError) {
        push(&self.deactivate_failures, error);
    }

    pub fn fail_next_route(&self, error: PlatformError) {
        push(&self.route_failures, error);
    }

    /// Make every call take at least `delay`.
    pub fn set_call_delay(&self, delay: Duration) {
        *self.delay.lock().expect("platform mutex poisoned") = delay;
    }

    pub fn set_call_hook<F>(&self, hook: F)
    where
        F: Fn(PlatformCall) + Send + Sync + 'static,
    {
        *self.hook.lock().expect("platform mutex poisoned") = Some(Arc::new(hook));
    }

    pub fn has_event_handler(&self) -> bool {
        self.handler.lock().expect("platform mutex poisoned").is_some()
    }

    /// Deliver an event through the registered handler on the calling thread.
    /// Returns false when no handler is registered.
    pub fn emit(&self, event: PlatformEvent) -> bool {
        let handler = self.handler.lock().expect("platform mutex poisoned").clone();
        match handler {
            Some(handler) => {
                handler(event);
                true
            }
            None => false,
        }
    }

    fn count(&self, predicate: impl Fn(PlatformCall) -> bool) -> usize {
        self.calls
            .lock()
            .expect("platform mutex poisoned")
            .iter()
            .filter(|call| predicate(**call))
            .count()
    }

    fn run(
        &self,
        call: PlatformCall,
        failures: &Mutex<VecDeque<PlatformError>>,
    ) -> Result<(), PlatformError> {
        let _in_flight = InFlight::enter(&self.in_flight, &self.max_in_flight);

        self.calls.lock().expect("platform mutex poisoned").push(call);

        // Locks are released before the hook runs; it may panic or emit events.
        let hook = self.hook.lock().expect("platform mutex poisoned").clone();
        let delay = *self.delay.lock().expect("platform mutex poisoned");
        if let Some(hook) = hook {
            hook(call);
        }
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }

        let failure = failures.lock().expect("platform mutex poisoned").pop_front();
        match failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

/// Counts a running call; released on return and on unwind alike.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize, max: &AtomicUsize) -> Self {
        let now = counter.fetch_add(1, Ordering::SeqCst) + 1;
        max.fetch_max(now, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

fn push(queue: &Mutex<VecDeque<PlatformError>>, error: PlatformError) {
    queue.lock().expect("platform mutex poisoned").push_back(error);
}

impl PlatformAudio for ScriptedPlatform {
    fn configure(&self, mode: AudioMode) -> Result<(), PlatformError> {
        self.run(PlatformCall::Configure(mode), &self.configure_failures)
    }

    fn activate(&self) -> Result<(), PlatformError> {
        self.run(PlatformCall::Activate, &self.activate_failures)
    }

    fn deactivate(&self) -> Result<(), PlatformError> {
        self.run(PlatformCall::Deactivate, &self.deactivate_failures)
    }

    fn set_output_route(&self, device: AudioDevice) -> Result<(), PlatformError> {
        self.run(PlatformCall::Route(device), &self.route_failures)
    }

    fn set_event_handler(&self, handler: PlatformEventHandler) {
        *self.handler.lock().expect("platform mutex poisoned") = Some(handler);
    }
}

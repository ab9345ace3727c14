//! Activation coordinator.
//!
//! Reference-counts activation requests from independent call sites and
//! reconciles them against the platform audio session. Every state change
//! and every platform call goes through the store's serialization point; the
//! lock itself is released while the platform call runs, and the pending
//! transition marker keeps everyone else queued behind it.
//!
//! Output routing rides the same path: the selection is decided under the
//! lock and pushed to the platform as a `Routing` transition.

use crate::error::{AudioSessionError, Result};
use crate::mode::AudioMode;
use crate::platform::{PlatformAudio, PlatformEvent};
use crate::relay::{self, Publisher};
use crate::state::{Acquired, SessionRecord, SessionSnapshot, SessionStateStore, TransitionKind};
use rtcaudio_events::{
    now_ms, ActivationState, AudioDevice, DeviceInfo, SessionNotification, StateChangedEvent,
};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, MutexGuard};
use tracing::{debug, error, info, warn};

pub struct AudioSessionCoordinator {
    platform: Arc<dyn PlatformAudio>,
    store: SessionStateStore,
    publisher: Arc<Publisher>,
}

impl AudioSessionCoordinator {
    pub(crate) fn new(
        platform: Arc<dyn PlatformAudio>,
        mode: AudioMode,
        publisher: Arc<Publisher>,
    ) -> Self {
        Self {
            platform,
            store: SessionStateStore::new(mode),
            publisher,
        }
    }

    pub(crate) fn platform(&self) -> &Arc<dyn PlatformAudio> {
        &self.platform
    }

    pub(crate) fn publisher(&self) -> &Arc<Publisher> {
        &self.publisher
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.store.snapshot()
    }

    pub fn state(&self) -> ActivationState {
        self.snapshot().state
    }

    pub fn request_count(&self) -> u32 {
        self.snapshot().request_count
    }

    pub fn mode(&self) -> AudioMode {
        self.snapshot().mode
    }

    pub fn selected_device(&self) -> Option<AudioDevice> {
        self.snapshot().selected_device
    }

    /// Devices the platform currently reports, in a stable order.
    pub fn available_devices(&self) -> Vec<AudioDevice> {
        self.store.lock().routing.available()
    }

    /// The device list as published in `devices_updated` notifications.
    pub fn devices(&self) -> Vec<DeviceInfo> {
        self.store.lock().routing.device_list()
    }

    /// Request that the session stay active.
    ///
    /// The first request (count 0 -> 1) configures the platform if needed and
    /// activates it. Later requests only bump the count. On failure the count
    /// and state are left as if the call never happened.
    pub fn activate(&self, requester: &str) -> Result<()> {
        let mut notes = Vec::new();
        let result = self.activate_locked(requester, &mut notes);
        // Failures are logged; the activation outcome stands on its own.
        let _ = self.push_route(requester, &mut notes);
        self.publisher.publish_all(notes);
        result
    }

    /// Withdraw one activation request.
    ///
    /// Deactivates the platform when the last request goes away. Extra calls
    /// with nothing outstanding are accepted and do nothing. If the platform
    /// refuses, the session stays active with one request so a later call can
    /// retry.
    pub fn deactivate(&self, requester: &str) -> Result<()> {
        let mut notes = Vec::new();
        let result = self.deactivate_locked(requester, &mut notes);
        let _ = self.push_route(requester, &mut notes);
        self.publisher.publish_all(notes);
        result
    }

    /// Change the audio mode.
    ///
    /// While active the platform is reconfigured immediately; otherwise the
    /// mode is recorded and applied by the next activation. Either way the
    /// output route is re-selected for the new mode.
    pub fn set_mode(&self, requester: &str, mode: AudioMode) -> Result<()> {
        let mut notes = Vec::new();
        let result = self
            .set_mode_locked(requester, mode, &mut notes)
            .and_then(|()| self.push_route(requester, &mut notes));
        self.publisher.publish_all(notes);
        result
    }

    /// Route output to `device` on the caller's behalf.
    ///
    /// The choice wins over the automatic pick for as long as the device
    /// stays available. Asking for a device the platform has not reported
    /// clears any earlier choice and leaves the route as it is.
    pub fn set_audio_device(&self, requester: &str, device: AudioDevice) -> Result<()> {
        let mut notes = Vec::new();
        let result = self
            .select_device_locked(requester, device, &mut notes)
            .and_then(|()| self.push_route(requester, &mut notes));
        self.publisher.publish_all(notes);
        result
    }

    /// [`activate`](Self::activate) on tokio's blocking pool.
    pub async fn activate_async(self: &Arc<Self>, requester: impl Into<String>) -> Result<()> {
        let this = Arc::clone(self);
        let requester = requester.into();
        tokio::task::spawn_blocking(move || this.activate(&requester)).await?
    }

    /// [`deactivate`](Self::deactivate) on tokio's blocking pool.
    pub async fn deactivate_async(self: &Arc<Self>, requester: impl Into<String>) -> Result<()> {
        let this = Arc::clone(self);
        let requester = requester.into();
        tokio::task::spawn_blocking(move || this.deactivate(&requester)).await?
    }

    /// Apply a platform event under the serialization point.
    ///
    /// Events that arrive on the thread running a platform call are queued
    /// and applied once that call settles.
    pub(crate) fn handle_platform_event(&self, event: PlatformEvent) {
        let mut notes = Vec::new();
        match self.store.acquire() {
            Acquired::Settled(mut record) => {
                relay::apply_platform_event(&mut record, event, &mut notes);
                drop(record);
                let _ = self.push_route(PLATFORM_REQUESTER, &mut notes);
            }
            Acquired::Reentrant(mut record) => {
                debug!(?event, "deferring platform event until transition settles");
                record.deferred.push(event);
            }
        }
        self.publisher.publish_all(notes);
    }

    fn activate_locked(&self, requester: &str, notes: &mut Vec<SessionNotification>) -> Result<()> {
        let mut record = self.acquire_settled(requester)?;

        let count = record.retain();
        if count > 1 {
            debug!(requester, request_count = count, "audio session already active");
            return Ok(());
        }
        debug_assert_eq!(record.state, ActivationState::Inactive);

        let mode = record.mode;
        let needs_configure = record.configuration_stale;
        record.begin(TransitionKind::Activating, requester);
        record_transition(&mut record, ActivationState::Activating, Some(requester), notes);
        drop(record);

        info!(requester, %mode, needs_configure, "activating audio session");
        let mut configured = false;
        let outcome = self.call_platform(TransitionKind::Activating, notes, || {
            if needs_configure {
                self.platform
                    .configure(mode)
                    .map_err(AudioSessionError::PlatformConfigurationFailed)?;
                configured = true;
            }
            self.platform
                .activate()
                .map_err(AudioSessionError::PlatformActivationFailed)
        });

        let mut record = self.store.lock();
        if configured {
            record.configuration_stale = false;
        }
        match &outcome {
            Ok(()) => {
                record_transition(&mut record, ActivationState::Active, Some(requester), notes);
                info!(requester, request_count = record.request_count, "audio session active");
            }
            Err(e) => {
                warn!(requester, error = %e, "audio session activation failed");
                record.request_count = 0;
                record_transition(&mut record, ActivationState::Inactive, Some(requester), notes);
            }
        }
        self.settle(record, notes);
        outcome
    }

    fn deactivate_locked(
        &self,
        requester: &str,
        notes: &mut Vec<SessionNotification>,
    ) -> Result<()> {
        let mut record = self.acquire_settled(requester)?;

        let remaining = match record.release() {
            None => {
                debug!(requester, "deactivate with no outstanding requests");
                return Ok(());
            }
            Some(remaining) => remaining,
        };
        if remaining > 0 {
            debug!(requester, request_count = remaining, "audio session still requested");
            return Ok(());
        }
        debug_assert_eq!(record.state, ActivationState::Active);

        record.begin(TransitionKind::Deactivating, requester);
        record_transition(&mut record, ActivationState::Deactivating, Some(requester), notes);
        drop(record);

        info!(requester, "deactivating audio session");
        let outcome = self.call_platform(TransitionKind::Deactivating, notes, || {
            self.platform
                .deactivate()
                .map_err(AudioSessionError::PlatformDeactivationFailed)
        });

        let mut record = self.store.lock();
        match &outcome {
            Ok(()) => {
                record_transition(&mut record, ActivationState::Inactive, Some(requester), notes);
                info!(requester, "audio session inactive");
            }
            Err(e) => {
                warn!(requester, error = %e, "audio session deactivation failed");
                record.request_count = 1;
                record_transition(&mut record, ActivationState::Active, Some(requester), notes);
            }
        }
        self.settle(record, notes);
        outcome
    }

    fn set_mode_locked(
        &self,
        requester: &str,
        mode: AudioMode,
        notes: &mut Vec<SessionNotification>,
    ) -> Result<()> {
        let mut record = self.acquire_settled(requester)?;

        if record.state != ActivationState::Active {
            if record.mode != mode {
                debug!(requester, from = %record.mode, to = %mode, "audio mode deferred until activation");
                record.mode = mode;
                record.configuration_stale = true;
            }
            record.reroute(notes);
            return Ok(());
        }
        if record.mode == mode && !record.configuration_stale {
            record.reroute(notes);
            return Ok(());
        }

        let previous = record.mode;
        record.begin(TransitionKind::Configuring, requester);
        drop(record);

        info!(requester, from = %previous, to = %mode, "reconfiguring active audio session");
        let outcome = self.call_platform(TransitionKind::Configuring, notes, || {
            self.platform
                .configure(mode)
                .map_err(AudioSessionError::PlatformConfigurationFailed)
        });

        let mut record = self.store.lock();
        match &outcome {
            Ok(()) => {
                record.mode = mode;
                record.configuration_stale = false;
                record.reroute(notes);
            }
            Err(e) => warn!(requester, error = %e, mode = %previous, "keeping previous audio mode"),
        }
        self.settle(record, notes);
        outcome
    }

    fn select_device_locked(
        &self,
        requester: &str,
        device: AudioDevice,
        notes: &mut Vec<SessionNotification>,
    ) -> Result<()> {
        let mut record = self.acquire_settled(requester)?;
        let mode = record.mode;
        if record.routing.select(device, mode, notes) {
            debug!(requester, %device, %mode, "audio device chosen");
        }
        Ok(())
    }

    /// Push the selected output route until the platform has the latest
    /// selection. Stops at the first failure.
    fn push_route(&self, requester: &str, notes: &mut Vec<SessionNotification>) -> Result<()> {
        loop {
            if self.store.lock().routing.unapplied().is_none() {
                return Ok(());
            }
            let mut record = match self.store.acquire() {
                Acquired::Settled(record) => record,
                // The in-flight owner pushes it after settling.
                Acquired::Reentrant(_) => return Ok(()),
            };
            let Some(device) = record.routing.unapplied() else {
                return Ok(());
            };
            record.begin(TransitionKind::Routing, requester);
            drop(record);

            info!(requester, %device, "routing audio output");
            let outcome = self.call_platform(TransitionKind::Routing, notes, || {
                self.platform
                    .set_output_route(device)
                    .map_err(AudioSessionError::PlatformRoutingFailed)
            });

            let mut record = self.store.lock();
            match &outcome {
                Ok(()) => record.routing.mark_applied(device),
                Err(e) => warn!(requester, %device, error = %e, "audio output route not applied"),
            }
            self.settle(record, notes);
            outcome?;
        }
    }

    fn acquire_settled(&self, requester: &str) -> Result<MutexGuard<'_, SessionRecord>> {
        match self.store.acquire() {
            Acquired::Settled(record) => Ok(record),
            Acquired::Reentrant(record) => {
                let in_flight = record.pending.as_ref().map(|p| (p.kind, p.requester.clone()));
                drop(record);
                error!(requester, ?in_flight, "session operation re-entered from a platform call");
                Err(AudioSessionError::ReentrantTransition {
                    requester: requester.to_string(),
                })
            }
        }
    }

    /// Run a platform call for the pending transition. A panicking platform
    /// rolls the transition back before the panic continues, so queued
    /// callers are not left waiting forever. The caller's queued notes are
    /// published ahead of the rollback's, since the unwind skips its own
    /// publish.
    fn call_platform<F>(
        &self,
        kind: TransitionKind,
        notes: &mut Vec<SessionNotification>,
        f: F,
    ) -> Result<()>
    where
        F: FnOnce() -> Result<()>,
    {
        match panic::catch_unwind(AssertUnwindSafe(f)) {
            Ok(outcome) => outcome,
            Err(payload) => {
                error!(?kind, "platform call panicked; rolling back transition");
                let mut record = self.store.lock();
                match kind {
                    TransitionKind::Activating => {
                        record.request_count = 0;
                        record_transition(&mut record, ActivationState::Inactive, None, notes);
                    }
                    TransitionKind::Deactivating => {
                        record.request_count = 1;
                        record_transition(&mut record, ActivationState::Active, None, notes);
                    }
                    TransitionKind::Configuring | TransitionKind::Routing => {}
                }
                self.settle(record, notes);
                self.publisher.publish_all(std::mem::take(notes));
                panic::resume_unwind(payload)
            }
        }
    }

    /// Clear the pending marker, apply deferred events, wake waiters.
    fn settle(&self, mut record: MutexGuard<'_, SessionRecord>, notes: &mut Vec<SessionNotification>) {
        record.pending = None;
        for event in std::mem::take(&mut record.deferred) {
            relay::apply_platform_event(&mut record, event, notes);
        }
        self.store.notify_settled();
    }
}

/// Requester recorded for routes pushed in response to platform events.
const PLATFORM_REQUESTER: &str = "platform";

/// Move to `to` and queue a state-changed notification when it differs.
pub(crate) fn record_transition(
    record: &mut SessionRecord,
    to: ActivationState,
    requester: Option<&str>,
    notes: &mut Vec<SessionNotification>,
) {
    let from = record.state;
    if from == to {
        return;
    }
    record.state = to;
    notes.push(SessionNotification::StateChanged(StateChangedEvent {
        from,
        to,
        request_count: record.request_count,
        requester: requester.map(str::to_string),
        timestamp_ms: now_ms(),
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PlatformError;
    use crate::testing::{PlatformCall, ScriptedPlatform};
    use rtcaudio_events::{event_names, NullEventBus, RecordingEventBus};

    fn coordinator(platform: &Arc<ScriptedPlatform>) -> AudioSessionCoordinator {
        let publisher = Arc::new(Publisher::new(Arc::new(NullEventBus), 8));
        AudioSessionCoordinator::new(platform.clone(), AudioMode::AudioCall, publisher)
    }

    fn recorded(
        platform: &Arc<ScriptedPlatform>,
    ) -> (AudioSessionCoordinator, Arc<RecordingEventBus>) {
        let bus = Arc::new(RecordingEventBus::new());
        let publisher = Arc::new(Publisher::new(bus.clone(), 8));
        let coordinator =
            AudioSessionCoordinator::new(platform.clone(), AudioMode::AudioCall, publisher);
        (coordinator, bus)
    }

    fn panic_on(platform: &ScriptedPlatform, target: PlatformCall) {
        platform.set_call_hook(move |call| {
            if call == target {
                panic!("platform binding crashed");
            }
        });
    }

    #[test]
    fn test_first_activation_configures_then_activates() {
        let platform = Arc::new(ScriptedPlatform::new());
        let coordinator = coordinator(&platform);

        coordinator.activate("engine").unwrap();

        assert_eq!(
            platform.calls(),
            vec![PlatformCall::Configure(AudioMode::AudioCall), PlatformCall::Activate]
        );
        let snapshot = coordinator.snapshot();
        assert_eq!(snapshot.state, ActivationState::Active);
        assert_eq!(snapshot.request_count, 1);
        assert!(!snapshot.configuration_stale);
    }

    #[test]
    fn test_configuration_failure_rolls_back() {
        let platform = Arc::new(ScriptedPlatform::new());
        platform.fail_next_configure(PlatformError::new("bad category"));
        let coordinator = coordinator(&platform);

        let err = coordinator.activate("engine").unwrap_err();
        assert!(matches!(err, AudioSessionError::PlatformConfigurationFailed(_)));
        assert_eq!(platform.activate_count(), 0);

        let snapshot = coordinator.snapshot();
        assert_eq!(snapshot.state, ActivationState::Inactive);
        assert_eq!(snapshot.request_count, 0);
        assert!(snapshot.configuration_stale);
    }

    #[test]
    fn test_failed_deactivation_keeps_one_request() {
        let platform = Arc::new(ScriptedPlatform::new());
        let coordinator = coordinator(&platform);

        coordinator.activate("engine").unwrap();
        platform.fail_next_deactivate(PlatformError::new("busy"));

        let err = coordinator.deactivate("engine").unwrap_err();
        assert!(matches!(err, AudioSessionError::PlatformDeactivationFailed(_)));
        assert_eq!(coordinator.state(), ActivationState::Active);
        assert_eq!(coordinator.request_count(), 1);

        coordinator.deactivate("engine").unwrap();
        assert_eq!(coordinator.state(), ActivationState::Inactive);
        assert_eq!(coordinator.request_count(), 0);
        assert_eq!(platform.deactivate_count(), 2);
    }

    #[test]
    fn test_set_mode_while_inactive_is_deferred() {
        let platform = Arc::new(ScriptedPlatform::new());
        let coordinator = coordinator(&platform);

        coordinator.set_mode("ui", AudioMode::VideoCall).unwrap();
        assert!(platform.calls().is_empty());
        assert_eq!(coordinator.mode(), AudioMode::VideoCall);

        coordinator.activate("engine").unwrap();
        assert_eq!(
            platform.calls(),
            vec![PlatformCall::Configure(AudioMode::VideoCall), PlatformCall::Activate]
        );
    }

    #[test]
    fn test_set_mode_while_active_reconfigures() {
        let platform = Arc::new(ScriptedPlatform::new());
        let coordinator = coordinator(&platform);
        coordinator.activate("engine").unwrap();

        coordinator.set_mode("ui", AudioMode::VideoCall).unwrap();
        coordinator.set_mode("ui", AudioMode::VideoCall).unwrap();

        assert_eq!(
            platform.calls(),
            vec![
                PlatformCall::Configure(AudioMode::AudioCall),
                PlatformCall::Activate,
                PlatformCall::Configure(AudioMode::VideoCall),
            ]
        );
        assert_eq!(coordinator.state(), ActivationState::Active);
    }

    #[test]
    fn test_set_mode_failure_keeps_previous_mode() {
        let platform = Arc::new(ScriptedPlatform::new());
        let coordinator = coordinator(&platform);
        coordinator.activate("engine").unwrap();
        platform.fail_next_configure(PlatformError::new("unsupported"));

        let err = coordinator.set_mode("ui", AudioMode::VideoCall).unwrap_err();
        assert!(matches!(err, AudioSessionError::PlatformConfigurationFailed(_)));
        assert_eq!(coordinator.mode(), AudioMode::AudioCall);
        assert_eq!(coordinator.state(), ActivationState::Active);
        assert_eq!(coordinator.snapshot().pending, None);
    }

    #[test]
    fn test_panicking_activation_reports_every_transition() {
        let platform = Arc::new(ScriptedPlatform::new());
        panic_on(&platform, PlatformCall::Activate);
        let (coordinator, bus) = recorded(&platform);

        let result = panic::catch_unwind(AssertUnwindSafe(|| coordinator.activate("engine")));
        assert!(result.is_err());

        let snapshot = coordinator.snapshot();
        assert_eq!(snapshot.state, ActivationState::Inactive);
        assert_eq!(snapshot.request_count, 0);
        assert_eq!(snapshot.pending, None);
        assert_eq!(
            bus.transitions(),
            vec![
                (ActivationState::Inactive, ActivationState::Activating),
                (ActivationState::Activating, ActivationState::Inactive),
            ]
        );
    }

    #[test]
    fn test_panicking_deactivation_reports_every_transition() {
        let platform = Arc::new(ScriptedPlatform::new());
        let (coordinator, bus) = recorded(&platform);
        coordinator.activate("engine").unwrap();
        panic_on(&platform, PlatformCall::Deactivate);

        let result = panic::catch_unwind(AssertUnwindSafe(|| coordinator.deactivate("engine")));
        assert!(result.is_err());

        let snapshot = coordinator.snapshot();
        assert_eq!(snapshot.state, ActivationState::Active);
        assert_eq!(snapshot.request_count, 1);
        assert_eq!(snapshot.pending, None);
        assert_eq!(
            bus.transitions(),
            vec![
                (ActivationState::Inactive, ActivationState::Activating),
                (ActivationState::Activating, ActivationState::Active),
                (ActivationState::Active, ActivationState::Deactivating),
                (ActivationState::Deactivating, ActivationState::Active),
            ]
        );

        // The kept request can still be released.
        platform.set_call_hook(|_| {});
        coordinator.deactivate("engine").unwrap();
        assert_eq!(coordinator.state(), ActivationState::Inactive);
    }

    #[test]
    fn test_panicking_route_keeps_activation() {
        let platform = Arc::new(ScriptedPlatform::new());
        let coordinator = coordinator(&platform);
        coordinator.activate("engine").unwrap();
        panic_on(&platform, PlatformCall::Route(AudioDevice::Speaker));

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            coordinator.handle_platform_event(PlatformEvent::DeviceAdded(AudioDevice::Speaker))
        }));
        assert!(result.is_err());

        let snapshot = coordinator.snapshot();
        assert_eq!(snapshot.state, ActivationState::Active);
        assert_eq!(snapshot.request_count, 1);
        assert_eq!(snapshot.pending, None);
    }

    #[test]
    fn test_set_audio_device_routes_to_choice() {
        let platform = Arc::new(ScriptedPlatform::new());
        let (coordinator, bus) = recorded(&platform);
        coordinator.handle_platform_event(PlatformEvent::DevicesChanged(vec![
            AudioDevice::Earpiece,
            AudioDevice::Speaker,
        ]));
        assert_eq!(coordinator.selected_device(), Some(AudioDevice::Speaker));

        coordinator.set_audio_device("ui", AudioDevice::Earpiece).unwrap();

        assert_eq!(coordinator.selected_device(), Some(AudioDevice::Earpiece));
        assert_eq!(platform.routes(), vec![AudioDevice::Speaker, AudioDevice::Earpiece]);
        assert_eq!(coordinator.state(), ActivationState::Inactive);
        assert!(bus.transitions().is_empty());
        assert_eq!(bus.on_topic(event_names::DEVICES_UPDATED).len(), 2);
    }

    #[test]
    fn test_set_audio_device_unknown_clears_choice() {
        let platform = Arc::new(ScriptedPlatform::new());
        let coordinator = coordinator(&platform);
        coordinator.handle_platform_event(PlatformEvent::DevicesChanged(vec![
            AudioDevice::Earpiece,
            AudioDevice::Speaker,
        ]));
        coordinator.set_audio_device("ui", AudioDevice::Earpiece).unwrap();
        platform.clear_calls();

        coordinator.set_audio_device("ui", AudioDevice::Bluetooth).unwrap();
        assert!(platform.calls().is_empty());
        assert_eq!(coordinator.selected_device(), Some(AudioDevice::Earpiece));

        // Without a standing choice the policy picks the speaker again.
        coordinator.set_mode("ui", AudioMode::VideoCall).unwrap();
        assert_eq!(coordinator.selected_device(), Some(AudioDevice::Speaker));
        assert_eq!(platform.calls(), vec![PlatformCall::Route(AudioDevice::Speaker)]);
    }

    #[test]
    fn test_default_mode_drops_route() {
        let platform = Arc::new(ScriptedPlatform::new());
        let coordinator = coordinator(&platform);
        coordinator.handle_platform_event(PlatformEvent::DeviceAdded(AudioDevice::Headphones));
        coordinator.set_audio_device("ui", AudioDevice::Headphones).unwrap();
        coordinator.activate("engine").unwrap();

        coordinator.set_mode("ui", AudioMode::Default).unwrap();

        assert_eq!(coordinator.selected_device(), None);
        assert_eq!(coordinator.state(), ActivationState::Active);
        assert_eq!(coordinator.request_count(), 1);
        assert!(coordinator.devices().iter().all(|d| !d.selected));
    }

    #[test]
    fn test_route_failure_is_retried_by_next_operation() {
        let platform = Arc::new(ScriptedPlatform::new());
        let coordinator = coordinator(&platform);
        platform.fail_next_route(PlatformError::new("port unavailable"));

        coordinator.handle_platform_event(PlatformEvent::DeviceAdded(AudioDevice::Speaker));
        assert_eq!(coordinator.selected_device(), Some(AudioDevice::Speaker));
        assert_eq!(platform.routes(), vec![AudioDevice::Speaker]);

        coordinator.set_audio_device("ui", AudioDevice::Speaker).unwrap();
        assert_eq!(platform.routes(), vec![AudioDevice::Speaker, AudioDevice::Speaker]);

        coordinator.set_audio_device("ui", AudioDevice::Speaker).unwrap();
        assert_eq!(platform.routes().len(), 2);
    }

    #[test]
    fn test_route_failure_surfaces_from_set_mode() {
        let platform = Arc::new(ScriptedPlatform::new());
        let coordinator = coordinator(&platform);
        coordinator.handle_platform_event(PlatformEvent::DevicesChanged(vec![
            AudioDevice::Speaker,
            AudioDevice::Bluetooth,
        ]));
        coordinator.set_mode("ui", AudioMode::Default).unwrap();
        platform.fail_next_route(PlatformError::with_code(-50, "bad route"));

        let err = coordinator.set_mode("ui", AudioMode::VideoCall).unwrap_err();
        assert!(matches!(err, AudioSessionError::PlatformRoutingFailed(_)));
        assert_eq!(coordinator.mode(), AudioMode::VideoCall);
        assert_eq!(coordinator.selected_device(), Some(AudioDevice::Bluetooth));
        assert_eq!(coordinator.snapshot().pending, None);
    }
}

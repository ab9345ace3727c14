//! Output device routing.
//!
//! Tracks which output devices the platform reports and which one audio is
//! routed to. Lives inside the session record, so every change happens under
//! the same serialization point as activation; nothing here touches
//! [`ActivationState`](rtcaudio_events::ActivationState).
//!
//! Selection policy outside [`AudioMode::Default`]: a user choice that is
//! still available wins, then Bluetooth, headphones, speaker, and the
//! earpiece last. Default mode routes nowhere and forgets the user choice.

use crate::mode::AudioMode;
use rtcaudio_events::{now_ms, AudioDevice, DeviceInfo, DevicesUpdatedEvent, SessionNotification};
use std::collections::BTreeSet;

const PREFERENCE: [AudioDevice; 4] = [
    AudioDevice::Bluetooth,
    AudioDevice::Headphones,
    AudioDevice::Speaker,
    AudioDevice::Earpiece,
];

#[derive(Debug, Default)]
pub(crate) struct DeviceRouting {
    available: BTreeSet<AudioDevice>,
    user_selected: Option<AudioDevice>,
    selected: Option<AudioDevice>,
    /// Last route the platform accepted.
    applied: Option<AudioDevice>,
}

impl DeviceRouting {
    pub(crate) fn available(&self) -> Vec<AudioDevice> {
        self.available.iter().copied().collect()
    }

    pub(crate) fn selected(&self) -> Option<AudioDevice> {
        self.selected
    }

    #[cfg(test)]
    pub(crate) fn user_selected(&self) -> Option<AudioDevice> {
        self.user_selected
    }

    /// Device the policy picks for `mode` from what is available now.
    pub(crate) fn choose(&self, mode: AudioMode) -> Option<AudioDevice> {
        if mode == AudioMode::Default {
            return None;
        }
        self.user_selected
            .filter(|device| self.available.contains(device))
            .or_else(|| {
                PREFERENCE
                    .into_iter()
                    .find(|device| self.available.contains(device))
            })
    }

    /// Re-run the policy for `mode`. Queues a devices-updated notification
    /// when the selection moved.
    pub(crate) fn reroute(&mut self, mode: AudioMode, notes: &mut Vec<SessionNotification>) {
        if mode == AudioMode::Default {
            let had_selection = self.selected.is_some() || self.user_selected.is_some();
            self.clear_selection();
            if had_selection {
                tracing::debug!("default mode; output route selection cleared");
                notes.push(self.devices_updated());
            }
            return;
        }

        let choice = self.choose(mode);
        if choice == self.selected {
            return;
        }
        tracing::info!(from = ?self.selected, to = ?choice, %mode, "output route selected");
        self.selected = choice;
        notes.push(self.devices_updated());
    }

    /// Record an explicit device choice. A device that is not available
    /// clears the previous choice and leaves the route alone.
    pub(crate) fn select(
        &mut self,
        device: AudioDevice,
        mode: AudioMode,
        notes: &mut Vec<SessionNotification>,
    ) -> bool {
        if !self.available.contains(&device) {
            tracing::warn!(%device, "requested audio device is not available");
            self.user_selected = None;
            return false;
        }
        self.user_selected = Some(device);
        self.reroute(mode, notes);
        true
    }

    /// Apply a change to the device set. Any change drops the current
    /// selection, re-runs the policy and reports the new list.
    pub(crate) fn update_devices(
        &mut self,
        change: DeviceChange,
        mode: AudioMode,
        notes: &mut Vec<SessionNotification>,
    ) {
        let changed = match change {
            DeviceChange::Added(device) => self.available.insert(device),
            DeviceChange::Removed(device) => self.available.remove(&device),
            DeviceChange::Replaced(devices) => {
                let devices: BTreeSet<_> = devices.into_iter().collect();
                let changed = devices != self.available;
                self.available = devices;
                changed
            }
        };
        if !changed {
            return;
        }
        tracing::debug!(available = ?self.available, "audio devices changed");

        self.clear_selection();
        self.reroute(mode, notes);
        if self.selected.is_none() {
            // reroute only reports a moved selection
            notes.push(self.devices_updated());
        }
    }

    /// Route that still has to reach the platform.
    pub(crate) fn unapplied(&self) -> Option<AudioDevice> {
        self.selected.filter(|device| self.applied != Some(*device))
    }

    pub(crate) fn mark_applied(&mut self, device: AudioDevice) {
        self.applied = Some(device);
    }

    /// The platform lost its route; push the selection again.
    pub(crate) fn invalidate_applied(&mut self) {
        self.applied = None;
    }

    /// Device list as reported to the host.
    pub(crate) fn device_list(&self) -> Vec<DeviceInfo> {
        let has_headphones = self.available.contains(&AudioDevice::Headphones);
        self.available
            .iter()
            .filter(|device| !(has_headphones && **device == AudioDevice::Earpiece))
            .map(|device| DeviceInfo {
                device: *device,
                selected: self.selected == Some(*device),
            })
            .collect()
    }

    fn devices_updated(&self) -> SessionNotification {
        SessionNotification::DevicesUpdated(DevicesUpdatedEvent {
            devices: self.device_list(),
            selected: self.selected,
            timestamp_ms: now_ms(),
        })
    }

    fn clear_selection(&mut self) {
        self.selected = None;
        self.user_selected = None;
        self.applied = None;
    }
}

/// Change to the set of available devices reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum DeviceChange {
    Added(AudioDevice),
    Removed(AudioDevice),
    Replaced(Vec<AudioDevice>),
}

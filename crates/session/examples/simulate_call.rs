//! Example: Drive an audio session through a simulated call.
//!
//! Run with: cargo run -p rtcaudio-session --example simulate_call

use rtcaudio_session::testing::ScriptedPlatform;
use rtcaudio_session::{
    AudioDevice, AudioMode, AudioSession, PlatformEvent, RouteChangeReason, SessionConfig,
    SessionNotification,
};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,rtcaudio_session=debug")),
        )
        .init();

    println!("=== Audio Session Simulation ===\n");

    let platform = Arc::new(ScriptedPlatform::new());
    platform.set_call_delay(Duration::from_millis(10));

    let config = SessionConfig {
        mode: AudioMode::for_call(true, true),
        ..Default::default()
    };
    let session = AudioSession::new(platform.clone(), config);
    let notifications = session.subscribe();

    let printer = thread::spawn(move || {
        for notification in notifications.iter() {
            match notification {
                SessionNotification::StateChanged(e) => println!(
                    "  state   {:>12} -> {:<12} count={} by {}",
                    e.from,
                    e.to,
                    e.request_count,
                    e.requester.as_deref().unwrap_or("(platform)")
                ),
                SessionNotification::DevicesUpdated(e) => {
                    let listed: Vec<String> = e
                        .devices
                        .iter()
                        .map(|d| format!("{}{}", d.device, if d.selected { "*" } else { "" }))
                        .collect();
                    println!("  devices [{}]", listed.join(", "));
                }
                other => println!("  event   {}", other.topic()),
            }
        }
    });

    // Media engine and call UI both want audio.
    let callers: Vec<_> = ["media-engine", "call-ui", "proximity-sensor"]
        .into_iter()
        .map(|name| {
            let coordinator = Arc::clone(session.coordinator());
            thread::spawn(move || coordinator.activate(name))
        })
        .collect();
    for caller in callers {
        if let Err(e) = caller.join().expect("caller thread panicked") {
            eprintln!("activation failed: {e}");
        }
    }

    platform.emit(PlatformEvent::DevicesChanged(vec![
        AudioDevice::Earpiece,
        AudioDevice::Speaker,
    ]));
    platform.emit(PlatformEvent::RouteChanged {
        reason: RouteChangeReason::NewDeviceAvailable,
        previous_output: Some("Speaker".into()),
        current_output: Some("BluetoothHFP".into()),
    });

    // The user prefers the earpiece over the headset.
    if let Err(e) = session.coordinator().set_audio_device("call-ui", AudioDevice::Earpiece) {
        eprintln!("routing failed: {e}");
    }

    // An incoming phone call interrupts us.
    platform.emit(PlatformEvent::InterruptionBegan);
    platform.emit(PlatformEvent::InterruptionEnded { should_resume: true });

    // Nothing resumes automatically; the engine decides to come back.
    if let Err(e) = session.coordinator().activate("media-engine") {
        eprintln!("re-activation failed: {e}");
    }
    let _ = session.coordinator().deactivate("media-engine");

    thread::sleep(Duration::from_millis(50));
    println!("\nFinal: {:?}", session.snapshot());
    println!(
        "Platform calls: {} activate, {} deactivate, {} configure, routes {:?}",
        platform.activate_count(),
        platform.deactivate_count(),
        platform.configure_count(),
        platform.routes()
    );

    // The platform's handler keeps the relay alive; drop both to close the channel.
    drop(session);
    drop(platform);
    let _ = printer.join();
}

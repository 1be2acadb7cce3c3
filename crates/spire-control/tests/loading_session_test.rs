// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use anyhow::Result;
use spire_control::{
    CompletionInfo, FallbackTrigger, LoadingManager, LoadingPhase, TimeoutReason,
};
use spire_core::{
    ConnectionQuality, DeviceProfile, LoadingConfig, LoadingConfigOverrides, ManualClock,
    ResourceFailure, ResourceType, StaticDeviceProbe,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn seeded_config() -> LoadingConfig {
    LoadingConfig {
        rng_seed: Some(42),
        ..LoadingConfig::default()
    }
}

fn manager_with(config: LoadingConfig) -> Result<(LoadingManager, ManualClock)> {
    let clock = ManualClock::new();
    let mut manager = LoadingManager::new(Arc::new(clock.clone()));
    manager.initialize_with_config(config)?;
    Ok((manager, clock))
}

/// Advances the clock in `step_ms` increments, ticking each time, until the
/// session ends or `limit_ms` is reached.
fn run_until_done(manager: &mut LoadingManager, clock: &ManualClock, step_ms: u64, limit_ms: u64) {
    let mut elapsed = 0;
    while manager.is_loading() && elapsed < limit_ms {
        clock.advance_ms(step_ms);
        elapsed += step_ms;
        manager.tick();
    }
}

#[test]
fn test_unloaded_resource_completes_in_fallback_at_maximum_time() -> Result<()> {
    // --- 1. Setup ---
    let clock = ManualClock::new();
    let mut manager = LoadingManager::new(Arc::new(clock.clone()));
    let overrides = LoadingConfigOverrides {
        maximum_loading_time: Some(100),
        rng_seed: Some(1),
        ..LoadingConfigOverrides::default()
    };
    manager.initialize(&overrides)?;

    let completions: Arc<Mutex<Vec<CompletionInfo>>> = Arc::new(Mutex::new(Vec::new()));
    let _on_complete = {
        let completions = Arc::clone(&completions);
        manager.on_loading_complete(move |info| completions.lock().unwrap().push(info.clone()))
    };

    // --- 2. Act ---
    manager.start_loading()?;
    manager.track_resource("/never.bin", 1.0, ResourceType::Images);
    clock.advance_ms(100);
    manager.tick();

    // --- 3. Assert ---
    let completions = completions.lock().unwrap();
    assert_eq!(completions.len(), 1);
    assert_eq!(completions[0].progress, 100.0);
    assert!(completions[0].fallback_mode);
    assert_eq!(
        completions[0].fallback_reason.as_ref().map(|r| r.reason),
        Some(FallbackTrigger::MaximumTime)
    );
    assert_eq!(manager.phase(), LoadingPhase::Complete);
    Ok(())
}

#[test]
fn test_six_non_critical_errors_enter_fallback() -> Result<()> {
    let (mut manager, _) = manager_with(seeded_config())?;
    manager.start_loading()?;
    manager.track_resource("/a.png", 0.5, ResourceType::Images);
    manager.track_resource("/b.png", 0.5, ResourceType::Images);

    for i in 0..5 {
        manager.handle_error(
            ResourceFailure::network("flaky"),
            Some(&format!("/img-{i}.png")),
            false,
        );
    }
    assert!(!manager.state().fallback_mode);

    manager.handle_error(ResourceFailure::network("flaky"), None, false);
    let state = manager.state();
    assert!(state.fallback_mode);
    assert_eq!(state.error_count, 6);
    assert_eq!(state.failed_resources.len(), 5);
    assert_eq!(
        state.fallback_reason.map(|r| r.reason),
        Some(FallbackTrigger::TooManyErrors)
    );
    Ok(())
}

#[test]
fn test_timeout_is_notified_exactly_once() -> Result<()> {
    let (mut manager, clock) = manager_with(seeded_config())?;
    let timeouts = Arc::new(Mutex::new(Vec::new()));
    let _on_timeout = {
        let timeouts = Arc::clone(&timeouts);
        manager.on_timeout(move |event| timeouts.lock().unwrap().push(event.reason.clone()))
    };

    manager.start_loading()?;
    manager.track_resource("/slow.js", 1.0, ResourceType::Images);
    clock.advance_ms(8000);
    manager.tick();
    manager.handle_timeout(TimeoutReason::MaximumTimeExceeded);
    clock.advance_ms(8000);
    manager.tick();

    assert_eq!(
        *timeouts.lock().unwrap(),
        vec![TimeoutReason::MaximumTimeExceeded]
    );
    assert!(!manager.is_loading());
    assert_eq!(manager.progress(), 100.0);
    Ok(())
}

#[test]
fn test_fallback_latch_keeps_first_reason() -> Result<()> {
    let (mut manager, _) = manager_with(seeded_config())?;
    let fallbacks = Arc::new(Mutex::new(0));
    let _on_fallback = {
        let fallbacks = Arc::clone(&fallbacks);
        manager.on_fallback(move |_| *fallbacks.lock().unwrap() += 1)
    };
    manager.start_loading()?;
    manager.track_resource("/a.js", 1.0, ResourceType::Critical);

    manager.enter_fallback_mode(FallbackTrigger::Manual, "operator request");
    manager.enter_fallback_mode(FallbackTrigger::TooManyErrors, "later");

    let state = manager.state();
    assert!(state.fallback_mode);
    assert_eq!(state.fallback_reason.unwrap().details, "operator request");
    assert_eq!(*fallbacks.lock().unwrap(), 1);
    Ok(())
}

#[test]
fn test_fallback_ticker_adds_bounded_synthetic_steps() -> Result<()> {
    let (mut manager, clock) = manager_with(seeded_config())?;
    let seen = Arc::new(Mutex::new(Vec::new()));
    let _on_progress = {
        let seen = Arc::clone(&seen);
        manager.on_progress_update(move |p| seen.lock().unwrap().push(*p))
    };

    manager.start_loading()?;
    manager.enter_fallback_mode(FallbackTrigger::Manual, "nothing to force");

    for _ in 0..3 {
        clock.advance_ms(200);
        manager.tick();
    }
    let steps = seen.lock().unwrap().clone();
    assert_eq!(steps.len(), 3);
    let mut previous = 0.0;
    for value in steps {
        let step = value - previous;
        assert!((1.0 - 1e-9..=4.0 + 1e-9).contains(&step), "synthetic step {step}");
        previous = value;
    }

    // The minimum floor at 800 ms completes the session.
    clock.advance_ms(200);
    manager.tick();
    assert!(!manager.is_loading());
    Ok(())
}

#[test]
fn test_fallback_always_completes_within_fallback_window() -> Result<()> {
    let config = LoadingConfig {
        maximum_loading_time: Duration::from_secs(60),
        ..seeded_config()
    };
    let (mut manager, clock) = manager_with(config)?;
    manager.start_loading()?;
    manager.track_resource("/stuck.js", 1.0, ResourceType::Images);

    clock.advance_ms(1000);
    manager.tick();
    manager.enter_fallback_mode(FallbackTrigger::Manual, "forced");

    run_until_done(&mut manager, &clock, 50, 2000);
    assert!(!manager.is_loading());
    assert_eq!(manager.progress(), 100.0);
    Ok(())
}

#[test]
fn test_stalls_recover_then_fall_back_when_retries_run_out() -> Result<()> {
    let config = LoadingConfig {
        maximum_loading_time: Duration::from_secs(60),
        progress_stall_threshold: Duration::from_millis(1000),
        ..seeded_config()
    };
    let (mut manager, clock) = manager_with(config)?;
    let retries = Arc::new(Mutex::new(Vec::new()));
    let _on_retry = {
        let retries = Arc::clone(&retries);
        manager.on_retry(move |event| retries.lock().unwrap().push(event.attempt))
    };

    manager.start_loading()?;
    manager.track_resource("/stuck.webp", 1.0, ResourceType::Images);
    run_until_done(&mut manager, &clock, 100, 60_000);

    assert_eq!(*retries.lock().unwrap(), vec![1, 2, 3]);
    let state = manager.state();
    assert_eq!(state.retry_count, 3);
    assert_eq!(
        state.fallback_reason.map(|r| r.reason),
        Some(FallbackTrigger::ProgressStall)
    );
    assert_eq!(state.progress, 100.0);
    Ok(())
}

#[test]
fn test_slow_connection_extends_maximum_time() -> Result<()> {
    let clock = ManualClock::new();
    let profile = DeviceProfile {
        connection: ConnectionQuality::Slow,
        ..DeviceProfile::default()
    };
    let mut manager =
        LoadingManager::with_device_probe(Arc::new(clock), StaticDeviceProbe(profile));
    manager.initialize(&LoadingConfigOverrides::default())?;
    assert_eq!(
        manager.config().maximum_loading_time,
        Duration::from_millis(15_000)
    );
    Ok(())
}

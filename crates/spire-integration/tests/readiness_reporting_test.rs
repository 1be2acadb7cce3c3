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
use spire_control::LoadingManager;
use spire_core::{LoadingConfig, ManualClock};
use spire_integration::{AnimationSystemIntegration, CanvasProbe, ContextKind, EngineProbe};
use std::sync::Arc;
use std::thread;

#[test]
fn test_probes_drive_a_session_to_completion() -> Result<()> {
    // --- 1. Setup ---
    let clock = ManualClock::new();
    let mut manager = LoadingManager::new(Arc::new(clock.clone()));
    manager.initialize_with_config(LoadingConfig {
        rng_seed: Some(3),
        ..LoadingConfig::default()
    })?;
    manager.start_loading()?;

    let integration = AnimationSystemIntegration::new(manager.tracking_sender());
    let engine = EngineProbe::new(integration.clone(), "scene-engine", 0.5);
    let canvas = CanvasProbe::new(integration, "liquid-canvas", 0.5);
    manager.tick();
    assert_eq!(manager.tracker().map(|t| t.registry().len()), Some(2));

    // --- 2. Act: the engine initializes on another thread ---
    let worker = thread::spawn(move || engine.initialize(|| Ok::<_, String>(())));
    worker
        .join()
        .map_err(|_| anyhow::anyhow!("engine thread panicked"))?
        .map_err(anyhow::Error::msg)?;
    manager.tick();
    assert_eq!(manager.progress(), 50.0);

    canvas.context_created(ContextKind::WebGl);
    canvas.context_created(ContextKind::WebGl);
    manager.tick();

    // --- 3. Assert: completion waits for the minimum loading time ---
    assert_eq!(manager.progress(), 100.0);
    assert!(manager.is_loading());
    clock.advance_ms(800);
    manager.tick();
    assert!(!manager.is_loading());
    Ok(())
}

#[test]
fn test_notifications_after_manager_drop_are_harmless() {
    let clock = ManualClock::new();
    let manager = LoadingManager::new(Arc::new(clock));
    let integration = AnimationSystemIntegration::new(manager.tracking_sender());
    drop(manager);

    assert!(integration.notify_system_loaded("late-system"));
    assert!(!integration.notify_system_loaded("late-system"));
}

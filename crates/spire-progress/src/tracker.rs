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

//! The [`ProgressTracker`]: registry ownership, discovery and emission.

use crate::discovery::{DiscoveredUnit, DiscoveryError, DiscoveryHook};
use crate::registry::{MarkOutcome, ResourceRegistry};
use crate::smoothing::ProgressSmoother;
use serde::Serialize;
use spire_core::clock::Clock;
use spire_core::config::{AnimationSystemSpec, LoadingConfig, ResourceWeights};
use spire_core::event::{Subscribers, Subscription};
use spire_core::resource::{ProgressBreakdown, ResourceType, TrackedUnit};
use spire_core::timer::TimerQueue;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// The subset of [`LoadingConfig`] the tracker needs.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerConfig {
    /// Largest change allowed between consecutive emissions.
    pub max_jump_per_update: f64,
    /// Deadline, measured from `start_tracking`, after which unfinished
    /// critical units are force-completed. `None` disables it.
    pub critical_timeout: Option<Duration>,
    /// Per-type budget shared among discovered units without their own weight.
    pub resource_weights: ResourceWeights,
    /// Animation systems registered as placeholders when tracking starts.
    pub animation_systems: Vec<AnimationSystemSpec>,
}

impl TrackerConfig {
    /// Extracts the tracker settings from a full loading configuration.
    pub fn from_loading_config(config: &LoadingConfig) -> Self {
        Self {
            max_jump_per_update: config.max_jump_per_update,
            critical_timeout: Some(config.critical_resource_timeout()),
            resource_weights: config.resource_weights,
            animation_systems: config.animation_systems.clone(),
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self::from_loading_config(&LoadingConfig::default())
    }
}

/// One emitted progress value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProgressSample {
    /// Time since tracking started.
    pub time: Duration,
    /// The smoothed value that was emitted.
    pub progress: f64,
    /// The weighted ratio before smoothing.
    pub raw_progress: f64,
}

/// Diagnostics snapshot of a tracking session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackerStatistics {
    /// Number of tracked resources.
    pub total_resources: usize,
    /// Number of loaded resources.
    pub loaded_resources: usize,
    /// Number of tracked animation systems.
    pub total_animation_systems: usize,
    /// Number of loaded animation systems.
    pub loaded_animation_systems: usize,
    /// Units completed by a recovery or fallback path.
    pub force_loaded: usize,
    /// Sum of all weights.
    pub total_weight: f64,
    /// Sum of loaded weights.
    pub loaded_weight: f64,
    /// Time since tracking started.
    pub elapsed: Duration,
    /// Last emitted value, or 0 before the first emission.
    pub progress: f64,
    /// Every emission of the session, oldest first.
    pub history: Vec<ProgressSample>,
    /// Per-type counts.
    pub breakdown: ProgressBreakdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TrackerTimer {
    CriticalTimeout,
}

/// Owns the [`ResourceRegistry`] and turns its weighted ratio into a
/// jump-limited progress stream.
pub struct ProgressTracker {
    config: TrackerConfig,
    clock: Arc<dyn Clock>,
    registry: ResourceRegistry,
    smoother: ProgressSmoother,
    history: Vec<ProgressSample>,
    hooks: Vec<Box<dyn DiscoveryHook>>,
    timers: TimerQueue<TrackerTimer>,
    started_at: Option<Duration>,
    tracking: bool,
    listeners: Subscribers<ProgressSample>,
}

impl ProgressTracker {
    /// Creates an idle tracker.
    pub fn new(config: TrackerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            smoother: ProgressSmoother::new(config.max_jump_per_update),
            config,
            clock,
            registry: ResourceRegistry::new(),
            history: Vec::new(),
            hooks: Vec::new(),
            timers: TimerQueue::new(),
            started_at: None,
            tracking: false,
            listeners: Subscribers::new(),
        }
    }

    /// Registers a discovery hook. Hooks run on every `start_tracking`.
    pub fn add_hook(&mut self, hook: impl DiscoveryHook + 'static) {
        self.add_boxed_hook(Box::new(hook));
    }

    /// Registers an already boxed discovery hook.
    pub fn add_boxed_hook(&mut self, hook: Box<dyn DiscoveryHook>) {
        self.hooks.push(hook);
    }

    /// Subscribes to emitted samples.
    #[must_use = "dropping the Subscription immediately unsubscribes the callback"]
    pub fn on_progress(&self, callback: impl FnMut(&ProgressSample) + Send + 'static) -> Subscription {
        self.listeners.subscribe(callback)
    }

    /// Begins a session: records the start time, clears history, runs
    /// discovery, installs animation-system placeholders and arms the
    /// critical-resource timeout. Nothing is emitted.
    pub fn start_tracking(&mut self) {
        if self.tracking {
            self.stop_tracking();
        }
        let now = self.clock.now();
        self.started_at = Some(now);
        self.history.clear();
        self.smoother.reset();
        self.tracking = true;

        self.run_discovery(now);

        let placeholders = self.config.animation_systems.clone();
        for system in placeholders {
            self.track_animation_system(&system.name, system.weight);
        }

        if let Some(timeout) = self.config.critical_timeout {
            self.timers
                .schedule(now + timeout, TrackerTimer::CriticalTimeout);
        }
        log::info!(
            "Progress tracking started with {} unit(s)",
            self.registry.len()
        );
    }

    fn run_discovery(&mut self, now: Duration) {
        let mut discovered: Vec<DiscoveredUnit> = Vec::new();
        for hook in self.hooks.iter_mut() {
            match hook.discover() {
                Ok(units) => {
                    log::debug!("Hook '{}' discovered {} unit(s)", hook.name(), units.len());
                    discovered.extend(share_category_budget(
                        units,
                        &self.config.resource_weights,
                    ));
                }
                Err(DiscoveryError::Unavailable(source)) => {
                    log::info!("Discovery source '{source}' unavailable; skipping");
                }
                Err(e) => log::warn!("Discovery hook '{}' failed: {e}", hook.name()),
            }
        }
        for unit in discovered {
            let weight = unit.weight.unwrap_or(0.0);
            if !self
                .registry
                .track_resource(&unit.key, weight, unit.resource_type, now)
            {
                log::debug!("Discovered '{}' is already tracked", unit.key);
            }
        }
    }

    /// Ends the session: disconnects hooks and cancels tracker timers. Units
    /// and history stay available for statistics.
    pub fn stop_tracking(&mut self) {
        if !self.tracking {
            return;
        }
        for hook in self.hooks.iter_mut() {
            hook.disconnect();
        }
        self.timers.clear();
        self.tracking = false;
        log::debug!("Progress tracking stopped");
    }

    /// Registers a resource. A URL that is already tracked is ignored.
    pub fn track_resource(&mut self, url: &str, weight: f64, resource_type: ResourceType) -> bool {
        let now = self.clock.now();
        let added = self
            .registry
            .track_resource(url, weight, resource_type, now);
        if !added {
            log::warn!("Resource '{url}' is already being tracked");
        }
        added
    }

    /// Registers an animation system. A name that is already tracked is
    /// ignored.
    pub fn track_animation_system(&mut self, name: &str, weight: f64) -> bool {
        let now = self.clock.now();
        let added = self.registry.track_animation_system(name, weight, now);
        if !added {
            log::warn!("Animation system '{name}' is already being tracked");
        }
        added
    }

    /// Marks a resource as loaded and emits the new progress.
    ///
    /// Returns the emitted value, or `None` if the URL was unknown or already
    /// loaded.
    pub fn mark_resource_loaded(&mut self, url: &str, force_load: bool) -> Option<f64> {
        let load_time = self.elapsed();
        match self.registry.mark_resource(url, load_time, force_load) {
            MarkOutcome::Loaded => Some(self.emit()),
            MarkOutcome::Unknown => {
                log::warn!("Cannot mark unknown resource '{url}' as loaded");
                None
            }
            MarkOutcome::AlreadyLoaded => {
                log::warn!("Resource '{url}' is already loaded");
                None
            }
        }
    }

    /// Marks an animation system as loaded and emits the new progress.
    pub fn mark_animation_system_loaded(&mut self, name: &str) -> Option<f64> {
        let load_time = self.elapsed();
        match self.registry.mark_animation_system(name, load_time, false) {
            MarkOutcome::Loaded => Some(self.emit()),
            MarkOutcome::Unknown => {
                log::warn!("Cannot mark unknown animation system '{name}' as loaded");
                None
            }
            MarkOutcome::AlreadyLoaded => {
                log::warn!("Animation system '{name}' is already loaded");
                None
            }
        }
    }

    /// Recomputes and emits the current progress.
    pub fn recalculate_progress(&mut self) -> f64 {
        self.emit()
    }

    /// Force-completes every unloaded unit and emits. Returns `None` if
    /// everything was already loaded.
    pub fn enter_fallback_mode(&mut self) -> Option<f64> {
        let load_time = self.elapsed();
        let forced = self.registry.force_where(load_time, |_| true);
        if forced == 0 {
            return None;
        }
        log::warn!("Fallback: force-loaded {forced} unit(s)");
        Some(self.emit())
    }

    /// Force-completes the given resources, skipping unknown or loaded ones.
    /// Emits once if anything changed.
    pub fn force_resources<'a>(&mut self, urls: impl IntoIterator<Item = &'a str>) -> Option<f64> {
        let load_time = self.elapsed();
        let changed = urls
            .into_iter()
            .filter(|url| self.registry.mark_resource(url, load_time, true) == MarkOutcome::Loaded)
            .count();
        (changed > 0).then(|| self.emit())
    }

    /// Fires due tracker timers. Returns the emitted value if any unit was
    /// force-completed.
    pub fn poll(&mut self, now: Duration) -> Option<f64> {
        let mut emitted = None;
        while let Some((_, _, timer)) = self.timers.pop_due(now) {
            match timer {
                TrackerTimer::CriticalTimeout => {
                    let load_time = self.elapsed();
                    let forced = self.registry.force_where(load_time, |unit| {
                        unit.resource_type == ResourceType::Critical
                    });
                    if forced > 0 {
                        log::warn!(
                            "Critical resource timeout: force-loaded {forced} resource(s)"
                        );
                        emitted = Some(self.emit());
                    }
                }
            }
        }
        emitted
    }

    /// Earliest pending tracker timer.
    pub fn next_deadline(&self) -> Option<Duration> {
        self.timers.next_deadline()
    }

    fn emit(&mut self) -> f64 {
        let raw_progress = self.registry.raw_progress();
        let progress = self.smoother.apply(raw_progress);
        let sample = ProgressSample {
            time: self.elapsed(),
            progress,
            raw_progress,
        };
        log::trace!("Progress {progress:.1} (raw {raw_progress:.1})");
        self.history.push(sample);
        self.listeners.emit(&sample);
        progress
    }

    fn elapsed(&self) -> Duration {
        let now = self.clock.now();
        now.saturating_sub(self.started_at.unwrap_or(now))
    }

    /// Per-type counts.
    pub fn progress_breakdown(&self) -> ProgressBreakdown {
        self.registry.breakdown()
    }

    /// Diagnostics snapshot.
    pub fn statistics(&self) -> TrackerStatistics {
        let (total_resources, loaded_resources) = count_loaded(self.registry.resources());
        let (total_animation_systems, loaded_animation_systems) =
            count_loaded(self.registry.animation_systems());
        let force_loaded = self
            .registry
            .resources()
            .chain(self.registry.animation_systems())
            .filter(|unit| unit.force_loaded)
            .count();

        TrackerStatistics {
            total_resources,
            loaded_resources,
            total_animation_systems,
            loaded_animation_systems,
            force_loaded,
            total_weight: self.registry.total_weight(),
            loaded_weight: self.registry.loaded_weight(),
            elapsed: self.elapsed(),
            progress: self.smoother.last().unwrap_or(0.0),
            history: self.history.clone(),
            breakdown: self.registry.breakdown(),
        }
    }

    /// Last emitted value.
    pub fn last_progress(&self) -> Option<f64> {
        self.smoother.last()
    }

    /// Current weighted ratio, without smoothing or emission.
    pub fn raw_progress(&self) -> f64 {
        self.registry.raw_progress()
    }

    /// Every emission of the current session.
    pub fn history(&self) -> &[ProgressSample] {
        &self.history
    }

    /// Read access to the tracked units.
    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    /// Returns `true` between `start_tracking` and `stop_tracking`.
    pub fn is_tracking(&self) -> bool {
        self.tracking
    }

    /// Stops tracking and discards every unit and sample. Hooks and
    /// subscribers stay registered.
    pub fn reset(&mut self) {
        self.stop_tracking();
        self.registry.clear();
        self.history.clear();
        self.smoother.reset();
        self.started_at = None;
    }
}

impl std::fmt::Debug for ProgressTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressTracker")
            .field("tracking", &self.tracking)
            .field("units", &self.registry.len())
            .field("last_progress", &self.smoother.last())
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

fn count_loaded<'a>(units: impl Iterator<Item = &'a TrackedUnit>) -> (usize, usize) {
    units.fold((0, 0), |(total, loaded), unit| {
        (total + 1, loaded + usize::from(unit.loaded))
    })
}

/// Gives weightless units an even share of their category's budget.
fn share_category_budget(
    units: Vec<DiscoveredUnit>,
    weights: &ResourceWeights,
) -> Vec<DiscoveredUnit> {
    let mut weightless: HashMap<ResourceType, usize> = HashMap::new();
    for unit in units.iter().filter(|unit| unit.weight.is_none()) {
        *weightless.entry(unit.resource_type).or_default() += 1;
    }
    units
        .into_iter()
        .map(|mut unit| {
            if unit.weight.is_none() {
                let share = weightless.get(&unit.resource_type).copied().unwrap_or(1);
                unit.weight = Some(weights.for_type(unit.resource_type) / share as f64);
            }
            unit
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::{DocumentReadyHook, FontFaceHook, PageManifest};
    use approx::assert_relative_eq;
    use spire_core::clock::ManualClock;
    use std::sync::Mutex;

    fn tracker(max_jump: f64) -> (ProgressTracker, ManualClock) {
        let clock = ManualClock::new();
        let config = TrackerConfig {
            max_jump_per_update: max_jump,
            critical_timeout: Some(Duration::from_millis(6400)),
            resource_weights: ResourceWeights::default(),
            animation_systems: Vec::new(),
        };
        (ProgressTracker::new(config, Arc::new(clock.clone())), clock)
    }

    #[test]
    fn start_tracking_does_not_emit() {
        let (mut tracker, _) = tracker(10.0);
        tracker.start_tracking();
        assert!(tracker.history().is_empty());
        assert_eq!(tracker.last_progress(), None);
    }

    #[test]
    fn empty_tracker_recalculates_to_100() {
        let (mut tracker, _) = tracker(10.0);
        tracker.start_tracking();
        assert_eq!(tracker.recalculate_progress(), 100.0);
    }

    #[test]
    fn emissions_are_jump_limited_after_the_first() {
        let (mut tracker, _) = tracker(10.0);
        tracker.start_tracking();
        for i in 0..10 {
            tracker.track_resource(&format!("r{i}"), 0.1, ResourceType::Images);
        }
        tracker.mark_resource_loaded("r0", false);
        tracker.mark_resource_loaded("r1", false);
        tracker.force_resources(["r2", "r3", "r4", "r5", "r6", "r7"]);

        let history: Vec<f64> = tracker.history().iter().map(|s| s.progress).collect();
        assert_relative_eq!(history[0], 10.0, epsilon = 1e-9);
        assert_relative_eq!(history[1], 20.0, epsilon = 1e-9);
        assert_relative_eq!(history[2], 30.0, epsilon = 1e-9);
        assert_relative_eq!(tracker.history()[2].raw_progress, 80.0, epsilon = 1e-9);
    }

    #[test]
    fn unknown_and_repeated_marks_return_none() {
        let (mut tracker, _) = tracker(10.0);
        tracker.start_tracking();
        tracker.track_resource("/a.js", 1.0, ResourceType::Critical);
        assert!(tracker.mark_resource_loaded("/missing.js", false).is_none());
        assert!(tracker.mark_resource_loaded("/a.js", false).is_some());
        assert!(tracker.mark_resource_loaded("/a.js", false).is_none());
        assert_eq!(tracker.history().len(), 1);
    }

    #[test]
    fn discovery_shares_budget_and_skips_unavailable_sources() {
        let (mut tracker, _) = tracker(100.0);
        tracker.add_hook(PageManifest::new().stylesheet("/a.css").script("/a.js"));
        tracker.add_hook(FontFaceHook::unavailable());
        tracker.add_hook(DocumentReadyHook::new(0.2));
        tracker.start_tracking();

        let registry = tracker.registry();
        assert_eq!(registry.len(), 3);
        assert_relative_eq!(registry.resource("/a.css").unwrap().weight, 0.2);
        assert_relative_eq!(registry.resource("/a.js").unwrap().weight, 0.2);
        assert_relative_eq!(registry.total_weight(), 0.6, epsilon = 1e-9);
    }

    #[test]
    fn placeholders_come_from_config() {
        let clock = ManualClock::new();
        let config = TrackerConfig {
            animation_systems: vec![AnimationSystemSpec {
                name: "webgl".into(),
                weight: 0.3,
            }],
            ..TrackerConfig::default()
        };
        let mut tracker = ProgressTracker::new(config, Arc::new(clock));
        tracker.start_tracking();
        assert!(tracker.registry().animation_system("webgl").is_some());
    }

    #[test]
    fn critical_timeout_force_loads_critical_units_only() {
        let (mut tracker, clock) = tracker(100.0);
        tracker.start_tracking();
        tracker.track_resource("/app.js", 0.5, ResourceType::Critical);
        tracker.track_resource("/hero.webp", 0.5, ResourceType::Images);

        clock.advance_ms(6399);
        assert_eq!(tracker.poll(clock.now()), None);
        clock.advance_ms(1);
        assert_eq!(tracker.poll(clock.now()), Some(50.0));

        let app = tracker.registry().resource("/app.js").unwrap();
        assert!(app.force_loaded);
        assert_eq!(app.load_time, Some(Duration::from_millis(6400)));
        assert!(!tracker.registry().resource("/hero.webp").unwrap().loaded);
    }

    #[test]
    fn stop_tracking_cancels_critical_timeout() {
        let (mut tracker, clock) = tracker(100.0);
        tracker.start_tracking();
        tracker.track_resource("/app.js", 1.0, ResourceType::Critical);
        tracker.stop_tracking();
        tracker.stop_tracking();
        clock.advance_ms(10_000);
        assert_eq!(tracker.poll(clock.now()), None);
    }

    #[test]
    fn fallback_forces_everything_once() {
        let (mut tracker, _) = tracker(100.0);
        tracker.start_tracking();
        tracker.track_resource("/a", 1.0, ResourceType::Critical);
        tracker.track_animation_system("particles", 1.0);
        assert_eq!(tracker.enter_fallback_mode(), Some(100.0));
        assert_eq!(tracker.enter_fallback_mode(), None);
        assert_eq!(tracker.statistics().force_loaded, 2);
    }

    #[test]
    fn subscribers_receive_samples() {
        let (mut tracker, _) = tracker(100.0);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let _sub = {
            let seen = Arc::clone(&seen);
            tracker.on_progress(move |sample| seen.lock().unwrap().push(sample.progress))
        };
        tracker.start_tracking();
        tracker.track_resource("/a", 1.0, ResourceType::Critical);
        tracker.track_resource("/b", 1.0, ResourceType::Critical);
        tracker.mark_resource_loaded("/a", false);
        tracker.mark_resource_loaded("/b", false);
        assert_eq!(*seen.lock().unwrap(), vec![50.0, 100.0]);
    }

    #[test]
    fn statistics_report_counts_and_elapsed() {
        let (mut tracker, clock) = tracker(100.0);
        tracker.start_tracking();
        tracker.track_resource("/a", 1.0, ResourceType::Critical);
        tracker.track_animation_system("cursor", 1.0);
        clock.advance_ms(250);
        tracker.mark_animation_system_loaded("cursor");

        let stats = tracker.statistics();
        assert_eq!(stats.total_resources, 1);
        assert_eq!(stats.loaded_resources, 0);
        assert_eq!(stats.total_animation_systems, 1);
        assert_eq!(stats.loaded_animation_systems, 1);
        assert_eq!(stats.elapsed, Duration::from_millis(250));
        assert_eq!(stats.progress, 50.0);
        assert_eq!(stats.history.len(), 1);
    }

    #[test]
    fn reset_discards_units_and_history() {
        let (mut tracker, _) = tracker(100.0);
        tracker.start_tracking();
        tracker.track_resource("/a", 1.0, ResourceType::Critical);
        tracker.mark_resource_loaded("/a", false);
        tracker.reset();
        assert!(tracker.registry().is_empty());
        assert!(tracker.history().is_empty());
        assert!(!tracker.is_tracking());
    }
}

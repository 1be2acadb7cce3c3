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

//! The [`LoadingManager`] session state machine.

use crate::events::{
    CompletionInfo, CriticalError, ErrorEvent, FallbackReason, FallbackTrigger, LoadingState,
    RecoveryKind, RetryEvent, TimeoutEvent, TimeoutReason,
};
use crate::phase::LoadingPhase;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use spire_core::clock::Clock;
use spire_core::config::{LoadingConfig, LoadingConfigOverrides};
use spire_core::error::{LoadingError, ResourceFailure};
use spire_core::event::{EventBus, Subscribers, Subscription, TrackingCommand};
use spire_core::platform::{DeviceProbe, DeviceProfile, StaticDeviceProbe};
use spire_core::resource::{ProgressBreakdown, ResourceType};
use spire_core::retry::RetryPolicy;
use spire_core::timer::TimerQueue;
use spire_progress::{DiscoveryHook, ProgressTracker, TrackerConfig, TrackerStatistics};
use std::sync::Arc;
use std::time::Duration;

/// Progress changes smaller than this are not emitted.
const MIN_PROGRESS_DELTA: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ManagerTimer {
    MaximumTime,
    MinimumTime,
    StallWatchdog,
    RecoveryBackoff(RecoveryKind),
    FallbackTick,
}

#[derive(Default)]
struct ManagerEvents {
    progress: Subscribers<f64>,
    complete: Subscribers<CompletionInfo>,
    error: Subscribers<ErrorEvent>,
    timeout: Subscribers<TimeoutEvent>,
    retry: Subscribers<RetryEvent>,
    fallback: Subscribers<FallbackReason>,
}

impl ManagerEvents {
    fn clear(&self) {
        self.progress.clear();
        self.complete.clear();
        self.error.clear();
        self.timeout.clear();
        self.retry.clear();
        self.fallback.clear();
    }
}

/// Orchestrates one loading session at a time.
///
/// The manager never sleeps or spawns. Time advances through
/// [`tick`](LoadingManager::tick), which drains tracking commands sent from
/// other threads, fires due timers in deadline order and polls the tracker.
///
/// Subscriber callbacks run while the manager is mutably borrowed; they must
/// not call back into it. Use [`tracking_sender`](LoadingManager::tracking_sender)
/// to feed it from a callback.
pub struct LoadingManager {
    clock: Arc<dyn Clock>,
    device_probe: Box<dyn DeviceProbe>,
    config: LoadingConfig,
    policy: RetryPolicy,
    rng: StdRng,
    tracker: Option<ProgressTracker>,
    pending_hooks: Vec<Box<dyn DiscoveryHook>>,
    bus: EventBus<TrackingCommand>,
    timers: TimerQueue<ManagerTimer>,
    state: LoadingState,
    minimum_elapsed: bool,
    completion_pending: bool,
    timeout_notified: bool,
    last_progress_at: Duration,
    initialized: bool,
    disposed: bool,
    events: ManagerEvents,
}

impl LoadingManager {
    /// Creates a manager for a desktop-class device with a fast connection.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_device_probe(clock, StaticDeviceProbe(DeviceProfile::default()))
    }

    /// Creates a manager whose configuration adapts to `probe`.
    pub fn with_device_probe(clock: Arc<dyn Clock>, probe: impl DeviceProbe + 'static) -> Self {
        let config = LoadingConfig::default();
        Self {
            clock,
            device_probe: Box::new(probe),
            policy: RetryPolicy::session(&config),
            rng: StdRng::from_entropy(),
            state: LoadingState::idle(config.max_retries),
            config,
            tracker: None,
            pending_hooks: Vec::new(),
            bus: EventBus::new(),
            timers: TimerQueue::new(),
            minimum_elapsed: false,
            completion_pending: false,
            timeout_notified: false,
            last_progress_at: Duration::ZERO,
            initialized: false,
            disposed: false,
            events: ManagerEvents::default(),
        }
    }

    /// Merges the device profile with `overrides` and builds the tracker.
    /// A second call warns and changes nothing.
    pub fn initialize(&mut self, overrides: &LoadingConfigOverrides) -> Result<(), LoadingError> {
        let profile = self.device_probe.profile();
        log::debug!("Device profile: {profile:?}");
        self.initialize_with_config(LoadingConfig::for_device(profile, overrides))
    }

    /// Initializes with a fully built configuration, skipping device
    /// adaptation.
    pub fn initialize_with_config(&mut self, config: LoadingConfig) -> Result<(), LoadingError> {
        if self.disposed {
            return Err(LoadingError::Disposed);
        }
        if self.initialized {
            log::warn!("LoadingManager is already initialized");
            return Ok(());
        }

        let config = config.validated();
        self.policy = RetryPolicy::session(&config);
        self.rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut tracker = ProgressTracker::new(
            TrackerConfig::from_loading_config(&config),
            Arc::clone(&self.clock),
        );
        for hook in self.pending_hooks.drain(..) {
            tracker.add_boxed_hook(hook);
        }
        self.tracker = Some(tracker);
        self.state = LoadingState::idle(config.max_retries);
        log::info!(
            "LoadingManager initialized (min {:?}, max {:?}, stall {:?})",
            config.minimum_loading_time,
            config.maximum_loading_time,
            config.progress_stall_threshold
        );
        self.config = config;
        self.initialized = true;
        Ok(())
    }

    /// Registers a discovery hook run at the start of every session.
    pub fn add_discovery_hook(&mut self, hook: impl DiscoveryHook + 'static) {
        match self.tracker.as_mut() {
            Some(tracker) => tracker.add_hook(hook),
            None => self.pending_hooks.push(Box::new(hook)),
        }
    }

    fn ensure_ready(&self) -> Result<(), LoadingError> {
        if self.disposed {
            Err(LoadingError::Disposed)
        } else if !self.initialized {
            Err(LoadingError::NotInitialized)
        } else {
            Ok(())
        }
    }

    fn set_phase(&mut self, next: LoadingPhase) {
        let current = self.state.phase;
        if current == next {
            return;
        }
        if current.can_transition_to(next) {
            log::debug!("Loading phase: {current:?} → {next:?}");
            self.state.phase = next;
        } else {
            log::warn!("Invalid loading phase transition {current:?} → {next:?}");
        }
    }

    // --- Session control ---

    /// Starts a session: resets counters, arms the maximum timer, the
    /// minimum floor and the stall watchdog, and starts tracking.
    pub fn start_loading(&mut self) -> Result<(), LoadingError> {
        self.ensure_ready()?;
        if self.state.is_loading {
            log::warn!("Loading is already in progress");
            return Ok(());
        }

        let now = self.clock.now();
        self.timers.clear();
        let previous_phase = self.state.phase;
        self.state = LoadingState::idle(self.config.max_retries);
        self.state.phase = previous_phase;
        self.state.is_loading = true;
        self.state.start_time = Some(now);
        self.set_phase(LoadingPhase::Loading);
        self.minimum_elapsed = false;
        self.completion_pending = false;
        self.timeout_notified = false;
        self.last_progress_at = now;

        self.timers
            .schedule(now + self.config.maximum_loading_time, ManagerTimer::MaximumTime);
        self.timers
            .schedule(now + self.config.minimum_loading_time, ManagerTimer::MinimumTime);
        self.timers.schedule(
            now + self.config.progress_stall_threshold,
            ManagerTimer::StallWatchdog,
        );

        if let Some(tracker) = self.tracker.as_mut() {
            tracker.start_tracking();
        }
        log::info!("Loading started");
        Ok(())
    }

    /// Records a new progress value.
    ///
    /// Values are clamped to 0..=100. Decreases and changes under 0.1 are
    /// ignored, except the one that reaches 100. Reaching 100 completes the
    /// session once the minimum loading time has elapsed.
    pub fn update_progress(&mut self, progress: f64) {
        if !self.state.is_loading || progress.is_nan() {
            return;
        }
        let progress = progress.clamp(0.0, 100.0);
        let current = self.state.progress;
        if progress < current {
            log::trace!("Ignoring progress decrease {current:.1} → {progress:.1}");
            return;
        }
        let reaches_completion = progress >= 100.0 && current < 100.0;
        if progress - current < MIN_PROGRESS_DELTA && !reaches_completion {
            return;
        }

        self.state.progress = progress;
        self.last_progress_at = self.clock.now();
        if self.state.phase == LoadingPhase::Stalled {
            self.set_phase(LoadingPhase::Loading);
        }
        self.events.progress.emit(&progress);

        if progress >= 100.0 {
            if self.minimum_elapsed {
                self.finish_loading();
            } else {
                self.completion_pending = true;
            }
        }
    }

    /// Snaps progress to 100 and completes, waiting for the minimum loading
    /// time if it has not yet elapsed. Does nothing if no session is running.
    pub fn complete_loading(&mut self) {
        if !self.state.is_loading {
            return;
        }
        if self.state.progress >= 100.0 {
            if self.minimum_elapsed {
                self.finish_loading();
            } else {
                self.completion_pending = true;
            }
            return;
        }
        self.update_progress(100.0);
    }

    fn finish_loading(&mut self) {
        if !self.state.is_loading {
            return;
        }
        let now = self.clock.now();
        if self.state.progress < 100.0 {
            self.state.progress = 100.0;
            self.events.progress.emit(&100.0);
        }
        self.state.is_loading = false;
        self.state.end_time = Some(now);
        self.completion_pending = false;
        self.set_phase(LoadingPhase::Complete);
        self.timers.clear();

        let statistics = self.tracker.as_mut().map(|tracker| {
            tracker.stop_tracking();
            tracker.statistics()
        });
        let loading_time = now.saturating_sub(self.state.start_time.unwrap_or(now));
        log::info!(
            "Loading complete in {loading_time:?} ({} error(s), {} retr(ies), fallback: {})",
            self.state.error_count,
            self.state.retry_count,
            self.state.fallback_mode
        );

        let info = CompletionInfo {
            loading_time,
            progress: 100.0,
            error_count: self.state.error_count,
            retry_count: self.state.retry_count,
            fallback_mode: self.state.fallback_mode,
            fallback_reason: self.state.fallback_reason.clone(),
            failed_resources: self.state.failed_resources.clone(),
            critical_errors: self.state.critical_errors.clone(),
            statistics,
        };
        self.events.complete.emit(&info);
    }

    // --- Tracking pass-throughs ---

    /// Registers a resource with the tracker.
    pub fn track_resource(&mut self, url: &str, weight: f64, resource_type: ResourceType) {
        match self.tracker.as_mut() {
            Some(tracker) => {
                tracker.track_resource(url, weight, resource_type);
            }
            None => log::warn!("Cannot track '{url}': LoadingManager is not initialized"),
        }
    }

    /// Marks a resource as loaded and forwards the new progress.
    pub fn mark_resource_loaded(&mut self, url: &str) {
        let emitted = match self.tracker.as_mut() {
            Some(tracker) => tracker.mark_resource_loaded(url, false),
            None => {
                log::warn!("Cannot mark '{url}': LoadingManager is not initialized");
                None
            }
        };
        if let Some(progress) = emitted {
            self.update_progress(progress);
        }
    }

    /// Registers an animation system with the tracker.
    pub fn track_animation_system(&mut self, name: &str, weight: f64) {
        match self.tracker.as_mut() {
            Some(tracker) => {
                tracker.track_animation_system(name, weight);
            }
            None => log::warn!("Cannot track '{name}': LoadingManager is not initialized"),
        }
    }

    /// Marks an animation system as loaded and forwards the new progress.
    pub fn mark_animation_system_loaded(&mut self, name: &str) {
        let emitted = match self.tracker.as_mut() {
            Some(tracker) => tracker.mark_animation_system_loaded(name),
            None => {
                log::warn!("Cannot mark '{name}': LoadingManager is not initialized");
                None
            }
        };
        if let Some(progress) = emitted {
            self.update_progress(progress);
        }
    }

    /// A channel for collaborators on other threads. Commands are applied on
    /// the next [`tick`](Self::tick).
    pub fn tracking_sender(&self) -> flume::Sender<TrackingCommand> {
        self.bus.sender()
    }

    fn apply_command(&mut self, command: TrackingCommand) {
        match command {
            TrackingCommand::TrackResource {
                url,
                weight,
                resource_type,
            } => self.track_resource(&url, weight, resource_type),
            TrackingCommand::MarkResourceLoaded { url } => self.mark_resource_loaded(&url),
            TrackingCommand::TrackAnimationSystem { name, weight } => {
                self.track_animation_system(&name, weight)
            }
            TrackingCommand::MarkAnimationSystemLoaded { name } => {
                self.mark_animation_system_loaded(&name)
            }
            TrackingCommand::ReportError {
                failure,
                resource_url,
                is_critical,
            } => self.handle_error(failure, resource_url.as_deref(), is_critical),
        }
    }

    // --- Errors, timeouts and recovery ---

    /// Records a failure and applies the session policy: a critical failure
    /// with retries left starts recovery, more than the error threshold
    /// enters fallback, anything else lets loading continue.
    pub fn handle_error(
        &mut self,
        failure: ResourceFailure,
        resource_url: Option<&str>,
        is_critical: bool,
    ) {
        let now = self.clock.now();
        self.state.error_count += 1;
        self.state.has_error = true;
        self.state.error_message = Some(failure.to_string());
        if let Some(url) = resource_url {
            if !self.state.failed_resources.iter().any(|known| known == url) {
                self.state.failed_resources.push(url.to_owned());
            }
        }
        if is_critical {
            log::error!(
                "Critical loading error{}: {failure}",
                resource_url.map(|url| format!(" ({url})")).unwrap_or_default()
            );
            self.state.critical_errors.push(CriticalError {
                error: failure.clone(),
                resource_url: resource_url.map(str::to_owned),
                timestamp: now,
                retry_count: self.state.retry_count,
            });
        } else {
            log::warn!("Loading error: {failure}");
        }

        self.events.error.emit(&ErrorEvent {
            error: failure,
            resource_url: resource_url.map(str::to_owned),
            is_critical,
            error_count: self.state.error_count,
        });

        if !self.state.is_loading || self.state.fallback_mode {
            return;
        }
        self.set_phase(LoadingPhase::Erroring);
        if is_critical && self.policy.has_budget(self.state.retry_count) {
            self.attempt_recovery(RecoveryKind::ResourceError, "Critical resource failed");
        } else if self.state.error_count > self.config.error_fallback_threshold {
            let details = format!("{} errors during loading", self.state.error_count);
            self.enter_fallback_mode(FallbackTrigger::TooManyErrors, &details);
        } else {
            self.set_phase(LoadingPhase::Loading);
        }
    }

    /// Reacts to a timeout.
    ///
    /// The maximum loading time forces completion in fallback mode and
    /// notifies timeout subscribers once per session. Other reasons go
    /// through recovery.
    pub fn handle_timeout(&mut self, reason: TimeoutReason) {
        if !self.state.is_loading {
            return;
        }
        match reason {
            TimeoutReason::MaximumTimeExceeded => {
                log::warn!("Maximum loading time exceeded; forcing completion");
                if !self.state.fallback_mode {
                    self.set_phase(LoadingPhase::TimedOut);
                    self.enter_fallback_mode(
                        FallbackTrigger::MaximumTime,
                        "Maximum loading time exceeded",
                    );
                }
                self.finish_loading();
                self.notify_timeout(reason);
            }
            TimeoutReason::ProgressStall => self.handle_progress_stall(),
            TimeoutReason::Resource { ref url } => {
                log::warn!("Resource '{url}' timed out");
                if self.policy.has_budget(self.state.retry_count) {
                    let detail = reason.to_string();
                    self.attempt_recovery(RecoveryKind::Timeout, &detail);
                }
                self.notify_timeout(reason);
            }
        }
    }

    fn notify_timeout(&mut self, reason: TimeoutReason) {
        if reason == TimeoutReason::MaximumTimeExceeded {
            if self.timeout_notified {
                return;
            }
            self.timeout_notified = true;
        }
        let now = self.clock.now();
        let elapsed = now.saturating_sub(self.state.start_time.unwrap_or(now));
        self.events.timeout.emit(&TimeoutEvent { reason, elapsed });
    }

    /// Schedules a recovery attempt after the session backoff delay.
    ///
    /// Recoveries of different kinds run independently. A request for a kind
    /// that is already pending joins it without spending another retry.
    pub fn attempt_recovery(&mut self, kind: RecoveryKind, reason: &str) {
        if !self.state.is_loading || self.state.fallback_mode {
            return;
        }
        if self
            .timers
            .any(|timer| *timer == ManagerTimer::RecoveryBackoff(kind))
        {
            log::debug!("{kind:?} recovery already pending: {reason}");
            return;
        }
        self.state.retry_count += 1;
        let attempt = self.state.retry_count;
        let delay = self.policy.delay_for(attempt, &mut self.rng);
        self.set_phase(LoadingPhase::Recovering);
        log::info!("Recovery attempt {attempt} ({kind:?}) in {delay:?}: {reason}");

        self.timers
            .schedule(self.clock.now() + delay, ManagerTimer::RecoveryBackoff(kind));
        self.events.retry.emit(&RetryEvent {
            attempt,
            delay,
            kind,
            reason: reason.to_owned(),
        });
    }

    fn run_recovery(&mut self, kind: RecoveryKind) {
        if !self.state.is_loading {
            return;
        }
        match kind {
            RecoveryKind::Stall | RecoveryKind::Timeout => {
                let pushed = self.state.progress + self.config.stall_recovery_step;
                self.update_progress(pushed);
            }
            RecoveryKind::ResourceError => {
                let failed = self.state.failed_resources.clone();
                let emitted = self
                    .tracker
                    .as_mut()
                    .and_then(|tracker| tracker.force_resources(failed.iter().map(String::as_str)));
                if let Some(progress) = emitted {
                    self.update_progress(progress);
                }
            }
        }
        self.recalculate();
        if self.state.phase == LoadingPhase::Recovering {
            self.set_phase(LoadingPhase::Loading);
        }
    }

    fn recalculate(&mut self) {
        if !self.state.is_loading {
            return;
        }
        if let Some(progress) = self.tracker.as_mut().map(ProgressTracker::recalculate_progress) {
            self.update_progress(progress);
        }
    }

    /// Called when no progress was observed within the stall threshold:
    /// recovers while retries remain, otherwise enters fallback and pushes
    /// progress forward.
    pub fn handle_progress_stall(&mut self) {
        if !self.state.is_loading || self.state.fallback_mode {
            return;
        }
        log::warn!(
            "Loading progress stalled at {:.1}%",
            self.state.progress
        );
        self.set_phase(LoadingPhase::Stalled);
        if self.policy.has_budget(self.state.retry_count) {
            self.attempt_recovery(RecoveryKind::Stall, "Progress stalled");
        } else {
            self.enter_fallback_mode(
                FallbackTrigger::ProgressStall,
                "Progress stalled after all recovery attempts",
            );
            let pushed = self.state.progress + self.config.stall_fallback_push;
            self.update_progress(pushed);
        }
    }

    /// Switches the session to synthetic progress. The first call of a
    /// session wins; later calls do nothing.
    ///
    /// Shortens the maximum timer to the fallback window, force-completes
    /// every tracked unit and starts the synthetic progress ticker.
    pub fn enter_fallback_mode(&mut self, reason: FallbackTrigger, details: &str) {
        if self.state.fallback_mode {
            log::debug!("Already in fallback mode; ignoring {reason:?}");
            return;
        }
        if !self.state.is_loading {
            log::warn!("Cannot enter fallback mode: no loading session");
            return;
        }

        let now = self.clock.now();
        let fallback = FallbackReason {
            reason,
            details: details.to_owned(),
            timestamp: now,
        };
        log::warn!("Entering fallback mode ({reason:?}): {details}");
        self.state.fallback_mode = true;
        self.state.fallback_reason = Some(fallback.clone());
        self.set_phase(LoadingPhase::Fallback);

        self.timers
            .cancel_where(|timer| matches!(timer, ManagerTimer::MaximumTime | ManagerTimer::RecoveryBackoff(_)));
        self.timers
            .schedule(now + self.config.fallback_max_time, ManagerTimer::MaximumTime);
        self.events.fallback.emit(&fallback);

        let forced = self
            .tracker
            .as_mut()
            .and_then(ProgressTracker::enter_fallback_mode);
        if let Some(progress) = forced {
            self.update_progress(progress);
        }
        if self.state.is_loading && !self.timers.any(|t| *t == ManagerTimer::FallbackTick) {
            self.timers.schedule(
                now + self.config.fallback_tick_interval,
                ManagerTimer::FallbackTick,
            );
        }
    }

    // --- Event loop ---

    /// Runs one turn of the event loop: applies queued tracking commands,
    /// polls the tracker and fires every timer due now.
    pub fn tick(&mut self) {
        if !self.initialized {
            return;
        }
        for command in self.bus.drain() {
            self.apply_command(command);
        }

        let now = self.clock.now();
        let forced = self.tracker.as_mut().and_then(|tracker| tracker.poll(now));
        if let Some(progress) = forced {
            self.update_progress(progress);
        }

        while let Some((_, deadline, timer)) = self.timers.pop_due(now) {
            self.fire(timer, deadline);
        }
    }

    fn fire(&mut self, timer: ManagerTimer, deadline: Duration) {
        log::trace!("Timer {timer:?} fired at {deadline:?}");
        match timer {
            ManagerTimer::MaximumTime => self.handle_timeout(TimeoutReason::MaximumTimeExceeded),
            ManagerTimer::MinimumTime => {
                self.minimum_elapsed = true;
                if !self.state.is_loading {
                    return;
                }
                let nothing_tracked = self
                    .tracker
                    .as_ref()
                    .map_or(true, |tracker| tracker.registry().is_empty());
                if nothing_tracked {
                    self.recalculate();
                }
                if self.completion_pending || self.state.progress >= 100.0 {
                    self.finish_loading();
                }
            }
            ManagerTimer::StallWatchdog => {
                if !self.state.is_loading || self.state.progress >= 100.0 {
                    return;
                }
                let threshold = self.config.progress_stall_threshold;
                let recovering = self
                    .timers
                    .any(|timer| matches!(timer, ManagerTimer::RecoveryBackoff(_)));
                if !recovering && deadline.saturating_sub(self.last_progress_at) >= threshold {
                    self.handle_progress_stall();
                }
                if self.state.is_loading && self.state.progress < 100.0 {
                    self.timers
                        .schedule(deadline + threshold, ManagerTimer::StallWatchdog);
                }
            }
            ManagerTimer::RecoveryBackoff(kind) => self.run_recovery(kind),
            ManagerTimer::FallbackTick => {
                if !self.state.is_loading {
                    return;
                }
                let (low, high) = self.config.fallback_step;
                let step = self.rng.gen_range(low..=high);
                let next = (self.state.progress + step).min(100.0);
                self.update_progress(next);
                if self.state.progress >= 100.0 {
                    self.complete_loading();
                } else if self.state.is_loading {
                    self.timers.schedule(
                        deadline + self.config.fallback_tick_interval,
                        ManagerTimer::FallbackTick,
                    );
                }
            }
        }
    }

    /// Earliest moment at which [`tick`](Self::tick) has timer work to do.
    pub fn next_deadline(&self) -> Option<Duration> {
        let tracker = self.tracker.as_ref().and_then(ProgressTracker::next_deadline);
        match (self.timers.next_deadline(), tracker) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    // --- Observation ---

    /// Snapshot of the session.
    pub fn state(&self) -> LoadingState {
        let mut state = self.state.clone();
        state.breakdown = self.progress_breakdown();
        state
    }

    /// Current progress, 0 to 100.
    pub fn progress(&self) -> f64 {
        self.state.progress
    }

    /// `true` while a session is running.
    pub fn is_loading(&self) -> bool {
        self.state.is_loading
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> LoadingPhase {
        self.state.phase
    }

    /// `true` after a successful `initialize`.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// The active configuration.
    pub fn config(&self) -> &LoadingConfig {
        &self.config
    }

    /// Per-type counts from the tracker.
    pub fn progress_breakdown(&self) -> ProgressBreakdown {
        self.tracker
            .as_ref()
            .map(ProgressTracker::progress_breakdown)
            .unwrap_or_default()
    }

    /// Tracker diagnostics, if initialized.
    pub fn statistics(&self) -> Option<TrackerStatistics> {
        self.tracker.as_ref().map(ProgressTracker::statistics)
    }

    /// `true` if `url` is tracked and counted as loaded, including units
    /// completed by recovery or fallback.
    pub fn is_resource_loaded(&self, url: &str) -> bool {
        self.tracker
            .as_ref()
            .and_then(|tracker| tracker.registry().resource(url))
            .is_some_and(|unit| unit.loaded)
    }

    /// Read access to the tracker.
    pub fn tracker(&self) -> Option<&ProgressTracker> {
        self.tracker.as_ref()
    }

    /// Subscribes to progress changes.
    #[must_use = "dropping the Subscription immediately unsubscribes the callback"]
    pub fn on_progress_update(&self, callback: impl FnMut(&f64) + Send + 'static) -> Subscription {
        self.events.progress.subscribe(callback)
    }

    /// Subscribes to session completion.
    #[must_use = "dropping the Subscription immediately unsubscribes the callback"]
    pub fn on_loading_complete(
        &self,
        callback: impl FnMut(&CompletionInfo) + Send + 'static,
    ) -> Subscription {
        self.events.complete.subscribe(callback)
    }

    /// Subscribes to reported errors.
    #[must_use = "dropping the Subscription immediately unsubscribes the callback"]
    pub fn on_error(&self, callback: impl FnMut(&ErrorEvent) + Send + 'static) -> Subscription {
        self.events.error.subscribe(callback)
    }

    /// Subscribes to timeouts.
    #[must_use = "dropping the Subscription immediately unsubscribes the callback"]
    pub fn on_timeout(&self, callback: impl FnMut(&TimeoutEvent) + Send + 'static) -> Subscription {
        self.events.timeout.subscribe(callback)
    }

    /// Subscribes to recovery attempts.
    #[must_use = "dropping the Subscription immediately unsubscribes the callback"]
    pub fn on_retry(&self, callback: impl FnMut(&RetryEvent) + Send + 'static) -> Subscription {
        self.events.retry.subscribe(callback)
    }

    /// Subscribes to fallback activation.
    #[must_use = "dropping the Subscription immediately unsubscribes the callback"]
    pub fn on_fallback(
        &self,
        callback: impl FnMut(&FallbackReason) + Send + 'static,
    ) -> Subscription {
        self.events.fallback.subscribe(callback)
    }

    // --- Teardown ---

    /// Cancels every timer, discards tracked units and returns to `Idle`.
    /// Subscribers stay attached.
    pub fn reset(&mut self) {
        self.timers.clear();
        if let Some(tracker) = self.tracker.as_mut() {
            tracker.reset();
        }
        self.bus.drain();
        self.state = LoadingState::idle(self.config.max_retries);
        self.minimum_elapsed = false;
        self.completion_pending = false;
        self.timeout_notified = false;
        self.last_progress_at = Duration::ZERO;
        log::info!("LoadingManager reset");
    }

    /// Resets, detaches every subscriber and drops the tracker. The manager
    /// cannot be used afterwards.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.reset();
        self.events.clear();
        self.tracker = None;
        self.pending_hooks.clear();
        self.initialized = false;
        self.disposed = true;
        log::info!("LoadingManager disposed");
    }
}

impl std::fmt::Debug for LoadingManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadingManager")
            .field("phase", &self.state.phase)
            .field("progress", &self.state.progress)
            .field("initialized", &self.initialized)
            .field("pending_timers", &self.timers.len())
            .finish()
    }
}

impl Drop for LoadingManager {
    fn drop(&mut self) {
        self.dispose();
    }
}

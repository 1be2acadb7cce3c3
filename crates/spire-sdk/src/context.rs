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

//! The shared [`LoadingContext`] handle.

use spire_control::{
    CompletionInfo, ErrorEvent, FallbackReason, FallbackTrigger, LoadingManager, LoadingPhase,
    LoadingState, RecoveryKind, RetryEvent, TimeoutEvent, TimeoutReason,
};
use spire_core::clock::Clock;
use spire_core::config::{LoadingConfig, LoadingConfigOverrides};
use spire_core::error::{LoadingError, ResourceFailure};
use spire_core::event::{Subscription, TrackingCommand};
use spire_core::platform::DeviceProbe;
use spire_core::resource::ResourceType;
use spire_integration::AnimationSystemIntegration;
use spire_progress::{DiscoveryHook, TrackerStatistics};
use spire_recovery::{
    DegradationSink, ErrorHandler, ErrorStatistics, RecoveryDecision, RecoveryOutcome, RetryFn,
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A cloneable handle to one loading manager and its per-resource error
/// handler.
///
/// Error handler outcomes are routed into the manager on every
/// [`tick`](LoadingContext::tick): successful retries and degraded resources
/// count as loaded, failed retries raise the session error count and expired
/// resource timeouts go through session recovery.
///
/// Subscriber callbacks run while the manager is locked. A callback must not
/// call back into the context; send a [`TrackingCommand`] through
/// [`tracking_sender`](LoadingContext::tracking_sender) instead.
#[derive(Clone)]
pub struct LoadingContext {
    clock: Arc<dyn Clock>,
    manager: Arc<Mutex<LoadingManager>>,
    errors: Arc<Mutex<ErrorHandler>>,
}

impl LoadingContext {
    /// Creates and initializes a context for the default device profile.
    pub fn new(
        clock: Arc<dyn Clock>,
        overrides: &LoadingConfigOverrides,
    ) -> Result<Self, LoadingError> {
        let mut manager = LoadingManager::new(Arc::clone(&clock));
        manager.initialize(overrides)?;
        Ok(Self::from_manager(clock, manager))
    }

    /// Creates a context whose configuration adapts to `probe`.
    pub fn with_device_probe(
        clock: Arc<dyn Clock>,
        probe: impl DeviceProbe + 'static,
        overrides: &LoadingConfigOverrides,
    ) -> Result<Self, LoadingError> {
        let mut manager = LoadingManager::with_device_probe(Arc::clone(&clock), probe);
        manager.initialize(overrides)?;
        Ok(Self::from_manager(clock, manager))
    }

    /// Creates a context from a fully built configuration.
    pub fn with_config(clock: Arc<dyn Clock>, config: LoadingConfig) -> Result<Self, LoadingError> {
        let mut manager = LoadingManager::new(Arc::clone(&clock));
        manager.initialize_with_config(config)?;
        Ok(Self::from_manager(clock, manager))
    }

    fn from_manager(clock: Arc<dyn Clock>, manager: LoadingManager) -> Self {
        let errors = ErrorHandler::new(manager.config(), Arc::clone(&clock));
        Self {
            clock,
            manager: Arc::new(Mutex::new(manager)),
            errors: Arc::new(Mutex::new(errors)),
        }
    }

    /// Routes degradation plans to `sink`.
    pub fn with_degradation_sink(self, sink: impl DegradationSink + 'static) -> Self {
        lock(&self.errors).set_sink(sink);
        self
    }

    /// Runs `f` with exclusive access to the manager.
    pub fn with_manager<R>(&self, f: impl FnOnce(&mut LoadingManager) -> R) -> R {
        f(&mut lock(&self.manager))
    }

    /// Runs `f` with exclusive access to the error handler.
    pub fn with_error_handler<R>(&self, f: impl FnOnce(&mut ErrorHandler) -> R) -> R {
        f(&mut lock(&self.errors))
    }

    /// The clock driving this context.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    // --- Session state ---

    /// `true` while a session is running.
    pub fn is_loading(&self) -> bool {
        lock(&self.manager).is_loading()
    }

    /// Current progress, 0 to 100.
    pub fn progress(&self) -> f64 {
        lock(&self.manager).progress()
    }

    /// Whether any error was reported this session.
    pub fn has_error(&self) -> bool {
        lock(&self.manager).state().has_error
    }

    /// Message of the latest reported error.
    pub fn error_message(&self) -> Option<String> {
        lock(&self.manager).state().error_message
    }

    /// Snapshot of the session.
    pub fn state(&self) -> LoadingState {
        lock(&self.manager).state()
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> LoadingPhase {
        lock(&self.manager).phase()
    }

    /// The active configuration.
    pub fn config(&self) -> LoadingConfig {
        lock(&self.manager).config().clone()
    }

    /// Tracker diagnostics.
    pub fn statistics(&self) -> Option<TrackerStatistics> {
        lock(&self.manager).statistics()
    }

    // --- Session control ---

    /// Starts a session and forgets the failures of the previous one.
    ///
    /// While a session is running this warns and keeps every recorded
    /// failure and pending recovery.
    pub fn start_loading(&self) -> Result<(), LoadingError> {
        {
            let mut manager = lock(&self.manager);
            if manager.is_loading() {
                return manager.start_loading();
            }
            manager.start_loading()?;
        }
        lock(&self.errors).reset();
        Ok(())
    }

    /// Completes the session, honoring the minimum loading time.
    pub fn complete_loading(&self) {
        lock(&self.manager).complete_loading();
        self.sync_error_handler();
    }

    /// Returns the manager to `Idle` and clears every resource failure.
    pub fn reset_loading(&self) {
        lock(&self.manager).reset();
        lock(&self.errors).reset();
    }

    /// Switches the session to synthetic progress.
    pub fn enter_fallback_mode(&self, details: &str) {
        lock(&self.manager).enter_fallback_mode(FallbackTrigger::Manual, details);
        self.sync_error_handler();
    }

    /// Registers a discovery hook run at the start of every session.
    pub fn add_discovery_hook(&self, hook: impl DiscoveryHook + 'static) {
        lock(&self.manager).add_discovery_hook(hook);
    }

    // --- Tracking ---

    /// Registers a resource.
    pub fn track_resource(&self, url: &str, weight: f64, resource_type: ResourceType) {
        lock(&self.manager).track_resource(url, weight, resource_type);
    }

    /// Arms the configured per-type timeout for `url`. If the resource does
    /// not load in time it is degraded. Call it during a session; timers
    /// armed outside one are dropped on the next tick.
    pub fn watch_resource(&self, url: &str, resource_type: ResourceType) {
        let config = self.config();
        lock(&self.errors).setup_default_timeout(&config, url, resource_type);
    }

    /// Marks a resource as loaded and cancels any pending recovery for it.
    pub fn mark_resource_loaded(&self, url: &str) {
        lock(&self.manager).mark_resource_loaded(url);
        lock(&self.errors).mark_resolved(url);
        self.sync_error_handler();
    }

    /// Registers an animation system.
    pub fn track_animation_system(&self, name: &str, weight: f64) {
        lock(&self.manager).track_animation_system(name, weight);
    }

    /// Marks an animation system as ready.
    pub fn mark_animation_system_loaded(&self, name: &str) {
        lock(&self.manager).mark_animation_system_loaded(name);
    }

    /// A channel for collaborators that must not lock the context.
    pub fn tracking_sender(&self) -> flume::Sender<TrackingCommand> {
        lock(&self.manager).tracking_sender()
    }

    /// An integration front end for rendering subsystem probes.
    pub fn animation_integration(&self) -> AnimationSystemIntegration {
        AnimationSystemIntegration::new(self.tracking_sender())
    }

    // --- Errors ---

    /// Reports a resource failure to both the session and the resource
    /// error handler.
    ///
    /// With a `retry` function the handler retries with backoff; otherwise,
    /// or once retries run out, the resource is degraded and counted as
    /// loaded so it cannot block the session.
    pub fn report_resource_error(
        &self,
        url: &str,
        failure: ResourceFailure,
        resource_type: ResourceType,
        retry: Option<RetryFn>,
    ) -> RecoveryDecision {
        let decision = lock(&self.errors).handle_error(url, failure.clone(), resource_type, retry);
        {
            let mut manager = lock(&self.manager);
            manager.handle_error(failure, Some(url), resource_type == ResourceType::Critical);
            if let RecoveryDecision::Degraded(_) = decision {
                log::debug!("Counting degraded resource '{url}' as loaded");
                manager.mark_resource_loaded(url);
            }
        }
        self.sync_error_handler();
        decision
    }

    /// Schedules a session recovery that force-completes every failed
    /// resource. Returns how many resources it covers, or 0 if nothing
    /// failed or no retries remain.
    pub fn retry_failed_resources(&self) -> usize {
        let mut manager = lock(&self.manager);
        let state = manager.state();
        let failed = state.failed_resources.len();
        if !state.is_loading || failed == 0 {
            return 0;
        }
        if state.retry_count >= state.max_retries {
            log::warn!("No retries left for {failed} failed resource(s)");
            return 0;
        }
        manager.attempt_recovery(RecoveryKind::ResourceError, "Retrying failed resources");
        failed
    }

    /// Aggregate per-resource failure counts.
    pub fn error_statistics(&self) -> ErrorStatistics {
        lock(&self.errors).error_statistics()
    }

    // --- Event loop ---

    /// Runs one turn: ticks the manager, then fires the error handler's due
    /// timers and routes their outcomes into the session.
    ///
    /// Once the session is over no retry, timeout or degradation fires.
    pub fn tick(&self) {
        lock(&self.manager).tick();
        if !self.sync_error_handler() {
            return;
        }
        let outcomes = lock(&self.errors).poll(self.clock.now());
        for outcome in outcomes {
            self.apply_outcome(outcome);
        }
        self.sync_error_handler();
    }

    /// Brings the error handler in line with the session. Outside a session
    /// every pending handler timer is dropped; during one, resources the
    /// manager already counts as loaded are resolved. Returns `true` while a
    /// session is running.
    fn sync_error_handler(&self) -> bool {
        let pending = lock(&self.errors).pending_resources();
        let (loading, loaded) = {
            let manager = lock(&self.manager);
            let loaded: Vec<String> = pending
                .into_iter()
                .filter(|url| manager.is_resource_loaded(url))
                .collect();
            (manager.is_loading(), loaded)
        };

        let mut errors = lock(&self.errors);
        if !loading {
            let cancelled = errors.cancel_pending();
            if cancelled > 0 {
                log::debug!("Session over; cancelled {cancelled} pending resource timer(s)");
            }
            return false;
        }
        for url in loaded {
            log::debug!("'{url}' was completed by the session; resolving it");
            errors.mark_resolved(&url);
        }
        true
    }

    fn apply_outcome(&self, outcome: RecoveryOutcome) {
        match outcome {
            RecoveryOutcome::RetrySucceeded { url, .. } => {
                lock(&self.manager).mark_resource_loaded(&url);
            }
            RecoveryOutcome::RetryFailed { url, decision } => {
                let record = lock(&self.errors).record(&url).cloned();
                let mut manager = lock(&self.manager);
                if let Some(record) = record {
                    let critical = record.resource_type == ResourceType::Critical;
                    manager.handle_error(record.last_error, Some(&url), critical);
                }
                if let RecoveryDecision::Degraded(_) = decision {
                    manager.mark_resource_loaded(&url);
                }
            }
            RecoveryOutcome::TimedOut { url } => {
                lock(&self.manager).handle_timeout(TimeoutReason::Resource { url });
            }
            RecoveryOutcome::Degraded { url, .. } => {
                lock(&self.manager).mark_resource_loaded(&url);
            }
            RecoveryOutcome::DegradationSkipped { url } => {
                log::trace!("'{url}' resolved before degradation");
            }
        }
    }

    /// Earliest moment at which [`tick`](Self::tick) has work to do.
    pub fn next_deadline(&self) -> Option<Duration> {
        let manager = lock(&self.manager).next_deadline();
        let errors = lock(&self.errors).next_deadline();
        match (manager, errors) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    // --- Subscriptions ---

    /// Subscribes to progress changes.
    #[must_use = "dropping the Subscription immediately unsubscribes the callback"]
    pub fn on_progress_update(&self, callback: impl FnMut(&f64) + Send + 'static) -> Subscription {
        lock(&self.manager).on_progress_update(callback)
    }

    /// Subscribes to session completion.
    #[must_use = "dropping the Subscription immediately unsubscribes the callback"]
    pub fn on_loading_complete(
        &self,
        callback: impl FnMut(&CompletionInfo) + Send + 'static,
    ) -> Subscription {
        lock(&self.manager).on_loading_complete(callback)
    }

    /// Subscribes to reported errors.
    #[must_use = "dropping the Subscription immediately unsubscribes the callback"]
    pub fn on_error(&self, callback: impl FnMut(&ErrorEvent) + Send + 'static) -> Subscription {
        lock(&self.manager).on_error(callback)
    }

    /// Subscribes to timeouts.
    #[must_use = "dropping the Subscription immediately unsubscribes the callback"]
    pub fn on_timeout(&self, callback: impl FnMut(&TimeoutEvent) + Send + 'static) -> Subscription {
        lock(&self.manager).on_timeout(callback)
    }

    /// Subscribes to recovery attempts.
    #[must_use = "dropping the Subscription immediately unsubscribes the callback"]
    pub fn on_retry(&self, callback: impl FnMut(&RetryEvent) + Send + 'static) -> Subscription {
        lock(&self.manager).on_retry(callback)
    }

    /// Subscribes to fallback activation.
    #[must_use = "dropping the Subscription immediately unsubscribes the callback"]
    pub fn on_fallback(
        &self,
        callback: impl FnMut(&FallbackReason) + Send + 'static,
    ) -> Subscription {
        lock(&self.manager).on_fallback(callback)
    }
}

impl std::fmt::Debug for LoadingContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadingContext")
            .field("manager", &*lock(&self.manager))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spire_core::clock::ManualClock;

    fn context() -> (LoadingContext, ManualClock) {
        let clock = ManualClock::new();
        let config = LoadingConfig {
            rng_seed: Some(11),
            ..LoadingConfig::default()
        };
        let context = LoadingContext::with_config(Arc::new(clock.clone()), config).unwrap();
        (context, clock)
    }

    #[test]
    fn test_permanent_failure_is_degraded_and_counted_as_loaded() {
        let (context, _) = context();
        context.start_loading().unwrap();
        context.track_resource("/hero.png", 0.5, ResourceType::Images);
        context.track_resource("/logo.png", 0.5, ResourceType::Images);

        let decision = context.report_resource_error(
            "/hero.png",
            ResourceFailure::http(404, "Not Found"),
            ResourceType::Images,
            None,
        );

        assert!(matches!(decision, RecoveryDecision::Degraded(_)));
        assert!(context.has_error());
        assert_eq!(context.progress(), 50.0);
        assert_eq!(context.error_statistics().total_errors, 1);
    }

    #[test]
    fn test_successful_retry_marks_the_resource_loaded() {
        let (context, clock) = context();
        context.start_loading().unwrap();
        context.track_resource("/app.js", 1.0, ResourceType::Critical);

        let decision = context.report_resource_error(
            "/app.js",
            ResourceFailure::network("connection reset"),
            ResourceType::Critical,
            Some(Box::new(|| Ok::<(), ResourceFailure>(()))),
        );
        assert_eq!(
            decision,
            RecoveryDecision::RetryScheduled {
                attempt: 1,
                delay: Duration::from_millis(1000)
            }
        );

        clock.advance_ms(1000);
        context.tick();
        assert_eq!(context.progress(), 100.0);
        assert!(!context.is_loading());
    }

    #[test]
    fn test_resource_timeout_degrades_after_grace_period() {
        let (context, clock) = context();
        context.start_loading().unwrap();
        context.track_resource("/font.woff2", 1.0, ResourceType::Fonts);
        context.watch_resource("/font.woff2", ResourceType::Fonts);

        clock.advance_ms(3000);
        context.tick();
        assert_eq!(context.error_statistics().timeout_count, 1);
        assert!(context.is_loading());

        clock.advance_ms(2000);
        context.tick();
        assert!(context.error_statistics().fallback_triggered);
        assert_eq!(context.progress(), 100.0);
    }

    #[test]
    fn test_loaded_resource_cancels_its_timeout() {
        let (context, clock) = context();
        context.start_loading().unwrap();
        context.track_resource("/font.woff2", 1.0, ResourceType::Fonts);
        context.watch_resource("/font.woff2", ResourceType::Fonts);

        context.mark_resource_loaded("/font.woff2");
        clock.advance_ms(6000);
        context.tick();
        assert_eq!(context.error_statistics().timeout_count, 0);
    }

    #[test]
    fn test_retry_failed_resources_needs_failures() {
        let (context, _) = context();
        context.start_loading().unwrap();
        assert_eq!(context.retry_failed_resources(), 0);

        context.track_resource("/a.css", 1.0, ResourceType::Critical);
        context.with_manager(|manager| {
            manager.handle_error(ResourceFailure::network("reset"), Some("/a.css"), false)
        });
        assert_eq!(context.retry_failed_resources(), 1);
        assert_eq!(context.state().retry_count, 1);
    }

    #[test]
    fn test_reset_loading_clears_both_layers() {
        let (context, _) = context();
        context.start_loading().unwrap();
        context.report_resource_error(
            "/x.png",
            ResourceFailure::http(500, "boom"),
            ResourceType::Images,
            None,
        );
        context.reset_loading();

        assert!(!context.has_error());
        assert_eq!(context.phase(), LoadingPhase::Idle);
        assert_eq!(context.error_statistics(), ErrorStatistics::default());
    }
}

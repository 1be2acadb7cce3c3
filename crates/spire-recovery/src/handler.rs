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

//! The per-resource [`ErrorHandler`].

use crate::degradation::{DegradationAction, DegradationPlan, DegradationSink};
use serde::Serialize;
use spire_core::clock::Clock;
use spire_core::config::LoadingConfig;
use spire_core::error::ResourceFailure;
use spire_core::resource::ResourceType;
use spire_core::retry::RetryPolicy;
use spire_core::timer::TimerQueue;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

/// Re-attempts loading a resource.
pub type RetryFn = Box<dyn FnMut() -> Result<(), ResourceFailure> + Send>;

/// Caller-supplied replacement for the default degradation of a resource.
pub type FallbackFn = Box<dyn FnOnce() + Send>;

/// Failure history of one resource.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorRecord {
    /// Failures seen.
    pub count: u32,
    /// The most recent failure.
    #[serde(skip)]
    pub last_error: ResourceFailure,
    /// Retries scheduled so far.
    pub retry_count: u32,
    /// Category of the resource.
    pub resource_type: ResourceType,
    /// Clock time of the first failure.
    pub first_error_time: Duration,
    /// Clock time of the latest failure.
    pub last_error_time: Duration,
}

/// What [`ErrorHandler::handle_error`] decided.
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryDecision {
    /// A retry will run after `delay`.
    RetryScheduled {
        /// 1-based attempt number.
        attempt: u32,
        /// Wait before the attempt.
        delay: Duration,
    },
    /// The resource was given up on and degraded.
    Degraded(DegradationPlan),
}

/// Something that happened while [`ErrorHandler::poll`] fired timers.
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryOutcome {
    /// A retry attempt loaded the resource.
    RetrySucceeded {
        /// The resource.
        url: String,
        /// Attempt that succeeded.
        attempt: u32,
    },
    /// A retry attempt failed and the failure was handled again.
    RetryFailed {
        /// The resource.
        url: String,
        /// The follow-up decision.
        decision: RecoveryDecision,
    },
    /// A per-resource timeout expired; degradation is pending.
    TimedOut {
        /// The resource.
        url: String,
    },
    /// Graceful degradation ran. `plan` is `None` when a caller fallback ran
    /// instead of the default strategy.
    Degraded {
        /// The resource.
        url: String,
        /// The default plan, if used.
        plan: Option<DegradationPlan>,
    },
    /// The resource resolved before its degradation was due.
    DegradationSkipped {
        /// The resource.
        url: String,
    },
}

/// Aggregate view of recorded failures.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ErrorStatistics {
    /// Failures across all resources.
    pub total_errors: u32,
    /// Resources with at least one failure.
    pub failed_resources: usize,
    /// Retries scheduled across all resources.
    pub total_retries: u32,
    /// Per-resource timeouts that expired.
    pub timeout_count: u32,
    /// Whether graceful degradation has run at least once.
    pub fallback_triggered: bool,
    /// Failures grouped by resource type.
    pub errors_by_type: BTreeMap<ResourceType, u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum HandlerTimer {
    Retry(String),
    Timeout(String),
    Degrade(String),
}

impl HandlerTimer {
    fn url(&self) -> &str {
        match self {
            HandlerTimer::Retry(url) | HandlerTimer::Timeout(url) | HandlerTimer::Degrade(url) => {
                url
            }
        }
    }
}

/// Retries, times out and degrades individual resources.
///
/// Time only moves through [`poll`](ErrorHandler::poll): scheduled retries,
/// timeouts and degradations run there, in deadline order.
pub struct ErrorHandler {
    policy: RetryPolicy,
    degradation_delay: Duration,
    clock: Arc<dyn Clock>,
    records: HashMap<String, ErrorRecord>,
    timers: TimerQueue<HandlerTimer>,
    pending_retries: HashMap<String, (ResourceType, RetryFn)>,
    pending_fallbacks: HashMap<String, (ResourceType, Option<FallbackFn>)>,
    resolved: HashSet<String>,
    applied_stylesheets: HashSet<&'static str>,
    sink: Option<Box<dyn DegradationSink>>,
    timeout_count: u32,
    fallback_triggered: bool,
}

impl ErrorHandler {
    /// Creates a handler using the resource-level retry policy of `config`.
    pub fn new(config: &LoadingConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            policy: RetryPolicy::resource(config),
            degradation_delay: config.graceful_degradation_delay,
            clock,
            records: HashMap::new(),
            timers: TimerQueue::new(),
            pending_retries: HashMap::new(),
            pending_fallbacks: HashMap::new(),
            resolved: HashSet::new(),
            applied_stylesheets: HashSet::new(),
            sink: None,
            timeout_count: 0,
            fallback_triggered: false,
        }
    }

    /// Routes degradation plans to `sink`.
    pub fn with_sink(mut self, sink: impl DegradationSink + 'static) -> Self {
        self.set_sink(sink);
        self
    }

    /// Replaces the degradation sink.
    pub fn set_sink(&mut self, sink: impl DegradationSink + 'static) {
        self.sink = Some(Box::new(sink));
    }

    /// The policy this handler consults.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Records a failure and either schedules a retry or degrades the
    /// resource.
    ///
    /// Without a `retry` function the resource is degraded immediately.
    pub fn handle_error(
        &mut self,
        url: &str,
        failure: ResourceFailure,
        resource_type: ResourceType,
        retry: Option<RetryFn>,
    ) -> RecoveryDecision {
        let now = self.clock.now();
        log::warn!("Resource '{url}' failed: {failure}");
        self.resolved.remove(url);

        let record = self
            .records
            .entry(url.to_owned())
            .or_insert_with(|| ErrorRecord {
                count: 0,
                last_error: failure.clone(),
                retry_count: 0,
                resource_type,
                first_error_time: now,
                last_error_time: now,
            });
        record.count += 1;
        record.last_error = failure;
        record.last_error_time = now;

        match retry {
            Some(retry) if self.should_retry(url) => {
                let (attempt, delay) = self.schedule_retry(url, resource_type, retry);
                RecoveryDecision::RetryScheduled { attempt, delay }
            }
            _ => RecoveryDecision::Degraded(self.implement_fallback_strategy(url, resource_type)),
        }
    }

    /// Whether the recorded failure of `url` deserves another attempt.
    ///
    /// `false` for unknown resources, exhausted budgets, permanent failures
    /// (HTTP 4xx, syntax and type errors) and failures that started longer
    /// ago than the error window.
    pub fn should_retry(&self, url: &str) -> bool {
        let Some(record) = self.records.get(url) else {
            return false;
        };
        let since_first = self.clock.now().saturating_sub(record.first_error_time);
        self.policy
            .should_retry(&record.last_error, record.retry_count, since_first)
    }

    /// Schedules `retry` after the exponential delay for the next attempt.
    /// Returns the attempt number and the delay.
    pub fn schedule_retry(
        &mut self,
        url: &str,
        resource_type: ResourceType,
        retry: RetryFn,
    ) -> (u32, Duration) {
        let attempt = match self.records.get_mut(url) {
            Some(record) => {
                record.retry_count += 1;
                record.retry_count
            }
            None => 1,
        };
        let delay = self.policy.exponential_delay(attempt);
        log::info!("Retrying '{url}' (attempt {attempt}) in {delay:?}");

        let key = url.to_owned();
        self.timers
            .cancel_where(|timer| *timer == HandlerTimer::Retry(key.clone()));
        self.timers
            .schedule(self.clock.now() + delay, HandlerTimer::Retry(key.clone()));
        self.pending_retries.insert(key, (resource_type, retry));
        (attempt, delay)
    }

    /// Arms a timeout for `url`. If it expires before
    /// [`mark_resolved`](Self::mark_resolved), [`handle_timeout`](Self::handle_timeout)
    /// runs with the given fallback.
    pub fn setup_timeout(
        &mut self,
        url: &str,
        resource_type: ResourceType,
        timeout: Duration,
        fallback: Option<FallbackFn>,
    ) {
        let key = url.to_owned();
        self.timers
            .cancel_where(|timer| *timer == HandlerTimer::Timeout(key.clone()));
        self.timers
            .schedule(self.clock.now() + timeout, HandlerTimer::Timeout(key.clone()));
        self.pending_fallbacks.insert(key, (resource_type, fallback));
    }

    /// Arms a timeout using the configured default for `resource_type`.
    pub fn setup_default_timeout(
        &mut self,
        config: &LoadingConfig,
        url: &str,
        resource_type: ResourceType,
    ) {
        let timeout = config.resource_timeouts.for_type(resource_type);
        self.setup_timeout(url, resource_type, timeout, None);
    }

    /// Counts a timeout for `url` and starts graceful degradation.
    pub fn handle_timeout(
        &mut self,
        url: &str,
        resource_type: ResourceType,
        fallback: Option<FallbackFn>,
    ) {
        self.timeout_count += 1;
        log::warn!("Resource '{url}' timed out");
        self.trigger_graceful_degradation(url, resource_type, fallback);
    }

    /// Waits the configured grace period, then degrades `url` unless it
    /// resolved in the meantime.
    pub fn trigger_graceful_degradation(
        &mut self,
        url: &str,
        resource_type: ResourceType,
        fallback: Option<FallbackFn>,
    ) {
        let key = url.to_owned();
        self.timers.schedule(
            self.clock.now() + self.degradation_delay,
            HandlerTimer::Degrade(key.clone()),
        );
        self.pending_fallbacks.insert(key, (resource_type, fallback));
    }

    /// Builds the degradation plan for `url` and applies it to the sink.
    /// Stylesheets already injected for an earlier resource are left out.
    pub fn implement_fallback_strategy(
        &mut self,
        url: &str,
        resource_type: ResourceType,
    ) -> DegradationPlan {
        self.fallback_triggered = true;
        let mut plan = DegradationPlan::for_resource(url, resource_type);
        plan.actions.retain(|action| match action {
            DegradationAction::InjectStylesheet { id, .. } => self.applied_stylesheets.insert(*id),
            _ => true,
        });
        match resource_type {
            ResourceType::Critical => {
                log::error!("Critical resource '{url}' failed; continuing without it")
            }
            _ => log::info!("Degrading {resource_type} resource '{url}'"),
        }
        if let Some(sink) = self.sink.as_mut() {
            sink.apply(&plan);
        }
        plan
    }

    /// Records that `url` loaded. Cancels its pending retry, timeout and
    /// degradation. Returns `true` if anything was pending.
    pub fn mark_resolved(&mut self, url: &str) -> bool {
        self.resolved.insert(url.to_owned());
        let cancelled = self.timers.cancel_where(|timer| timer.url() == url);
        self.pending_retries.remove(url);
        self.pending_fallbacks.remove(url);
        cancelled > 0
    }

    /// Drops every pending retry, timeout and degradation while keeping the
    /// failure records. Returns how many timers were cancelled.
    pub fn cancel_pending(&mut self) -> usize {
        let cancelled = self.timers.len();
        self.timers.clear();
        self.pending_retries.clear();
        self.pending_fallbacks.clear();
        cancelled
    }

    /// Resources with a retry, timeout or degradation still pending, sorted.
    pub fn pending_resources(&self) -> Vec<String> {
        let mut urls: Vec<String> = self
            .pending_retries
            .keys()
            .chain(self.pending_fallbacks.keys())
            .cloned()
            .collect();
        urls.sort();
        urls.dedup();
        urls
    }

    /// Fires every timer due at `now`.
    pub fn poll(&mut self, now: Duration) -> Vec<RecoveryOutcome> {
        let mut outcomes = Vec::new();
        while let Some((_, _, timer)) = self.timers.pop_due(now) {
            match timer {
                HandlerTimer::Retry(url) => {
                    if let Some(outcome) = self.run_retry(url) {
                        outcomes.push(outcome);
                    }
                }
                HandlerTimer::Timeout(url) => {
                    let Some((resource_type, fallback)) = self.pending_fallbacks.remove(&url)
                    else {
                        continue;
                    };
                    self.handle_timeout(&url, resource_type, fallback);
                    outcomes.push(RecoveryOutcome::TimedOut { url });
                }
                HandlerTimer::Degrade(url) => {
                    let pending = self.pending_fallbacks.remove(&url);
                    if self.resolved.contains(&url) {
                        outcomes.push(RecoveryOutcome::DegradationSkipped { url });
                        continue;
                    }
                    let Some((resource_type, fallback)) = pending else {
                        continue;
                    };
                    self.fallback_triggered = true;
                    let plan = match fallback {
                        Some(fallback) => {
                            log::info!("Running caller fallback for '{url}'");
                            fallback();
                            None
                        }
                        None => Some(self.implement_fallback_strategy(&url, resource_type)),
                    };
                    outcomes.push(RecoveryOutcome::Degraded { url, plan });
                }
            }
        }
        outcomes
    }

    fn run_retry(&mut self, url: String) -> Option<RecoveryOutcome> {
        let (resource_type, mut retry) = self.pending_retries.remove(&url)?;
        let attempt = self.records.get(&url).map_or(1, |record| record.retry_count);
        match retry() {
            Ok(()) => {
                log::info!("Retry {attempt} of '{url}' succeeded");
                self.resolved.insert(url.clone());
                Some(RecoveryOutcome::RetrySucceeded { url, attempt })
            }
            Err(failure) => {
                let decision = self.handle_error(&url, failure, resource_type, Some(retry));
                Some(RecoveryOutcome::RetryFailed { url, decision })
            }
        }
    }

    /// The record for `url`, if it ever failed.
    pub fn record(&self, url: &str) -> Option<&ErrorRecord> {
        self.records.get(url)
    }

    /// Returns `true` once graceful degradation has run.
    pub fn fallback_triggered(&self) -> bool {
        self.fallback_triggered
    }

    /// Earliest pending timer.
    pub fn next_deadline(&self) -> Option<Duration> {
        self.timers.next_deadline()
    }

    /// Aggregate failure counts.
    pub fn error_statistics(&self) -> ErrorStatistics {
        let mut stats = ErrorStatistics {
            failed_resources: self.records.len(),
            timeout_count: self.timeout_count,
            fallback_triggered: self.fallback_triggered,
            ..ErrorStatistics::default()
        };
        for record in self.records.values() {
            stats.total_errors += record.count;
            stats.total_retries += record.retry_count;
            *stats.errors_by_type.entry(record.resource_type).or_default() += record.count;
        }
        stats
    }

    /// URLs of every resource that failed and has not resolved since.
    pub fn unresolved_resources(&self) -> Vec<String> {
        let mut urls: Vec<String> = self
            .records
            .keys()
            .filter(|url| !self.resolved.contains(*url))
            .cloned()
            .collect();
        urls.sort();
        urls
    }

    /// Forgets every record and pending timer and clears the fallback latch.
    pub fn reset(&mut self) {
        self.records.clear();
        self.timers.clear();
        self.pending_retries.clear();
        self.pending_fallbacks.clear();
        self.resolved.clear();
        self.applied_stylesheets.clear();
        self.timeout_count = 0;
        self.fallback_triggered = false;
    }
}

impl std::fmt::Debug for ErrorHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorHandler")
            .field("records", &self.records.len())
            .field("pending_timers", &self.timers.len())
            .field("timeout_count", &self.timeout_count)
            .field("fallback_triggered", &self.fallback_triggered)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spire_core::clock::ManualClock;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn handler() -> (ErrorHandler, ManualClock) {
        let clock = ManualClock::new();
        let handler = ErrorHandler::new(&LoadingConfig::default(), Arc::new(clock.clone()));
        (handler, clock)
    }

    fn failing_retry(calls: Arc<AtomicU32>) -> RetryFn {
        Box::new(move || {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ResourceFailure::network("still down"))
        })
    }

    #[test]
    fn http_404_is_never_retried() {
        let (mut handler, _) = handler();
        let decision = handler.handle_error(
            "/missing.png",
            ResourceFailure::http(404, "Not Found"),
            ResourceType::Images,
            Some(Box::new(|| Ok(()))),
        );
        assert!(matches!(decision, RecoveryDecision::Degraded(_)));
        assert!(!handler.should_retry("/missing.png"));
    }

    #[test]
    fn transient_failure_schedules_exponential_retries() {
        let (mut handler, clock) = handler();
        let calls = Arc::new(AtomicU32::new(0));

        let decision = handler.handle_error(
            "/app.js",
            ResourceFailure::network("reset"),
            ResourceType::Critical,
            Some(failing_retry(Arc::clone(&calls))),
        );
        assert_eq!(
            decision,
            RecoveryDecision::RetryScheduled {
                attempt: 1,
                delay: Duration::from_millis(1000)
            }
        );

        clock.advance_ms(1000);
        let outcomes = handler.poll(clock.now());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(
            &outcomes[0],
            RecoveryOutcome::RetryFailed {
                decision: RecoveryDecision::RetryScheduled { attempt: 2, delay },
                ..
            } if *delay == Duration::from_millis(2000)
        ));
    }

    #[test]
    fn retries_stop_when_budget_is_spent() {
        let (mut handler, clock) = handler();
        let calls = Arc::new(AtomicU32::new(0));
        handler.handle_error(
            "/app.js",
            ResourceFailure::network("reset"),
            ResourceType::Critical,
            Some(failing_retry(Arc::clone(&calls))),
        );

        // 1000 + 2000 + 4000 ms of backoff.
        for _ in 0..3 {
            let deadline = handler.next_deadline().unwrap();
            clock.set(deadline);
            handler.poll(clock.now());
        }

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(handler.record("/app.js").unwrap().retry_count, 3);
        assert_eq!(handler.next_deadline(), None);
    }

    #[test]
    fn successful_retry_resolves_resource() {
        let (mut handler, clock) = handler();
        handler.handle_error(
            "/font.woff2",
            ResourceFailure::timeout("slow"),
            ResourceType::Fonts,
            Some(Box::new(|| Ok(()))),
        );
        clock.advance_ms(1000);
        let outcomes = handler.poll(clock.now());
        assert_eq!(
            outcomes,
            vec![RecoveryOutcome::RetrySucceeded {
                url: "/font.woff2".into(),
                attempt: 1
            }]
        );
        assert!(handler.unresolved_resources().is_empty());
    }

    #[test]
    fn stylesheet_is_injected_once() {
        let (mut handler, _) = handler();
        let first = handler.implement_fallback_strategy("/a.woff2", ResourceType::Fonts);
        let second = handler.implement_fallback_strategy("/b.woff2", ResourceType::Fonts);
        assert_eq!(first.actions.len(), 1);
        assert!(second.is_empty());
    }

    #[test]
    fn timeout_degrades_after_grace_period() {
        let (mut handler, clock) = handler();
        handler.setup_timeout("/hero.webp", ResourceType::Images, Duration::from_millis(4000), None);

        clock.advance_ms(4000);
        assert_eq!(
            handler.poll(clock.now()),
            vec![RecoveryOutcome::TimedOut {
                url: "/hero.webp".into()
            }]
        );
        assert!(!handler.fallback_triggered());

        clock.advance_ms(2000);
        let outcomes = handler.poll(clock.now());
        assert!(matches!(
            &outcomes[0],
            RecoveryOutcome::Degraded { plan: Some(_), .. }
        ));
        assert!(handler.fallback_triggered());
        assert_eq!(handler.error_statistics().timeout_count, 1);
    }

    #[test]
    fn resolution_during_grace_period_skips_degradation() {
        let (mut handler, clock) = handler();
        let ran = Arc::new(AtomicU32::new(0));
        let fallback: FallbackFn = {
            let ran = Arc::clone(&ran);
            Box::new(move || {
                ran.fetch_add(1, Ordering::SeqCst);
            })
        };
        handler.handle_timeout("/engine.js", ResourceType::Animations, Some(fallback));
        clock.advance_ms(1500);
        handler.mark_resolved("/engine.js");
        clock.advance_ms(1000);

        assert!(handler.poll(clock.now()).is_empty());
        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert!(!handler.fallback_triggered());
    }

    #[test]
    fn immediate_degradation_latches_fallback() {
        let (mut handler, _) = handler();
        handler.handle_error(
            "/missing.woff2",
            ResourceFailure::http(404, "Not Found"),
            ResourceType::Fonts,
            None,
        );
        assert!(handler.error_statistics().fallback_triggered);
    }

    #[test]
    fn cancel_pending_keeps_records() {
        let (mut handler, clock) = handler();
        let calls = Arc::new(AtomicU32::new(0));
        handler.handle_error(
            "/app.js",
            ResourceFailure::network("reset"),
            ResourceType::Critical,
            Some(failing_retry(Arc::clone(&calls))),
        );
        handler.setup_timeout("/hero.webp", ResourceType::Images, Duration::from_millis(500), None);
        assert_eq!(
            handler.pending_resources(),
            vec!["/app.js".to_string(), "/hero.webp".to_string()]
        );

        assert_eq!(handler.cancel_pending(), 2);
        clock.advance_ms(10_000);
        assert!(handler.poll(clock.now()).is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(handler.pending_resources().is_empty());
        assert_eq!(handler.error_statistics().total_errors, 1);
    }

    #[test]
    fn statistics_group_errors_by_type() {
        let (mut handler, _) = handler();
        handler.handle_error("/a.png", ResourceFailure::http(500, "x"), ResourceType::Images, None);
        handler.handle_error("/a.png", ResourceFailure::http(500, "x"), ResourceType::Images, None);
        handler.handle_error("/b.js", ResourceFailure::network("x"), ResourceType::Critical, None);

        let stats = handler.error_statistics();
        assert_eq!(stats.total_errors, 3);
        assert_eq!(stats.failed_resources, 2);
        assert_eq!(stats.errors_by_type[&ResourceType::Images], 2);

        handler.reset();
        assert_eq!(handler.error_statistics(), ErrorStatistics::default());
    }
}

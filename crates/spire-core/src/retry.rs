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

//! The retry and backoff policy.
//!
//! Session-level recovery (the loading manager) and resource-level recovery
//! (the error handler) both consult a [`RetryPolicy`]. They differ only in the
//! parameters: the session policy is jittered and capped, the resource policy
//! is a plain exponential.

use crate::config::LoadingConfig;
use crate::error::ResourceFailure;
use rand::Rng;
use std::time::Duration;

/// Decides whether to retry and how long to wait before doing so.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Attempts allowed before giving up.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Growth factor applied per attempt.
    pub multiplier: f64,
    /// Random extra delay, as a fraction of the exponential delay.
    pub jitter: f64,
    /// Upper bound on any single delay.
    pub max_delay: Option<Duration>,
    /// Failures whose first occurrence is older than this are not retried.
    pub failure_window: Option<Duration>,
}

impl RetryPolicy {
    /// The jittered, capped policy used for session-level recovery.
    pub fn session(config: &LoadingConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: config.retry_delay,
            multiplier: 2.0,
            jitter: config.retry_jitter,
            max_delay: Some(config.max_retry_delay),
            failure_window: None,
        }
    }

    /// The deterministic policy used for per-resource retries.
    pub fn resource(config: &LoadingConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: config.retry_delay,
            multiplier: config.backoff_multiplier,
            jitter: 0.0,
            max_delay: None,
            failure_window: Some(config.error_timeout_threshold),
        }
    }

    /// Returns `true` while fewer than `max_retries` attempts were made.
    pub fn has_budget(&self, attempts: u32) -> bool {
        attempts < self.max_retries
    }

    /// Decides whether a failure is worth another attempt.
    ///
    /// `attempts` is the number of retries already made; `since_first_failure`
    /// is the time elapsed since the resource first failed.
    pub fn should_retry(
        &self,
        failure: &ResourceFailure,
        attempts: u32,
        since_first_failure: Duration,
    ) -> bool {
        if !self.has_budget(attempts) {
            return false;
        }
        if failure.is_permanent() {
            return false;
        }
        match self.failure_window {
            Some(window) => since_first_failure <= window,
            None => true,
        }
    }

    /// The un-jittered delay before attempt number `attempt` (1-based).
    pub fn exponential_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(30) as i32;
        let delay = self.base_delay.mul_f64(self.multiplier.powi(exponent));
        self.capped(delay)
    }

    /// The delay before attempt number `attempt` (1-based), with jitter drawn
    /// from `rng` and the cap applied last.
    pub fn delay_for<R: Rng>(&self, attempt: u32, rng: &mut R) -> Duration {
        let exponent = attempt.saturating_sub(1).min(30) as i32;
        let delay = self.base_delay.mul_f64(self.multiplier.powi(exponent));
        let extra = if self.jitter > 0.0 {
            delay.mul_f64(rng.gen_range(0.0..self.jitter))
        } else {
            Duration::ZERO
        };
        self.capped(delay + extra)
    }

    fn capped(&self, delay: Duration) -> Duration {
        match self.max_delay {
            Some(max) => delay.min(max),
            None => delay,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::resource(&LoadingConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn resource_policy_is_plain_exponential() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.exponential_delay(1), Duration::from_millis(1000));
        assert_eq!(policy.exponential_delay(2), Duration::from_millis(2000));
        assert_eq!(policy.exponential_delay(3), Duration::from_millis(4000));
    }

    #[test]
    fn session_policy_jitter_stays_within_thirty_percent() {
        let policy = RetryPolicy::session(&LoadingConfig::default());
        let mut rng = StdRng::seed_from_u64(7);
        for attempt in 1..=3 {
            let base = policy.exponential_delay(attempt);
            for _ in 0..50 {
                let delay = policy.delay_for(attempt, &mut rng);
                assert!(delay >= base);
                assert!(delay <= base.mul_f64(1.3));
            }
        }
    }

    #[test]
    fn session_policy_is_capped_at_ten_seconds() {
        let policy = RetryPolicy::session(&LoadingConfig::default());
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(policy.delay_for(10, &mut rng), Duration::from_millis(10_000));
    }

    #[test]
    fn client_errors_are_never_retried() {
        let policy = RetryPolicy::default();
        let failure = ResourceFailure::http(404, "missing");
        assert!(!policy.should_retry(&failure, 0, Duration::ZERO));
    }

    #[test]
    fn budget_exhaustion_stops_retries() {
        let policy = RetryPolicy::default();
        let failure = ResourceFailure::network("reset");
        assert!(policy.should_retry(&failure, 2, Duration::ZERO));
        assert!(!policy.should_retry(&failure, 3, Duration::ZERO));
    }

    #[test]
    fn stale_failures_are_not_retried() {
        let policy = RetryPolicy::default();
        let failure = ResourceFailure::network("reset");
        assert!(!policy.should_retry(&failure, 0, Duration::from_secs(11)));
    }
}

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

//! Payloads delivered to loading manager subscribers, and the session
//! snapshot.

use crate::phase::LoadingPhase;
use serde::Serialize;
use spire_core::error::ResourceFailure;
use spire_core::resource::ProgressBreakdown;
use spire_progress::TrackerStatistics;
use std::fmt;
use std::time::Duration;

/// Why the session timed out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeoutReason {
    /// The maximum loading time elapsed. Forces completion.
    MaximumTimeExceeded,
    /// No progress within the stall threshold.
    ProgressStall,
    /// One resource took too long.
    Resource {
        /// The resource.
        url: String,
    },
}

impl fmt::Display for TimeoutReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeoutReason::MaximumTimeExceeded => write!(f, "maximum loading time exceeded"),
            TimeoutReason::ProgressStall => write!(f, "progress stalled"),
            TimeoutReason::Resource { url } => write!(f, "resource '{url}' timed out"),
        }
    }
}

/// What a recovery attempt is trying to fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryKind {
    /// Progress stopped moving.
    Stall,
    /// A critical resource failed.
    ResourceError,
    /// A timeout other than the maximum loading time.
    Timeout,
}

/// What pushed the session into fallback mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackTrigger {
    /// The maximum loading time elapsed.
    MaximumTime,
    /// Stall recovery ran out of retries.
    ProgressStall,
    /// Too many errors in one session.
    TooManyErrors,
    /// Requested by the host.
    Manual,
}

/// Recorded when fallback mode is entered. Only the first reason of a
/// session is kept.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FallbackReason {
    /// Category of the trigger.
    pub reason: FallbackTrigger,
    /// Human-readable detail.
    pub details: String,
    /// Clock time at which fallback started.
    pub timestamp: Duration,
}

/// A failure of a critical resource, kept for completion diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct CriticalError {
    /// The failure.
    pub error: ResourceFailure,
    /// The resource, if known.
    pub resource_url: Option<String>,
    /// Clock time of the failure.
    pub timestamp: Duration,
    /// Session retry count when the failure was recorded.
    pub retry_count: u32,
}

/// Delivered to `on_error` subscribers.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorEvent {
    /// The failure.
    pub error: ResourceFailure,
    /// The resource, if known.
    pub resource_url: Option<String>,
    /// Whether the caller flagged the failure as critical.
    pub is_critical: bool,
    /// Session error count including this one.
    pub error_count: u32,
}

/// Delivered to `on_timeout` subscribers.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeoutEvent {
    /// Why.
    pub reason: TimeoutReason,
    /// Time since the session started.
    pub elapsed: Duration,
}

/// Delivered to `on_retry` subscribers.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryEvent {
    /// 1-based attempt number within the session.
    pub attempt: u32,
    /// Backoff before the recovery runs.
    pub delay: Duration,
    /// What is being recovered.
    pub kind: RecoveryKind,
    /// Human-readable detail.
    pub reason: String,
}

/// Delivered to `on_loading_complete` subscribers.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionInfo {
    /// Session duration.
    pub loading_time: Duration,
    /// Always 100.
    pub progress: f64,
    /// Errors reported during the session.
    pub error_count: u32,
    /// Recovery attempts made.
    pub retry_count: u32,
    /// Whether the session finished in fallback mode.
    pub fallback_mode: bool,
    /// Why fallback started, if it did.
    pub fallback_reason: Option<FallbackReason>,
    /// Resources that failed, in first-failure order.
    pub failed_resources: Vec<String>,
    /// Failures of critical resources.
    pub critical_errors: Vec<CriticalError>,
    /// Tracker diagnostics at completion.
    pub statistics: Option<TrackerStatistics>,
}

/// Snapshot of a loading session.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadingState {
    /// `true` between `start_loading` and completion.
    pub is_loading: bool,
    /// Current progress, 0 to 100.
    pub progress: f64,
    /// Whether any error was reported.
    pub has_error: bool,
    /// Message of the latest error.
    pub error_message: Option<String>,
    /// Clock time of `start_loading`.
    pub start_time: Option<Duration>,
    /// Clock time of completion.
    pub end_time: Option<Duration>,
    /// Errors reported.
    pub error_count: u32,
    /// Recovery attempts made.
    pub retry_count: u32,
    /// Recovery attempts allowed.
    pub max_retries: u32,
    /// Resources that failed, in first-failure order, without duplicates.
    pub failed_resources: Vec<String>,
    /// Failures of critical resources.
    pub critical_errors: Vec<CriticalError>,
    /// One-way latch, cleared by `reset` or a new session.
    pub fallback_mode: bool,
    /// Why fallback started.
    pub fallback_reason: Option<FallbackReason>,
    /// Lifecycle phase.
    pub phase: LoadingPhase,
    /// Per-type counts from the tracker.
    pub breakdown: ProgressBreakdown,
}

impl LoadingState {
    pub(crate) fn idle(max_retries: u32) -> Self {
        Self {
            is_loading: false,
            progress: 0.0,
            has_error: false,
            error_message: None,
            start_time: None,
            end_time: None,
            error_count: 0,
            retry_count: 0,
            max_retries,
            failed_resources: Vec::new(),
            critical_errors: Vec::new(),
            fallback_mode: false,
            fallback_reason: None,
            phase: LoadingPhase::Idle,
            breakdown: ProgressBreakdown::default(),
        }
    }
}

impl Default for LoadingState {
    fn default() -> Self {
        Self::idle(3)
    }
}

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

//! Narrow views over a [`LoadingContext`] for components that only need one
//! concern: rendering progress, reporting resources, surfacing errors, or
//! animating the splash screen out.

use crate::context::LoadingContext;
use serde::Serialize;
use spire_control::LoadingPhase;
use spire_core::error::ResourceFailure;
use spire_core::resource::ResourceType;
use spire_recovery::{ErrorStatistics, RecoveryDecision, RetryFn};
use std::time::Duration;

/// What a progress indicator needs to render.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LoadingProgress {
    /// 0 to 100.
    pub progress: f64,
    /// `true` while a session is running.
    pub is_loading: bool,
    /// Lifecycle phase.
    pub phase: LoadingPhase,
}

/// Reads the progress of `context` in one lock.
pub fn loading_progress(context: &LoadingContext) -> LoadingProgress {
    context.with_manager(|manager| LoadingProgress {
        progress: manager.progress(),
        is_loading: manager.is_loading(),
        phase: manager.phase(),
    })
}

/// Resource reporting for loaders.
#[derive(Debug, Clone)]
pub struct ResourceTracking {
    context: LoadingContext,
}

impl ResourceTracking {
    pub fn new(context: LoadingContext) -> Self {
        Self { context }
    }

    /// Registers `url` and arms its per-type timeout.
    pub fn track(&self, url: &str, weight: f64, resource_type: ResourceType) {
        self.context.track_resource(url, weight, resource_type);
        self.context.watch_resource(url, resource_type);
    }

    pub fn loaded(&self, url: &str) {
        self.context.mark_resource_loaded(url);
    }

    /// Reports a failure. See [`LoadingContext::report_resource_error`].
    pub fn failed(
        &self,
        url: &str,
        failure: ResourceFailure,
        resource_type: ResourceType,
        retry: Option<RetryFn>,
    ) -> RecoveryDecision {
        self.context
            .report_resource_error(url, failure, resource_type, retry)
    }

    pub fn track_system(&self, name: &str, weight: f64) {
        self.context.track_animation_system(name, weight);
    }

    pub fn system_ready(&self, name: &str) {
        self.context.mark_animation_system_loaded(name);
    }
}

/// Error surface for UI code.
#[derive(Debug, Clone)]
pub struct ErrorHandling {
    context: LoadingContext,
}

impl ErrorHandling {
    pub fn new(context: LoadingContext) -> Self {
        Self { context }
    }

    pub fn has_error(&self) -> bool {
        self.context.has_error()
    }

    pub fn error_message(&self) -> Option<String> {
        self.context.error_message()
    }

    pub fn statistics(&self) -> ErrorStatistics {
        self.context.error_statistics()
    }

    /// Resources that failed this session, in first-failure order.
    pub fn failed_resources(&self) -> Vec<String> {
        self.context.state().failed_resources
    }

    /// See [`LoadingContext::retry_failed_resources`].
    pub fn retry(&self) -> usize {
        self.context.retry_failed_resources()
    }

    pub fn give_up(&self, details: &str) {
        self.context.enter_fallback_mode(details);
    }
}

/// Where the splash screen is in its exit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "stage")]
pub enum TransitionStage {
    /// No session has run yet.
    Idle,
    /// Loading; show the splash screen.
    Loading {
        /// 0 to 100.
        progress: f64,
    },
    /// Loading finished; the splash screen is animating out.
    Exiting {
        /// Share of the exit animation done, 0 to 1.
        fraction: f64,
    },
    /// Show the content.
    Done,
}

/// Drives the splash screen exit animation from completion.
#[derive(Debug, Clone)]
pub struct LoadingTransition {
    context: LoadingContext,
    exit_duration: Duration,
}

impl LoadingTransition {
    /// Exit animation length used by [`new`](Self::new).
    pub const DEFAULT_EXIT: Duration = Duration::from_millis(500);

    pub fn new(context: LoadingContext) -> Self {
        Self::with_exit_duration(context, Self::DEFAULT_EXIT)
    }

    pub fn with_exit_duration(context: LoadingContext, exit_duration: Duration) -> Self {
        Self {
            context,
            exit_duration,
        }
    }

    /// The stage at the context clock's current time.
    pub fn stage(&self) -> TransitionStage {
        let state = self.context.state();
        if state.is_loading {
            return TransitionStage::Loading {
                progress: state.progress,
            };
        }
        let Some(end) = state.end_time else {
            return TransitionStage::Idle;
        };
        let since = self.context.clock().now().saturating_sub(end);
        if since >= self.exit_duration || self.exit_duration.is_zero() {
            TransitionStage::Done
        } else {
            TransitionStage::Exiting {
                fraction: since.as_secs_f64() / self.exit_duration.as_secs_f64(),
            }
        }
    }

    /// `true` once the exit animation finished.
    pub fn show_content(&self) -> bool {
        self.stage() == TransitionStage::Done
    }
}

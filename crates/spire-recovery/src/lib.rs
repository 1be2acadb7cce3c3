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

//! # Spire Recovery
//!
//! Resource-level failure handling. The [`ErrorHandler`] keeps one record per
//! failing resource, retries transient failures with exponential backoff,
//! watches per-resource timeouts, and, when a resource cannot be saved,
//! produces a [`DegradationPlan`] that keeps the page usable without it.

pub mod degradation;
pub mod handler;

pub use degradation::{
    DegradationAction, DegradationPlan, DegradationSink, IMAGE_PLACEHOLDER, REDUCED_MOTION_CSS,
    SYSTEM_FONT_CSS,
};
pub use handler::{
    ErrorHandler, ErrorRecord, ErrorStatistics, FallbackFn, RecoveryDecision, RecoveryOutcome,
    RetryFn,
};

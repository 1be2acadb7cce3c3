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

//! # Spire Control
//!
//! The session state machine. A [`LoadingManager`] owns one progress tracker,
//! enforces the minimum and maximum loading times, watches for stalls,
//! classifies errors, schedules recovery with backoff, and drives the session
//! to completion through fallback mode when nothing else works.

pub mod events;
pub mod manager;
pub mod phase;

pub use events::{
    CompletionInfo, CriticalError, ErrorEvent, FallbackReason, FallbackTrigger, LoadingState,
    RecoveryKind, RetryEvent, TimeoutEvent, TimeoutReason,
};
pub use manager::LoadingManager;
pub use phase::LoadingPhase;

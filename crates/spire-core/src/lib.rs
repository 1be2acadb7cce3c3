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

//! # Spire Core
//!
//! Foundational crate containing the types, timers, and interface contracts
//! shared by every layer of the loading orchestration: tracked units, the
//! configuration model, the clock and timer queue that stand in for an event
//! loop, the subscriber lists used for event emission, and the single retry
//! policy consulted by both session-level and resource-level recovery.

#![warn(missing_docs)]

pub mod clock;
pub mod config;
pub mod error;
pub mod event;
pub mod platform;
pub mod resource;
pub mod retry;
pub mod timer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{LoadingConfig, LoadingConfigOverrides, ResourceWeights};
pub use error::{ConfigError, FailureKind, LoadingError, ResourceFailure};
pub use event::{EventBus, Subscribers, Subscription, TrackingCommand};
pub use platform::{ConnectionQuality, DeviceProbe, DeviceProfile, StaticDeviceProbe};
pub use resource::{ProgressBreakdown, ResourceType, TrackedUnit, TypeProgress};
pub use retry::RetryPolicy;
pub use timer::{TimerId, TimerQueue};

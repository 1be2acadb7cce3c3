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

//! # Spire Progress
//!
//! Accumulates weighted units into a single 0–100 progress value.
//!
//! The [`ResourceRegistry`] holds every tracked resource and animation system
//! and computes the raw weighted ratio. The [`ProgressTracker`] owns the
//! registry, runs [`DiscoveryHook`]s when a session starts, force-completes
//! critical resources that outlive their deadline, and emits jump-limited
//! progress samples.

pub mod discovery;
pub mod registry;
pub mod smoothing;
pub mod tracker;

pub use discovery::{
    DiscoveredUnit, DiscoveryError, DiscoveryHook, DocumentReadyHook, FontFaceHook, PageManifest,
};
pub use registry::{MarkOutcome, ResourceRegistry};
pub use smoothing::ProgressSmoother;
pub use tracker::{ProgressSample, ProgressTracker, TrackerConfig, TrackerStatistics};

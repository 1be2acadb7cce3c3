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

//! Tracked units and their classification.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Classification of a tracked unit.
///
/// Drives both the per-type progress breakdown and the type-specific
/// degradation strategy applied when a unit fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    /// Documents, stylesheets, and scripts the page cannot render without.
    Critical,
    /// Animation engines, graphics contexts, and shader pipelines.
    Animations,
    /// Font faces.
    Fonts,
    /// Images.
    Images,
}

impl ResourceType {
    /// Every resource type, in breakdown order.
    pub const ALL: [ResourceType; 4] = [
        ResourceType::Critical,
        ResourceType::Animations,
        ResourceType::Fonts,
        ResourceType::Images,
    ];

    /// Returns the lowercase label used in logs and stylesheets.
    pub fn label(self) -> &'static str {
        match self {
            ResourceType::Critical => "critical",
            ResourceType::Animations => "animations",
            ResourceType::Fonts => "fonts",
            ResourceType::Images => "images",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A resource or animation system registered with a weight and a terminal
/// loaded flag.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedUnit {
    /// The unit's key: a URL for resources, a system name for animation systems.
    pub key: String,
    /// Contribution to the total progress, normalized against the running total.
    pub weight: f64,
    /// The unit's classification.
    pub resource_type: ResourceType,
    /// Set exactly once.
    pub loaded: bool,
    /// Time from the start of tracking to the moment the unit loaded.
    pub load_time: Option<Duration>,
    /// `true` when the unit was completed by a recovery or fallback path.
    pub force_loaded: bool,
    /// Clock time at which the unit was registered.
    pub tracked_at: Duration,
}

impl TrackedUnit {
    /// Creates a not-yet-loaded unit.
    pub fn new(
        key: impl Into<String>,
        weight: f64,
        resource_type: ResourceType,
        tracked_at: Duration,
    ) -> Self {
        Self {
            key: key.into(),
            weight,
            resource_type,
            loaded: false,
            load_time: None,
            force_loaded: false,
            tracked_at,
        }
    }
}

/// Loaded/total counts and percentage for one resource type.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct TypeProgress {
    /// Number of loaded units of this type.
    pub loaded: usize,
    /// Number of tracked units of this type.
    pub total: usize,
    /// `loaded / total * 100`, or 100 when nothing of this type is tracked.
    pub progress: f64,
}

impl TypeProgress {
    /// Builds the entry from raw counts. An empty category is vacuously complete.
    pub fn from_counts(loaded: usize, total: usize) -> Self {
        let progress = if total == 0 {
            100.0
        } else {
            loaded as f64 / total as f64 * 100.0
        };
        Self {
            loaded,
            total,
            progress,
        }
    }
}

/// Per-type progress.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProgressBreakdown {
    /// Critical resources.
    pub critical: TypeProgress,
    /// Animation systems and animation resources.
    pub animations: TypeProgress,
    /// Fonts.
    pub fonts: TypeProgress,
    /// Images.
    pub images: TypeProgress,
}

impl ProgressBreakdown {
    /// Returns the entry for `resource_type`.
    pub fn get(&self, resource_type: ResourceType) -> &TypeProgress {
        match resource_type {
            ResourceType::Critical => &self.critical,
            ResourceType::Animations => &self.animations,
            ResourceType::Fonts => &self.fonts,
            ResourceType::Images => &self.images,
        }
    }

    /// Returns a mutable entry for `resource_type`.
    pub fn get_mut(&mut self, resource_type: ResourceType) -> &mut TypeProgress {
        match resource_type {
            ResourceType::Critical => &mut self.critical,
            ResourceType::Animations => &mut self.animations,
            ResourceType::Fonts => &mut self.fonts,
            ResourceType::Images => &mut self.images,
        }
    }
}

impl Default for ProgressBreakdown {
    fn default() -> Self {
        let empty = TypeProgress::from_counts(0, 0);
        Self {
            critical: empty,
            animations: empty,
            fonts: empty,
            images: empty,
        }
    }
}

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

//! Configuration for a loading session.
//!
//! A [`LoadingConfig`] is always fully populated. It is produced by
//! [`LoadingConfig::for_device`], which layers, in order: the defaults, the
//! built-in mobile and low-end profiles (each followed by the caller's
//! profile-specific overrides), the reduced-motion and slow-connection
//! variants, and finally the caller's top-level [`LoadingConfigOverrides`].

use crate::error::ConfigError;
use crate::platform::DeviceProfile;
use crate::resource::ResourceType;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Default share of the progress bar for each resource type.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct ResourceWeights {
    /// Documents, stylesheets, scripts.
    pub critical: f64,
    /// Animation engines and graphics pipelines.
    pub animations: f64,
    /// Font faces.
    pub fonts: f64,
    /// Images.
    pub images: f64,
}

impl ResourceWeights {
    /// Returns the weight for `resource_type`.
    pub fn for_type(&self, resource_type: ResourceType) -> f64 {
        match resource_type {
            ResourceType::Critical => self.critical,
            ResourceType::Animations => self.animations,
            ResourceType::Fonts => self.fonts,
            ResourceType::Images => self.images,
        }
    }

    fn sanitized(self) -> Self {
        Self {
            critical: sanitize_weight(self.critical),
            animations: sanitize_weight(self.animations),
            fonts: sanitize_weight(self.fonts),
            images: sanitize_weight(self.images),
        }
    }
}

impl Default for ResourceWeights {
    fn default() -> Self {
        Self {
            critical: 0.4,
            animations: 0.3,
            fonts: 0.2,
            images: 0.1,
        }
    }
}

/// Clamps a weight to a finite, non-negative value.
pub fn sanitize_weight(weight: f64) -> f64 {
    if weight.is_finite() && weight > 0.0 {
        weight
    } else {
        0.0
    }
}

/// An animation system registered as a placeholder when tracking starts.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AnimationSystemSpec {
    /// The system's name, used as its tracking key.
    pub name: String,
    /// Its weight.
    pub weight: f64,
}

/// Per-type timeouts used by resource-level timeout detection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceTimeouts {
    /// Timeout for critical resources.
    pub critical: Duration,
    /// Timeout for animation systems.
    pub animations: Duration,
    /// Timeout for fonts.
    pub fonts: Duration,
    /// Timeout for images.
    pub images: Duration,
}

impl ResourceTimeouts {
    /// Returns the timeout for `resource_type`.
    pub fn for_type(&self, resource_type: ResourceType) -> Duration {
        match resource_type {
            ResourceType::Critical => self.critical,
            ResourceType::Animations => self.animations,
            ResourceType::Fonts => self.fonts,
            ResourceType::Images => self.images,
        }
    }
}

impl Default for ResourceTimeouts {
    fn default() -> Self {
        Self {
            critical: Duration::from_millis(5000),
            animations: Duration::from_millis(3000),
            fonts: Duration::from_millis(3000),
            images: Duration::from_millis(4000),
        }
    }
}

/// The complete, validated configuration of a loading session.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadingConfig {
    /// Floor below which the splash screen is never dismissed.
    pub minimum_loading_time: Duration,
    /// Hard deadline after which loading is forced to complete.
    pub maximum_loading_time: Duration,
    /// Intended cadence of the driving event loop.
    pub progress_update_interval: Duration,
    /// Window without progress after which the session counts as stalled.
    pub progress_stall_threshold: Duration,
    /// Default weights used by auto-discovered units.
    pub resource_weights: ResourceWeights,
    /// Retry ceiling shared by session-level and resource-level recovery.
    pub max_retries: u32,
    /// Base delay of the exponential backoff.
    pub retry_delay: Duration,
    /// Growth factor of the exponential backoff.
    pub backoff_multiplier: f64,
    /// Upper bound on a single session-level recovery delay.
    pub max_retry_delay: Duration,
    /// Session-level jitter, as a fraction of the un-jittered delay.
    pub retry_jitter: f64,
    /// Largest change allowed between two consecutive progress emissions.
    pub max_jump_per_update: f64,
    /// Fraction of `maximum_loading_time` after which unfinished critical
    /// resources are force-completed by the tracker.
    pub critical_timeout_ratio: f64,
    /// Number of session errors tolerated before fallback mode.
    pub error_fallback_threshold: u32,
    /// Deadline that replaces the maximum timer once fallback mode starts.
    pub fallback_max_time: Duration,
    /// Cadence of the synthetic progress ticker in fallback mode.
    pub fallback_tick_interval: Duration,
    /// Inclusive range of the synthetic increment per fallback tick.
    pub fallback_step: (f64, f64),
    /// Progress pushed by a stall recovery.
    pub stall_recovery_step: f64,
    /// Progress pushed when a stall exhausts its retries.
    pub stall_fallback_push: f64,
    /// Resource errors older than this are no longer retried.
    pub error_timeout_threshold: Duration,
    /// Last-chance window between a resource timeout and its fallback.
    pub graceful_degradation_delay: Duration,
    /// Default per-type resource timeouts.
    pub resource_timeouts: ResourceTimeouts,
    /// Placeholders tracked when tracking starts.
    pub animation_systems: Vec<AnimationSystemSpec>,
    /// Seed for jitter and synthetic progress. `None` draws from entropy.
    pub rng_seed: Option<u64>,
}

impl Default for LoadingConfig {
    fn default() -> Self {
        Self {
            minimum_loading_time: Duration::from_millis(800),
            maximum_loading_time: Duration::from_millis(8000),
            progress_update_interval: Duration::from_millis(16),
            progress_stall_threshold: Duration::from_millis(5000),
            resource_weights: ResourceWeights::default(),
            max_retries: 3,
            retry_delay: Duration::from_millis(1000),
            backoff_multiplier: 2.0,
            max_retry_delay: Duration::from_millis(10_000),
            retry_jitter: 0.3,
            max_jump_per_update: 10.0,
            critical_timeout_ratio: 0.8,
            error_fallback_threshold: 5,
            fallback_max_time: Duration::from_millis(2000),
            fallback_tick_interval: Duration::from_millis(200),
            fallback_step: (1.0, 4.0),
            stall_recovery_step: 5.0,
            stall_fallback_push: 20.0,
            error_timeout_threshold: Duration::from_millis(10_000),
            graceful_degradation_delay: Duration::from_millis(2000),
            resource_timeouts: ResourceTimeouts::default(),
            animation_systems: Vec::new(),
            rng_seed: None,
        }
    }
}

impl LoadingConfig {
    /// Builds the configuration for `profile`, then applies `overrides`.
    pub fn for_device(profile: DeviceProfile, overrides: &LoadingConfigOverrides) -> Self {
        let mut config = Self::default();

        if profile.is_mobile {
            config.minimum_loading_time = Duration::from_millis(600);
            config.maximum_loading_time = Duration::from_millis(10_000);
            config.resource_weights = ResourceWeights {
                critical: 0.5,
                animations: 0.2,
                fonts: 0.2,
                images: 0.1,
            };
            if let Some(mobile) = &overrides.mobile {
                mobile.apply_to(&mut config);
            }
        }

        if profile.is_low_end {
            config.maximum_loading_time = Duration::from_millis(12_000);
            config.progress_update_interval = Duration::from_millis(32);
            config.progress_stall_threshold = Duration::from_millis(7000);
            config.resource_weights = ResourceWeights {
                critical: 0.5,
                animations: 0.1,
                fonts: 0.25,
                images: 0.15,
            };
            if let Some(low_end) = &overrides.low_end {
                low_end.apply_to(&mut config);
            }
        }

        if profile.prefers_reduced_motion {
            config.minimum_loading_time = Duration::from_millis(400);
            config.resource_weights.animations = config.resource_weights.animations.min(0.1);
        }

        if profile.connection.is_slow() {
            config.maximum_loading_time = Duration::from_millis(15_000);
            config.progress_stall_threshold = Duration::from_millis(8000);
        }

        overrides.apply_to(&mut config);
        config.validated()
    }

    /// Clamps inconsistent values into a usable configuration.
    pub fn validated(mut self) -> Self {
        self.resource_weights = self.resource_weights.sanitized();

        if self.minimum_loading_time > self.maximum_loading_time {
            log::warn!(
                "minimum loading time {:?} exceeds maximum {:?}; clamping",
                self.minimum_loading_time,
                self.maximum_loading_time
            );
            self.minimum_loading_time = self.maximum_loading_time;
        }
        if !(self.max_jump_per_update.is_finite() && self.max_jump_per_update > 0.0) {
            log::warn!(
                "invalid max jump per update {}; using 10",
                self.max_jump_per_update
            );
            self.max_jump_per_update = 10.0;
        }
        if !(self.backoff_multiplier.is_finite() && self.backoff_multiplier >= 1.0) {
            self.backoff_multiplier = 2.0;
        }
        self.retry_jitter = clamp_ratio(self.retry_jitter);
        self.critical_timeout_ratio = clamp_ratio(self.critical_timeout_ratio);

        let (low, high) = self.fallback_step;
        let low = if low.is_finite() { low.max(0.1) } else { 1.0 };
        let high = if high.is_finite() { high.max(low) } else { low };
        self.fallback_step = (low, high);

        if self.progress_stall_threshold.is_zero() {
            self.progress_stall_threshold = Duration::from_millis(5000);
        }
        if self.fallback_tick_interval.is_zero() {
            self.fallback_tick_interval = Duration::from_millis(200);
        }
        for system in &mut self.animation_systems {
            system.weight = sanitize_weight(system.weight);
        }
        self
    }

    /// Deadline after which unfinished critical resources are force-completed.
    pub fn critical_resource_timeout(&self) -> Duration {
        self.maximum_loading_time
            .mul_f64(self.critical_timeout_ratio)
    }
}

fn clamp_ratio(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Overrides applied to a device profile (`mobile` / `lowEnd` blocks).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct ProfileOverrides {
    /// Minimum loading time in milliseconds.
    pub minimum_loading_time: Option<u64>,
    /// Maximum loading time in milliseconds.
    pub maximum_loading_time: Option<u64>,
    /// Update cadence in milliseconds.
    pub progress_update_interval: Option<u64>,
    /// Per-type weights.
    pub resource_weights: Option<ResourceWeights>,
}

impl ProfileOverrides {
    fn apply_to(&self, config: &mut LoadingConfig) {
        if let Some(ms) = self.minimum_loading_time {
            config.minimum_loading_time = Duration::from_millis(ms);
        }
        if let Some(ms) = self.maximum_loading_time {
            config.maximum_loading_time = Duration::from_millis(ms);
        }
        if let Some(ms) = self.progress_update_interval {
            config.progress_update_interval = Duration::from_millis(ms);
        }
        if let Some(weights) = self.resource_weights {
            config.resource_weights = weights;
        }
    }
}

/// Caller-supplied configuration. Every field is optional; durations are in
/// milliseconds and keys are camelCase.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoadingConfigOverrides {
    /// Minimum loading time.
    pub minimum_loading_time: Option<u64>,
    /// Maximum loading time.
    pub maximum_loading_time: Option<u64>,
    /// Update cadence.
    pub progress_update_interval: Option<u64>,
    /// Stall window.
    pub progress_stall_threshold: Option<u64>,
    /// Per-type weights.
    pub resource_weights: Option<ResourceWeights>,
    /// Retry ceiling.
    pub max_retries: Option<u32>,
    /// Base backoff delay.
    pub retry_delay: Option<u64>,
    /// Backoff growth factor.
    pub backoff_multiplier: Option<f64>,
    /// Largest change per emission.
    pub max_jump_per_update: Option<f64>,
    /// Last-chance window before a resource fallback.
    pub graceful_degradation_delay: Option<u64>,
    /// Animation system placeholders.
    pub animation_systems: Option<Vec<AnimationSystemSpec>>,
    /// RNG seed.
    pub rng_seed: Option<u64>,
    /// Overrides applied on mobile devices.
    pub mobile: Option<ProfileOverrides>,
    /// Overrides applied on low-end devices.
    pub low_end: Option<ProfileOverrides>,
}

impl LoadingConfigOverrides {
    /// Parses overrides from JSON text.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Reads overrides from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    fn apply_to(&self, config: &mut LoadingConfig) {
        if let Some(ms) = self.minimum_loading_time {
            config.minimum_loading_time = Duration::from_millis(ms);
        }
        if let Some(ms) = self.maximum_loading_time {
            config.maximum_loading_time = Duration::from_millis(ms);
        }
        if let Some(ms) = self.progress_update_interval {
            config.progress_update_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = self.progress_stall_threshold {
            config.progress_stall_threshold = Duration::from_millis(ms);
        }
        if let Some(weights) = self.resource_weights {
            config.resource_weights = weights;
        }
        if let Some(retries) = self.max_retries {
            config.max_retries = retries;
        }
        if let Some(ms) = self.retry_delay {
            config.retry_delay = Duration::from_millis(ms);
        }
        if let Some(multiplier) = self.backoff_multiplier {
            config.backoff_multiplier = multiplier;
        }
        if let Some(jump) = self.max_jump_per_update {
            config.max_jump_per_update = jump;
        }
        if let Some(ms) = self.graceful_degradation_delay {
            config.graceful_degradation_delay = Duration::from_millis(ms);
        }
        if let Some(systems) = &self.animation_systems {
            config.animation_systems = systems.clone();
        }
        if self.rng_seed.is_some() {
            config.rng_seed = self.rng_seed;
        }
    }
}

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

//! Provides abstractions over the capabilities of the host device.
//!
//! The loading configuration is derived from what the device can afford:
//! mobile and low-end devices get longer deadlines and lighter animation
//! accounting, users who prefer reduced motion get shorter floors, and slow
//! connections get the extended maximum loading time.

use serde::Deserialize;

/// Observed quality of the network connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionQuality {
    /// Broadband or fast cellular.
    #[default]
    Fast,
    /// 3G-class links.
    Moderate,
    /// 2G-class links or data-saver mode.
    Slow,
}

impl ConnectionQuality {
    /// Classifies a connection from its reported effective type
    /// (`"slow-2g"`, `"2g"`, `"3g"`, `"4g"`) and data-saver flag.
    pub fn from_effective_type(effective_type: &str, save_data: bool) -> Self {
        if save_data {
            return ConnectionQuality::Slow;
        }
        match effective_type {
            "slow-2g" | "2g" => ConnectionQuality::Slow,
            "3g" => ConnectionQuality::Moderate,
            _ => ConnectionQuality::Fast,
        }
    }

    /// Returns `true` for connections that warrant the extended deadline.
    pub fn is_slow(self) -> bool {
        matches!(self, ConnectionQuality::Slow)
    }
}

/// A snapshot of the device characteristics that shape the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct DeviceProfile {
    /// Small viewport or touch-first device.
    pub is_mobile: bool,
    /// Few CPU cores or little memory.
    pub is_low_end: bool,
    /// The user asked the platform to minimize motion.
    pub prefers_reduced_motion: bool,
    /// Network quality.
    pub connection: ConnectionQuality,
}

impl DeviceProfile {
    /// Classifies a device from raw hardware hints.
    ///
    /// A device is low-end when it reports at most 2 logical cores or at most
    /// 2 GiB of memory. Unknown values are treated as capable.
    pub fn from_hints(
        viewport_width: Option<u32>,
        logical_cores: Option<u32>,
        memory_gib: Option<f32>,
    ) -> Self {
        let is_mobile = viewport_width.is_some_and(|w| w < 768);
        let few_cores = logical_cores.is_some_and(|c| c <= 2);
        let little_memory = memory_gib.is_some_and(|m| m <= 2.0);
        Self {
            is_mobile,
            is_low_end: few_cores || little_memory,
            prefers_reduced_motion: false,
            connection: ConnectionQuality::Fast,
        }
    }
}

/// Trait for observing the capabilities of the host device.
pub trait DeviceProbe: Send + Sync {
    /// Returns the current device profile.
    fn profile(&self) -> DeviceProfile;
}

/// A [`DeviceProbe`] that always reports the same profile.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticDeviceProbe(pub DeviceProfile);

impl DeviceProbe for StaticDeviceProbe {
    fn profile(&self) -> DeviceProfile {
        self.0
    }
}

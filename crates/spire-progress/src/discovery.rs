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

//! Sources of units that are tracked automatically when a session starts.
//!
//! A hook inspects whatever the host knows about the page (a manifest of
//! stylesheets and scripts, the document state, registered font faces) and
//! returns the units it found. The tracker registers them with weights taken
//! from the configured per-type budget unless the hook supplies one.

use spire_core::resource::ResourceType;
use thiserror::Error;

/// A unit found by a [`DiscoveryHook`].
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveredUnit {
    /// Resource URL, or a synthetic key such as `"document"`.
    pub key: String,
    /// Category the unit is weighted under.
    pub resource_type: ResourceType,
    /// Explicit weight. `None` shares the category budget evenly with the
    /// other weightless units of the same type from the same hook.
    pub weight: Option<f64>,
}

impl DiscoveredUnit {
    /// A unit that takes its weight from the category budget.
    pub fn new(key: impl Into<String>, resource_type: ResourceType) -> Self {
        Self {
            key: key.into(),
            resource_type,
            weight: None,
        }
    }

    /// A unit with an explicit weight.
    pub fn weighted(key: impl Into<String>, resource_type: ResourceType, weight: f64) -> Self {
        Self {
            key: key.into(),
            resource_type,
            weight: Some(weight),
        }
    }
}

/// Why a hook produced nothing.
#[derive(Debug, Error, PartialEq)]
pub enum DiscoveryError {
    /// The host lacks the facility this hook inspects.
    #[error("discovery source '{0}' is unavailable")]
    Unavailable(&'static str),
    /// The source exists but could not be read.
    #[error("discovery source '{source_name}' failed: {message}")]
    Failed {
        /// Name of the hook.
        source_name: &'static str,
        /// What went wrong.
        message: String,
    },
}

/// Something that can list units to track at session start.
pub trait DiscoveryHook: Send {
    /// Short name used in log messages.
    fn name(&self) -> &'static str;

    /// Lists the units this hook knows about.
    fn discover(&mut self) -> Result<Vec<DiscoveredUnit>, DiscoveryError>;

    /// Releases any observation state. Called when tracking stops.
    fn disconnect(&mut self) {}
}

/// Static list of the stylesheets, scripts and critical images a page loads.
#[derive(Debug, Clone, Default)]
pub struct PageManifest {
    stylesheets: Vec<String>,
    scripts: Vec<String>,
    critical_images: Vec<String>,
}

impl PageManifest {
    /// Creates an empty manifest.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a stylesheet URL.
    pub fn stylesheet(mut self, url: impl Into<String>) -> Self {
        self.stylesheets.push(url.into());
        self
    }

    /// Adds a script URL.
    pub fn script(mut self, url: impl Into<String>) -> Self {
        self.scripts.push(url.into());
        self
    }

    /// Adds an image URL that blocks first paint.
    pub fn critical_image(mut self, url: impl Into<String>) -> Self {
        self.critical_images.push(url.into());
        self
    }
}

impl DiscoveryHook for PageManifest {
    fn name(&self) -> &'static str {
        "page-manifest"
    }

    fn discover(&mut self) -> Result<Vec<DiscoveredUnit>, DiscoveryError> {
        let blocking = self
            .stylesheets
            .iter()
            .chain(self.scripts.iter())
            .map(|url| DiscoveredUnit::new(url.clone(), ResourceType::Critical));
        let images = self
            .critical_images
            .iter()
            .map(|url| DiscoveredUnit::new(url.clone(), ResourceType::Images));
        Ok(blocking.chain(images).collect())
    }
}

/// Tracks the document itself as one critical unit.
#[derive(Debug, Clone)]
pub struct DocumentReadyHook {
    weight: f64,
}

impl DocumentReadyHook {
    /// Key under which the document unit is registered.
    pub const KEY: &'static str = "document";

    /// Creates the hook with the given weight.
    pub fn new(weight: f64) -> Self {
        Self { weight }
    }
}

impl Default for DocumentReadyHook {
    fn default() -> Self {
        Self::new(0.1)
    }
}

impl DiscoveryHook for DocumentReadyHook {
    fn name(&self) -> &'static str {
        "document-ready"
    }

    fn discover(&mut self) -> Result<Vec<DiscoveredUnit>, DiscoveryError> {
        Ok(vec![DiscoveredUnit::weighted(
            Self::KEY,
            ResourceType::Critical,
            self.weight,
        )])
    }
}

/// Tracks registered font faces.
///
/// `None` means the host has no font loading facility, in which case the
/// hook reports [`DiscoveryError::Unavailable`] and fonts go untracked.
#[derive(Debug, Clone, Default)]
pub struct FontFaceHook {
    faces: Option<Vec<String>>,
}

impl FontFaceHook {
    /// Creates a hook over the given face names.
    pub fn new(faces: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            faces: Some(faces.into_iter().map(Into::into).collect()),
        }
    }

    /// Creates a hook for a host without a font loading facility.
    pub fn unavailable() -> Self {
        Self { faces: None }
    }

    /// Key under which a face is tracked.
    pub fn key_for(face: &str) -> String {
        format!("font:{face}")
    }
}

impl DiscoveryHook for FontFaceHook {
    fn name(&self) -> &'static str {
        "font-faces"
    }

    fn discover(&mut self) -> Result<Vec<DiscoveredUnit>, DiscoveryError> {
        let faces = self
            .faces
            .as_ref()
            .ok_or(DiscoveryError::Unavailable("font-faces"))?;
        Ok(faces
            .iter()
            .map(|face| DiscoveredUnit::new(Self::key_for(face), ResourceType::Fonts))
            .collect())
    }
}

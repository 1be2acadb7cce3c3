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

//! What to do when a resource is given up on.

use serde::Serialize;
use spire_core::resource::ResourceType;

/// Stylesheet that collapses animation and transition durations.
pub const REDUCED_MOTION_CSS: &str = "*, *::before, *::after {\n  \
    animation-duration: 0.01ms !important;\n  \
    animation-iteration-count: 1 !important;\n  \
    transition-duration: 0.01ms !important;\n}\n";

/// Stylesheet that swaps web fonts for the system font stack.
pub const SYSTEM_FONT_CSS: &str = "body, button, input, textarea {\n  \
    font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif !important;\n}\n";

/// Neutral placeholder used in place of an image that failed.
pub const IMAGE_PLACEHOLDER: &str = "data:image/svg+xml;utf8,\
    <svg xmlns='http://www.w3.org/2000/svg' width='1' height='1'>\
    <rect width='1' height='1' fill='%23e5e7eb'/></svg>";

/// One step of a degradation plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum DegradationAction {
    /// Add a stylesheet. `id` is stable so hosts can dedupe it.
    InjectStylesheet {
        /// Stable identifier.
        id: &'static str,
        /// Stylesheet source.
        css: &'static str,
    },
    /// Replace every use of `url` with `placeholder`.
    ReplaceImage {
        /// The failed image.
        url: String,
        /// Replacement source.
        placeholder: &'static str,
    },
    /// Nothing to substitute; carry on without the resource.
    Continue,
}

/// The actions chosen for one failed resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DegradationPlan {
    /// The resource being degraded.
    pub resource_url: String,
    /// Its category.
    pub resource_type: ResourceType,
    /// Steps, in application order. May be empty when a stylesheet was
    /// already injected for an earlier resource.
    pub actions: Vec<DegradationAction>,
}

impl DegradationPlan {
    pub(crate) fn for_resource(url: &str, resource_type: ResourceType) -> Self {
        let actions = match resource_type {
            ResourceType::Animations => vec![DegradationAction::InjectStylesheet {
                id: "spire-reduced-motion",
                css: REDUCED_MOTION_CSS,
            }],
            ResourceType::Fonts => vec![DegradationAction::InjectStylesheet {
                id: "spire-system-fonts",
                css: SYSTEM_FONT_CSS,
            }],
            ResourceType::Images => vec![DegradationAction::ReplaceImage {
                url: url.to_owned(),
                placeholder: IMAGE_PLACEHOLDER,
            }],
            ResourceType::Critical => vec![DegradationAction::Continue],
        };
        Self {
            resource_url: url.to_owned(),
            resource_type,
            actions,
        }
    }

    /// Returns `true` if the plan does nothing.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Applies degradation plans to the host.
pub trait DegradationSink: Send {
    /// Adds a stylesheet to the page.
    fn inject_stylesheet(&mut self, id: &str, css: &str);

    /// Points every use of `url` at `placeholder`.
    fn replace_image(&mut self, url: &str, placeholder: &str);

    /// Applies every action of `plan`, in order.
    fn apply(&mut self, plan: &DegradationPlan) {
        for action in &plan.actions {
            match action {
                DegradationAction::InjectStylesheet { id, css } => self.inject_stylesheet(id, css),
                DegradationAction::ReplaceImage { url, placeholder } => {
                    self.replace_image(url, placeholder)
                }
                DegradationAction::Continue => {}
            }
        }
    }
}

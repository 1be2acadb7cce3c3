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

use crate::error::ResourceFailure;
use crate::resource::ResourceType;

/// A tracking request sent by a collaborator that does not hold the manager.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackingCommand {
    /// Register a resource.
    TrackResource {
        /// The resource URL.
        url: String,
        /// Its weight.
        weight: f64,
        /// Its classification.
        resource_type: ResourceType,
    },
    /// Report a resource as loaded.
    MarkResourceLoaded {
        /// The resource URL.
        url: String,
    },
    /// Register an animation system.
    TrackAnimationSystem {
        /// The system's name.
        name: String,
        /// Its weight.
        weight: f64,
    },
    /// Report an animation system as ready.
    MarkAnimationSystemLoaded {
        /// The system's name.
        name: String,
    },
    /// Report a failure.
    ReportError {
        /// What went wrong.
        failure: ResourceFailure,
        /// The failing resource, if known.
        resource_url: Option<String>,
        /// Whether the failure affects a critical resource.
        is_critical: bool,
    },
}

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

//! # Spire Integration
//!
//! Readiness reporting for rendering subsystems that do not hold the loading
//! manager. An [`AnimationSystemIntegration`] forwards registrations and
//! "ready" notifications over the manager's tracking channel; the probes wrap
//! the usual places where a subsystem becomes usable (a drawing context is
//! created, shaders finish compiling, an engine initializer returns).
//!
//! This layer is best-effort. Hosts that can call the tracking API directly
//! should do so.

pub mod integration;
pub mod probes;

pub use integration::{AnimationSystemIntegration, IntegrationError};
pub use probes::{CanvasProbe, ContextKind, EngineProbe, ShaderPipelineProbe};

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

//! Instrumentation points for common rendering subsystems.
//!
//! Each probe registers its system when created and reports it ready when
//! the host calls the matching hook.

use crate::integration::AnimationSystemIntegration;
use spire_core::clock::Clock;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

fn register(integration: &AnimationSystemIntegration, name: &str, weight: f64) {
    if let Err(e) = integration.register_system(name, weight) {
        log::warn!("Probe registration failed: {e}");
    }
}

/// The kind of drawing context a canvas produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextKind {
    /// Immediate-mode 2D.
    TwoD,
    /// WebGL 1.
    WebGl,
    /// WebGL 2.
    WebGl2,
    /// WebGPU.
    WebGpu,
}

impl fmt::Display for ContextKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ContextKind::TwoD => "2d",
            ContextKind::WebGl => "webgl",
            ContextKind::WebGl2 => "webgl2",
            ContextKind::WebGpu => "webgpu",
        };
        f.write_str(label)
    }
}

/// Reports a canvas-backed system ready on its first context creation.
#[derive(Debug, Clone)]
pub struct CanvasProbe {
    integration: AnimationSystemIntegration,
    name: String,
}

impl CanvasProbe {
    /// Registers `name` with `weight`.
    pub fn new(integration: AnimationSystemIntegration, name: &str, weight: f64) -> Self {
        register(&integration, name, weight);
        Self {
            integration,
            name: name.to_owned(),
        }
    }

    /// Call when the host obtained a drawing context. Failed context
    /// creation should not call this.
    pub fn context_created(&self, kind: ContextKind) {
        log::trace!("Canvas '{}' created a {kind} context", self.name);
        self.integration.notify_system_loaded(&self.name);
    }

    /// The system name this probe reports.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Reports a shader pipeline ready once enough programs have compiled, or
/// once compilation has been quiet for the settle window.
///
/// The settle window is a heuristic for pipelines whose program count is not
/// known in advance.
#[derive(Debug)]
pub struct ShaderPipelineProbe {
    integration: AnimationSystemIntegration,
    clock: Arc<dyn Clock>,
    name: String,
    expected_programs: usize,
    settle: Duration,
    compiled: usize,
    last_activity: Option<Duration>,
}

impl ShaderPipelineProbe {
    /// Registers `name` with `weight`. `expected_programs` of zero relies on
    /// the settle window alone.
    pub fn new(
        integration: AnimationSystemIntegration,
        clock: Arc<dyn Clock>,
        name: &str,
        weight: f64,
        expected_programs: usize,
        settle: Duration,
    ) -> Self {
        register(&integration, name, weight);
        Self {
            integration,
            clock,
            name: name.to_owned(),
            expected_programs,
            settle,
            compiled: 0,
            last_activity: None,
        }
    }

    /// Call after each successful program compilation.
    pub fn program_compiled(&mut self) {
        self.compiled += 1;
        self.last_activity = Some(self.clock.now());
        if self.expected_programs > 0 && self.compiled >= self.expected_programs {
            self.integration.notify_system_loaded(&self.name);
        }
    }

    /// Reports the pipeline ready if at least one program compiled and
    /// nothing compiled for the settle window. Returns `true` once ready.
    pub fn poll(&mut self, now: Duration) -> bool {
        if self.is_ready() {
            return true;
        }
        match self.last_activity {
            Some(at) if now.saturating_sub(at) >= self.settle => {
                log::debug!(
                    "Shader pipeline '{}' settled after {} program(s)",
                    self.name,
                    self.compiled
                );
                self.integration.notify_system_loaded(&self.name)
                    || self.integration.is_notified(&self.name)
            }
            _ => false,
        }
    }

    /// Programs compiled so far.
    pub fn compiled(&self) -> usize {
        self.compiled
    }

    /// Whether the pipeline was reported ready.
    pub fn is_ready(&self) -> bool {
        self.integration.is_notified(&self.name)
    }
}

/// Wraps an engine initializer and reports the engine ready when it returns
/// successfully.
#[derive(Debug, Clone)]
pub struct EngineProbe {
    integration: AnimationSystemIntegration,
    name: String,
}

impl EngineProbe {
    /// Registers `name` with `weight`.
    pub fn new(integration: AnimationSystemIntegration, name: &str, weight: f64) -> Self {
        register(&integration, name, weight);
        Self {
            integration,
            name: name.to_owned(),
        }
    }

    /// Runs `init`. On success the engine is reported ready; a failure is
    /// logged and returned untouched, leaving the session timers to recover.
    pub fn initialize<T, E: fmt::Display>(
        &self,
        init: impl FnOnce() -> Result<T, E>,
    ) -> Result<T, E> {
        match init() {
            Ok(engine) => {
                self.integration.notify_system_loaded(&self.name);
                Ok(engine)
            }
            Err(e) => {
                log::warn!("Engine '{}' failed to initialize: {e}", self.name);
                Err(e)
            }
        }
    }
}

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

//! The public-facing SDK for Spire.
//!
//! A [`LoadingContext`] is the handle an application shares between its
//! splash screen, its resource loaders and its rendering subsystems. It
//! bundles a loading manager with a per-resource error handler and routes
//! the handler's outcomes back into the session. The [`hooks`] module offers
//! narrower views for components that only need one concern, and
//! [`LoadingService`] drives a context from a background thread.

pub mod context;
#[cfg(feature = "tokio")]
pub mod driver;
pub mod hooks;
pub mod logging;
pub mod service;

pub use context::LoadingContext;
pub use hooks::{
    loading_progress, ErrorHandling, LoadingProgress, LoadingTransition, ResourceTracking,
    TransitionStage,
};
pub use service::{LoadingService, ServiceConfig};

pub mod prelude {
    //! Everything an application usually needs.
    pub use crate::{
        loading_progress, ErrorHandling, LoadingContext, LoadingService, LoadingTransition,
        ResourceTracking, ServiceConfig, TransitionStage,
    };
    pub use spire_control::{
        CompletionInfo, FallbackTrigger, LoadingPhase, LoadingState, TimeoutReason,
    };
    pub use spire_core::{
        Clock, LoadingConfig, LoadingConfigOverrides, ResourceFailure, ResourceType, Subscription,
        SystemClock, TrackingCommand,
    };
    pub use spire_integration::{
        AnimationSystemIntegration, CanvasProbe, ContextKind, EngineProbe, ShaderPipelineProbe,
    };
    pub use spire_recovery::{DegradationPlan, DegradationSink, ErrorStatistics, RetryFn};
}

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

//! Provides foundational primitives for event-driven communication.
//!
//! Two shapes are offered:
//!
//! - [`EventBus`], a generic, thread-safe MPSC channel. Collaborators that run
//!   outside the loading manager's event loop (worker threads, instrumentation
//!   probes) send [`TrackingCommand`]s through it, and the manager drains them
//!   on its next tick.
//! - [`Subscribers`], a synchronous observer list. Every subscription returns a
//!   [`Subscription`] disposer that detaches the callback when dropped.

mod bus;
mod command;
mod subscribers;

pub use self::bus::EventBus;
pub use self::command::TrackingCommand;
pub use self::subscribers::{Subscribers, Subscription};

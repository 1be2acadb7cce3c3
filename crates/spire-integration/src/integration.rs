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

//! The notification front end shared by every probe.

use spire_core::event::TrackingCommand;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

/// Failure to reach the loading manager.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IntegrationError {
    /// The manager owning the receiving end was dropped.
    #[error("loading manager is gone; '{0}' was not delivered")]
    Disconnected(String),
}

/// Forwards animation system readiness to a loading manager.
///
/// Clones share the set of already-notified systems, so a system reported
/// through one probe is not reported again through another.
#[derive(Debug, Clone)]
pub struct AnimationSystemIntegration {
    sender: flume::Sender<TrackingCommand>,
    notified: Arc<Mutex<HashSet<String>>>,
}

impl AnimationSystemIntegration {
    /// Creates an integration feeding `sender`, usually obtained from
    /// `LoadingManager::tracking_sender`.
    pub fn new(sender: flume::Sender<TrackingCommand>) -> Self {
        Self {
            sender,
            notified: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    fn notified(&self) -> MutexGuard<'_, HashSet<String>> {
        self.notified.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn forward(&self, command: TrackingCommand, name: &str) -> Result<(), IntegrationError> {
        self.sender
            .send(command)
            .map_err(|_| IntegrationError::Disconnected(name.to_owned()))
    }

    /// Registers `name` as an animation system with the given weight.
    pub fn register_system(&self, name: &str, weight: f64) -> Result<(), IntegrationError> {
        log::debug!("Registering animation system '{name}' (weight {weight})");
        self.forward(
            TrackingCommand::TrackAnimationSystem {
                name: name.to_owned(),
                weight,
            },
            name,
        )
    }

    /// Reports `name` as ready.
    ///
    /// Only the first call per name is forwarded. Delivery failures are
    /// logged and never propagated. Returns `true` if this call was the
    /// first for `name`.
    pub fn notify_system_loaded(&self, name: &str) -> bool {
        if !self.notified().insert(name.to_owned()) {
            log::trace!("Animation system '{name}' already reported");
            return false;
        }
        let command = TrackingCommand::MarkAnimationSystemLoaded {
            name: name.to_owned(),
        };
        match self.forward(command, name) {
            Ok(()) => log::debug!("Animation system '{name}' ready"),
            Err(e) => log::warn!("Failed to report animation system readiness: {e}"),
        }
        true
    }

    /// Whether `name` was already reported.
    pub fn is_notified(&self, name: &str) -> bool {
        self.notified().contains(name)
    }

    /// Names reported so far, sorted.
    pub fn notified_systems(&self) -> Vec<String> {
        let mut names: Vec<String> = self.notified().iter().cloned().collect();
        names.sort();
        names
    }

    /// Forgets every reported name, for a new loading session.
    pub fn reset(&self) {
        self.notified().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notify_forwards_once_per_name() {
        let (tx, rx) = flume::unbounded();
        let integration = AnimationSystemIntegration::new(tx);

        assert!(integration.notify_system_loaded("particles"));
        assert!(!integration.notify_system_loaded("particles"));

        let commands: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            commands,
            vec![TrackingCommand::MarkAnimationSystemLoaded {
                name: "particles".to_string()
            }]
        );
    }

    #[test]
    fn test_clones_share_the_notified_set() {
        let (tx, rx) = flume::unbounded();
        let integration = AnimationSystemIntegration::new(tx);
        let other = integration.clone();

        integration.notify_system_loaded("shader");
        assert!(!other.notify_system_loaded("shader"));
        assert!(other.is_notified("shader"));
        assert_eq!(rx.try_iter().count(), 1);
    }

    #[test]
    fn test_disconnected_manager_is_swallowed() {
        let (tx, rx) = flume::unbounded();
        drop(rx);
        let integration = AnimationSystemIntegration::new(tx);

        assert!(integration.notify_system_loaded("engine"));
        assert!(integration.is_notified("engine"));
        assert_eq!(
            integration.register_system("engine", 0.3),
            Err(IntegrationError::Disconnected("engine".to_string()))
        );
    }

    #[test]
    fn test_reset_allows_reporting_again() {
        let (tx, rx) = flume::unbounded();
        let integration = AnimationSystemIntegration::new(tx);
        integration.notify_system_loaded("b");
        integration.notify_system_loaded("a");
        assert_eq!(integration.notified_systems(), vec!["a", "b"]);

        integration.reset();
        assert!(integration.notify_system_loaded("a"));
        assert_eq!(rx.try_iter().count(), 3);
    }
}

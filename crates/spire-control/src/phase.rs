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

//! Lifecycle phases of a loading session.

use serde::Serialize;

/// Where a loading session currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadingPhase {
    /// Not started, or reset.
    #[default]
    Idle,
    /// Units are loading normally.
    Loading,
    /// No progress was observed within the stall threshold.
    Stalled,
    /// The maximum loading time elapsed.
    TimedOut,
    /// A failure is being classified.
    Erroring,
    /// A recovery attempt is waiting on its backoff.
    Recovering,
    /// Synthetic progress is driving the session to completion.
    Fallback,
    /// The session finished.
    Complete,
}

impl LoadingPhase {
    /// Returns `true` if moving from `self` to `next` is a valid transition.
    ///
    /// Any phase may return to `Idle` (reset). `Fallback` only leads to
    /// `Complete`, and `Complete` only leads to a new session.
    pub fn can_transition_to(self, next: LoadingPhase) -> bool {
        use LoadingPhase::*;

        if self == next || next == Idle {
            return true;
        }
        match self {
            Idle => next == Loading,
            Loading => true,
            Stalled => matches!(
                next,
                Loading | Erroring | Recovering | TimedOut | Fallback | Complete
            ),
            TimedOut => matches!(next, Recovering | Fallback | Complete),
            Erroring => matches!(next, Loading | Recovering | Fallback | Complete),
            Recovering => matches!(
                next,
                Loading | Stalled | Erroring | TimedOut | Fallback | Complete
            ),
            Fallback => next == Complete,
            Complete => next == Loading,
        }
    }

    /// Returns `true` while a session is running.
    pub fn is_active(self) -> bool {
        !matches!(self, LoadingPhase::Idle | LoadingPhase::Complete)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_phase_is_idle() {
        assert_eq!(LoadingPhase::default(), LoadingPhase::Idle);
        assert!(!LoadingPhase::Idle.is_active());
    }

    #[test]
    fn test_idle_only_starts_loading() {
        assert!(LoadingPhase::Idle.can_transition_to(LoadingPhase::Loading));
        assert!(!LoadingPhase::Idle.can_transition_to(LoadingPhase::Complete));
        assert!(!LoadingPhase::Idle.can_transition_to(LoadingPhase::Fallback));
    }

    #[test]
    fn test_fallback_is_one_way() {
        assert!(LoadingPhase::Fallback.can_transition_to(LoadingPhase::Complete));
        assert!(!LoadingPhase::Fallback.can_transition_to(LoadingPhase::Loading));
        assert!(!LoadingPhase::Fallback.can_transition_to(LoadingPhase::Recovering));
    }

    #[test]
    fn test_reset_is_always_allowed() {
        for phase in [
            LoadingPhase::Loading,
            LoadingPhase::Stalled,
            LoadingPhase::Fallback,
            LoadingPhase::Complete,
        ] {
            assert!(phase.can_transition_to(LoadingPhase::Idle));
        }
    }

    #[test]
    fn test_complete_starts_a_new_session() {
        assert!(LoadingPhase::Complete.can_transition_to(LoadingPhase::Loading));
        assert!(!LoadingPhase::Complete.can_transition_to(LoadingPhase::Stalled));
    }
}

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

/// Limits how far consecutive progress emissions may move.
///
/// The first value after construction or [`reset`](ProgressSmoother::reset)
/// passes through unchanged, and so does a value of 100: once every unit is
/// loaded no further emission may follow, so completion is never clamped.
/// Every other value is clamped to within `max_jump` of the previous output,
/// in either direction.
#[derive(Debug, Clone)]
pub struct ProgressSmoother {
    max_jump: f64,
    last: Option<f64>,
}

impl ProgressSmoother {
    /// Creates a smoother with the given per-emission bound.
    pub fn new(max_jump: f64) -> Self {
        Self {
            max_jump: max_jump.abs(),
            last: None,
        }
    }

    /// Smooths `raw` against the previous output and records the result.
    pub fn apply(&mut self, raw: f64) -> f64 {
        let next = match self.last {
            None => raw,
            Some(_) if raw >= 100.0 => raw,
            Some(last) => raw.clamp(last - self.max_jump, last + self.max_jump),
        };
        self.last = Some(next);
        next
    }

    /// The previous output, if any.
    pub fn last(&self) -> Option<f64> {
        self.last
    }

    /// Forgets the previous output.
    pub fn reset(&mut self) {
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_value_is_unsmoothed() {
        let mut smoother = ProgressSmoother::new(10.0);
        assert_eq!(smoother.apply(60.0), 60.0);
    }

    #[test]
    fn later_values_move_at_most_max_jump() {
        let mut smoother = ProgressSmoother::new(10.0);
        smoother.apply(0.0);
        assert_eq!(smoother.apply(90.0), 10.0);
        assert_eq!(smoother.apply(90.0), 20.0);
        assert_eq!(smoother.apply(15.0), 15.0);
        assert_eq!(smoother.apply(0.0), 5.0);
    }

    #[test]
    fn completion_is_never_clamped() {
        let mut smoother = ProgressSmoother::new(10.0);
        smoother.apply(60.0);
        assert_eq!(smoother.apply(100.0), 100.0);
    }

    #[test]
    fn reset_restores_first_value_exemption() {
        let mut smoother = ProgressSmoother::new(10.0);
        smoother.apply(0.0);
        smoother.reset();
        assert_eq!(smoother.last(), None);
        assert_eq!(smoother.apply(90.0), 90.0);
    }
}

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

//! The set of tracked units and their weighted completion ratio.

use spire_core::config::sanitize_weight;
use spire_core::resource::{ProgressBreakdown, ResourceType, TrackedUnit, TypeProgress};
use std::collections::HashMap;
use std::time::Duration;

/// Result of trying to mark a unit as loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkOutcome {
    /// The unit transitioned to loaded.
    Loaded,
    /// No unit is registered under that key.
    Unknown,
    /// The unit was already loaded; nothing changed.
    AlreadyLoaded,
}

/// Which key namespace a unit lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum UnitKind {
    Resource,
    AnimationSystem,
}

/// Holds every tracked unit for one session.
///
/// Resources are keyed by URL and animation systems by name; the two
/// namespaces are independent. Units are kept in registration order and are
/// never removed individually.
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    units: Vec<(UnitKind, TrackedUnit)>,
    index: HashMap<(UnitKind, String), usize>,
    total_weight: f64,
    loaded_weight: f64,
}

impl ResourceRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a resource. Returns `false` (and changes nothing) if the URL
    /// is already registered.
    pub fn track_resource(
        &mut self,
        url: &str,
        weight: f64,
        resource_type: ResourceType,
        now: Duration,
    ) -> bool {
        self.insert(UnitKind::Resource, url, weight, resource_type, now)
    }

    /// Registers an animation system. Returns `false` (and changes nothing) if
    /// the name is already registered.
    pub fn track_animation_system(&mut self, name: &str, weight: f64, now: Duration) -> bool {
        self.insert(
            UnitKind::AnimationSystem,
            name,
            weight,
            ResourceType::Animations,
            now,
        )
    }

    fn insert(
        &mut self,
        kind: UnitKind,
        key: &str,
        weight: f64,
        resource_type: ResourceType,
        now: Duration,
    ) -> bool {
        let map_key = (kind, key.to_owned());
        if self.index.contains_key(&map_key) {
            return false;
        }
        let sanitized = sanitize_weight(weight);
        if sanitized != weight {
            log::warn!("Invalid weight {weight} for '{key}'; using 0");
        }
        self.index.insert(map_key, self.units.len());
        self.units
            .push((kind, TrackedUnit::new(key, sanitized, resource_type, now)));
        self.total_weight += sanitized;
        true
    }

    /// Marks a resource as loaded.
    pub fn mark_resource(&mut self, url: &str, load_time: Duration, force: bool) -> MarkOutcome {
        self.mark(UnitKind::Resource, url, load_time, force)
    }

    /// Marks an animation system as loaded.
    pub fn mark_animation_system(
        &mut self,
        name: &str,
        load_time: Duration,
        force: bool,
    ) -> MarkOutcome {
        self.mark(UnitKind::AnimationSystem, name, load_time, force)
    }

    fn mark(&mut self, kind: UnitKind, key: &str, load_time: Duration, force: bool) -> MarkOutcome {
        let Some(&slot) = self.index.get(&(kind, key.to_owned())) else {
            return MarkOutcome::Unknown;
        };
        let unit = &mut self.units[slot].1;
        if unit.loaded {
            return MarkOutcome::AlreadyLoaded;
        }
        unit.loaded = true;
        unit.load_time = Some(load_time);
        unit.force_loaded = force;
        self.loaded_weight += unit.weight;
        MarkOutcome::Loaded
    }

    /// Force-marks every unloaded unit matching `filter`. Returns how many
    /// units changed.
    pub fn force_where(
        &mut self,
        load_time: Duration,
        mut filter: impl FnMut(&TrackedUnit) -> bool,
    ) -> usize {
        let mut changed = 0;
        for (_, unit) in self.units.iter_mut() {
            if unit.loaded || !filter(unit) {
                continue;
            }
            unit.loaded = true;
            unit.load_time = Some(load_time);
            unit.force_loaded = true;
            self.loaded_weight += unit.weight;
            changed += 1;
        }
        changed
    }

    /// `loaded_weight / total_weight * 100`, or 100 when nothing is tracked.
    ///
    /// Exactly 100 once every unit is loaded, whatever the summation order.
    pub fn raw_progress(&self) -> f64 {
        if self.total_weight <= 0.0 || self.is_complete() {
            return 100.0;
        }
        (self.loaded_weight / self.total_weight * 100.0).clamp(0.0, 100.0)
    }

    /// Per-type loaded/total counts.
    pub fn breakdown(&self) -> ProgressBreakdown {
        let mut breakdown = ProgressBreakdown::default();
        for resource_type in ResourceType::ALL {
            let (loaded, total) = self
                .units
                .iter()
                .filter(|(_, unit)| unit.resource_type == resource_type)
                .fold((0, 0), |(loaded, total), (_, unit)| {
                    (loaded + usize::from(unit.loaded), total + 1)
                });
            *breakdown.get_mut(resource_type) = TypeProgress::from_counts(loaded, total);
        }
        breakdown
    }

    /// Looks up a resource by URL.
    pub fn resource(&self, url: &str) -> Option<&TrackedUnit> {
        self.get(UnitKind::Resource, url)
    }

    /// Looks up an animation system by name.
    pub fn animation_system(&self, name: &str) -> Option<&TrackedUnit> {
        self.get(UnitKind::AnimationSystem, name)
    }

    fn get(&self, kind: UnitKind, key: &str) -> Option<&TrackedUnit> {
        self.index
            .get(&(kind, key.to_owned()))
            .map(|&slot| &self.units[slot].1)
    }

    /// Every tracked resource, in registration order.
    pub fn resources(&self) -> impl Iterator<Item = &TrackedUnit> {
        self.units
            .iter()
            .filter(|(kind, _)| *kind == UnitKind::Resource)
            .map(|(_, unit)| unit)
    }

    /// Every tracked animation system, in registration order.
    pub fn animation_systems(&self) -> impl Iterator<Item = &TrackedUnit> {
        self.units
            .iter()
            .filter(|(kind, _)| *kind == UnitKind::AnimationSystem)
            .map(|(_, unit)| unit)
    }

    /// Sum of all registered weights.
    pub fn total_weight(&self) -> f64 {
        self.total_weight
    }

    /// Sum of the weights of loaded units.
    pub fn loaded_weight(&self) -> f64 {
        self.loaded_weight
    }

    /// Number of tracked units of both kinds.
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Returns `true` if nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Returns `true` once every unit is loaded.
    pub fn is_complete(&self) -> bool {
        self.units.iter().all(|(_, unit)| unit.loaded)
    }

    /// Discards every unit.
    pub fn clear(&mut self) {
        self.units.clear();
        self.index.clear();
        self.total_weight = 0.0;
        self.loaded_weight = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const T0: Duration = Duration::ZERO;

    #[test]
    fn empty_registry_is_complete() {
        let registry = ResourceRegistry::new();
        assert_eq!(registry.raw_progress(), 100.0);
        assert!(registry.is_complete());
    }

    #[test]
    fn weighted_ratio_over_mixed_units() {
        let mut registry = ResourceRegistry::new();
        registry.track_resource("/app.css", 0.4, ResourceType::Critical, T0);
        registry.track_resource("/font.woff2", 0.2, ResourceType::Fonts, T0);
        registry.track_animation_system("particles", 0.3, T0);
        registry.track_resource("/hero.webp", 0.1, ResourceType::Images, T0);

        registry.mark_resource("/app.css", T0, false);
        registry.mark_animation_system("particles", T0, false);

        assert_relative_eq!(registry.raw_progress(), 70.0, epsilon = 1e-9);
    }

    #[test]
    fn weights_need_not_sum_to_one() {
        let mut registry = ResourceRegistry::new();
        registry.track_resource("a", 3.0, ResourceType::Critical, T0);
        registry.track_resource("b", 1.0, ResourceType::Critical, T0);
        registry.mark_resource("b", T0, false);
        assert_relative_eq!(registry.raw_progress(), 25.0);
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = ResourceRegistry::new();
        assert!(registry.track_resource("x", 0.5, ResourceType::Critical, T0));
        assert!(!registry.track_resource("x", 0.5, ResourceType::Critical, T0));
        assert_relative_eq!(registry.total_weight(), 0.5);
    }

    #[test]
    fn resource_and_system_namespaces_are_separate() {
        let mut registry = ResourceRegistry::new();
        assert!(registry.track_resource("webgl", 0.1, ResourceType::Animations, T0));
        assert!(registry.track_animation_system("webgl", 0.1, T0));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn double_mark_does_not_double_count() {
        let mut registry = ResourceRegistry::new();
        registry.track_resource("x", 0.5, ResourceType::Critical, T0);
        assert_eq!(registry.mark_resource("x", T0, false), MarkOutcome::Loaded);
        assert_eq!(
            registry.mark_resource("x", T0, false),
            MarkOutcome::AlreadyLoaded
        );
        assert_relative_eq!(registry.loaded_weight(), 0.5);
    }

    #[test]
    fn unknown_mark_changes_nothing() {
        let mut registry = ResourceRegistry::new();
        registry.track_resource("x", 0.5, ResourceType::Critical, T0);
        assert_eq!(registry.mark_resource("y", T0, false), MarkOutcome::Unknown);
        assert_eq!(
            registry.mark_animation_system("x", T0, false),
            MarkOutcome::Unknown
        );
        assert_eq!(registry.loaded_weight(), 0.0);
    }

    #[test]
    fn negative_weight_is_clamped() {
        let mut registry = ResourceRegistry::new();
        registry.track_resource("x", -2.0, ResourceType::Images, T0);
        assert_eq!(registry.total_weight(), 0.0);
        assert_eq!(registry.raw_progress(), 100.0);
    }

    #[test]
    fn force_where_marks_only_matching_units() {
        let mut registry = ResourceRegistry::new();
        registry.track_resource("/app.js", 0.5, ResourceType::Critical, T0);
        registry.track_resource("/hero.webp", 0.5, ResourceType::Images, T0);

        let changed = registry.force_where(Duration::from_millis(10), |unit| {
            unit.resource_type == ResourceType::Critical
        });
        assert_eq!(changed, 1);
        let app = registry.resource("/app.js").unwrap();
        assert!(app.loaded && app.force_loaded);
        assert!(!registry.resource("/hero.webp").unwrap().loaded);
    }

    #[test]
    fn breakdown_counts_per_type() {
        let mut registry = ResourceRegistry::new();
        registry.track_resource("/a.css", 0.2, ResourceType::Critical, T0);
        registry.track_resource("/b.js", 0.2, ResourceType::Critical, T0);
        registry.track_animation_system("cursor", 0.1, T0);
        registry.mark_resource("/a.css", T0, false);

        let breakdown = registry.breakdown();
        assert_eq!(breakdown.critical.loaded, 1);
        assert_eq!(breakdown.critical.total, 2);
        assert_eq!(breakdown.critical.progress, 50.0);
        assert_eq!(breakdown.animations.progress, 0.0);
        assert_eq!(breakdown.fonts.progress, 100.0);
    }
}

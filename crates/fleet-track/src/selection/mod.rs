// Copyright 2025 Chris Custine
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

//! Pointer hit-testing and selection state.

use crate::aircraft::{AircraftSnapshot, TrackedSet};
use crate::projection::{Projection, ScreenPoint};

/// Maximum pixel distance (exclusive) for a click to select an aircraft.
pub const HIT_RADIUS_PX: f64 = 20.0;

/// Nearest drawable aircraft strictly within `radius` pixels of `click`.
///
/// Aircraft off the surface or without a position are not candidates. On a
/// tie the first aircraft in set order wins.
#[must_use]
pub fn hit_test<'a>(
    set: &'a TrackedSet,
    projection: &Projection,
    click: ScreenPoint,
    radius: f64,
) -> Option<&'a AircraftSnapshot> {
    let mut best: Option<(&AircraftSnapshot, f64)> = None;

    for aircraft in set.iter().filter(|a| a.has_position()) {
        let p = projection.project(aircraft.latitude, aircraft.longitude);
        if !projection.is_visible(p) {
            continue;
        }
        let distance = p.distance_to(click);
        if best.map_or(true, |(_, d)| distance < d) {
            best = Some((aircraft, distance));
        }
    }

    best.filter(|&(_, d)| d < radius).map(|(aircraft, _)| aircraft)
}

/// The selected aircraft id, if any.
///
/// Selection is held by id and looked up in whichever set is current. When
/// the id drops out of the feed nothing resolves, and it resolves again if
/// the aircraft comes back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionState {
    selected: Option<String>,
}

impl SelectionState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn selected_id(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    #[must_use]
    pub fn is_selected(&self, id: &str) -> bool {
        self.selected.as_deref() == Some(id)
    }

    pub fn select(&mut self, id: impl Into<String>) {
        self.selected = Some(id.into());
    }

    pub fn clear(&mut self) {
        self.selected = None;
    }

    /// Selected snapshot in `set`, if it is present there.
    #[must_use]
    pub fn resolve<'a>(&self, set: &'a TrackedSet) -> Option<&'a AircraftSnapshot> {
        self.selected.as_deref().and_then(|id| set.get(id))
    }

    /// Whether something is selected that `set` does not contain.
    #[must_use]
    pub fn is_dangling(&self, set: &TrackedSet) -> bool {
        self.selected.as_deref().is_some_and(|id| !set.contains(id))
    }

    /// Apply a pointer click.
    ///
    /// On a hit the selection moves to that aircraft and the snapshot is
    /// returned so the caller can fire its select callback. A miss leaves the
    /// selection as it was.
    pub fn handle_click<'a>(
        &mut self,
        set: &'a TrackedSet,
        projection: &Projection,
        click: ScreenPoint,
        radius: f64,
    ) -> Option<&'a AircraftSnapshot> {
        let hit = hit_test(set, projection, click, radius)?;
        self.selected = Some(hit.id.clone());
        Some(hit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aircraft::tests::{fixed_now, snapshot};
    use crate::projection::{SurfaceSize, Viewport};

    const SIZE: SurfaceSize = SurfaceSize::new(720.0, 360.0);

    fn set_of(aircraft: Vec<AircraftSnapshot>) -> TrackedSet {
        TrackedSet::new(aircraft, 1, fixed_now())
    }

    #[test]
    fn test_click_on_projected_pixel_selects() {
        let set = set_of(vec![snapshot("N1AB", 40.0, -74.0)]);
        let projection = Viewport::default().projection(SIZE);
        let at = projection.project(40.0, -74.0);

        let mut selection = SelectionState::new();
        let hit = selection.handle_click(&set, &projection, at, HIT_RADIUS_PX);

        assert_eq!(hit.map(|a| a.id.as_str()), Some("N1AB"));
        assert_eq!(selection.selected_id(), Some("N1AB"));
    }

    #[test]
    fn test_radius_is_strict() {
        let set = set_of(vec![snapshot("N1AB", 40.0, -74.0)]);
        let projection = Viewport::default().projection(SIZE);
        let at = projection.project(40.0, -74.0);

        let inside = ScreenPoint::new(at.x + 19.999, at.y);
        let boundary = ScreenPoint::new(at.x + 12.0, at.y + 16.0);
        assert!((boundary.distance_to(at) - 20.0).abs() < 1e-9);

        assert!(hit_test(&set, &projection, inside, HIT_RADIUS_PX).is_some());
        assert!(hit_test(&set, &projection, boundary, HIT_RADIUS_PX).is_none());
    }

    #[test]
    fn test_miss_keeps_existing_selection() {
        let set = set_of(vec![snapshot("N1AB", 40.0, -74.0), snapshot("N2CD", -10.0, 20.0)]);
        let projection = Viewport::default().projection(SIZE);
        let at = projection.project(40.0, -74.0);

        let mut selection = SelectionState::new();
        selection.select("N2CD");

        let far = ScreenPoint::new(at.x + 25.0, at.y);
        assert!(selection.handle_click(&set, &projection, far, HIT_RADIUS_PX).is_none());
        assert_eq!(selection.selected_id(), Some("N2CD"));
    }

    #[test]
    fn test_nearest_wins_and_ties_go_to_first() {
        let projection = Viewport::default().projection(SIZE);
        // 1 degree = 2 px on this surface.
        let set = set_of(vec![
            snapshot("west", 0.0, -2.0),
            snapshot("east", 0.0, 2.0),
            snapshot("near", 0.0, 1.0),
        ]);
        let centre = projection.project(0.0, 0.0);

        let hit = hit_test(&set, &projection, centre, HIT_RADIUS_PX).unwrap();
        assert_eq!(hit.id, "near");

        let tied = set_of(vec![snapshot("west", 0.0, -2.0), snapshot("east", 0.0, 2.0)]);
        let hit = hit_test(&tied, &projection, centre, HIT_RADIUS_PX).unwrap();
        assert_eq!(hit.id, "west");
    }

    #[test]
    fn test_offscreen_and_error_entries_are_not_candidates() {
        let mut viewport = Viewport::default();
        viewport.set_zoom(4);
        viewport.set_center(0.0, 0.0);
        let projection = viewport.projection(SIZE);

        let unresolved = AircraftSnapshot::unresolved("ghost", fixed_now());
        let set = set_of(vec![unresolved, snapshot("far", 60.0, 120.0)]);

        let centre = projection.project(0.0, 0.0);
        assert!(hit_test(&set, &projection, centre, 10_000.0).is_none());
    }

    #[test]
    fn test_selection_survives_set_without_the_aircraft() {
        let mut selection = SelectionState::new();
        selection.select("N1AB");

        let without = set_of(vec![snapshot("N2CD", 0.0, 0.0)]);
        assert!(selection.resolve(&without).is_none());
        assert!(selection.is_dangling(&without));

        let with = set_of(vec![snapshot("N1AB", 1.0, 1.0)]);
        assert_eq!(selection.resolve(&with).map(|a| a.id.as_str()), Some("N1AB"));

        selection.clear();
        assert_eq!(selection.selected_id(), None);
    }
}

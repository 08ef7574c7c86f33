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

//! Equirectangular projection and viewport state.
//!
//! The base mapping spreads the whole globe over the raster surface:
//!
//! ```text
//! x = (longitude + 180) / 360 * W
//! y = (90 - latitude) / 180 * H
//! ```
//!
//! The [`Viewport`] then scales that mapping by `2^(zoom - min)` around its
//! centre. With the default viewport the result is the base mapping itself.
//! Rendering and hit-testing both go through [`Projection`], so a glyph is
//! always clicked where it is drawn.

use serde::{Deserialize, Serialize};

/// A point in raster (pixel) space. Origin is top-left, y grows downward.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

impl ScreenPoint {
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    #[must_use]
    pub fn distance_to(self, other: ScreenPoint) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Pixel dimensions of a raster surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceSize {
    pub width: f64,
    pub height: f64,
}

impl SurfaceSize {
    #[must_use]
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// A surface with no drawable area cannot be projected onto.
    #[must_use]
    pub fn is_drawable(self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }

    /// Whether `p` lies within `[0, W] x [0, H]`.
    #[must_use]
    pub fn contains(self, p: ScreenPoint) -> bool {
        (0.0..=self.width).contains(&p.x) && (0.0..=self.height).contains(&p.y)
    }
}

/// Allowed integer zoom levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoomRange {
    pub min: u8,
    pub max: u8,
}

impl ZoomRange {
    /// Build a range, swapping the bounds if they arrive reversed.
    #[must_use]
    pub fn new(min: u8, max: u8) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    #[must_use]
    pub fn clamp(self, zoom: u8) -> u8 {
        zoom.clamp(self.min, self.max)
    }
}

impl Default for ZoomRange {
    fn default() -> Self {
        Self { min: 1, max: 8 }
    }
}

/// Map viewport: what the surface is centred on and how far it is zoomed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    center_lat: f64,
    center_lon: f64,
    zoom: u8,
    range: ZoomRange,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(ZoomRange::default())
    }
}

impl Viewport {
    /// Whole-world viewport at the minimum zoom.
    #[must_use]
    pub fn new(range: ZoomRange) -> Self {
        Self {
            center_lat: 0.0,
            center_lon: 0.0,
            zoom: range.min,
            range,
        }
    }

    #[must_use]
    pub fn center(&self) -> (f64, f64) {
        (self.center_lat, self.center_lon)
    }

    #[must_use]
    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    #[must_use]
    pub fn zoom_range(&self) -> ZoomRange {
        self.range
    }

    /// Scale applied on top of the base mapping.
    #[must_use]
    pub fn scale(&self) -> f64 {
        2f64.powi(i32::from(self.zoom - self.range.min))
    }

    /// Centre on a position, clamped to valid coordinates.
    pub fn set_center(&mut self, lat: f64, lon: f64) {
        self.center_lat = lat.clamp(-90.0, 90.0);
        self.center_lon = lon.clamp(-180.0, 180.0);
    }

    /// Move the centre by a number of degrees.
    pub fn pan(&mut self, delta_lat: f64, delta_lon: f64) {
        self.set_center(self.center_lat + delta_lat, self.center_lon + delta_lon);
    }

    /// Move the map content by a pixel drag on a surface of `size`.
    ///
    /// Dragging right moves the centre west; dragging down moves it north.
    pub fn pan_pixels(&mut self, dx: f64, dy: f64, size: SurfaceSize) {
        if !size.is_drawable() {
            return;
        }
        let scale = self.scale();
        let delta_lon = -dx / scale * 360.0 / size.width;
        let delta_lat = dy / scale * 180.0 / size.height;
        self.pan(delta_lat, delta_lon);
    }

    pub fn set_zoom(&mut self, zoom: u8) {
        self.zoom = self.range.clamp(zoom);
    }

    pub fn zoom_in(&mut self) {
        self.set_zoom(self.zoom.saturating_add(1));
    }

    pub fn zoom_out(&mut self) {
        self.set_zoom(self.zoom.saturating_sub(1));
    }

    /// Back to the whole-world view.
    pub fn reset(&mut self) {
        *self = Self::new(self.range);
    }

    /// Projection of this viewport onto a surface.
    #[must_use]
    pub fn projection(&self, size: SurfaceSize) -> Projection {
        Projection::new(*self, size)
    }
}

/// Equirectangular base mapping onto a `(W, H)` surface.
#[must_use]
pub fn equirectangular(lat: f64, lon: f64, size: SurfaceSize) -> ScreenPoint {
    ScreenPoint {
        x: (lon + 180.0) / 360.0 * size.width,
        y: (90.0 - lat) / 180.0 * size.height,
    }
}

/// A viewport bound to a surface size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    size: SurfaceSize,
    scale: f64,
    center_px: ScreenPoint,
}

impl Projection {
    #[must_use]
    pub fn new(viewport: Viewport, size: SurfaceSize) -> Self {
        let (lat, lon) = viewport.center();
        Self {
            size,
            scale: viewport.scale(),
            center_px: equirectangular(lat, lon, size),
        }
    }

    #[must_use]
    pub fn size(&self) -> SurfaceSize {
        self.size
    }

    /// Geographic position to raster coordinates.
    #[must_use]
    pub fn project(&self, lat: f64, lon: f64) -> ScreenPoint {
        let base = equirectangular(lat, lon, self.size);
        ScreenPoint {
            x: (base.x - self.center_px.x) * self.scale + self.size.width / 2.0,
            y: (base.y - self.center_px.y) * self.scale + self.size.height / 2.0,
        }
    }

    /// Raster coordinates back to `(lat, lon)`.
    #[must_use]
    pub fn unproject(&self, p: ScreenPoint) -> (f64, f64) {
        let base_x = (p.x - self.size.width / 2.0) / self.scale + self.center_px.x;
        let base_y = (p.y - self.size.height / 2.0) / self.scale + self.center_px.y;
        let lon = base_x / self.size.width * 360.0 - 180.0;
        let lat = 90.0 - base_y / self.size.height * 180.0;
        (lat, lon)
    }

    /// Raster position of the viewport centre.
    #[must_use]
    pub fn center_point(&self) -> ScreenPoint {
        ScreenPoint::new(self.size.width / 2.0, self.size.height / 2.0)
    }

    /// Whether a projected point is on the surface.
    #[must_use]
    pub fn is_visible(&self, p: ScreenPoint) -> bool {
        self.size.contains(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIZE: SurfaceSize = SurfaceSize::new(800.0, 400.0);

    #[test]
    fn test_default_viewport_is_base_mapping() {
        let projection = Viewport::default().projection(SIZE);
        for &(lat, lon) in &[(0.0, 0.0), (40.0, -74.0), (-33.9, 151.2), (90.0, -180.0)] {
            let p = projection.project(lat, lon);
            let expected = equirectangular(lat, lon, SIZE);
            assert!((p.x - expected.x).abs() < 1e-9);
            assert!((p.y - expected.y).abs() < 1e-9);
        }

        let p = projection.project(40.0, -74.0);
        assert!((p.x - (106.0 / 360.0 * 800.0)).abs() < 1e-9);
        assert!((p.y - (50.0 / 180.0 * 400.0)).abs() < 1e-9);
    }

    #[test]
    fn test_longitude_monotonic_in_x() {
        let mut viewport = Viewport::default();
        viewport.set_zoom(3);
        viewport.set_center(20.0, 30.0);
        let projection = viewport.projection(SIZE);

        let mut previous = f64::NEG_INFINITY;
        for step in 0..=360 {
            let lon = -180.0 + f64::from(step);
            let x = projection.project(12.5, lon).x;
            assert!(x > previous, "x not increasing at lon {lon}");
            previous = x;
        }
    }

    #[test]
    fn test_latitude_monotonic_decreasing_in_y() {
        let projection = Viewport::default().projection(SIZE);

        let mut previous = f64::INFINITY;
        for step in 0..=180 {
            let lat = -90.0 + f64::from(step);
            let y = projection.project(lat, 45.0).y;
            assert!(y < previous, "y not decreasing at lat {lat}");
            previous = y;
        }
    }

    #[test]
    fn test_round_trip() {
        let mut viewport = Viewport::new(ZoomRange::new(1, 10));
        viewport.set_center(-12.25, 77.5);
        viewport.set_zoom(5);
        let projection = viewport.projection(SIZE);

        for &(x, y) in &[(0.0, 0.0), (400.0, 200.0), (799.5, 1.25), (13.0, 377.0)] {
            let (lat, lon) = projection.unproject(ScreenPoint::new(x, y));
            let back = projection.project(lat, lon);
            assert!((back.x - x).abs() < 1e-6);
            assert!((back.y - y).abs() < 1e-6);
        }
    }

    #[test]
    fn test_viewport_centre_projects_to_surface_centre() {
        let mut viewport = Viewport::default();
        viewport.set_center(51.47, -0.45);
        viewport.set_zoom(4);
        let projection = viewport.projection(SIZE);

        let p = projection.project(51.47, -0.45);
        assert!((p.x - 400.0).abs() < 1e-9);
        assert!((p.y - 200.0).abs() < 1e-9);
        assert_eq!(projection.center_point(), ScreenPoint::new(400.0, 200.0));
    }

    #[test]
    fn test_zoom_is_clamped() {
        let mut viewport = Viewport::new(ZoomRange::new(2, 4));
        assert_eq!(viewport.zoom(), 2);

        viewport.zoom_out();
        assert_eq!(viewport.zoom(), 2);
        viewport.zoom_in();
        viewport.zoom_in();
        viewport.zoom_in();
        assert_eq!(viewport.zoom(), 4);
        viewport.set_zoom(200);
        assert_eq!(viewport.zoom(), 4);
        assert!((viewport.scale() - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_reversed_zoom_range() {
        assert_eq!(ZoomRange::new(9, 3), ZoomRange { min: 3, max: 9 });
    }

    #[test]
    fn test_pan_pixels_and_reset() {
        let mut viewport = Viewport::default();
        viewport.pan_pixels(80.0, -40.0, SIZE);
        let (lat, lon) = viewport.center();
        assert!((lon + 36.0).abs() < 1e-9);
        assert!((lat + 18.0).abs() < 1e-9);

        viewport.pan(500.0, 0.0);
        assert!((viewport.center().0 - 90.0).abs() < f64::EPSILON);

        viewport.zoom_in();
        viewport.reset();
        assert_eq!(viewport, Viewport::default());
    }
}

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

//! Map rendering onto an abstract raster surface.
//!
//! [`MapRenderer`] turns a [`TrackedSet`], the current selection and a
//! [`Viewport`] into draw calls on a [`Surface`]. It reads its inputs only and
//! is safe to call on every state change. The desktop shell implements
//! [`Surface`] on top of an egui painter.

use std::f64::consts::PI;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::aircraft::TrackedSet;
use crate::projection::{ScreenPoint, SurfaceSize, Viewport};
use crate::selection::SelectionState;

/// Grid spacing in degrees.
const GRID_STEP_DEGREES: f64 = 30.0;
/// Distance from glyph centre to nose, in pixels.
const GLYPH_LENGTH: f64 = 12.0;
const CENTER_MARKER_SIZE: f64 = 6.0;
const LABEL_OFFSET: f64 = 14.0;

/// Rendering errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RenderError {
    /// No drawable raster context could be acquired.
    #[error("render surface unavailable")]
    SurfaceUnavailable,
}

/// RGBA colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    #[must_use]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    #[must_use]
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

/// Text anchor relative to the given position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAnchor {
    LeftTop,
    LeftCenter,
}

/// Drawing backend.
pub trait Surface {
    /// Drawable size, or `None` if the context cannot be acquired.
    fn size(&self) -> Option<SurfaceSize>;

    fn clear(&mut self, color: Color);

    fn line(&mut self, from: ScreenPoint, to: ScreenPoint, width: f32, color: Color);

    fn circle(&mut self, center: ScreenPoint, radius: f32, fill: Color);

    /// Filled closed polygon.
    fn polygon(&mut self, points: &[ScreenPoint], fill: Color);

    fn text(&mut self, pos: ScreenPoint, anchor: TextAnchor, text: &str, size: f32, color: Color);
}

/// Colours used by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub background: Color,
    pub grid: Color,
    pub aircraft: Color,
    pub selected: Color,
    pub label: Color,
    pub center_marker: Color,
    pub overlay_text: Color,
    pub error_text: Color,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            background: Color::rgb(14, 22, 33),
            grid: Color::rgba(90, 120, 150, 70),
            aircraft: Color::rgb(120, 220, 120),
            selected: Color::rgb(255, 80, 80),
            label: Color::rgb(230, 230, 230),
            center_marker: Color::rgb(80, 180, 255),
            overlay_text: Color::rgb(180, 190, 200),
            error_text: Color::rgb(255, 170, 60),
        }
    }
}

/// Live metrics drawn in the top-left corner.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MapOverlay {
    pub last_update: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

/// What a frame ended up drawing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Aircraft glyphs drawn.
    pub drawn: usize,
    /// Aircraft skipped because they fell outside the surface or had no position.
    pub skipped: usize,
}

/// Glyph outline in local coordinates, nose pointing north (negative y).
const GLYPH_OUTLINE: [(f64, f64); 4] = [
    (0.0, -GLYPH_LENGTH),
    (GLYPH_LENGTH * 0.6, GLYPH_LENGTH * 0.7),
    (0.0, GLYPH_LENGTH * 0.35),
    (-GLYPH_LENGTH * 0.6, GLYPH_LENGTH * 0.7),
];

/// Glyph outline rotated by `heading` degrees clockwise and moved to `at`.
#[must_use]
pub fn glyph_points(at: ScreenPoint, heading: f64) -> [ScreenPoint; 4] {
    let radians = heading * PI / 180.0;
    let (sin, cos) = radians.sin_cos();
    GLYPH_OUTLINE.map(|(x, y)| ScreenPoint {
        x: at.x + x * cos - y * sin,
        y: at.y + x * sin + y * cos,
    })
}

/// Draws the tracking map.
#[derive(Debug, Clone, Default)]
pub struct MapRenderer {
    palette: Palette,
}

impl MapRenderer {
    #[must_use]
    pub fn new(palette: Palette) -> Self {
        Self { palette }
    }

    /// Draw one frame.
    pub fn render<S: Surface + ?Sized>(
        &self,
        surface: &mut S,
        set: &TrackedSet,
        selection: &SelectionState,
        viewport: &Viewport,
        overlay: &MapOverlay,
    ) -> Result<FrameStats, RenderError> {
        let size = surface
            .size()
            .filter(|s| s.is_drawable())
            .ok_or(RenderError::SurfaceUnavailable)?;
        let projection = viewport.projection(size);

        surface.clear(self.palette.background);
        self.draw_grid(surface, viewport, size);

        let mut stats = FrameStats::default();
        let mut selected_at = None;

        for aircraft in set.iter() {
            if !aircraft.has_position() {
                stats.skipped += 1;
                continue;
            }
            let p = projection.project(aircraft.latitude, aircraft.longitude);
            if !projection.is_visible(p) {
                stats.skipped += 1;
                continue;
            }

            let is_selected = selection.is_selected(&aircraft.id);
            let color = if is_selected {
                self.palette.selected
            } else {
                self.palette.aircraft
            };
            surface.polygon(&glyph_points(p, aircraft.heading), color);
            if is_selected {
                selected_at = Some((p, aircraft));
            }
            stats.drawn += 1;
        }

        // Labels go on top of every glyph.
        if let Some((p, aircraft)) = selected_at {
            let label_at = ScreenPoint::new(p.x + LABEL_OFFSET, p.y - LABEL_OFFSET / 2.0);
            surface.text(
                label_at,
                TextAnchor::LeftCenter,
                &aircraft.formatted_altitude(),
                11.0,
                self.palette.label,
            );
            surface.text(
                ScreenPoint::new(label_at.x, label_at.y + LABEL_OFFSET),
                TextAnchor::LeftCenter,
                &aircraft.formatted_speed(),
                11.0,
                self.palette.label,
            );
        }

        self.draw_center_marker(surface, projection.center_point());
        self.draw_overlay(surface, set, stats, overlay);

        Ok(stats)
    }

    fn draw_grid<S: Surface + ?Sized>(
        &self,
        surface: &mut S,
        viewport: &Viewport,
        size: SurfaceSize,
    ) {
        let projection = viewport.projection(size);
        let top = projection.project(90.0, 0.0).y.max(0.0);
        let bottom = projection.project(-90.0, 0.0).y.min(size.height);
        let left = projection.project(0.0, -180.0).x.max(0.0);
        let right = projection.project(0.0, 180.0).x.min(size.width);

        let mut lon = -180.0;
        while lon <= 180.0 {
            let x = projection.project(0.0, lon).x;
            if (0.0..=size.width).contains(&x) {
                surface.line(
                    ScreenPoint::new(x, top),
                    ScreenPoint::new(x, bottom),
                    1.0,
                    self.palette.grid,
                );
            }
            lon += GRID_STEP_DEGREES;
        }

        let mut lat = -90.0;
        while lat <= 90.0 {
            let y = projection.project(lat, 0.0).y;
            if (0.0..=size.height).contains(&y) {
                surface.line(
                    ScreenPoint::new(left, y),
                    ScreenPoint::new(right, y),
                    1.0,
                    self.palette.grid,
                );
            }
            lat += GRID_STEP_DEGREES;
        }
    }

    fn draw_center_marker<S: Surface + ?Sized>(&self, surface: &mut S, at: ScreenPoint) {
        let color = self.palette.center_marker;
        let s = CENTER_MARKER_SIZE;
        let horizontal = (ScreenPoint::new(at.x - s, at.y), ScreenPoint::new(at.x + s, at.y));
        let vertical = (ScreenPoint::new(at.x, at.y - s), ScreenPoint::new(at.x, at.y + s));
        surface.line(horizontal.0, horizontal.1, 1.5, color);
        surface.line(vertical.0, vertical.1, 1.5, color);
        surface.circle(at, 2.0, color);
    }

    fn draw_overlay<S: Surface + ?Sized>(
        &self,
        surface: &mut S,
        set: &TrackedSet,
        stats: FrameStats,
        overlay: &MapOverlay,
    ) {
        let mut y = 8.0;
        let mut line = |surface: &mut S, text: &str, color: Color| {
            surface.text(ScreenPoint::new(8.0, y), TextAnchor::LeftTop, text, 12.0, color);
            y += 16.0;
        };

        line(
            surface,
            &format!("{} aircraft ({} on map)", set.len(), stats.drawn),
            self.palette.overlay_text,
        );
        let updated = overlay.last_update.map_or_else(
            || "Updated: never".to_string(),
            |t| format!("Updated: {}", t.format("%H:%M:%S UTC")),
        );
        line(surface, &updated, self.palette.overlay_text);
        if let Some(error) = &overlay.error {
            line(surface, &format!("Feed error: {error}"), self.palette.error_text);
        }
    }
}

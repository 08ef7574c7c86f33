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

//! `egui` backend for the map renderer.

use fleet_track::{Color, ScreenPoint, Surface, SurfaceSize, TextAnchor};

/// Draws into a rectangle of an egui painter.
///
/// Renderer coordinates are relative to the rectangle's top-left corner.
pub struct EguiSurface<'a> {
    painter: &'a egui::Painter,
    rect: egui::Rect,
}

impl<'a> EguiSurface<'a> {
    pub fn new(painter: &'a egui::Painter, rect: egui::Rect) -> Self {
        Self { painter, rect }
    }

    #[allow(clippy::cast_possible_truncation, reason = "screen coordinates fit in f32")]
    fn to_pos(&self, p: ScreenPoint) -> egui::Pos2 {
        egui::pos2(self.rect.min.x + p.x as f32, self.rect.min.y + p.y as f32)
    }

    /// Surface-relative point for an absolute pointer position.
    pub fn to_screen_point(rect: egui::Rect, pos: egui::Pos2) -> ScreenPoint {
        ScreenPoint::new(f64::from(pos.x - rect.min.x), f64::from(pos.y - rect.min.y))
    }
}

fn to_color32(color: Color) -> egui::Color32 {
    egui::Color32::from_rgba_unmultiplied(color.r, color.g, color.b, color.a)
}

impl Surface for EguiSurface<'_> {
    fn size(&self) -> Option<SurfaceSize> {
        let rect = self.rect;
        if !rect.is_finite() || rect.width() <= 0.0 || rect.height() <= 0.0 {
            return None;
        }
        Some(SurfaceSize::new(f64::from(rect.width()), f64::from(rect.height())))
    }

    fn clear(&mut self, color: Color) {
        self.painter.rect_filled(self.rect, 0.0, to_color32(color));
    }

    fn line(&mut self, from: ScreenPoint, to: ScreenPoint, width: f32, color: Color) {
        self.painter.line_segment(
            [self.to_pos(from), self.to_pos(to)],
            egui::Stroke::new(width, to_color32(color)),
        );
    }

    fn circle(&mut self, center: ScreenPoint, radius: f32, fill: Color) {
        self.painter.circle_filled(self.to_pos(center), radius, to_color32(fill));
    }

    fn polygon(&mut self, points: &[ScreenPoint], fill: Color) {
        let points: Vec<egui::Pos2> = points.iter().map(|&p| self.to_pos(p)).collect();
        self.painter.add(egui::Shape::convex_polygon(
            points,
            to_color32(fill),
            egui::Stroke::NONE,
        ));
    }

    fn text(&mut self, pos: ScreenPoint, anchor: TextAnchor, text: &str, size: f32, color: Color) {
        let align = match anchor {
            TextAnchor::LeftTop => egui::Align2::LEFT_TOP,
            TextAnchor::LeftCenter => egui::Align2::LEFT_CENTER,
        };
        self.painter.text(
            self.to_pos(pos),
            align,
            text,
            egui::FontId::proportional(size),
            to_color32(color),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pointer_position_is_rect_relative() {
        let rect = egui::Rect::from_min_size(egui::pos2(100.0, 50.0), egui::vec2(400.0, 200.0));
        let p = EguiSurface::to_screen_point(rect, egui::pos2(150.0, 75.0));
        assert_eq!(p, ScreenPoint::new(50.0, 25.0));
    }
}

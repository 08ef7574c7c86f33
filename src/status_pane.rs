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

use chrono::Utc;
use fleet_track::aircraft::format::format_age;
use fleet_track::FetchPhase;

use crate::status::{DiagnosticLevel, FeedStatus};

const MAX_MESSAGE_CHARS: usize = 34;

#[derive(Debug)]
pub struct StatusPane {
    pub visible: bool,
    pub collapsed: bool,
}

impl StatusPane {
    pub fn new() -> Self {
        Self {
            visible: true,
            collapsed: false,
        }
    }

    /// Render the status pane as a floating window
    pub fn render(&mut self, ctx: &egui::Context, status: &FeedStatus) {
        if !self.visible {
            // Small button to re-open the pane when hidden
            egui::Window::new("show_status")
                .title_bar(false)
                .anchor(egui::Align2::LEFT_BOTTOM, egui::vec2(10.0, -10.0))
                .fixed_size(egui::vec2(140.0, 35.0))
                .resizable(false)
                .frame(egui::Frame::window(&ctx.style())
                    .fill(egui::Color32::from_rgba_unmultiplied(25, 30, 35, 200))
                    .stroke(egui::Stroke::new(1.0, egui::Color32::from_rgb(60, 80, 100)))
                    .corner_radius(6.0))
                .show(ctx, |ui| {
                    if ui.button(egui::RichText::new("📊 Show Status")
                        .color(egui::Color32::from_rgb(150, 200, 220))
                        .size(11.0))
                        .clicked() {
                        self.visible = true;
                    }
                });
            return;
        }

        egui::Window::new("Feed Status")
            .anchor(egui::Align2::LEFT_BOTTOM, egui::vec2(10.0, -10.0))
            .fixed_size(egui::vec2(304.0, if self.collapsed { 40.0 } else { 380.0 }))
            .resizable(false)
            .collapsible(false)
            .title_bar(false)
            .frame(egui::Frame::window(&ctx.style())
                .fill(egui::Color32::from_rgba_unmultiplied(25, 30, 35, 230))
                .stroke(egui::Stroke::new(1.0, egui::Color32::from_rgb(60, 80, 100)))
                .corner_radius(6.0))
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.label(egui::RichText::new("◈ FEED")
                        .color(egui::Color32::from_rgb(100, 180, 220))
                        .size(12.0)
                        .strong());

                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        if ui.button(egui::RichText::new("✕")
                            .size(12.0)
                            .color(egui::Color32::from_rgb(200, 100, 100)))
                            .on_hover_text("Hide status pane")
                            .clicked() {
                            self.visible = false;
                        }

                        ui.add_space(4.0);

                        let collapse_icon = if self.collapsed { "▼" } else { "▲" };
                        if ui.button(egui::RichText::new(collapse_icon).size(10.0))
                            .on_hover_text(if self.collapsed { "Expand" } else { "Collapse" })
                            .clicked() {
                            self.collapsed = !self.collapsed;
                        }
                    });
                });

                if self.collapsed {
                    return;
                }

                ui.separator();

                egui::ScrollArea::vertical()
                    .max_height(340.0)
                    .show(ui, |ui| {
                        render_feed_section(ui, status);
                        ui.add_space(6.0);
                        render_metrics_section(ui, status);
                        ui.add_space(6.0);
                        render_diagnostics_section(ui, status);
                    });
            });
    }
}

fn section_title(ui: &mut egui::Ui, title: &str) {
    ui.label(egui::RichText::new(title)
        .color(egui::Color32::from_rgb(150, 150, 150))
        .size(10.0)
        .strong());
    ui.add_space(3.0);
}

fn metric_row(ui: &mut egui::Ui, label: &str, value: String, color: egui::Color32) {
    ui.horizontal(|ui| {
        ui.label(egui::RichText::new(label)
            .color(egui::Color32::from_rgb(130, 130, 130))
            .size(9.0));
        ui.label(egui::RichText::new(value)
            .color(color)
            .size(9.0)
            .monospace());
    });
}

fn render_feed_section(ui: &mut egui::Ui, status: &FeedStatus) {
    section_title(ui, "SOURCE");

    ui.horizontal(|ui| {
        let (status_color, status_text, status_icon) = match (status.phase, &status.last_error) {
            (FetchPhase::Fetching, _) => {
                (egui::Color32::from_rgb(255, 200, 100), "FETCHING", "◐")
            }
            (FetchPhase::Idle, Some(_)) => (egui::Color32::from_rgb(255, 100, 100), "ERROR", "✕"),
            (FetchPhase::Idle, None) if status.last_update.is_some() => {
                (egui::Color32::from_rgb(100, 255, 100), "LIVE", "●")
            }
            (FetchPhase::Idle, None) => (egui::Color32::from_rgb(150, 150, 150), "WAITING", "○"),
        };

        ui.label(egui::RichText::new(status_icon)
            .color(status_color)
            .size(10.0));
        ui.label(egui::RichText::new(status_text)
            .color(status_color)
            .size(10.0)
            .monospace()
            .strong());
    });

    ui.label(egui::RichText::new(&status.feed_label)
        .color(egui::Color32::from_rgb(180, 180, 180))
        .size(8.0)
        .monospace());

    let updated = status.last_update.map_or_else(
        || "never".to_string(),
        |t| format_age((Utc::now() - t).to_std().unwrap_or_default()),
    );
    metric_row(ui, "Updated:", updated, egui::Color32::from_rgb(200, 200, 200));

    if let Some(error) = &status.last_error {
        ui.label(egui::RichText::new(error)
            .color(egui::Color32::from_rgb(255, 120, 120))
            .size(8.0));
    }
}

fn render_metrics_section(ui: &mut egui::Ui, status: &FeedStatus) {
    section_title(ui, "METRICS");

    let text = egui::Color32::from_rgb(200, 200, 200);
    metric_row(
        ui,
        "Aircraft:",
        format!("{} tracked / {} on map", status.aircraft_count, status.last_frame.drawn),
        text,
    );
    metric_row(
        ui,
        "Fetches:",
        format!(
            "{} issued, {} applied",
            status.fetches_issued, status.fetches_applied
        ),
        text,
    );
    metric_row(
        ui,
        "Dropped:",
        format!(
            "{} discarded, {} failed",
            status.fetches_discarded, status.fetches_failed
        ),
        text,
    );

    let failure_color = if status.consecutive_failures == 0 {
        egui::Color32::from_rgb(100, 255, 100)
    } else {
        egui::Color32::from_rgb(255, 100, 100)
    };
    metric_row(
        ui,
        "Failures:",
        format!("{} in a row, {} in flight", status.consecutive_failures, status.in_flight),
        failure_color,
    );
}

fn render_diagnostics_section(ui: &mut egui::Ui, status: &FeedStatus) {
    section_title(ui, "DIAGNOSTICS");

    if status.diagnostics.is_empty() {
        ui.label(egui::RichText::new("No messages")
            .color(egui::Color32::from_rgb(100, 100, 100))
            .size(8.0)
            .italics());
        return;
    }

    egui::ScrollArea::vertical()
        .id_salt("diagnostics")
        .max_height(14.0 * 8.0)
        .auto_shrink([false, true])
        .show(ui, |ui| {
            // Newest first
            for diagnostic in status.diagnostics.iter().rev() {
                ui.horizontal(|ui| {
                    let (icon, color) = match diagnostic.level {
                        DiagnosticLevel::Info => ("ℹ", egui::Color32::from_rgb(100, 180, 255)),
                        DiagnosticLevel::Warning => ("⚠", egui::Color32::from_rgb(255, 200, 100)),
                        DiagnosticLevel::Error => ("✕", egui::Color32::from_rgb(255, 100, 100)),
                    };

                    ui.label(egui::RichText::new(icon)
                        .color(color)
                        .size(9.0));

                    let time_str = diagnostic.timestamp.format("%H:%M:%S").to_string();
                    ui.label(egui::RichText::new(time_str)
                        .color(egui::Color32::from_rgb(100, 100, 100))
                        .size(8.0)
                        .monospace());

                    ui.label(egui::RichText::new(truncate(&diagnostic.message, MAX_MESSAGE_CHARS))
                        .color(egui::Color32::from_rgb(180, 180, 180))
                        .size(8.0))
                        .on_hover_text(&diagnostic.message);
                });
            }
        });
}

/// Shorten `message` to at most `max` characters, never splitting a char.
fn truncate(message: &str, max: usize) -> String {
    if message.chars().count() <= max {
        message.to_string()
    } else {
        let head: String = message.chars().take(max).collect();
        format!("{head}...")
    }
}

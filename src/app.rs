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

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use fleet_track::aircraft::format::format_age;
use fleet_track::{
    AircraftSnapshot, AircraftStatus, FetchPhase, MapOverlay, MapRenderer, RefreshEvent,
    RefreshScheduler, RenderError, SelectionState, SurfaceSize, TrackedSet, TrackerProps,
    Viewport,
};
use log::{debug, info, warn};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::source::FeedSource;
use crate::status::{DiagnosticLevel, FeedStatus};
use crate::status_pane::StatusPane;
use crate::surface::EguiSurface;

/// Scroll distance in points per zoom step.
const SCROLL_PER_ZOOM_STEP: f32 = 60.0;

/// The tracking window: toolbar, aircraft list, map and detail panel.
pub struct TrackerApp {
    config: AppConfig,
    props: TrackerProps,
    scheduler: RefreshScheduler<FeedSource>,
    events: broadcast::Receiver<RefreshEvent>,
    repaint_token: CancellationToken,
    renderer: MapRenderer,
    viewport: Viewport,
    selection: SelectionState,
    status: FeedStatus,
    status_pane: StatusPane,
    detail_open: bool,
    map_error: Option<RenderError>,
    scroll_accum: f32,
}

impl std::fmt::Debug for TrackerApp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackerApp")
            .field("props", &self.props)
            .field("viewport", &self.viewport)
            .field("selection", &self.selection)
            .finish_non_exhaustive()
    }
}

impl TrackerApp {
    /// Build the window around a running scheduler.
    ///
    /// Must be called inside the tokio runtime the scheduler runs on.
    pub fn new(
        ctx: &egui::Context,
        config: AppConfig,
        props: TrackerProps,
        scheduler: RefreshScheduler<FeedSource>,
        feed_label: String,
    ) -> Self {
        let repaint_token = CancellationToken::new();
        spawn_repaint_forwarder(ctx.clone(), scheduler.subscribe(), repaint_token.clone());

        let mut status = FeedStatus::new(feed_label);
        status.add_diagnostic(
            DiagnosticLevel::Info,
            format!("Tracking {}", describe_targets(&props)),
        );

        Self {
            viewport: Viewport::new(config.zoom_range()),
            events: scheduler.events(),
            config,
            props,
            scheduler,
            repaint_token,
            renderer: MapRenderer::default(),
            selection: SelectionState::new(),
            status,
            status_pane: StatusPane::new(),
            detail_open: false,
            map_error: None,
            scroll_accum: 0.0,
        }
    }

    /// Called when the user picks an aircraft on the map or in the list.
    fn on_aircraft_select(&mut self, aircraft: &AircraftSnapshot) {
        info!(
            "Selected {} ({}) at {}",
            aircraft.display_name(),
            aircraft.id,
            aircraft.formatted_position()
        );
        self.detail_open = true;
    }

    fn drain_events(&mut self) {
        loop {
            match self.events.try_recv() {
                Ok(event) => self.status.record_event(&event),
                Err(TryRecvError::Lagged(missed)) => {
                    self.status.add_diagnostic(
                        DiagnosticLevel::Warning,
                        format!("Missed {missed} feed events"),
                    );
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }
        self.status.sync(&self.scheduler.status());
    }

    fn render_toolbar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.label(egui::RichText::new("✈ Fleet Tracker").strong());
            ui.separator();

            if ui.button("⟳ Refresh").on_hover_text("Fetch positions now").clicked() {
                if let Some(seq) = self.scheduler.refresh() {
                    debug!("Manual refresh issued fetch #{seq}");
                }
            }

            let cadence = if self.props.auto_refresh {
                format!("every {}s", self.props.refresh_interval.as_secs())
            } else {
                "auto refresh off".to_string()
            };
            ui.label(egui::RichText::new(cadence).weak());

            ui.separator();
            ui.checkbox(&mut self.props.show_map, "Map");

            if self.props.show_map {
                if ui.button("−").on_hover_text("Zoom out").clicked() {
                    self.viewport.zoom_out();
                }
                ui.label(format!("z{}", self.viewport.zoom()));
                if ui.button("+").on_hover_text("Zoom in").clicked() {
                    self.viewport.zoom_in();
                }
                if ui.button("Reset").on_hover_text("Whole world").clicked() {
                    self.viewport.reset();
                }
            }

            ui.separator();

            if self.status.phase == FetchPhase::Fetching {
                ui.spinner();
            }

            if let Some(error) = &self.status.last_error {
                ui.colored_label(egui::Color32::from_rgb(255, 120, 120), format!("⚠ {error}"))
                    .on_hover_text("Showing the last good positions");
            } else if let Some(updated) = self.status.last_update {
                ui.label(format!("Updated {}", updated.format("%H:%M:%S UTC")));
            } else {
                ui.label("Waiting for first update...");
            }
        });
    }

    fn render_aircraft_list(&mut self, ui: &mut egui::Ui, set: &TrackedSet) {
        ui.heading(format!("Aircraft ({})", set.len()));
        ui.separator();

        if set.is_empty() {
            let message = if self.status.last_update.is_some() {
                "No aircraft in feed"
            } else {
                "Waiting for first update..."
            };
            ui.label(egui::RichText::new(message).italics().weak());
            return;
        }

        let now = Utc::now();
        let mut clicked = None;

        egui::ScrollArea::vertical().show(ui, |ui| {
            for aircraft in set.iter() {
                let text = format!(
                    "{:<8} {:>10} {:>8}",
                    aircraft.display_name(),
                    aircraft.formatted_altitude(),
                    aircraft.status.label()
                );
                let response = ui
                    .selectable_label(
                        self.selection.is_selected(&aircraft.id),
                        egui::RichText::new(text)
                            .monospace()
                            .color(status_color(aircraft.status)),
                    )
                    .on_hover_text(format!(
                        "{}\nseen {}",
                        aircraft.formatted_position(),
                        format_age(aircraft.age(now))
                    ));
                if response.clicked() {
                    clicked = Some(aircraft);
                }
            }
        });

        if let Some(aircraft) = clicked {
            self.selection.select(aircraft.id.clone());
            self.on_aircraft_select(aircraft);
        }
    }

    fn render_detail(&mut self, ui: &mut egui::Ui, set: &TrackedSet) {
        let mut close = false;
        ui.horizontal(|ui| {
            ui.heading("Details");
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if ui.button("✕").on_hover_text("Deselect").clicked() {
                    close = true;
                }
            });
        });
        ui.separator();

        match (self.selection.resolve(set), self.selection.selected_id()) {
            (Some(aircraft), _) => render_detail_grid(ui, aircraft),
            (None, Some(id)) => {
                ui.label(egui::RichText::new(format!("{id} is no longer in feed")).italics());
            }
            (None, None) => {
                ui.label(egui::RichText::new("Click an aircraft to see details").weak());
            }
        }

        if close {
            self.selection.clear();
            self.detail_open = false;
        }
    }

    fn render_map(&mut self, ui: &mut egui::Ui, set: &TrackedSet) {
        let (response, painter) =
            ui.allocate_painter(ui.available_size(), egui::Sense::click_and_drag());
        let rect = response.rect;

        let overlay = MapOverlay {
            last_update: self.status.last_update,
            error: self.status.last_error.clone(),
        };
        let mut surface = EguiSurface::new(&painter, rect);
        match self
            .renderer
            .render(&mut surface, set, &self.selection, &self.viewport, &overlay)
        {
            Ok(stats) => {
                self.status.last_frame = stats;
                self.map_error = None;
            }
            Err(e) => {
                if self.map_error.is_none() {
                    warn!("Map unavailable: {e}");
                }
                self.map_error = Some(e);
                painter.text(
                    rect.center(),
                    egui::Align2::CENTER_CENTER,
                    "Map unavailable",
                    egui::FontId::proportional(14.0),
                    egui::Color32::GRAY,
                );
                return;
            }
        }

        let size = SurfaceSize::new(f64::from(rect.width()), f64::from(rect.height()));

        if response.dragged() {
            let delta = response.drag_delta();
            self.viewport
                .pan_pixels(f64::from(delta.x), f64::from(delta.y), size);
        }

        if response.hovered() {
            self.scroll_accum += ui.input(|i| i.smooth_scroll_delta.y);
            if self.scroll_accum >= SCROLL_PER_ZOOM_STEP {
                self.viewport.zoom_in();
                self.scroll_accum = 0.0;
            } else if self.scroll_accum <= -SCROLL_PER_ZOOM_STEP {
                self.viewport.zoom_out();
                self.scroll_accum = 0.0;
            }
        }

        if response.clicked() {
            if let Some(pos) = response.interact_pointer_pos() {
                let click = EguiSurface::to_screen_point(rect, pos);
                let projection = self.viewport.projection(size);
                let hit = self
                    .selection
                    .handle_click(set, &projection, click, self.config.hit_radius_px);
                if let Some(aircraft) = hit {
                    self.on_aircraft_select(aircraft);
                }
            }
        }
    }
}

impl eframe::App for TrackerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_events();
        let set: Arc<TrackedSet> = self.scheduler.tracked();

        if ctx.input(|i| i.key_pressed(egui::Key::Escape)) {
            self.selection.clear();
            self.detail_open = false;
        }

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            self.render_toolbar(ui);
        });

        egui::SidePanel::left("aircraft_list")
            .resizable(true)
            .default_width(320.0)
            .show(ctx, |ui| {
                self.render_aircraft_list(ui, &set);
            });

        if self.detail_open {
            egui::SidePanel::right("aircraft_detail")
                .resizable(true)
                .default_width(260.0)
                .show(ctx, |ui| {
                    self.render_detail(ui, &set);
                });
        }

        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| {
                if self.props.show_map {
                    self.render_map(ui, &set);
                } else {
                    ui.centered_and_justified(|ui| {
                        ui.label(egui::RichText::new("Map hidden").weak());
                    });
                }
            });

        self.status_pane.render(ctx, &self.status);

        // Ages in the list keep ticking between feed updates
        ctx.request_repaint_after(Duration::from_secs(1));
    }
}

impl Drop for TrackerApp {
    fn drop(&mut self) {
        info!("Closing tracker window");
        self.repaint_token.cancel();
        self.selection.clear();
        self.scheduler.stop();
    }
}

/// Wake the UI whenever the scheduler publishes a new set.
fn spawn_repaint_forwarder(
    ctx: egui::Context,
    mut updates: watch::Receiver<Arc<TrackedSet>>,
    cancel_token: CancellationToken,
) {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                changed = updates.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    ctx.request_repaint();
                }
                () = cancel_token.cancelled() => break,
            }
        }
    });
}

fn render_detail_grid(ui: &mut egui::Ui, aircraft: &AircraftSnapshot) {
    let now = Utc::now();
    let optional = |value: &Option<String>| value.clone().unwrap_or_else(|| "-".to_string());

    egui::Grid::new("detail_grid")
        .num_columns(2)
        .striped(true)
        .show(ui, |ui| {
            let mut row = |label: &str, value: String| {
                ui.label(egui::RichText::new(label).weak());
                ui.label(egui::RichText::new(value).monospace());
                ui.end_row();
            };

            row("Callsign", aircraft.display_name().to_string());
            row("ICAO", aircraft.id.clone());
            row("Tail", optional(&aircraft.tail_number));
            row("Status", aircraft.status.label().to_string());
            row("Altitude", aircraft.formatted_altitude());
            row("Speed", aircraft.formatted_speed());
            row("Vertical", aircraft.formatted_vertical_rate());
            row("Heading", aircraft.formatted_heading());
            row("Position", aircraft.formatted_position());
            row("Squawk", optional(&aircraft.squawk));
            row("Type", optional(&aircraft.aircraft_type));
            row("Flight", optional(&aircraft.flight_number));
            row("Country", optional(&aircraft.country));
            row("Seen", format_age(aircraft.age(now)));
        });
}

fn status_color(status: AircraftStatus) -> egui::Color32 {
    match status {
        AircraftStatus::Tracking => egui::Color32::from_rgb(120, 220, 120),
        AircraftStatus::Ground => egui::Color32::from_rgb(150, 180, 220),
        AircraftStatus::Offline => egui::Color32::from_rgb(150, 150, 150),
        AircraftStatus::Error => egui::Color32::from_rgb(255, 120, 120),
    }
}

fn describe_targets(props: &TrackerProps) -> String {
    if props.tail_numbers.is_empty() {
        "all aircraft in region".to_string()
    } else {
        props.tail_numbers.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_targets() {
        assert_eq!(describe_targets(&TrackerProps::default()), "all aircraft in region");

        let props = TrackerProps {
            tail_numbers: vec!["N1AB".to_string(), "N2CD".to_string()],
            ..Default::default()
        };
        assert_eq!(describe_targets(&props), "N1AB, N2CD");
    }
}

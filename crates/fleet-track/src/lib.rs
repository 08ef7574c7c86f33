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

//! Live position tracking for a fleet of aircraft.
//!
//! This library polls a position feed, keeps the latest set of aircraft
//! snapshots, and projects them onto a 2D surface for display and
//! pointer selection. It is split into layers that can be used on their own:
//!
//! - **Feed layer**: [`PositionSource`] adapters that turn a raw feed into
//!   normalized [`AircraftSnapshot`]s
//! - **Scheduler layer**: [`RefreshScheduler`] with timed and manual
//!   refreshes where the most recently issued fetch always wins
//! - **View layer**: equirectangular [`projection`], a surface-agnostic
//!   [`MapRenderer`] and [`selection`] hit-testing
//!
//! # Quick Start
//!
//! ```no_run
//! use fleet_track::{RefreshScheduler, StaticSource, TrackerProps};
//!
//! #[tokio::main]
//! async fn main() {
//!     let props = TrackerProps {
//!         tail_numbers: vec!["N1AB".to_string()],
//!         ..Default::default()
//!     };
//!     let config = props.scheduler_config().expect("valid props");
//!     let scheduler = RefreshScheduler::start(StaticSource::demo(), config).expect("started");
//!
//!     let mut updates = scheduler.subscribe();
//!     while updates.changed().await.is_ok() {
//!         for aircraft in updates.borrow_and_update().iter() {
//!             println!("{}: {}", aircraft.display_name(), aircraft.formatted_altitude());
//!         }
//!     }
//! }
//! ```
//!
//! # Hit-testing a click
//!
//! ```
//! use chrono::Utc;
//! use fleet_track::projection::{SurfaceSize, Viewport};
//! use fleet_track::selection::{SelectionState, HIT_RADIUS_PX};
//! use fleet_track::{AircraftSnapshot, AircraftStatus, TrackedSet};
//!
//! let mut aircraft = AircraftSnapshot::unresolved("N1AB", Utc::now());
//! aircraft.latitude = 40.0;
//! aircraft.longitude = -74.0;
//! aircraft.status = AircraftStatus::Tracking;
//! let set = TrackedSet::new(vec![aircraft], 1, Utc::now());
//!
//! let projection = Viewport::default().projection(SurfaceSize::new(720.0, 360.0));
//! let click = projection.project(40.0, -74.0);
//!
//! let mut selection = SelectionState::new();
//! let hit = selection.handle_click(&set, &projection, click, HIT_RADIUS_PX);
//! assert_eq!(hit.map(|a| a.id.as_str()), Some("N1AB"));
//! ```

pub mod aircraft;
pub mod feed;
pub mod projection;
pub mod render;
pub mod scheduler;
pub mod selection;

use std::time::Duration;

pub use aircraft::{AircraftSnapshot, AircraftStatus, TrackedSet, STALE_THRESHOLD};
pub use feed::{
    FeedError, FeedFilter, NormalizeOptions, OpenSkyConfig, OpenSkySource, PositionSource,
    RawAircraftRecord, Region, ResolutionMode, StaticSource,
};
pub use projection::{Projection, ScreenPoint, SurfaceSize, Viewport, ZoomRange};
pub use render::{
    Color, FrameStats, MapOverlay, MapRenderer, Palette, RenderError, Surface, TextAnchor,
};
pub use scheduler::{
    BackoffPolicy, ConfigError, FetchPhase, FetchTrigger, RefreshEvent, RefreshScheduler,
    RefreshStatus, SchedulerConfig,
};
pub use selection::{hit_test, SelectionState, HIT_RADIUS_PX};

/// Inputs of a tracking view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerProps {
    /// Tail numbers, callsigns or ICAO ids to follow. Empty tracks every
    /// aircraft in the default region.
    pub tail_numbers: Vec<String>,
    pub auto_refresh: bool,
    pub refresh_interval: Duration,
    /// Whether the map is shown alongside the list.
    pub show_map: bool,
}

impl Default for TrackerProps {
    fn default() -> Self {
        Self {
            tail_numbers: Vec::new(),
            auto_refresh: true,
            refresh_interval: Duration::from_secs(30),
            show_map: true,
        }
    }
}

impl TrackerProps {
    /// Feed filter for the configured tail numbers, if any.
    #[must_use]
    pub fn filter(&self) -> Option<FeedFilter> {
        FeedFilter::from_ids(&self.tail_numbers)
    }

    /// Scheduler settings for these props.
    pub fn scheduler_config(&self) -> Result<SchedulerConfig, ConfigError> {
        let config = SchedulerConfig {
            filter: self.filter(),
            auto_refresh: self.auto_refresh,
            refresh_interval: self.refresh_interval,
            ..Default::default()
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_tail_numbers_track_region() {
        let props = TrackerProps::default();
        assert!(props.filter().is_none());
        assert!(props.scheduler_config().unwrap().filter.is_none());
    }

    #[test]
    fn test_tail_numbers_become_filter() {
        let props = TrackerProps {
            tail_numbers: vec!["N1AB".to_string(), " n2cd ".to_string()],
            auto_refresh: false,
            ..Default::default()
        };
        let config = props.scheduler_config().unwrap();
        assert!(!config.auto_refresh);
        assert_eq!(config.filter, props.filter());
        assert!(config.filter.is_some());
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let props = TrackerProps {
            refresh_interval: Duration::ZERO,
            ..Default::default()
        };
        assert_eq!(props.scheduler_config().unwrap_err(), ConfigError::InvalidInterval);
    }
}

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

//! Position source adapters.
//!
//! This module provides a trait-based abstraction over live position feeds.
//! Every feed-specific shape assumption stays behind [`RawAircraftRecord`];
//! the rest of the crate only sees normalized [`AircraftSnapshot`]s.
//!
//! Adapters never retry and never cache. Retry cadence belongs to the
//! [`RefreshScheduler`](crate::scheduler::RefreshScheduler).

mod opensky;

pub use opensky::{OpenSkyConfig, OpenSkySource, Region, DEFAULT_FEED_URL};

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, warn};
use thiserror::Error;

use crate::aircraft::{classify_status, wrap_heading, AircraftSnapshot, STALE_THRESHOLD};

/// Errors a position feed can report.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FeedError {
    /// Network failure, timeout or non-success HTTP status.
    #[error("feed unavailable: {0}")]
    Unavailable(String),

    /// The feed answered but the body could not be decoded.
    #[error("malformed feed response: {0}")]
    Malformed(String),
}

/// Restricts a fetch to specific aircraft.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedFilter {
    /// Requested ids. Each one may match an id, tail number or callsign.
    pub ids: Vec<String>,
}

impl FeedFilter {
    /// Build a filter, or `None` when there is nothing to filter on.
    #[must_use]
    pub fn from_ids<I, S>(ids: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let ids: Vec<String> = ids
            .into_iter()
            .map(|id| id.as_ref().trim().to_string())
            .filter(|id| !id.is_empty())
            .collect();
        if ids.is_empty() {
            None
        } else {
            Some(Self { ids })
        }
    }
}

/// How requested ids missing from a response are reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResolutionMode {
    /// Missing ids are simply absent from the result.
    #[default]
    OmitMissing,
    /// Missing ids produce an [`AircraftStatus::Error`](crate::AircraftStatus::Error) placeholder.
    ReportErrors,
}

/// Options shared by all adapters when normalizing a batch.
#[derive(Debug, Clone, Copy)]
pub struct NormalizeOptions {
    pub resolution: ResolutionMode,
    pub stale_after: Duration,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            resolution: ResolutionMode::default(),
            stale_after: STALE_THRESHOLD,
        }
    }
}

/// A feed record before normalization. Every field may be missing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawAircraftRecord {
    pub id: Option<String>,
    pub callsign: Option<String>,
    pub tail_number: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Feet.
    pub altitude: Option<f64>,
    /// Knots.
    pub speed: Option<f64>,
    /// Degrees, any range.
    pub heading: Option<f64>,
    /// Feet per minute.
    pub vertical_rate: Option<f64>,
    pub on_ground: Option<bool>,
    pub squawk: Option<String>,
    pub aircraft_type: Option<String>,
    pub flight_number: Option<String>,
    pub country: Option<String>,
    /// Epoch milliseconds.
    pub timestamp: Option<i64>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn finite_or_zero(value: Option<f64>) -> f64 {
    value.filter(|v| v.is_finite()).unwrap_or(0.0)
}

impl RawAircraftRecord {
    /// Normalize one record.
    ///
    /// Returns `None` when the record has no id or no usable position.
    #[must_use]
    pub fn normalize(self, now: DateTime<Utc>, stale_after: Duration) -> Option<AircraftSnapshot> {
        let id = non_empty(self.id)?;

        let (Some(latitude), Some(longitude)) = (self.latitude, self.longitude) else {
            debug!("Dropping {id}: no position");
            return None;
        };
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            warn!("Dropping {id}: position out of range ({latitude}, {longitude})");
            return None;
        }

        let on_ground = self.on_ground.unwrap_or(false);
        let timestamp = self.timestamp.unwrap_or_else(|| now.timestamp_millis());
        let status = classify_status(on_ground, timestamp, now, stale_after);

        Some(AircraftSnapshot {
            callsign: non_empty(self.callsign).unwrap_or_default(),
            tail_number: non_empty(self.tail_number),
            latitude,
            longitude,
            altitude: finite_or_zero(self.altitude),
            speed: finite_or_zero(self.speed).max(0.0),
            heading: wrap_heading(finite_or_zero(self.heading)),
            vertical_rate: finite_or_zero(self.vertical_rate),
            on_ground,
            squawk: non_empty(self.squawk),
            aircraft_type: non_empty(self.aircraft_type),
            flight_number: non_empty(self.flight_number),
            country: non_empty(self.country),
            timestamp,
            status,
            id,
        })
    }
}

/// Normalize a raw batch, apply the filter and resolve missing ids.
///
/// Output order is feed order, followed by error placeholders in request
/// order when [`ResolutionMode::ReportErrors`] is used.
#[must_use]
pub fn normalize_records(
    records: Vec<RawAircraftRecord>,
    filter: Option<&FeedFilter>,
    now: DateTime<Utc>,
    options: NormalizeOptions,
) -> Vec<AircraftSnapshot> {
    let mut snapshots: Vec<AircraftSnapshot> = records
        .into_iter()
        .filter_map(|record| record.normalize(now, options.stale_after))
        .collect();

    let Some(filter) = filter else {
        return snapshots;
    };

    snapshots.retain(|snapshot| filter.ids.iter().any(|id| snapshot.matches_id(id)));

    let missing: Vec<&String> = filter
        .ids
        .iter()
        .filter(|id| !snapshots.iter().any(|s| s.matches_id(id)))
        .collect();

    if !missing.is_empty() {
        debug!("{} requested aircraft not in feed: {:?}", missing.len(), missing);
        if options.resolution == ResolutionMode::ReportErrors {
            snapshots.extend(
                missing
                    .into_iter()
                    .map(|id| AircraftSnapshot::unresolved(id, now)),
            );
        }
    }

    snapshots
}

/// A live position feed.
///
/// Implement this trait to plug in a new upstream source. A fetch is a full
/// fetch-and-normalize pass; partial results are not an error.
pub trait PositionSource: Send + Sync + 'static {
    /// Fetch the current positions, optionally restricted to `filter`.
    fn fetch_positions(
        &self,
        filter: Option<&FeedFilter>,
    ) -> impl Future<Output = Result<Vec<AircraftSnapshot>, FeedError>> + Send;
}

/// In-memory source that replays a fixed batch with fresh timestamps.
///
/// Used by the desktop demo mode when no network feed is wanted.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    records: Vec<RawAircraftRecord>,
    options: NormalizeOptions,
}

impl StaticSource {
    #[must_use]
    pub fn new(records: Vec<RawAircraftRecord>) -> Self {
        Self {
            records,
            options: NormalizeOptions::default(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: NormalizeOptions) -> Self {
        self.options = options;
        self
    }

    /// A handful of aircraft spread over North America and Europe.
    #[must_use]
    pub fn demo() -> Self {
        let record = |[id, callsign, tail]: [&str; 3], [lat, lon, alt, spd, hdg]: [f64; 5]| {
            RawAircraftRecord {
                id: Some(id.to_string()),
                callsign: Some(callsign.to_string()),
                tail_number: Some(tail.to_string()),
                latitude: Some(lat),
                longitude: Some(lon),
                altitude: Some(alt),
                speed: Some(spd),
                heading: Some(hdg),
                vertical_rate: Some(0.0),
                on_ground: Some(alt <= 0.0),
                ..Default::default()
            }
        };

        Self::new(vec![
            record(["a0b1c2", "EJA512", "N512QS"], [40.64, -73.78, 0.0, 0.0, 310.0]),
            record(["a3d4e5", "EJA780", "N780QS"], [39.2, -95.4, 41_000.0, 472.0, 265.0]),
            record(["a6f7a8", "LXJ301", "N301FX"], [34.1, -118.2, 12_500.0, 310.0, 80.0]),
            record(["400a1b", "VJT411", "9H-VFA"], [51.47, -0.45, 23_000.0, 405.0, 135.0]),
            record(["c0ffee", "JRE22", "C-GJRE"], [45.9, -63.0, 37_000.0, 455.0, 55.0]),
        ])
    }
}

impl PositionSource for StaticSource {
    async fn fetch_positions(
        &self,
        filter: Option<&FeedFilter>,
    ) -> Result<Vec<AircraftSnapshot>, FeedError> {
        let now = Utc::now();
        let records = self
            .records
            .iter()
            .cloned()
            .map(|mut record| {
                record.timestamp = Some(now.timestamp_millis());
                record
            })
            .collect();
        Ok(normalize_records(records, filter, now, self.options))
    }
}

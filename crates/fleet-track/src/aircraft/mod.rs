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

//! Aircraft entity model.
//!
//! This module defines the normalized [`AircraftSnapshot`] produced by the feed
//! adapter, its derived [`AircraftStatus`], and the [`TrackedSet`] that the
//! refresh scheduler publishes as one immutable unit per refresh cycle.

pub mod format;

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Age after which an airborne aircraft is considered offline.
pub const STALE_THRESHOLD: Duration = Duration::from_secs(120);

/// Derived live state of a tracked aircraft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AircraftStatus {
    /// Airborne with a fresh observation.
    Tracking,
    /// Reported on the ground.
    Ground,
    /// No observation within the staleness window.
    Offline,
    /// The feed could not resolve a requested aircraft at all.
    Error,
}

impl AircraftStatus {
    /// Short lowercase label for list and detail views.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Tracking => "tracking",
            Self::Ground => "ground",
            Self::Offline => "offline",
            Self::Error => "error",
        }
    }
}

/// Wrap a heading into `[0, 360)`. Non-finite input becomes 0.
#[must_use]
pub fn wrap_heading(degrees: f64) -> f64 {
    if !degrees.is_finite() {
        return 0.0;
    }
    // rem_euclid rounds tiny negatives up to exactly 360.0
    let wrapped = degrees.rem_euclid(360.0);
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Classify an observation.
///
/// `on_ground` wins over freshness. Otherwise an observation older than
/// `stale_after` is offline. A timestamp in the future counts as fresh.
#[must_use]
pub fn classify_status(
    on_ground: bool,
    timestamp_ms: i64,
    now: DateTime<Utc>,
    stale_after: Duration,
) -> AircraftStatus {
    if on_ground {
        return AircraftStatus::Ground;
    }

    let age_ms = now.timestamp_millis().saturating_sub(timestamp_ms);
    let stale_ms = i64::try_from(stale_after.as_millis()).unwrap_or(i64::MAX);
    if age_ms > stale_ms {
        AircraftStatus::Offline
    } else {
        AircraftStatus::Tracking
    }
}

/// One normalized observation of an aircraft.
#[derive(Debug, Clone, PartialEq)]
pub struct AircraftSnapshot {
    /// Feed-assigned identifier, unique within a [`TrackedSet`].
    pub id: String,
    /// Display callsign (trimmed).
    pub callsign: String,
    /// Registration, when the feed can resolve it.
    pub tail_number: Option<String>,
    /// Latitude in degrees, `-90..=90`.
    pub latitude: f64,
    /// Longitude in degrees, `-180..=180`.
    pub longitude: f64,
    /// Altitude in feet. May be slightly negative; formatting clamps to 0.
    pub altitude: f64,
    /// Ground speed in knots.
    pub speed: f64,
    /// True heading in degrees, `[0, 360)`.
    pub heading: f64,
    /// Vertical rate in feet per minute (positive = climb).
    pub vertical_rate: f64,
    pub on_ground: bool,
    pub squawk: Option<String>,
    pub aircraft_type: Option<String>,
    pub flight_number: Option<String>,
    pub country: Option<String>,
    /// Observation time in epoch milliseconds.
    pub timestamp: i64,
    pub status: AircraftStatus,
}

impl AircraftSnapshot {
    /// Placeholder for a requested id the feed did not resolve.
    #[must_use]
    pub fn unresolved(id: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: id.to_string(),
            callsign: id.to_string(),
            tail_number: None,
            latitude: 0.0,
            longitude: 0.0,
            altitude: 0.0,
            speed: 0.0,
            heading: 0.0,
            vertical_rate: 0.0,
            on_ground: false,
            squawk: None,
            aircraft_type: None,
            flight_number: None,
            country: None,
            timestamp: now.timestamp_millis(),
            status: AircraftStatus::Error,
        }
    }

    /// Best human-facing name: callsign, then tail number, then id.
    #[must_use]
    pub fn display_name(&self) -> &str {
        if !self.callsign.is_empty() {
            &self.callsign
        } else if let Some(tail) = self.tail_number.as_deref() {
            tail
        } else {
            &self.id
        }
    }

    /// Whether this snapshot answers a requested identifier.
    ///
    /// Matches the id, tail number or callsign, ignoring case and surrounding
    /// whitespace.
    #[must_use]
    pub fn matches_id(&self, requested: &str) -> bool {
        let requested = requested.trim();
        if requested.is_empty() {
            return false;
        }
        self.id.eq_ignore_ascii_case(requested)
            || self.callsign.eq_ignore_ascii_case(requested)
            || self
                .tail_number
                .as_deref()
                .is_some_and(|tail| tail.eq_ignore_ascii_case(requested))
    }

    /// Whether the position can be placed on a map.
    #[must_use]
    pub fn has_position(&self) -> bool {
        self.status != AircraftStatus::Error
    }

    /// Age of the observation relative to `now`.
    #[must_use]
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        let age_ms = now.timestamp_millis().saturating_sub(self.timestamp).max(0);
        Duration::from_millis(u64::try_from(age_ms).unwrap_or(0))
    }
}

/// The current mapping of tracked aircraft.
///
/// A set is built once from a normalized batch and then only read. The
/// scheduler swaps the whole set; it is never patched in place.
#[derive(Debug, Clone, Default)]
pub struct TrackedSet {
    aircraft: Vec<AircraftSnapshot>,
    index: HashMap<String, usize>,
    generation: u64,
    applied_at: Option<DateTime<Utc>>,
}

impl TrackedSet {
    /// Build a set from a normalized batch.
    ///
    /// Order follows the batch. A repeated id keeps its first position and
    /// takes the later snapshot.
    #[must_use]
    pub fn new(
        snapshots: Vec<AircraftSnapshot>,
        generation: u64,
        applied_at: DateTime<Utc>,
    ) -> Self {
        let mut aircraft: Vec<AircraftSnapshot> = Vec::with_capacity(snapshots.len());
        let mut index = HashMap::with_capacity(snapshots.len());

        for snapshot in snapshots {
            if let Some(&slot) = index.get(&snapshot.id) {
                aircraft[slot] = snapshot;
            } else {
                index.insert(snapshot.id.clone(), aircraft.len());
                aircraft.push(snapshot);
            }
        }

        Self {
            aircraft,
            index,
            generation,
            applied_at: Some(applied_at),
        }
    }

    /// Sequence number of the fetch that produced this set (0 = initial empty set).
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// When the set was published.
    #[must_use]
    pub fn applied_at(&self) -> Option<DateTime<Utc>> {
        self.applied_at
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&AircraftSnapshot> {
        self.index.get(id).map(|&slot| &self.aircraft[slot])
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Snapshots in normalization order.
    pub fn iter(&self) -> impl Iterator<Item = &AircraftSnapshot> {
        self.aircraft.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.aircraft.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.aircraft.is_empty()
    }

    /// Number of aircraft with the given status.
    #[must_use]
    pub fn count_by_status(&self, status: AircraftStatus) -> usize {
        self.aircraft.iter().filter(|a| a.status == status).count()
    }
}

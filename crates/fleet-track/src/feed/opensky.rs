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

//! OpenSky-compatible `states/all` adapter.
//!
//! Response format:
//! ```text
//! {"time": <secs>, "states": [[icao24, callsign, origin_country, time_position,
//!   last_contact, longitude, latitude, baro_altitude, on_ground, velocity,
//!   true_track, vertical_rate, sensors, geo_altitude, squawk, spi, position_source], ...]}
//! ```
//!
//! Altitudes are metres, speeds metres per second and times epoch seconds.

use std::time::Duration;

use chrono::Utc;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{
    normalize_records, FeedError, FeedFilter, NormalizeOptions, PositionSource, RawAircraftRecord,
};
use crate::aircraft::AircraftSnapshot;

const FEET_PER_METER: f64 = 3.280_84;
const KNOTS_PER_MPS: f64 = 1.943_844;
const FPM_PER_MPS: f64 = 196.850_4;

/// Default public endpoint.
pub const DEFAULT_FEED_URL: &str = "https://opensky-network.org/api/states/all";

/// Geographic bounding box used when no filter is given.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub lat_min: f64,
    pub lon_min: f64,
    pub lat_max: f64,
    pub lon_max: f64,
}

impl Default for Region {
    /// Continental United States.
    fn default() -> Self {
        Self {
            lat_min: 24.0,
            lon_min: -125.0,
            lat_max: 50.0,
            lon_max: -66.0,
        }
    }
}

/// Configuration for [`OpenSkySource`].
#[derive(Debug, Clone)]
pub struct OpenSkyConfig {
    /// Full `states/all` URL.
    pub url: String,
    /// Default region for unfiltered fetches.
    pub region: Region,
    /// Per-request timeout.
    pub timeout: Duration,
    pub normalize: NormalizeOptions,
}

impl Default for OpenSkyConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_FEED_URL.to_string(),
            region: Region::default(),
            timeout: Duration::from_secs(10),
            normalize: NormalizeOptions::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct StatesResponse {
    states: Option<Vec<Vec<Value>>>,
}

/// HTTP adapter for OpenSky-style feeds.
#[derive(Debug, Clone)]
pub struct OpenSkySource {
    client: reqwest::Client,
    config: OpenSkyConfig,
}

impl OpenSkySource {
    pub fn new(config: OpenSkyConfig) -> Result<Self, FeedError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| FeedError::Unavailable(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    /// Query URL for a fetch. Filtered fetches search the whole feed.
    fn request_url(&self, filter: Option<&FeedFilter>) -> String {
        if filter.is_some() {
            return self.config.url.clone();
        }
        let r = self.config.region;
        format!(
            "{}?lamin={}&lomin={}&lamax={}&lomax={}",
            self.config.url, r.lat_min, r.lon_min, r.lat_max, r.lon_max
        )
    }
}

impl PositionSource for OpenSkySource {
    async fn fetch_positions(
        &self,
        filter: Option<&FeedFilter>,
    ) -> Result<Vec<AircraftSnapshot>, FeedError> {
        let url = self.request_url(filter);
        info!("Fetching positions from {url}");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FeedError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(FeedError::Unavailable(format!(
                "HTTP error: {}",
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| FeedError::Unavailable(e.to_string()))?;

        let records = parse_states(&body)?;
        Ok(normalize_records(records, filter, Utc::now(), self.config.normalize))
    }
}

fn text_at(state: &[Value], index: usize) -> Option<String> {
    state.get(index).and_then(Value::as_str).map(str::to_string)
}

fn number_at(state: &[Value], index: usize) -> Option<f64> {
    state.get(index).and_then(Value::as_f64)
}

/// Decode a `states/all` body into raw records.
#[allow(
    clippy::cast_possible_truncation,
    reason = "epoch milliseconds from the feed fit in i64"
)]
pub(crate) fn parse_states(body: &str) -> Result<Vec<RawAircraftRecord>, FeedError> {
    let response: StatesResponse =
        serde_json::from_str(body).map_err(|e| FeedError::Malformed(e.to_string()))?;

    let Some(states) = response.states else {
        return Ok(Vec::new());
    };

    let mut records = Vec::with_capacity(states.len());
    for state in states {
        if state.len() < 12 {
            warn!("Skipping short state vector ({} fields)", state.len());
            continue;
        }

        let seen_secs = number_at(&state, 3).or_else(|| number_at(&state, 4));

        records.push(RawAircraftRecord {
            id: text_at(&state, 0),
            callsign: text_at(&state, 1),
            tail_number: None,
            country: text_at(&state, 2),
            longitude: number_at(&state, 5),
            latitude: number_at(&state, 6),
            altitude: number_at(&state, 7)
                .or_else(|| number_at(&state, 13))
                .map(|m| m * FEET_PER_METER),
            on_ground: state.get(8).and_then(Value::as_bool),
            speed: number_at(&state, 9).map(|v| v * KNOTS_PER_MPS),
            heading: number_at(&state, 10),
            vertical_rate: number_at(&state, 11).map(|v| v * FPM_PER_MPS),
            squawk: text_at(&state, 14),
            aircraft_type: None,
            flight_number: None,
            timestamp: seen_secs.map(|secs| (secs * 1000.0) as i64),
        });
    }

    Ok(records)
}

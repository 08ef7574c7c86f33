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

//! Application configuration management.
//!
//! Settings are stored as TOML through `confy`. Every field has a serde
//! default so that older or hand-edited files keep loading.

use std::time::Duration;

use fleet_track::feed::DEFAULT_FEED_URL;
use fleet_track::{
    BackoffPolicy, NormalizeOptions, OpenSkyConfig, Region, ResolutionMode, TrackerProps,
    ZoomRange, HIT_RADIUS_PX, STALE_THRESHOLD,
};
use log::{info, warn};
use serde::{Deserialize, Serialize};

const APP_NAME: &str = "fleet-tracker";
const CONFIG_NAME: &str = "config";

/// Current schema version.
pub const CONFIG_VERSION: u32 = 1;

/// Application configuration stored in TOML format
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AppConfig {
    /// Configuration schema version for migrations
    #[serde(default = "default_config_version")]
    pub config_version: u32,

    /// OpenSky-compatible `states/all` endpoint
    #[serde(default = "default_feed_url")]
    pub feed_url: String,

    /// Bounding box for unfiltered fetches
    #[serde(default)]
    pub region: Region,

    /// Aircraft to follow. Empty tracks everything in `region`.
    #[serde(default)]
    pub tail_numbers: Vec<String>,

    #[serde(default = "default_true")]
    pub auto_refresh: bool,

    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,

    #[serde(default = "default_true")]
    pub show_map: bool,

    /// Age after which an airborne aircraft is shown as offline
    #[serde(default = "default_stale_threshold_secs")]
    pub stale_threshold_secs: u64,

    /// Whether requested aircraft the feed cannot find are listed as errors
    #[serde(default)]
    pub report_missing: bool,

    #[serde(default = "default_hit_radius_px")]
    pub hit_radius_px: f64,

    #[serde(default = "default_zoom_min")]
    pub zoom_min: u8,

    #[serde(default = "default_zoom_max")]
    pub zoom_max: u8,

    /// Cap for exponential backoff after failures. 0 keeps a fixed cadence.
    #[serde(default)]
    pub backoff_max_secs: u64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

// Default value functions for serde
fn default_config_version() -> u32 {
    CONFIG_VERSION
}

fn default_feed_url() -> String {
    DEFAULT_FEED_URL.to_string()
}

fn default_true() -> bool {
    true
}

fn default_refresh_interval_secs() -> u64 {
    30
}

fn default_stale_threshold_secs() -> u64 {
    STALE_THRESHOLD.as_secs()
}

fn default_hit_radius_px() -> f64 {
    HIT_RADIUS_PX
}

fn default_zoom_min() -> u8 {
    ZoomRange::default().min
}

fn default_zoom_max() -> u8 {
    ZoomRange::default().max
}

fn default_request_timeout_secs() -> u64 {
    10
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            config_version: default_config_version(),
            feed_url: default_feed_url(),
            region: Region::default(),
            tail_numbers: Vec::new(),
            auto_refresh: true,
            refresh_interval_secs: default_refresh_interval_secs(),
            show_map: true,
            stale_threshold_secs: default_stale_threshold_secs(),
            report_missing: false,
            hit_radius_px: default_hit_radius_px(),
            zoom_min: default_zoom_min(),
            zoom_max: default_zoom_max(),
            backoff_max_secs: 0,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl AppConfig {
    /// Load configuration from disk, repairing values that cannot be used
    pub fn load() -> Result<Self, confy::ConfyError> {
        let mut config: AppConfig = confy::load(APP_NAME, CONFIG_NAME)?;

        if config.config_version < CONFIG_VERSION {
            info!(
                "Upgrading configuration from version {} to {}",
                config.config_version, CONFIG_VERSION
            );
            config.config_version = CONFIG_VERSION;
            config.sanitize();
            config.save()?;
        } else {
            config.sanitize();
        }

        Ok(config)
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<(), confy::ConfyError> {
        confy::store(APP_NAME, CONFIG_NAME, self)
    }

    /// Get the config file path for display to user
    pub fn get_config_path() -> Result<std::path::PathBuf, confy::ConfyError> {
        confy::get_configuration_file_path(APP_NAME, CONFIG_NAME)
    }

    /// Replace unusable values with defaults.
    pub fn sanitize(&mut self) {
        if self.refresh_interval_secs == 0 {
            warn!(
                "refresh_interval_secs must be positive, using {}",
                default_refresh_interval_secs()
            );
            self.refresh_interval_secs = default_refresh_interval_secs();
        }
        if self.request_timeout_secs == 0 {
            self.request_timeout_secs = default_request_timeout_secs();
        }
        if !self.hit_radius_px.is_finite() || self.hit_radius_px <= 0.0 {
            warn!("hit_radius_px must be positive, using {HIT_RADIUS_PX}");
            self.hit_radius_px = HIT_RADIUS_PX;
        }
        if self.zoom_min > self.zoom_max {
            warn!("zoom_min is above zoom_max, swapping them");
            std::mem::swap(&mut self.zoom_min, &mut self.zoom_max);
        }
        self.tail_numbers.retain(|t| !t.trim().is_empty());
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn zoom_range(&self) -> ZoomRange {
        ZoomRange::new(self.zoom_min, self.zoom_max)
    }

    pub fn backoff(&self) -> BackoffPolicy {
        if self.backoff_max_secs == 0 {
            BackoffPolicy::Fixed
        } else {
            BackoffPolicy::Exponential {
                max: Duration::from_secs(self.backoff_max_secs),
            }
        }
    }

    pub fn normalize_options(&self) -> NormalizeOptions {
        NormalizeOptions {
            resolution: if self.report_missing {
                ResolutionMode::ReportErrors
            } else {
                ResolutionMode::OmitMissing
            },
            stale_after: Duration::from_secs(self.stale_threshold_secs),
        }
    }

    pub fn opensky_config(&self) -> OpenSkyConfig {
        OpenSkyConfig {
            url: self.feed_url.clone(),
            region: self.region,
            timeout: Duration::from_secs(self.request_timeout_secs),
            normalize: self.normalize_options(),
        }
    }

    /// View props derived from this configuration.
    pub fn props(&self) -> TrackerProps {
        TrackerProps {
            tail_numbers: self.tail_numbers.clone(),
            auto_refresh: self.auto_refresh,
            refresh_interval: self.refresh_interval(),
            show_map: self.show_map,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config: AppConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.refresh_interval(), Duration::from_secs(30));
        assert_eq!(config.backoff(), BackoffPolicy::Fixed);
        assert_eq!(config.zoom_range(), ZoomRange::default());
    }

    #[test]
    fn test_sanitize_repairs_bad_values() {
        let mut config = AppConfig {
            refresh_interval_secs: 0,
            hit_radius_px: -1.0,
            zoom_min: 9,
            zoom_max: 2,
            tail_numbers: vec!["N1AB".to_string(), "  ".to_string()],
            ..Default::default()
        };
        config.sanitize();

        assert_eq!(config.refresh_interval_secs, 30);
        assert!((config.hit_radius_px - HIT_RADIUS_PX).abs() < f64::EPSILON);
        assert_eq!((config.zoom_min, config.zoom_max), (2, 9));
        assert_eq!(config.tail_numbers, vec!["N1AB".to_string()]);
        assert!(config.props().scheduler_config().is_ok());
    }

    #[test]
    fn test_backoff_and_resolution_settings() {
        let config = AppConfig {
            backoff_max_secs: 300,
            report_missing: true,
            stale_threshold_secs: 60,
            ..Default::default()
        };
        assert_eq!(
            config.backoff(),
            BackoffPolicy::Exponential {
                max: Duration::from_secs(300)
            }
        );

        let options = config.normalize_options();
        assert_eq!(options.resolution, ResolutionMode::ReportErrors);
        assert_eq!(options.stale_after, Duration::from_secs(60));
        assert_eq!(config.opensky_config().url, DEFAULT_FEED_URL);
    }
}

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

use fleet_track::{
    AircraftSnapshot, FeedError, FeedFilter, OpenSkySource, PositionSource, StaticSource,
};

use crate::config::AppConfig;

/// The position source picked at startup.
#[derive(Debug)]
pub enum FeedSource {
    Live(OpenSkySource),
    Demo(StaticSource),
}

impl FeedSource {
    pub fn from_config(config: &AppConfig, demo: bool) -> Result<Self, FeedError> {
        if demo {
            Ok(Self::Demo(
                StaticSource::demo().with_options(config.normalize_options()),
            ))
        } else {
            OpenSkySource::new(config.opensky_config()).map(Self::Live)
        }
    }

    /// Short description for the status pane.
    pub fn label(&self, config: &AppConfig) -> String {
        match self {
            Self::Live(_) => config.feed_url.clone(),
            Self::Demo(_) => "built-in demo feed".to_string(),
        }
    }
}

impl PositionSource for FeedSource {
    async fn fetch_positions(
        &self,
        filter: Option<&FeedFilter>,
    ) -> Result<Vec<AircraftSnapshot>, FeedError> {
        match self {
            Self::Live(source) => source.fetch_positions(filter).await,
            Self::Demo(source) => source.fetch_positions(filter).await,
        }
    }
}

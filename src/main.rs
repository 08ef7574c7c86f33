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

mod app;
mod config;
mod source;
mod status;
mod status_pane;
mod surface;

use std::process;

use clap::Parser;
use fleet_track::{RefreshScheduler, SchedulerConfig};
use log::{error, info, warn};

use app::TrackerApp;
use config::AppConfig;
use source::FeedSource;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser, Debug)]
#[command(name = "fleet-tracker")]
#[command(about = "Live position tracking for a fleet of aircraft", long_about = None)]
struct Args {
    /// Tail number, callsign or ICAO id to track (repeatable)
    #[arg(long = "tail", value_name = "ID")]
    tails: Vec<String>,

    /// Seconds between automatic refreshes
    #[arg(long, value_name = "SECS")]
    interval: Option<u64>,

    /// Fetch once at startup and then only on demand
    #[arg(long)]
    no_auto_refresh: bool,

    /// Start with the map hidden
    #[arg(long)]
    no_map: bool,

    /// OpenSky-compatible states endpoint
    #[arg(long, value_name = "URL")]
    feed_url: Option<String>,

    /// Use the built-in demo feed instead of the network
    #[arg(long)]
    demo: bool,

    /// Print the configuration file path and exit
    #[arg(long)]
    print_config_path: bool,
}

impl Args {
    /// Command-line values take precedence over the config file.
    fn apply(&self, config: &mut AppConfig) {
        if !self.tails.is_empty() {
            config.tail_numbers.clone_from(&self.tails);
        }
        if let Some(interval) = self.interval {
            config.refresh_interval_secs = interval;
        }
        if self.no_auto_refresh {
            config.auto_refresh = false;
        }
        if self.no_map {
            config.show_map = false;
        }
        if let Some(url) = &self.feed_url {
            config.feed_url.clone_from(url);
        }
    }
}

fn main() -> Result<(), eframe::Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if args.print_config_path {
        match AppConfig::get_config_path() {
            Ok(path) => println!("{}", path.display()),
            Err(e) => {
                eprintln!("Error resolving config path: {e}");
                process::exit(1);
            }
        }
        return Ok(());
    }

    info!("Starting Fleet Tracker...");

    let mut config = AppConfig::load().unwrap_or_else(|e| {
        warn!("Failed to load configuration, using defaults: {e}");
        AppConfig::default()
    });
    args.apply(&mut config);

    let props = config.props();
    let scheduler_config = match props.scheduler_config() {
        Ok(scheduler_config) => SchedulerConfig {
            backoff: config.backoff(),
            ..scheduler_config
        },
        Err(e) => {
            error!("Invalid refresh settings: {e}");
            process::exit(2);
        }
    };

    let source = match FeedSource::from_config(&config, args.demo) {
        Ok(source) => source,
        Err(e) => {
            error!("Failed to create position source: {e}");
            process::exit(1);
        }
    };
    let feed_label = source.label(&config);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start async runtime: {e}");
            process::exit(1);
        }
    };
    // Spawns from the UI thread land on this runtime
    let _guard = runtime.enter();

    let scheduler = match RefreshScheduler::start(source, scheduler_config) {
        Ok(scheduler) => scheduler,
        Err(e) => {
            error!("Failed to start refresh scheduler: {e}");
            process::exit(2);
        }
    };

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1400.0, 800.0])
            .with_title("Fleet Tracker"),
        ..Default::default()
    };

    eframe::run_native(
        "Fleet Tracker",
        options,
        Box::new(move |cc| {
            Ok(Box::new(TrackerApp::new(
                &cc.egui_ctx,
                config,
                props,
                scheduler,
                feed_label,
            )))
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let args = Args::try_parse_from([
            "fleet-tracker",
            "--tail",
            "N1AB",
            "--tail",
            "N2CD",
            "--interval",
            "15",
            "--no-auto-refresh",
            "--no-map",
            "--feed-url",
            "http://localhost:8080/api/states/all",
        ])
        .unwrap();

        let mut config = AppConfig::default();
        args.apply(&mut config);

        assert_eq!(config.tail_numbers, vec!["N1AB".to_string(), "N2CD".to_string()]);
        assert_eq!(config.refresh_interval_secs, 15);
        assert!(!config.auto_refresh);
        assert!(!config.show_map);
        assert_eq!(config.feed_url, "http://localhost:8080/api/states/all");
    }

    #[test]
    fn test_no_flags_keep_config() {
        let args = Args::try_parse_from(["fleet-tracker", "--demo"]).unwrap();
        assert!(args.demo);

        let mut config = AppConfig {
            tail_numbers: vec!["N9ZZ".to_string()],
            ..Default::default()
        };
        let before = config.clone();
        args.apply(&mut config);
        assert_eq!(config, before);
    }

    #[test]
    fn test_zero_interval_flag_is_rejected() {
        let args = Args::try_parse_from(["fleet-tracker", "--interval", "0"]).unwrap();
        let mut config = AppConfig::default();
        args.apply(&mut config);
        assert!(config.props().scheduler_config().is_err());
    }
}

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

//! Display formatting for aircraft fields.
//!
//! All helpers are pure and locale-independent apart from the unit suffix.

use std::time::Duration;

use super::{wrap_heading, AircraftSnapshot};

/// Insert comma thousands separators into an integer.
fn group_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);

    if value < 0 {
        grouped.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

/// `"10,000 ft"`. Below-ground readings display as 0.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    reason = "rounded display values are far inside the i64 range"
)]
pub fn format_altitude(feet: f64) -> String {
    let feet = if feet.is_finite() { feet.max(0.0) } else { 0.0 };
    format!("{} ft", group_thousands(feet.round() as i64))
}

/// `"450 kts"`.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    reason = "rounded display values are far inside the i64 range"
)]
pub fn format_speed(knots: f64) -> String {
    let knots = if knots.is_finite() { knots.max(0.0) } else { 0.0 };
    format!("{} kts", knots.round() as i64)
}

/// `"+1200 fpm"`, `"-800 fpm"` or `"0 fpm"`.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    reason = "rounded display values are far inside the i64 range"
)]
pub fn format_vertical_rate(fpm: f64) -> String {
    let rounded = if fpm.is_finite() { fpm.round() as i64 } else { 0 };
    match rounded {
        0 => "0 fpm".to_string(),
        v if v > 0 => format!("+{v} fpm"),
        v => format!("{v} fpm"),
    }
}

/// Whole degrees, truncated so 359.9 stays 359.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "wrapped heading is within [0, 360)"
)]
pub fn format_heading(degrees: f64) -> String {
    format!("{}°", wrap_heading(degrees).trunc() as u32)
}

/// `"40.0000, -74.0000"`.
#[must_use]
pub fn format_position(latitude: f64, longitude: f64) -> String {
    format!("{latitude:.4}, {longitude:.4}")
}

/// Compact age for list rows: `"42s ago"`, `"3m ago"`, `"2h ago"`.
#[must_use]
pub fn format_age(age: Duration) -> String {
    let secs = age.as_secs();
    if secs < 60 {
        format!("{secs}s ago")
    } else if secs < 3600 {
        format!("{}m ago", secs / 60)
    } else {
        format!("{}h ago", secs / 3600)
    }
}

impl AircraftSnapshot {
    #[must_use]
    pub fn formatted_altitude(&self) -> String {
        format_altitude(self.altitude)
    }

    #[must_use]
    pub fn formatted_speed(&self) -> String {
        format_speed(self.speed)
    }

    #[must_use]
    pub fn formatted_vertical_rate(&self) -> String {
        format_vertical_rate(self.vertical_rate)
    }

    #[must_use]
    pub fn formatted_heading(&self) -> String {
        format_heading(self.heading)
    }

    #[must_use]
    pub fn formatted_position(&self) -> String {
        format_position(self.latitude, self.longitude)
    }
}

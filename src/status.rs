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

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use fleet_track::{FetchPhase, FrameStats, RefreshEvent, RefreshStatus};

const MAX_DIAGNOSTICS: usize = 100;

/// Diagnostic message with timestamp
#[derive(Debug, Clone)]
pub struct DiagnosticMessage {
    pub timestamp: DateTime<Utc>,
    pub level: DiagnosticLevel,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticLevel {
    Info,
    Warning,
    Error,
}

/// Feed health and fetch statistics shown in the status pane
#[derive(Debug)]
pub struct FeedStatus {
    /// Where positions come from, for display
    pub feed_label: String,

    pub phase: FetchPhase,
    pub last_update: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub consecutive_failures: u32,
    pub in_flight: usize,

    // Fetch counters
    pub fetches_issued: u64,
    pub fetches_applied: u64,
    pub fetches_discarded: u64,
    pub fetches_failed: u64,

    // Aircraft statistics
    pub aircraft_count: usize,
    pub last_frame: FrameStats,

    // Diagnostic messages (keep last 100)
    pub diagnostics: VecDeque<DiagnosticMessage>,
    max_diagnostics: usize,
}

impl FeedStatus {
    pub fn new(feed_label: impl Into<String>) -> Self {
        Self {
            feed_label: feed_label.into(),
            phase: FetchPhase::Idle,
            last_update: None,
            last_error: None,
            consecutive_failures: 0,
            in_flight: 0,
            fetches_issued: 0,
            fetches_applied: 0,
            fetches_discarded: 0,
            fetches_failed: 0,
            aircraft_count: 0,
            last_frame: FrameStats::default(),
            diagnostics: VecDeque::with_capacity(MAX_DIAGNOSTICS),
            max_diagnostics: MAX_DIAGNOSTICS,
        }
    }

    /// Copy the scheduler's bookkeeping
    pub fn sync(&mut self, status: &RefreshStatus) {
        self.phase = status.phase;
        self.last_update = status.last_update;
        self.last_error.clone_from(&status.last_error);
        self.consecutive_failures = status.consecutive_failures;
        self.in_flight = status.in_flight;
    }

    /// Count a scheduler event and log the interesting ones
    pub fn record_event(&mut self, event: &RefreshEvent) {
        match event {
            RefreshEvent::Issued { .. } => self.fetches_issued += 1,
            RefreshEvent::Applied { seq, aircraft } => {
                self.fetches_applied += 1;
                self.aircraft_count = *aircraft;
                self.add_diagnostic(
                    DiagnosticLevel::Info,
                    format!("Fetch #{seq}: {aircraft} aircraft"),
                );
            }
            RefreshEvent::Discarded { seq } => {
                self.fetches_discarded += 1;
                self.add_diagnostic(
                    DiagnosticLevel::Warning,
                    format!("Fetch #{seq} superseded, result discarded"),
                );
            }
            RefreshEvent::Failed { seq, error } => {
                self.fetches_failed += 1;
                self.add_diagnostic(
                    DiagnosticLevel::Error,
                    format!("Fetch #{seq} failed: {error}"),
                );
            }
            RefreshEvent::Stopped => {
                self.add_diagnostic(DiagnosticLevel::Info, "Refresh stopped".to_string());
            }
        }
    }

    /// Add a diagnostic message
    pub fn add_diagnostic(&mut self, level: DiagnosticLevel, message: String) {
        self.diagnostics.push_back(DiagnosticMessage {
            timestamp: Utc::now(),
            level,
            message,
        });

        // Keep only the last N messages
        while self.diagnostics.len() > self.max_diagnostics {
            self.diagnostics.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_update_counters() {
        let mut status = FeedStatus::new("demo");
        status.record_event(&RefreshEvent::Issued {
            seq: 1,
            trigger: fleet_track::FetchTrigger::Initial,
        });
        status.record_event(&RefreshEvent::Applied { seq: 1, aircraft: 5 });
        status.record_event(&RefreshEvent::Discarded { seq: 2 });
        status.record_event(&RefreshEvent::Failed {
            seq: 3,
            error: "feed unavailable: timeout".to_string(),
        });

        assert_eq!(status.fetches_issued, 1);
        assert_eq!(status.fetches_applied, 1);
        assert_eq!(status.fetches_discarded, 1);
        assert_eq!(status.fetches_failed, 1);
        assert_eq!(status.aircraft_count, 5);
        assert_eq!(status.diagnostics.len(), 3);
        assert_eq!(
            status.diagnostics.back().map(|d| d.level),
            Some(DiagnosticLevel::Error)
        );
    }

    #[test]
    fn test_diagnostics_are_bounded() {
        let mut status = FeedStatus::new("demo");
        for i in 0..250 {
            status.add_diagnostic(DiagnosticLevel::Info, format!("message {i}"));
        }
        assert_eq!(status.diagnostics.len(), MAX_DIAGNOSTICS);
        assert_eq!(
            status.diagnostics.front().map(|d| d.message.as_str()),
            Some("message 150")
        );
    }

    #[test]
    fn test_sync_copies_scheduler_status() {
        let mut status = FeedStatus::new("demo");
        status.sync(&RefreshStatus {
            phase: FetchPhase::Fetching,
            last_error: Some("boom".to_string()),
            consecutive_failures: 2,
            in_flight: 1,
            ..Default::default()
        });
        assert_eq!(status.phase, FetchPhase::Fetching);
        assert_eq!(status.last_error.as_deref(), Some("boom"));
        assert_eq!(status.consecutive_failures, 2);
        assert_eq!(status.in_flight, 1);
    }
}

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

//! Refresh scheduling for a [`PositionSource`].
//!
//! [`RefreshScheduler`] owns the polling cadence. It issues an initial fetch,
//! re-fetches on a timer, accepts manual refreshes and stops cleanly on
//! [`RefreshScheduler::stop`] or drop.
//!
//! Every fetch is numbered when it is issued. A result is used only if its
//! number is newer than every fetch that has already settled, successful or
//! not, so a slow old fetch can never overwrite the data or the error of a
//! newer one. Failed fetches keep the last good set in place and record the
//! error.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::aircraft::{AircraftSnapshot, TrackedSet};
use crate::feed::{FeedError, FeedFilter, PositionSource};

/// Upper bound on the exponent used by [`BackoffPolicy::Exponential`].
const MAX_BACKOFF_DOUBLINGS: u32 = 16;

/// Invalid scheduler configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("refresh interval must be greater than zero")]
    InvalidInterval,
}

/// Delay policy after failed fetches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BackoffPolicy {
    /// Every tick fetches regardless of earlier failures.
    #[default]
    Fixed,
    /// Double the delay per consecutive failure, up to `max`.
    Exponential { max: Duration },
}

impl BackoffPolicy {
    /// Delay before the next timer fetch.
    #[must_use]
    pub fn delay(self, interval: Duration, consecutive_failures: u32) -> Duration {
        match self {
            Self::Fixed => interval,
            Self::Exponential { max } => {
                let factor = 2u32.saturating_pow(consecutive_failures.min(MAX_BACKOFF_DOUBLINGS));
                interval.saturating_mul(factor).min(max.max(interval))
            }
        }
    }
}

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Restrict fetches to these aircraft. `None` tracks the default region.
    pub filter: Option<FeedFilter>,
    /// Re-fetch on a timer after the initial fetch.
    pub auto_refresh: bool,
    pub refresh_interval: Duration,
    pub backoff: BackoffPolicy,
    /// Capacity of the [`RefreshEvent`] broadcast channel.
    pub event_channel_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            filter: None,
            auto_refresh: true,
            refresh_interval: Duration::from_secs(30),
            backoff: BackoffPolicy::default(),
            event_channel_capacity: 64,
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.refresh_interval.is_zero() {
            return Err(ConfigError::InvalidInterval);
        }
        Ok(())
    }
}

/// What caused a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchTrigger {
    Initial,
    Timer,
    Manual,
}

/// Coarse scheduler phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FetchPhase {
    #[default]
    Idle,
    Fetching,
}

/// Snapshot of the scheduler's bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshStatus {
    pub phase: FetchPhase,
    /// When a fetch result was last applied.
    pub last_update: Option<DateTime<Utc>>,
    /// Retained error from the most recent relevant failure.
    pub last_error: Option<String>,
    pub consecutive_failures: u32,
    /// Fetches issued but not yet settled.
    pub in_flight: usize,
    /// Sequence number of the most recently issued fetch.
    pub last_issued: u64,
}

/// Events emitted as fetches progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshEvent {
    Issued { seq: u64, trigger: FetchTrigger },
    Applied { seq: u64, aircraft: usize },
    /// A result arrived after a newer fetch settled, or after teardown.
    Discarded { seq: u64 },
    Failed { seq: u64, error: String },
    Stopped,
}

#[derive(Debug, Default)]
struct SchedulerState {
    next_seq: u64,
    /// Highest sequence number that has been applied or recorded as failed.
    settled_seq: u64,
    torn_down: bool,
    status: RefreshStatus,
}

impl SchedulerState {
    fn settle_one(&mut self) {
        self.status.in_flight = self.status.in_flight.saturating_sub(1);
        if self.status.in_flight == 0 {
            self.status.phase = FetchPhase::Idle;
        }
    }
}

struct Shared<S> {
    source: S,
    filter: Option<FeedFilter>,
    state: Mutex<SchedulerState>,
    set_tx: watch::Sender<Arc<TrackedSet>>,
    event_tx: broadcast::Sender<RefreshEvent>,
    cancel_token: CancellationToken,
}

impl<S: PositionSource> Shared<S> {
    fn state(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: RefreshEvent) {
        // No subscribers is fine.
        let _ = self.event_tx.send(event);
    }

    /// Number a new fetch, or `None` once torn down.
    fn begin(&self, trigger: FetchTrigger) -> Option<u64> {
        let seq = {
            let mut state = self.state();
            if state.torn_down {
                return None;
            }
            state.next_seq += 1;
            state.status.last_issued = state.next_seq;
            state.status.in_flight += 1;
            state.status.phase = FetchPhase::Fetching;
            state.next_seq
        };
        debug!("Issued fetch #{seq} ({trigger:?})");
        self.emit(RefreshEvent::Issued { seq, trigger });
        Some(seq)
    }

    async fn run_fetch(&self, seq: u64) {
        let result = tokio::select! {
            result = self.source.fetch_positions(self.filter.as_ref()) => result,
            () = self.cancel_token.cancelled() => {
                debug!("Fetch #{seq} abandoned on teardown");
                self.state().settle_one();
                return;
            }
        };
        self.complete(seq, result);
    }

    /// Apply or discard a settled fetch.
    fn complete(&self, seq: u64, result: Result<Vec<AircraftSnapshot>, FeedError>) {
        let event = {
            let mut state = self.state();
            state.settle_one();

            if state.torn_down || seq <= state.settled_seq {
                RefreshEvent::Discarded { seq }
            } else {
                state.settled_seq = seq;
                match result {
                    Ok(snapshots) => {
                        let now = Utc::now();
                        let set = Arc::new(TrackedSet::new(snapshots, seq, now));
                        let aircraft = set.len();
                        state.status.last_update = Some(now);
                        state.status.last_error = None;
                        state.status.consecutive_failures = 0;
                        self.set_tx.send_replace(set);
                        RefreshEvent::Applied { seq, aircraft }
                    }
                    Err(e) => {
                        let error = e.to_string();
                        state.status.last_error = Some(error.clone());
                        state.status.consecutive_failures += 1;
                        RefreshEvent::Failed { seq, error }
                    }
                }
            }
        };

        match &event {
            RefreshEvent::Applied { aircraft, .. } => {
                info!("Applied fetch #{seq}: {aircraft} aircraft");
            }
            RefreshEvent::Failed { error, .. } => warn!("Fetch #{seq} failed: {error}"),
            _ => debug!("Discarded fetch #{seq}"),
        }
        self.emit(event);
    }
}

async fn timer_loop<S: PositionSource>(
    shared: Arc<Shared<S>>,
    interval: Duration,
    backoff: BackoffPolicy,
) {
    loop {
        let failures = shared.state().status.consecutive_failures;
        let delay = backoff.delay(interval, failures);

        tokio::select! {
            () = sleep(delay) => {}
            () = shared.cancel_token.cancelled() => {
                debug!("Refresh timer cancelled");
                return;
            }
        }

        match shared.begin(FetchTrigger::Timer) {
            Some(seq) => shared.run_fetch(seq).await,
            None => return,
        }
    }
}

/// Owns the polling lifecycle for one tracking view.
///
/// Must be started from within a tokio runtime. Readers get the current
/// [`TrackedSet`] through [`tracked`](Self::tracked) or a watch receiver from
/// [`subscribe`](Self::subscribe); the set is only ever swapped whole.
pub struct RefreshScheduler<S: PositionSource> {
    shared: Arc<Shared<S>>,
    config: SchedulerConfig,
}

impl<S: PositionSource> std::fmt::Debug for RefreshScheduler<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshScheduler")
            .field("config", &self.config)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl<S: PositionSource> RefreshScheduler<S> {
    /// Start polling `source`.
    ///
    /// The initial fetch is always issued. The repeating timer is armed only
    /// when `auto_refresh` is set.
    pub fn start(source: S, config: SchedulerConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let (set_tx, _) = watch::channel(Arc::new(TrackedSet::default()));
        let (event_tx, _) = broadcast::channel(config.event_channel_capacity.max(1));

        let shared = Arc::new(Shared {
            source,
            filter: config.filter.clone(),
            state: Mutex::new(SchedulerState::default()),
            set_tx,
            event_tx,
            cancel_token: CancellationToken::new(),
        });

        info!(
            "Starting refresh scheduler (auto_refresh={}, interval={:?}, filter={:?})",
            config.auto_refresh, config.refresh_interval, config.filter
        );

        let scheduler = Self { shared, config };
        scheduler.spawn_fetch(FetchTrigger::Initial);

        if scheduler.config.auto_refresh {
            tokio::spawn(timer_loop(
                Arc::clone(&scheduler.shared),
                scheduler.config.refresh_interval,
                scheduler.config.backoff,
            ));
        }

        Ok(scheduler)
    }

    fn spawn_fetch(&self, trigger: FetchTrigger) -> Option<u64> {
        let seq = self.shared.begin(trigger)?;
        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            shared.run_fetch(seq).await;
        });
        Some(seq)
    }

    /// Issue a fetch now.
    ///
    /// Returns the fetch's sequence number, or `None` after teardown.
    pub fn refresh(&self) -> Option<u64> {
        self.spawn_fetch(FetchTrigger::Manual)
    }

    /// Current tracked set.
    #[must_use]
    pub fn tracked(&self) -> Arc<TrackedSet> {
        Arc::clone(&self.shared.set_tx.borrow())
    }

    /// Receiver that observes every published set.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Arc<TrackedSet>> {
        self.shared.set_tx.subscribe()
    }

    /// Fetch lifecycle events.
    #[must_use]
    pub fn events(&self) -> broadcast::Receiver<RefreshEvent> {
        self.shared.event_tx.subscribe()
    }

    #[must_use]
    pub fn status(&self) -> RefreshStatus {
        self.shared.state().status.clone()
    }

    #[must_use]
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.shared.state().torn_down
    }

    /// Cancel the timer and drop any result that arrives afterwards.
    pub fn stop(&self) {
        {
            let mut state = self.shared.state();
            if state.torn_down {
                return;
            }
            state.torn_down = true;
        }
        self.shared.cancel_token.cancel();
        info!("Refresh scheduler stopped");
        self.shared.emit(RefreshEvent::Stopped);
    }
}

impl<S: PositionSource> Drop for RefreshScheduler<S> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aircraft::tests::snapshot;
    use tokio::sync::{mpsc, oneshot};

    type Reply = oneshot::Sender<Result<Vec<AircraftSnapshot>, FeedError>>;

    /// Each fetch hands the test a reply handle and waits for it.
    struct ScriptedSource {
        calls: mpsc::UnboundedSender<Reply>,
    }

    impl ScriptedSource {
        fn new() -> (Self, mpsc::UnboundedReceiver<Reply>) {
            let (calls, rx) = mpsc::unbounded_channel();
            (Self { calls }, rx)
        }
    }

    impl PositionSource for ScriptedSource {
        async fn fetch_positions(
            &self,
            _filter: Option<&FeedFilter>,
        ) -> Result<Vec<AircraftSnapshot>, FeedError> {
            let (tx, rx) = oneshot::channel();
            if self.calls.send(tx).is_err() {
                return Err(FeedError::Unavailable("test harness gone".to_string()));
            }
            rx.await
                .unwrap_or_else(|_| Err(FeedError::Unavailable("reply dropped".to_string())))
        }
    }

    fn manual_config() -> SchedulerConfig {
        SchedulerConfig {
            auto_refresh: false,
            ..Default::default()
        }
    }

    fn batch(ids: &[&str]) -> Result<Vec<AircraftSnapshot>, FeedError> {
        Ok(ids.iter().map(|id| snapshot(id, 10.0, 10.0)).collect())
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    fn ids(set: &TrackedSet) -> Vec<String> {
        set.iter().map(|a| a.id.clone()).collect()
    }

    #[test]
    fn test_zero_interval_rejected() {
        let config = SchedulerConfig {
            refresh_interval: Duration::ZERO,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::InvalidInterval));
    }

    #[test]
    fn test_backoff_delays() {
        let interval = Duration::from_secs(10);
        assert_eq!(BackoffPolicy::Fixed.delay(interval, 5), interval);

        let exp = BackoffPolicy::Exponential {
            max: Duration::from_secs(60),
        };
        assert_eq!(exp.delay(interval, 0), interval);
        assert_eq!(exp.delay(interval, 1), Duration::from_secs(20));
        assert_eq!(exp.delay(interval, 2), Duration::from_secs(40));
        assert_eq!(exp.delay(interval, 3), Duration::from_secs(60));
        assert_eq!(exp.delay(interval, 300), Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_fetch_applies() {
        let (source, mut calls) = ScriptedSource::new();
        let scheduler = RefreshScheduler::start(source, manual_config()).unwrap();

        assert_eq!(scheduler.status().phase, FetchPhase::Fetching);
        calls.recv().await.unwrap().send(batch(&["a", "b"])).unwrap();
        settle().await;

        let set = scheduler.tracked();
        assert_eq!(ids(&set), vec!["a", "b"]);
        assert_eq!(set.generation(), 1);

        let status = scheduler.status();
        assert_eq!(status.phase, FetchPhase::Idle);
        assert!(status.last_update.is_some());
        assert_eq!(status.last_error, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_issued_wins_over_late_resolution() {
        let (source, mut calls) = ScriptedSource::new();
        let scheduler = RefreshScheduler::start(source, manual_config()).unwrap();
        let initial = calls.recv().await.unwrap();

        let seq_a = scheduler.refresh().unwrap();
        let fetch_a = calls.recv().await.unwrap();
        let seq_b = scheduler.refresh().unwrap();
        let fetch_b = calls.recv().await.unwrap();
        assert!(seq_a < seq_b);

        let mut events = scheduler.events();
        fetch_b.send(batch(&["from-b"])).unwrap();
        settle().await;
        fetch_a.send(batch(&["from-a"])).unwrap();
        initial.send(batch(&["from-initial"])).unwrap();
        settle().await;

        let set = scheduler.tracked();
        assert_eq!(ids(&set), vec!["from-b"]);
        assert_eq!(set.generation(), seq_b);

        assert_eq!(
            events.recv().await.unwrap(),
            RefreshEvent::Applied {
                seq: seq_b,
                aircraft: 1
            }
        );
        let late = [events.recv().await.unwrap(), events.recv().await.unwrap()];
        assert!(late.contains(&RefreshEvent::Discarded { seq: seq_a }));
        assert!(late.contains(&RefreshEvent::Discarded { seq: 1 }));
        assert_eq!(scheduler.status().in_flight, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_newer_failure_discards_older_success() {
        let (source, mut calls) = ScriptedSource::new();
        let scheduler = RefreshScheduler::start(source, manual_config()).unwrap();
        calls.recv().await.unwrap().send(batch(&["initial"])).unwrap();
        settle().await;

        let seq_a = scheduler.refresh().unwrap();
        let fetch_a = calls.recv().await.unwrap();
        let seq_b = scheduler.refresh().unwrap();
        let fetch_b = calls.recv().await.unwrap();

        let mut events = scheduler.events();
        fetch_b.send(Err(FeedError::Unavailable("down".to_string()))).unwrap();
        settle().await;
        fetch_a.send(batch(&["from-a"])).unwrap();
        settle().await;

        let set = scheduler.tracked();
        assert_eq!(ids(&set), vec!["initial"]);
        assert_eq!(set.generation(), 1);

        let status = scheduler.status();
        assert_eq!(status.last_error.as_deref(), Some("feed unavailable: down"));
        assert_eq!(status.consecutive_failures, 1);
        assert_eq!(status.in_flight, 0);

        assert_eq!(
            events.recv().await.unwrap(),
            RefreshEvent::Failed {
                seq: seq_b,
                error: "feed unavailable: down".to_string()
            }
        );
        assert_eq!(events.recv().await.unwrap(), RefreshEvent::Discarded { seq: seq_a });
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_order_resolution_applies_both() {
        let (source, mut calls) = ScriptedSource::new();
        let scheduler = RefreshScheduler::start(source, manual_config()).unwrap();
        calls.recv().await.unwrap().send(batch(&["first"])).unwrap();
        settle().await;

        scheduler.refresh().unwrap();
        let fetch = calls.recv().await.unwrap();
        let mut updates = scheduler.subscribe();
        fetch.send(batch(&["second"])).unwrap();

        updates.changed().await.unwrap();
        assert_eq!(ids(&updates.borrow_and_update()), vec!["second"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_keeps_previous_set() {
        let (source, mut calls) = ScriptedSource::new();
        let scheduler = RefreshScheduler::start(source, manual_config()).unwrap();
        calls.recv().await.unwrap().send(batch(&["kept"])).unwrap();
        settle().await;

        scheduler.refresh().unwrap();
        calls
            .recv()
            .await
            .unwrap()
            .send(Err(FeedError::Unavailable("timeout".to_string())))
            .unwrap();
        settle().await;

        assert_eq!(ids(&scheduler.tracked()), vec!["kept"]);
        let status = scheduler.status();
        assert_eq!(status.phase, FetchPhase::Idle);
        assert_eq!(status.last_error.as_deref(), Some("feed unavailable: timeout"));
        assert_eq!(status.consecutive_failures, 1);

        scheduler.refresh().unwrap();
        calls.recv().await.unwrap().send(batch(&["fresh"])).unwrap();
        settle().await;
        let status = scheduler.status();
        assert_eq!(status.last_error, None);
        assert_eq!(status.consecutive_failures, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_mutation_after_teardown() {
        let (source, mut calls) = ScriptedSource::new();
        let scheduler = RefreshScheduler::start(source, manual_config()).unwrap();
        let pending = calls.recv().await.unwrap();
        let updates = scheduler.subscribe();

        scheduler.stop();
        assert!(scheduler.is_stopped());
        // The fetch task was abandoned, so the reply has nowhere to go.
        let _ = pending.send(batch(&["late"]));
        settle().await;

        assert!(scheduler.tracked().is_empty());
        assert!(!updates.has_changed().unwrap());
        assert_eq!(scheduler.refresh(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_completion_after_stop_is_discarded() {
        let (source, _calls) = ScriptedSource::new();
        let scheduler = RefreshScheduler::start(source, manual_config()).unwrap();
        scheduler.stop();

        // A result that slipped past cancellation still must not publish.
        scheduler.shared.complete(1, batch(&["late"]));
        assert!(scheduler.tracked().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_refetches_on_interval() {
        let (source, mut calls) = ScriptedSource::new();
        let config = SchedulerConfig {
            refresh_interval: Duration::from_secs(30),
            ..Default::default()
        };
        let scheduler = RefreshScheduler::start(source, config).unwrap();
        let started = tokio::time::Instant::now();

        calls.recv().await.unwrap().send(batch(&["t0"])).unwrap();
        calls.recv().await.unwrap().send(batch(&["t1"])).unwrap();
        assert!(started.elapsed() >= Duration::from_secs(30));
        settle().await;
        assert_eq!(ids(&scheduler.tracked()), vec!["t1"]);

        // A failed tick does not stop the cadence.
        calls
            .recv()
            .await
            .unwrap()
            .send(Err(FeedError::Unavailable("down".to_string())))
            .unwrap();
        calls.recv().await.unwrap().send(batch(&["t3"])).unwrap();
        assert!(started.elapsed() >= Duration::from_secs(90));
        settle().await;
        assert_eq!(ids(&scheduler.tracked()), vec!["t3"]);

        scheduler.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_timer() {
        let (source, mut calls) = ScriptedSource::new();
        let scheduler = RefreshScheduler::start(source, SchedulerConfig::default()).unwrap();
        calls.recv().await.unwrap().send(batch(&["a"])).unwrap();
        settle().await;

        drop(scheduler);
        tokio::time::sleep(Duration::from_secs(300)).await;
        assert!(calls.try_recv().is_err());
    }
}

//! Scheduled watchers
//!
//! Each watcher is one independently scheduled periodic task running a
//! fetch-filter-notify-commit cycle. The supervisor drives every watcher
//! through the same lifecycle:
//!
//! ```text
//! Idle -> WaitingForReady -> InitialDelay -> Looping -> Terminated
//! ```
//!
//! Cycles for one watcher are strictly serialized; a force-run goes
//! through the same per-watcher lock, bypasses cadence and gating, and
//! returns its outcome to the caller.

pub mod cve;
pub mod dedup;
pub mod rss;
pub mod weather;

pub use cve::{CveWatcher, Watchlist};
pub use rss::RssWatcher;
pub use weather::{PresenceCache, WeatherWatcher};

use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Timelike, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;

/// Lifecycle state of one watcher task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    /// Not yet spawned
    Idle,
    /// Blocked on the host readiness signal
    WaitingForReady,
    /// One-shot grace period before the first run
    InitialDelay,
    /// Firing on cadence
    Looping,
    /// Shut down
    Terminated,
}

/// Outcome of one watcher cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Something was surfaced; carries a short human description
    Posted(String),
    /// The cycle ran but found nothing new
    NothingNew,
    /// The cycle refused to run (scheduling gate)
    Skipped,
}

/// One independently scheduled periodic task.
#[async_trait]
pub trait Watcher: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Run one fetch-filter-notify-commit cycle. `force` bypasses any
    /// gate the watcher applies to its scheduled path.
    async fn cycle(&self, force: bool) -> Result<CycleOutcome>;
}

/// Firing cadence for a watcher.
#[derive(Debug, Clone, Copy)]
pub enum Schedule {
    /// Fire daily at a fixed UTC wall-clock time
    Daily { hour: u32, minute: u32 },
    /// Fire on a fixed interval
    Every(Duration),
}

impl Schedule {
    /// Time until the next scheduled fire, from `now`.
    pub fn next_delay(&self, now: DateTime<Utc>) -> Duration {
        match self {
            Schedule::Every(interval) => *interval,
            Schedule::Daily { hour, minute } => {
                let today = now
                    .with_hour(*hour)
                    .and_then(|t| t.with_minute(*minute))
                    .and_then(|t| t.with_second(0))
                    .and_then(|t| t.with_nanosecond(0))
                    .unwrap_or(now);
                let target = if today > now {
                    today
                } else {
                    today + chrono::Duration::days(1)
                };
                (target - now).to_std().unwrap_or(Duration::ZERO)
            }
        }
    }
}

/// Handle to a spawned watcher: state introspection and force-run.
#[derive(Clone)]
pub struct WatchHandle {
    name: &'static str,
    watcher: Arc<dyn Watcher>,
    state: Arc<RwLock<WatcherState>>,
    /// Serializes cycles for this watcher (scheduled and forced alike)
    cycle_lock: Arc<Mutex<()>>,
}

impl WatchHandle {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub async fn state(&self) -> WatcherState {
        *self.state.read().await
    }

    /// Run one cycle immediately, bypassing cadence and day gating, and
    /// return the outcome to the caller.
    pub async fn force_run(&self) -> Result<CycleOutcome> {
        let _guard = self.cycle_lock.lock().await;
        self.watcher.cycle(true).await
    }
}

/// Spawns and shuts down watcher tasks.
pub struct Supervisor {
    ready_tx: watch::Sender<bool>,
    shutdown_tx: watch::Sender<bool>,
    handles: HashMap<&'static str, WatchHandle>,
    tasks: Vec<JoinHandle<()>>,
}

impl Supervisor {
    pub fn new() -> Self {
        let (ready_tx, _) = watch::channel(false);
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            ready_tx,
            shutdown_tx,
            handles: HashMap::new(),
            tasks: Vec::new(),
        }
    }

    /// Spawn a watcher loop. The loop blocks until [`Supervisor::mark_ready`]
    /// is called, sleeps `initial_delay` once, then fires on `schedule`.
    pub fn spawn(
        &mut self,
        watcher: Arc<dyn Watcher>,
        schedule: Schedule,
        initial_delay: Duration,
    ) -> WatchHandle {
        let handle = WatchHandle {
            name: watcher.name(),
            watcher: watcher.clone(),
            state: Arc::new(RwLock::new(WatcherState::Idle)),
            cycle_lock: Arc::new(Mutex::new(())),
        };

        let task = tokio::spawn(run_watch_loop(
            watcher,
            schedule,
            initial_delay,
            handle.state.clone(),
            handle.cycle_lock.clone(),
            self.ready_tx.subscribe(),
            self.shutdown_tx.subscribe(),
        ));

        self.tasks.push(task);
        self.handles.insert(handle.name, handle.clone());
        tracing::info!(watcher = handle.name, "Watcher spawned");
        handle
    }

    /// Signal host readiness; watchers leave `WaitingForReady`.
    pub fn mark_ready(&self) {
        let _ = self.ready_tx.send(true);
    }

    pub fn handle(&self, name: &str) -> Option<&WatchHandle> {
        self.handles.get(name)
    }

    /// Signal shutdown and wait for every watcher loop to terminate.
    /// An in-flight cycle finishes its current commit before the loop exits.
    pub async fn shutdown(&mut self) {
        let _ = self.shutdown_tx.send(true);
        futures::future::join_all(self.tasks.drain(..)).await;
        tracing::info!("All watchers terminated");
    }
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_watch_loop(
    watcher: Arc<dyn Watcher>,
    schedule: Schedule,
    initial_delay: Duration,
    state: Arc<RwLock<WatcherState>>,
    cycle_lock: Arc<Mutex<()>>,
    mut ready_rx: watch::Receiver<bool>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let name = watcher.name();

    // The `wait_for` futures are wrapped so the select arms resolve to
    // plain values; the watch-channel read guard must not be held across
    // the state writes below, or the spawned future stops being Send.
    *state.write().await = WatcherState::WaitingForReady;
    let ready = tokio::select! {
        ok = async { ready_rx.wait_for(|ready| *ready).await.is_ok() } => ok,
        _ = wait_for_shutdown(&mut shutdown_rx) => false,
    };
    if !ready {
        *state.write().await = WatcherState::Terminated;
        return;
    }

    *state.write().await = WatcherState::InitialDelay;
    tracing::info!(watcher = name, delay_secs = initial_delay.as_secs(), "Initial delay before first run");
    tokio::select! {
        _ = tokio::time::sleep(initial_delay) => {}
        _ = wait_for_shutdown(&mut shutdown_rx) => {
            *state.write().await = WatcherState::Terminated;
            return;
        }
    }

    *state.write().await = WatcherState::Looping;

    // Interval watchers run their first cycle right after the initial
    // delay; daily watchers wait for their wall-clock slot.
    if matches!(schedule, Schedule::Every(_)) {
        run_one_cycle(name, &watcher, &cycle_lock).await;
    }

    loop {
        let delay = schedule.next_delay(Utc::now());
        tokio::select! {
            _ = tokio::time::sleep(delay) => {
                run_one_cycle(name, &watcher, &cycle_lock).await;
            }
            _ = wait_for_shutdown(&mut shutdown_rx) => break,
        }
    }

    *state.write().await = WatcherState::Terminated;
    tracing::info!(watcher = name, "Watcher terminated");
}

async fn wait_for_shutdown(shutdown_rx: &mut watch::Receiver<bool>) {
    let _ = shutdown_rx.wait_for(|stop| *stop).await;
}

/// Run one scheduled cycle under the per-watcher lock. The cycle is never
/// raced against shutdown: a commit in flight must land whole or not at all.
async fn run_one_cycle(name: &'static str, watcher: &Arc<dyn Watcher>, cycle_lock: &Mutex<()>) {
    let _guard = cycle_lock.lock().await;
    match watcher.cycle(false).await {
        Ok(outcome) => {
            tracing::debug!(watcher = name, ?outcome, "Cycle finished");
        }
        Err(e) => {
            tracing::error!(watcher = name, error = %e, "Watch cycle failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_test::assert_ok;

    struct CountingWatcher {
        cycles: AtomicUsize,
    }

    #[async_trait]
    impl Watcher for CountingWatcher {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn cycle(&self, _force: bool) -> Result<CycleOutcome> {
            self.cycles.fetch_add(1, Ordering::SeqCst);
            Ok(CycleOutcome::NothingNew)
        }
    }

    #[test]
    fn test_interval_schedule_delay() {
        let schedule = Schedule::Every(Duration::from_secs(300));
        assert_eq!(schedule.next_delay(Utc::now()), Duration::from_secs(300));
    }

    #[test]
    fn test_daily_schedule_later_today() {
        let now = Utc.with_ymd_and_hms(2026, 8, 28, 6, 0, 0).unwrap();
        let schedule = Schedule::Daily { hour: 8, minute: 0 };
        assert_eq!(schedule.next_delay(now), Duration::from_secs(2 * 3600));
    }

    #[test]
    fn test_daily_schedule_rolls_to_tomorrow() {
        let now = Utc.with_ymd_and_hms(2026, 8, 28, 9, 30, 0).unwrap();
        let schedule = Schedule::Daily { hour: 8, minute: 0 };
        assert_eq!(
            schedule.next_delay(now),
            Duration::from_secs(22 * 3600 + 1800)
        );
    }

    #[tokio::test]
    async fn test_watcher_waits_for_ready_then_terminates_on_shutdown() {
        let mut supervisor = Supervisor::new();
        let watcher = Arc::new(CountingWatcher {
            cycles: AtomicUsize::new(0),
        });
        let handle = supervisor.spawn(
            watcher.clone(),
            Schedule::Every(Duration::from_secs(3600)),
            Duration::ZERO,
        );

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(handle.state().await, WatcherState::WaitingForReady);
        assert_eq!(watcher.cycles.load(Ordering::SeqCst), 0);

        supervisor.mark_ready();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(handle.state().await, WatcherState::Looping);

        supervisor.shutdown().await;
        assert_eq!(handle.state().await, WatcherState::Terminated);
        // Only the immediate first cycle ran; the hour-long cadence never fired.
        assert_eq!(watcher.cycles.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_interval_watcher_fires_once_right_after_readiness() {
        let mut supervisor = Supervisor::new();
        let watcher = Arc::new(CountingWatcher {
            cycles: AtomicUsize::new(0),
        });
        supervisor.spawn(
            watcher.clone(),
            Schedule::Every(Duration::from_secs(3600)),
            Duration::ZERO,
        );

        supervisor.mark_ready();
        tokio::time::sleep(Duration::from_millis(300)).await;

        // The first poll happens immediately, not one full cadence later.
        assert_eq!(watcher.cycles.load(Ordering::SeqCst), 1);
        supervisor.shutdown().await;
    }

    #[tokio::test]
    async fn test_force_run_works_regardless_of_cadence() {
        let mut supervisor = Supervisor::new();
        let watcher = Arc::new(CountingWatcher {
            cycles: AtomicUsize::new(0),
        });
        let handle = supervisor.spawn(
            watcher.clone(),
            Schedule::Every(Duration::from_secs(3600)),
            Duration::from_secs(3600),
        );

        // Force-run is independent of readiness, delay and cadence.
        let outcome = assert_ok!(handle.force_run().await);
        assert_eq!(outcome, CycleOutcome::NothingNew);
        assert_eq!(watcher.cycles.load(Ordering::SeqCst), 1);

        supervisor.shutdown().await;
    }

    #[tokio::test]
    async fn test_interval_loop_fires() {
        let mut supervisor = Supervisor::new();
        let watcher = Arc::new(CountingWatcher {
            cycles: AtomicUsize::new(0),
        });
        supervisor.spawn(
            watcher.clone(),
            Schedule::Every(Duration::from_millis(20)),
            Duration::ZERO,
        );
        supervisor.mark_ready();

        tokio::time::sleep(Duration::from_millis(120)).await;
        supervisor.shutdown().await;

        assert!(watcher.cycles.load(Ordering::SeqCst) >= 2);
    }
}

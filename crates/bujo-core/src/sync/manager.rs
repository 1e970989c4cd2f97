//! Background sync between the local and remote event logs

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::reconcile::{reconcile_events, SyncReport};
use crate::config::SyncSettings;
use crate::error::{Error, Result};
use crate::lifecycle::{Lifecycle, LifecycleEvent, Visibility};
use crate::state::SyncState;
use crate::store::EventStore;
use crate::subscribers::Subscription;

/// Message reported when a sync pass exceeds its time budget.
pub const SYNC_TIMEOUT_MESSAGE: &str = "Couldn't reach the server — showing local data";

/// Called with `(true, None)` when a sync starts and `(false, error)` when
/// it ends.
pub type SyncStateCallback = Arc<dyn Fn(bool, Option<String>) + Send + Sync>;

/// Why `sync_now` did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Another pass is running
    InFlight,
    /// The previous pass finished inside the debounce window
    Debounced,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Completed(SyncReport),
    Skipped(SkipReason),
    Failed(String),
    TimedOut,
}

struct SyncInner {
    local: Arc<dyn EventStore>,
    remote: Arc<dyn EventStore>,
    settings: SyncSettings,
    in_flight: AtomicBool,
    paused: AtomicBool,
    initial_sync_complete: AtomicBool,
    last_completed: Mutex<Option<Instant>>,
    state: Mutex<SyncState>,
    last_report: Mutex<Option<SyncReport>>,
    last_error: Mutex<Option<String>>,
    on_state_change: Mutex<Option<SyncStateCallback>>,
}

impl SyncInner {
    fn notify(&self, syncing: bool, error: Option<String>) {
        let callback = self.on_state_change.lock().clone();
        if let Some(callback) = callback {
            callback(syncing, error);
        }
    }

    fn debounced(&self) -> bool {
        self.last_completed
            .lock()
            .is_some_and(|finished| finished.elapsed() < self.settings.debounce())
    }

    /// A skipped attempt still reports start and end; state, debounce
    /// clock and initial-sync flag are left alone.
    fn skip(&self, reason: SkipReason) -> SyncOutcome {
        self.notify(true, None);
        self.notify(false, None);
        SyncOutcome::Skipped(reason)
    }

    async fn sync_now(&self) -> SyncOutcome {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            tracing::debug!("Sync already in flight, skipping");
            return self.skip(SkipReason::InFlight);
        }
        if self.debounced() {
            self.in_flight.store(false, Ordering::SeqCst);
            tracing::debug!("Sync debounced");
            return self.skip(SkipReason::Debounced);
        }

        *self.state.lock() = SyncState::Syncing;
        self.notify(true, None);

        let (outcome, state) = match self.run_pass().await {
            Ok(report) => {
                *self.last_report.lock() = Some(report);
                tracing::info!(
                    uploaded = report.uploaded,
                    downloaded = report.downloaded,
                    "Sync completed"
                );
                (SyncOutcome::Completed(report), SyncState::Synced)
            }
            Err(PassError::TimedOut) => {
                tracing::error!(timeout_secs = self.settings.timeout_secs, "Sync timed out");
                (SyncOutcome::TimedOut, SyncState::Offline)
            }
            Err(PassError::Failed { message, offline }) => {
                tracing::error!("{message}");
                let state = if offline {
                    SyncState::Offline
                } else {
                    SyncState::Error
                };
                (SyncOutcome::Failed(message), state)
            }
        };
        let message = match &outcome {
            SyncOutcome::TimedOut => Some(SYNC_TIMEOUT_MESSAGE.to_string()),
            SyncOutcome::Failed(message) => Some(message.clone()),
            SyncOutcome::Completed(_) | SyncOutcome::Skipped(_) => None,
        };

        *self.state.lock() = state;
        self.last_error.lock().clone_from(&message);
        *self.last_completed.lock() = Some(Instant::now());
        self.initial_sync_complete.store(true, Ordering::SeqCst);
        self.in_flight.store(false, Ordering::SeqCst);
        self.notify(false, message);
        outcome
    }

    /// Runs the merge as its own task so a timeout abandons the wait, not
    /// the work. A late result is logged when it arrives.
    async fn run_pass(&self) -> std::result::Result<SyncReport, PassError> {
        let local = Arc::clone(&self.local);
        let remote = Arc::clone(&self.remote);
        let mut task = tokio::spawn(async move {
            reconcile_events(local.as_ref(), remote.as_ref()).await
        });

        match tokio::time::timeout(self.settings.timeout(), &mut task).await {
            Ok(Ok(Ok(report))) => Ok(report),
            Ok(Ok(Err(error))) => Err(PassError::Failed {
                message: format!("Sync failed: {error}"),
                offline: error.is_network() || error.is_timeout(),
            }),
            Ok(Err(join_error)) => Err(PassError::Failed {
                message: format!("Sync failed: {join_error}"),
                offline: false,
            }),
            Err(_) => {
                tokio::spawn(async move {
                    match task.await {
                        Ok(Ok(report)) => tracing::info!(
                            uploaded = report.uploaded,
                            downloaded = report.downloaded,
                            "Timed-out sync finished late"
                        ),
                        Ok(Err(error)) => tracing::warn!("Timed-out sync failed late: {error}"),
                        Err(error) => tracing::warn!("Timed-out sync task failed: {error}"),
                    }
                });
                Err(PassError::TimedOut)
            }
        }
    }
}

enum PassError {
    TimedOut,
    Failed { message: String, offline: bool },
}

/// Keeps a local and a remote event log converged.
pub struct SyncManager {
    inner: Arc<SyncInner>,
    timer: Mutex<Option<JoinHandle<()>>>,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl SyncManager {
    pub fn new(local: Arc<dyn EventStore>, remote: Arc<dyn EventStore>, settings: SyncSettings) -> Self {
        Self {
            inner: Arc::new(SyncInner {
                local,
                remote,
                settings,
                in_flight: AtomicBool::new(false),
                paused: AtomicBool::new(false),
                initial_sync_complete: AtomicBool::new(false),
                last_completed: Mutex::new(None),
                state: Mutex::new(SyncState::Offline),
                last_report: Mutex::new(None),
                last_error: Mutex::new(None),
                on_state_change: Mutex::new(None),
            }),
            timer: Mutex::new(None),
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    /// Register the sync state callback, replacing any previous one.
    pub fn on_sync_state_change(&self, callback: impl Fn(bool, Option<String>) + Send + Sync + 'static) {
        *self.inner.on_state_change.lock() = Some(Arc::new(callback));
    }

    /// Sync now, then every `interval_secs`; also on focus, on coming
    /// online and on becoming visible. The timer is paused while hidden.
    pub fn start(&self, lifecycle: &Lifecycle) -> Result<()> {
        let runtime = Handle::try_current().map_err(|error| {
            Error::InvalidInput(format!("sync manager needs a tokio runtime: {error}"))
        })?;
        let mut timer = self.timer.lock();
        if timer.is_some() {
            return Ok(());
        }

        let inner = Arc::clone(&self.inner);
        let period = self.inner.settings.interval();
        *timer = Some(runtime.spawn(async move {
            let mut ticks = tokio::time::interval(period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticks.tick().await;
                if inner.paused.load(Ordering::SeqCst) {
                    continue;
                }
                inner.sync_now().await;
            }
        }));

        let weak: Weak<SyncInner> = Arc::downgrade(&self.inner);
        self.subscriptions
            .lock()
            .push(lifecycle.subscribe(move |event: &LifecycleEvent| {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                match event {
                    LifecycleEvent::VisibilityChanged(Visibility::Hidden) => {
                        inner.paused.store(true, Ordering::SeqCst);
                    }
                    LifecycleEvent::VisibilityChanged(Visibility::Visible) => {
                        inner.paused.store(false, Ordering::SeqCst);
                        runtime.spawn(async move {
                            inner.sync_now().await;
                        });
                    }
                    LifecycleEvent::Focus | LifecycleEvent::Online => {
                        runtime.spawn(async move {
                            inner.sync_now().await;
                        });
                    }
                    LifecycleEvent::Unload => {}
                }
            }));

        tracing::info!(interval_secs = self.inner.settings.interval_secs, "Sync manager started");
        Ok(())
    }

    /// Cancel the timer and detach listeners. Safe to call repeatedly or
    /// without `start()`.
    pub fn stop(&self) {
        if let Some(timer) = self.timer.lock().take() {
            timer.abort();
            tracing::info!("Sync manager stopped");
        }
        let subscriptions: Vec<Subscription> = std::mem::take(&mut *self.subscriptions.lock());
        for subscription in subscriptions {
            subscription.unsubscribe();
        }
    }

    /// One reconciliation pass, unless one is running or just finished.
    pub async fn sync_now(&self) -> SyncOutcome {
        self.inner.sync_now().await
    }

    pub fn state(&self) -> SyncState {
        *self.inner.state.lock()
    }

    /// True once the first attempted pass has finished, however it ended.
    pub fn is_initial_sync_complete(&self) -> bool {
        self.inner.initial_sync_complete.load(Ordering::SeqCst)
    }

    pub fn last_sync_report(&self) -> Option<SyncReport> {
        *self.inner.last_report.lock()
    }

    pub fn last_error(&self) -> Option<String> {
        self.inner.last_error.lock().clone()
    }

    pub fn is_paused(&self) -> bool {
        self.inner.paused.load(Ordering::SeqCst)
    }
}

impl Drop for SyncManager {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::{DomainEvent, EventPayload};
    use crate::store::{MemoryDocumentStore, RemoteEventStore, SqliteEventStore};
    use std::time::Duration;

    fn completed(id: &str) -> DomainEvent {
        DomainEvent::new(EventPayload::TaskCompleted {
            task_id: "t1".to_string(),
        })
        .with_id(id)
    }

    struct Setup {
        local: Arc<SqliteEventStore>,
        remote: Arc<RemoteEventStore>,
        manager: SyncManager,
        calls: Arc<Mutex<Vec<(bool, Option<String>)>>>,
    }

    fn setup() -> Setup {
        let local = Arc::new(SqliteEventStore::new(Arc::new(
            Database::open_in_memory().unwrap(),
        )));
        let remote = Arc::new(RemoteEventStore::new(Arc::new(MemoryDocumentStore::new()), "u1"));
        let manager = SyncManager::new(local.clone(), remote.clone(), SyncSettings::default());
        let calls = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&calls);
        manager.on_sync_state_change(move |syncing, error| sink.lock().push((syncing, error)));
        Setup {
            local,
            remote,
            manager,
            calls,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn successful_sync_reports_and_marks_initial_complete() {
        let setup = setup();
        setup.local.append(&completed("a")).await.unwrap();
        assert!(!setup.manager.is_initial_sync_complete());

        let outcome = setup.manager.sync_now().await;
        assert_eq!(
            outcome,
            SyncOutcome::Completed(SyncReport {
                uploaded: 1,
                downloaded: 0
            })
        );
        assert!(setup.manager.is_initial_sync_complete());
        assert_eq!(setup.manager.state(), SyncState::Synced);
        assert_eq!(*setup.calls.lock(), vec![(true, None), (false, None)]);
        assert_eq!(setup.remote.get_all().await.unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn debounce_skips_rapid_calls() {
        let setup = setup();
        setup.manager.sync_now().await;
        assert_eq!(
            setup.manager.sync_now().await,
            SyncOutcome::Skipped(SkipReason::Debounced)
        );
        assert_eq!(
            *setup.calls.lock(),
            vec![(true, None), (false, None), (true, None), (false, None)]
        );
        assert_eq!(setup.manager.state(), SyncState::Synced);

        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(matches!(
            setup.manager.sync_now().await,
            SyncOutcome::Completed(_)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn start_syncs_immediately_and_stop_is_idempotent() {
        let setup = setup();
        setup.manager.stop();

        setup.remote.append(&completed("r")).await.unwrap();
        let lifecycle = Lifecycle::new();
        setup.manager.start(&lifecycle).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(setup.manager.is_initial_sync_complete());
        assert_eq!(setup.local.count().await.unwrap(), 1);

        lifecycle.emit(LifecycleEvent::VisibilityChanged(Visibility::Hidden));
        assert!(setup.manager.is_paused());
        lifecycle.emit(LifecycleEvent::VisibilityChanged(Visibility::Visible));
        assert!(!setup.manager.is_paused());

        setup.manager.stop();
        setup.manager.stop();
        assert_eq!(lifecycle.listener_count(), 0);
    }
}

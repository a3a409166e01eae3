//! # Sync Coordinator
//!
//! Ties an operator save to the announcements that follow it.
//!
//! ## Save → Announce
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  HTTP save ──► SyncCoordinator::submit(snapshot)                        │
//! │                   │                                                     │
//! │                   ├─ Reconciler::apply  (validate, one transaction)     │
//! │                   │                                                     │
//! │                   └─ announce_tx.try_send(())  ── full? already queued  │
//! │                   │                                                     │
//! │                   ▼                                                     │
//! │               Ok(outcome)  ◄── returned before any publish happens      │
//! │                                                                         │
//! │  AnnounceWorker (single task)                                           │
//! │  ────────────────────────────                                           │
//! │  loop select! (biased)                                                  │
//! │    shutdown_rx     → exit, queued request abandoned                     │
//! │    ticker.tick()   → announce   (every broadcast interval)              │
//! │    announce_rx     → announce   (after a save)                          │
//! │                                                                         │
//! │  One announce at a time. Saves made during an announce coalesce into    │
//! │  a single follow-up, which reads the store afresh.                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, RwLock};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::broadcaster::Broadcaster;
use crate::config::MAX_BROADCAST_INTERVAL;
use crate::error::{SyncError, SyncResult};
use crate::reconciler::Reconciler;
use roslinki_core::FullStateSnapshot;
use roslinki_db::{Database, ReplaceOutcome};

// =============================================================================
// Coordinator State
// =============================================================================

/// What the announce worker is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Idle,
    Announcing,
}

impl std::fmt::Display for CoordinatorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CoordinatorState::Idle => write!(f, "idle"),
            CoordinatorState::Announcing => write!(f, "announcing"),
        }
    }
}

/// Why an announce ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AnnounceTrigger {
    Tick,
    Submission,
}

impl std::fmt::Display for AnnounceTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnnounceTrigger::Tick => write!(f, "tick"),
            AnnounceTrigger::Submission => write!(f, "submission"),
        }
    }
}

// =============================================================================
// Coordinator
// =============================================================================

/// Entry point for operator saves.
#[derive(Debug, Clone)]
pub struct SyncCoordinator {
    reconciler: Reconciler,
    announce_tx: mpsc::Sender<()>,
    state: Arc<RwLock<CoordinatorState>>,
}

impl SyncCoordinator {
    /// Creates the coordinator, its announce worker and a shutdown handle.
    ///
    /// The worker does nothing until `run()` is awaited on a task.
    ///
    /// ## Usage
    /// ```rust,ignore
    /// let (coordinator, worker, handle) =
    ///     SyncCoordinator::new(db, broadcaster, config.broadcast.interval());
    /// tokio::spawn(worker.run());
    /// ```
    pub fn new(
        db: Database,
        broadcaster: Broadcaster,
        interval: Duration,
    ) -> (SyncCoordinator, AnnounceWorker, CoordinatorHandle) {
        // Capacity 1: one pending announce is enough, since it reads
        // whatever is committed when it runs.
        let (announce_tx, announce_rx) = mpsc::channel(1);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let state = Arc::new(RwLock::new(CoordinatorState::Idle));

        let coordinator = SyncCoordinator {
            reconciler: Reconciler::new(db.config_store()),
            announce_tx,
            state: state.clone(),
        };

        let worker = AnnounceWorker {
            broadcaster,
            interval,
            state,
            announce_rx,
            shutdown_rx,
        };

        (coordinator, worker, CoordinatorHandle { shutdown_tx })
    }

    /// Persists a full snapshot and schedules an announce.
    ///
    /// Returns once the snapshot is committed. Publishing happens later on
    /// the worker, and its failures never reach the caller.
    ///
    /// ## Errors
    /// * `SyncError::Validation` - rejected before touching the store
    /// * `SyncError::Storage` - store failed; previous state kept
    /// * `SyncError::ShuttingDown` - worker has stopped; nothing persisted
    pub async fn submit(&self, snapshot: &FullStateSnapshot) -> SyncResult<ReplaceOutcome> {
        if self.announce_tx.is_closed() {
            return Err(SyncError::ShuttingDown);
        }

        let outcome = self.reconciler.apply(snapshot).await?;
        self.request_announce();

        Ok(outcome)
    }

    /// Queues an announce unless one is already pending.
    pub fn request_announce(&self) {
        match self.announce_tx.try_send(()) {
            Ok(()) => debug!("Announce queued"),
            Err(mpsc::error::TrySendError::Full(())) => debug!("Announce already pending"),
            Err(mpsc::error::TrySendError::Closed(())) => {
                warn!("Announce worker stopped; request dropped")
            }
        }
    }

    /// Whether the worker is publishing right now.
    pub async fn state(&self) -> CoordinatorState {
        *self.state.read().await
    }
}

/// Stops the announce worker.
#[derive(Debug, Clone)]
pub struct CoordinatorHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl CoordinatorHandle {
    pub async fn shutdown(&self) -> SyncResult<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| SyncError::ShuttingDown)
    }
}

// =============================================================================
// Announce Worker
// =============================================================================

/// Single task that performs every announce.
pub struct AnnounceWorker {
    broadcaster: Broadcaster,
    interval: Duration,
    state: Arc<RwLock<CoordinatorState>>,
    announce_rx: mpsc::Receiver<()>,
    shutdown_rx: mpsc::Receiver<()>,
}

impl AnnounceWorker {
    /// Main worker loop.
    pub async fn run(mut self) {
        info!(
            interval = ?self.interval,
            topic = %self.broadcaster.topic(),
            "Announce worker started"
        );

        let period = self
            .interval
            .clamp(Duration::from_millis(1), MAX_BROADCAST_INTERVAL);
        if period != self.interval {
            warn!(requested = ?self.interval, used = ?period, "Broadcast interval clamped");
        }

        // First tick one full interval after start.
        let now = Instant::now();
        let mut ticker = interval_at(now.checked_add(period).unwrap_or(now), period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let trigger = tokio::select! {
                biased;

                _ = self.shutdown_rx.recv() => {
                    info!("Announce worker shutting down");
                    break;
                }

                _ = ticker.tick() => AnnounceTrigger::Tick,

                Some(()) = self.announce_rx.recv() => AnnounceTrigger::Submission,
            };

            self.announce(trigger).await;
        }

        // Later submits see a closed channel and fail fast.
        self.announce_rx.close();
        info!("Announce worker stopped");
    }

    async fn announce(&self, trigger: AnnounceTrigger) {
        *self.state.write().await = CoordinatorState::Announcing;

        match self.broadcaster.announce().await {
            Ok(report) => info!(
                %trigger,
                topic = %report.topic,
                devices = report.devices,
                bytes = report.bytes,
                "State announced"
            ),
            Err(e) if e.is_transport() => warn!(%trigger, error = %e, "Announce skipped"),
            Err(e) => error!(%trigger, error = %e, "Announce failed"),
        }

        *self.state.write().await = CoordinatorState::Idle;
    }
}

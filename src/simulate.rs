//! Lock-holding and timeout simulations.
//!
//! [`BlockSimulator`] holds the store's own [`StoreLock`] from a detached task
//! so that store operations observably stall for the requested duration. Its
//! state lives behind a separate lightweight lock, which keeps
//! [`BlockSimulator::block_status`] answering while a block is in progress.
//!
//! [`simulate_timeout`] only delays the calling task and never touches the
//! store.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::config::SimulationConfig;
use crate::error::{StoreError, StoreResult};
use crate::store::StoreLock;

#[derive(Debug, Clone, Default)]
enum BlockState {
    #[default]
    Idle,
    Blocked(ActiveBlock),
}

#[derive(Debug, Clone)]
struct ActiveBlock {
    block_id: u64,
    started_at: Instant,
    started_wall: DateTime<Utc>,
    duration: Duration,
    cancel: Arc<Notify>,
}

impl ActiveBlock {
    fn elapsed(&self) -> Duration {
        self.started_at.elapsed().min(self.duration)
    }

    fn remaining(&self) -> Duration {
        self.duration.saturating_sub(self.elapsed())
    }
}

#[derive(Debug, Default)]
struct BlockShared {
    state: RwLock<BlockState>,
    next_id: AtomicU64,
}

impl BlockShared {
    fn read(&self) -> BlockState {
        self.state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn set(&self, state: BlockState) {
        let mut guard = self
            .state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = state;
    }

    /// Move from idle to blocked in one step, or report the active block.
    fn reserve(&self, duration: Duration) -> StoreResult<ActiveBlock> {
        let mut guard = self
            .state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let BlockState::Blocked(active) = &*guard {
            return Err(StoreError::AlreadyInProgress {
                remaining_secs: active.remaining().as_secs_f64(),
            });
        }
        let active = ActiveBlock {
            block_id: self.next_id.fetch_add(1, Ordering::Relaxed) + 1,
            started_at: Instant::now(),
            started_wall: Utc::now(),
            duration,
            cancel: Arc::new(Notify::new()),
        };
        *guard = BlockState::Blocked(active.clone());
        Ok(active)
    }
}

/// Undoes a reservation if `start_block` is dropped while waiting for the
/// store lock.
struct Reservation<'a> {
    shared: &'a BlockShared,
    armed: bool,
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.shared.set(BlockState::Idle);
        }
    }
}

/// Acknowledgement returned as soon as the block task is running.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockTicket {
    pub block_id: u64,
    pub duration_secs: u64,
    pub started_at: DateTime<Utc>,
}

/// Snapshot of the block state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum BlockStatus {
    Idle,
    Blocked {
        block_id: u64,
        started_at: DateTime<Utc>,
        duration_secs: f64,
        elapsed_secs: f64,
        remaining_secs: f64,
    },
}

impl BlockStatus {
    pub fn is_blocked(&self) -> bool {
        matches!(self, BlockStatus::Blocked { .. })
    }

    pub fn remaining(&self) -> Duration {
        match self {
            BlockStatus::Idle => Duration::ZERO,
            BlockStatus::Blocked { remaining_secs, .. } => Duration::from_secs_f64(*remaining_secs),
        }
    }
}

/// Holds the store lock on demand to emulate a stuck worker.
#[derive(Debug, Clone)]
pub struct BlockSimulator {
    lock: StoreLock,
    config: Arc<SimulationConfig>,
    shared: Arc<BlockShared>,
}

impl BlockSimulator {
    /// `lock` must be the same handle the [`ItemStore`](crate::ItemStore) uses.
    pub fn new(lock: StoreLock, config: SimulationConfig) -> Self {
        Self {
            lock,
            config: Arc::new(config),
            shared: Arc::new(BlockShared::default()),
        }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Take the store lock and hold it from a detached task for
    /// `duration_secs` (the configured default when `None`).
    ///
    /// Returns once the lock is held and the task is spawned; waits only for
    /// store operations already in flight.
    #[tracing::instrument(skip(self))]
    pub async fn start_block(&self, duration_secs: Option<u64>) -> StoreResult<BlockTicket> {
        let secs = duration_secs.unwrap_or(self.config.default_block_secs);
        if secs == 0 || secs > self.config.max_block_secs {
            return Err(StoreError::invalid_argument(format!(
                "block duration must be between 1 and {} seconds",
                self.config.max_block_secs
            )));
        }
        let duration = Duration::from_secs(secs);

        let reserved = self.shared.reserve(duration).inspect_err(|err| {
            tracing::warn!(%err, "block rejected");
        })?;
        let mut reservation = Reservation {
            shared: &*self.shared,
            armed: true,
        };

        let guard = self.lock.acquire_owned().await;
        let active = ActiveBlock {
            started_at: Instant::now(),
            started_wall: Utc::now(),
            ..reserved
        };
        self.shared.set(BlockState::Blocked(active.clone()));
        reservation.armed = false;

        metrics::counter!("itemlab_blocks_started_total").increment(1);
        metrics::gauge!("itemlab_block_active").set(1.0);
        tracing::info!(block_id = active.block_id, secs, "store lock held by block task");

        let shared = Arc::clone(&self.shared);
        let cancel = Arc::clone(&active.cancel);
        let block_id = active.block_id;
        tokio::spawn(async move {
            let cancelled = tokio::select! {
                _ = tokio::time::sleep(duration) => false,
                _ = cancel.notified() => true,
            };
            // Idle first: whoever takes the lock next must not see this block.
            shared.set(BlockState::Idle);
            drop(guard);
            metrics::gauge!("itemlab_block_active").set(0.0);
            tracing::info!(block_id, cancelled, "store lock released by block task");
        });

        Ok(BlockTicket {
            block_id: active.block_id,
            duration_secs: secs,
            started_at: active.started_wall,
        })
    }

    /// Current block state. Reads only the state flag, never the store lock.
    ///
    /// The flag turns idle just before the block task releases the lock, so
    /// for an instant this may report idle while
    /// [`ItemStore::stats`](crate::ItemStore::stats) still shows the lock
    /// taken. The reverse (blocked with the lock free) only happens while a
    /// new block is waiting for in-flight operations.
    pub fn block_status(&self) -> BlockStatus {
        match self.shared.read() {
            BlockState::Idle => BlockStatus::Idle,
            BlockState::Blocked(active) => BlockStatus::Blocked {
                block_id: active.block_id,
                started_at: active.started_wall,
                duration_secs: active.duration.as_secs_f64(),
                elapsed_secs: active.elapsed().as_secs_f64(),
                remaining_secs: active.remaining().as_secs_f64(),
            },
        }
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self.shared.read(), BlockState::Blocked(_))
    }

    /// Release an active block early. Returns whether one was active.
    #[tracing::instrument(skip(self))]
    pub fn cancel_block(&self) -> bool {
        match self.shared.read() {
            BlockState::Idle => false,
            BlockState::Blocked(active) => {
                // notify_one keeps a permit if the task has not polled yet.
                active.cancel.notify_one();
                tracing::info!(block_id = active.block_id, "block cancellation requested");
                true
            }
        }
    }
}

/// Completion report of [`simulate_timeout`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeoutReport {
    pub requested_duration_secs: u64,
    pub actual_duration_secs: f64,
    pub completed_at: DateTime<Utc>,
}

/// Suspend the calling task for `duration_secs`, then report how long it took.
///
/// Accepts 1..=`max_timeout_secs`; values beyond common client timeouts are
/// allowed on purpose.
#[tracing::instrument(skip(config))]
pub async fn simulate_timeout(
    duration_secs: u64,
    config: &SimulationConfig,
) -> StoreResult<TimeoutReport> {
    if duration_secs == 0 || duration_secs > config.max_timeout_secs {
        return Err(StoreError::invalid_argument(format!(
            "duration must be between 1 and {} seconds",
            config.max_timeout_secs
        )));
    }

    let start = Instant::now();
    tokio::time::sleep(Duration::from_secs(duration_secs)).await;
    let actual = start.elapsed().as_secs_f64();

    metrics::counter!("itemlab_timeouts_simulated_total").increment(1);
    tracing::info!(actual_secs = actual, "timeout simulation completed");

    Ok(TimeoutReport {
        requested_duration_secs: duration_secs,
        actual_duration_secs: (actual * 100.0).round() / 100.0,
        completed_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simulator() -> BlockSimulator {
        BlockSimulator::new(StoreLock::new(), SimulationConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn rejects_out_of_range_durations() {
        let sim = simulator();
        assert!(matches!(
            sim.start_block(Some(0)).await,
            Err(StoreError::InvalidArgument(_))
        ));
        assert!(matches!(
            sim.start_block(Some(301)).await,
            Err(StoreError::InvalidArgument(_))
        ));
        assert!(!sim.is_blocked());
    }

    #[tokio::test(start_paused = true)]
    async fn default_duration_applies() {
        let sim = simulator();
        let ticket = sim.start_block(None).await.unwrap();
        assert_eq!(ticket.duration_secs, 30);
        match sim.block_status() {
            BlockStatus::Blocked { duration_secs, .. } => assert_eq!(duration_secs, 30.0),
            BlockStatus::Idle => panic!("expected an active block"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn status_counts_down_then_returns_to_idle() {
        let sim = simulator();
        sim.start_block(Some(10)).await.unwrap();

        tokio::time::sleep(Duration::from_secs(4)).await;
        match sim.block_status() {
            BlockStatus::Blocked {
                elapsed_secs,
                remaining_secs,
                ..
            } => {
                assert!(elapsed_secs >= 4.0);
                assert!(remaining_secs <= 6.0 && remaining_secs > 0.0);
            }
            BlockStatus::Idle => panic!("expected an active block"),
        }

        tokio::time::sleep(Duration::from_secs(7)).await;
        assert_eq!(sim.block_status(), BlockStatus::Idle);
        assert!(sim.lock.is_available());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_releases_the_lock_early() {
        let sim = simulator();
        assert!(!sim.cancel_block());
        sim.start_block(Some(60)).await.unwrap();
        assert!(!sim.lock.is_available());

        assert!(sim.cancel_block());
        let waited = Instant::now();
        let _guard = sim.lock.acquire_owned().await;
        assert!(waited.elapsed() < Duration::from_secs(1));
        assert!(!sim.is_blocked());
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_rejects_zero_and_over_max() {
        let cfg = SimulationConfig {
            max_timeout_secs: 5,
            ..SimulationConfig::default()
        };
        assert!(simulate_timeout(0, &cfg).await.is_err());
        assert!(simulate_timeout(6, &cfg).await.is_err());
        let report = simulate_timeout(5, &cfg).await.unwrap();
        assert_eq!(report.requested_duration_secs, 5);
    }
}

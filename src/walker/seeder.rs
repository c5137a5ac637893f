//! Bulk key generation
//!
//! Writes `key1..keyN` with values `value_1..value_N` using a fixed pool of
//! workers, each owning one contiguous slice of the index range. The whole
//! run is bounded by a wall-clock deadline; hitting it is reported as a
//! partial completion rather than an error.

use crate::cancel::Cancellation;
use crate::error::StoreError;
use crate::store::RetryingExecutor;
use serde::Serialize;
use std::ops::Range;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Default number of keys to write
pub const DEFAULT_SEED_COUNT: u64 = 100_000;

/// Default number of writer tasks
pub const DEFAULT_SEED_WORKERS: usize = 100;

/// Default wall-clock limit for a seeding run
pub const DEFAULT_SEED_DEADLINE: Duration = Duration::from_secs(10 * 60);

/// Writes between cancellation checks
const CHECK_INTERVAL: u64 = 1000;

/// How a seeding run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedStatus {
    /// Every write was attempted
    Completed,
    /// The deadline fired; writes done so far are kept
    DeadlineExceeded,
    /// Cancelled by the caller; writes done so far are kept
    Cancelled,
    /// Writes were attempted but none succeeded
    Failed,
}

impl SeedStatus {
    /// True when the run stopped before attempting every write
    pub fn is_partial(&self) -> bool {
        matches!(self, SeedStatus::DeadlineExceeded | SeedStatus::Cancelled)
    }
}

/// Tally of a seeding run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedOutcome {
    pub requested: u64,
    pub added: u64,
    pub failed: u64,
    pub elapsed_ms: u64,
    pub status: SeedStatus,
}

/// Split `[0, total)` into `workers` contiguous ranges
///
/// Each range holds `ceil(total / workers)` indices and the last one takes
/// whatever remains, so trailing ranges may be empty (2 keys over 4 workers
/// gives `[0,1) [1,2) [2,2) [2,2)`). Ceil chunks keep 10 keys over 3 workers
/// at `[0,4) [4,8) [8,10)` rather than piling the remainder on the last one.
pub fn partition(total: u64, workers: usize) -> Vec<Range<u64>> {
    let workers = workers.max(1) as u64;
    let chunk = total.div_ceil(workers);

    (0..workers)
        .map(|i| {
            let start = (i * chunk).min(total);
            let end = if i == workers - 1 {
                total
            } else {
                (start + chunk).min(total)
            };
            start..end
        })
        .collect()
}

/// Parallel key writer
pub struct BulkSeeder {
    store: RetryingExecutor,
}

impl BulkSeeder {
    pub fn new(store: RetryingExecutor) -> Self {
        Self { store }
    }

    /// Write `total_count` keys into `db` using `worker_count` tasks
    pub async fn seed_keys(
        &self,
        cancel: &Cancellation,
        db: i64,
        total_count: u64,
        worker_count: usize,
        deadline: Duration,
    ) -> SeedOutcome {
        let start = Instant::now();
        let scope = cancel.with_timeout(deadline);
        let ranges = partition(total_count, worker_count);

        info!(
            db = db,
            keys = total_count,
            workers = ranges.len(),
            deadline_secs = deadline.as_secs(),
            "Starting bulk seed"
        );

        let mut workers = JoinSet::new();
        for (id, range) in ranges.into_iter().enumerate() {
            if range.is_empty() {
                continue;
            }
            let store = self.store.clone();
            let scope = scope.clone();
            workers.spawn(seed_range(store, scope, db, id, range));
        }

        let mut added = 0u64;
        let mut failed = 0u64;
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok((worker_added, worker_failed)) => {
                    added += worker_added;
                    failed += worker_failed;
                }
                Err(e) => error!(error = %e, "Seed worker panicked"),
            }
        }

        let status = if added + failed >= total_count {
            if added == 0 && failed > 0 {
                SeedStatus::Failed
            } else {
                SeedStatus::Completed
            }
        } else {
            match scope.check() {
                Err(StoreError::DeadlineExceeded) => SeedStatus::DeadlineExceeded,
                Err(_) => SeedStatus::Cancelled,
                Ok(()) => SeedStatus::Failed,
            }
        };

        let outcome = SeedOutcome {
            requested: total_count,
            added,
            failed,
            elapsed_ms: start.elapsed().as_millis() as u64,
            status,
        };

        if status.is_partial() {
            warn!(
                added = outcome.added,
                requested = outcome.requested,
                status = ?status,
                "Bulk seed stopped early, partially completed"
            );
        } else {
            info!(
                added = outcome.added,
                failed = outcome.failed,
                duration_ms = outcome.elapsed_ms,
                "Bulk seed complete"
            );
        }

        outcome
    }
}

/// Write one slice of keys, returning (added, failed)
async fn seed_range(
    store: RetryingExecutor,
    scope: Cancellation,
    db: i64,
    id: usize,
    range: Range<u64>,
) -> (u64, u64) {
    let mut added = 0u64;
    let mut failed = 0u64;

    for i in range.clone() {
        if (i - range.start) % CHECK_INTERVAL == 0 && scope.is_done() {
            debug!(worker = id, index = i, "Seed worker stopping");
            break;
        }

        let key = format!("key{}", i + 1);
        let value = format!("value_{}", i + 1);

        match store.execute(&scope, db, "SET", &[&key, &value]).await {
            Ok(_) => added += 1,
            Err(e) if e.is_cancellation() || scope.is_done() => break,
            Err(e) => {
                warn!(worker = id, key = %key, error = %e, "Failed to write key");
                failed += 1;
            }
        }
    }

    debug!(worker = id, added = added, failed = failed, "Seed worker finished");
    (added, failed)
}

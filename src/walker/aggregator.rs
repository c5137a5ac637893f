//! Concurrent memory analysis
//!
//! Fans out one inspection task per key, bounded by a semaphore, and folds
//! the results into an [`AnalysisReport`]. Workers never touch the report:
//! they send `(index, record)` pairs to a single reducer task that owns it,
//! which restores discovery order once every worker has finished.

use crate::cancel::Cancellation;
use crate::error::{Result, StoreError, WalkerError, WorkerError};
use crate::store::KeyRecord;
use crate::walker::inspector::{KeyInspector, SizingStrategy};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Default ceiling on in-flight inspections
pub const DEFAULT_CONCURRENCY: usize = 2000;

/// Largest accepted concurrency ceiling
pub const MAX_CONCURRENCY: usize = 10_000;

/// Live counters for progress display
///
/// The report is built by the reducer; these are only for watching.
#[derive(Debug, Default)]
pub struct AnalysisStats {
    pub inspected: AtomicU64,
    pub failed: AtomicU64,
    pub bytes: AtomicU64,
}

impl AnalysisStats {
    pub fn record_key(&self, bytes: i64) {
        self.inspected.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(bytes.max(0) as u64, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inspected(&self) -> u64 {
        self.inspected.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }
}

/// Result of analyzing a batch of keys
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    /// Successfully inspected keys, in input order
    pub records: Vec<KeyRecord>,
    /// Sum of `records[i].size_bytes`
    pub total_size_bytes: i64,
    /// Keys submitted
    pub requested: usize,
    /// Keys inspected successfully (`records.len()`)
    pub processed: usize,
    /// Keys dropped because inspection failed
    pub failed: usize,
    /// Sizing strategy used
    pub strategy: SizingStrategy,
    /// When the analysis started
    pub started_at: DateTime<Utc>,
}

/// What a single inspection task ended with
enum TaskOutcome {
    Inspected,
    Failed,
    Cancelled(StoreError),
}

/// Runs inspections in parallel and merges the results
pub struct Aggregator {
    inspector: KeyInspector,
    concurrency: usize,
    stats: Arc<AnalysisStats>,
}

impl Aggregator {
    pub fn new(inspector: KeyInspector, concurrency: usize) -> Self {
        Self::with_stats(inspector, concurrency, Arc::new(AnalysisStats::default()))
    }

    /// Create an aggregator that reports into existing counters
    pub fn with_stats(inspector: KeyInspector, concurrency: usize, stats: Arc<AnalysisStats>) -> Self {
        Self {
            inspector,
            concurrency: concurrency.clamp(1, MAX_CONCURRENCY),
            stats,
        }
    }

    /// Shared live counters
    pub fn stats(&self) -> Arc<AnalysisStats> {
        Arc::clone(&self.stats)
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Inspect every key with `strategy`
    ///
    /// Per-key failures are logged and counted; only cancellation aborts.
    pub async fn analyze(
        &self,
        cancel: &Cancellation,
        db: i64,
        keys: &[String],
        strategy: SizingStrategy,
    ) -> Result<AnalysisReport> {
        self.run(cancel, db, keys, strategy, None).await
    }

    /// Inspect every key with exact sizes, checking server support first
    ///
    /// The first key is probed before any fan-out; a server without
    /// `MEMORY USAGE` fails the whole batch with `Unsupported`. If a later
    /// task still hits a capability error, the remaining tasks are dropped
    /// without issuing commands.
    pub async fn analyze_validated(
        &self,
        cancel: &Cancellation,
        db: i64,
        keys: &[String],
    ) -> Result<AnalysisReport> {
        if let Some(first) = keys.first() {
            match self.inspector.exact_size(cancel, db, first).await {
                Err(e) if e.is_capability() || e.is_cancellation() => {
                    warn!(key = %first, error = %e, "Capability probe failed, aborting batch");
                    return Err(e.into());
                }
                Err(e) => debug!(key = %first, error = %e, "Probe key failed, continuing"),
                Ok(_) => {}
            }
        }

        let unsupported = Arc::new(AtomicBool::new(false));
        self.run(cancel, db, keys, SizingStrategy::Exact, Some(unsupported))
            .await
    }

    async fn run(
        &self,
        cancel: &Cancellation,
        db: i64,
        keys: &[String],
        strategy: SizingStrategy,
        unsupported: Option<Arc<AtomicBool>>,
    ) -> Result<AnalysisReport> {
        let start = Instant::now();
        let started_at = Utc::now();
        info!(
            db = db,
            keys = keys.len(),
            concurrency = self.concurrency,
            strategy = %strategy,
            "Starting memory analysis"
        );

        // Reducer owns the records and the running total
        let (tx, mut rx) = mpsc::channel::<(usize, KeyRecord)>(self.concurrency.min(1024));
        let reducer = tokio::spawn(async move {
            let mut indexed = Vec::new();
            let mut total = 0i64;
            while let Some((index, record)) = rx.recv().await {
                total += record.size_bytes;
                indexed.push((index, record));
            }
            indexed.sort_by_key(|(index, _)| *index);
            let records: Vec<KeyRecord> = indexed.into_iter().map(|(_, record)| record).collect();
            (records, total)
        });

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();
        let mut aborted: Option<StoreError> = None;

        for (index, key) in keys.iter().enumerate() {
            if let Err(e) = cancel.check() {
                aborted = Some(e);
                break;
            }

            let permit = tokio::select! {
                reason = cancel.done() => {
                    aborted = Some(reason);
                    break;
                }
                permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let inspector = self.inspector.clone();
            let stats = Arc::clone(&self.stats);
            let tx = tx.clone();
            let cancel = cancel.clone();
            let unsupported = unsupported.clone();
            let key = key.clone();

            tasks.spawn(async move {
                let _permit = permit;

                if let Some(flag) = &unsupported {
                    if flag.load(Ordering::Acquire) {
                        debug!(key = %key, "Skipping key, server lacks MEMORY USAGE");
                        stats.record_failure();
                        return TaskOutcome::Failed;
                    }
                }

                match inspector.inspect(&cancel, db, &key, strategy).await {
                    Ok(record) => {
                        stats.record_key(record.size_bytes);
                        if tx.send((index, record)).await.is_err() {
                            return TaskOutcome::Failed;
                        }
                        TaskOutcome::Inspected
                    }
                    Err(e) if e.is_cancellation() => TaskOutcome::Cancelled(e),
                    Err(e) => {
                        if e.is_capability() {
                            if let Some(flag) = &unsupported {
                                flag.store(true, Ordering::Release);
                            }
                        }
                        warn!(key = %key, error = %e, "Failed to inspect key");
                        stats.record_failure();
                        TaskOutcome::Failed
                    }
                }
            });
        }
        drop(tx);

        let mut failed = 0usize;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(TaskOutcome::Inspected) => {}
                Ok(TaskOutcome::Failed) => failed += 1,
                Ok(TaskOutcome::Cancelled(reason)) => {
                    aborted.get_or_insert(reason);
                }
                Err(e) => {
                    error!(error = %e, "Inspection task panicked");
                    self.stats.record_failure();
                    failed += 1;
                }
            }
        }

        let (records, total_size_bytes) = reducer.await.map_err(|e| {
            WalkerError::Worker(WorkerError::Panicked {
                id: 0,
                message: e.to_string(),
            })
        })?;

        if let Some(reason) = aborted {
            warn!(
                processed = records.len(),
                requested = keys.len(),
                "Memory analysis aborted"
            );
            return Err(reason.into());
        }

        let report = AnalysisReport {
            processed: records.len(),
            records,
            total_size_bytes,
            requested: keys.len(),
            failed,
            strategy,
            started_at,
        };

        info!(
            processed = report.processed,
            failed = report.failed,
            total_bytes = report.total_size_bytes,
            duration_ms = start.elapsed().as_millis() as u64,
            "Memory analysis complete"
        );

        Ok(report)
    }
}

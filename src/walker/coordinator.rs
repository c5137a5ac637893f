//! Key-space walk coordinator
//!
//! Ties the scanner, inspector, aggregator, seeder and editor to one shared
//! retrying executor. Every operation the CLI exposes goes through here.

use crate::cancel::Cancellation;
use crate::config::WalkerConfig;
use crate::error::{Result, StoreResult};
use crate::info::{self, DatabaseInfo, ServerOverview};
use crate::store::{KeyValue, RedisExecutor, RetryPolicy, RetryingExecutor};
use crate::walker::aggregator::{Aggregator, AnalysisReport, AnalysisStats, DEFAULT_CONCURRENCY};
use crate::walker::editor::KeyEditor;
use crate::walker::inspector::{KeyDetail, KeyInspector, SizingStrategy};
use crate::walker::scanner::{CursorScanner, KeyFilter, ScanResult, DEFAULT_SCAN_COUNT};
use crate::walker::seeder::{BulkSeeder, SeedOutcome};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Keys matching a substring search
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    /// Matching keys, in scan order
    pub matches: Vec<String>,
    /// Keys examined during the walk
    pub total_scanned: u64,
    /// Keys in the database according to DBSIZE (0 when unknown)
    pub total_count: i64,
    pub search_text: String,
    pub case_sensitive: bool,
}

/// Entry point for all key-space operations
pub struct KeyspaceWalker {
    store: RetryingExecutor,
    scanner: CursorScanner,
    inspector: KeyInspector,
    editor: KeyEditor,
    stats: Arc<AnalysisStats>,
    scan_count: usize,
}

impl KeyspaceWalker {
    /// Create a walker over an existing executor
    pub fn new(store: RetryingExecutor) -> Self {
        Self {
            scanner: CursorScanner::new(store.clone()),
            inspector: KeyInspector::new(store.clone()),
            editor: KeyEditor::new(store.clone()),
            stats: Arc::new(AnalysisStats::default()),
            scan_count: DEFAULT_SCAN_COUNT,
            store,
        }
    }

    /// Connect to the server named in `config`
    ///
    /// No connection is made until the first command.
    pub fn connect(config: &WalkerConfig) -> Result<Self> {
        let executor =
            RedisExecutor::open(&config.url.to_connection_string(config.db), config.timeout)?;
        let store = RetryingExecutor::new(Arc::new(executor), config.retry);

        info!(
            url = %config.url,
            db = config.db,
            attempts = config.retry.max_attempts,
            "Store client ready"
        );

        Ok(Self::new(store).with_max_iterations(config.max_iterations))
    }

    /// Override the SCAN round-trip ceiling
    pub fn with_max_iterations(mut self, max_iterations: u64) -> Self {
        self.scanner = self.scanner.with_max_iterations(max_iterations);
        self
    }

    /// Override the keys requested per SCAN round-trip
    pub fn with_scan_count(mut self, scan_count: usize) -> Self {
        self.scan_count = scan_count.max(1);
        self
    }

    /// Live analysis counters for progress display
    pub fn stats(&self) -> Arc<AnalysisStats> {
        Arc::clone(&self.stats)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.store.policy()
    }

    /// List keys, optionally restricted to a `MATCH` pattern
    pub async fn keys(
        &self,
        cancel: &Cancellation,
        db: i64,
        pattern: Option<&str>,
    ) -> StoreResult<ScanResult> {
        let start = Instant::now();
        let result = self.scanner.scan_all(cancel, db, pattern, self.scan_count).await?;
        info!(
            db = db,
            keys = result.keys.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Listed keys"
        );
        Ok(result)
    }

    /// Find keys containing `text`
    pub async fn search(
        &self,
        cancel: &Cancellation,
        db: i64,
        text: &str,
        case_sensitive: bool,
    ) -> StoreResult<SearchResult> {
        let filter = KeyFilter::new(text, case_sensitive);
        let (matches, total_scanned) = self
            .scanner
            .scan_and_filter(cancel, db, |key| filter.matches(key))
            .await?;
        let total_count = info::db_size(&self.store, cancel, db).await?;

        debug!(
            text = %text,
            matches = matches.len(),
            scanned = total_scanned,
            "Search complete"
        );

        Ok(SearchResult {
            matches,
            total_scanned,
            total_count,
            search_text: filter.text().to_string(),
            case_sensitive: filter.case_sensitive(),
        })
    }

    /// Scan the database and measure every key
    pub async fn analyze(
        &self,
        cancel: &Cancellation,
        db: i64,
        pattern: Option<&str>,
        strategy: SizingStrategy,
        concurrency: usize,
    ) -> Result<AnalysisReport> {
        let keys = self
            .scanner
            .scan_all(cancel, db, pattern, self.scan_count)
            .await?
            .keys;
        self.analyze_keys(cancel, db, &keys, strategy, concurrency).await
    }

    /// Measure the given keys
    pub async fn analyze_keys(
        &self,
        cancel: &Cancellation,
        db: i64,
        keys: &[String],
        strategy: SizingStrategy,
        concurrency: usize,
    ) -> Result<AnalysisReport> {
        self.aggregator(concurrency)
            .analyze(cancel, db, keys, strategy)
            .await
    }

    /// Measure the given keys exactly, failing fast on servers without
    /// `MEMORY USAGE`
    pub async fn batch(
        &self,
        cancel: &Cancellation,
        db: i64,
        keys: &[String],
        concurrency: usize,
    ) -> Result<AnalysisReport> {
        self.aggregator(concurrency)
            .analyze_validated(cancel, db, keys)
            .await
    }

    fn aggregator(&self, concurrency: usize) -> Aggregator {
        let concurrency = if concurrency == 0 {
            DEFAULT_CONCURRENCY
        } else {
            concurrency
        };
        Aggregator::with_stats(self.inspector.clone(), concurrency, Arc::clone(&self.stats))
    }

    /// Everything about one key
    pub async fn detail(&self, cancel: &Cancellation, db: i64, key: &str) -> StoreResult<KeyDetail> {
        self.inspector.detail(cancel, db, key).await
    }

    /// Delete one key
    pub async fn delete(&self, cancel: &Cancellation, db: i64, key: &str) -> StoreResult<bool> {
        self.editor.delete(cancel, db, key).await
    }

    /// Replace one key
    pub async fn set(
        &self,
        cancel: &Cancellation,
        db: i64,
        key: &str,
        value: &KeyValue,
        ttl: i64,
    ) -> Result<()> {
        self.editor.set(cancel, db, key, value, ttl).await
    }

    /// Write generated keys
    pub async fn seed(
        &self,
        cancel: &Cancellation,
        db: i64,
        count: u64,
        workers: usize,
        deadline: Duration,
    ) -> SeedOutcome {
        BulkSeeder::new(self.store.clone())
            .seed_keys(cancel, db, count, workers, deadline)
            .await
    }

    /// INFO and keyspace counters
    pub async fn overview(&self, cancel: &Cancellation, db: i64) -> StoreResult<ServerOverview> {
        info::overview(&self.store, cancel, db).await
    }

    /// Databases that hold keys
    pub async fn databases(&self, cancel: &Cancellation) -> StoreResult<Vec<DatabaseInfo>> {
        info::databases(&self.store, cancel).await
    }

    /// Number of keys in `db`
    pub async fn db_size(&self, cancel: &Cancellation, db: i64) -> StoreResult<i64> {
        info::db_size(&self.store, cancel, db).await
    }
}

//! redis-walker - Redis Key-Space Scanner and Memory Analyzer
//!
//! A tool for walking the key-space of a Redis-compatible server, measuring
//! how much memory each key uses and running bulk key operations, without
//! ever blocking the server with `KEYS`.
//!
//! # Features
//!
//! - **Cursor Scanning**: Uses `SCAN` so the server keeps serving other
//!   clients while the walk is in progress.
//!
//! - **Parallel Inspection**: Thousands of keys measured concurrently, bounded
//!   by a semaphore, with results merged by a single reducer task.
//!
//! - **Exact or Estimated Sizes**: `MEMORY USAGE` on Redis 4.0+, a heuristic
//!   from element counts everywhere else.
//!
//! - **Retries**: Refused connections are retried with a fixed, cancellable
//!   delay; every other failure is reported immediately.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Redis-compatible server                      │
//! └─────────────────────────────┬───────────────────────────────────┘
//!                               │ SCAN / TYPE / MEMORY USAGE / SET
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │            RetryingExecutor (refused -> wait -> retry)           │
//! └─────────────────────────────┬───────────────────────────────────┘
//!                               │
//!        ┌──────────────────────┼───────────────────────┐
//!        ▼                      ▼                       ▼
//! ┌──────────────┐    ┌───────────────────┐    ┌─────────────────┐
//! │CursorScanner │───▶│    Aggregator     │    │   BulkSeeder    │
//! │ SCAN cursor  │keys│ semaphore + tasks │    │ N range writers │
//! └──────────────┘    │ KeyInspector each │    └─────────────────┘
//!                     └─────────┬─────────┘
//!                               │ (index, KeyRecord)
//!                               ▼
//!                     ┌───────────────────┐
//!                     │  AnalysisReport   │
//!                     └───────────────────┘
//! ```
//!
//! # Example
//!
//! ```bash
//! # Largest keys in db 2
//! redis-walker --url redis://cache:6379/2 analyze -n 10
//!
//! # Exact sizes for specific keys, as JSON
//! redis-walker batch user:1 user:2 --json
//!
//! # Write 100k benchmark keys
//! redis-walker seed --count 100000 --workers 100
//! ```

pub mod cancel;
pub mod config;
pub mod error;
pub mod info;
pub mod progress;
pub mod store;
pub mod walker;

pub use cancel::Cancellation;
pub use config::{CliArgs, Command, RedisUrl, WalkerConfig};
pub use error::{Result, StoreError, WalkerError};
pub use walker::{AnalysisReport, KeyspaceWalker, SizingStrategy};

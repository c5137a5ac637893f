//! Redis key-space walker
//!
//! This module walks a key-space with SCAN and measures keys in parallel.
//!
//! # Architecture
//!
//! ```text
//!                     ┌─────────────────────────┐
//!                     │     KeyspaceWalker      │
//!                     │  - CursorScanner (SCAN) │
//!                     │  - Aggregator (reducer) │
//!                     └───────────┬─────────────┘
//!                                 │ semaphore-bounded tasks
//!       ┌─────────────────────────┼─────────────────────────┐
//!       │                         │                         │
//! ┌─────▼─────┐             ┌─────▼─────┐             ┌─────▼─────┐
//! │  Task 1   │             │  Task 2   │             │  Task N   │
//! │  TYPE     │             │  TYPE     │             │  TYPE     │
//! │  MEMORY   │             │  MEMORY   │             │  MEMORY   │
//! └─────┬─────┘             └─────┬─────┘             └─────┬─────┘
//!       └──────────── (index, KeyRecord) over mpsc ─────────┘
//!                                 │
//!                       ┌─────────▼─────────┐
//!                       │  AnalysisReport   │
//!                       └───────────────────┘
//! ```
//!
//! The bulk seeder runs its own fixed pool of writers through the same
//! retrying executor.

pub mod aggregator;
pub mod coordinator;
pub mod editor;
pub mod inspector;
pub mod scanner;
pub mod seeder;

pub use aggregator::{AnalysisReport, AnalysisStats, Aggregator};
pub use coordinator::{KeyspaceWalker, SearchResult};
pub use editor::KeyEditor;
pub use inspector::{estimate_size, KeyDetail, KeyInspector, SizingStrategy};
pub use scanner::{CursorScanner, KeyFilter, ScanPage, ScanResult};
pub use seeder::{partition, BulkSeeder, SeedOutcome, SeedStatus};

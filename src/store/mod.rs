//! Store access module
//!
//! Everything that talks to the remote store goes through this module.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                  RetryingExecutor                    │
//! │  - Retries refused connections (5 x 3s by default)  │
//! │  - Backoff wait is cancellable                      │
//! └─────────────────────────────────────────────────────┘
//!                          │
//!                          ▼
//! ┌─────────────────────────────────────────────────────┐
//! │             CommandExecutor (trait)                  │
//! │  RedisExecutor: one multiplexed connection per DB   │
//! └─────────────────────────────────────────────────────┘
//!                          │
//!                          ▼
//! ┌─────────────────────────────────────────────────────┐
//! │              Redis-compatible server                 │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use redis_walker::cancel::Cancellation;
//! use redis_walker::store::{RedisExecutor, RetryPolicy, RetryingExecutor};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn demo() -> redis_walker::error::StoreResult<()> {
//! let executor = RedisExecutor::open("redis://127.0.0.1:6379", Duration::from_secs(30))?;
//! let store = RetryingExecutor::new(Arc::new(executor), RetryPolicy::default());
//!
//! let cancel = Cancellation::new();
//! let size = store.execute(&cancel, 0, "DBSIZE", &[]).await?.to_i64()?;
//! println!("{size} keys");
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod retry;
pub mod types;
pub mod value;

pub use connection::RedisExecutor;
pub use retry::{RetryPolicy, RetryingExecutor};
pub use types::{KeyRecord, KeyType, KeyValue, NO_TTL};
pub use value::Reply;

use crate::error::StoreResult;

/// Sends one command to the store and returns the raw reply
///
/// Implementations must be safe to share between concurrent tasks.
#[async_trait::async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Execute `command args...` against database `db`
    async fn execute(&self, db: i64, command: &str, args: &[&str]) -> StoreResult<Reply>;
}

// Re-export async_trait for implementors
pub use async_trait::async_trait;

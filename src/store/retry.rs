//! Retry wrapper for store commands
//!
//! Refused connections are the only transient failure: the server may be
//! restarting or still starting up. Those are retried with a fixed delay up
//! to a bounded number of attempts. Everything else fails immediately.

use crate::cancel::Cancellation;
use crate::error::{StoreError, StoreResult};
use crate::store::{CommandExecutor, Reply};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Default number of attempts (first try plus retries)
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default wait between attempts
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(3);

/// How often and how patiently to retry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Fixed wait between attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

/// Command executor that retries refused connections
///
/// Cloning is cheap; clones share the underlying executor.
#[derive(Clone)]
pub struct RetryingExecutor {
    inner: Arc<dyn CommandExecutor>,
    policy: RetryPolicy,
}

impl RetryingExecutor {
    /// Wrap `inner` with `policy`
    pub fn new(inner: Arc<dyn CommandExecutor>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// Active retry policy
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Execute a command, retrying while the connection is refused
    ///
    /// The cancellation is checked before every attempt and raced against
    /// every wait; once it fires the cancellation error is returned instead
    /// of the last store error.
    pub async fn execute(
        &self,
        cancel: &Cancellation,
        db: i64,
        command: &str,
        args: &[&str],
    ) -> StoreResult<Reply> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            cancel.check()?;

            let err = match self.inner.execute(db, command, args).await {
                Ok(reply) => {
                    if attempt > 1 {
                        info!(command = command, attempt = attempt, "Command succeeded after retry");
                    }
                    return Ok(reply);
                }
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => e,
            };

            if attempt == max_attempts {
                error!(
                    command = command,
                    attempts = max_attempts,
                    error = %err,
                    "Giving up on command"
                );
                last_error = Some(err);
                break;
            }

            warn!(
                command = command,
                attempt = attempt,
                max_attempts = max_attempts,
                delay_ms = self.policy.delay.as_millis() as u64,
                error = %err,
                "Connection refused, retrying"
            );
            last_error = Some(err);

            tokio::select! {
                reason = cancel.done() => return Err(reason),
                _ = tokio::time::sleep(self.policy.delay) => {}
            }
        }

        Err(StoreError::RetriesExhausted {
            command: command.to_string(),
            attempts: max_attempts,
            source: Box::new(last_error.unwrap_or(StoreError::Connection(
                "no attempt was made".to_string(),
            ))),
        })
    }
}

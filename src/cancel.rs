//! Cancellation and deadline propagation
//!
//! A [`Cancellation`] is threaded through every call that may talk to the
//! store. It combines a `CancellationToken` (fired by Ctrl-C or by a parent
//! operation) with an optional deadline. Child scopes created with
//! [`Cancellation::with_timeout`] are cancelled together with their parent
//! but never extend the parent's deadline.

use crate::error::{StoreError, StoreResult};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Cancellation signal plus optional deadline
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Cancellation {
    /// Create a root scope with no deadline
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing token (e.g. one fired by a signal handler)
    pub fn from_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Create a child scope that also expires after `timeout`
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(existing) if existing < candidate => existing,
            _ => candidate,
        };

        Self {
            token: self.token.child_token(),
            deadline: Some(deadline),
        }
    }

    /// Create a child scope that can be cancelled without touching this one
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// Fire the cancellation for this scope and all of its children
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Deadline of this scope, if any
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Underlying token
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// True once the token fired or the deadline passed
    pub fn is_done(&self) -> bool {
        self.reason().is_some()
    }

    /// Return the cancellation error if this scope is done
    pub fn check(&self) -> StoreResult<()> {
        match self.reason() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Wait until the scope is done and return why
    pub async fn done(&self) -> StoreError {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.token.cancelled() => self.reason().unwrap_or(StoreError::Cancelled),
                    _ = tokio::time::sleep_until(deadline) => StoreError::DeadlineExceeded,
                }
            }
            None => {
                self.token.cancelled().await;
                StoreError::Cancelled
            }
        }
    }

    fn reason(&self) -> Option<StoreError> {
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Some(StoreError::DeadlineExceeded);
            }
        }
        if self.token.is_cancelled() {
            return Some(StoreError::Cancelled);
        }
        None
    }
}

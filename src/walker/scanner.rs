//! Cursor-based key-space iteration
//!
//! Walks the key-space with `SCAN`, which never blocks the server the way
//! `KEYS` does. The server hands back an opaque cursor after every batch and
//! the walk ends when the cursor comes back as `"0"`. A key may be reported
//! more than once; duplicates are kept.

use crate::cancel::Cancellation;
use crate::error::{StoreError, StoreResult};
use crate::store::{Reply, RetryingExecutor};
use serde::Serialize;
use tracing::debug;

/// Cursor that starts a walk and marks its end
pub const TERMINAL_CURSOR: &str = "0";

/// Default keys requested per round-trip
pub const DEFAULT_SCAN_COUNT: usize = 1000;

/// Default ceiling on round-trips for one walk
pub const DEFAULT_MAX_ITERATIONS: u64 = 100_000;

/// One cursor round-trip
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanPage {
    /// Cursor for the next call, `"0"` when the walk is complete
    pub cursor: String,
    /// Keys returned in this batch
    pub keys: Vec<String>,
}

impl ScanPage {
    /// True when this was the final page
    pub fn is_last(&self) -> bool {
        self.cursor == TERMINAL_CURSOR
    }
}

/// Keys accumulated over a full walk
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    /// Every key seen, in the order the server returned them
    pub keys: Vec<String>,
    /// Number of keys accumulated
    pub total_count: i64,
}

/// Client-side substring filter
#[derive(Debug, Clone)]
pub struct KeyFilter {
    text: String,
    case_sensitive: bool,
    /// Lowercased needle for case-insensitive matching
    folded: String,
}

impl KeyFilter {
    pub fn new(text: impl Into<String>, case_sensitive: bool) -> Self {
        let text = text.into();
        let folded = text.to_lowercase();
        Self {
            text,
            case_sensitive,
            folded,
        }
    }

    /// Search text as given
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    /// Check whether `key` contains the search text
    ///
    /// Empty text matches every key.
    pub fn matches(&self, key: &str) -> bool {
        if self.text.is_empty() {
            return true;
        }
        if self.case_sensitive {
            key.contains(&self.text)
        } else {
            key.to_lowercase().contains(&self.folded)
        }
    }
}

/// Iterates the key-space of one database
#[derive(Clone)]
pub struct CursorScanner {
    store: RetryingExecutor,
    max_iterations: u64,
}

impl CursorScanner {
    pub fn new(store: RetryingExecutor) -> Self {
        Self {
            store,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    /// Override the round-trip ceiling
    pub fn with_max_iterations(mut self, max_iterations: u64) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    /// Fetch a single page starting at `cursor`
    pub async fn scan_page(
        &self,
        cancel: &Cancellation,
        db: i64,
        cursor: &str,
        pattern: Option<&str>,
        count: usize,
    ) -> StoreResult<ScanPage> {
        let count = count.max(1).to_string();
        let mut args = vec![cursor];
        if let Some(pattern) = pattern {
            args.push("MATCH");
            args.push(pattern);
        }
        args.push("COUNT");
        args.push(&count);

        let reply = self.store.execute(cancel, db, "SCAN", &args).await?;
        parse_scan_reply(reply)
    }

    /// Collect every key, optionally restricted to a `MATCH` pattern
    pub async fn scan_all(
        &self,
        cancel: &Cancellation,
        db: i64,
        pattern: Option<&str>,
        batch_size: usize,
    ) -> StoreResult<ScanResult> {
        let mut result = ScanResult::default();
        self.walk(cancel, db, pattern, batch_size, |key| {
            result.keys.push(key);
        })
        .await?;

        result.total_count = result.keys.len() as i64;
        Ok(result)
    }

    /// Walk every key and keep the ones `predicate` accepts
    ///
    /// No server-side pattern is used, so this touches the whole key-space
    /// on every call. Returns the matches and the number of keys examined.
    pub async fn scan_and_filter<F>(
        &self,
        cancel: &Cancellation,
        db: i64,
        predicate: F,
    ) -> StoreResult<(Vec<String>, u64)>
    where
        F: Fn(&str) -> bool,
    {
        let mut matches = Vec::new();
        let mut scanned = 0u64;

        self.walk(cancel, db, None, DEFAULT_SCAN_COUNT, |key| {
            scanned += 1;
            if predicate(&key) {
                matches.push(key);
            }
        })
        .await?;

        Ok((matches, scanned))
    }

    async fn walk<F>(
        &self,
        cancel: &Cancellation,
        db: i64,
        pattern: Option<&str>,
        batch_size: usize,
        mut visit: F,
    ) -> StoreResult<()>
    where
        F: FnMut(String),
    {
        let mut cursor = TERMINAL_CURSOR.to_string();
        let mut iterations = 0u64;

        loop {
            if iterations >= self.max_iterations {
                return Err(StoreError::MalformedReply {
                    command: "SCAN".to_string(),
                    reason: format!(
                        "cursor did not return to {} after {} iterations",
                        TERMINAL_CURSOR, self.max_iterations
                    ),
                });
            }

            let page = self.scan_page(cancel, db, &cursor, pattern, batch_size).await?;
            iterations += 1;

            let done = page.is_last();
            for key in page.keys {
                visit(key);
            }

            if done {
                break;
            }
            cursor = page.cursor;
        }

        debug!(db = db, iterations = iterations, "Key-space walk complete");
        Ok(())
    }
}

/// Decode `[cursor, [keys...]]`
fn parse_scan_reply(reply: Reply) -> StoreResult<ScanPage> {
    let malformed = |reason: String| StoreError::MalformedReply {
        command: "SCAN".to_string(),
        reason,
    };

    let mut parts = reply
        .into_array()
        .map_err(|e| malformed(e.to_string()))?;
    if parts.len() != 2 {
        return Err(malformed(format!("expected 2 elements, got {}", parts.len())));
    }

    let keys = parts.pop().unwrap_or(Reply::Nil);
    let cursor = parts
        .pop()
        .unwrap_or(Reply::Nil)
        .to_text()
        .map_err(|e| malformed(format!("cursor: {}", e)))?;
    let keys = keys
        .into_strings()
        .map_err(|e| malformed(format!("keys: {}", e)))?
        .into_iter()
        .filter(|key| !key.is_empty())
        .collect();

    Ok(ScanPage { cursor, keys })
}

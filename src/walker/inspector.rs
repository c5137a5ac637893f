//! Per-key inspection
//!
//! Resolves a key's type and memory footprint. Exact sizes come from
//! `MEMORY USAGE` (Redis 4.0+); when that is unavailable a heuristic
//! estimate is derived from the element count of the key.

use crate::cancel::Cancellation;
use crate::error::{StoreError, StoreResult};
use crate::store::{KeyRecord, KeyType, KeyValue, Reply, RetryingExecutor, NO_TTL};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Overhead added to a string's byte length
const STRING_OVERHEAD: i64 = 50;
/// Bytes per hash field
const HASH_FIELD_BYTES: i64 = 100;
/// Bytes per list element
const LIST_ELEMENT_BYTES: i64 = 50;
/// Bytes per set member
const SET_MEMBER_BYTES: i64 = 50;
/// Bytes per sorted set member
const ZSET_MEMBER_BYTES: i64 = 60;
/// Size assumed for types that cannot be measured
const UNKNOWN_TYPE_BYTES: i64 = 100;
/// Smallest estimate ever reported
const ESTIMATE_FLOOR: i64 = 50;

/// How key sizes are determined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SizingStrategy {
    /// `MEMORY USAGE` only; failures are errors
    Exact,
    /// Heuristic from the element count
    Estimate,
    /// Exact, falling back to the estimate on any failure
    #[default]
    BestEffort,
}

impl fmt::Display for SizingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SizingStrategy::Exact => "exact",
            SizingStrategy::Estimate => "estimate",
            SizingStrategy::BestEffort => "best-effort",
        };
        f.write_str(name)
    }
}

impl FromStr for SizingStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "exact" => Ok(SizingStrategy::Exact),
            "estimate" => Ok(SizingStrategy::Estimate),
            "best-effort" | "besteffort" => Ok(SizingStrategy::BestEffort),
            other => Err(format!(
                "unknown strategy '{}' (expected exact, estimate or best-effort)",
                other
            )),
        }
    }
}

/// Estimate the footprint of a key from its type and length
///
/// `length` is the byte length for strings and the element count for
/// collections; `None` means the length query failed.
pub fn estimate_size(key_type: KeyType, length: Option<i64>) -> i64 {
    let n = length.unwrap_or(0).max(0);
    let size = match key_type {
        KeyType::String => match length {
            Some(_) => n + STRING_OVERHEAD,
            None => 0,
        },
        KeyType::Hash => n * HASH_FIELD_BYTES,
        KeyType::List => n * LIST_ELEMENT_BYTES,
        KeyType::Set => n * SET_MEMBER_BYTES,
        KeyType::ZSet => n * ZSET_MEMBER_BYTES,
        KeyType::Unknown => UNKNOWN_TYPE_BYTES,
    };

    if size == 0 {
        ESTIMATE_FLOOR
    } else {
        size
    }
}

/// Everything known about a single key
#[derive(Debug, Clone, Serialize)]
pub struct KeyDetail {
    #[serde(flatten)]
    pub record: KeyRecord,
    pub value: KeyValue,
}

/// Resolves type and size of individual keys
#[derive(Clone)]
pub struct KeyInspector {
    store: RetryingExecutor,
}

impl KeyInspector {
    pub fn new(store: RetryingExecutor) -> Self {
        Self { store }
    }

    /// Build a record for `key` using `strategy`
    ///
    /// Type resolution never fails: anything unexpected becomes `Unknown`.
    /// TTL is not fetched.
    pub async fn inspect(
        &self,
        cancel: &Cancellation,
        db: i64,
        key: &str,
        strategy: SizingStrategy,
    ) -> StoreResult<KeyRecord> {
        let key_type = self.key_type(cancel, db, key).await?;

        let size = match strategy {
            SizingStrategy::Exact => self.exact_size(cancel, db, key).await?,
            SizingStrategy::Estimate => self.estimated_size(cancel, db, key, key_type).await?,
            SizingStrategy::BestEffort => match self.exact_size(cancel, db, key).await {
                Ok(size) => size,
                Err(e) if e.is_cancellation() => return Err(e),
                Err(e) => {
                    debug!(key = %key, error = %e, "Exact size unavailable, estimating");
                    self.estimated_size(cancel, db, key, key_type).await?
                }
            },
        };

        Ok(KeyRecord::new(key, key_type, size))
    }

    /// Exact memory usage of `key`
    ///
    /// A server that does not know `MEMORY` yields [`StoreError::Unsupported`].
    pub async fn exact_size(&self, cancel: &Cancellation, db: i64, key: &str) -> StoreResult<i64> {
        let reply = self
            .store
            .execute(cancel, db, "MEMORY", &["USAGE", key])
            .await
            .map_err(|e| e.into_capability("MEMORY"))?;

        if reply.is_nil() {
            return Err(StoreError::MalformedReply {
                command: "MEMORY USAGE".to_string(),
                reason: format!("nil reply for key '{}'", key),
            });
        }

        let size = reply.to_i64()?;
        if size <= 0 {
            return Err(StoreError::InvalidSize {
                key: key.to_string(),
                size,
            });
        }
        Ok(size)
    }

    /// Heuristic size of `key`
    ///
    /// A failed length query counts as length zero and yields the floor.
    pub async fn estimated_size(
        &self,
        cancel: &Cancellation,
        db: i64,
        key: &str,
        key_type: KeyType,
    ) -> StoreResult<i64> {
        let Some(command) = key_type.length_command() else {
            return Ok(estimate_size(key_type, None));
        };

        let length = match self.store.execute(cancel, db, command, &[key]).await {
            Ok(reply) => reply.to_i64().ok(),
            Err(e) if e.is_cancellation() => return Err(e),
            Err(e) => {
                debug!(key = %key, command = command, error = %e, "Length query failed");
                None
            }
        };

        Ok(estimate_size(key_type, length))
    }

    /// Resolve the type of `key`
    ///
    /// Only cancellation is reported as an error.
    pub async fn key_type(&self, cancel: &Cancellation, db: i64, key: &str) -> StoreResult<KeyType> {
        match self.store.execute(cancel, db, "TYPE", &[key]).await {
            Ok(reply) => Ok(reply
                .to_text()
                .map(|name| KeyType::from_type_reply(&name))
                .unwrap_or(KeyType::Unknown)),
            Err(e) if e.is_cancellation() => Err(e),
            Err(e) => {
                debug!(key = %key, error = %e, "Type lookup failed");
                Ok(KeyType::Unknown)
            }
        }
    }

    /// Fetch type, exact size, TTL and value of a single key
    ///
    /// Size is reported as 0 when `MEMORY USAGE` is not available.
    pub async fn detail(&self, cancel: &Cancellation, db: i64, key: &str) -> StoreResult<KeyDetail> {
        let key_type = self.key_type(cancel, db, key).await?;

        let size = match self.exact_size(cancel, db, key).await {
            Ok(size) => size,
            Err(e) if e.is_cancellation() => return Err(e),
            Err(e) => {
                debug!(key = %key, error = %e, "Exact size unavailable for detail");
                0
            }
        };

        let ttl = match self.store.execute(cancel, db, "TTL", &[key]).await {
            Ok(reply) => reply.to_i64().unwrap_or(NO_TTL),
            Err(e) if e.is_cancellation() => return Err(e),
            Err(_) => NO_TTL,
        };

        let value = self.value(cancel, db, key, key_type).await?;

        Ok(KeyDetail {
            record: KeyRecord::new(key, key_type, size).with_ttl(ttl),
            value,
        })
    }

    async fn value(
        &self,
        cancel: &Cancellation,
        db: i64,
        key: &str,
        key_type: KeyType,
    ) -> StoreResult<KeyValue> {
        let value = match key_type {
            KeyType::String => {
                let reply = self.store.execute(cancel, db, "GET", &[key]).await?;
                if reply.is_nil() {
                    KeyValue::String(String::new())
                } else {
                    KeyValue::String(reply.to_text()?)
                }
            }
            KeyType::Hash => {
                let items = self
                    .store
                    .execute(cancel, db, "HGETALL", &[key])
                    .await?
                    .into_strings()?;
                KeyValue::Hash(pairs(items, "HGETALL")?)
            }
            KeyType::List => KeyValue::List(
                self.store
                    .execute(cancel, db, "LRANGE", &[key, "0", "-1"])
                    .await?
                    .into_strings()?,
            ),
            KeyType::Set => KeyValue::Set(
                self.store
                    .execute(cancel, db, "SMEMBERS", &[key])
                    .await?
                    .into_strings()?,
            ),
            KeyType::ZSet => {
                let items = self
                    .store
                    .execute(cancel, db, "ZRANGE", &[key, "0", "-1", "WITHSCORES"])
                    .await?
                    .into_array()?;
                KeyValue::ZSet(scored_members(items)?)
            }
            KeyType::Unknown => KeyValue::Unsupported,
        };
        Ok(value)
    }
}

/// Split a flat `[field, value, field, value...]` list into pairs
fn pairs(items: Vec<String>, command: &str) -> StoreResult<Vec<(String, String)>> {
    if items.len() % 2 != 0 {
        return Err(StoreError::MalformedReply {
            command: command.to_string(),
            reason: format!("odd number of elements ({})", items.len()),
        });
    }

    let mut out = Vec::with_capacity(items.len() / 2);
    let mut iter = items.into_iter();
    while let (Some(field), Some(value)) = (iter.next(), iter.next()) {
        out.push((field, value));
    }
    Ok(out)
}

/// Decode `ZRANGE ... WITHSCORES`
///
/// RESP2 servers return a flat member/score list, RESP3 servers nest each
/// pair in its own array.
fn scored_members(items: Vec<Reply>) -> StoreResult<Vec<(String, f64)>> {
    let nested = items.iter().all(|item| matches!(item, Reply::Array(_)));
    let flat: Vec<Reply> = if nested && !items.is_empty() {
        items
            .into_iter()
            .map(Reply::into_array)
            .collect::<StoreResult<Vec<_>>>()?
            .into_iter()
            .flatten()
            .collect()
    } else {
        items
    };

    if flat.len() % 2 != 0 {
        return Err(StoreError::MalformedReply {
            command: "ZRANGE".to_string(),
            reason: format!("odd number of elements ({})", flat.len()),
        });
    }

    flat.chunks(2)
        .map(|pair| -> StoreResult<(String, f64)> { Ok((pair[0].to_text()?, pair[1].to_f64()?)) })
        .collect()
}

//! Single-key mutations
//!
//! Collections are written by replacing the key outright: the old key is
//! deleted and the new elements are pushed in one command, so a set never
//! merges with stale contents.

use crate::cancel::Cancellation;
use crate::error::{ConfigError, Result, StoreResult};
use crate::store::{KeyType, KeyValue, RetryingExecutor};
use serde_json::Value as Json;
use tracing::{debug, warn};

/// Deletes and writes individual keys
#[derive(Clone)]
pub struct KeyEditor {
    store: RetryingExecutor,
}

impl KeyEditor {
    pub fn new(store: RetryingExecutor) -> Self {
        Self { store }
    }

    /// Delete `key`, returning true when something was removed
    pub async fn delete(&self, cancel: &Cancellation, db: i64, key: &str) -> StoreResult<bool> {
        let removed = self.store.execute(cancel, db, "DEL", &[key]).await?.to_i64()?;
        debug!(key = %key, removed = removed, "Deleted key");
        Ok(removed > 0)
    }

    /// Write `value` to `key`, replacing whatever was there
    ///
    /// A positive `ttl` (seconds) sets an expiry. Empty collections leave
    /// the key deleted.
    pub async fn set(
        &self,
        cancel: &Cancellation,
        db: i64,
        key: &str,
        value: &KeyValue,
        ttl: i64,
    ) -> Result<()> {
        if let KeyValue::String(text) = value {
            let ttl_arg = ttl.to_string();
            let mut args = vec![key, text.as_str()];
            if ttl > 0 {
                args.push("EX");
                args.push(&ttl_arg);
            }
            self.store.execute(cancel, db, "SET", &args).await?;
            return Ok(());
        }

        let (command, elements) = collection_args(value)?;

        self.store.execute(cancel, db, "DEL", &[key]).await?;
        if elements.is_empty() {
            debug!(key = %key, "Empty collection, key left deleted");
            return Ok(());
        }

        let mut args = Vec::with_capacity(elements.len() + 1);
        args.push(key);
        args.extend(elements.iter().map(String::as_str));
        self.store.execute(cancel, db, command, &args).await?;

        if ttl > 0 {
            let ttl_arg = ttl.to_string();
            if let Err(e) = self.store.execute(cancel, db, "EXPIRE", &[key, &ttl_arg]).await {
                if e.is_cancellation() {
                    return Err(e.into());
                }
                warn!(key = %key, ttl = ttl, error = %e, "Failed to set expiry");
            }
        }

        Ok(())
    }
}

/// Write command and flattened arguments for a collection value
fn collection_args(value: &KeyValue) -> Result<(&'static str, Vec<String>)> {
    let args = match value {
        KeyValue::Hash(fields) => (
            "HSET",
            fields
                .iter()
                .flat_map(|(field, value)| [field.clone(), value.clone()])
                .collect(),
        ),
        KeyValue::List(items) => ("RPUSH", items.clone()),
        KeyValue::Set(members) => ("SADD", members.clone()),
        KeyValue::ZSet(members) => (
            "ZADD",
            members
                .iter()
                .flat_map(|(member, score)| [score.to_string(), member.clone()])
                .collect(),
        ),
        KeyValue::String(_) | KeyValue::Unsupported => {
            return Err(ConfigError::InvalidValue {
                key_type: value.key_type().to_string(),
                reason: "not a collection".to_string(),
            }
            .into())
        }
    };
    Ok(args)
}

/// Build a typed value from JSON given on the command line
///
/// Strings take any scalar, hashes an object of scalars, lists and sets an
/// array of scalars, sorted sets an object mapping member to score.
pub fn parse_value(key_type: KeyType, json: &Json) -> std::result::Result<KeyValue, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidValue {
        key_type: key_type.to_string(),
        reason: reason.to_string(),
    };

    match key_type {
        KeyType::String => scalar(json)
            .map(KeyValue::String)
            .ok_or_else(|| invalid("expected a string or number")),
        KeyType::Hash => {
            let object = json.as_object().ok_or_else(|| invalid("expected an object"))?;
            let fields = object
                .iter()
                .map(|(field, value)| {
                    scalar(value)
                        .map(|value| (field.clone(), value))
                        .ok_or_else(|| invalid("hash values must be scalars"))
                })
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(KeyValue::Hash(fields))
        }
        KeyType::List | KeyType::Set => {
            let array = json.as_array().ok_or_else(|| invalid("expected an array"))?;
            let items = array
                .iter()
                .map(|item| scalar(item).ok_or_else(|| invalid("elements must be scalars")))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(if key_type == KeyType::List {
                KeyValue::List(items)
            } else {
                KeyValue::Set(items)
            })
        }
        KeyType::ZSet => {
            let object = json
                .as_object()
                .ok_or_else(|| invalid("expected an object of member to score"))?;
            let members = object
                .iter()
                .map(|(member, score)| {
                    score
                        .as_f64()
                        .map(|score| (member.clone(), score))
                        .ok_or_else(|| invalid("scores must be numbers"))
                })
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(KeyValue::ZSet(members))
        }
        KeyType::Unknown => Err(invalid("type must be string, hash, list, set or zset")),
    }
}

fn scalar(json: &Json) -> Option<String> {
    match json {
        Json::String(s) => Some(s.clone()),
        Json::Number(n) => Some(n.to_string()),
        Json::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

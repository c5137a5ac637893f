//! Server overview
//!
//! Parses `INFO` output into a flat key/value map and the `# Keyspace`
//! section into per-database counters.

use crate::cancel::Cancellation;
use crate::error::StoreResult;
use crate::store::RetryingExecutor;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

/// Key counters for one logical database
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseInfo {
    pub database: i64,
    pub keys: i64,
    pub expires: i64,
    pub avg_ttl: i64,
}

/// Parsed `INFO` plus keyspace counters
#[derive(Debug, Clone, Default, Serialize)]
pub struct ServerOverview {
    pub info: BTreeMap<String, String>,
    pub keyspace: Vec<DatabaseInfo>,
}

impl ServerOverview {
    /// Look up a single INFO field
    pub fn get(&self, field: &str) -> Option<&str> {
        self.info.get(field).map(String::as_str)
    }
}

/// Parse `field:value` lines, skipping section headers and blanks
pub fn parse_info(text: &str) -> BTreeMap<String, String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once(':'))
        .map(|(field, value)| (field.trim().to_string(), value.trim().to_string()))
        .collect()
}

/// Parse `dbN:keys=..,expires=..,avg_ttl=..` lines
///
/// Unknown counters are ignored and unparsable numbers read as 0.
pub fn parse_keyspace(text: &str) -> Vec<DatabaseInfo> {
    text.lines()
        .map(str::trim)
        .filter(|line| line.starts_with("db"))
        .filter_map(|line| line.split_once(':'))
        .map(|(name, stats)| {
            let mut info = DatabaseInfo {
                database: name.trim_start_matches("db").parse().unwrap_or(0),
                ..Default::default()
            };

            for stat in stats.split(',') {
                let Some((counter, value)) = stat.split_once('=') else {
                    continue;
                };
                let value = value.trim().parse().unwrap_or(0);
                match counter.trim() {
                    "keys" => info.keys = value,
                    "expires" => info.expires = value,
                    "avg_ttl" => info.avg_ttl = value,
                    _ => {}
                }
            }
            info
        })
        .collect()
}

/// Fetch `INFO` and `INFO keyspace` through the connection for `db`
pub async fn overview(
    store: &RetryingExecutor,
    cancel: &Cancellation,
    db: i64,
) -> StoreResult<ServerOverview> {
    let info = store.execute(cancel, db, "INFO", &[]).await?.to_text()?;
    let keyspace = store
        .execute(cancel, db, "INFO", &["keyspace"])
        .await?
        .to_text()?;

    Ok(ServerOverview {
        info: parse_info(&info),
        keyspace: parse_keyspace(&keyspace),
    })
}

/// List databases that hold keys
///
/// A server with an empty keyspace still reports `db0`.
pub async fn databases(
    store: &RetryingExecutor,
    cancel: &Cancellation,
) -> StoreResult<Vec<DatabaseInfo>> {
    let keyspace = store
        .execute(cancel, 0, "INFO", &["keyspace"])
        .await?
        .to_text()?;

    let mut databases = parse_keyspace(&keyspace);
    if databases.is_empty() {
        databases.push(DatabaseInfo::default());
    }

    debug!(count = databases.len(), "Listed databases");
    Ok(databases)
}

/// Number of keys in `db`, 0 when the server cannot say
pub async fn db_size(store: &RetryingExecutor, cancel: &Cancellation, db: i64) -> StoreResult<i64> {
    match store.execute(cancel, db, "DBSIZE", &[]).await {
        Ok(reply) => Ok(reply.to_i64().unwrap_or(0)),
        Err(e) if e.is_cancellation() => Err(e),
        Err(e) => {
            debug!(db = db, error = %e, "DBSIZE failed");
            Ok(0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INFO: &str = "# Server\r\nredis_version:7.2.4\r\nredis_mode:standalone\r\n\r\n# Memory\r\nused_memory_human:1.05M\r\nbad line\r\n";

    #[test]
    fn test_parse_info() {
        let info = parse_info(INFO);
        assert_eq!(info.get("redis_version").map(String::as_str), Some("7.2.4"));
        assert_eq!(info.get("used_memory_human").map(String::as_str), Some("1.05M"));
        assert_eq!(info.len(), 3);
    }

    #[test]
    fn test_parse_info_keeps_colons_in_values() {
        let info = parse_info("executable:/usr/bin/redis-server\nconfig_file:C:\\redis.conf\n");
        assert_eq!(
            info.get("config_file").map(String::as_str),
            Some("C:\\redis.conf")
        );
    }

    #[test]
    fn test_parse_keyspace() {
        let text = "# Keyspace\r\ndb0:keys=12,expires=3,avg_ttl=4500\r\ndb5:keys=1,expires=0,avg_ttl=0,subexpiry=0\r\n";
        let dbs = parse_keyspace(text);
        assert_eq!(
            dbs,
            vec![
                DatabaseInfo {
                    database: 0,
                    keys: 12,
                    expires: 3,
                    avg_ttl: 4500
                },
                DatabaseInfo {
                    database: 5,
                    keys: 1,
                    expires: 0,
                    avg_ttl: 0
                },
            ]
        );
    }

    #[test]
    fn test_parse_empty_keyspace() {
        assert!(parse_keyspace("# Keyspace\r\n").is_empty());
        assert!(parse_keyspace("").is_empty());
    }
}

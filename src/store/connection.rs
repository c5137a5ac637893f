//! Redis-backed command executor
//!
//! Keeps one multiplexed connection per logical database. Each connection
//! is opened lazily with the database selected in its connection info, so
//! concurrent callers never race on `SELECT`. Multiplexed connections are
//! cheap to clone and safe for concurrent use.

use crate::error::{StoreError, StoreResult};
use crate::store::{CommandExecutor, Reply};
use redis::aio::MultiplexedConnection;
use redis::{Client, RedisError};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

/// Default connect timeout for new connections
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Command executor backed by the `redis` crate
pub struct RedisExecutor {
    client: Client,
    /// Address for error messages
    addr: String,
    /// Response timeout applied to every command
    response_timeout: Duration,
    /// Open connections keyed by database index
    connections: Mutex<HashMap<i64, MultiplexedConnection>>,
}

impl RedisExecutor {
    /// Create an executor for `url` without connecting yet
    pub fn open(url: &str, response_timeout: Duration) -> StoreResult<Self> {
        let client = Client::open(url).map_err(|e| StoreError::Connection(e.to_string()))?;
        let addr = client.get_connection_info().addr.to_string();

        Ok(Self {
            client,
            addr,
            response_timeout,
            connections: Mutex::new(HashMap::new()),
        })
    }

    /// Address this executor connects to
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Get (or open) the connection for `db`
    async fn connection(&self, db: i64) -> StoreResult<MultiplexedConnection> {
        let mut connections = self.connections.lock().await;
        if let Some(conn) = connections.get(&db) {
            return Ok(conn.clone());
        }

        let mut info = self.client.get_connection_info().clone();
        info.redis.db = db;
        let client = Client::open(info).map_err(|e| StoreError::Connection(e.to_string()))?;

        debug!(addr = %self.addr, db = db, "Opening store connection");
        let conn = client
            .get_multiplexed_async_connection_with_timeouts(self.response_timeout, CONNECT_TIMEOUT)
            .await
            .map_err(|e| self.map_error("CONNECT", e))?;

        connections.insert(db, conn.clone());
        Ok(conn)
    }

    /// Forget a broken connection so the next call reconnects
    async fn evict(&self, db: i64) {
        self.connections.lock().await.remove(&db);
    }

    /// Classify a client error
    fn map_error(&self, command: &str, e: RedisError) -> StoreError {
        if e.is_connection_refusal() {
            StoreError::ConnectionRefused {
                reason: format!("{}: {}", self.addr, e),
            }
        } else if e.is_io_error() || e.is_timeout() || e.is_connection_dropped() {
            StoreError::Connection(e.to_string())
        } else {
            StoreError::Server {
                command: command.to_string(),
                message: e.to_string(),
            }
        }
    }
}

#[async_trait::async_trait]
impl CommandExecutor for RedisExecutor {
    async fn execute(&self, db: i64, command: &str, args: &[&str]) -> StoreResult<Reply> {
        let mut conn = self.connection(db).await?;

        let mut cmd = redis::cmd(command);
        for arg in args {
            cmd.arg(*arg);
        }

        match cmd.query_async::<redis::Value>(&mut conn).await {
            Ok(value) => Ok(Reply::from(value)),
            Err(e) => {
                if e.is_connection_dropped() || e.is_io_error() {
                    self.evict(db).await;
                }
                Err(self.map_error(command, e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_does_not_connect() {
        let executor =
            RedisExecutor::open("redis://127.0.0.1:6399/2", Duration::from_secs(1)).unwrap();
        assert!(executor.addr().contains("6399"));
    }

    #[test]
    fn test_open_rejects_bad_scheme() {
        assert!(RedisExecutor::open("http://localhost", Duration::from_secs(1)).is_err());
    }
}

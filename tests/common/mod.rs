//! In-memory store used by the integration tests
//!
//! Understands the subset of commands the walker issues and can inject
//! faults: refused connections, missing `MEMORY USAGE`, failing keys,
//! a cursor that never completes and per-command latency.

#![allow(dead_code)]

use redis_walker::error::{StoreError, StoreResult};
use redis_walker::store::{CommandExecutor, Reply, RetryPolicy, RetryingExecutor};
use redis_walker::walker::KeyspaceWalker;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Hash(Vec<(String, String)>),
    List(Vec<String>),
    Set(Vec<String>),
    ZSet(Vec<(String, f64)>),
    /// A type the walker does not size
    Stream,
}

impl Value {
    fn type_name(&self) -> &'static str {
        match self {
            Value::Str(_) => "string",
            Value::Hash(_) => "hash",
            Value::List(_) => "list",
            Value::Set(_) => "set",
            Value::ZSet(_) => "zset",
            Value::Stream => "stream",
        }
    }

    fn len(&self) -> i64 {
        match self {
            Value::Str(s) => s.len() as i64,
            Value::Hash(f) => f.len() as i64,
            Value::List(l) | Value::Set(l) => l.len() as i64,
            Value::ZSet(z) => z.len() as i64,
            Value::Stream => 0,
        }
    }
}

#[derive(Debug, Clone)]
struct Slot {
    value: Value,
    ttl: i64,
}

#[derive(Default)]
struct Faults {
    refuse_first: u32,
    memory_unsupported: bool,
    memory_only_for: Option<HashSet<String>>,
    failing_keys: HashSet<String>,
    endless_cursor: bool,
    latency: Option<Duration>,
}

/// Fake Redis server
#[derive(Default)]
pub struct FakeStore {
    data: Mutex<HashMap<i64, BTreeMap<String, Slot>>>,
    memory: Mutex<HashMap<String, i64>>,
    calls: Mutex<HashMap<String, usize>>,
    total_calls: AtomicU32,
    faults: Faults,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(self, db: i64, key: &str, value: Value) -> Self {
        self.data
            .lock()
            .unwrap()
            .entry(db)
            .or_default()
            .insert(key.to_string(), Slot { value, ttl: -1 });
        self
    }

    pub fn with_string(self, key: &str, value: &str) -> Self {
        self.with_value(0, key, Value::Str(value.to_string()))
    }

    pub fn with_hash(self, key: &str, fields: &[(&str, &str)]) -> Self {
        let fields = fields
            .iter()
            .map(|(f, v)| (f.to_string(), v.to_string()))
            .collect();
        self.with_value(0, key, Value::Hash(fields))
    }

    pub fn with_list(self, key: &str, items: &[&str]) -> Self {
        self.with_value(0, key, Value::List(items.iter().map(|s| s.to_string()).collect()))
    }

    pub fn with_set(self, key: &str, members: &[&str]) -> Self {
        self.with_value(0, key, Value::Set(members.iter().map(|s| s.to_string()).collect()))
    }

    pub fn with_zset(self, key: &str, members: &[(&str, f64)]) -> Self {
        let members = members.iter().map(|(m, s)| (m.to_string(), *s)).collect();
        self.with_value(0, key, Value::ZSet(members))
    }

    pub fn with_stream(self, key: &str) -> Self {
        self.with_value(0, key, Value::Stream)
    }

    /// Fill db 0 with `count` string keys named `prefix0..`
    pub fn with_strings(mut self, prefix: &str, count: usize) -> Self {
        for i in 0..count {
            self = self.with_string(&format!("{}{}", prefix, i), &"x".repeat(i % 7 + 1));
        }
        self
    }

    /// Exact size reported by MEMORY USAGE for `key`
    pub fn with_memory(self, key: &str, bytes: i64) -> Self {
        self.memory.lock().unwrap().insert(key.to_string(), bytes);
        self
    }

    pub fn refuse_first(mut self, n: u32) -> Self {
        self.faults.refuse_first = n;
        self
    }

    pub fn without_memory_usage(mut self) -> Self {
        self.faults.memory_unsupported = true;
        self
    }

    /// MEMORY USAGE answers for `keys` only; every other key gets
    /// "unknown command"
    pub fn with_memory_usage_only_for(mut self, keys: &[&str]) -> Self {
        self.faults.memory_only_for = Some(keys.iter().map(|k| k.to_string()).collect());
        self
    }

    /// Every command touching `key`, except TYPE, fails
    pub fn fail_key(mut self, key: &str) -> Self {
        self.faults.failing_keys.insert(key.to_string());
        self
    }

    pub fn endless_cursor(mut self) -> Self {
        self.faults.endless_cursor = true;
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.faults.latency = Some(latency);
        self
    }

    /// Number of times `command` was issued (refused attempts included)
    pub fn calls(&self, command: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .get(&command.to_uppercase())
            .copied()
            .unwrap_or(0)
    }

    pub fn total_calls(&self) -> u32 {
        self.total_calls.load(Ordering::SeqCst)
    }

    pub fn get(&self, db: i64, key: &str) -> Option<Value> {
        self.data
            .lock()
            .unwrap()
            .get(&db)
            .and_then(|keys| keys.get(key))
            .map(|slot| slot.value.clone())
    }

    pub fn ttl(&self, db: i64, key: &str) -> Option<i64> {
        self.data
            .lock()
            .unwrap()
            .get(&db)
            .and_then(|keys| keys.get(key))
            .map(|slot| slot.ttl)
    }

    pub fn len(&self, db: i64) -> usize {
        self.data
            .lock()
            .unwrap()
            .get(&db)
            .map(|keys| keys.len())
            .unwrap_or(0)
    }

    /// Size MEMORY USAGE reports for `key`
    pub fn memory_of(&self, key: &str) -> i64 {
        if let Some(bytes) = self.memory.lock().unwrap().get(key) {
            return *bytes;
        }
        let data = self.data.lock().unwrap();
        data.values()
            .find_map(|keys| keys.get(key))
            .map(|slot| 40 + slot.value.len() * 16)
            .unwrap_or(0)
    }

    fn handle(&self, db: i64, command: &str, args: &[&str]) -> StoreResult<Reply> {
        let key = args.first().copied().unwrap_or("");
        let touches_key = !matches!(command, "SCAN" | "DBSIZE" | "INFO" | "TYPE" | "MEMORY");
        let memory_key = if command == "MEMORY" {
            args.get(1).copied().unwrap_or("")
        } else {
            key
        };
        if (touches_key && self.faults.failing_keys.contains(key))
            || (command == "MEMORY" && self.faults.failing_keys.contains(memory_key))
        {
            return Err(server_error(command, "ERR simulated failure"));
        }

        let mut data = self.data.lock().unwrap();
        let keys = data.entry(db).or_default();

        match command {
            "SCAN" => Ok(self.scan(keys, args)),
            "DBSIZE" => Ok(Reply::Int(keys.len() as i64)),
            "INFO" => {
                drop(data);
                Ok(Reply::Str(self.info(args.first().copied())))
            }
            "TYPE" => Ok(Reply::Str(
                keys.get(key)
                    .map(|slot| slot.value.type_name())
                    .unwrap_or("none")
                    .to_string(),
            )),
            "MEMORY" => {
                let answered = self
                    .faults
                    .memory_only_for
                    .as_ref()
                    .map_or(true, |only| only.contains(memory_key));
                if self.faults.memory_unsupported || !answered {
                    return Err(server_error(
                        "MEMORY",
                        "ERR unknown command 'MEMORY', with args beginning with: 'USAGE'",
                    ));
                }
                if !keys.contains_key(memory_key) {
                    return Ok(Reply::Nil);
                }
                drop(data);
                Ok(Reply::Int(self.memory_of(memory_key)))
            }
            "STRLEN" | "HLEN" | "LLEN" | "SCARD" | "ZCARD" => {
                Ok(Reply::Int(keys.get(key).map(|slot| slot.value.len()).unwrap_or(0)))
            }
            "TTL" => Ok(Reply::Int(keys.get(key).map(|slot| slot.ttl).unwrap_or(-2))),
            "GET" => Ok(match keys.get(key).map(|slot| &slot.value) {
                Some(Value::Str(s)) => Reply::Str(s.clone()),
                _ => Reply::Nil,
            }),
            "HGETALL" => Ok(match keys.get(key).map(|slot| &slot.value) {
                Some(Value::Hash(fields)) => strings(
                    fields
                        .iter()
                        .flat_map(|(f, v)| [f.clone(), v.clone()])
                        .collect(),
                ),
                _ => Reply::Array(vec![]),
            }),
            "LRANGE" => Ok(match keys.get(key).map(|slot| &slot.value) {
                Some(Value::List(items)) => strings(items.clone()),
                _ => Reply::Array(vec![]),
            }),
            "SMEMBERS" => Ok(match keys.get(key).map(|slot| &slot.value) {
                Some(Value::Set(members)) => strings(members.clone()),
                _ => Reply::Array(vec![]),
            }),
            "ZRANGE" => Ok(match keys.get(key).map(|slot| &slot.value) {
                Some(Value::ZSet(members)) => {
                    let mut sorted = members.clone();
                    sorted.sort_by(|a, b| a.1.total_cmp(&b.1));
                    strings(
                        sorted
                            .into_iter()
                            .flat_map(|(m, s)| [m, s.to_string()])
                            .collect(),
                    )
                }
                _ => Reply::Array(vec![]),
            }),
            "SET" => {
                let value = args.get(1).copied().unwrap_or("");
                let ttl = match (args.get(2), args.get(3)) {
                    (Some(&"EX"), Some(secs)) => secs.parse().unwrap_or(-1),
                    _ => -1,
                };
                keys.insert(
                    key.to_string(),
                    Slot {
                        value: Value::Str(value.to_string()),
                        ttl,
                    },
                );
                Ok(Reply::Str("OK".into()))
            }
            "DEL" => {
                let removed = args.iter().filter(|k| keys.remove(**k).is_some()).count();
                Ok(Reply::Int(removed as i64))
            }
            "EXPIRE" => {
                let secs = args.get(1).and_then(|s| s.parse().ok()).unwrap_or(-1);
                Ok(Reply::Int(match keys.get_mut(key) {
                    Some(slot) => {
                        slot.ttl = secs;
                        1
                    }
                    None => 0,
                }))
            }
            "HSET" | "RPUSH" | "SADD" | "ZADD" => {
                let rest: Vec<String> = args[1..].iter().map(|s| s.to_string()).collect();
                let value = match command {
                    "HSET" => Value::Hash(
                        rest.chunks(2)
                            .map(|p| (p[0].clone(), p[1].clone()))
                            .collect(),
                    ),
                    "RPUSH" => Value::List(rest),
                    "SADD" => Value::Set(rest),
                    _ => Value::ZSet(
                        rest.chunks(2)
                            .map(|p| (p[1].clone(), p[0].parse().unwrap_or(0.0)))
                            .collect(),
                    ),
                };
                let added = value.len();
                keys.insert(key.to_string(), Slot { value, ttl: -1 });
                Ok(Reply::Int(added))
            }
            other => Err(server_error(other, &format!("ERR unknown command '{}'", other))),
        }
    }

    fn scan(&self, keys: &BTreeMap<String, Slot>, args: &[&str]) -> Reply {
        if self.faults.endless_cursor {
            return Reply::Array(vec![Reply::Str("1".into()), Reply::Array(vec![])]);
        }

        let cursor: usize = args.first().and_then(|c| c.parse().ok()).unwrap_or(0);
        let mut pattern = None;
        let mut count = 10usize;
        let mut i = 1;
        while i + 1 < args.len() {
            match args[i] {
                "MATCH" => pattern = Some(args[i + 1]),
                "COUNT" => count = args[i + 1].parse().unwrap_or(10),
                _ => {}
            }
            i += 2;
        }

        let all: Vec<&String> = keys.keys().collect();
        let end = (cursor + count).min(all.len());
        let batch: Vec<Reply> = all[cursor.min(all.len())..end]
            .iter()
            .filter(|k| pattern.map_or(true, |p| glob_match(p, k)))
            .map(|k| Reply::Str((*k).clone()))
            .collect();
        let next = if end >= all.len() { 0 } else { end };

        Reply::Array(vec![Reply::Str(next.to_string()), Reply::Array(batch)])
    }

    fn info(&self, section: Option<&str>) -> String {
        let data = self.data.lock().unwrap();
        let mut dbs: Vec<_> = data.iter().filter(|(_, keys)| !keys.is_empty()).collect();
        dbs.sort_by_key(|(db, _)| **db);

        let mut keyspace = String::from("# Keyspace\r\n");
        for (db, keys) in dbs {
            let expires = keys.values().filter(|slot| slot.ttl > 0).count();
            keyspace.push_str(&format!(
                "db{}:keys={},expires={},avg_ttl=0\r\n",
                db,
                keys.len(),
                expires
            ));
        }

        match section {
            Some("keyspace") => keyspace,
            _ => format!(
                "# Server\r\nredis_version:7.2.4\r\nredis_mode:standalone\r\n\r\n# Memory\r\nused_memory_human:1.00M\r\n\r\n{}",
                keyspace
            ),
        }
    }
}

#[redis_walker::store::async_trait]
impl CommandExecutor for FakeStore {
    async fn execute(&self, db: i64, command: &str, args: &[&str]) -> StoreResult<Reply> {
        let n = self.total_calls.fetch_add(1, Ordering::SeqCst);
        *self
            .calls
            .lock()
            .unwrap()
            .entry(command.to_uppercase())
            .or_default() += 1;

        if let Some(latency) = self.faults.latency {
            tokio::time::sleep(latency).await;
        }

        if n < self.faults.refuse_first {
            return Err(StoreError::ConnectionRefused {
                reason: "127.0.0.1:6379: Connection refused (os error 111)".into(),
            });
        }

        self.handle(db, &command.to_uppercase(), args)
    }
}

fn server_error(command: &str, message: &str) -> StoreError {
    StoreError::Server {
        command: command.to_string(),
        message: message.to_string(),
    }
}

fn strings(items: Vec<String>) -> Reply {
    Reply::Array(items.into_iter().map(Reply::Str).collect())
}

/// Minimal glob supporting `*` and `?`
pub fn glob_match(pattern: &str, text: &str) -> bool {
    fn matches(p: &[char], t: &[char]) -> bool {
        match (p.first(), t.first()) {
            (None, None) => true,
            (Some('*'), _) => matches(&p[1..], t) || (!t.is_empty() && matches(p, &t[1..])),
            (Some('?'), Some(_)) => matches(&p[1..], &t[1..]),
            (Some(a), Some(b)) if a == b => matches(&p[1..], &t[1..]),
            _ => false,
        }
    }
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    matches(&p, &t)
}

/// Default retry policy with a short delay
pub fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 5,
        delay: Duration::from_millis(10),
    }
}

pub fn retrying(store: &Arc<FakeStore>, policy: RetryPolicy) -> RetryingExecutor {
    RetryingExecutor::new(store.clone(), policy)
}

pub fn walker(store: &Arc<FakeStore>) -> KeyspaceWalker {
    KeyspaceWalker::new(retrying(store, fast_policy()))
}

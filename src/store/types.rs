//! Key types and records
//!
//! These types describe keys as the walker reports them. They are plain
//! data, serializable for JSON output, and immutable once built.

use serde::Serialize;
use std::fmt;

/// TTL sentinel for keys without expiry or when TTL was not fetched
pub const NO_TTL: i64 = -1;

/// Data type of a key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyType {
    /// String value
    String,
    /// Hash of fields
    Hash,
    /// List of elements
    List,
    /// Unordered set
    Set,
    /// Sorted set
    ZSet,
    /// Anything else, or a type that could not be resolved
    Unknown,
}

impl KeyType {
    /// Parse the reply of the TYPE command
    ///
    /// `none` (missing or expired key), empty replies and types the walker
    /// does not size (streams, modules) all map to `Unknown`.
    pub fn from_type_reply(name: &str) -> Self {
        match name.trim() {
            "string" => KeyType::String,
            "hash" => KeyType::Hash,
            "list" => KeyType::List,
            "set" => KeyType::Set,
            "zset" => KeyType::ZSet,
            _ => KeyType::Unknown,
        }
    }

    /// Name as the store spells it
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyType::String => "string",
            KeyType::Hash => "hash",
            KeyType::List => "list",
            KeyType::Set => "set",
            KeyType::ZSet => "zset",
            KeyType::Unknown => "unknown",
        }
    }

    /// Command returning the element count (or byte length for strings)
    pub fn length_command(&self) -> Option<&'static str> {
        match self {
            KeyType::String => Some("STRLEN"),
            KeyType::Hash => Some("HLEN"),
            KeyType::List => Some("LLEN"),
            KeyType::Set => Some("SCARD"),
            KeyType::ZSet => Some("ZCARD"),
            KeyType::Unknown => None,
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Memory footprint of one key
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyRecord {
    /// Key name
    pub name: String,

    /// Resolved data type
    #[serde(rename = "type")]
    pub key_type: KeyType,

    /// Size in bytes (exact or estimated)
    pub size_bytes: i64,

    /// Seconds until expiry, `NO_TTL` when none or not fetched
    pub ttl_seconds: i64,
}

impl KeyRecord {
    /// Create a record without TTL information
    pub fn new(name: impl Into<String>, key_type: KeyType, size_bytes: i64) -> Self {
        Self {
            name: name.into(),
            key_type,
            size_bytes,
            ttl_seconds: NO_TTL,
        }
    }

    /// Attach a TTL
    pub fn with_ttl(mut self, ttl_seconds: i64) -> Self {
        self.ttl_seconds = ttl_seconds;
        self
    }
}

/// Full value of a key, by type
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "lowercase")]
pub enum KeyValue {
    /// String contents
    String(String),
    /// Field/value pairs
    Hash(Vec<(String, String)>),
    /// Elements in order
    List(Vec<String>),
    /// Members
    Set(Vec<String>),
    /// Member/score pairs in score order
    ZSet(Vec<(String, f64)>),
    /// Type the walker cannot read
    Unsupported,
}

impl KeyValue {
    /// Type of key this value is stored as
    pub fn key_type(&self) -> KeyType {
        match self {
            KeyValue::String(_) => KeyType::String,
            KeyValue::Hash(_) => KeyType::Hash,
            KeyValue::List(_) => KeyType::List,
            KeyValue::Set(_) => KeyType::Set,
            KeyValue::ZSet(_) => KeyType::ZSet,
            KeyValue::Unsupported => KeyType::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_reply_parsing() {
        assert_eq!(KeyType::from_type_reply("zset"), KeyType::ZSet);
        assert_eq!(KeyType::from_type_reply("hash\r\n"), KeyType::Hash);
        assert_eq!(KeyType::from_type_reply("none"), KeyType::Unknown);
        assert_eq!(KeyType::from_type_reply(""), KeyType::Unknown);
        assert_eq!(KeyType::from_type_reply("stream"), KeyType::Unknown);
    }

    #[test]
    fn test_length_commands() {
        assert_eq!(KeyType::String.length_command(), Some("STRLEN"));
        assert_eq!(KeyType::ZSet.length_command(), Some("ZCARD"));
        assert_eq!(KeyType::Unknown.length_command(), None);
    }

    #[test]
    fn test_record_serialization() {
        let record = KeyRecord::new("user:1", KeyType::Hash, 300);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["name"], "user:1");
        assert_eq!(json["type"], "hash");
        assert_eq!(json["sizeBytes"], 300);
        assert_eq!(json["ttlSeconds"], -1);
    }
}

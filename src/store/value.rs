//! Dynamically typed command replies
//!
//! Store replies arrive untyped. [`Reply`] is the tagged form every
//! component works with; the coercion helpers are fallible and report a
//! [`StoreError::Coercion`] instead of guessing.

use crate::error::{StoreError, StoreResult};

/// A single reply from the store
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Missing value
    Nil,
    /// Integer reply
    Int(i64),
    /// Floating point reply (RESP3 doubles)
    Float(f64),
    /// Bulk or status string
    Str(String),
    /// Nested sequence
    Array(Vec<Reply>),
}

impl Reply {
    /// Short name of the reply shape, used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Reply::Nil => "nil",
            Reply::Int(_) => "integer",
            Reply::Float(_) => "float",
            Reply::Str(_) => "string",
            Reply::Array(_) => "array",
        }
    }

    /// Returns true for a nil reply
    pub fn is_nil(&self) -> bool {
        matches!(self, Reply::Nil)
    }

    /// Read the reply as text
    pub fn to_text(&self) -> StoreResult<String> {
        match self {
            Reply::Str(s) => Ok(s.clone()),
            Reply::Int(n) => Ok(n.to_string()),
            Reply::Float(f) => Ok(f.to_string()),
            other => Err(other.coercion("string")),
        }
    }

    /// Read the reply as a signed integer
    ///
    /// Numeric strings are parsed; floats are truncated.
    pub fn to_i64(&self) -> StoreResult<i64> {
        match self {
            Reply::Int(n) => Ok(*n),
            Reply::Float(f) if f.is_finite() => Ok(f.trunc() as i64),
            Reply::Str(s) => s.trim().parse::<i64>().map_err(|_| self.coercion("integer")),
            other => Err(other.coercion("integer")),
        }
    }

    /// Read the reply as a float
    pub fn to_f64(&self) -> StoreResult<f64> {
        match self {
            Reply::Float(f) => Ok(*f),
            Reply::Int(n) => Ok(*n as f64),
            Reply::Str(s) => s.trim().parse::<f64>().map_err(|_| self.coercion("float")),
            other => Err(other.coercion("float")),
        }
    }

    /// Take the reply as a sequence
    pub fn into_array(self) -> StoreResult<Vec<Reply>> {
        match self {
            Reply::Array(items) => Ok(items),
            other => Err(other.coercion("array")),
        }
    }

    /// Take the reply as a list of strings, skipping nil elements
    pub fn into_strings(self) -> StoreResult<Vec<String>> {
        self.into_array()?
            .iter()
            .filter(|item| !item.is_nil())
            .map(Reply::to_text)
            .collect()
    }

    fn coercion(&self, expected: &'static str) -> StoreError {
        StoreError::Coercion {
            expected,
            actual: self.kind(),
        }
    }
}

impl From<redis::Value> for Reply {
    fn from(value: redis::Value) -> Self {
        use redis::Value;

        match value {
            Value::Nil => Reply::Nil,
            Value::Int(n) => Reply::Int(n),
            Value::Double(f) => Reply::Float(f),
            Value::Boolean(b) => Reply::Int(b as i64),
            Value::BulkString(bytes) => Reply::Str(String::from_utf8_lossy(&bytes).into_owned()),
            Value::SimpleString(s) => Reply::Str(s),
            Value::VerbatimString { text, .. } => Reply::Str(text),
            Value::Okay => Reply::Str("OK".to_string()),
            Value::Array(items) | Value::Set(items) => {
                Reply::Array(items.into_iter().map(Reply::from).collect())
            }
            Value::Map(pairs) => Reply::Array(
                pairs
                    .into_iter()
                    .flat_map(|(k, v)| [Reply::from(k), Reply::from(v)])
                    .collect(),
            ),
            other => Reply::Str(format!("{:?}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_coercion() {
        assert_eq!(Reply::Int(42).to_i64().unwrap(), 42);
        assert_eq!(Reply::Str(" 17 ".into()).to_i64().unwrap(), 17);
        assert_eq!(Reply::Float(3.9).to_i64().unwrap(), 3);
        assert!(Reply::Nil.to_i64().is_err());
        assert!(Reply::Str("abc".into()).to_i64().is_err());
    }

    #[test]
    fn test_text_coercion() {
        assert_eq!(Reply::Str("hash".into()).to_text().unwrap(), "hash");
        assert_eq!(Reply::Int(0).to_text().unwrap(), "0");
        assert!(Reply::Array(vec![]).to_text().is_err());
    }

    #[test]
    fn test_float_coercion() {
        assert_eq!(Reply::Str("1.5".into()).to_f64().unwrap(), 1.5);
        assert_eq!(Reply::Int(2).to_f64().unwrap(), 2.0);
    }

    #[test]
    fn test_coercion_error_names_shapes() {
        let err = Reply::Nil.into_array().unwrap_err();
        assert_eq!(err.to_string(), "Cannot read nil reply as array");
    }

    #[test]
    fn test_into_strings_skips_nil() {
        let reply = Reply::Array(vec![Reply::Str("a".into()), Reply::Nil, Reply::Int(7)]);
        assert_eq!(reply.into_strings().unwrap(), vec!["a", "7"]);
    }

    #[test]
    fn test_from_redis_value() {
        let value = redis::Value::Array(vec![
            redis::Value::BulkString(b"17".to_vec()),
            redis::Value::Array(vec![redis::Value::BulkString(b"user:1".to_vec())]),
        ]);
        let reply = Reply::from(value);
        assert_eq!(
            reply,
            Reply::Array(vec![
                Reply::Str("17".into()),
                Reply::Array(vec![Reply::Str("user:1".into())]),
            ])
        );
        assert_eq!(Reply::from(redis::Value::Okay), Reply::Str("OK".into()));
    }
}

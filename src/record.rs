//! Cached record type
//!
//! A [`Record`] is the unit handed to the cache by the content pipeline: a
//! stable key, an opaque payload and the time it was produced. Storing a
//! record is always an upsert by key.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Last timestamp handed out by [`monotonic_millis`]
static LAST_TIMESTAMP: AtomicU64 = AtomicU64::new(0);

/// Milliseconds since the Unix epoch, strictly increasing within the process
///
/// Two records produced in the same millisecond still get distinct,
/// ordered timestamps, so last-write-wins is well defined.
pub fn monotonic_millis() -> u64 {
    let wall = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX));

    let mut last = LAST_TIMESTAMP.load(Ordering::Relaxed);
    loop {
        let next = wall.max(last.saturating_add(1));
        match LAST_TIMESTAMP.compare_exchange_weak(last, next, Ordering::AcqRel, Ordering::Relaxed)
        {
            Ok(_) => return next,
            Err(observed) => last = observed,
        }
    }
}

/// Record payload, either raw bytes or a structured document
///
/// The cache never interprets payload contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Payload {
    /// Opaque binary content
    Bytes(#[serde(with = "serde_bytes")] Vec<u8>),
    /// Structured JSON document
    Document(serde_json::Value),
}

impl Payload {
    /// Approximate payload size in bytes
    #[must_use]
    pub fn size_hint(&self) -> usize {
        match self {
            Self::Bytes(bytes) => bytes.len(),
            Self::Document(value) => value.to_string().len(),
        }
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Self::Bytes(text.as_bytes().to_vec())
    }
}

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        Self::Document(value)
    }
}

/// A processed-content record keyed by a stable string key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Stable identity of the logical content item
    pub key: String,
    /// Cached content
    pub payload: Payload,
    /// Production time in epoch milliseconds (monotonic within a process)
    pub updated_at: u64,
}

impl Record {
    /// Create a record stamped with the current monotonic time
    pub fn new(key: impl Into<String>, payload: impl Into<Payload>) -> Self {
        Self {
            key: key.into(),
            payload: payload.into(),
            updated_at: monotonic_millis(),
        }
    }

    /// Create a record holding raw bytes
    pub fn bytes(key: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self::new(key, Payload::Bytes(bytes.into()))
    }

    /// Create a record holding a JSON document
    pub fn document(key: impl Into<String>, value: serde_json::Value) -> Self {
        Self::new(key, Payload::Document(value))
    }

    /// Whether this record should replace `other` under last-write-wins
    #[must_use]
    pub fn supersedes(&self, other: &Record) -> bool {
        self.updated_at >= other.updated_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_monotonic_timestamps_strictly_increase() {
        let stamps: Vec<u64> = (0..1000).map(|_| monotonic_millis()).collect();
        assert!(stamps.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_later_record_supersedes_earlier() {
        let first = Record::bytes("k", b"v1".to_vec());
        let second = Record::bytes("k", b"v2".to_vec());
        assert!(second.supersedes(&first));
        assert!(!first.supersedes(&second));
    }

    #[test]
    fn test_payload_json_shape() {
        let record = Record::document("doc", json!({"title": "hello"}));
        let encoded = serde_json::to_value(&record).unwrap();
        assert_eq!(encoded["payload"]["kind"], "document");
        assert_eq!(encoded["payload"]["data"]["title"], "hello");
    }
}

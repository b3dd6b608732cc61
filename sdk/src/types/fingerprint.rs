//! Cheap message fingerprints.
//!
//! Shared by the server-side message cache and the client-side
//! deduplicator so both agree on what counts as "the same message".
//!
//! Precedence:
//!
//! 1. an explicit `id` / `messageId` field at the top of the payload
//! 2. event type + order id + snapshot timestamp
//! 3. payload length + hash of the leading bytes

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

/// Number of leading bytes hashed for content fingerprints.
pub const PREFIX_LEN: usize = 128;

/// Identifier used to detect repeated messages.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint from an explicit message identifier.
    #[must_use]
    pub fn explicit(id: &str) -> Self {
        Self(format!("id:{}", id))
    }

    /// Fingerprint from event type, order id and snapshot timestamp.
    ///
    /// The timestamp keeps nanosecond precision and is normalized to UTC.
    #[must_use]
    pub fn for_order(event_type: &str, order_id: &str, timestamp: &DateTime<Utc>) -> Self {
        Self(format!(
            "{}:{}:{}",
            event_type,
            order_id,
            timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true)
        ))
    }

    /// Fingerprint from payload length and a hash of its prefix.
    #[must_use]
    pub fn for_content(content: &str) -> Self {
        let bytes = content.as_bytes();
        let prefix = bytes.get(..PREFIX_LEN).unwrap_or(bytes);

        let mut hasher = DefaultHasher::new();
        prefix.hash(&mut hasher);

        Self(format!("len:{}:{:016x}", bytes.len(), hasher.finish()))
    }

    /// Fingerprint of a raw inbound message.
    ///
    /// Malformed JSON falls through to the content fingerprint.
    #[must_use]
    pub fn of_raw(raw: &str) -> Self {
        let Ok(value) = serde_json::from_str::<Value>(raw) else {
            return Self::for_content(raw);
        };

        if let Some(id) = explicit_id(&value) {
            return Self::explicit(&id);
        }

        order_key(&value)
            .map(|(event_type, order_id, ts)| Self::for_order(event_type, &order_id, &ts))
            .unwrap_or_else(|| Self::for_content(raw))
    }

    /// Returns the fingerprint as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn explicit_id(value: &Value) -> Option<String> {
    ["id", "messageId"]
        .iter()
        .find_map(|key| value.get(key).and_then(scalar_to_string))
}

fn order_key(value: &Value) -> Option<(&str, String, DateTime<Utc>)> {
    let event_type = value.get("type")?.as_str()?;
    let order = value.get("order")?;
    let order_id = order.get("id").and_then(scalar_to_string)?;
    let timestamp = order.get("timestamp")?.as_str()?;
    let timestamp = DateTime::parse_from_rfc3339(timestamp)
        .ok()?
        .with_timezone(&Utc);
    Some((event_type, order_id, timestamp))
}

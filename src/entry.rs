//! Log entry value type
//!
//! An [`Entry`] is used both when writing to the store and when reading back
//! from it. Unset fields take their defaults at construction time:
//!
//! - `timestamp`: the current time
//! - `message`: empty string
//! - `severity`: [`Severity::Notice`]
//! - `metadata`: none
//!
//! ```rust,ignore
//! use logstore::{Entry, Severity};
//!
//! let entry = Entry::builder()
//!     .severity(Severity::Alert)
//!     .message("disk almost full")
//!     .metadata(BTreeMap::from([("free_mb".to_string(), json!(120))]))
//!     .build();
//! ```

use std::collections::BTreeMap;

use bon::Builder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::severity::Severity;

/// Arbitrary key/value data stored alongside a message
pub type Metadata = BTreeMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
pub struct Entry {
    #[builder(default = Utc::now())]
    #[serde(with = "chrono::serde::ts_microseconds")]
    pub timestamp: DateTime<Utc>,

    #[builder(default, into)]
    #[serde(default)]
    pub message: String,

    #[builder(default)]
    #[serde(default)]
    pub severity: Severity,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl Entry {
    /// Entry stamped with the current time and no metadata
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Entry::builder().severity(severity).message(message).build()
    }

    /// Add one metadata value, creating the map if needed
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata
            .get_or_insert_with(Metadata::new)
            .insert(key.into(), value.into());
        self
    }
}

impl Default for Entry {
    fn default() -> Self {
        Entry::builder().build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let before = Utc::now();
        let entry = Entry::default();
        let after = Utc::now();

        assert_eq!(entry.message, "");
        assert_eq!(entry.severity, Severity::Notice);
        assert!(entry.metadata.is_none());
        assert!(entry.timestamp >= before && entry.timestamp <= after);
    }

    #[test]
    fn test_builder_overrides() {
        let ts = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let entry = Entry::builder()
            .timestamp(ts)
            .severity(Severity::Alert)
            .message("Some alert")
            .build();

        assert_eq!(entry.timestamp, ts);
        assert_eq!(entry.severity, Severity::Alert);
        assert_eq!(entry.message, "Some alert");
    }

    #[test]
    fn test_with_field() {
        let entry = Entry::new(Severity::Info, "msg")
            .with_field("somekey", "somevalue")
            .with_field("otherkey", 123);

        let metadata = entry.metadata.unwrap();
        assert_eq!(metadata["somekey"], json!("somevalue"));
        assert_eq!(metadata["otherkey"], json!(123));
    }

    #[test]
    fn test_json_omits_absent_metadata() {
        let entry = Entry::new(Severity::Error, "boom");
        let json = serde_json::to_value(&entry).unwrap();
        assert!(json.get("metadata").is_none());
        assert_eq!(json["severity"], json!(3));
    }
}

//! Fjall-based persistence for log entries
//!
//! A [`LogStore`] owns one keyspace directory with two partitions:
//!
//! - `entries`: log entries keyed by (timestamp, insertion sequence)
//! - `meta`: schema version and the persisted sequence counter
//!
//! The key order doubles as the index for both range and recency queries,
//! so neither needs a full scan. Inserts and age-based deletes are each
//! committed as a single atomic batch.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use logstore::store::LogStore;
//!
//! let mut store = LogStore::new("data/logs");
//! store.open()?;
//! store.insert(&Entry::new(Severity::Error, "disk full"))?;
//! let recent = store.select_recent(50, Severity::Warning)?;
//! ```

pub mod error;
pub mod keys;
pub mod log_store;

pub use error::{BackendError, Result, StoreError};
pub use log_store::{LogStore, SCHEMA_VERSION, StoreStats};

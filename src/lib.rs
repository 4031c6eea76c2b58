//! Embeddable append-and-prune log store
//!
//! Entries are appended through a [`Logger`], persisted in a local fjall
//! keyspace, queried by time range or recency, and removed once they age out
//! of the retention window.
//!
//! ```no_run
//! use logstore::{Logger, Severity};
//!
//! # async fn demo() -> Result<(), logstore::LoggerError> {
//! let logger = Logger::new("/var/tmp/my-app/logs")?;
//! logger.open().await?;
//!
//! logger.log(Severity::Error, "upstream timed out");
//! let recent = logger.retrieve_recent(10, Severity::Warning).await?;
//! assert_eq!(recent[0].message, "upstream timed out");
//!
//! logger.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod entry;
pub mod humanize;
pub mod logger;
pub mod observability;
pub mod pruner;
pub mod serializer;
pub mod severity;
pub mod store;

pub use entry::{Entry, Metadata};
pub use logger::{ErrorHook, Logger, LoggerError, LoggerState};
pub use observability::MetricsSnapshot;
pub use pruner::RetentionPolicy;
pub use severity::Severity;
pub use store::{LogStore, StoreError, StoreStats};

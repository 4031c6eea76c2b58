//! Integration tests for the Logger façade
//!
//! Every test gets its own temporary store directory; nothing is shared
//! between tests, so they can run in parallel.

use chrono::{TimeDelta, Utc};
use logstore::{Entry, Logger, LoggerError, LoggerState, Severity, StoreError};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

async fn open_logger(temp_dir: &TempDir) -> Logger {
    let logger = Logger::new(temp_dir.path().join("logs")).unwrap();
    logger.set_mirror_to_console(false);
    logger.set_filter_severity(Severity::Debug);
    logger.open().await.unwrap();
    logger
}

fn messages(entries: &[Entry]) -> Vec<&str> {
    entries.iter().map(|e| e.message.as_str()).collect()
}

#[tokio::test]
async fn test_fresh_store_is_empty() {
    let temp_dir = TempDir::new().unwrap();
    let logger = open_logger(&temp_dir).await;

    assert!(logger.retrieve_recent(10, Severity::Debug).await.unwrap().is_empty());
    assert_eq!(logger.state(), LoggerState::Open);
}

#[tokio::test]
async fn test_recent_is_newest_first_with_ties_by_insertion() {
    let temp_dir = TempDir::new().unwrap();
    let logger = open_logger(&temp_dir).await;
    let base = Utc::now() - TimeDelta::minutes(5);

    for (offset, message) in [(0, "first"), (1, "second"), (1, "second-tie"), (2, "third")] {
        logger.log_entry(
            Entry::builder()
                .timestamp(base + TimeDelta::seconds(offset))
                .severity(Severity::Warning)
                .message(message)
                .build(),
        );
    }

    let entries = logger.retrieve_recent(10, Severity::Debug).await.unwrap();
    assert_eq!(messages(&entries), vec!["third", "second-tie", "second", "first"]);

    let limited = logger.retrieve_recent(2, Severity::Debug).await.unwrap();
    assert_eq!(messages(&limited), vec!["third", "second-tie"]);
}

#[tokio::test]
async fn test_filtered_severity_is_never_stored() {
    let temp_dir = TempDir::new().unwrap();
    let logger = open_logger(&temp_dir).await;
    logger.set_filter_severity(Severity::Warning);

    logger.log(Severity::Debug, "too chatty");
    logger.log(Severity::Info, "also filtered");
    logger.log(Severity::Warning, "kept");

    let entries = logger.retrieve_recent(10, Severity::Debug).await.unwrap();
    assert_eq!(messages(&entries), vec!["kept"]);
    assert_eq!(logger.metrics().entries_filtered, 2);
}

#[tokio::test]
async fn test_read_after_write_through_range_query() {
    let temp_dir = TempDir::new().unwrap();
    let logger = open_logger(&temp_dir).await;
    let before = Utc::now() - TimeDelta::seconds(1);

    logger.log(Severity::Error, "just written");

    let entries = logger
        .retrieve_between(Some(before), None, Severity::Error)
        .await
        .unwrap();
    assert_eq!(messages(&entries), vec!["just written"]);
}

#[tokio::test]
async fn test_range_query_respects_severity_and_bounds() {
    let temp_dir = TempDir::new().unwrap();
    let logger = open_logger(&temp_dir).await;
    let now = Utc::now();

    for (hours, severity, message) in [
        (3, Severity::Error, "old error"),
        (2, Severity::Info, "info"),
        (1, Severity::Critical, "critical"),
    ] {
        logger.log_entry(
            Entry::builder()
                .timestamp(now - TimeDelta::hours(hours))
                .severity(severity)
                .message(message)
                .build(),
        );
    }

    let entries = logger
        .retrieve_between(
            Some(now - TimeDelta::hours(2)),
            Some(now),
            Severity::Error,
        )
        .await
        .unwrap();
    assert_eq!(messages(&entries), vec!["critical"]);
}

#[tokio::test]
async fn test_inverted_range_is_empty() {
    let temp_dir = TempDir::new().unwrap();
    let logger = open_logger(&temp_dir).await;
    logger.log(Severity::Error, "present");

    let now = Utc::now();
    let entries = logger
        .retrieve_between(Some(now), Some(now - TimeDelta::hours(1)), Severity::Debug)
        .await
        .unwrap();
    assert!(entries.is_empty());
}

#[tokio::test]
async fn test_prune_now_removes_expired_entries_once() {
    let temp_dir = TempDir::new().unwrap();
    let logger = open_logger(&temp_dir).await;

    logger.log_entry(
        Entry::builder()
            .timestamp(Utc::now() - TimeDelta::days(8))
            .severity(Severity::Error)
            .message("eight days old")
            .build(),
    );
    logger.log(Severity::Error, "today");

    assert_eq!(logger.prune_now().await.unwrap(), 1);
    assert_eq!(logger.prune_now().await.unwrap(), 0);

    let entries = logger.retrieve_recent(10, Severity::Debug).await.unwrap();
    assert_eq!(messages(&entries), vec!["today"]);
}

#[tokio::test]
async fn test_background_sweep_removes_expired_entries() {
    let temp_dir = TempDir::new().unwrap();
    let logger = Logger::new(temp_dir.path().join("logs")).unwrap();
    logger.set_mirror_to_console(false);
    // Applies to the sleep that starts right after the first sweep at open
    logger.set_prune_frequency(Duration::from_millis(20)).unwrap();
    logger.open().await.unwrap();

    logger.log_entry(
        Entry::builder()
            .timestamp(Utc::now() - TimeDelta::days(8))
            .severity(Severity::Error)
            .message("stale")
            .build(),
    );

    tokio::time::timeout(Duration::from_secs(5), async {
        while !logger
            .retrieve_recent(10, Severity::Debug)
            .await
            .unwrap()
            .is_empty()
        {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("stale entry survived background pruning");

    assert!(logger.metrics().entries_pruned >= 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_writers_lose_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let logger = Arc::new(open_logger(&temp_dir).await);

    let handles: Vec<_> = (0..10)
        .map(|writer| {
            let logger = logger.clone();
            tokio::spawn(async move {
                for i in 0..100 {
                    logger.log(Severity::Notice, format!("writer-{writer}-{i}"));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    let entries = logger.retrieve_recent(1000, Severity::Debug).await.unwrap();
    assert_eq!(entries.len(), 1000);

    let unique: HashSet<_> = entries.iter().map(|e| e.message.clone()).collect();
    assert_eq!(unique.len(), 1000);
    assert!(
        entries
            .windows(2)
            .all(|pair| pair[0].timestamp >= pair[1].timestamp)
    );
}

#[tokio::test]
async fn test_log_before_open_is_dropped_and_reported() {
    let temp_dir = TempDir::new().unwrap();
    let reported = Arc::new(Mutex::new(Vec::new()));
    let sink = reported.clone();

    let logger = Logger::new(temp_dir.path().join("logs"))
        .unwrap()
        .with_error_hook(move |e| sink.lock().unwrap().push(e.to_string()));
    logger.set_mirror_to_console(false);

    logger.log(Severity::Emergency, "nobody listening");

    assert_eq!(logger.metrics().entries_dropped, 1);
    assert_eq!(reported.lock().unwrap().as_slice(), ["Logger is not open"]);
    assert!(matches!(
        logger.retrieve_recent(10, Severity::Debug).await,
        Err(LoggerError::NotOpen)
    ));
    assert!(matches!(logger.prune_now().await, Err(LoggerError::NotOpen)));

    logger.open().await.unwrap();
    assert!(logger.retrieve_recent(10, Severity::Debug).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_close_drains_queued_writes() {
    let temp_dir = TempDir::new().unwrap();
    let logger = open_logger(&temp_dir).await;

    for i in 0..500 {
        logger.log(Severity::Error, format!("queued-{i}"));
    }
    logger.close().await.unwrap();
    assert_eq!(logger.state(), LoggerState::Closed);

    logger.log(Severity::Error, "after close");
    assert_eq!(logger.metrics().entries_dropped, 1);

    logger.open().await.unwrap();
    let entries = logger.retrieve_recent(1000, Severity::Debug).await.unwrap();
    assert_eq!(entries.len(), 500);
    assert_eq!(entries[0].message, "queued-499");
}

#[tokio::test]
async fn test_open_and_close_are_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    let logger = Logger::new(temp_dir.path().join("logs")).unwrap();

    logger.close().await.unwrap();
    assert_eq!(logger.state(), LoggerState::Unopened);

    logger.open().await.unwrap();
    logger.open().await.unwrap();
    logger.close().await.unwrap();
    logger.close().await.unwrap();
    assert_eq!(logger.state(), LoggerState::Closed);
}

#[tokio::test]
async fn test_second_logger_on_same_path_is_unavailable() {
    let temp_dir = TempDir::new().unwrap();
    let first = open_logger(&temp_dir).await;

    let second = Logger::new(temp_dir.path().join("logs")).unwrap();
    assert!(matches!(
        second.open().await,
        Err(LoggerError::Store(StoreError::Unavailable { .. }))
    ));

    first.close().await.unwrap();
    second.open().await.unwrap();
}

#[tokio::test]
async fn test_drop_without_close_persists_entries() {
    let temp_dir = TempDir::new().unwrap();

    {
        let logger = open_logger(&temp_dir).await;
        logger.log_entry(Entry::new(Severity::Alert, "survives drop").with_field("attempt", 3));
    }

    let logger = open_logger(&temp_dir).await;
    let entries = logger.retrieve_recent(10, Severity::Debug).await.unwrap();
    assert_eq!(messages(&entries), vec!["survives drop"]);
    assert_eq!(
        entries[0].metadata.as_ref().unwrap()["attempt"],
        serde_json::json!(3)
    );
}

#[tokio::test]
async fn test_stats_and_metrics() {
    let temp_dir = TempDir::new().unwrap();
    let logger = open_logger(&temp_dir).await;

    logger.log(Severity::Error, "one");
    logger.log(Severity::Error, "two");
    logger.persist().await.unwrap();

    let stats = logger.stats().await.unwrap();
    assert_eq!(stats.entry_count, 2);
    assert!(stats.oldest.unwrap() <= stats.newest.unwrap());

    let metrics = logger.metrics();
    assert_eq!(metrics.entries_accepted, 2);
    assert_eq!(metrics.write_failures, 0);
}

#[tokio::test]
async fn test_close_right_after_open_runs_no_sweep() {
    let temp_dir = TempDir::new().unwrap();
    let logger = Logger::new(temp_dir.path().join("logs")).unwrap();
    logger.set_mirror_to_console(false);

    logger.open().await.unwrap();
    logger.close().await.unwrap();

    assert_eq!(logger.metrics().prune_sweeps, 0);
}

#[tokio::test]
async fn test_auto_prune_off_leaves_expired_entries() {
    let temp_dir = TempDir::new().unwrap();
    let logger = Logger::new(temp_dir.path().join("logs")).unwrap();
    logger.set_mirror_to_console(false);
    logger.set_auto_prune(false);
    logger.set_prune_frequency(Duration::from_millis(10)).unwrap();
    logger.open().await.unwrap();

    logger.log_entry(
        Entry::builder()
            .timestamp(Utc::now() - TimeDelta::days(30))
            .severity(Severity::Error)
            .message("kept until asked")
            .build(),
    );
    tokio::time::sleep(Duration::from_millis(100)).await;

    let entries = logger.retrieve_recent(10, Severity::Debug).await.unwrap();
    assert_eq!(messages(&entries), vec!["kept until asked"]);
    assert_eq!(logger.metrics().prune_sweeps, 0);

    assert_eq!(logger.prune_now().await.unwrap(), 1);
}

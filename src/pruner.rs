//! Recurring age-based pruning
//!
//! The [`Pruner`] is a background task that periodically submits
//! `delete_older_than(now - prune_limit_days)` to the same serializer that
//! carries writes and reads, so sweeps interleave with, and never overlap,
//! other store operations.
//!
//! Retention settings arrive over a `watch` channel and are re-read at the
//! start of every cycle: a new frequency applies from the next sleep, not to
//! the one already in progress.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::oneshot::error::TryRecvError;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::RetentionConfig;
use crate::observability::Metrics;
use crate::serializer::{SerializerError, WeakSubmitter};
use crate::store::LogStore;

pub const DEFAULT_PRUNE_LIMIT_DAYS: f64 = 7.0;
pub const DEFAULT_PRUNE_FREQUENCY: Duration = Duration::from_secs(3600);

const SECS_PER_DAY: f64 = 86_400.0;

/// How long entries are kept and how often the store is swept
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetentionPolicy {
    pub prune_limit_days: f64,
    pub prune_frequency: Duration,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            prune_limit_days: DEFAULT_PRUNE_LIMIT_DAYS,
            prune_frequency: DEFAULT_PRUNE_FREQUENCY,
        }
    }
}

impl From<&RetentionConfig> for RetentionPolicy {
    fn from(config: &RetentionConfig) -> Self {
        Self {
            prune_limit_days: config.prune_limit_days,
            prune_frequency: config.prune_frequency.as_duration(),
        }
    }
}

impl RetentionPolicy {
    /// Retention window; an unrepresentable limit keeps everything
    pub fn window(&self) -> TimeDelta {
        Duration::try_from_secs_f64(self.prune_limit_days * SECS_PER_DAY)
            .ok()
            .and_then(|d| TimeDelta::from_std(d).ok())
            .unwrap_or(TimeDelta::MAX)
    }

    /// Entries strictly older than this instant are eligible for deletion
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_sub_signed(self.window())
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

/// Handle to an armed pruning task
pub struct Pruner {
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl Pruner {
    /// Spawn the pruning loop; the first sweep runs immediately
    ///
    /// Must be called from within a tokio runtime.
    pub fn arm(
        submitter: WeakSubmitter<LogStore>,
        policy: watch::Receiver<RetentionPolicy>,
        metrics: Arc<Metrics>,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(run(submitter, policy, metrics, shutdown_rx));

        Self {
            shutdown: Some(shutdown_tx),
            task: Some(task),
        }
    }

    /// Stop the loop and wait for it to exit
    ///
    /// A sweep already handed to the serializer finishes first.
    pub async fn disarm(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }

        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    warn!(error = %e, "Pruner task ended abnormally");
                }
            }
        }
        debug!("Pruner disarmed");
    }
}

impl Drop for Pruner {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn run(
    submitter: WeakSubmitter<LogStore>,
    policy: watch::Receiver<RetentionPolicy>,
    metrics: Arc<Metrics>,
    mut shutdown: oneshot::Receiver<()>,
) {
    info!("Pruner armed");

    loop {
        // A disarm that lands before this task is first polled skips the sweep too
        if !matches!(shutdown.try_recv(), Err(TryRecvError::Empty)) {
            break;
        }

        let current = *policy.borrow();

        if let Err(e) = sweep(&submitter, &current, &metrics).await {
            debug!(error = %e, "Serializer gone, pruner exiting");
            break;
        }

        tokio::select! {
            biased;
            _ = &mut shutdown => break,
            _ = tokio::time::sleep(current.prune_frequency) => {}
        }
    }

    info!("Pruner stopped");
}

/// One prune sweep; only a vanished serializer is reported to the caller
async fn sweep(
    submitter: &WeakSubmitter<LogStore>,
    policy: &RetentionPolicy,
    metrics: &Metrics,
) -> Result<(), SerializerError> {
    let cutoff = policy.cutoff(Utc::now());

    match submitter
        .call(move |store: &mut LogStore| store.delete_older_than(cutoff))
        .await
    {
        Ok(Ok(removed)) => {
            metrics.prune_completed(removed);
            info!(removed, %cutoff, "Prune sweep completed");
            Ok(())
        }
        Ok(Err(e)) => {
            metrics.prune_failed();
            warn!(error = %e, "Prune sweep failed");
            Ok(())
        }
        Err(SerializerError::JobPanicked) => {
            metrics.prune_failed();
            warn!("Prune sweep panicked");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::Entry;
    use crate::serializer::Serializer;
    use crate::severity::Severity;
    use tempfile::TempDir;

    fn open_serializer(temp_dir: &TempDir) -> Serializer<LogStore> {
        let mut store = LogStore::new(temp_dir.path().join("store"));
        store.open().unwrap();
        Serializer::spawn("pruner-test", store).unwrap()
    }

    fn aged(days: i64, message: &str) -> Entry {
        Entry::builder()
            .timestamp(Utc::now() - TimeDelta::days(days))
            .severity(Severity::Error)
            .message(message)
            .build()
    }

    async fn wait_for_sweeps(metrics: &Metrics, count: u64) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while metrics.snapshot().prune_sweeps < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("prune sweep did not run");
    }

    async fn remaining(serializer: &Serializer<LogStore>) -> Vec<String> {
        serializer
            .call(|store: &mut LogStore| store.select_recent(100, Severity::Debug))
            .await
            .unwrap()
            .unwrap()
            .into_iter()
            .map(|e| e.message)
            .collect()
    }

    #[test]
    fn test_cutoff_uses_fractional_days() {
        let now = Utc::now();
        let policy = RetentionPolicy {
            prune_limit_days: 1.5,
            ..RetentionPolicy::default()
        };
        assert_eq!(now - policy.cutoff(now), TimeDelta::hours(36));
    }

    #[test]
    fn test_invalid_limit_prunes_nothing() {
        let policy = RetentionPolicy {
            prune_limit_days: -3.0,
            ..RetentionPolicy::default()
        };
        assert_eq!(policy.cutoff(Utc::now()), DateTime::<Utc>::MIN_UTC);
    }

    #[tokio::test]
    async fn test_first_sweep_runs_on_arm() {
        let temp_dir = TempDir::new().unwrap();
        let serializer = open_serializer(&temp_dir);
        serializer
            .call(|store: &mut LogStore| {
                store.insert(&aged(8, "stale"))?;
                store.insert(&aged(1, "fresh"))
            })
            .await
            .unwrap()
            .unwrap();

        let metrics = Arc::new(Metrics::new());
        let (_policy_tx, policy_rx) = watch::channel(RetentionPolicy::default());
        let pruner = Pruner::arm(serializer.downgrade().unwrap(), policy_rx, metrics.clone());

        wait_for_sweeps(&metrics, 1).await;
        assert_eq!(remaining(&serializer).await, vec!["fresh"]);
        assert_eq!(metrics.snapshot().entries_pruned, 1);

        pruner.disarm().await;
    }

    #[tokio::test]
    async fn test_policy_changes_apply_on_next_cycle() {
        let temp_dir = TempDir::new().unwrap();
        let serializer = open_serializer(&temp_dir);

        let metrics = Arc::new(Metrics::new());
        let (policy_tx, policy_rx) = watch::channel(RetentionPolicy {
            prune_limit_days: 30.0,
            prune_frequency: Duration::from_millis(20),
        });
        let pruner = Pruner::arm(serializer.downgrade().unwrap(), policy_rx, metrics.clone());
        wait_for_sweeps(&metrics, 1).await;

        serializer
            .call(|store: &mut LogStore| store.insert(&aged(3, "three days old")))
            .await
            .unwrap()
            .unwrap();

        policy_tx.send_modify(|p| p.prune_limit_days = 2.0);
        let seen = metrics.snapshot().prune_sweeps;
        wait_for_sweeps(&metrics, seen + 2).await;

        assert!(remaining(&serializer).await.is_empty());
        pruner.disarm().await;
    }

    #[tokio::test]
    async fn test_disarm_before_first_poll_skips_sweep() {
        let temp_dir = TempDir::new().unwrap();
        let serializer = open_serializer(&temp_dir);
        serializer
            .call(|store: &mut LogStore| store.insert(&aged(30, "stale")))
            .await
            .unwrap()
            .unwrap();

        let metrics = Arc::new(Metrics::new());
        let (_policy_tx, policy_rx) = watch::channel(RetentionPolicy::default());
        // Current-thread runtime: the task cannot run before disarm yields
        let pruner = Pruner::arm(serializer.downgrade().unwrap(), policy_rx, metrics.clone());
        pruner.disarm().await;

        assert_eq!(metrics.snapshot().prune_sweeps, 0);
        assert_eq!(remaining(&serializer).await, vec!["stale"]);
    }

    #[tokio::test]
    async fn test_no_sweeps_after_disarm() {
        let temp_dir = TempDir::new().unwrap();
        let serializer = open_serializer(&temp_dir);

        let metrics = Arc::new(Metrics::new());
        let (_policy_tx, policy_rx) = watch::channel(RetentionPolicy {
            prune_limit_days: 7.0,
            prune_frequency: Duration::from_millis(10),
        });
        let pruner = Pruner::arm(serializer.downgrade().unwrap(), policy_rx, metrics.clone());
        wait_for_sweeps(&metrics, 1).await;
        pruner.disarm().await;

        let sweeps = metrics.snapshot().prune_sweeps;
        serializer
            .call(|store: &mut LogStore| store.insert(&aged(10, "stale")))
            .await
            .unwrap()
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(metrics.snapshot().prune_sweeps, sweeps);
        assert_eq!(remaining(&serializer).await, vec!["stale"]);
    }

    #[tokio::test]
    async fn test_failed_sweep_keeps_loop_running() {
        let temp_dir = TempDir::new().unwrap();
        let serializer = open_serializer(&temp_dir);
        serializer
            .call(|store: &mut LogStore| store.close())
            .await
            .unwrap()
            .unwrap();

        let metrics = Arc::new(Metrics::new());
        let (_policy_tx, policy_rx) = watch::channel(RetentionPolicy {
            prune_limit_days: 7.0,
            prune_frequency: Duration::from_millis(10),
        });
        let pruner = Pruner::arm(serializer.downgrade().unwrap(), policy_rx, metrics.clone());

        tokio::time::timeout(Duration::from_secs(5), async {
            while metrics.snapshot().prune_failures < 3 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("pruner stopped after a failed sweep");

        pruner.disarm().await;
    }
}

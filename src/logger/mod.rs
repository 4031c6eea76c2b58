//! Logger façade
//!
//! A [`Logger`] owns one [`LogStore`] (moved onto a [`Serializer`] worker), the
//! [`Pruner`] that keeps it within the retention window, and the runtime
//! settings that decide which entries are written.
//!
//! Flow:
//! 1. `log` checks the filter threshold and returns early for filtered entries
//! 2. Accepted entries are mirrored (if enabled) and submitted fire-and-forget
//! 3. Reads, prunes and lifecycle changes queue behind earlier submissions,
//!    so a read observes every write submitted before it
//!
//! `log` never returns an error. Writes that cannot be stored (logger not
//! open, backend failure) are counted and handed to the error hook.

mod error;
mod mirror;

pub use error::{LoggerError, Result};
pub use mirror::MIRROR_TARGET;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

use crate::config::{
    LoggerConfig, StoreConfig, validate_prune_frequency, validate_prune_limit,
};
use crate::entry::Entry;
use crate::observability::{Metrics, MetricsSnapshot};
use crate::pruner::{Pruner, RetentionPolicy};
use crate::serializer::Serializer;
use crate::severity::Severity;
use crate::store::{LogStore, StoreStats};

const WORKER_NAME: &str = "logstore-worker";
const DEFAULT_STORE_DIR: &str = "logstore";

const STATE_UNOPENED: u8 = 0;
const STATE_OPEN: u8 = 1;
const STATE_CLOSED: u8 = 2;

/// Callback receiving errors that have no caller to return to
pub type ErrorHook = Arc<dyn Fn(&LoggerError) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggerState {
    Unopened,
    Open,
    Closed,
}

pub struct Logger {
    path: PathBuf,
    serializer: Serializer<LogStore>,
    /// Held across open/close; the armed pruner lives inside
    lifecycle: Mutex<Option<Pruner>>,
    state: AtomicU8,
    filter_severity: AtomicU8,
    mirror_to_console: AtomicBool,
    auto_prune: AtomicBool,
    retention: watch::Sender<RetentionPolicy>,
    metrics: Arc<Metrics>,
    error_hook: Option<ErrorHook>,
}

impl Logger {
    /// Create an unopened logger for the store at `path`
    ///
    /// Starts the worker thread; the store itself is not touched until `open`.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let serializer = Serializer::spawn(WORKER_NAME, LogStore::new(&path))?;
        let (retention, _) = watch::channel(RetentionPolicy::default());
        let defaults = LoggerConfig::default();

        debug!(path = %path.display(), "Logger created");

        Ok(Self {
            path,
            serializer,
            lifecycle: Mutex::new(None),
            state: AtomicU8::new(STATE_UNOPENED),
            filter_severity: AtomicU8::new(defaults.logging.filter_severity.as_u8()),
            mirror_to_console: AtomicBool::new(defaults.logging.mirror_to_console),
            auto_prune: AtomicBool::new(defaults.retention.auto_prune),
            retention,
            metrics: Arc::new(Metrics::new()),
            error_hook: None,
        })
    }

    /// Logger at the per-user cache location for the default application name
    pub fn with_default_location() -> Result<Self> {
        let path = default_location(&StoreConfig::default().app_name)
            .ok_or(LoggerError::NoDefaultLocation)?;
        Self::new(path)
    }

    /// Logger with location, filter, mirroring and retention taken from `config`
    pub fn from_config(config: &LoggerConfig) -> Result<Self> {
        config.validate()?;

        let path = match &config.store.path {
            Some(path) => path.clone(),
            None => default_location(&config.store.app_name)
                .ok_or(LoggerError::NoDefaultLocation)?,
        };

        let logger = Self::new(path)?;
        logger.set_filter_severity(config.logging.filter_severity);
        logger.set_mirror_to_console(config.logging.mirror_to_console);
        logger.set_auto_prune(config.retention.auto_prune);
        logger.retention.send_replace(RetentionPolicy::from(&config.retention));
        Ok(logger)
    }

    /// Install the callback for failed background writes and dropped entries
    pub fn with_error_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&LoggerError) + Send + Sync + 'static,
    {
        self.error_hook = Some(Arc::new(hook));
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> LoggerState {
        match self.state.load(Ordering::Acquire) {
            STATE_OPEN => LoggerState::Open,
            STATE_CLOSED => LoggerState::Closed,
            _ => LoggerState::Unopened,
        }
    }

    pub fn is_open(&self) -> bool {
        self.state() == LoggerState::Open
    }

    /// Open the store and, unless auto-prune is off, arm the pruner
    ///
    /// No-op when already open. A closed logger may be opened again.
    /// Must be called from within a tokio runtime.
    pub async fn open(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock().await;
        if self.is_open() {
            return Ok(());
        }

        self.serializer
            .call(|store: &mut LogStore| store.open())
            .await??;

        if self.auto_prune() {
            let pruner = Pruner::arm(
                self.serializer.downgrade()?,
                self.retention.subscribe(),
                self.metrics.clone(),
            );
            *lifecycle = Some(pruner);
        }
        self.state.store(STATE_OPEN, Ordering::Release);

        info!(path = %self.path.display(), "Logger opened");
        Ok(())
    }

    /// Stop accepting writes, disarm the pruner, drain queued work and close the store
    ///
    /// No-op when not open.
    pub async fn close(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock().await;
        if !self.is_open() {
            return Ok(());
        }

        self.state.store(STATE_CLOSED, Ordering::Release);

        if let Some(pruner) = lifecycle.take() {
            pruner.disarm().await;
        }

        // Queued behind every write submitted before the state change
        self.serializer
            .call(|store: &mut LogStore| store.close())
            .await??;

        info!(path = %self.path.display(), "Logger closed");
        Ok(())
    }

    /// Record `message` at `severity`; returns immediately
    pub fn log(&self, severity: Severity, message: impl Into<String>) {
        if !self.accepts(severity) {
            return;
        }
        self.submit(Entry::new(severity, message));
    }

    /// Record a fully built entry; its own severity is filtered
    pub fn log_entry(&self, entry: Entry) {
        if !self.accepts(entry.severity) {
            return;
        }
        self.submit(entry);
    }

    /// Record pre-formatted arguments; formatting is skipped for filtered entries
    ///
    /// ```no_run
    /// # use logstore::{Logger, Severity};
    /// # fn demo(logger: &Logger, attempts: u32) {
    /// logger.log_fmt(Severity::Warning, format_args!("retrying after {attempts} attempts"));
    /// # }
    /// ```
    pub fn log_fmt(&self, severity: Severity, args: fmt::Arguments<'_>) {
        if !self.accepts(severity) {
            return;
        }
        self.submit(Entry::new(severity, args.to_string()));
    }

    /// Entries within `[start, end]` at `min_severity` or more severe, newest first
    pub async fn retrieve_between(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        min_severity: Severity,
    ) -> Result<Vec<Entry>> {
        self.ensure_open()?;
        let entries = self
            .serializer
            .call(move |store: &mut LogStore| store.select_range(start, end, min_severity))
            .await??;
        Ok(entries)
    }

    /// Up to `count` most recent entries at `min_severity` or more severe
    pub async fn retrieve_recent(
        &self,
        count: usize,
        min_severity: Severity,
    ) -> Result<Vec<Entry>> {
        self.ensure_open()?;
        let entries = self
            .serializer
            .call(move |store: &mut LogStore| store.select_recent(count, min_severity))
            .await??;
        Ok(entries)
    }

    /// Run one prune sweep with the current retention policy
    pub async fn prune_now(&self) -> Result<usize> {
        self.ensure_open()?;
        let cutoff = self.retention().cutoff(Utc::now());

        let removed = self
            .serializer
            .call(move |store: &mut LogStore| store.delete_older_than(cutoff))
            .await?
            .inspect_err(|_| self.metrics.prune_failed())?;

        self.metrics.prune_completed(removed);
        info!(removed, %cutoff, "Manual prune completed");
        Ok(removed)
    }

    /// Durably flush everything written so far
    pub async fn persist(&self) -> Result<()> {
        self.ensure_open()?;
        self.serializer
            .call(|store: &mut LogStore| store.persist())
            .await??;
        Ok(())
    }

    pub async fn stats(&self) -> Result<StoreStats> {
        self.ensure_open()?;
        let stats = self
            .serializer
            .call(|store: &mut LogStore| store.stats())
            .await??;
        Ok(stats)
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn filter_severity(&self) -> Severity {
        Severity::try_from(self.filter_severity.load(Ordering::Relaxed)).unwrap_or_default()
    }

    /// Least severe level still written; anything below it is discarded
    pub fn set_filter_severity(&self, severity: Severity) {
        self.filter_severity
            .store(severity.as_u8(), Ordering::Relaxed);
    }

    pub fn mirror_to_console(&self) -> bool {
        self.mirror_to_console.load(Ordering::Relaxed)
    }

    pub fn set_mirror_to_console(&self, enabled: bool) {
        self.mirror_to_console.store(enabled, Ordering::Relaxed);
    }

    pub fn auto_prune(&self) -> bool {
        self.auto_prune.load(Ordering::Relaxed)
    }

    /// Whether `open` arms the background pruner; takes effect at the next open
    pub fn set_auto_prune(&self, enabled: bool) {
        self.auto_prune.store(enabled, Ordering::Relaxed);
    }

    pub fn retention(&self) -> RetentionPolicy {
        *self.retention.borrow()
    }

    /// Replace the retention policy; the pruner picks it up on its next cycle
    pub fn set_retention(&self, policy: RetentionPolicy) -> Result<()> {
        validate_prune_limit(policy.prune_limit_days)?;
        validate_prune_frequency(policy.prune_frequency)?;

        self.retention.send_replace(policy);
        debug!(
            prune_limit_days = policy.prune_limit_days,
            prune_frequency_secs = policy.prune_frequency.as_secs_f64(),
            "Retention policy updated"
        );
        Ok(())
    }

    pub fn set_prune_limit_days(&self, days: f64) -> Result<()> {
        self.set_retention(RetentionPolicy {
            prune_limit_days: days,
            ..self.retention()
        })
    }

    pub fn set_prune_frequency(&self, frequency: Duration) -> Result<()> {
        self.set_retention(RetentionPolicy {
            prune_frequency: frequency,
            ..self.retention()
        })
    }

    fn accepts(&self, severity: Severity) -> bool {
        if severity.is_within(self.filter_severity()) {
            true
        } else {
            self.metrics.entry_filtered();
            false
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(LoggerError::NotOpen)
        }
    }

    fn submit(&self, entry: Entry) {
        if self.mirror_to_console() {
            mirror::emit(&entry);
        }

        if !self.is_open() {
            self.metrics.entry_dropped();
            report(self.error_hook.as_ref(), &LoggerError::NotOpen);
            return;
        }

        let metrics = self.metrics.clone();
        let hook = self.error_hook.clone();
        let submitted = self.serializer.submit(move |store: &mut LogStore| {
            if let Err(e) = store.insert(&entry) {
                metrics.write_failed();
                report(hook.as_ref(), &LoggerError::from(e));
            }
        });

        match submitted {
            Ok(()) => self.metrics.entry_accepted(),
            Err(e) => {
                self.metrics.entry_dropped();
                report(self.error_hook.as_ref(), &LoggerError::from(e));
            }
        }
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        // The serializer drains queued writes and closes the store when it drops
        if let Some(pruner) = self.lifecycle.get_mut().take() {
            drop(pruner);
        }
    }
}

/// `<user cache dir>/<app_name>/logstore`
pub fn default_location(app_name: &str) -> Option<PathBuf> {
    dirs::cache_dir().map(|dir| dir.join(app_name).join(DEFAULT_STORE_DIR))
}

fn report(hook: Option<&ErrorHook>, error: &LoggerError) {
    match hook {
        Some(hook) => hook(error),
        None if matches!(error, LoggerError::NotOpen) => {
            debug!("Entry dropped: logger is not open");
        }
        None => warn!(error = %error, "Background write failed"),
    }
}

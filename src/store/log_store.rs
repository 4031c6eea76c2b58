use std::collections::HashSet;
use std::ops::Bound;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

use chrono::{DateTime, Utc};
use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use tracing::{debug, info, warn};

use crate::entry::Entry;
use crate::severity::Severity;

use super::error::{BackendError, Result, StoreError};
use super::keys::{self, META_NEXT_SEQ, META_SCHEMA_VERSION};

/// On-disk layout version written to the `meta` partition
pub const SCHEMA_VERSION: u32 = 1;

const ENTRIES_PARTITION: &str = "entries";
const META_PARTITION: &str = "meta";

/// Canonical paths currently held open by a `LogStore` in this process
fn open_paths() -> &'static Mutex<HashSet<PathBuf>> {
    static OPEN_PATHS: OnceLock<Mutex<HashSet<PathBuf>>> = OnceLock::new();
    OPEN_PATHS.get_or_init(|| Mutex::new(HashSet::new()))
}

/// Registry slot for one open location, released on drop
struct PathClaim(PathBuf);

impl PathClaim {
    fn acquire(path: &Path) -> Option<Self> {
        let mut paths = open_paths().lock().unwrap_or_else(|e| e.into_inner());
        paths
            .insert(path.to_path_buf())
            .then(|| PathClaim(path.to_path_buf()))
    }
}

impl Drop for PathClaim {
    fn drop(&mut self) {
        let mut paths = open_paths().lock().unwrap_or_else(|e| e.into_inner());
        paths.remove(&self.0);
    }
}

// Field order matters: the keyspace must be dropped before the claim is released.
struct OpenHandle {
    keyspace: Keyspace,
    entries: PartitionHandle,
    meta: PartitionHandle,
    next_seq: u64,
    _claim: PathClaim,
}

/// Fjall-backed log entry storage
///
/// Every method takes the store by reference and performs one whole
/// operation; callers are expected to funnel access through a single
/// worker (see [`crate::serializer::Serializer`]).
pub struct LogStore {
    path: PathBuf,
    handle: Option<OpenHandle>,
}

impl LogStore {
    /// Create an unopened store for the given directory
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            handle: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    /// Open the keyspace and make sure the schema exists
    pub fn open(&mut self) -> Result<()> {
        if self.handle.is_some() {
            return Ok(());
        }

        info!("Opening log store at: {}", self.path.display());

        std::fs::create_dir_all(&self.path)
            .map_err(|e| StoreError::unavailable(&self.path, e))?;
        let canonical = self
            .path
            .canonicalize()
            .map_err(|e| StoreError::unavailable(&self.path, e))?;

        let claim = PathClaim::acquire(&canonical)
            .ok_or_else(|| StoreError::unavailable(&canonical, BackendError::InUse))?;

        let keyspace = Config::new(&canonical)
            .open()
            .map_err(|e| StoreError::unavailable(&canonical, e))?;
        let entries = keyspace
            .open_partition(ENTRIES_PARTITION, PartitionCreateOptions::default())
            .map_err(|e| StoreError::unavailable(&canonical, e))?;
        let meta = keyspace
            .open_partition(META_PARTITION, PartitionCreateOptions::default())
            .map_err(|e| StoreError::unavailable(&canonical, e))?;

        ensure_schema(&canonical, &entries, &meta)?;
        let next_seq = load_next_seq(&canonical, &meta)?;

        info!(next_seq, "Log store opened successfully");
        self.handle = Some(OpenHandle {
            keyspace,
            entries,
            meta,
            next_seq,
            _claim: claim,
        });
        Ok(())
    }

    /// Flush and release the keyspace; a no-op when already closed
    pub fn close(&mut self) -> Result<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };

        handle
            .keyspace
            .persist(PersistMode::SyncAll)
            .map_err(|e| StoreError::unavailable(&self.path, e))?;

        info!("Log store closed: {}", self.path.display());
        Ok(())
    }

    /// Append one entry
    pub fn insert(&mut self, entry: &Entry) -> Result<()> {
        let handle = self.handle.as_mut().ok_or(StoreError::NotOpen)?;

        let seq = handle.next_seq;
        let key = keys::encode_entry_key(&entry.timestamp, seq);
        let value = serde_json::to_vec(entry).map_err(StoreError::write)?;

        // Entry and counter land together or not at all
        let mut batch = handle.keyspace.batch();
        batch.insert(&handle.entries, key.to_vec(), value);
        batch.insert(
            &handle.meta,
            META_NEXT_SEQ.to_vec(),
            keys::encode_u64(seq + 1).to_vec(),
        );
        batch.commit().map_err(StoreError::write)?;

        handle.next_seq = seq + 1;
        debug!(seq, severity = %entry.severity, "Inserted log entry");
        Ok(())
    }

    /// Entries with `severity <= min_severity` inside `[start, end]`, newest first
    ///
    /// An absent bound is unbounded on that side. `start` after `end` yields an
    /// empty result. Bounds are compared at microsecond precision.
    pub fn select_range(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        min_severity: Severity,
    ) -> Result<Vec<Entry>> {
        let handle = self.handle.as_ref().ok_or(StoreError::NotOpen)?;

        let lower = start.map(|t| keys::lower_bound(&t));
        let upper = end.map(|t| keys::upper_bound(&t));

        // Also covers a start and end inside the same microsecond with no whole
        // microsecond between them
        if let (Some(lower), Some(upper)) = (&lower, &upper) {
            if lower > upper {
                return Ok(Vec::new());
            }
        }

        let lower = lower.map_or(Bound::Unbounded, Bound::Included);
        let upper = upper.map_or(Bound::Unbounded, Bound::Included);

        let entries = collect_matching(
            handle.entries.range((lower, upper)).rev(),
            min_severity,
            usize::MAX,
        )?;
        debug!(count = entries.len(), %min_severity, "Selected entries by range");
        Ok(entries)
    }

    /// The `limit` most recent entries with `severity <= min_severity`
    pub fn select_recent(&self, limit: usize, min_severity: Severity) -> Result<Vec<Entry>> {
        let handle = self.handle.as_ref().ok_or(StoreError::NotOpen)?;

        if limit == 0 {
            return Ok(Vec::new());
        }

        let entries = collect_matching(handle.entries.iter().rev(), min_severity, limit)?;
        debug!(count = entries.len(), limit, %min_severity, "Selected recent entries");
        Ok(entries)
    }

    /// Remove every entry with `timestamp < cutoff` in one atomic batch
    ///
    /// Returns the number of entries removed.
    pub fn delete_older_than(&mut self, cutoff: DateTime<Utc>) -> Result<usize> {
        let handle = self.handle.as_mut().ok_or(StoreError::NotOpen)?;

        let upper = Bound::Excluded(keys::cutoff_key(&cutoff));
        let mut batch = handle.keyspace.batch();
        let mut removed = 0;

        for item in handle.entries.range((Bound::Unbounded, upper)) {
            let (key, _) = item.map_err(StoreError::write)?;
            batch.remove(&handle.entries, key);
            removed += 1;
        }

        if removed > 0 {
            batch.commit().map_err(StoreError::write)?;
        }

        info!(removed, %cutoff, "Deleted entries older than cutoff");
        Ok(removed)
    }

    /// Persist all pending writes to disk
    pub fn persist(&self) -> Result<()> {
        let handle = self.handle.as_ref().ok_or(StoreError::NotOpen)?;
        handle
            .keyspace
            .persist(PersistMode::SyncAll)
            .map_err(StoreError::write)?;
        Ok(())
    }

    /// Get internal statistics (for debugging/monitoring)
    pub fn stats(&self) -> Result<StoreStats> {
        let handle = self.handle.as_ref().ok_or(StoreError::NotOpen)?;

        let mut entry_count = 0;
        for item in handle.entries.iter() {
            item.map_err(StoreError::query)?;
            entry_count += 1;
        }

        let oldest = edge_timestamp(handle.entries.iter().next())?;
        let newest = edge_timestamp(handle.entries.iter().next_back())?;

        Ok(StoreStats {
            entry_count,
            oldest,
            newest,
            next_seq: handle.next_seq,
        })
    }
}

impl Drop for LogStore {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(error = %e, "Failed to close log store on drop");
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoreStats {
    pub entry_count: usize,
    pub oldest: Option<DateTime<Utc>>,
    pub newest: Option<DateTime<Utc>>,
    pub next_seq: u64,
}

fn ensure_schema(path: &Path, entries: &PartitionHandle, meta: &PartitionHandle) -> Result<()> {
    match meta
        .get(META_SCHEMA_VERSION)
        .map_err(|e| StoreError::unavailable(path, e))?
    {
        Some(raw) => {
            let version = keys::decode_u32(&raw).ok_or_else(|| {
                StoreError::Corrupt(format!("unreadable schema version ({} bytes)", raw.len()))
            })?;
            if version != SCHEMA_VERSION {
                return Err(StoreError::Corrupt(format!(
                    "schema version {version} is not supported (expected {SCHEMA_VERSION})"
                )));
            }
        }
        None => {
            let has_entries = entries
                .iter()
                .next()
                .transpose()
                .map_err(|e| StoreError::unavailable(path, e))?
                .is_some();
            if has_entries {
                return Err(StoreError::Corrupt(
                    "entries present without a schema version".to_string(),
                ));
            }
            meta.insert(META_SCHEMA_VERSION, keys::encode_u32(SCHEMA_VERSION).to_vec())
                .map_err(|e| StoreError::unavailable(path, e))?;
            debug!(version = SCHEMA_VERSION, "Initialised log store schema");
        }
    }
    Ok(())
}

fn load_next_seq(path: &Path, meta: &PartitionHandle) -> Result<u64> {
    match meta
        .get(META_NEXT_SEQ)
        .map_err(|e| StoreError::unavailable(path, e))?
    {
        Some(raw) => keys::decode_u64(&raw)
            .ok_or_else(|| StoreError::Corrupt("unreadable sequence counter".to_string())),
        None => Ok(0),
    }
}

/// Decode entries from a newest-first scan, keeping those at or above `min_severity`
fn collect_matching<I, K, V, E>(iter: I, min_severity: Severity, limit: usize) -> Result<Vec<Entry>>
where
    I: Iterator<Item = std::result::Result<(K, V), E>>,
    V: AsRef<[u8]>,
    E: Into<BackendError>,
{
    let mut results = Vec::new();

    for item in iter {
        if results.len() >= limit {
            break;
        }
        let (_, value) = item.map_err(StoreError::query)?;
        let entry: Entry = serde_json::from_slice(value.as_ref()).map_err(StoreError::query)?;
        if entry.severity.is_within(min_severity) {
            results.push(entry);
        }
    }

    Ok(results)
}

fn edge_timestamp<K, V, E>(
    item: Option<std::result::Result<(K, V), E>>,
) -> Result<Option<DateTime<Utc>>>
where
    K: AsRef<[u8]>,
    E: Into<BackendError>,
{
    let Some(item) = item else {
        return Ok(None);
    };
    let (key, _) = item.map_err(StoreError::query)?;
    let (micros, _) = keys::decode_entry_key(key.as_ref())
        .ok_or_else(|| StoreError::Corrupt("malformed entry key".to_string()))?;
    Ok(DateTime::from_timestamp_micros(micros))
}

//! Directory-per-kind JSON record store.

use crate::error::{StoreError, StoreResult};
use chrono::{DateTime, Utc};
use licensor_core::{
    HardwareFingerprint, LicenseRecord, RecordStore, StoredRecords, UnreadableRecord,
};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, info, warn};

/// Directory holding one document per active record.
pub const ACTIVE_DIR: &str = "active-licenses";

/// Directory holding one document per reactivation event.
pub const HISTORY_DIR: &str = "license-history";

/// How long to wait for another handle to release a fingerprint lock.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(10);

/// Age after which a lock file is assumed to belong to a dead process.
pub const DEFAULT_STALE_LOCK_AGE: Duration = Duration::from_secs(300);

// Suffixes tried when two reactivations of one license land in the same second.
const MAX_HISTORY_SUFFIX: u32 = 1000;

const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(10);

// Length of the `YYYYmmdd-HHMMSS` stamp in history file names.
const HISTORY_STAMP_LEN: usize = 15;

/// Record store backed by JSON files under a root directory.
///
/// Read-modify-write of a fingerprint is guarded by a `license-<FP>.lock`
/// file next to the active document, so separate processes sharing the root
/// serialize on the same fingerprint.
#[derive(Debug, Clone)]
pub struct FileRecordStore {
    active_dir: PathBuf,
    history_dir: PathBuf,
    lock_timeout: Duration,
    stale_lock_age: Duration,
}

impl FileRecordStore {
    /// Opens (or creates) a store rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the directories cannot be created.
    pub fn open(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref();
        let store = Self {
            active_dir: root.join(ACTIVE_DIR),
            history_dir: root.join(HISTORY_DIR),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            stale_lock_age: DEFAULT_STALE_LOCK_AGE,
        };
        for dir in [&store.active_dir, &store.history_dir] {
            fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, e))?;
        }
        debug!(root = %root.display(), "Opened license store");
        Ok(store)
    }

    /// Sets how long to wait for a held fingerprint lock.
    #[must_use]
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Sets the age after which a leftover lock file is broken.
    #[must_use]
    pub fn with_stale_lock_age(mut self, age: Duration) -> Self {
        self.stale_lock_age = age;
        self
    }

    /// Path of the active document for `fingerprint`.
    #[must_use]
    pub fn active_path(&self, fingerprint: &HardwareFingerprint) -> PathBuf {
        self.active_dir.join(format!("license-{fingerprint}.json"))
    }

    /// Path of the lock file for `fingerprint`.
    #[must_use]
    pub fn lock_path(&self, fingerprint: &HardwareFingerprint) -> PathBuf {
        self.active_dir.join(format!("license-{fingerprint}.lock"))
    }

    /// Lists history documents for `fingerprint`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the history directory cannot be read.
    pub fn history_files(&self, fingerprint: &HardwareFingerprint) -> StoreResult<Vec<PathBuf>> {
        let prefix = format!("license-{fingerprint}-reactivated-");
        let mut files: Vec<(String, u32, PathBuf)> = json_files(&self.history_dir)?
            .into_iter()
            .filter_map(|path| {
                let (stamp, suffix) = history_order(&path, &prefix)?;
                Some((stamp, suffix, path))
            })
            .collect();
        files.sort();
        Ok(files.into_iter().map(|(_, _, path)| path).collect())
    }

    fn history_path(
        &self,
        fingerprint: &HardwareFingerprint,
        at: DateTime<Utc>,
        suffix: u32,
    ) -> PathBuf {
        let stamp = at.format("%Y%m%d-%H%M%S");
        let name = if suffix == 0 {
            format!("license-{fingerprint}-reactivated-{stamp}.json")
        } else {
            format!("license-{fingerprint}-reactivated-{stamp}-{suffix}.json")
        };
        self.history_dir.join(name)
    }

    fn acquire_lock(&self, fingerprint: &HardwareFingerprint) -> StoreResult<LockFile> {
        let path = self.lock_path(fingerprint);
        let started = Instant::now();
        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    // Holder pid, for operators inspecting a stuck lock.
                    let _ = writeln!(file, "{}", std::process::id());
                    return Ok(LockFile { path });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
                Err(e) => return Err(StoreError::io(&path, e)),
            }

            if self.is_stale(&path) {
                warn!(path = %path.display(), "Breaking stale license lock");
                match fs::remove_file(&path) {
                    Ok(()) => continue,
                    Err(e) if e.kind() == ErrorKind::NotFound => continue,
                    Err(e) => return Err(StoreError::io(&path, e)),
                }
            }
            if started.elapsed() >= self.lock_timeout {
                return Err(StoreError::LockTimeout { path });
            }
            thread::sleep(LOCK_RETRY_INTERVAL);
        }
    }

    fn is_stale(&self, path: &Path) -> bool {
        fs::metadata(path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| SystemTime::now().duration_since(modified).ok())
            .is_some_and(|age| age > self.stale_lock_age)
    }
}

/// Held fingerprint lock; the file is removed on drop.
#[derive(Debug)]
struct LockFile {
    path: PathBuf,
}

impl Drop for LockFile {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "Failed to release license lock");
        }
    }
}

impl RecordStore for FileRecordStore {
    type Error = StoreError;

    fn load_all(&self) -> StoreResult<StoredRecords<StoreError>> {
        let mut paths = json_files(&self.active_dir)?;
        paths.sort();

        let mut stored = StoredRecords::from_records(Vec::with_capacity(paths.len()));
        for path in paths {
            match read_record(&path) {
                Ok(record) => stored.records.push(record),
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "Reporting unreadable license document"
                    );
                    stored.unreadable.push(UnreadableRecord {
                        id: document_id(&path),
                        error: e,
                    });
                }
            }
        }
        Ok(stored)
    }

    fn load_by_fingerprint(
        &self,
        fingerprint: &HardwareFingerprint,
    ) -> StoreResult<Option<LicenseRecord>> {
        let path = self.active_path(fingerprint);
        match read_record(&path) {
            Ok(record) => Ok(Some(record)),
            Err(StoreError::Io { source, .. }) if source.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn save(&self, record: &LicenseRecord) -> StoreResult<()> {
        let path = self.active_path(&record.hardware_fingerprint);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_vec_pretty(record)?;

        fs::write(&tmp, &json).map_err(|e| StoreError::io(&tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| StoreError::io(&path, e))?;
        info!(fingerprint = %record.hardware_fingerprint, path = %path.display(), "Saved license");
        Ok(())
    }

    fn with_record_lock<T>(
        &self,
        fingerprint: &HardwareFingerprint,
        f: impl FnOnce() -> T,
    ) -> StoreResult<T> {
        let _lock = self.acquire_lock(fingerprint)?;
        Ok(f())
    }

    fn append_history(
        &self,
        record: &LicenseRecord,
        reactivated_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let json = serde_json::to_vec_pretty(record)?;
        let fingerprint = &record.hardware_fingerprint;

        for suffix in 0..MAX_HISTORY_SUFFIX {
            let path = self.history_path(fingerprint, reactivated_at, suffix);
            let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(StoreError::io(&path, e)),
            };
            file.write_all(&json).map_err(|e| StoreError::io(&path, e))?;
            info!(
                fingerprint = %fingerprint,
                path = %path.display(),
                "Recorded reactivation history"
            );
            return Ok(());
        }
        Err(StoreError::HistoryExhausted(fingerprint.to_string()))
    }
}

fn read_record(path: &Path) -> StoreResult<LicenseRecord> {
    let bytes = fs::read(path).map_err(|e| StoreError::io(path, e))?;
    serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt {
        path: path.to_path_buf(),
        source,
    })
}

// `license-<FP>.json` is named by its fingerprint, anything else by file name.
fn document_id(path: &Path) -> String {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    stem.strip_prefix("license-").unwrap_or(stem).to_string()
}

// Sort key for `<prefix><stamp>[-<suffix>].json`.
fn history_order(path: &Path, prefix: &str) -> Option<(String, u32)> {
    let rest = path
        .file_name()?
        .to_str()?
        .strip_prefix(prefix)?
        .strip_suffix(".json")?;
    let stamp = rest.get(..HISTORY_STAMP_LEN).unwrap_or(rest);
    let suffix = rest
        .get(HISTORY_STAMP_LEN..)
        .and_then(|tail| tail.strip_prefix('-'))
        .and_then(|n| n.parse().ok())
        .unwrap_or(0);
    Some((stamp.to_string(), suffix))
}

fn json_files(dir: &Path) -> StoreResult<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| StoreError::io(dir, e))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| StoreError::io(dir, e))?.path();
        if path.extension().is_some_and(|ext| ext == "json") && path.is_file() {
            files.push(path);
        }
    }
    Ok(files)
}

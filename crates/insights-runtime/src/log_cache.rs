//! Source-keyed cache of the loaded visitor log.
//!
//! The store is reloaded only when the identity of the source changes
//! (canonical path or modification time) or after [`LogCache::invalidate`].
//! Callers get an `Arc` to an immutable [`LogStore`].

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use insights_core::error::Result;
use insights_data::reader::{find_csv_files, load_events, LogStore};

// ── SourceIdentity ────────────────────────────────────────────────────────────

/// What a cached store was loaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceIdentity {
    /// Canonicalised source path.
    pub path: PathBuf,
    /// Modification time of the file, or of the newest CSV in a directory.
    pub modified: Option<SystemTime>,
}

impl SourceIdentity {
    /// Identity of `source` as it is on disk now, `None` if it is unreadable.
    pub fn probe(source: &Path) -> Option<Self> {
        let path = source.canonicalize().ok()?;
        let modified = if path.is_dir() {
            find_csv_files(&path)
                .iter()
                .filter_map(|f| f.metadata().and_then(|m| m.modified()).ok())
                .max()
        } else {
            path.metadata().and_then(|m| m.modified()).ok()
        };
        Some(Self { path, modified })
    }
}

// ── LogCache ──────────────────────────────────────────────────────────────────

/// Memoized loader for one log source.
///
/// # Example
/// ```no_run
/// use insights_runtime::log_cache::LogCache;
///
/// let mut cache = LogCache::new("sample_weblogs1.csv", "UTC");
/// let store = cache.get().expect("log loads");
/// println!("{} events", store.len());
/// ```
pub struct LogCache {
    source: PathBuf,
    timezone: String,
    cache: Option<Arc<LogStore>>,
    identity: Option<SourceIdentity>,
    /// When the cache was last populated.
    cache_timestamp: Option<Instant>,
    last_error: Option<String>,
}

impl LogCache {
    pub fn new(source: impl Into<PathBuf>, timezone: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            timezone: timezone.into(),
            cache: None,
            identity: None,
            cache_timestamp: None,
            last_error: None,
        }
    }

    // ── Public API ────────────────────────────────────────────────────────

    /// Return the store, loading it when the cache is empty or stale.
    ///
    /// A failed load leaves any previous store cached and records the error.
    pub fn get(&mut self) -> Result<Arc<LogStore>> {
        let current = SourceIdentity::probe(&self.source);
        if let Some(store) = self.cache.as_ref() {
            if current.is_some() && current == self.identity {
                tracing::debug!("returning cached log store");
                return Ok(Arc::clone(store));
            }
        }

        match load_events(&self.source, &self.timezone) {
            Ok(store) => {
                tracing::debug!(
                    source = %self.source.display(),
                    events = store.len(),
                    skipped = store.skipped_rows,
                    "log cache updated"
                );
                let store = Arc::new(store);
                self.cache = Some(Arc::clone(&store));
                self.identity = current;
                self.cache_timestamp = Some(Instant::now());
                self.last_error = None;
                Ok(store)
            }
            Err(e) => {
                tracing::warn!(source = %self.source.display(), error = %e, "log load failed");
                self.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// The last successfully loaded store, without touching the disk.
    pub fn cached(&self) -> Option<Arc<LogStore>> {
        self.cache.clone()
    }

    /// Discard the cached store, forcing the next [`get`](Self::get) to load.
    pub fn invalidate(&mut self) {
        self.cache = None;
        self.identity = None;
        self.cache_timestamp = None;
        tracing::debug!("log cache invalidated");
    }

    /// Point the cache at a different source.
    pub fn set_source(&mut self, source: impl Into<PathBuf>) {
        self.source = source.into();
        self.invalidate();
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn timezone(&self) -> &str {
        &self.timezone
    }

    /// Age of the current cache entry, or `None` if nothing is loaded.
    pub fn cache_age(&self) -> Option<Duration> {
        self.cache_timestamp.map(|ts| ts.elapsed())
    }

    /// Description of the last load error, cleared by the next success.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use insights_core::error::InsightsError;
    use std::fs::{File, FileTimes};
    use tempfile::TempDir;

    const LOG: &str = "ip,session_id,timestamp,url\n1.1.1.1,s1,2024-01-01T10:00,/a\n";

    fn write_log(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    /// Move the file's mtime so identity changes regardless of clock
    /// resolution.
    fn bump_mtime(path: &Path, secs: u64) {
        let file = File::options().write(true).open(path).unwrap();
        let when = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000 + secs);
        file.set_times(FileTimes::new().set_modified(when)).unwrap();
    }

    #[test]
    fn test_cache_miss_on_first_call() {
        let tmp = TempDir::new().unwrap();
        let path = write_log(&tmp, "log.csv", LOG);
        let cache = LogCache::new(&path, "UTC");
        assert!(cache.cached().is_none());
        assert!(cache.cache_age().is_none());
        assert!(cache.last_error().is_none());
    }

    #[test]
    fn test_cache_hit_returns_same_store() {
        let tmp = TempDir::new().unwrap();
        let path = write_log(&tmp, "log.csv", LOG);
        let mut cache = LogCache::new(&path, "UTC");

        let first = cache.get().unwrap();
        let second = cache.get().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(cache.cache_age().unwrap() < Duration::from_secs(5));
    }

    #[test]
    fn test_modified_source_is_reloaded() {
        let tmp = TempDir::new().unwrap();
        let path = write_log(&tmp, "log.csv", LOG);
        bump_mtime(&path, 0);
        let mut cache = LogCache::new(&path, "UTC");
        let first = cache.get().unwrap();
        assert_eq!(first.len(), 1);

        std::fs::write(&path, format!("{LOG}2.2.2.2,s2,2024-01-02T10:00,/b\n")).unwrap();
        bump_mtime(&path, 60);

        let second = cache.get().unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(second.len(), 2);
    }

    #[test]
    fn test_invalidate_forces_reload() {
        let tmp = TempDir::new().unwrap();
        let path = write_log(&tmp, "log.csv", LOG);
        let mut cache = LogCache::new(&path, "UTC");

        let first = cache.get().unwrap();
        cache.invalidate();
        assert!(cache.cached().is_none());
        assert!(cache.cache_age().is_none());

        let second = cache.get().unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_load_failure_records_error_and_keeps_previous() {
        let tmp = TempDir::new().unwrap();
        let path = write_log(&tmp, "log.csv", LOG);
        let mut cache = LogCache::new(&path, "UTC");
        cache.get().unwrap();

        std::fs::remove_file(&path).unwrap();
        let err = cache.get().unwrap_err();
        assert!(matches!(err, InsightsError::SourceNotFound(_)));
        assert!(cache.last_error().is_some());
        assert!(cache.cached().is_some());
    }

    #[test]
    fn test_set_source_switches_store() {
        let tmp = TempDir::new().unwrap();
        let a = write_log(&tmp, "a.csv", LOG);
        let b = write_log(
            &tmp,
            "b.csv",
            "ip,session_id,timestamp,url\n9.9.9.9,s9,2024-02-01,/z\n",
        );
        let mut cache = LogCache::new(&a, "UTC");
        assert_eq!(cache.get().unwrap().events[0].ip, "1.1.1.1");

        cache.set_source(&b);
        assert_eq!(cache.source(), b.as_path());
        assert_eq!(cache.get().unwrap().events[0].ip, "9.9.9.9");
    }

    #[test]
    fn test_directory_identity_tracks_newest_file() {
        let tmp = TempDir::new().unwrap();
        let a = write_log(&tmp, "a.csv", LOG);
        bump_mtime(&a, 0);
        let before = SourceIdentity::probe(tmp.path()).unwrap();

        let b = write_log(&tmp, "b.csv", LOG);
        bump_mtime(&b, 120);
        let after = SourceIdentity::probe(tmp.path()).unwrap();

        assert_eq!(before.path, after.path);
        assert_ne!(before.modified, after.modified);
    }
}

//! Process-wide snapshot cache.
//!
//! Entries are keyed by `(root, mode)`. A lookup returns the cached snapshot
//! unless a tracked file's modification time advanced or the file vanished,
//! in which case the entry is reloaded in place. Eviction is separate: a
//! background sweeper drops entries whose last access is older than the TTL.
//!
//! Reads take the shared lock; loads, refreshes, and evictions take the
//! exclusive lock only long enough to swap the map entry. Loading itself runs
//! outside the lock.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant, SystemTime};

use serde::Serialize;
use symtool_core::error::SymtoolResult;
use symtool_core::snapshot::Snapshot;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cancel::CancellationToken;
use crate::loader::SnapshotLoader;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    pub root: PathBuf,
    pub mode: String,
}

impl CacheKey {
    pub fn new(root: impl Into<PathBuf>, mode: impl Into<String>) -> Self {
        CacheKey {
            root: root.into(),
            mode: mode.into(),
        }
    }
}

struct Entry {
    snapshot: Arc<Snapshot>,
    /// Tracked path to its modification time at load; `None` if it did not
    /// exist then.
    mtimes: Vec<(PathBuf, Option<SystemTime>)>,
    last_access: Mutex<Instant>,
}

impl Entry {
    fn touch(&self, now: Instant) {
        let mut last = self.last_access.lock().unwrap_or_else(|e| e.into_inner());
        *last = now;
    }

    fn last_access(&self) -> Instant {
        *self.last_access.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// First tracked path that changed since `mtimes` was recorded.
fn stale_path(mtimes: &[(PathBuf, Option<SystemTime>)]) -> Option<&Path> {
    mtimes
        .iter()
        .find(|(path, recorded)| match (recorded, modified(path)) {
            (Some(_), None) => true,
            (Some(then), Some(now)) => now > *then,
            (None, Some(_)) => true,
            (None, None) => false,
        })
        .map(|(path, _)| path.as_path())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub refreshes: u64,
    pub evictions: u64,
}

/// Snapshot cache service.
pub struct SnapshotCache {
    loader: Box<dyn SnapshotLoader>,
    ttl: Duration,
    entries: RwLock<HashMap<CacheKey, Arc<Entry>>>,
    hits: AtomicU64,
    misses: AtomicU64,
    refreshes: AtomicU64,
    evictions: AtomicU64,
}

impl std::fmt::Debug for SnapshotCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotCache")
            .field("ttl", &self.ttl)
            .field("stats", &self.stats())
            .finish()
    }
}

impl SnapshotCache {
    pub fn new(loader: impl SnapshotLoader + 'static, ttl: Duration) -> Self {
        SnapshotCache {
            loader: Box::new(loader),
            ttl,
            entries: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            refreshes: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cached snapshot for `(root, mode)`, loading or refreshing as needed.
    ///
    /// Load failures propagate unchanged and leave any existing entry alone.
    pub fn get_or_load(&self, root: &Path, mode: &str) -> SymtoolResult<Arc<Snapshot>> {
        let key = CacheKey::new(root, mode);
        let cached = {
            let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
            entries.get(&key).cloned()
        };

        if let Some(entry) = &cached {
            match stale_path(&entry.mtimes) {
                None => {
                    entry.touch(Instant::now());
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    debug!(root = %root.display(), mode, "snapshot cache hit");
                    return Ok(Arc::clone(&entry.snapshot));
                }
                Some(path) => {
                    info!(root = %root.display(), mode, changed = %path.display(), "snapshot stale; reloading");
                }
            }
        }

        let snapshot = Arc::new(self.loader.load(root, mode)?);
        let mtimes = self
            .loader
            .tracked_paths(root, mode, &snapshot)
            .into_iter()
            .map(|path| {
                let mtime = modified(&path);
                (path, mtime)
            })
            .collect();
        let entry = Arc::new(Entry {
            snapshot: Arc::clone(&snapshot),
            mtimes,
            last_access: Mutex::new(Instant::now()),
        });

        {
            let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
            entries.insert(key, entry);
        }
        if cached.is_some() {
            self.refreshes.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            info!(root = %root.display(), mode, id = %snapshot.id, "snapshot cached");
        }
        Ok(snapshot)
    }

    /// Drop the entry for `(root, mode)`. Returns whether one existed.
    pub fn invalidate(&self, root: &Path, mode: &str) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let removed = entries.remove(&CacheKey::new(root, mode)).is_some();
        if removed {
            debug!(root = %root.display(), mode, "snapshot invalidated");
        }
        removed
    }

    /// Evict entries not accessed within the TTL as of `now`. Returns the
    /// number evicted.
    pub fn sweep(&self, now: Instant) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|key, entry| {
            let idle = now.saturating_duration_since(entry.last_access());
            let keep = idle <= self.ttl;
            if !keep {
                debug!(root = %key.root.display(), mode = %key.mode, idle_ms = idle.as_millis() as u64, "evicting snapshot");
            }
            keep
        });
        let evicted = before - entries.len();
        if evicted > 0 {
            self.evictions.fetch_add(evicted as u64, Ordering::Relaxed);
            info!(evicted, remaining = entries.len(), "cache sweep");
        }
        evicted
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner()).len();
        CacheStats {
            entries,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            refreshes: self.refreshes.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    /// Run [`sweep`](Self::sweep) every `interval` until `cancel` fires.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        cache.sweep(Instant::now());
                    }
                    _ = cancel.cancelled() => {
                        debug!("cache sweeper stopped");
                        break;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::SourceLoader;
    use std::fs::File;
    use std::sync::atomic::AtomicUsize;
    use symtool_core::error::SymtoolError;
    use tempfile::TempDir;

    const SRC: &str = "package app\n\nfunc Run() {}\n";

    fn workspace() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("app.go"), SRC).unwrap();
        dir
    }

    fn bump_mtime(path: &Path) {
        let file = File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() + Duration::from_secs(60)).unwrap();
    }

    /// Source loader that counts loads.
    fn counting(loads: Arc<AtomicUsize>) -> impl SnapshotLoader {
        move |root: &Path, mode: &str| -> SymtoolResult<Snapshot> {
            loads.fetch_add(1, Ordering::SeqCst);
            SourceLoader.load(root, mode)
        }
    }

    mod lookup {
        use super::*;

        #[test]
        fn second_lookup_hits() {
            let dir = workspace();
            let loads = Arc::new(AtomicUsize::new(0));
            let cache = SnapshotCache::new(counting(Arc::clone(&loads)), Duration::from_secs(300));

            let first = cache.get_or_load(dir.path(), "default").unwrap();
            let second = cache.get_or_load(dir.path(), "default").unwrap();
            assert!(Arc::ptr_eq(&first, &second));
            assert_eq!(loads.load(Ordering::SeqCst), 1);
            let stats = cache.stats();
            assert_eq!((stats.entries, stats.hits, stats.misses), (1, 1, 1));
        }

        #[test]
        fn modes_are_separate_entries() {
            let dir = workspace();
            let cache = SnapshotCache::new(SourceLoader, Duration::from_secs(300));
            cache.get_or_load(dir.path(), "default").unwrap();
            cache.get_or_load(dir.path(), "production").unwrap();
            assert_eq!(cache.stats().entries, 2);
        }

        #[test]
        fn load_failures_propagate() {
            let dir = TempDir::new().unwrap();
            let cache = SnapshotCache::new(SourceLoader, Duration::from_secs(300));
            let err = cache.get_or_load(&dir.path().join("missing"), "default").unwrap_err();
            assert!(matches!(err, SymtoolError::LoadFailure { .. }));
            assert_eq!(cache.stats().entries, 0);
        }
    }

    mod refresh {
        use super::*;

        #[test]
        fn newer_mtime_reloads() {
            let dir = workspace();
            let loads = Arc::new(AtomicUsize::new(0));
            let cache = SnapshotCache::new(counting(Arc::clone(&loads)), Duration::from_secs(300));
            let first = cache.get_or_load(dir.path(), "default").unwrap();

            let path = dir.path().join("app.go");
            fs::write(&path, "package app\n\nfunc Run() {}\n\nfunc Stop() {}\n").unwrap();
            bump_mtime(&path);
            let second = cache.get_or_load(dir.path(), "default").unwrap();
            assert!(!Arc::ptr_eq(&first, &second));
            assert!(second.scope_lookup("app", "Stop").is_some());
            assert_eq!(loads.load(Ordering::SeqCst), 2);
            assert_eq!(cache.stats().refreshes, 1);
        }

        #[test]
        fn deleted_file_reloads() {
            let dir = workspace();
            fs::write(dir.path().join("extra.go"), "package app\n").unwrap();
            let cache = SnapshotCache::new(SourceLoader, Duration::from_secs(300));
            assert_eq!(cache.get_or_load(dir.path(), "default").unwrap().files.len(), 2);
            fs::remove_file(dir.path().join("extra.go")).unwrap();
            assert_eq!(cache.get_or_load(dir.path(), "default").unwrap().files.len(), 1);
        }

        #[cfg(unix)]
        #[test]
        fn new_source_file_reloads() {
            let dir = workspace();
            let cache = SnapshotCache::new(SourceLoader, Duration::from_secs(300));
            assert_eq!(cache.get_or_load(dir.path(), "default").unwrap().files.len(), 1);

            fs::write(dir.path().join("extra.go"), "package app\n\nfunc Extra() {}\n").unwrap();
            File::open(dir.path())
                .unwrap()
                .set_modified(SystemTime::now() + Duration::from_secs(60))
                .unwrap();
            let reloaded = cache.get_or_load(dir.path(), "default").unwrap();
            assert_eq!(reloaded.files.len(), 2);
            assert!(reloaded.scope_lookup("app", "Extra").is_some());
            assert_eq!(cache.stats().refreshes, 1);
        }

        #[test]
        fn invalidate_forces_a_load() {
            let dir = workspace();
            let loads = Arc::new(AtomicUsize::new(0));
            let cache = SnapshotCache::new(counting(Arc::clone(&loads)), Duration::from_secs(300));
            cache.get_or_load(dir.path(), "default").unwrap();
            assert!(cache.invalidate(dir.path(), "default"));
            assert!(!cache.invalidate(dir.path(), "default"));
            cache.get_or_load(dir.path(), "default").unwrap();
            assert_eq!(loads.load(Ordering::SeqCst), 2);
        }
    }

    mod eviction {
        use super::*;

        #[test]
        fn sweep_evicts_idle_entries_only() {
            let dir = workspace();
            let other = workspace();
            let cache = SnapshotCache::new(SourceLoader, Duration::from_secs(10));
            cache.get_or_load(dir.path(), "default").unwrap();
            cache.get_or_load(other.path(), "default").unwrap();

            assert_eq!(cache.sweep(Instant::now()), 0);
            // Refresh one entry's access time well past the other's.
            let later = Instant::now() + Duration::from_secs(20);
            {
                let entries = cache.entries.read().unwrap();
                entries[&CacheKey::new(dir.path(), "default")].touch(later);
            }
            assert_eq!(cache.sweep(later + Duration::from_secs(1)), 1);
            let stats = cache.stats();
            assert_eq!((stats.entries, stats.evictions), (1, 1));
            assert!(cache.invalidate(dir.path(), "default"));
        }

        #[tokio::test]
        async fn sweeper_runs_until_cancelled() {
            let dir = workspace();
            let cache = Arc::new(SnapshotCache::new(SourceLoader, Duration::from_millis(1)));
            cache.get_or_load(dir.path(), "default").unwrap();

            let cancel = CancellationToken::new();
            let handle = cache.spawn_sweeper(Duration::from_millis(10), cancel.clone());
            tokio::time::sleep(Duration::from_millis(100)).await;
            assert_eq!(cache.stats().entries, 0);

            cancel.cancel();
            tokio::time::timeout(Duration::from_secs(5), handle)
                .await
                .expect("sweeper did not stop")
                .unwrap();
        }
    }
}

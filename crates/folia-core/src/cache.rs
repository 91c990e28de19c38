//! Snapshot cache with single-flight scans and watch-driven invalidation.
//!
//! [`SnapshotCache`] keeps the last [`LibrarySnapshot`] per resolved root.
//! A recursive filesystem watch on that root clears the cached value on any
//! change, so the next request rescans. Concurrent requests arriving while a
//! scan is running all await that one scan.
//!
//! Lifecycle: the watch is attached by the first request for a root and
//! replaced when a different root is requested. [`SnapshotCache::teardown`]
//! (or dropping the cache) closes it. If the platform cannot watch the root
//! recursively the cache switches to always-rescan mode for the rest of the
//! process lifetime.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::OnceCell;

use crate::error::{CoreError, CoreResult};
use crate::model::LibrarySnapshot;
use crate::path::resolve_root;
use crate::scan::scan_library;

type ScanCell = Arc<OnceCell<Arc<LibrarySnapshot>>>;

struct Cached {
    root: PathBuf,
    snapshot: Arc<LibrarySnapshot>,
}

struct Inflight {
    root: PathBuf,
    cell: ScanCell,
    generation: u64,
}

struct CacheState {
    cached: Option<Cached>,
    inflight: Option<Inflight>,
    /// Bumped on every invalidation; a scan that started before a bump must
    /// not be cached.
    generation: u64,
    watch_supported: bool,
}

impl CacheState {
    fn invalidate(&mut self) {
        self.cached = None;
        self.generation = self.generation.wrapping_add(1);
    }
}

struct RootWatcher {
    root: PathBuf,
    _watcher: RecommendedWatcher,
}

#[derive(Default)]
struct WatchSlot {
    current: Option<RootWatcher>,
    /// Makes every attach fail, as on a platform without recursive watches.
    refuse: bool,
}

/// Process-wide holder of the current library snapshot.
pub struct SnapshotCache {
    state: Arc<Mutex<CacheState>>,
    watcher: Arc<Mutex<WatchSlot>>,
    scans: AtomicU64,
}

impl Default for SnapshotCache {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(CacheState {
                cached: None,
                inflight: None,
                generation: 0,
                watch_supported: true,
            })),
            watcher: Arc::new(Mutex::new(WatchSlot::default())),
            scans: AtomicU64::new(0),
        }
    }

    /// A cache whose watcher can never attach.
    #[cfg(test)]
    fn without_watch() -> Self {
        let cache = Self::new();
        lock(&cache.watcher).refuse = true;
        cache
    }

    /// Returns the snapshot for `root`, scanning only when nothing valid is
    /// cached.
    ///
    /// # Errors
    ///
    /// Propagates [`scan_library`] failures for an unreadable root, or
    /// [`CoreError::ScanTask`] if the blocking scan task is lost.
    pub async fn snapshot(&self, root: &Path) -> CoreResult<Arc<LibrarySnapshot>> {
        let root = resolve_root(root);

        let (cell, generation) = {
            let mut state = lock(&self.state);
            if state.watch_supported {
                if let Some(cached) = state.cached.as_ref().filter(|c| c.root == root) {
                    tracing::trace!("snapshot cache hit for {}", root.display());
                    return Ok(Arc::clone(&cached.snapshot));
                }
            }
            // A scan that began before the latest invalidation may have
            // missed the change, so later requests start their own.
            let current = state.generation;
            match state
                .inflight
                .as_ref()
                .filter(|f| f.root == root && f.generation == current)
            {
                Some(flight) => {
                    tracing::debug!("joining in-flight scan of {}", root.display());
                    (Arc::clone(&flight.cell), flight.generation)
                }
                None => {
                    let cell: ScanCell = Arc::new(OnceCell::new());
                    let generation = state.generation;
                    state.inflight = Some(Inflight {
                        root: root.clone(),
                        cell: Arc::clone(&cell),
                        generation,
                    });
                    (cell, generation)
                }
            }
        };

        let result = cell
            .get_or_try_init(|| async {
                self.scans.fetch_add(1, Ordering::Relaxed);
                let state = Arc::clone(&self.state);
                let watcher = Arc::clone(&self.watcher);
                let scan_root = root.clone();
                let snapshot = tokio::task::spawn_blocking(move || {
                    // Watch before walking so changes made during the walk
                    // still invalidate the result.
                    ensure_watcher(&state, &watcher, &scan_root);
                    scan_library(&scan_root)
                })
                .await
                .map_err(|e| CoreError::ScanTask(e.to_string()))??;
                Ok::<_, CoreError>(Arc::new(snapshot))
            })
            .await
            .map(Arc::clone);

        let mut state = lock(&self.state);
        let owns_flight = state
            .inflight
            .as_ref()
            .is_some_and(|f| Arc::ptr_eq(&f.cell, &cell));
        if owns_flight {
            state.inflight = None;
        }

        let snapshot = result?;
        if owns_flight
            && state.watch_supported
            && state.generation == generation
            && !snapshot.root_missing
        {
            state.cached = Some(Cached {
                root,
                snapshot: Arc::clone(&snapshot),
            });
        }
        Ok(snapshot)
    }

    /// Drops any cached snapshot so the next request rescans.
    pub fn invalidate(&self) {
        lock(&self.state).invalidate();
    }

    /// Returns `true` if a snapshot for `root` is currently cached.
    pub fn is_cached(&self, root: &Path) -> bool {
        let root = resolve_root(root);
        lock(&self.state)
            .cached
            .as_ref()
            .is_some_and(|c| c.root == root)
    }

    /// Returns `false` once the cache has fallen back to always-rescan mode.
    pub fn watch_supported(&self) -> bool {
        lock(&self.state).watch_supported
    }

    /// Number of scans started by this cache.
    pub fn scan_count(&self) -> u64 {
        self.scans.load(Ordering::Relaxed)
    }

    /// Closes the filesystem watch and forgets the cached snapshot.
    pub fn teardown(&self) {
        lock(&self.watcher).current.take();
        self.invalidate();
        tracing::debug!("snapshot cache torn down");
    }
}

/// Attaches the recursive watch for `root`, replacing a watch on any other
/// root. Runs on the blocking pool since registration walks the tree.
fn ensure_watcher(state: &Arc<Mutex<CacheState>>, slot: &Mutex<WatchSlot>, root: &Path) {
    if !lock(state).watch_supported {
        return;
    }
    // A missing root cannot be watched; its snapshots are never cached,
    // so it is simply retried on the next request.
    if !root.is_dir() {
        return;
    }

    let mut slot = lock(slot);
    if slot.current.as_ref().is_some_and(|w| w.root == root) {
        return;
    }
    slot.current.take();

    let attached = if slot.refuse {
        Err(CoreError::Watch(notify::Error::generic(
            "recursive watching disabled",
        )))
    } else {
        watch_root(root, Arc::clone(state))
    };
    match attached {
        Ok(watcher) => {
            tracing::debug!("watching {} for changes", root.display());
            slot.current = Some(watcher);
        }
        Err(e) => {
            tracing::warn!(
                "recursive watch unavailable for {} ({e}); snapshots will be rescanned on every request",
                root.display()
            );
            let mut state = lock(state);
            state.watch_supported = false;
            state.invalidate();
        }
    }
}

fn watch_root(root: &Path, state: Arc<Mutex<CacheState>>) -> CoreResult<RootWatcher> {
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
        let relevant = match &res {
            Ok(event) => !matches!(event.kind, EventKind::Access(_)),
            Err(_) => true,
        };
        if relevant {
            lock(&state).invalidate();
        }
    })?;
    watcher.watch(root, RecursiveMode::Recursive)?;
    Ok(RootWatcher {
        root: root.to_path_buf(),
        _watcher: watcher,
    })
}

/// Locks a mutex, recovering the data if a previous holder panicked.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    #[tokio::test]
    async fn second_request_is_served_from_cache() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("notes")).unwrap();
        fs::write(tmp.path().join("notes/todo.md"), "").unwrap();
        let cache = SnapshotCache::new();

        let first = cache.snapshot(tmp.path()).await.unwrap();
        let second = cache.snapshot(tmp.path()).await.unwrap();

        if cache.watch_supported() {
            assert!(Arc::ptr_eq(&first, &second));
            assert_eq!(cache.scan_count(), 1);
        }
        assert_eq!(first.tree.children[0].path, "notes");
    }

    #[tokio::test]
    async fn concurrent_requests_share_one_scan() {
        let tmp = TempDir::new().unwrap();
        for i in 0..20 {
            fs::write(tmp.path().join(format!("p{i}.md")), "").unwrap();
        }
        let cache = SnapshotCache::new();

        let (a, b, c, d) = tokio::join!(
            cache.snapshot(tmp.path()),
            cache.snapshot(tmp.path()),
            cache.snapshot(tmp.path()),
            cache.snapshot(tmp.path()),
        );
        let (a, b, c, d) = (a.unwrap(), b.unwrap(), c.unwrap(), d.unwrap());

        assert_eq!(cache.scan_count(), 1);
        assert!(Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&a, &c));
        assert!(Arc::ptr_eq(&a, &d));
    }

    #[tokio::test]
    async fn invalidate_forces_rescan() {
        let tmp = TempDir::new().unwrap();
        let cache = SnapshotCache::new();

        cache.snapshot(tmp.path()).await.unwrap();
        fs::write(tmp.path().join("new.md"), "").unwrap();
        cache.invalidate();
        let fresh = cache.snapshot(tmp.path()).await.unwrap();

        assert_eq!(cache.scan_count(), 2);
        assert_eq!(fresh.tree.children[0].name, "new.md");
    }

    #[tokio::test]
    async fn different_root_triggers_new_scan() {
        let one = TempDir::new().unwrap();
        let two = TempDir::new().unwrap();
        fs::write(two.path().join("only-here.md"), "").unwrap();
        let cache = SnapshotCache::new();

        let first = cache.snapshot(one.path()).await.unwrap();
        let second = cache.snapshot(two.path()).await.unwrap();

        assert!(first.tree.children.is_empty());
        assert_eq!(second.tree.children.len(), 1);
        assert!(!cache.is_cached(one.path()));
        assert_eq!(cache.scan_count(), 2);
    }

    #[tokio::test]
    async fn missing_root_is_not_cached() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("later");
        let cache = SnapshotCache::new();

        let missing = cache.snapshot(&root).await.unwrap();
        assert!(missing.root_missing);
        assert!(!cache.is_cached(&root));

        fs::create_dir(&root).unwrap();
        fs::write(root.join("a.md"), "").unwrap();
        let present = cache.snapshot(&root).await.unwrap();
        assert!(!present.root_missing);
        assert_eq!(present.tree.children.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn filesystem_change_invalidates_cache() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("notes")).unwrap();
        let cache = SnapshotCache::new();
        cache.snapshot(tmp.path()).await.unwrap();
        if !cache.watch_supported() {
            return;
        }
        assert!(cache.is_cached(tmp.path()));

        fs::write(tmp.path().join("notes/added.md"), "hello").unwrap();

        let mut invalidated = false;
        for _ in 0..50 {
            if !cache.is_cached(tmp.path()) {
                invalidated = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert!(invalidated, "watcher should clear the cached snapshot");

        let fresh = cache.snapshot(tmp.path()).await.unwrap();
        assert_eq!(fresh.tree.children[0].children[0].path, "notes/added.md");
    }

    #[tokio::test]
    async fn failed_watch_falls_back_to_rescanning() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.md"), "").unwrap();
        let cache = SnapshotCache::without_watch();

        let first = cache.snapshot(tmp.path()).await.unwrap();
        assert!(!cache.watch_supported());
        assert!(!cache.is_cached(tmp.path()));

        fs::write(tmp.path().join("b.md"), "").unwrap();
        let second = cache.snapshot(tmp.path()).await.unwrap();

        assert_eq!(cache.scan_count(), 2);
        assert!(!cache.is_cached(tmp.path()));
        assert_eq!(first.tree.children.len(), 1);
        assert_eq!(second.tree.children.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn request_after_invalidation_starts_its_own_scan() {
        let tmp = TempDir::new().unwrap();
        for i in 0..2000 {
            fs::write(tmp.path().join(format!("p{i}.md")), "").unwrap();
        }
        let cache = Arc::new(SnapshotCache::new());

        let background = {
            let cache = Arc::clone(&cache);
            let root = tmp.path().to_path_buf();
            tokio::spawn(async move { cache.snapshot(&root).await.map(|_| ()) })
        };
        while cache.scan_count() == 0 {
            tokio::task::yield_now().await;
        }

        fs::write(tmp.path().join("fresh.md"), "").unwrap();
        cache.invalidate();
        let snapshot = cache.snapshot(tmp.path()).await.unwrap();
        background.await.unwrap().unwrap();

        assert_eq!(cache.scan_count(), 2);
        assert!(snapshot.tree.children.iter().any(|c| c.path == "fresh.md"));
    }

    #[tokio::test]
    async fn teardown_clears_cache() {
        let tmp = TempDir::new().unwrap();
        let cache = SnapshotCache::new();
        cache.snapshot(tmp.path()).await.unwrap();

        cache.teardown();

        assert!(!cache.is_cached(tmp.path()));
        cache.snapshot(tmp.path()).await.unwrap();
        assert_eq!(cache.scan_count(), 2);
    }
}

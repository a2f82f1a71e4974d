//! File lock manager
//!
//! Serializes operations keyed by normalized filesystem path. Each path maps
//! to a fair (FIFO) async mutex: a new operation runs strictly after every
//! previously queued operation on the same path has settled, whether it
//! succeeded or failed, while operations on distinct paths run fully
//! concurrently. Entries are dropped once no operation holds or waits on
//! them.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Component, Path};
use std::sync::{Arc, Mutex};

use tokio::sync::Mutex as AsyncMutex;

struct PathLock {
    mutex: Arc<AsyncMutex<()>>,
    /// Operations currently holding or waiting on this path
    pending: usize,
}

/// Decrements the path's pending count when dropped, including when the
/// surrounding future is cancelled mid-operation
struct Checkout<'a> {
    manager: &'a FileLockManager,
    key: String,
}

impl Drop for Checkout<'_> {
    fn drop(&mut self) {
        self.manager.release(&self.key);
    }
}

/// Per-path FIFO serialization of asynchronous operations
#[derive(Default)]
pub struct FileLockManager {
    locks: Mutex<HashMap<String, PathLock>>,
}

impl FileLockManager {
    /// Create a new lock manager
    pub fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Run `op` while holding the lock for `path`.
    ///
    /// Queued operations on the same path run in strict submission order; a
    /// failing operation releases the lock normally and does not poison the
    /// chain for later operations.
    pub async fn acquire_lock<T>(
        &self,
        path: impl AsRef<Path>,
        op: impl Future<Output = T>,
    ) -> T {
        let key = normalize(path.as_ref());
        let mutex = self.checkout(&key);
        // Declared before the guard so the mutex is released first on drop
        let _checkout = Checkout { manager: self, key };

        let _guard = mutex.lock().await;
        op.await
    }

    /// Run `op` while holding the locks for every path in `paths`.
    ///
    /// Locks are acquired in sorted order so two multi-path operations can
    /// never deadlock against each other. An empty path list runs `op`
    /// without locking.
    pub async fn acquire_locks<T>(
        &self,
        paths: &[String],
        op: impl Future<Output = T>,
    ) -> T {
        let mut keys: Vec<String> = paths.iter().map(|p| normalize(Path::new(p))).collect();
        keys.sort();
        keys.dedup();

        let mutexes: Vec<Arc<AsyncMutex<()>>> =
            keys.iter().map(|key| self.checkout(key)).collect();
        let _checkouts: Vec<Checkout> = keys
            .iter()
            .map(|key| Checkout {
                manager: self,
                key: key.clone(),
            })
            .collect();

        // Guards declared after the checkouts, so they drop first
        let mut guards = Vec::with_capacity(mutexes.len());
        for mutex in &mutexes {
            guards.push(mutex.clone().lock_owned().await);
        }

        let result = op.await;
        drop(guards);
        result
    }

    fn checkout(&self, key: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap();
        let entry = locks.entry(key.to_string()).or_insert_with(|| PathLock {
            mutex: Arc::new(AsyncMutex::new(())),
            pending: 0,
        });
        entry.pending += 1;
        entry.mutex.clone()
    }

    fn release(&self, key: &str) {
        let mut locks = self.locks.lock().unwrap();
        if let Some(entry) = locks.get_mut(key) {
            entry.pending = entry.pending.saturating_sub(1);
            if entry.pending == 0 {
                locks.remove(key);
            }
        }
    }

    /// Whether any operation currently holds or waits on the path
    pub fn is_locked(&self, path: impl AsRef<Path>) -> bool {
        let key = normalize(path.as_ref());
        self.locks.lock().unwrap().contains_key(&key)
    }

    /// Paths with an active or queued operation
    pub fn locked_paths(&self) -> Vec<String> {
        self.locks.lock().unwrap().keys().cloned().collect()
    }

    /// Drop all bookkeeping (test/reset utility).
    ///
    /// In-flight operations keep their own mutex handles and finish
    /// normally; only the manager's map is cleared.
    pub fn clear_all(&self) {
        self.locks.lock().unwrap().clear();
    }
}

/// Normalize a path for use as a lock key: strip `.` components and trailing
/// separators without touching the filesystem
fn normalize(path: &Path) -> String {
    let mut out = String::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::RootDir => out.push('/'),
            other => {
                if !out.is_empty() && !out.ends_with('/') {
                    out.push('/');
                }
                out.push_str(&other.as_os_str().to_string_lossy());
            }
        }
    }
    if out.is_empty() {
        ".".to_string()
    } else {
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(Path::new("/a/b/")), "/a/b");
        assert_eq!(normalize(Path::new("./a/./b")), "a/b");
        assert_eq!(normalize(Path::new("/")), "/");
    }

    #[tokio::test]
    async fn test_same_path_runs_in_submission_order() {
        let manager = FileLockManager::new();
        let spans: Arc<Mutex<Vec<(usize, Instant, Instant)>>> = Arc::new(Mutex::new(Vec::new()));

        let run = |id: usize, delay_ms: u64| {
            let spans = spans.clone();
            let manager = &manager;
            async move {
                manager
                    .acquire_lock("/f", async {
                        let start = Instant::now();
                        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                        spans.lock().unwrap().push((id, start, Instant::now()));
                    })
                    .await;
            }
        };

        // join! polls in order, so lock requests queue 0, 1, 2
        tokio::join!(run(0, 30), run(1, 10), run(2, 20));

        let spans = spans.lock().unwrap();
        let ids: Vec<usize> = spans.iter().map(|(id, _, _)| *id).collect();
        assert_eq!(ids, vec![0, 1, 2]);

        // Each body fully completes before the next one starts
        for pair in spans.windows(2) {
            assert!(pair[0].2 <= pair[1].1);
        }
    }

    #[tokio::test]
    async fn test_distinct_paths_run_concurrently() {
        let manager = FileLockManager::new();
        let start = Instant::now();

        tokio::join!(
            manager.acquire_lock("/a", tokio::time::sleep(Duration::from_millis(50))),
            manager.acquire_lock("/b", tokio::time::sleep(Duration::from_millis(50))),
        );

        // Serialized execution would take >= 100ms
        assert!(start.elapsed() < Duration::from_millis(95));
    }

    #[tokio::test]
    async fn test_failure_does_not_poison_chain() {
        let manager = FileLockManager::new();

        let first: Result<(), &str> = manager.acquire_lock("/f", async { Err("boom") }).await;
        assert!(first.is_err());

        let second = manager.acquire_lock("/f", async { 42 }).await;
        assert_eq!(second, 42);
    }

    #[tokio::test]
    async fn test_is_locked_and_cleanup() {
        let manager = Arc::new(FileLockManager::new());
        assert!(!manager.is_locked("/f"));

        let (started_tx, started_rx) = tokio::sync::oneshot::channel();
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();

        let held = {
            let manager = manager.clone();
            tokio::spawn(async move {
                manager
                    .acquire_lock("/f", async {
                        started_tx.send(()).unwrap();
                        release_rx.await.unwrap();
                    })
                    .await;
            })
        };

        started_rx.await.unwrap();
        assert!(manager.is_locked("/f"));
        assert_eq!(manager.locked_paths(), vec!["/f".to_string()]);

        release_tx.send(()).unwrap();
        held.await.unwrap();
        assert!(!manager.is_locked("/f"));
        assert!(manager.locked_paths().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_operation_releases_bookkeeping() {
        let manager = FileLockManager::new();

        // Drop the acquire future mid-operation, as a cancelled pipeline does
        let slow = manager.acquire_lock("/f", async {
            tokio::time::sleep(Duration::from_secs(5)).await;
        });
        tokio::select! {
            biased;
            _ = tokio::time::sleep(Duration::from_millis(10)) => {}
            _ = slow => {}
        }

        assert!(!manager.is_locked("/f"));
        assert!(manager.locked_paths().is_empty());

        // The path is still usable afterwards
        let value = manager.acquire_lock("/f", async { 7 }).await;
        assert_eq!(value, 7);
        assert!(!manager.is_locked("/f"));
    }

    #[tokio::test]
    async fn test_acquire_locks_multiple_paths() {
        let manager = FileLockManager::new();
        let result = manager
            .acquire_locks(
                &["/b".to_string(), "/a".to_string(), "/b".to_string()],
                async { "done" },
            )
            .await;
        assert_eq!(result, "done");
        assert!(!manager.is_locked("/a"));
        assert!(!manager.is_locked("/b"));
    }
}

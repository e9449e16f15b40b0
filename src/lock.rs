//! Advisory in-process registry of media paths currently being processed.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Identity of whoever holds a lock, one per workflow run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LockHolder(Uuid);

impl LockHolder {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LockHolder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for LockHolder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Cloneable handle; all clones share the same lock table
#[derive(Debug, Clone, Default)]
pub struct FileLockRegistry {
    locks: Arc<Mutex<HashMap<PathBuf, LockHolder>>>,
}

fn lock_key(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

impl FileLockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lock for `path`; `false` when anyone already holds it.
    pub fn lock<P: AsRef<Path>>(&self, path: P, holder: LockHolder) -> bool {
        self.lock_by_key(lock_key(path.as_ref()), holder)
    }

    fn lock_by_key(&self, key: PathBuf, holder: LockHolder) -> bool {
        let mut locks = self.locks.lock();
        if let Some(current) = locks.get(&key) {
            warn!("File already locked by run {}: {}", current, key.display());
            return false;
        }
        debug!("File locked by run {}: {}", holder, key.display());
        locks.insert(key, holder);
        true
    }

    /// Release `path`; returns whether it was locked.
    pub fn unlock<P: AsRef<Path>>(&self, path: P) -> bool {
        self.unlock_key(&lock_key(path.as_ref()))
    }

    fn unlock_key(&self, key: &Path) -> bool {
        let released = self.locks.lock().remove(key).is_some();
        if released {
            debug!("File unlocked: {}", key.display());
        } else {
            warn!("File was not locked: {}", key.display());
        }
        released
    }

    pub fn is_locked<P: AsRef<Path>>(&self, path: P) -> bool {
        self.locks.lock().contains_key(&lock_key(path.as_ref()))
    }

    /// Lock `path` and return a guard that unlocks it when dropped.
    pub fn try_acquire<P: AsRef<Path>>(&self, path: P, holder: LockHolder) -> Option<FileLockGuard> {
        let path = path.as_ref();
        let key = lock_key(path);
        // The guard releases by this key; re-resolving later can differ
        // once the file is moved or a symlink target disappears
        if self.lock_by_key(key.clone(), holder) {
            Some(FileLockGuard {
                registry: self.clone(),
                path: path.to_path_buf(),
                key,
            })
        } else {
            None
        }
    }

    pub fn clear(&self) {
        self.locks.lock().clear();
        debug!("All file locks released");
    }

    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.lock().is_empty()
    }
}

/// Releases its path on drop, including on early return and error paths
#[derive(Debug)]
pub struct FileLockGuard {
    registry: FileLockRegistry,
    path: PathBuf,
    key: PathBuf,
}

impl FileLockGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileLockGuard {
    fn drop(&mut self) {
        self.registry.unlock_key(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::thread;

    #[test]
    fn test_lock_unlock_cycle() {
        let registry = FileLockRegistry::new();
        let run = LockHolder::new();

        assert!(registry.lock("video.mp4", run));
        assert!(registry.is_locked("video.mp4"));
        assert!(!registry.lock("video.mp4", run));
        assert!(registry.unlock("video.mp4"));
        assert!(!registry.is_locked("video.mp4"));
        assert!(!registry.unlock("video.mp4"));
        assert!(registry.lock("video.mp4", LockHolder::new()));
    }

    #[test]
    fn test_concurrent_lock_only_one_wins() {
        let registry = FileLockRegistry::new();
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    registry.lock("/media/shared.mkv", LockHolder::new())
                })
            })
            .collect();

        let winners = handles.into_iter().map(|h| h.join().unwrap()).filter(|won| *won).count();
        assert_eq!(winners, 1);
    }

    #[test]
    fn test_guard_unlocks_on_drop() {
        let registry = FileLockRegistry::new();
        let run = LockHolder::new();
        {
            let guard = registry.try_acquire("a.mp4", run).unwrap();
            assert_eq!(guard.path(), Path::new("a.mp4"));
            assert!(registry.is_locked("a.mp4"));
            assert!(registry.try_acquire("a.mp4", LockHolder::new()).is_none());
        }
        assert!(!registry.is_locked("a.mp4"));
        assert!(registry.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_guard_releases_after_symlink_target_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("real.mp4");
        let link = dir.path().join("link.mp4");
        std::fs::write(&target, b"").unwrap();
        std::os::unix::fs::symlink(&target, &link).unwrap();

        let registry = FileLockRegistry::new();
        let guard = registry.try_acquire(&link, LockHolder::new()).unwrap();
        assert!(registry.is_locked(&target));

        std::fs::remove_file(&target).unwrap();
        drop(guard);
        assert!(registry.is_empty());

        std::fs::write(&target, b"").unwrap();
        assert!(registry.try_acquire(&link, LockHolder::new()).is_some());
    }

    #[test]
    fn test_clear_releases_everything() {
        let registry = FileLockRegistry::new();
        let run = LockHolder::new();
        registry.lock("a.mp4", run);
        registry.lock("b.mp4", run);
        assert_eq!(registry.len(), 2);
        registry.clear();
        assert!(registry.is_empty());
    }
}

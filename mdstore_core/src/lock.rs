//! Reentrant, multi-process lock for read-modify-write sequences on a realm.
//!
//! The exclusive part is an OS file lock on `<realm>/mdstore.lock`. The OS
//! drops it when the owning process exits, so a crashed holder cannot leave
//! a stale lock behind. Within one process the lock is reentrant: nested
//! acquisitions only bump a counter, and the file lock is released when the
//! outermost guard drops.

use crate::error::Result;
use fs4::FileExt;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Instant;
use tracing::{debug, warn};

/// Name of the lock file inside a realm.
pub const LOCK_FILE_NAME: &str = "mdstore.lock";

static REGISTRY: OnceLock<Mutex<HashMap<PathBuf, Arc<BackendLock>>>> = OnceLock::new();

#[derive(Debug, Default)]
struct LockState {
    depth: usize,
    /// Open, locked handle; `Some` iff `depth > 0`.
    file: Option<File>,
}

/// Per-realm lock handle. Obtain one with [`BackendLock::for_realm`].
///
/// Reentrancy is counted per process, not per thread: once any thread holds
/// the lock, another thread of the same process acquires it without
/// blocking. Only other processes are excluded, so callers that share a
/// realm across threads must serialize their access themselves.
#[derive(Debug)]
pub struct BackendLock {
    realm: PathBuf,
    state: Mutex<LockState>,
}

impl BackendLock {
    /// The process-wide lock handle for `realm`.
    ///
    /// Paths naming the same directory share one handle.
    pub fn for_realm(realm: &Path) -> Arc<BackendLock> {
        let key = realm.canonicalize().unwrap_or_else(|_| realm.to_path_buf());
        let registry = REGISTRY.get_or_init(Default::default);
        let mut locks = registry.lock().unwrap_or_else(PoisonError::into_inner);

        locks
            .entry(key.clone())
            .or_insert_with(|| {
                Arc::new(BackendLock {
                    realm: key,
                    state: Mutex::new(LockState::default()),
                })
            })
            .clone()
    }

    pub fn realm(&self) -> &Path {
        &self.realm
    }

    pub fn lock_file_path(&self) -> PathBuf {
        self.realm.join(LOCK_FILE_NAME)
    }

    /// Current nesting depth; zero means the file lock is not held.
    pub fn depth(&self) -> usize {
        self.state().depth
    }

    /// Acquire the lock, blocking until no other process holds it.
    ///
    /// The lock is held until the returned guard and every guard acquired
    /// after it have been dropped.
    pub fn acquire(self: Arc<Self>) -> Result<BackendLockGuard> {
        {
            let mut state = self.state();
            if state.depth == 0 {
                let file = OpenOptions::new()
                    .read(true)
                    .write(true)
                    .create(true)
                    .truncate(false)
                    .open(self.lock_file_path())?;

                let started = Instant::now();
                file.lock_exclusive()?;
                debug!(
                    pid = std::process::id(),
                    realm = %self.realm.display(),
                    waited_ms = started.elapsed().as_millis() as u64,
                    "locked backend"
                );
                state.file = Some(file);
            }
            state.depth += 1;
        }

        Ok(BackendLockGuard { lock: self })
    }

    fn release(&self) {
        let mut state = self.state();
        assert!(
            state.depth > 0,
            "backend lock for {} released without a matching acquire",
            self.realm.display()
        );

        state.depth -= 1;
        if state.depth == 0
            && let Some(file) = state.file.take()
        {
            if let Err(e) = FileExt::unlock(&file) {
                // Closing the handle below releases the lock anyway
                warn!(realm = %self.realm.display(), error = %e, "explicit unlock failed");
            }
            debug!(pid = std::process::id(), realm = %self.realm.display(), "unlocked backend");
        }
    }

    fn state(&self) -> MutexGuard<'_, LockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Scoped acquisition of a [`BackendLock`]; releases on drop.
#[derive(Debug)]
#[must_use = "the backend lock is released as soon as the guard is dropped"]
pub struct BackendLockGuard {
    lock: Arc<BackendLock>,
}

impl BackendLockGuard {
    pub fn lock(&self) -> &BackendLock {
        &self.lock
    }
}

impl Drop for BackendLockGuard {
    fn drop(&mut self) {
        self.lock.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// Whether a separate handle, as another process would hold, can take
    /// the lock right now.
    fn lockable_from_outside(lock: &BackendLock) -> bool {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(lock.lock_file_path())
            .unwrap();
        let acquired = file.try_lock_exclusive().is_ok();
        if acquired {
            FileExt::unlock(&file).unwrap();
        }
        acquired
    }

    #[test]
    fn test_same_realm_shares_handle() {
        let temp_dir = TempDir::new().unwrap();
        let a = BackendLock::for_realm(temp_dir.path());
        let b = BackendLock::for_realm(&temp_dir.path().join("."));
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_acquire_and_release() {
        let temp_dir = TempDir::new().unwrap();
        let lock = BackendLock::for_realm(temp_dir.path());

        let guard = lock.clone().acquire().unwrap();
        assert_eq!(lock.depth(), 1);
        assert!(lock.lock_file_path().exists());
        assert!(!lockable_from_outside(&lock));

        drop(guard);
        assert_eq!(lock.depth(), 0);
        assert!(lockable_from_outside(&lock));
    }

    #[test]
    fn test_reentrant_acquire_releases_on_outermost_drop() {
        let temp_dir = TempDir::new().unwrap();
        let lock = BackendLock::for_realm(temp_dir.path());

        let outer = lock.clone().acquire().unwrap();
        let inner = BackendLock::for_realm(temp_dir.path()).acquire().unwrap();
        assert_eq!(lock.depth(), 2);

        drop(inner);
        assert_eq!(lock.depth(), 1);
        assert!(!lockable_from_outside(&lock));

        drop(outer);
        assert_eq!(lock.depth(), 0);
        assert!(lockable_from_outside(&lock));
    }

    #[test]
    fn test_other_thread_enters_held_lock() {
        let temp_dir = TempDir::new().unwrap();
        let lock = BackendLock::for_realm(temp_dir.path());
        let _held = lock.clone().acquire().unwrap();

        let shared = lock.clone();
        let depth_in_thread = std::thread::spawn(move || {
            let _guard = shared.clone().acquire().unwrap();
            shared.depth()
        })
        .join()
        .unwrap();

        assert_eq!(depth_in_thread, 2);
        assert_eq!(lock.depth(), 1);
    }

    #[test]
    fn test_guard_released_on_error_path() {
        fn failing_update(realm: &Path) -> Result<()> {
            let _guard = BackendLock::for_realm(realm).acquire()?;
            Err(crate::error::Error::invalid_ref("simulated failure"))
        }

        let temp_dir = TempDir::new().unwrap();
        assert!(failing_update(temp_dir.path()).is_err());

        let lock = BackendLock::for_realm(temp_dir.path());
        assert_eq!(lock.depth(), 0);
        assert!(lockable_from_outside(&lock));
    }

    #[test]
    fn test_acquire_fails_for_missing_realm() {
        let temp_dir = TempDir::new().unwrap();
        let lock = BackendLock::for_realm(&temp_dir.path().join("missing"));

        assert!(lock.clone().acquire().is_err());
        assert_eq!(lock.depth(), 0);
    }
}

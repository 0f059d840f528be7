//! Scoped history-store locking

use crate::migration::{HistoryStore, MigrationError};

/// Lock guard that releases the store lock on every exit path
///
/// Call [`LockGuard::release`] to choose between commit and rollback and to observe
/// unlock errors. A guard dropped without `release` (early return, panic) rolls back.
pub struct LockGuard<'a, H: HistoryStore + ?Sized> {
    store: &'a H,
    released: bool,
}

impl<'a, H: HistoryStore + ?Sized> LockGuard<'a, H> {
    /// Acquire the store lock and create guard
    ///
    /// # Errors
    ///
    /// Propagates `AlreadyLocked` / `Lock` from the store.
    pub fn acquire(store: &'a H) -> Result<Self, MigrationError> {
        store.lock()?;
        log::debug!("Acquired migration lock on {}", store.target());
        Ok(Self {
            store,
            released: false,
        })
    }

    /// Get a reference to the locked store
    pub fn store(&self) -> &'a H {
        self.store
    }

    /// Commit (or roll back) and release the lock
    pub fn release(mut self, commit: bool) -> Result<(), MigrationError> {
        self.released = true;
        let result = self.store.unlock(commit);
        log::debug!(
            "Released migration lock on {} ({})",
            self.store.target(),
            if commit { "commit" } else { "rollback" }
        );
        result
    }
}

impl<H: HistoryStore + ?Sized> Drop for LockGuard<'_, H> {
    fn drop(&mut self) {
        if !self.released {
            if let Err(e) = self.store.unlock(false) {
                log::warn!("Failed to release migration lock on {}: {}", self.store.target(), e);
            }
        }
    }
}

/// Run `f` while holding the store lock
///
/// The lock is released with `commit = true` only if `f` succeeds. When `f` fails its
/// error is returned even if releasing the lock fails too; when only the release fails,
/// the release error is returned.
pub fn with_lock<H, T, F>(store: &H, f: F) -> Result<T, MigrationError>
where
    H: HistoryStore + ?Sized,
    F: FnOnce(&H) -> Result<T, MigrationError>,
{
    run_locked(store, true, f)
}

/// Like [`with_lock`], but always releases with `commit = false`
pub fn with_read_lock<H, T, F>(store: &H, f: F) -> Result<T, MigrationError>
where
    H: HistoryStore + ?Sized,
    F: FnOnce(&H) -> Result<T, MigrationError>,
{
    run_locked(store, false, f)
}

fn run_locked<H, T, F>(store: &H, commit_on_success: bool, f: F) -> Result<T, MigrationError>
where
    H: HistoryStore + ?Sized,
    F: FnOnce(&H) -> Result<T, MigrationError>,
{
    let guard = LockGuard::acquire(store)?;
    match f(guard.store()) {
        Ok(value) => {
            guard.release(commit_on_success)?;
            Ok(value)
        }
        Err(e) => {
            if let Err(unlock_err) = guard.release(false) {
                log::warn!("Releasing migration lock after failure also failed: {}", unlock_err);
            }
            Err(e)
        }
    }
}

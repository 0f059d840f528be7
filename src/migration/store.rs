//! History store capability

use crate::migration::{AppliedMigration, MigrationError};

/// Persists applied-migration records and executes migration content
///
/// `applied_migrations`, `apply_migration` and `clean` must only be called while
/// the lock is held; implementations answer `MigrationError::NotLocked` otherwise.
pub trait HistoryStore {
    /// Idempotently create the history storage
    fn init(&self) -> Result<(), MigrationError>;

    /// Take the exclusive lock
    ///
    /// # Errors
    ///
    /// `MigrationError::AlreadyLocked` when already held, `MigrationError::Lock` when
    /// the lock cannot be obtained.
    fn lock(&self) -> Result<(), MigrationError>;

    /// Commit or roll back pending work and release the lock
    ///
    /// # Errors
    ///
    /// `MigrationError::NotLocked` when the lock is not held.
    fn unlock(&self, commit: bool) -> Result<(), MigrationError>;

    /// Read every applied migration record, in any order
    fn applied_migrations(&self) -> Result<Vec<AppliedMigration>, MigrationError>;

    /// Execute `content` and record `(version, description, checksum)` as one atomic unit
    fn apply_migration(
        &self,
        version: u64,
        description: &str,
        checksum: &str,
        content: &str,
    ) -> Result<(), MigrationError>;

    /// Drop everything the store manages and recreate an empty history
    ///
    /// # Errors
    ///
    /// `MigrationError::UnmanagedReset` when [`HistoryStore::owns_storage`] is false.
    fn clean(&self) -> Result<(), MigrationError>;

    /// Whether the store created and owns its target storage
    fn owns_storage(&self) -> bool;

    /// Human-readable name of the target, used in logs and errors
    fn target(&self) -> String;
}

impl<S: HistoryStore + ?Sized> HistoryStore for Box<S> {
    fn init(&self) -> Result<(), MigrationError> {
        (**self).init()
    }

    fn lock(&self) -> Result<(), MigrationError> {
        (**self).lock()
    }

    fn unlock(&self, commit: bool) -> Result<(), MigrationError> {
        (**self).unlock(commit)
    }

    fn applied_migrations(&self) -> Result<Vec<AppliedMigration>, MigrationError> {
        (**self).applied_migrations()
    }

    fn apply_migration(
        &self,
        version: u64,
        description: &str,
        checksum: &str,
        content: &str,
    ) -> Result<(), MigrationError> {
        (**self).apply_migration(version, description, checksum, content)
    }

    fn clean(&self) -> Result<(), MigrationError> {
        (**self).clean()
    }

    fn owns_storage(&self) -> bool {
        (**self).owns_storage()
    }

    fn target(&self) -> String {
        (**self).target()
    }
}

impl<S: HistoryStore + ?Sized> HistoryStore for &S {
    fn init(&self) -> Result<(), MigrationError> {
        (**self).init()
    }

    fn lock(&self) -> Result<(), MigrationError> {
        (**self).lock()
    }

    fn unlock(&self, commit: bool) -> Result<(), MigrationError> {
        (**self).unlock(commit)
    }

    fn applied_migrations(&self) -> Result<Vec<AppliedMigration>, MigrationError> {
        (**self).applied_migrations()
    }

    fn apply_migration(
        &self,
        version: u64,
        description: &str,
        checksum: &str,
        content: &str,
    ) -> Result<(), MigrationError> {
        (**self).apply_migration(version, description, checksum, content)
    }

    fn clean(&self) -> Result<(), MigrationError> {
        (**self).clean()
    }

    fn owns_storage(&self) -> bool {
        (**self).owns_storage()
    }

    fn target(&self) -> String {
        (**self).target()
    }
}

//! Migration sources

use crate::migration::{LocalMigration, MigrationError};

/// Produces the local migrations to reconcile against the history store
///
/// The returned order does not matter; the reconciler sorts by version.
pub trait MigrationSource {
    /// Load every local migration
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::Load` (or `InvalidFileName` for file-backed sources)
    /// when the migrations cannot be produced.
    fn load(&self) -> Result<Vec<LocalMigration>, MigrationError>;
}

impl<S: MigrationSource + ?Sized> MigrationSource for Box<S> {
    fn load(&self) -> Result<Vec<LocalMigration>, MigrationError> {
        (**self).load()
    }
}

impl<S: MigrationSource + ?Sized> MigrationSource for &S {
    fn load(&self) -> Result<Vec<LocalMigration>, MigrationError> {
        (**self).load()
    }
}

/// In-memory migration source backed by a fixed list
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    migrations: Vec<LocalMigration>,
}

impl StaticSource {
    pub fn new(migrations: Vec<LocalMigration>) -> Self {
        Self { migrations }
    }
}

impl MigrationSource for StaticSource {
    fn load(&self) -> Result<Vec<LocalMigration>, MigrationError> {
        Ok(self.migrations.clone())
    }
}

impl From<Vec<LocalMigration>> for StaticSource {
    fn from(migrations: Vec<LocalMigration>) -> Self {
        Self::new(migrations)
    }
}

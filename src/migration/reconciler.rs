//! Reconciler - Core migration execution engine
//!
//! Loads local migrations, validates them against the applied history and applies the
//! missing suffix in version order, all while holding the history store lock.

use crate::config::MigrationConfig;
use crate::migration::lock::{with_lock, with_read_lock};
use crate::migration::plan::{group_applied, group_local, plan, ApplyPlan};
use crate::migration::{
    checksum_for, AppliedMigration, Checksum, DirectorySource, HistoryStore, LocalMigration,
    MigrationError, MigrationSource, MigrationStatus, PendingMigration, PostgresHistoryStore,
    ReconcileReport, Sha256Checksum,
};
use std::collections::BTreeMap;
use std::time::Instant;

#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;
#[cfg(feature = "metrics")]
use crate::metrics::METRICS;

/// Brings a history store up to date with a migration source
///
/// # Example
///
/// ```
/// use driftguard::migration::{LocalMigration, MemoryHistoryStore, Reconciler, StaticSource};
///
/// let store = MemoryHistoryStore::new();
/// let source = StaticSource::new(vec![
///     LocalMigration::new(1, "create users", "create table users (id int);"),
///     LocalMigration::new(2, "add email", "alter table users add column email text;"),
/// ]);
///
/// let reconciler = Reconciler::new(source, store.clone());
/// let report = reconciler.reconcile()?;
/// assert_eq!(report.applied, vec![1, 2]);
/// assert_eq!(store.records().len(), 2);
/// # Ok::<(), driftguard::migration::MigrationError>(())
/// ```
pub struct Reconciler<S, H> {
    source: S,
    store: H,
    checksum: Box<dyn Checksum>,
}

impl<S: MigrationSource, H: HistoryStore> Reconciler<S, H> {
    /// Reconciler using the default SHA-256 checksum
    pub fn new(source: S, store: H) -> Self {
        Self {
            source,
            store,
            checksum: Box::new(Sha256Checksum),
        }
    }

    /// Start a builder; `build` fails when the source or the store is missing
    pub fn builder() -> ReconcilerBuilder<S, H> {
        ReconcilerBuilder::default()
    }

    /// Replace the checksum function
    pub fn with_checksum(mut self, checksum: impl Checksum + 'static) -> Self {
        self.checksum = Box::new(checksum);
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn store(&self) -> &H {
        &self.store
    }

    /// Apply every local migration that is not yet recorded as applied
    ///
    /// Each migration is applied as its own atomic unit; a failure stops the run and
    /// leaves earlier migrations of the same run applied.
    ///
    /// # Errors
    ///
    /// Load, duplicate-version, lock, consistency, checksum and apply errors, see
    /// [`MigrationError`].
    pub fn reconcile(&self) -> Result<ReconcileReport, MigrationError> {
        let target = self.store.target();
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::reconcile_span(&target).entered();

        log::info!("Migrating {}...", target);
        let result = self.reconcile_locked();
        match &result {
            Ok(report) => log::info!(
                "{} was successfully migrated ({} applied, {} already applied)",
                target,
                report.applied.len(),
                report.already_applied.len()
            ),
            Err(e) => {
                #[cfg(feature = "metrics")]
                METRICS.record_failure();
                log::error!("Migrating {} failed: {}", target, e);
            }
        }
        result
    }

    fn reconcile_locked(&self) -> Result<ReconcileReport, MigrationError> {
        let local = self.load_local()?;

        with_lock(&self.store, |store| {
            let plan = self.validate_locked(store, &local)?;
            let mut report = ReconcileReport {
                already_applied: plan.matched.clone(),
                applied: Vec::with_capacity(plan.pending.len()),
            };

            if plan.is_empty() {
                log::info!("Nothing to do, all {} migrations are applied", plan.matched.len());
                return Ok(report);
            }

            log::info!("Applying {} migrations...", plan.pending.len());
            for (i, version) in plan.pending.iter().enumerate() {
                let migration = local
                    .get(version)
                    .ok_or(MigrationError::MissingLocal { version: *version })?;
                log::info!("Applying migration {}/{}: '{}'...", i + 1, plan.pending.len(), migration);
                self.apply_one(store, migration)?;
                report.applied.push(*version);
            }
            Ok(report)
        })
    }

    fn apply_one(&self, store: &H, migration: &LocalMigration) -> Result<(), MigrationError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::apply_span(migration.version, &migration.description).entered();

        let start = Instant::now();
        let checksum = self.checksum.checksum(&migration.content)?;
        store.apply_migration(
            migration.version,
            &migration.description,
            &checksum,
            &migration.content,
        )?;

        let elapsed = start.elapsed();
        #[cfg(feature = "metrics")]
        METRICS.record_apply(elapsed);
        log::debug!("Applied V{} in {:?}", migration.version, elapsed);
        Ok(())
    }

    /// Drop all applied history and managed objects, then recreate an empty history
    ///
    /// # Errors
    ///
    /// `MigrationError::UnmanagedReset` without touching anything when the store does
    /// not own its storage.
    pub fn reset(&self) -> Result<(), MigrationError> {
        let target = self.store.target();
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::clean_span(&target).entered();

        if !self.store.owns_storage() {
            return Err(MigrationError::UnmanagedReset { target });
        }

        log::info!("Cleaning {}...", target);
        with_lock(&self.store, |store| store.clean())?;
        log::info!("{} cleaned", target);
        Ok(())
    }

    /// Validate and report applied and pending migrations without applying anything
    ///
    /// The history storage is still initialized if it does not exist yet.
    pub fn status(&self) -> Result<MigrationStatus, MigrationError> {
        let local = self.load_local()?;

        with_read_lock(&self.store, |store| {
            store.init()?;
            let applied = group_applied(store.applied_migrations()?)?;
            let plan = plan(&local, &applied, self.checksum.as_ref())?;

            let pending = plan
                .pending
                .iter()
                .filter_map(|version| local.get(version))
                .map(|m| -> Result<PendingMigration, MigrationError> {
                    Ok(PendingMigration {
                        version: m.version,
                        description: m.description.clone(),
                        checksum: self.checksum.checksum(&m.content)?,
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;

            Ok(MigrationStatus {
                target: store.target(),
                applied: applied.into_values().collect::<Vec<AppliedMigration>>(),
                pending,
            })
        })
    }

    /// Run every check of [`Reconciler::reconcile`] without applying anything
    pub fn validate(&self) -> Result<(), MigrationError> {
        self.status().map(|_| ())
    }

    fn load_local(&self) -> Result<BTreeMap<u64, LocalMigration>, MigrationError> {
        let migrations = self.source.load()?;
        log::debug!("Loaded {} local migrations", migrations.len());
        group_local(migrations)
    }

    fn validate_locked(
        &self,
        store: &H,
        local: &BTreeMap<u64, LocalMigration>,
    ) -> Result<ApplyPlan, MigrationError> {
        store.init()?;
        let applied = group_applied(store.applied_migrations()?)?;
        plan(local, &applied, self.checksum.as_ref())
    }
}

impl Reconciler<DirectorySource, PostgresHistoryStore> {
    /// Connect to `config.database_url` and reconcile `config.migrations_dir` against it,
    /// using the configured checksum algorithm
    pub fn from_config(config: &MigrationConfig) -> Result<Self, MigrationError> {
        Self::builder()
            .source(DirectorySource::from_config(config))
            .store(PostgresHistoryStore::connect(config)?)
            .boxed_checksum(checksum_for(config.checksum))
            .build()
    }
}

/// Builder for [`Reconciler`] that reports missing parts as `MigrationError::Initialization`
pub struct ReconcilerBuilder<S, H> {
    source: Option<S>,
    store: Option<H>,
    checksum: Option<Box<dyn Checksum>>,
}

impl<S, H> Default for ReconcilerBuilder<S, H> {
    fn default() -> Self {
        Self {
            source: None,
            store: None,
            checksum: None,
        }
    }
}

impl<S: MigrationSource, H: HistoryStore> ReconcilerBuilder<S, H> {
    pub fn source(mut self, source: S) -> Self {
        self.source = Some(source);
        self
    }

    pub fn store(mut self, store: H) -> Self {
        self.store = Some(store);
        self
    }

    pub fn checksum(mut self, checksum: impl Checksum + 'static) -> Self {
        self.checksum = Some(Box::new(checksum));
        self
    }

    /// Use an already boxed checksum, e.g. one picked by [`checksum_for`]
    pub fn boxed_checksum(mut self, checksum: Box<dyn Checksum>) -> Self {
        self.checksum = Some(checksum);
        self
    }

    pub fn build(self) -> Result<Reconciler<S, H>, MigrationError> {
        let store = self
            .store
            .ok_or_else(|| MigrationError::Initialization("history store is missing".to_string()))?;
        let source = self
            .source
            .ok_or_else(|| MigrationError::Initialization("migration source is missing".to_string()))?;
        Ok(Reconciler {
            source,
            store,
            checksum: self.checksum.unwrap_or_else(|| Box::new(Sha256Checksum)),
        })
    }
}

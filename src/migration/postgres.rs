//! PostgreSQL-backed history store
//!
//! The history lives in `"<schema>"."<history_table>"`. Mutual exclusion between
//! processes uses a session-level advisory lock keyed on the target, acquired under
//! `lock_timeout`. Every migration runs in its own transaction together with its
//! history insert; `clean` opens a transaction that the matching `unlock` commits or
//! rolls back.

use crate::config::MigrationConfig;
use crate::executor::{PgExecutor, SqlExecutor};
use crate::migration::state_table;
use crate::migration::{AppliedMigration, HistoryStore, MigrationError};
use crate::transaction::Transaction;
use sha2::{Digest, Sha256};
use std::sync::Mutex;

#[derive(Debug, Default)]
struct LockState {
    locked: bool,
    /// `clean` left a transaction open that `unlock` must finish
    clean_open: bool,
}

/// History store persisting applied migrations in a PostgreSQL table
pub struct PostgresHistoryStore<E: SqlExecutor = PgExecutor> {
    executor: E,
    schema: String,
    table: String,
    manage_schema: bool,
    lock_key: i64,
    lock_timeout_seconds: u64,
    state: Mutex<LockState>,
}

impl<E: SqlExecutor> PostgresHistoryStore<E> {
    /// Create a store for the schema and history table named in `config`
    ///
    /// # Errors
    ///
    /// `MigrationError::Initialization` when the configured names are not plain identifiers.
    pub fn new(executor: E, config: &MigrationConfig) -> Result<Self, MigrationError> {
        config
            .validate()
            .map_err(|e| MigrationError::Initialization(e.to_string()))?;

        Ok(Self {
            executor,
            schema: config.schema.clone(),
            table: config.history_table.clone(),
            manage_schema: config.manage_schema,
            lock_key: config
                .lock_key
                .unwrap_or_else(|| derive_lock_key(&config.schema, &config.history_table)),
            lock_timeout_seconds: config.lock_timeout_seconds,
            state: Mutex::new(LockState::default()),
        })
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn lock_key(&self) -> i64 {
        self.lock_key
    }

    fn state(&self) -> std::sync::MutexGuard<'_, LockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn ensure_locked(&self) -> Result<(), MigrationError> {
        if self.state().locked {
            Ok(())
        } else {
            Err(MigrationError::NotLocked)
        }
    }

    fn create_storage(&self) -> Result<(), crate::DbError> {
        if self.manage_schema {
            self.executor
                .batch_execute(&state_table::create_schema(&self.schema))?;
        }
        self.executor
            .batch_execute(&state_table::create_history_table(&self.schema, &self.table))
    }
}

impl PostgresHistoryStore<PgExecutor> {
    /// Connect to `config.database_url` and create a store for it
    pub fn connect(config: &MigrationConfig) -> Result<Self, MigrationError> {
        let url = config.database_url.as_deref().ok_or_else(|| {
            MigrationError::Initialization("database_url is not configured".to_string())
        })?;
        let client =
            crate::connect(url).map_err(|e| MigrationError::Initialization(e.to_string()))?;
        Self::new(PgExecutor::new(client), config)
    }
}

impl<E: SqlExecutor> HistoryStore for PostgresHistoryStore<E> {
    fn init(&self) -> Result<(), MigrationError> {
        self.create_storage()
            .map_err(|e| MigrationError::Init(e.to_string()))?;
        log::debug!("History table {} is ready", self.target());
        Ok(())
    }

    fn lock(&self) -> Result<(), MigrationError> {
        let mut state = self.state();
        if state.locked {
            return Err(MigrationError::AlreadyLocked);
        }

        let set_timeout = format!("SET lock_timeout = '{}s'", self.lock_timeout_seconds);
        self.executor
            .batch_execute(&set_timeout)
            .map_err(|e| MigrationError::Lock(e.to_string()))?;

        let acquired = self
            .executor
            .execute("SELECT pg_advisory_lock($1)", &[&self.lock_key]);

        if let Err(e) = self.executor.batch_execute("RESET lock_timeout") {
            log::warn!("Failed to reset lock_timeout: {}", e);
        }

        acquired.map_err(|e| {
            MigrationError::Lock(format!(
                "advisory lock {} on {} not acquired within {} seconds: {}",
                self.lock_key,
                self.target(),
                self.lock_timeout_seconds,
                e
            ))
        })?;

        state.locked = true;
        Ok(())
    }

    fn unlock(&self, commit: bool) -> Result<(), MigrationError> {
        let mut state = self.state();
        if !state.locked {
            return Err(MigrationError::NotLocked);
        }

        let mut first_error = None;
        if state.clean_open {
            let finish = if commit { "COMMIT" } else { "ROLLBACK" };
            if let Err(e) = self.executor.batch_execute(finish) {
                first_error = Some(MigrationError::Unlock(format!("{} failed: {}", finish, e)));
            }
            state.clean_open = false;
        }

        let released = self
            .executor
            .execute("SELECT pg_advisory_unlock($1)", &[&self.lock_key]);
        state.locked = false;

        if let Err(e) = released {
            let err = MigrationError::Unlock(e.to_string());
            match first_error {
                Some(_) => log::warn!("Releasing advisory lock also failed: {}", err),
                None => first_error = Some(err),
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn applied_migrations(&self) -> Result<Vec<AppliedMigration>, MigrationError> {
        self.ensure_locked()?;
        let rows = self
            .executor
            .query_all(&state_table::select_applied(&self.schema, &self.table), &[])
            .map_err(|e| MigrationError::Query(e.to_string()))?;

        rows.iter()
            .map(|row| AppliedMigration::from_row(row).map_err(|e| MigrationError::Query(e.to_string())))
            .collect()
    }

    fn apply_migration(
        &self,
        version: u64,
        description: &str,
        checksum: &str,
        content: &str,
    ) -> Result<(), MigrationError> {
        self.ensure_locked()?;
        let apply_error = |reason: String| MigrationError::Apply {
            version,
            description: description.to_string(),
            reason,
        };

        if self.state().clean_open {
            return Err(apply_error("a reset in this lock scope is not committed yet".to_string()));
        }
        let stored_version = i64::try_from(version)
            .map_err(|_| apply_error(format!("version {} does not fit a bigint", version)))?;

        let tx = Transaction::begin(&self.executor).map_err(|e| apply_error(e.to_string()))?;
        tx.batch_execute(content)
            .map_err(|e| apply_error(e.to_string()))?;
        tx.execute(
            &state_table::insert_applied(&self.schema, &self.table),
            &[&stored_version, &description, &checksum],
        )
        .map_err(|e| apply_error(e.to_string()))?;
        tx.commit().map_err(|e| apply_error(e.to_string()))
    }

    fn clean(&self) -> Result<(), MigrationError> {
        if !self.manage_schema {
            return Err(MigrationError::UnmanagedReset {
                target: self.target(),
            });
        }
        let mut state = self.state();
        if !state.locked {
            return Err(MigrationError::NotLocked);
        }

        if !state.clean_open {
            self.executor
                .batch_execute("BEGIN")
                .map_err(|e| MigrationError::Clean(e.to_string()))?;
            state.clean_open = true;
        }
        drop(state);

        self.executor
            .batch_execute(&state_table::drop_schema(&self.schema))
            .map_err(|e| MigrationError::Clean(e.to_string()))?;
        self.create_storage()
            .map_err(|e| MigrationError::Clean(e.to_string()))?;
        log::info!("Dropped and recreated schema {}", self.schema);
        Ok(())
    }

    fn owns_storage(&self) -> bool {
        self.manage_schema
    }

    fn target(&self) -> String {
        format!("{}.{}", self.schema, self.table)
    }
}

/// Advisory lock key for a target: the first 8 bytes of `sha256("<schema>.<table>")`
pub fn derive_lock_key(schema: &str, table: &str) -> i64 {
    let digest = Sha256::digest(format!("{}.{}", schema, table).as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    i64::from_be_bytes(bytes)
}

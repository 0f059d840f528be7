//! In-process history store
//!
//! Keeps the applied history and the executed scripts in memory. Clones share the same
//! state, so a test can hand one clone to a [`Reconciler`](crate::migration::Reconciler)
//! and inspect the other afterwards.

use crate::migration::{AppliedMigration, HistoryStore, MigrationError};
use std::sync::{Arc, Mutex, MutexGuard};

type FailureHook = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

#[derive(Debug, Default)]
struct MemoryState {
    locked: bool,
    initialized: bool,
    records: Vec<AppliedMigration>,
    executed: Vec<String>,
    /// History as it was before an uncommitted `clean`
    before_clean: Option<(Vec<AppliedMigration>, Vec<String>)>,
    fail_next_unlock: bool,
}

#[derive(Clone)]
pub struct MemoryHistoryStore {
    state: Arc<Mutex<MemoryState>>,
    owns_storage: bool,
    name: String,
    failure: Option<FailureHook>,
}

impl Default for MemoryHistoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryHistoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryHistoryStore")
            .field("name", &self.name)
            .field("owns_storage", &self.owns_storage)
            .finish_non_exhaustive()
    }
}

impl MemoryHistoryStore {
    /// Empty store that owns its storage
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState::default())),
            owns_storage: true,
            name: "memory".to_string(),
            failure: None,
        }
    }

    /// Empty store that refuses `clean`
    pub fn unmanaged() -> Self {
        Self {
            owns_storage: false,
            ..Self::new()
        }
    }

    /// Fail `apply_migration` with the returned reason whenever `hook` yields one
    pub fn with_failure<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.failure = Some(Arc::new(hook));
        self
    }

    /// Append records as if they had been applied earlier, bypassing all checks
    pub fn seed(&self, records: impl IntoIterator<Item = AppliedMigration>) {
        if let Ok(mut state) = self.state.lock() {
            state.initialized = true;
            state.records.extend(records);
        }
    }

    /// Make the next `unlock` release the lock but report a failure
    pub fn fail_next_unlock(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.fail_next_unlock = true;
        }
    }

    /// Committed history, in commit order
    pub fn records(&self) -> Vec<AppliedMigration> {
        self.state.lock().map(|s| s.records.clone()).unwrap_or_default()
    }

    /// Contents executed so far, in execution order
    pub fn executed(&self) -> Vec<String> {
        self.state.lock().map(|s| s.executed.clone()).unwrap_or_default()
    }

    pub fn is_locked(&self) -> bool {
        self.state.lock().map(|s| s.locked).unwrap_or(false)
    }

    pub fn is_initialized(&self) -> bool {
        self.state.lock().map(|s| s.initialized).unwrap_or(false)
    }

    fn state(&self) -> Result<MutexGuard<'_, MemoryState>, MigrationError> {
        self.state
            .lock()
            .map_err(|e| MigrationError::Lock(format!("memory store state poisoned: {e}")))
    }

    fn locked_state(&self) -> Result<MutexGuard<'_, MemoryState>, MigrationError> {
        let state = self.state()?;
        if !state.locked {
            return Err(MigrationError::NotLocked);
        }
        Ok(state)
    }
}

impl HistoryStore for MemoryHistoryStore {
    fn init(&self) -> Result<(), MigrationError> {
        self.state()?.initialized = true;
        Ok(())
    }

    fn lock(&self) -> Result<(), MigrationError> {
        let mut state = self.state()?;
        if state.locked {
            return Err(MigrationError::AlreadyLocked);
        }
        state.locked = true;
        Ok(())
    }

    fn unlock(&self, commit: bool) -> Result<(), MigrationError> {
        let mut state = self.locked_state()?;
        state.locked = false;
        if let Some((records, executed)) = state.before_clean.take() {
            if !commit {
                state.records = records;
                state.executed = executed;
            }
        }
        if std::mem::take(&mut state.fail_next_unlock) {
            return Err(MigrationError::Unlock("injected unlock failure".to_string()));
        }
        Ok(())
    }

    fn applied_migrations(&self) -> Result<Vec<AppliedMigration>, MigrationError> {
        let state = self.locked_state()?;
        if !state.initialized {
            return Err(MigrationError::Query(format!("history of '{}' does not exist", self.name)));
        }
        Ok(state.records.clone())
    }

    fn apply_migration(
        &self,
        version: u64,
        description: &str,
        checksum: &str,
        content: &str,
    ) -> Result<(), MigrationError> {
        let mut state = self.locked_state()?;
        let fail = |reason: String| MigrationError::Apply {
            version,
            description: description.to_string(),
            reason,
        };

        if !state.initialized {
            return Err(fail("history does not exist".to_string()));
        }
        if state.records.iter().any(|r| r.version == version) {
            return Err(fail(format!("duplicate key: version {version} already recorded")));
        }
        if let Some(reason) = self.failure.as_ref().and_then(|hook| hook(content)) {
            return Err(fail(reason));
        }

        state.executed.push(content.to_string());
        state
            .records
            .push(AppliedMigration::new(version, description, checksum));
        Ok(())
    }

    fn clean(&self) -> Result<(), MigrationError> {
        if !self.owns_storage {
            return Err(MigrationError::UnmanagedReset { target: self.target() });
        }
        let mut state = self.locked_state()?;
        if state.before_clean.is_none() {
            let backup = (state.records.clone(), state.executed.clone());
            state.before_clean = Some(backup);
        }
        state.records.clear();
        state.executed.clear();
        state.initialized = true;
        Ok(())
    }

    fn owns_storage(&self) -> bool {
        self.owns_storage
    }

    fn target(&self) -> String {
        self.name.clone()
    }
}

//! Migration status tracking

use crate::migration::AppliedMigration;
use serde::Serialize;

/// Applied and pending migrations as seen by one validated, read-only run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationStatus {
    /// Target of the history store
    pub target: String,

    /// Applied migrations (from the history store), ascending
    pub applied: Vec<AppliedMigration>,

    /// Migrations that the next reconcile would apply, ascending
    pub pending: Vec<PendingMigration>,
}

/// Represents a pending migration (not yet applied)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingMigration {
    pub version: u64,
    pub description: String,
    pub checksum: String,
}

impl MigrationStatus {
    /// Check if all migrations are applied
    #[must_use]
    pub fn is_up_to_date(&self) -> bool {
        self.pending.is_empty()
    }

    /// Get the latest applied migration version
    #[must_use]
    pub fn latest_applied_version(&self) -> Option<u64> {
        self.applied.iter().map(|m| m.version).max()
    }

    /// Get the next pending migration version
    #[must_use]
    pub fn next_pending_version(&self) -> Option<u64> {
        self.pending.first().map(|m| m.version)
    }

    /// Render as pretty JSON for scripting
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Summary of a successful reconcile run
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ReconcileReport {
    /// Versions that were already applied before this run, ascending
    pub already_applied: Vec<u64>,
    /// Versions applied by this run, in apply order
    pub applied: Vec<u64>,
}

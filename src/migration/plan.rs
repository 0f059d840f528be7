//! Local-versus-applied validation and apply planning

use crate::migration::error::VersionOrigin;
use crate::migration::{AppliedMigration, Checksum, LocalMigration, MigrationError};
use std::collections::BTreeMap;

/// Outcome of validating local migrations against the applied history
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ApplyPlan {
    /// Applied versions that matched their local migration, ascending
    pub matched: Vec<u64>,
    /// Versions still to apply, ascending
    pub pending: Vec<u64>,
}

impl ApplyPlan {
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Key migrations by version, rejecting duplicates
pub fn group_local(
    migrations: Vec<LocalMigration>,
) -> Result<BTreeMap<u64, LocalMigration>, MigrationError> {
    group_by_version(migrations, |m| m.version, VersionOrigin::Local)
}

/// Key history records by version, rejecting duplicates
pub fn group_applied(
    records: Vec<AppliedMigration>,
) -> Result<BTreeMap<u64, AppliedMigration>, MigrationError> {
    group_by_version(records, |m| m.version, VersionOrigin::Applied)
}

fn group_by_version<T>(
    items: Vec<T>,
    version_of: impl Fn(&T) -> u64,
    origin: VersionOrigin,
) -> Result<BTreeMap<u64, T>, MigrationError> {
    let mut grouped = BTreeMap::new();
    for item in items {
        let version = version_of(&item);
        if grouped.insert(version, item).is_some() {
            return Err(MigrationError::DuplicateVersion { version, origin });
        }
    }
    Ok(grouped)
}

/// Validate the applied history against local migrations and compute what to apply
///
/// Every applied version must exist locally with the same description and checksum,
/// and the applied versions must be a prefix of the sorted local versions. The plan
/// is the remaining suffix.
pub fn plan(
    local: &BTreeMap<u64, LocalMigration>,
    applied: &BTreeMap<u64, AppliedMigration>,
    checksum: &dyn Checksum,
) -> Result<ApplyPlan, MigrationError> {
    let mut matched = Vec::with_capacity(applied.len());

    for (&version, record) in applied {
        let migration = local
            .get(&version)
            .ok_or(MigrationError::MissingLocal { version })?;

        if migration.description != record.description {
            return Err(MigrationError::DescriptionMismatch {
                version,
                local: migration.description.clone(),
                applied: record.description.clone(),
            });
        }

        let local_checksum = checksum.checksum(&migration.content)?;
        if local_checksum != record.checksum {
            return Err(MigrationError::ChecksumMismatch {
                version,
                local: local_checksum,
                applied: record.checksum.clone(),
            });
        }

        matched.push(version);
    }

    let local_versions: Vec<u64> = local.keys().copied().collect();
    for (&local_version, &applied_version) in local_versions.iter().zip(&matched) {
        if local_version != applied_version {
            return Err(MigrationError::OutOfOrder {
                local: local_version,
                applied: applied_version,
            });
        }
    }

    let pending = local_versions[matched.len()..].to_vec();
    Ok(ApplyPlan { matched, pending })
}

//! `AppliedMigration` - Represents rows of the schema history table

use serde::Serialize;

/// A migration recorded as applied by the history store
///
/// Only the fingerprint of the content is kept, never the content itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedMigration {
    /// Migration version
    pub version: u64,

    /// Description recorded at apply time
    pub description: String,

    /// Checksum of the content recorded at apply time
    pub checksum: String,
}

impl AppliedMigration {
    /// Create a new `AppliedMigration`
    #[must_use]
    pub fn new(version: u64, description: impl Into<String>, checksum: impl Into<String>) -> Self {
        Self {
            version,
            description: description.into(),
            checksum: checksum.into(),
        }
    }

    /// Create an `AppliedMigration` from a history table row
    ///
    /// Expected column order: `version`, `description`, `checksum`
    ///
    /// # Errors
    ///
    /// Returns `DbError::ParseError` if a column has an unexpected type or the
    /// stored version is negative.
    pub fn from_row(row: &may_postgres::Row) -> Result<Self, crate::DbError> {
        let version: i64 = row
            .try_get(0)
            .map_err(|e| crate::DbError::ParseError(format!("version column: {e}")))?;
        let description: String = row
            .try_get(1)
            .map_err(|e| crate::DbError::ParseError(format!("description column: {e}")))?;
        let checksum: String = row
            .try_get(2)
            .map_err(|e| crate::DbError::ParseError(format!("checksum column: {e}")))?;

        let version = u64::try_from(version).map_err(|_| {
            crate::DbError::ParseError(format!("negative migration version in history: {version}"))
        })?;

        Ok(Self {
            version,
            description,
            checksum,
        })
    }
}

//! Local migration definition

use std::fmt;

/// A versioned schema-change script as known to the migration source
///
/// Recreated on every run; `version` is the sole identity within one load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalMigration {
    /// Migration version, totally ordered by integer comparison
    pub version: u64,

    /// Human-readable description, compared verbatim with the history record
    pub description: String,

    /// Script text passed untouched to the history store for execution
    pub content: String,
}

impl LocalMigration {
    /// Create a new `LocalMigration`
    pub fn new(version: u64, description: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            version,
            description: description.into(),
            content: content.into(),
        }
    }
}

impl fmt::Display for LocalMigration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "V{}: {}", self.version, self.description)
    }
}

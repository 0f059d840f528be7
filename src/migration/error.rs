//! Migration-specific error types

use std::fmt;

/// Which collection a duplicate version was found in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionOrigin {
    /// The migration source
    Local,
    /// The history store
    Applied,
}

impl fmt::Display for VersionOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionOrigin::Local => write!(f, "local"),
            VersionOrigin::Applied => write!(f, "applied"),
        }
    }
}

/// Part of a migration file name that failed to parse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileNamePart {
    /// The name does not follow `V<version>__<description>.<ext>` at all
    FileName,
    Version,
    Description,
}

impl fmt::Display for FileNamePart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileNamePart::FileName => write!(f, "invalid filename"),
            FileNamePart::Version => write!(f, "invalid version"),
            FileNamePart::Description => write!(f, "invalid description"),
        }
    }
}

/// Migration-specific errors
#[derive(Debug)]
pub enum MigrationError {
    /// The reconciler was built without a source or a store
    Initialization(String),
    /// The migration source could not produce its migrations
    Load(String),
    /// A file-backed source found a file it could not parse
    InvalidFileName {
        file: String,
        part: FileNamePart,
        detail: Option<String>,
    },
    /// Two migrations of one collection share a version
    DuplicateVersion { version: u64, origin: VersionOrigin },
    /// `lock` was called while the lock was already held
    AlreadyLocked,
    /// `unlock`, or a locked-only operation, was called without the lock
    NotLocked,
    /// The lock could not be obtained
    Lock(String),
    /// The lock could not be released
    Unlock(String),
    /// The history storage could not be initialized
    Init(String),
    /// Applied migrations could not be read
    Query(String),
    /// An applied migration is missing from the migration source
    MissingLocal { version: u64 },
    /// Local and applied description differ
    DescriptionMismatch {
        version: u64,
        local: String,
        applied: String,
    },
    /// Local content no longer hashes to the recorded checksum
    ChecksumMismatch {
        version: u64,
        local: String,
        applied: String,
    },
    /// A local unapplied migration sorts below an applied one
    OutOfOrder { local: u64, applied: u64 },
    /// The checksum function failed
    Checksum(String),
    /// Executing or recording a migration failed
    Apply {
        version: u64,
        description: String,
        reason: String,
    },
    /// Reset was requested on storage the store does not own
    UnmanagedReset { target: String },
    /// The destructive reset itself failed
    Clean(String),
}

impl MigrationError {
    /// Whether this error is one of the local-versus-applied consistency violations
    pub fn is_consistency(&self) -> bool {
        matches!(
            self,
            MigrationError::MissingLocal { .. }
                | MigrationError::DescriptionMismatch { .. }
                | MigrationError::ChecksumMismatch { .. }
                | MigrationError::OutOfOrder { .. }
        )
    }
}

impl fmt::Display for MigrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationError::Initialization(msg) => {
                write!(f, "failed to initialize reconciler: {}", msg)
            }
            MigrationError::Load(msg) => write!(f, "failed to load migrations: {}", msg),
            MigrationError::InvalidFileName { file, part, detail } => match detail {
                Some(detail) => write!(f, "{} in migration file '{}': {}", part, file, detail),
                None => write!(f, "{} in migration file '{}'", part, file),
            },
            MigrationError::DuplicateVersion { version, origin } => {
                write!(f, "encountered duplicate version: {} ({} migrations)", version, origin)
            }
            MigrationError::AlreadyLocked => write!(f, "already locked"),
            MigrationError::NotLocked => write!(f, "not locked"),
            MigrationError::Lock(msg) => write!(f, "failed to acquire migration lock: {}", msg),
            MigrationError::Unlock(msg) => write!(f, "failed to release migration lock: {}", msg),
            MigrationError::Init(msg) => {
                write!(f, "failed to initialize migration history: {}", msg)
            }
            MigrationError::Query(msg) => {
                write!(f, "failed to read applied migrations: {}", msg)
            }
            MigrationError::MissingLocal { version } => {
                write!(f, "applied migration has no local migration: {}", version)
            }
            MigrationError::DescriptionMismatch {
                version,
                local,
                applied,
            } => write!(
                f,
                "local description does not match applied description for version {}: '{}' vs '{}'",
                version, local, applied
            ),
            MigrationError::ChecksumMismatch {
                version,
                local,
                applied,
            } => write!(
                f,
                "local checksum does not match applied checksum for version {}: {} vs {}",
                version, local, applied
            ),
            MigrationError::OutOfOrder { local, applied } => write!(
                f,
                "encountered a local unapplied migration with a lower version than an already applied migration: {} vs {}",
                local, applied
            ),
            MigrationError::Checksum(msg) => write!(f, "failed to compute checksum: {}", msg),
            MigrationError::Apply {
                version,
                description,
                reason,
            } => write!(
                f,
                "failed to apply migration V{}: {}: {}",
                version, description, reason
            ),
            MigrationError::UnmanagedReset { target } => {
                write!(f, "can not clean unmanaged schema: {}", target)
            }
            MigrationError::Clean(msg) => write!(f, "failed to clean: {}", msg),
        }
    }
}

impl std::error::Error for MigrationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consistency_family() {
        assert!(MigrationError::MissingLocal { version: 1 }.is_consistency());
        assert!(MigrationError::OutOfOrder { local: 3, applied: 4 }.is_consistency());
        assert!(MigrationError::ChecksumMismatch {
            version: 1,
            local: "a".into(),
            applied: "b".into(),
        }
        .is_consistency());
        assert!(!MigrationError::AlreadyLocked.is_consistency());
        assert!(!MigrationError::Load("x".into()).is_consistency());
    }

    #[test]
    fn test_messages_name_both_values() {
        let err = MigrationError::DescriptionMismatch {
            version: 7,
            local: "modified".into(),
            applied: "Description".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("local description does not match applied description"));
        assert!(msg.contains("'modified'"));
        assert!(msg.contains("'Description'"));
    }

    #[test]
    fn test_out_of_order_message() {
        let err = MigrationError::OutOfOrder { local: 3, applied: 4 };
        assert_eq!(
            err.to_string(),
            "encountered a local unapplied migration with a lower version than an already applied migration: 3 vs 4"
        );
    }

    #[test]
    fn test_invalid_file_name_message() {
        let err = MigrationError::InvalidFileName {
            file: "VA__x.sql".into(),
            part: FileNamePart::FileName,
            detail: None,
        };
        assert_eq!(err.to_string(), "invalid filename in migration file 'VA__x.sql'");
    }
}

//! Checksum calculation for migration content

use crate::config::ChecksumAlgorithm;
use crate::migration::MigrationError;
use sha2::{Digest, Sha256, Sha512};

/// Fingerprints migration content
///
/// Implementations must be deterministic: the same content always yields the same
/// string, since the value is persisted at apply time and recomputed on every run.
pub trait Checksum: Send + Sync {
    /// Compute the fingerprint of `content`
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::Checksum` only on internal failure of the hasher.
    fn checksum(&self, content: &str) -> Result<String, MigrationError>;
}

impl<F> Checksum for F
where
    F: Fn(&str) -> Result<String, MigrationError> + Send + Sync,
{
    fn checksum(&self, content: &str) -> Result<String, MigrationError> {
        self(content)
    }
}

/// Lowercase hex SHA-256 of the content; the default checksum
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Checksum;

impl Checksum for Sha256Checksum {
    fn checksum(&self, content: &str) -> Result<String, MigrationError> {
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        Ok(format!("{:x}", hasher.finalize()))
    }
}

/// Lowercase hex SHA-512 of the content
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha512Checksum;

impl Checksum for Sha512Checksum {
    fn checksum(&self, content: &str) -> Result<String, MigrationError> {
        let mut hasher = Sha512::new();
        hasher.update(content.as_bytes());
        Ok(format!("{:x}", hasher.finalize()))
    }
}

/// Build the checksum implementation selected in configuration
pub fn checksum_for(algorithm: ChecksumAlgorithm) -> Box<dyn Checksum> {
    match algorithm {
        ChecksumAlgorithm::Sha256 => Box::new(Sha256Checksum),
        ChecksumAlgorithm::Sha512 => Box::new(Sha512Checksum),
    }
}

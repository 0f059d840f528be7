//! # Driftguard
//!
//! Versioned schema-migration reconciler for PostgreSQL on the `may` runtime.
//!
//! Local migrations are checked against the applied history (version, description,
//! checksum, ordering) and the missing suffix is applied under an exclusive lock, one
//! atomic migration at a time. See [`migration`] for the moving parts.

pub mod config;
pub mod connection;
pub mod executor;
pub mod metrics;
pub mod migration;
pub mod transaction;

pub use config::{ChecksumAlgorithm, MigrationConfig};
pub use connection::{connect, validate_connection_string, ConnectionError};
pub use executor::{DbError, PgExecutor, SqlExecutor};
pub use migration::{MigrationError, Reconciler};
pub use transaction::{Transaction, TransactionError};

//! In-process migration on application startup

use crate::config::MigrationConfig;
use crate::migration::{MigrationError, ReconcileReport, Reconciler};

/// Bring the configured database up to date before the application starts serving
///
/// Connects to `config.database_url`, reads migrations from `config.migrations_dir` and
/// reconciles them with the history table. Other instances starting at the same time
/// wait on the advisory lock (up to `lock_timeout_seconds`), then find nothing left to do.
///
/// # Example
///
/// ```rust,no_run
/// use driftguard::{migration::startup_migrations, MigrationConfig};
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = MigrationConfig::load()?;
///     let report = startup_migrations(&config)?;
///     println!("applied {:?}", report.applied);
///     Ok(())
/// }
/// ```
pub fn startup_migrations(config: &MigrationConfig) -> Result<ReconcileReport, MigrationError> {
    let report = Reconciler::from_config(config)?.reconcile()?;
    if report.applied.is_empty() {
        log::debug!("No pending migrations to apply");
    } else {
        log::info!("Applied {} migration(s) on startup", report.applied.len());
    }
    Ok(report)
}

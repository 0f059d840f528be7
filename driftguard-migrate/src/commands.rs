//! Command handlers
//!
//! Every handler returns the text to print so the binary stays a thin dispatcher.

use anyhow::{bail, Result};
use colored::Colorize;
use driftguard::migration::{
    DirectorySource, HistoryStore, MigrationSource, MigrationStatus, ReconcileReport, Reconciler,
};
use std::fmt::Write;

/// Apply pending migrations
pub fn migrate<S: MigrationSource, H: HistoryStore>(reconciler: &Reconciler<S, H>) -> Result<String> {
    let report = reconciler.reconcile()?;
    Ok(render_report(&reconciler.store().target(), &report))
}

/// Show applied and pending migrations, as text or JSON
pub fn status<S: MigrationSource, H: HistoryStore>(
    reconciler: &Reconciler<S, H>,
    json: bool,
) -> Result<String> {
    let status = reconciler.status()?;
    if json {
        return Ok(status.to_json()?);
    }
    Ok(render_status(&status))
}

/// Check local migrations against the applied history without applying anything
pub fn validate<S: MigrationSource, H: HistoryStore>(reconciler: &Reconciler<S, H>) -> Result<String> {
    reconciler.validate()?;
    Ok(format!("{} {} is consistent", "✓".green(), reconciler.store().target()))
}

/// Drop and recreate the managed schema; refuses without `confirmed`
pub fn clean<S: MigrationSource, H: HistoryStore>(
    reconciler: &Reconciler<S, H>,
    confirmed: bool,
) -> Result<String> {
    let target = reconciler.store().target();
    confirm_clean(&target, confirmed)?;
    reconciler.reset()?;
    Ok(format!("{} {} cleaned", "✓".green(), target))
}

/// Refuse a `clean` of `target` that was not confirmed with `--yes`
///
/// Checked before connecting, so an unconfirmed clean never touches the database.
pub fn confirm_clean(target: &str, confirmed: bool) -> Result<()> {
    if !confirmed {
        bail!("refusing to clean {} without --yes", target);
    }
    Ok(())
}

/// Create an empty migration file with the next free version
pub fn new_migration(source: &DirectorySource, description: &str) -> Result<String> {
    let path = source.create_migration_file(description)?;
    Ok(format!("{} Created {}", "✓".green(), path.display()))
}

pub fn render_report(target: &str, report: &ReconcileReport) -> String {
    if report.applied.is_empty() {
        return format!(
            "{} {} is up to date ({} applied)",
            "✓".green(),
            target,
            report.already_applied.len()
        );
    }

    let versions: Vec<String> = report.applied.iter().map(|v| format!("V{}", v)).collect();
    format!(
        "{} Applied {} migration(s) to {}: {}",
        "✓".green(),
        report.applied.len(),
        target,
        versions.join(", ")
    )
}

pub fn render_status(status: &MigrationStatus) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} {}", "Migration status for".bold(), status.target.bold());

    if status.applied.is_empty() {
        let _ = writeln!(out, "\nApplied: none");
    } else {
        let _ = writeln!(out, "\nApplied ({}):", status.applied.len());
        for record in &status.applied {
            let _ = writeln!(out, "  {} V{}: {}", "✓".green(), record.version, record.description);
        }
    }

    if status.pending.is_empty() {
        let _ = writeln!(out, "\nPending: none");
    } else {
        let _ = writeln!(out, "\nPending ({}):", status.pending.len());
        for pending in &status.pending {
            let _ = writeln!(out, "  {} V{}: {}", "…".yellow(), pending.version, pending.description);
        }
    }

    let _ = write!(
        out,
        "\nSummary: {} applied, {} pending",
        status.applied.len(),
        status.pending.len()
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_report_up_to_date() {
        colored::control::set_override(false);
        let report = ReconcileReport {
            already_applied: vec![1, 2],
            applied: vec![],
        };
        assert_eq!(render_report("public.history", &report), "✓ public.history is up to date (2 applied)");
    }

    #[test]
    fn test_render_report_lists_versions() {
        colored::control::set_override(false);
        let report = ReconcileReport {
            already_applied: vec![1],
            applied: vec![2, 4],
        };
        assert_eq!(
            render_report("public.history", &report),
            "✓ Applied 2 migration(s) to public.history: V2, V4"
        );
    }
}

//! Resolve the effective configuration from file, environment and command-line flags

use anyhow::{Context, Result};
use driftguard::MigrationConfig;
use std::path::{Path, PathBuf};

/// Values given on the command line; `None` keeps the configured value
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub database_url: Option<String>,
    pub migrations_dir: Option<PathBuf>,
    pub schema: Option<String>,
    pub history_table: Option<String>,
    pub manage_schema: bool,
}

/// Load the configuration and apply `overrides` on top
///
/// An explicit `config_file` must exist; otherwise `config/driftguard.toml` is optional.
/// When no database URL is configured, `DRIFTGUARD_DATABASE_URL` and then
/// `DATABASE_URL` are consulted.
pub fn resolve(config_file: Option<&Path>, overrides: Overrides) -> Result<MigrationConfig> {
    let mut config = match config_file {
        Some(path) => MigrationConfig::load_from(path, true)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => MigrationConfig::load().context("Failed to load configuration")?,
    };

    apply(&mut config, overrides);
    if config.database_url.is_none() {
        config.database_url = std::env::var("DRIFTGUARD_DATABASE_URL")
            .or_else(|_| std::env::var("DATABASE_URL"))
            .ok();
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn apply(config: &mut MigrationConfig, overrides: Overrides) {
    if let Some(url) = overrides.database_url {
        config.database_url = Some(url);
    }
    if let Some(dir) = overrides.migrations_dir {
        config.migrations_dir = dir;
    }
    if let Some(schema) = overrides.schema {
        config.schema = schema;
    }
    if let Some(table) = overrides.history_table {
        config.history_table = table;
    }
    if overrides.manage_schema {
        config.manage_schema = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_flags_override_file_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("driftguard.toml");
        fs::write(
            &path,
            "[migrations]\nschema = \"app\"\nhistory_table = \"history\"\ndatabase_url = \"postgresql://file\"\n",
        )
        .unwrap();

        let config = resolve(
            Some(&path),
            Overrides {
                schema: Some("tenant".to_string()),
                manage_schema: true,
                ..Overrides::default()
            },
        )
        .unwrap();

        assert_eq!(config.schema, "tenant");
        assert_eq!(config.history_table, "history");
        assert_eq!(config.database_url.as_deref(), Some("postgresql://file"));
        assert!(config.manage_schema);
    }

    #[test]
    fn test_missing_explicit_file_fails() {
        let dir = TempDir::new().unwrap();
        let err = resolve(Some(&dir.path().join("absent.toml")), Overrides::default()).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to load"));
    }

    #[test]
    fn test_invalid_override_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("driftguard.toml");
        fs::write(&path, "[migrations]\n").unwrap();

        let err = resolve(
            Some(&path),
            Overrides {
                history_table: Some("bad name".to_string()),
                ..Overrides::default()
            },
        )
        .unwrap_err();
        assert!(format!("{:#}", err).contains("history_table"));
    }
}

//! Migration configuration
//!
//! [`MigrationConfig`] enumerates everything a reconciliation run needs to know about
//! its target: the schema, whether that schema is owned by us, the history table name
//! and the checksum algorithm. It can be built in code or loaded with
//! [`MigrationConfig::load`] from `config/driftguard.toml` and `DRIFTGUARD__*` env vars.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default configuration file consulted by [`MigrationConfig::load`]
pub const DEFAULT_CONFIG_FILE: &str = "config/driftguard.toml";

/// Checksum algorithm used to fingerprint migration content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumAlgorithm {
    #[default]
    Sha256,
    Sha512,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    /// PostgreSQL connection string; only needed by the PostgreSQL store
    pub database_url: Option<String>,
    /// Directory scanned by the file-backed migration source
    pub migrations_dir: PathBuf,
    /// Extension of migration files, without the dot
    pub extension: String,
    /// Schema holding the history table
    pub schema: String,
    /// Whether the store creates, owns and may drop `schema`
    pub manage_schema: bool,
    /// Name of the applied-migration history table
    pub history_table: String,
    pub checksum: ChecksumAlgorithm,
    /// Advisory lock key; derived from schema and table name when unset
    pub lock_key: Option<i64>,
    /// How long to wait for a lock held by another session; must be at least 1
    pub lock_timeout_seconds: u64,
    /// Characters allowed between the digits of a file version, e.g. `"._"`
    pub version_separators: String,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            migrations_dir: PathBuf::from("migrations"),
            extension: "sql".to_string(),
            schema: "public".to_string(),
            manage_schema: false,
            history_table: "driftguard_schema_history".to_string(),
            checksum: ChecksumAlgorithm::Sha256,
            lock_key: None,
            lock_timeout_seconds: 60,
            version_separators: String::new(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct Settings {
    #[serde(default)]
    migrations: MigrationConfig,
}

impl MigrationConfig {
    /// Load the configuration from `config/driftguard.toml`, overlaid with env vars.
    ///
    /// Environment variables use the `DRIFTGUARD__MIGRATIONS__<FIELD>` form,
    /// e.g. `DRIFTGUARD__MIGRATIONS__SCHEMA=app`.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Path::new(DEFAULT_CONFIG_FILE), false)
    }

    /// Load the configuration from `path`, overlaid with env vars.
    ///
    /// When `required` is false a missing file is not an error.
    pub fn load_from(path: &Path, required: bool) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path).required(required))
            .add_source(
                Environment::with_prefix("DRIFTGUARD")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = settings.try_deserialize().map_err(|e| {
            ConfigError::Message(format!(
                "Migration configuration could not be loaded from {} or environment: {}",
                path.display(),
                e
            ))
        })?;

        settings.migrations.validate()?;
        Ok(settings.migrations)
    }

    /// Reject names that would have to be escaped inside generated SQL
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_identifier("schema", &self.schema)?;
        validate_identifier("history_table", &self.history_table)?;
        if self.extension.is_empty() || self.extension.contains('.') {
            return Err(ConfigError::Message(format!(
                "extension must be a non-empty file extension without dots, got '{}'",
                self.extension
            )));
        }
        // PostgreSQL reads a lock_timeout of 0 as "wait forever"
        if self.lock_timeout_seconds == 0 {
            return Err(ConfigError::Message(
                "lock_timeout_seconds must be at least 1".to_string(),
            ));
        }
        if let Some(c) = self.version_separators.chars().find(char::is_ascii_digit) {
            return Err(ConfigError::Message(format!(
                "version_separators must not contain digits, got '{}'",
                c
            )));
        }
        Ok(())
    }

    /// `schema.history_table`, used in log lines and error messages
    pub fn target(&self) -> String {
        format!("{}.{}", self.schema, self.history_table)
    }
}

fn validate_identifier(field: &str, value: &str) -> Result<(), ConfigError> {
    let mut chars = value.chars();
    let valid_start = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_');
    if !valid_start || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') || value.len() > 63 {
        return Err(ConfigError::Message(format!(
            "{} must be a plain SQL identifier ([A-Za-z_][A-Za-z0-9_]*, at most 63 chars), got '{}'",
            field, value
        )));
    }
    Ok(())
}

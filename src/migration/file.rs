//! Migration file discovery and parsing

use crate::config::MigrationConfig;
use crate::migration::error::FileNamePart;
use crate::migration::{LocalMigration, MigrationError, MigrationSource};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};

/// Migration source reading `V<version>__<description>.<ext>` files from a directory
///
/// Sub-directories and files with another extension are skipped. Any file with the
/// configured extension whose name does not parse fails the whole load.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    dir: PathBuf,
    extension: String,
    separators: String,
}

impl DirectorySource {
    /// Source over `dir` reading `.sql` files with digit-only versions
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            extension: "sql".to_string(),
            separators: String::new(),
        }
    }

    /// Source configured from `migrations_dir`, `extension` and `version_separators`
    pub fn from_config(config: &MigrationConfig) -> Self {
        Self::new(&config.migrations_dir)
            .with_extension(&config.extension)
            .with_version_separators(&config.version_separators)
    }

    pub fn with_extension(mut self, extension: &str) -> Self {
        self.extension = extension.trim_start_matches('.').to_string();
        self
    }

    /// Allow these characters between version digits; they are dropped before parsing,
    /// so `V1.2__x` and `V12__x` both denote version 12.
    pub fn with_version_separators(mut self, separators: &str) -> Self {
        self.separators = separators.to_string();
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Parse a file name into `(version, description)`
    ///
    /// # Example
    /// - `V2__add_email.sql` → version: 2, description: "add_email"
    pub fn parse_file_name(&self, file_name: &str) -> Result<(u64, String), MigrationError> {
        FileNamePattern::new(&self.extension, &self.separators)?.parse(file_name)
    }

    /// Next free version in the directory (`1` when it holds no migrations)
    pub fn next_version(&self) -> Result<u64, MigrationError> {
        let max = self.load()?.iter().map(|m| m.version).max().unwrap_or(0);
        max.checked_add(1)
            .ok_or_else(|| MigrationError::Load(format!("version space exhausted after {}", max)))
    }

    /// Create an empty migration file for `description` with the next free version
    ///
    /// Returns the path of the new file.
    pub fn create_migration_file(&self, description: &str) -> Result<PathBuf, MigrationError> {
        let description = description.trim();
        if description.is_empty() || description.contains(['/', '\\']) {
            return Err(MigrationError::InvalidFileName {
                file: description.to_string(),
                part: FileNamePart::Description,
                detail: Some("description must be non-empty and contain no path separators".to_string()),
            });
        }
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir).map_err(|e| {
                MigrationError::Load(format!("failed to create {}: {}", self.dir.display(), e))
            })?;
        }

        let version = self.next_version()?;
        let path = self
            .dir
            .join(format!("V{}__{}.{}", version, description, self.extension));
        fs::write(&path, format!("-- V{}: {}\n", version, description)).map_err(|e| {
            MigrationError::Load(format!("failed to write {}: {}", path.display(), e))
        })?;
        Ok(path)
    }
}

impl MigrationSource for DirectorySource {
    fn load(&self) -> Result<Vec<LocalMigration>, MigrationError> {
        if !self.dir.is_dir() {
            return Err(MigrationError::Load(format!(
                "migrations directory not found: {}",
                self.dir.display()
            )));
        }

        let pattern = FileNamePattern::new(&self.extension, &self.separators)?;
        let entries = fs::read_dir(&self.dir).map_err(|e| {
            MigrationError::Load(format!(
                "failed to read migrations directory {}: {}",
                self.dir.display(),
                e
            ))
        })?;

        let mut migrations = Vec::new();
        for entry in entries {
            let entry = entry
                .map_err(|e| MigrationError::Load(format!("failed to read directory entry: {}", e)))?;
            let path = entry.path();

            if path.is_dir() || path.extension().and_then(|s| s.to_str()) != Some(self.extension.as_str()) {
                continue;
            }

            let file_name = path
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| MigrationError::InvalidFileName {
                    file: path.display().to_string(),
                    part: FileNamePart::FileName,
                    detail: Some("file name is not valid UTF-8".to_string()),
                })?;

            let (version, description) = pattern.parse(file_name)?;
            let content = fs::read_to_string(&path).map_err(|e| {
                MigrationError::Load(format!("failed to read {}: {}", path.display(), e))
            })?;

            log::debug!("Discovered migration V{} from {}", version, file_name);
            migrations.push(LocalMigration::new(version, description, content));
        }

        migrations.sort_by_key(|m| m.version);
        Ok(migrations)
    }
}

struct FileNamePattern {
    regex: Regex,
    separators: String,
}

impl FileNamePattern {
    fn new(extension: &str, separators: &str) -> Result<Self, MigrationError> {
        let class: String = separators.chars().map(|c| regex::escape(&c.to_string())).collect();
        let pattern = format!(
            r"^V(?P<version>[0-9{}]*?)__(?P<description>.*)\.{}$",
            class,
            regex::escape(extension)
        );
        let regex = Regex::new(&pattern)
            .map_err(|e| MigrationError::Load(format!("invalid file name pattern: {}", e)))?;
        Ok(Self {
            regex,
            separators: separators.to_string(),
        })
    }

    fn parse(&self, file_name: &str) -> Result<(u64, String), MigrationError> {
        let invalid = |part, detail: Option<String>| MigrationError::InvalidFileName {
            file: file_name.to_string(),
            part,
            detail,
        };

        let caps = self
            .regex
            .captures(file_name)
            .ok_or_else(|| invalid(FileNamePart::FileName, None))?;
        let version = caps.name("version").map_or("", |m| m.as_str());
        let description = caps.name("description").map_or("", |m| m.as_str());

        if version.is_empty() {
            return Err(invalid(FileNamePart::Version, None));
        }
        if description.is_empty() {
            return Err(invalid(FileNamePart::Description, None));
        }

        let bounded_by_digits = version.starts_with(|c: char| c.is_ascii_digit())
            && version.ends_with(|c: char| c.is_ascii_digit());
        if !bounded_by_digits {
            return Err(invalid(
                FileNamePart::Version,
                Some(format!("'{}' must start and end with a digit", version)),
            ));
        }

        let digits: String = version.chars().filter(|c| !self.separators.contains(*c)).collect();
        let version = digits
            .parse::<u64>()
            .map_err(|e| invalid(FileNamePart::Version, Some(e.to_string())))?;

        Ok((version, description.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn part_of(err: MigrationError) -> FileNamePart {
        match err {
            MigrationError::InvalidFileName { part, .. } => part,
            other => panic!("Expected InvalidFileName, got {other}"),
        }
    }

    #[test]
    fn test_parse_valid_names() {
        let source = DirectorySource::new(".");
        assert_eq!(
            source.parse_file_name("V2__this_is_version_2.sql").unwrap(),
            (2, "this_is_version_2".to_string())
        );
        assert_eq!(
            source.parse_file_name("V10__double__underscore.sql").unwrap(),
            (10, "double__underscore".to_string())
        );
        assert_eq!(
            source.parse_file_name("V007__leading_zeros.sql").unwrap(),
            (7, "leading_zeros".to_string())
        );
    }

    #[test]
    fn test_parse_with_separators() {
        let source = DirectorySource::new(".").with_version_separators("._");
        assert_eq!(
            source.parse_file_name("V2_1__this__is__version_2_1.sql").unwrap(),
            (21, "this__is__version_2_1".to_string())
        );
        assert_eq!(
            source.parse_file_name("V11.222.3333__long_version.sql").unwrap(),
            (112223333, "long_version".to_string())
        );
        assert_eq!(part_of(source.parse_file_name("V_2_1__x.sql").unwrap_err()), FileNamePart::Version);
    }

    #[test]
    fn test_parse_invalid_names() {
        let source = DirectorySource::new(".");
        assert_eq!(part_of(source.parse_file_name("VA__x.sql").unwrap_err()), FileNamePart::FileName);
        assert_eq!(part_of(source.parse_file_name("V2_1__x.sql").unwrap_err()), FileNamePart::FileName);
        assert_eq!(part_of(source.parse_file_name("2__x.sql").unwrap_err()), FileNamePart::FileName);
        assert_eq!(part_of(source.parse_file_name("V2_x.sql").unwrap_err()), FileNamePart::FileName);
        assert_eq!(part_of(source.parse_file_name("V__x.sql").unwrap_err()), FileNamePart::Version);
        assert_eq!(part_of(source.parse_file_name("V3__.sql").unwrap_err()), FileNamePart::Description);
        assert_eq!(
            part_of(source.parse_file_name("V99999999999999999999999__huge.sql").unwrap_err()),
            FileNamePart::Version
        );
    }

    #[test]
    fn test_load_skips_other_files_and_dirs() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("V2__second.sql"), "select 2;").unwrap();
        fs::write(dir.path().join("V1__first.sql"), "select 1;").unwrap();
        fs::write(dir.path().join("README.md"), "docs").unwrap();
        fs::create_dir(dir.path().join("V3__not_a_file.sql")).unwrap();

        let migrations = DirectorySource::new(dir.path()).load().unwrap();
        assert_eq!(
            migrations,
            vec![
                LocalMigration::new(1, "first", "select 1;"),
                LocalMigration::new(2, "second", "select 2;"),
            ]
        );
    }

    #[test]
    fn test_load_fails_on_bad_name() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("V1__first.sql"), "select 1;").unwrap();
        fs::write(dir.path().join("oops.sql"), "select 2;").unwrap();

        let err = DirectorySource::new(dir.path()).load().unwrap_err();
        assert!(err.to_string().contains("oops.sql"));
    }

    #[test]
    fn test_load_missing_directory() {
        let err = DirectorySource::new("/nonexistent/driftguard/migrations").load().unwrap_err();
        assert!(matches!(err, MigrationError::Load(_)));
    }

    #[test]
    fn test_custom_extension() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("V1__first.pgsql"), "select 1;").unwrap();
        fs::write(dir.path().join("V2__second.sql"), "select 2;").unwrap();

        let migrations = DirectorySource::new(dir.path()).with_extension(".pgsql").load().unwrap();
        assert_eq!(migrations.len(), 1);
        assert_eq!(migrations[0].version, 1);
    }

    #[test]
    fn test_create_migration_file_uses_next_version() {
        let dir = TempDir::new().unwrap();
        let source = DirectorySource::new(dir.path().join("migrations"));

        let first = source.create_migration_file("create_users").unwrap();
        assert!(first.ends_with("V1__create_users.sql"));
        fs::write(source.dir().join("V41__jump.sql"), "").unwrap();
        let next = source.create_migration_file("add_email").unwrap();
        assert!(next.ends_with("V42__add_email.sql"));

        assert!(source.create_migration_file("  ").is_err());
        assert!(source.create_migration_file("a/b").is_err());
    }
}

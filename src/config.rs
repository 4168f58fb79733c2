//! Resolved configuration of a backup or restore job.
//!
//! The configuration is read once from a TOML file and then handed to the
//! [Orchestrator](crate::orchestrator::Orchestrator) as an immutable [JobConfig].

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use derive_more::{Display, Error};

use crate::util::filename::{self, DEFAULT_TEMPLATE};

/// Configuration of all backup and restore steps.
#[derive(Clone, Debug, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct JobConfig {
    /// Directory receiving the artifacts.
    pub backup_directory: PathBuf,

    /// File name of a new dump. Supports the tokens `{db}` and `{date}`.
    pub filename_template: String,

    /// Binary producing the dump, e.g. `mysqldump`.
    pub dump_tool_path: PathBuf,

    /// Binary loading a dump, e.g. `mysql`.
    pub load_tool_path: PathBuf,

    /// Parent of the temporary extraction directory of a restore.
    ///
    /// Defaults to the temporary directory of the OS.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restore_temp_directory: Option<PathBuf>,

    /// Log one line per completed step.
    pub logging: bool,

    pub database: DatabaseConfig,
    pub compression: CompressionConfig,
    pub retention: RetentionConfig,
    pub notification: NotificationConfig,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            backup_directory: PathBuf::from("db_backups"),
            filename_template: DEFAULT_TEMPLATE.to_string(),
            dump_tool_path: PathBuf::from("mysqldump"),
            load_tool_path: PathBuf::from("mysql"),
            restore_temp_directory: None,
            logging: true,
            database: DatabaseConfig::default(),
            compression: CompressionConfig::default(),
            retention: RetentionConfig::default(),
            notification: NotificationConfig::default(),
        }
    }
}

/// Connection parameters of the target database.
#[derive(Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 3306,
            user: "root".into(),
            password: String::new(),
            name: "app".into(),
        }
    }
}

// never print the password
impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("name", &self.name)
            .finish()
    }
}

/// Compression applied to a fresh dump.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionType {
    /// Gzip-compressed tar archive.
    #[default]
    #[serde(alias = "zip", alias = "tar.gz")]
    Archive,
    /// Keep the raw dump.
    None,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct CompressionConfig {
    pub enabled: bool,
    #[serde(rename = "type")]
    pub kind: CompressionType,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            kind: CompressionType::Archive,
        }
    }
}

/// Configure retention of artifacts.
#[derive(Copy, Clone, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct RetentionConfig {
    pub enabled: bool,

    /// Defines how many of the newest artifacts to keep.
    ///
    /// `0` disables pruning.
    pub keep_last: usize,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            keep_last: 10,
        }
    }
}

/// Mail notification carrying the artifact as attachment.
#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub enabled: bool,
    pub recipient: String,
    pub subject: String,
    pub body: String,

    /// `mail(1)` compatible binary.
    pub mail_tool_path: PathBuf,

    /// Flag of [`mail_tool_path`](Self::mail_tool_path) introducing an attachment.
    pub attach_flag: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            recipient: "admin@example.com".into(),
            subject: "Database Backup".into(),
            body: "Your scheduled database backup is attached.".into(),
            mail_tool_path: PathBuf::from("mail"),
            attach_flag: "-a".into(),
        }
    }
}

/// The configuration can't be used for a job.
#[derive(Debug, Display, Error)]
#[display("Invalid configuration: {_0}")]
pub struct ConfigInvalid(#[error(ignore)] pub String);

impl JobConfig {
    /// Checks the values a backup relies on before anything is touched.
    pub fn validate(&self) -> Result<(), ConfigInvalid> {
        self.validate_for_restore()?;
        if !self.filename_template.contains("{date}") {
            return Err(ConfigInvalid(format!(
                "filename template '{}' lacks the {{date}} token",
                self.filename_template
            )));
        }
        if self.filename_template.contains(['/', '\\']) {
            return Err(ConfigInvalid(format!(
                "filename template '{}' must not contain path separators",
                self.filename_template
            )));
        }
        // restore expects `<name>.sql` inside `<name>.tar.gz`
        if !self.filename_template.ends_with(".sql") {
            return Err(ConfigInvalid(format!(
                "filename template '{}' must end in .sql",
                self.filename_template
            )));
        }

        Ok(())
    }

    /// Checks only the values a restore relies on.
    pub fn validate_for_restore(&self) -> Result<(), ConfigInvalid> {
        if self.backup_directory.as_os_str().is_empty() {
            return Err(ConfigInvalid("backup directory is empty".into()));
        }
        if !filename::is_plain_component(&self.database.name) {
            return Err(ConfigInvalid(format!(
                "database name '{}' is not usable in a file name",
                self.database.name
            )));
        }

        Ok(())
    }
}

/// Errors on reading or initializing the configuration file.
#[derive(Debug, Display, Error)]
pub enum ConfigError {
    #[display("Reading config {} failed: {source}", path.display())]
    Read {
        path: PathBuf,
        source: io::Error,
    },
    #[display("Parsing config {} failed: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[display("Serializing default config failed: {_0}")]
    Serialize(toml::ser::Error),
}

impl JobConfig {
    /// Reads the configuration at `path`.
    ///
    /// A missing file is initialized with the [default](JobConfig::default) configuration.
    pub fn load_or_init(path: &Path) -> Result<Self, ConfigError> {
        match fs::read_to_string(path) {
            Ok(config_str) => toml::from_str(&config_str).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::debug!(
                    "Writing default config to {} because it doesn't exist yet",
                    path.display()
                );
                let default_config = JobConfig::default();
                let config_str =
                    toml::to_string_pretty(&default_config).map_err(ConfigError::Serialize)?;
                if let Err(e) = fs::write(path, config_str) {
                    log::warn!("Writing default config to {} failed {e}", path.display());
                }

                Ok(default_config)
            }
            Err(source) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_partial_config() {
        let cfg: JobConfig = toml::from_str(
            r#"
            backup_directory = "/srv/backups"

            [database]
            name = "shop"
            password = "s3cret"

            [compression]
            type = "zip"

            [retention]
            keep_last = 3
            "#,
        )
        .unwrap();

        assert_eq!(cfg.backup_directory, PathBuf::from("/srv/backups"));
        assert_eq!(cfg.database.name, "shop");
        assert_eq!(cfg.database.port, 3306);
        assert_eq!(cfg.compression.kind, CompressionType::Archive);
        assert!(cfg.compression.enabled);
        assert!(cfg.retention.enabled);
        assert_eq!(cfg.retention.keep_last, 3);
        assert!(!cfg.notification.enabled);
    }

    #[test]
    fn compression_none() {
        let cfg: JobConfig = toml::from_str("[compression]\ntype = \"none\"\n").unwrap();
        assert_eq!(cfg.compression.kind, CompressionType::None);
    }

    #[test]
    fn debug_redacts_password() {
        let db = DatabaseConfig {
            password: "hunter2".into(),
            ..Default::default()
        };
        let debug = format!("{db:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn default_config_is_valid() {
        JobConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_unusable_values() {
        let mut cfg = JobConfig::default();
        cfg.database.name = "../etc".into();
        assert!(cfg.validate().is_err());

        let mut cfg = JobConfig::default();
        cfg.backup_directory = PathBuf::new();
        assert!(cfg.validate().is_err());

        let mut cfg = JobConfig::default();
        cfg.filename_template = "backup_{db}.sql".into();
        assert!(cfg.validate().is_err());

        let mut cfg = JobConfig::default();
        cfg.filename_template = "sub/{date}.sql".into();
        assert!(cfg.validate().is_err());

        let mut cfg = JobConfig::default();
        cfg.filename_template = "{db}_{date}".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn restore_ignores_filename_template() {
        let mut cfg = JobConfig::default();
        cfg.filename_template = "{db}_{date}".into();
        cfg.validate_for_restore().unwrap();

        cfg.database.name = "../etc".into();
        assert!(cfg.validate_for_restore().is_err());
    }

    #[test]
    fn missing_file_is_initialized() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db_backup.toml");

        let cfg = JobConfig::load_or_init(&path).unwrap();
        assert_eq!(cfg, JobConfig::default());
        assert!(path.exists());

        let reread = JobConfig::load_or_init(&path).unwrap();
        assert_eq!(reread, cfg);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db_backup.toml");
        fs::write(&path, "backup_directory = [").unwrap();

        assert!(matches!(
            JobConfig::load_or_init(&path),
            Err(ConfigError::Parse { .. })
        ));
    }
}

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};
use log::LevelFilter;

use crate::orchestrator::{BackupRequest, RestoreRequest};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Verbosity of the command output.
    #[arg(long, global = true)]
    pub verbose: Option<LevelFilter>,

    /// Configuration file. Created with default values if missing.
    #[arg(long, short = 'c', default_value = "db_backup.toml")]
    pub config: PathBuf,

    /// Overrides the database password of the configuration file.
    #[arg(long, env = "DB_BACKUP_PASSWORD", hide_env_values = true)]
    pub db_password: Option<String>,

    /// Print the result as JSON.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub action: Action,
}

#[derive(Subcommand, Debug)]
pub enum Action {
    /// Dump the database into the backup directory.
    Backup(BackupArgs),
    /// Load an artifact into the database.
    Restore(RestoreArgs),
    /// List the artifacts of the backup directory, newest first.
    List,
}

#[derive(Args, Debug)]
pub struct BackupArgs {
    /// Keep the raw dump instead of compressing it.
    #[arg(long = "no-compress", alias = "no-zip", action = ArgAction::SetFalse)]
    pub compress: bool,

    /// Skip sending the backup by mail.
    #[arg(long = "no-notify", alias = "no-email", action = ArgAction::SetFalse)]
    pub notify: bool,

    /// Skip deleting old backups.
    #[arg(long = "no-prune", alias = "no-clean", action = ArgAction::SetFalse)]
    pub prune: bool,
}

impl From<BackupArgs> for BackupRequest {
    fn from(args: BackupArgs) -> Self {
        Self {
            compress: args.compress,
            notify: args.notify,
            prune: args.prune,
        }
    }
}

#[derive(Args, Debug)]
pub struct RestoreArgs {
    /// Artifact to restore. A bare file name is looked up in the backup directory.
    pub source: PathBuf,
}

impl From<RestoreArgs> for RestoreRequest {
    fn from(args: RestoreArgs) -> Self {
        Self {
            source_artifact: args.source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backup_flags_default_to_enabled() {
        let cli = Cli::try_parse_from(["db_backup", "backup"]).unwrap();
        let Action::Backup(args) = cli.action else {
            panic!("expected backup action");
        };
        assert_eq!(BackupRequest::from(args), BackupRequest::default());
    }

    #[test]
    fn backup_flags_suppress_steps() {
        let cli =
            Cli::try_parse_from(["db_backup", "backup", "--no-compress", "--no-clean"]).unwrap();
        let Action::Backup(args) = cli.action else {
            panic!("expected backup action");
        };
        assert_eq!(
            BackupRequest::from(args),
            BackupRequest {
                compress: false,
                notify: true,
                prune: false,
            }
        );
    }

    #[test]
    fn restore_takes_source() {
        let cli = Cli::try_parse_from([
            "db_backup",
            "--config",
            "/etc/db_backup.toml",
            "restore",
            "backup_app_2024_01_01_000000.sql.tar.gz",
        ])
        .unwrap();
        assert_eq!(cli.config, PathBuf::from("/etc/db_backup.toml"));
        let Action::Restore(args) = cli.action else {
            panic!("expected restore action");
        };
        assert_eq!(
            RestoreRequest::from(args).source_artifact,
            PathBuf::from("backup_app_2024_01_01_000000.sql.tar.gz")
        );
    }

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}

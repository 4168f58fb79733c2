//! External capabilities driven by the [Orchestrator](crate::orchestrator::Orchestrator).
//!
//! Currently the following backends are implemented:
//!
//! - [MySqlClient]: Dump and load through the `mysqldump` and `mysql` client binaries.
//! - [MailCommand]: Notification through a `mail(1)` compatible binary.

pub mod mail;
pub mod mysql;

pub use mail::MailCommand;
pub use mysql::MySqlClient;

use std::io;
use std::path::Path;
use std::process::ExitStatus;

use derive_more::{Display, Error};

use crate::config::{DatabaseConfig, NotificationConfig};

/// Result of a finished external process.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code, [None] if the process was terminated by a signal.
    pub exit_code: Option<i32>,
    /// Captured standard error.
    pub stderr: String,
}

impl ProcessOutput {
    pub fn new(status: ExitStatus, stderr: &[u8]) -> Self {
        Self {
            exit_code: status.code(),
            stderr: String::from_utf8_lossy(stderr).trim_end().to_string(),
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Produces a full logical dump of a database.
pub trait DumpExecutor {
    /// Dumps the database described by `db` into the new file `dest`.
    ///
    /// An [io::Error] means the dump could not be started at all, e.g. a
    /// missing binary or an already existing `dest`. A non-zero exit code
    /// is reported through [ProcessOutput] and classified by the caller.
    fn dump(&self, db: &DatabaseConfig, dest: &Path) -> io::Result<ProcessOutput>;
}

/// Applies a file of SQL statements to a database.
pub trait LoadExecutor {
    /// Loads `source` into the database described by `db`.
    fn load(&self, db: &DatabaseConfig, source: &Path) -> io::Result<ProcessOutput>;
}

/// Errors on sending a notification.
#[derive(Debug, Display, Error)]
pub enum NotifyError {
    /// The mail transport could not be started.
    #[display("Mail transport could not be run: {_0}")]
    NotRun(io::Error),
    /// The mail transport reported a failure.
    #[display("Mail transport failed with exit code {exit_code:?}: {stderr}")]
    Failed {
        exit_code: Option<i32>,
        #[error(ignore)]
        stderr: String,
    },
}

/// Delivers an artifact to an operator.
pub trait Notifier {
    /// Sends `attachment` to the configured recipient.
    fn send(&self, notification: &NotificationConfig, attachment: &Path) -> Result<(), NotifyError>;
}

impl<T: DumpExecutor + ?Sized> DumpExecutor for &T {
    fn dump(&self, db: &DatabaseConfig, dest: &Path) -> io::Result<ProcessOutput> {
        (**self).dump(db, dest)
    }
}

impl<T: LoadExecutor + ?Sized> LoadExecutor for &T {
    fn load(&self, db: &DatabaseConfig, source: &Path) -> io::Result<ProcessOutput> {
        (**self).load(db, source)
    }
}

impl<T: Notifier + ?Sized> Notifier for &T {
    fn send(
        &self,
        notification: &NotificationConfig,
        attachment: &Path,
    ) -> Result<(), NotifyError> {
        (**self).send(notification, attachment)
    }
}

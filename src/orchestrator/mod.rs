//! Sequencing of backup and restore jobs.
//!
//! A job runs its steps strictly in order and returns a single [JobResult].
//! Fatal failures abort the job and end up in [Outcome::Failed], non-fatal
//! ones are recorded as [Note]s and never change the outcome.
//!
//! The engine does not lock the backup directory: concurrent jobs on the same
//! directory must be serialized by the caller, otherwise the retention pass of
//! one job may count or delete an artifact another job is still writing.

mod backup;
mod restore;

use std::io;
use std::path::{Path, PathBuf};

use derive_more::{Display, Error, From};

use crate::archive::{ArchiveError, ArchiveManager};
use crate::backends::{DumpExecutor, LoadExecutor, Notifier};
use crate::config::{ConfigInvalid, JobConfig};

/// Options of a single backup invocation.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BackupRequest {
    /// Compress the dump, if compression is configured.
    pub compress: bool,
    /// Send the artifact, if notification is configured.
    pub notify: bool,
    /// Prune old artifacts, if retention is configured.
    pub prune: bool,
}

impl Default for BackupRequest {
    fn default() -> Self {
        Self {
            compress: true,
            notify: true,
            prune: true,
        }
    }
}

/// Options of a single restore invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RestoreRequest {
    /// Artifact to restore. Relative paths are resolved against the backup directory.
    pub source_artifact: PathBuf,
}

/// Steps of the backup and restore workflows.
#[derive(Copy, Clone, Debug, Display, PartialEq, Eq)]
pub enum Step {
    #[display("init")]
    Init,
    #[display("dump")]
    Dump,
    #[display("compress")]
    Compress,
    #[display("notify")]
    Notify,
    #[display("prune")]
    Prune,
    #[display("locate")]
    Locate,
    #[display("extract")]
    Extract,
    #[display("load")]
    Load,
    #[display("cleanup")]
    Cleanup,
}

/// Fatal errors aborting a job.
#[derive(Debug, Display, Error, From)]
pub enum JobError {
    #[from]
    ConfigInvalid(ConfigInvalid),
    /// The backup directory can't be created.
    #[display("Backup directory {} is unusable: {source}", path.display())]
    BackupDirectory {
        path: PathBuf,
        source: io::Error,
    },
    /// An artifact of the same name already exists.
    #[display("Artifact {} already exists", _0.display())]
    ArtifactExists(#[error(ignore)] PathBuf),
    /// The dump process could not be started.
    #[display("Dump could not be run: {_0}")]
    DumpNotRun(io::Error),
    #[display("Dump failed with exit code {exit_code:?}: {stderr}")]
    DumpFailed {
        exit_code: Option<i32>,
        #[error(ignore)]
        stderr: String,
    },
    #[display("Artifact not found: {}", _0.display())]
    ArtifactNotFound(#[error(ignore)] PathBuf),
    /// The temporary extraction directory can't be created.
    #[display("Temporary extraction directory could not be created: {_0}")]
    TempDirFailed(io::Error),
    #[from]
    Archive(ArchiveError),
    /// The archive lacks the expected dump.
    #[display("Archive {} does not contain {expected}", archive.display())]
    MalformedArchive {
        #[error(ignore)]
        archive: PathBuf,
        #[error(ignore)]
        expected: String,
    },
    /// The load process could not be started.
    #[display("Restore could not be run: {_0}")]
    LoadNotRun(io::Error),
    #[display("Restore failed with exit code {exit_code:?}: {stderr}")]
    RestoreFailed {
        exit_code: Option<i32>,
        #[error(ignore)]
        stderr: String,
    },
}

/// A non-fatal event of a job.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Note {
    pub step: Step,
    pub level: log::Level,
    pub message: String,
}

/// Terminal state of a job.
#[derive(Debug)]
pub enum Outcome {
    /// The backup finished with the given artifact.
    BackedUp { artifact: PathBuf },
    /// The database was restored from the given artifact.
    Restored { from: PathBuf },
    Failed(JobError),
}

/// Result of a backup or restore job.
#[derive(Debug)]
pub struct JobResult {
    pub outcome: Outcome,
    pub notes: Vec<Note>,
}

impl JobResult {
    pub fn succeeded(&self) -> bool {
        !matches!(self.outcome, Outcome::Failed(_))
    }

    /// Final artifact of a backup or source artifact of a restore.
    pub fn artifact(&self) -> Option<&Path> {
        match &self.outcome {
            Outcome::BackedUp { artifact } => Some(artifact),
            Outcome::Restored { from } => Some(from),
            Outcome::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&JobError> {
        match &self.outcome {
            Outcome::Failed(e) => Some(e),
            _ => None,
        }
    }

    /// Notes with level [Warn](log::Level::Warn).
    pub fn warnings(&self) -> impl Iterator<Item = &Note> {
        self.notes.iter().filter(|n| n.level == log::Level::Warn)
    }
}

/// Collects the [Note]s of a running job and mirrors them to the log.
struct JobLog {
    target: &'static str,
    logging: bool,
    notes: Vec<Note>,
}

impl JobLog {
    fn new(target: &'static str, logging: bool) -> Self {
        Self {
            target,
            logging,
            notes: Vec::new(),
        }
    }

    /// Records a completed step.
    fn step(&mut self, step: Step, message: String) {
        if self.logging {
            log::info!(target: self.target, "{message}");
        }
        self.notes.push(Note {
            step,
            level: log::Level::Info,
            message,
        });
    }

    /// Records a non-fatal failure.
    fn warn(&mut self, step: Step, message: String) {
        log::warn!(target: self.target, "{step}: {message}");
        self.notes.push(Note {
            step,
            level: log::Level::Warn,
            message,
        });
    }

    fn finish(self, result: Result<Outcome, JobError>) -> JobResult {
        let outcome = result.unwrap_or_else(|e| {
            log::error!(target: self.target, "{e}");
            Outcome::Failed(e)
        });

        JobResult {
            outcome,
            notes: self.notes,
        }
    }
}

/// Runs backup and restore jobs against one [JobConfig].
///
/// The external dump, load and mail capabilities are injected, so the
/// sequencing does not depend on real processes.
pub struct Orchestrator<'a, D, L, N> {
    config: &'a JobConfig,
    dumper: D,
    loader: L,
    notifier: N,
    archiver: ArchiveManager,
}

impl<'a, D, L, N> Orchestrator<'a, D, L, N>
where
    D: DumpExecutor,
    L: LoadExecutor,
    N: Notifier,
{
    pub fn new(config: &'a JobConfig, dumper: D, loader: L, notifier: N) -> Self {
        Self {
            config,
            dumper,
            loader,
            notifier,
            archiver: ArchiveManager::default(),
        }
    }

    /// Replaces the default [ArchiveManager].
    pub fn with_archiver(mut self, archiver: ArchiveManager) -> Self {
        self.archiver = archiver;
        self
    }

    pub fn config(&self) -> &JobConfig {
        self.config
    }
}

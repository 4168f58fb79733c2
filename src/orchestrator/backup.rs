use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};

use super::{BackupRequest, JobError, JobLog, JobResult, Orchestrator, Outcome, Step};
use crate::archive;
use crate::backends::{DumpExecutor, LoadExecutor, Notifier};
use crate::config::CompressionType;
use crate::util::filename;
use crate::util::retention::Retention;

const TARGET: &str = "orchestrator::backup";

impl<D, L, N> Orchestrator<'_, D, L, N>
where
    D: DumpExecutor,
    L: LoadExecutor,
    N: Notifier,
{
    /// Dumps the database and runs the optional compress, notify and prune steps.
    pub fn run_backup(&self, request: BackupRequest) -> JobResult {
        self.run_backup_at(request, Local::now().naive_local())
    }

    /// Like [run_backup](Self::run_backup) with `now` used for the `{date}` token.
    pub fn run_backup_at(&self, request: BackupRequest, now: NaiveDateTime) -> JobResult {
        let mut notes = JobLog::new(TARGET, self.config.logging);
        let result = self
            .backup(request, now, &mut notes)
            .map(|artifact| Outcome::BackedUp { artifact });
        notes.finish(result)
    }

    /// Path of the raw dump a backup started at `now` writes to.
    pub fn dump_path(&self, now: NaiveDateTime) -> PathBuf {
        let file_name = filename::render(
            &self.config.filename_template,
            &self.config.database.name,
            now,
        );
        self.config.backup_directory.join(file_name)
    }

    fn backup(
        &self,
        request: BackupRequest,
        now: NaiveDateTime,
        notes: &mut JobLog,
    ) -> Result<PathBuf, JobError> {
        let cfg = self.config;

        // init
        cfg.validate()?;
        let backup_dir = &cfg.backup_directory;
        if !backup_dir.is_dir() {
            fs::create_dir_all(backup_dir).map_err(|source| JobError::BackupDirectory {
                path: backup_dir.clone(),
                source,
            })?;
            notes.step(
                Step::Init,
                format!("Created backup directory {}", backup_dir.display()),
            );
        }

        let raw_path = self.dump_path(now);
        let archive_path = archive::archive_path(&raw_path);
        if let Some(existing) = [&raw_path, &archive_path].into_iter().find(|p| p.exists()) {
            return Err(JobError::ArtifactExists(existing.clone()));
        }

        // dumping
        log::debug!(target: TARGET, "Create database dump of: {}", cfg.database.name);
        log::debug!(target: TARGET, "Save database dump at: {}", raw_path.display());

        let output = self
            .dumper
            .dump(&cfg.database, &raw_path)
            .map_err(JobError::DumpNotRun)?;
        if !output.stderr.is_empty() {
            log::warn!(target: TARGET, "{}", output.stderr);
        }
        if !output.success() {
            discard_partial_dump(&raw_path);
            return Err(JobError::DumpFailed {
                exit_code: output.exit_code,
                stderr: output.stderr,
            });
        }

        match fs::metadata(&raw_path) {
            Ok(meta) if meta.len() == 0 => {
                notes.warn(Step::Dump, format!("Dump {} is empty", raw_path.display()))
            }
            Ok(_) => {}
            Err(e) => notes.warn(
                Step::Dump,
                format!("Dump {} can't be inspected: {e}", raw_path.display()),
            ),
        }
        notes.step(Step::Dump, format!("DB backup created: {}", raw_path.display()));

        let mut artifact = raw_path;

        // compressing
        let compression = cfg.compression;
        if request.compress && compression.enabled && compression.kind == CompressionType::Archive
        {
            artifact = self.compress(artifact, notes);
        }

        // notifying
        if request.notify && cfg.notification.enabled {
            match self.notifier.send(&cfg.notification, &artifact) {
                Ok(()) => notes.step(
                    Step::Notify,
                    format!("DB backup emailed to: {}", cfg.notification.recipient),
                ),
                Err(e) => notes.warn(Step::Notify, e.to_string()),
            }
        }

        // pruning
        if request.prune && cfg.retention.enabled {
            if let Some(retention) = Retention::new(cfg.retention.keep_last) {
                self.prune(retention, &artifact, notes);
            }
        }

        Ok(artifact)
    }

    /// Replaces the raw dump by an archive. Falls back to the raw dump on failure.
    fn compress(&self, raw_path: PathBuf, notes: &mut JobLog) -> PathBuf {
        let archive_path = match self.archiver.create(&raw_path) {
            Ok(archive_path) => archive_path,
            Err(e) => {
                notes.warn(Step::Compress, format!("{e}; keeping the raw dump"));
                return raw_path;
            }
        };

        if let Err(e) = fs::remove_file(&raw_path) {
            notes.warn(
                Step::Compress,
                format!(
                    "Removing raw dump {} failed: {e}; keeping it instead of the archive",
                    raw_path.display()
                ),
            );
            if let Err(e) = fs::remove_file(&archive_path) {
                notes.warn(
                    Step::Compress,
                    format!("Removing archive {} failed: {e}", archive_path.display()),
                );
            }
            return raw_path;
        }

        notes.step(
            Step::Compress,
            format!("DB backup compressed: {}", archive_path.display()),
        );
        archive_path
    }

    fn prune(&self, retention: Retention, artifact: &Path, notes: &mut JobLog) {
        let backup_dir = &self.config.backup_directory;
        let report = match retention.prune(backup_dir, Some(artifact)) {
            Ok(report) => report,
            Err(e) => {
                notes.warn(
                    Step::Prune,
                    format!("Listing {} failed: {e}", backup_dir.display()),
                );
                return;
            }
        };

        for deleted in &report.deleted {
            let name = deleted.file_name().unwrap_or(deleted.as_os_str());
            notes.step(
                Step::Prune,
                format!("DB backup cleanup: deleted {}", Path::new(name).display()),
            );
        }
        for failure in report.failures {
            notes.warn(Step::Prune, failure.to_string());
        }
    }
}

fn discard_partial_dump(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => log::debug!(target: TARGET, "Removed partial dump {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => log::warn!(
            target: TARGET,
            "Removing partial dump {} failed: {e}",
            path.display()
        ),
    }
}

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use super::{JobError, JobLog, JobResult, Orchestrator, Outcome, RestoreRequest, Step};
use crate::archive;
use crate::backends::{DumpExecutor, LoadExecutor, Notifier};

const TARGET: &str = "orchestrator::restore";

/// Prefix of the temporary extraction directories.
const EXTRACTION_PREFIX: &str = "db_backup-restore-";

impl<D, L, N> Orchestrator<'_, D, L, N>
where
    D: DumpExecutor,
    L: LoadExecutor,
    N: Notifier,
{
    /// Loads the artifact named by `request` into the database.
    ///
    /// The artifact itself is never modified or deleted.
    pub fn run_restore(&self, request: &RestoreRequest) -> JobResult {
        let mut notes = JobLog::new(TARGET, self.config.logging);
        let result = self
            .restore(request, &mut notes)
            .map(|from| Outcome::Restored { from });
        notes.finish(result)
    }

    /// Resolves `source` against the backup directory unless it's absolute.
    pub fn resolve_artifact(&self, source: &Path) -> PathBuf {
        if source.is_absolute() {
            source.to_path_buf()
        } else {
            self.config.backup_directory.join(source)
        }
    }

    fn restore(&self, request: &RestoreRequest, notes: &mut JobLog) -> Result<PathBuf, JobError> {
        self.config.validate_for_restore()?;

        // locating
        let source = self.resolve_artifact(&request.source_artifact);
        if !source.is_file() {
            return Err(JobError::ArtifactNotFound(source));
        }
        notes.step(Step::Locate, format!("Restoring from: {}", source.display()));

        if !archive::is_archive(&source) {
            self.load(&source, notes)?;
            return Ok(source);
        }

        // extracting, the directory is removed by `close` or, on panic, by dropping it
        let extraction = self.extraction_dir()?;
        let loaded = self
            .extract(&source, extraction.path(), notes)
            .and_then(|extracted| self.load(&extracted, notes));

        let extraction_path = extraction.path().to_path_buf();
        match extraction.close() {
            Ok(()) => log::debug!(
                target: TARGET,
                "Removed extraction directory {}",
                extraction_path.display()
            ),
            Err(e) => notes.warn(
                Step::Cleanup,
                format!(
                    "Removing extraction directory {} failed: {e}",
                    extraction_path.display()
                ),
            ),
        }

        loaded.map(|()| source)
    }

    fn extraction_dir(&self) -> Result<TempDir, JobError> {
        let parent = self
            .config
            .restore_temp_directory
            .clone()
            .unwrap_or_else(std::env::temp_dir);
        fs::create_dir_all(&parent).map_err(JobError::TempDirFailed)?;

        tempfile::Builder::new()
            .prefix(EXTRACTION_PREFIX)
            .tempdir_in(&parent)
            .map_err(JobError::TempDirFailed)
    }

    /// Extracts the archive and returns the path of the contained dump.
    fn extract(
        &self,
        archive_path: &Path,
        dest_dir: &Path,
        notes: &mut JobLog,
    ) -> Result<PathBuf, JobError> {
        let malformed = |expected: &str| JobError::MalformedArchive {
            archive: archive_path.to_path_buf(),
            expected: expected.to_string(),
        };
        let expected = archive::inner_dump_name(archive_path).ok_or_else(|| malformed("a dump"))?;

        self.archiver.extract(archive_path, dest_dir)?;

        let extracted = dest_dir.join(&expected);
        if !extracted.is_file() {
            return Err(malformed(&expected));
        }

        notes.step(
            Step::Extract,
            format!("Extracted {expected} from {}", archive_path.display()),
        );
        Ok(extracted)
    }

    fn load(&self, sql_file: &Path, notes: &mut JobLog) -> Result<(), JobError> {
        let cfg = self.config;
        log::debug!(target: TARGET, "Restore database: {}", cfg.database.name);

        let output = self
            .loader
            .load(&cfg.database, sql_file)
            .map_err(JobError::LoadNotRun)?;
        if !output.stderr.is_empty() {
            log::warn!(target: TARGET, "{}", output.stderr);
        }
        if !output.success() {
            return Err(JobError::RestoreFailed {
                exit_code: output.exit_code,
                stderr: output.stderr,
            });
        }

        notes.step(
            Step::Load,
            format!("DB restored from: {}", sql_file.display()),
        );
        Ok(())
    }
}

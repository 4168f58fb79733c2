use std::cmp::Reverse;
use std::fs;
use std::io;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use derive_more::{Display, Error};

/// A regular file in the backup directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    pub modified: SystemTime,
}

/// Lists the regular files directly inside `directory`, newest first.
///
/// Files with equal modification times are ordered by path.
pub fn list(directory: &Path) -> io::Result<Vec<Artifact>> {
    let mut artifacts = Vec::new();
    for entry in fs::read_dir(directory)? {
        let entry = entry?;
        let metadata = entry.metadata()?;
        if !metadata.is_file() {
            continue;
        }

        artifacts.push(Artifact {
            path: entry.path(),
            modified: metadata.modified()?,
        });
    }

    artifacts.sort_by(|a, b| {
        Reverse(a.modified)
            .cmp(&Reverse(b.modified))
            .then_with(|| a.path.cmp(&b.path))
    });
    Ok(artifacts)
}

/// Splits newest-first `artifacts` into the ones to keep and the ones to delete.
///
/// The first `keep` artifacts are kept. With `keep == 0` every artifact is stale.
pub fn select_stale(mut artifacts: Vec<Artifact>, keep: usize) -> (Vec<Artifact>, Vec<Artifact>) {
    let stale = artifacts.split_off(keep.min(artifacts.len()));
    (artifacts, stale)
}

/// Deleting a stale artifact failed.
#[derive(Debug, Display, Error)]
#[display("Deleting stale artifact {} failed: {source}", path.display())]
pub struct PruneFileFailed {
    #[error(ignore)]
    pub path: PathBuf,
    pub source: io::Error,
}

/// Summary of a [Retention::prune] pass.
#[derive(Debug, Default)]
pub struct PruneReport {
    pub kept: Vec<PathBuf>,
    pub deleted: Vec<PathBuf>,
    pub failures: Vec<PruneFileFailed>,
}

/// Keeps the newest `keep_last` artifacts of a directory and deletes the rest.
#[derive(Copy, Clone, Debug)]
pub struct Retention {
    keep_last: NonZeroUsize,
}

impl Retention {
    /// Returns [None] for `keep_last == 0`, which means "prune nothing".
    pub fn new(keep_last: usize) -> Option<Self> {
        NonZeroUsize::new(keep_last).map(|keep_last| Self { keep_last })
    }

    pub fn keep_last(&self) -> usize {
        self.keep_last.get()
    }

    /// Deletes all but the newest artifacts in `directory`.
    ///
    /// `protect` names a file in `directory` that is never deleted and
    /// always takes one of the kept slots. A failed deletion is recorded
    /// in the report and the remaining deletions continue.
    pub fn prune(&self, directory: &Path, protect: Option<&Path>) -> io::Result<PruneReport> {
        let mut artifacts = list(directory)?;

        if let Some(protected_name) = protect.and_then(Path::file_name) {
            if let Some(pos) = artifacts
                .iter()
                .position(|a| a.path.file_name() == Some(protected_name))
            {
                let protected = artifacts.remove(pos);
                artifacts.insert(0, protected);
            }
        }

        let (kept, stale) = select_stale(artifacts, self.keep_last());
        log::debug!(
            target: "util::retention",
            "Keeping {} and deleting {} artifact(s) in {}",
            kept.len(),
            stale.len(),
            directory.display()
        );

        let mut report = PruneReport {
            kept: kept.into_iter().map(|a| a.path).collect(),
            ..Default::default()
        };

        for Artifact { path, .. } in stale {
            match fs::remove_file(&path) {
                Ok(()) => {
                    log::trace!(target: "util::retention", "Deleted {}", path.display());
                    report.deleted.push(path);
                }
                Err(source) => {
                    let failure = PruneFileFailed { path, source };
                    log::warn!(target: "util::retention", "{failure}");
                    report.failures.push(failure);
                }
            }
        }

        Ok(report)
    }
}

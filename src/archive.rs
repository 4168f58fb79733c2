//! Single-file compressed archives (gzip-compressed tar).

use std::ffi::OsString;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use derive_more::{Display, Error};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

/// Extension appended to a file when it gets archived.
pub const ARCHIVE_EXTENSION: &str = "tar.gz";

/// Errors of the [ArchiveManager].
#[derive(Debug, Display, Error)]
pub enum ArchiveError {
    /// The archive could not be created or opened.
    #[display("Opening archive {} failed: {source}", path.display())]
    ArchiveOpenFailed {
        path: PathBuf,
        source: io::Error,
    },
    /// Writing the archive failed.
    #[display("Writing archive {} failed: {source}", path.display())]
    ArchiveWriteFailed {
        path: PathBuf,
        source: io::Error,
    },
}

/// Path of the archive [ArchiveManager::create] writes for `source`.
pub fn archive_path(source: &Path) -> PathBuf {
    let mut archive_name = source.as_os_str().to_owned();
    archive_name.push(format!(".{ARCHIVE_EXTENSION}"));
    PathBuf::from(archive_name)
}

/// Returns if `path` names an archive created by the [ArchiveManager].
pub fn is_archive(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.ends_with(&format!(".{ARCHIVE_EXTENSION}")))
}

/// Name of the dump expected inside the archive at `path`.
///
/// The archive extension is stripped and `.sql` is appended unless already present,
/// so both `backup.sql.tar.gz` and `backup.tar.gz` expect `backup.sql`.
pub fn inner_dump_name(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    let stem = name.strip_suffix(&format!(".{ARCHIVE_EXTENSION}"))?;
    if stem.is_empty() {
        return None;
    }

    if stem.ends_with(".sql") {
        Some(stem.to_string())
    } else {
        Some(format!("{stem}.sql"))
    }
}

/// Creates and extracts single-entry archives.
#[derive(Copy, Clone, Debug, Default)]
pub struct ArchiveManager {
    compression: Compression,
}

impl ArchiveManager {
    pub fn new(compression: Compression) -> Self {
        Self { compression }
    }

    /// Archives `source` under its base name at `source` + `.tar.gz`.
    ///
    /// `source` is left in place. An existing archive is never overwritten, a
    /// partially written one is removed on failure.
    pub fn create(&self, source: &Path) -> Result<PathBuf, ArchiveError> {
        let archive_path = archive_path(source);

        let entry_name = source
            .file_name()
            .map(OsString::from)
            .ok_or_else(|| ArchiveError::ArchiveOpenFailed {
                path: archive_path.clone(),
                source: io::Error::new(io::ErrorKind::InvalidInput, "source has no file name"),
            })?;

        log::debug!(target: "archive", "Create archive {}", archive_path.display());
        let archive_file =
            File::create_new(&archive_path).map_err(|source| ArchiveError::ArchiveOpenFailed {
                path: archive_path.clone(),
                source,
            })?;

        let written = (|| {
            let encoder = GzEncoder::new(archive_file, self.compression);
            let mut builder = tar::Builder::new(encoder);
            builder.append_path_with_name(source, &entry_name)?;
            builder.into_inner()?.finish()?.sync_all()
        })();

        if let Err(source) = written {
            if let Err(e) = fs::remove_file(&archive_path) {
                log::warn!(
                    target: "archive",
                    "Removing partial archive {} failed: {e}",
                    archive_path.display()
                );
            }
            return Err(ArchiveError::ArchiveWriteFailed {
                path: archive_path,
                source,
            });
        }

        Ok(archive_path)
    }

    /// Extracts every entry of the archive at `archive_path` into `dest_dir`.
    pub fn extract(&self, archive_path: &Path, dest_dir: &Path) -> Result<(), ArchiveError> {
        log::debug!(
            target: "archive",
            "Extract archive {} into {}",
            archive_path.display(),
            dest_dir.display()
        );

        let open_failed = |source| ArchiveError::ArchiveOpenFailed {
            path: archive_path.to_path_buf(),
            source,
        };

        let archive_file = File::open(archive_path).map_err(open_failed)?;
        let mut archive = tar::Archive::new(GzDecoder::new(archive_file));
        archive.unpack(dest_dir).map_err(open_failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_archives() {
        assert!(is_archive(Path::new("/b/backup_x.sql.tar.gz")));
        assert!(!is_archive(Path::new("/b/backup_x.sql")));
        assert!(!is_archive(Path::new("/b/backup_x.gz")));
    }

    #[test]
    fn inner_name_of_archive() {
        assert_eq!(
            inner_dump_name(Path::new("dir/backup_x.sql.tar.gz")).as_deref(),
            Some("backup_x.sql")
        );
        assert_eq!(
            inner_dump_name(Path::new("backup_x.tar.gz")).as_deref(),
            Some("backup_x.sql")
        );
        assert_eq!(inner_dump_name(Path::new(".tar.gz")), None);
        assert_eq!(inner_dump_name(Path::new("backup_x.sql")), None);
    }

    #[test]
    fn create_then_extract_preserves_content() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("backup_db.sql");
        let content = "CREATE TABLE t (id INT);\nINSERT INTO t VALUES (1);\n";
        fs::write(&source, content).unwrap();

        let manager = ArchiveManager::default();
        let archive = manager.create(&source).unwrap();
        assert_eq!(archive, dir.path().join("backup_db.sql.tar.gz"));
        assert!(source.exists(), "source should not be deleted");

        let out = tempfile::tempdir().unwrap();
        manager.extract(&archive, out.path()).unwrap();
        let extracted = fs::read_to_string(out.path().join("backup_db.sql")).unwrap();
        assert_eq!(extracted, content);
    }

    #[test]
    fn create_fails_when_target_is_occupied() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("dump.sql");
        fs::write(&source, "SELECT 1;").unwrap();
        fs::create_dir(dir.path().join("dump.sql.tar.gz")).unwrap();

        let err = ArchiveManager::default().create(&source).unwrap_err();
        assert!(matches!(err, ArchiveError::ArchiveOpenFailed { .. }), "{err}");
    }

    #[test]
    fn create_keeps_existing_archive() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("dump.sql");
        fs::write(&source, "SELECT 2;").unwrap();
        let existing = dir.path().join("dump.sql.tar.gz");
        fs::write(&existing, b"earlier backup").unwrap();

        let err = ArchiveManager::default().create(&source).unwrap_err();
        assert!(matches!(err, ArchiveError::ArchiveOpenFailed { .. }), "{err}");
        assert_eq!(fs::read(&existing).unwrap(), b"earlier backup");
    }

    #[test]
    fn create_fails_for_missing_source_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("missing.sql");

        let err = ArchiveManager::default().create(&source).unwrap_err();
        assert!(matches!(err, ArchiveError::ArchiveWriteFailed { .. }), "{err}");
        assert!(!dir.path().join("missing.sql.tar.gz").exists());
    }

    #[test]
    fn extract_rejects_corrupt_archive() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("broken.sql.tar.gz");
        fs::write(&archive, b"definitely not gzip").unwrap();

        let err = ArchiveManager::default()
            .extract(&archive, dir.path())
            .unwrap_err();
        assert!(matches!(err, ArchiveError::ArchiveOpenFailed { .. }), "{err}");
    }

    #[test]
    fn extract_missing_archive_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = ArchiveManager::default()
            .extract(&dir.path().join("nope.tar.gz"), dir.path())
            .unwrap_err();
        assert!(matches!(err, ArchiveError::ArchiveOpenFailed { .. }));
    }
}

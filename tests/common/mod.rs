//! Fake external capabilities for driving the orchestrator without processes.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use db_backup_lib::backends::{DumpExecutor, LoadExecutor, Notifier, NotifyError, ProcessOutput};
use db_backup_lib::config::{DatabaseConfig, JobConfig, NotificationConfig};
use tempfile::TempDir;

pub const DUMP_SQL: &str = "CREATE TABLE users (id INT);\nINSERT INTO users VALUES (1),(2);\n";

/// Writes [DUMP_SQL] (or `content`) and exits with `exit_code`.
pub struct FakeDump {
    pub content: String,
    pub exit_code: i32,
    /// Occupies the archive target so that compression fails.
    pub block_archive: bool,
    pub calls: Cell<usize>,
}

impl Default for FakeDump {
    fn default() -> Self {
        Self {
            content: DUMP_SQL.to_string(),
            exit_code: 0,
            block_archive: false,
            calls: Cell::new(0),
        }
    }
}

impl DumpExecutor for FakeDump {
    fn dump(&self, _db: &DatabaseConfig, dest: &Path) -> io::Result<ProcessOutput> {
        self.calls.set(self.calls.get() + 1);
        let mut file = File::create_new(dest)?;
        file.write_all(self.content.as_bytes())?;

        if self.block_archive {
            let mut blocker = dest.as_os_str().to_owned();
            blocker.push(".tar.gz");
            fs::create_dir(blocker)?;
        }

        Ok(ProcessOutput {
            exit_code: Some(self.exit_code),
            stderr: String::new(),
        })
    }
}

/// Records the path and content of every loaded file.
#[derive(Default)]
pub struct FakeLoad {
    pub exit_code: i32,
    pub loaded: RefCell<Vec<(PathBuf, String)>>,
}

impl FakeLoad {
    pub fn failing() -> Self {
        Self {
            exit_code: 1,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.loaded.borrow().len()
    }
}

impl LoadExecutor for FakeLoad {
    fn load(&self, _db: &DatabaseConfig, source: &Path) -> io::Result<ProcessOutput> {
        let content = fs::read_to_string(source)?;
        self.loaded.borrow_mut().push((source.to_path_buf(), content));

        Ok(ProcessOutput {
            exit_code: Some(self.exit_code),
            stderr: if self.exit_code == 0 {
                String::new()
            } else {
                "ERROR 1064 (42000): syntax error".into()
            },
        })
    }
}

#[derive(Default)]
pub struct FakeNotifier {
    pub fail: bool,
    pub sent: RefCell<Vec<PathBuf>>,
}

impl Notifier for FakeNotifier {
    fn send(&self, _cfg: &NotificationConfig, attachment: &Path) -> Result<(), NotifyError> {
        self.sent.borrow_mut().push(attachment.to_path_buf());
        if self.fail {
            return Err(NotifyError::Failed {
                exit_code: Some(1),
                stderr: "smtp: connection refused".into(),
            });
        }
        Ok(())
    }
}

/// A config pointing into a scratch directory.
pub struct Scratch {
    pub root: TempDir,
    pub config: JobConfig,
}

impl Scratch {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let config = JobConfig {
            backup_directory: root.path().join("backups"),
            restore_temp_directory: Some(root.path().join("tmp")),
            ..Default::default()
        };

        Self { root, config }
    }

    pub fn backup_dir(&self) -> &Path {
        &self.config.backup_directory
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.root.path().join("tmp")
    }

    /// Entries of the backup directory, sorted by name.
    pub fn artifacts(&self) -> Vec<String> {
        let mut names: Vec<_> = fs::read_dir(self.backup_dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

/// Well-behaved fakes.
pub fn fakes() -> (FakeDump, FakeLoad, FakeNotifier) {
    (
        FakeDump::default(),
        FakeLoad::default(),
        FakeNotifier::default(),
    )
}

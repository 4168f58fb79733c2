//! Dump and load through the MySQL/MariaDB command line clients.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use super::{DumpExecutor, LoadExecutor, ProcessOutput};
use crate::config::DatabaseConfig;

/// Environment variable read by the MySQL clients for the password.
///
/// Keeps the password out of the process list.
const PASSWORD_ENV: &str = "MYSQL_PWD";

/// Invokes `mysqldump` and `mysql` (or compatible binaries).
#[derive(Clone, Debug)]
pub struct MySqlClient {
    dump_tool: PathBuf,
    load_tool: PathBuf,
}

impl MySqlClient {
    pub fn new(dump_tool: impl Into<PathBuf>, load_tool: impl Into<PathBuf>) -> Self {
        Self {
            dump_tool: dump_tool.into(),
            load_tool: load_tool.into(),
        }
    }

    fn command(tool: &Path, db: &DatabaseConfig) -> Command {
        let mut command = Command::new(tool);
        command
            .arg(format!("--host={}", db.host))
            .arg(format!("--port={}", db.port))
            .arg(format!("--user={}", db.user))
            .stderr(Stdio::piped());

        if !db.password.is_empty() {
            command.env(PASSWORD_ENV, &db.password);
        }

        command
    }
}

impl DumpExecutor for MySqlClient {
    fn dump(&self, db: &DatabaseConfig, dest: &Path) -> io::Result<ProcessOutput> {
        let dump_file = File::create_new(dest)?;

        let mut command = Self::command(&self.dump_tool, db);
        command
            .arg("--opt") // sensible dump defaults
            .arg("--single-transaction")
            .arg(&db.name)
            .stdin(Stdio::null())
            .stdout(dump_file);

        log::trace!(
            target: "backends::mysql",
            "Running: {} --host={} --port={} --user={} --opt --single-transaction {} > {}",
            self.dump_tool.display(),
            db.host,
            db.port,
            db.user,
            db.name,
            dest.display()
        );

        let output = command.output().inspect_err(|_| {
            // the dump never started, don't leave the empty target behind
            let _ = fs::remove_file(dest);
        })?;
        Ok(ProcessOutput::new(output.status, &output.stderr))
    }
}

impl LoadExecutor for MySqlClient {
    fn load(&self, db: &DatabaseConfig, source: &Path) -> io::Result<ProcessOutput> {
        let sql_file = File::open(source)?;

        let mut command = Self::command(&self.load_tool, db);
        command
            .arg(&db.name)
            .stdin(sql_file)
            .stdout(Stdio::null());

        log::trace!(
            target: "backends::mysql",
            "Running: {} --host={} --port={} --user={} {} < {}",
            self.load_tool.display(),
            db.host,
            db.port,
            db.user,
            db.name,
            source.display()
        );

        let output = command.output()?;
        Ok(ProcessOutput::new(output.status, &output.stderr))
    }
}

//! Notification through a `mail(1)` compatible command.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use super::{Notifier, NotifyError, ProcessOutput};
use crate::config::NotificationConfig;

/// Sends the artifact by invoking `<tool> -s <subject> <attach_flag> <file> <recipient>`
/// with the body on standard input.
#[derive(Clone, Debug)]
pub struct MailCommand {
    tool: PathBuf,
    attach_flag: String,
}

impl MailCommand {
    pub fn new(tool: impl Into<PathBuf>, attach_flag: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            attach_flag: attach_flag.into(),
        }
    }

    pub fn from_config(cfg: &NotificationConfig) -> Self {
        Self::new(&cfg.mail_tool_path, &cfg.attach_flag)
    }
}

impl Notifier for MailCommand {
    fn send(
        &self,
        notification: &NotificationConfig,
        attachment: &Path,
    ) -> Result<(), NotifyError> {
        log::debug!(
            target: "backends::mail",
            "Mailing {} to {}",
            attachment.display(),
            notification.recipient
        );

        let mut child = Command::new(&self.tool)
            .arg("-s")
            .arg(&notification.subject)
            .arg(&self.attach_flag)
            .arg(attachment)
            .arg(&notification.recipient)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(NotifyError::NotRun)?;

        if let Some(mut stdin) = child.stdin.take() {
            match stdin.write_all(notification.body.as_bytes()) {
                // the transport may exit before reading the body
                Err(e) if e.kind() != io::ErrorKind::BrokenPipe => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(NotifyError::NotRun(e));
                }
                _ => {}
            }
        }

        let output = child.wait_with_output().map_err(NotifyError::NotRun)?;
        let output = ProcessOutput::new(output.status, &output.stderr);
        if !output.success() {
            return Err(NotifyError::Failed {
                exit_code: output.exit_code,
                stderr: output.stderr,
            });
        }

        Ok(())
    }
}

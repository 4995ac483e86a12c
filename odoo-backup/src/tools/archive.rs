//! Gzip-compressed tarball via `tar -czf`.

use super::{display_command, run_tool, stderr_tail, Archiver};
use crate::utils::errors::{BackupError, Result};
use async_trait::async_trait;
use std::ffi::OsStr;
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;
use tracing::info;

pub struct TarArchiver {
    program: String,
    timeout: Option<Duration>,
}

impl TarArchiver {
    pub fn new(program: impl Into<String>, timeout: Option<Duration>) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }
}

#[async_trait]
impl Archiver for TarArchiver {
    async fn archive(&self, source_dir: &Path, archive: &Path) -> Result<()> {
        // Entries are stored relative to the staging root ("./metadata.json", ...)
        let args = [
            OsStr::new("-czf"),
            archive.as_os_str(),
            OsStr::new("-C"),
            source_dir.as_os_str(),
            OsStr::new("."),
        ];
        info!("Executing command: {}", display_command(&self.program, &args));

        let mut cmd = Command::new(&self.program);
        cmd.args(args);

        let output = run_tool(&self.program, cmd, self.timeout).await?;
        if !output.status.success() {
            return Err(BackupError::ArchiveExecution {
                status: output.status.to_string(),
                stderr: stderr_tail(&output),
            });
        }

        Ok(())
    }
}

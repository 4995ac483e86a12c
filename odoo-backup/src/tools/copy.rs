//! Recursive copy via `cp -ra`.

use super::{display_command, run_tool, stderr_tail, RecursiveCopier};
use crate::utils::errors::{BackupError, Result};
use async_trait::async_trait;
use std::ffi::OsStr;
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;
use tracing::info;

pub struct CpCopier {
    program: String,
    timeout: Option<Duration>,
}

impl CpCopier {
    pub fn new(program: impl Into<String>, timeout: Option<Duration>) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }
}

#[async_trait]
impl RecursiveCopier for CpCopier {
    async fn copy(&self, source: &Path, dest_dir: &Path) -> Result<()> {
        let args = [OsStr::new("-ra"), source.as_os_str(), dest_dir.as_os_str()];
        info!("Executing command: {}", display_command(&self.program, &args));

        let mut cmd = Command::new(&self.program);
        cmd.args(args);

        let output = run_tool(&self.program, cmd, self.timeout).await?;
        if !output.status.success() {
            return Err(BackupError::CopyExecution {
                source_path: source.to_path_buf(),
                status: output.status.to_string(),
                stderr: stderr_tail(&output),
            });
        }

        info!("Copied {} to {}", source.display(), dest_dir.display());
        Ok(())
    }
}

//! External utilities behind narrow capability traits.
//!
//! The executor only talks to [`DatabaseDumper`], [`RecursiveCopier`] and
//! [`Archiver`]. The process-backed implementations live in the submodules.

pub mod archive;
pub mod copy;
pub mod pg_dump;

pub use archive::TarArchiver;
pub use copy::CpCopier;
pub use pg_dump::{DbCredentials, PgDump};

use crate::utils::errors::{BackupError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Lines of stderr kept in execution errors
const STDERR_TAIL_LINES: usize = 10;

#[async_trait]
pub trait DatabaseDumper: Send + Sync {
    /// Dump database `db_name` into the file `output`.
    async fn dump(&self, db_name: &str, output: &Path) -> Result<()>;
}

#[async_trait]
pub trait RecursiveCopier: Send + Sync {
    /// Copy `source` (preserving attributes) into the existing directory `dest_dir`.
    async fn copy(&self, source: &Path, dest_dir: &Path) -> Result<()>;
}

#[async_trait]
pub trait Archiver: Send + Sync {
    /// Pack the contents of `source_dir` into the gzip-compressed tarball `archive`.
    async fn archive(&self, source_dir: &Path, archive: &Path) -> Result<()>;
}

/// Run a prepared command to completion, capturing its output.
///
/// The child is killed if `timeout` elapses first.
pub(crate) async fn run_tool(
    tool: &str,
    mut cmd: Command,
    timeout: Option<Duration>,
) -> Result<Output> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = cmd.spawn().map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => BackupError::ToolNotFound(tool.to_string()),
        _ => BackupError::Io(e),
    })?;

    let output = match timeout {
        Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
            .await
            .map_err(|_| BackupError::Timeout {
                tool: tool.to_string(),
                secs: limit.as_secs(),
            })??,
        None => child.wait_with_output().await?,
    };

    Ok(output)
}

/// Last few lines of a process's stderr
pub(crate) fn stderr_tail(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let lines: Vec<&str> = stderr.trim_end().lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}

/// Resolve `program` the way a shell would: paths are checked directly,
/// bare names are searched for on `PATH`.
pub fn resolve_program(program: &str) -> Result<PathBuf> {
    which::which(program).map_err(|e| {
        debug!("{} not resolvable: {}", program, e);
        BackupError::ToolNotFound(program.to_string())
    })
}

/// Render a command line for log output
pub(crate) fn display_command<S: AsRef<std::ffi::OsStr>>(program: &str, args: &[S]) -> String {
    let mut line = program.to_string();
    for arg in args {
        line.push(' ');
        line.push_str(&arg.as_ref().to_string_lossy());
    }
    line
}

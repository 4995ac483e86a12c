//! Custom error types for the backup tool.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Steps of a backup run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupStep {
    VersionQuery,
    Staging,
    DatabaseDump,
    FilestoreCopy,
    AddonsCopy,
    Metadata,
    Archive,
    Cleanup,
}

impl fmt::Display for BackupStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BackupStep::VersionQuery => "version query",
            BackupStep::Staging => "staging",
            BackupStep::DatabaseDump => "database dump",
            BackupStep::FilestoreCopy => "filestore copy",
            BackupStep::AddonsCopy => "addons copy",
            BackupStep::Metadata => "metadata",
            BackupStep::Archive => "archive",
            BackupStep::Cleanup => "cleanup",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("{step} step failed: {source}")]
    Step {
        step: BackupStep,
        #[source]
        source: Box<BackupError>,
    },

    #[error("Version query failed: {0}")]
    VersionQuery(String),

    #[error("Failed to create directory {}: {source}", .path.display())]
    DirectoryCreation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read addons directory {}: {source}", .path.display())]
    AddonsRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Missing environment variables: {}", .0.join(", "))]
    MissingConfig(Vec<String>),

    #[error("{0} not found in PATH")]
    ToolNotFound(String),

    #[error("pg_dump exited with {status}: {stderr}")]
    DumpExecution { status: String, stderr: String },

    #[error("Copy of {} exited with {status}: {stderr}", .source_path.display())]
    CopyExecution {
        source_path: PathBuf,
        status: String,
        stderr: String,
    },

    #[error("Archiver exited with {status}: {stderr}")]
    ArchiveExecution { status: String, stderr: String },

    #[error("{tool} did not finish within {secs}s")]
    Timeout { tool: String, secs: u64 },

    #[error(
        "Failed to remove staging directory {} (archive kept at {}): {source}",
        .path.display(),
        .archive.display()
    )]
    Cleanup {
        path: PathBuf,
        archive: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BackupError {
    /// Tag this error with the step it occurred in.
    pub fn in_step(self, step: BackupStep) -> Self {
        BackupError::Step {
            step,
            source: Box::new(self),
        }
    }

    /// The step a wrapped error came from, if any.
    pub fn step(&self) -> Option<BackupStep> {
        match self {
            BackupError::Step { step, .. } => Some(*step),
            _ => None,
        }
    }

    /// The innermost error, with step wrappers removed.
    pub fn root(&self) -> &BackupError {
        match self {
            BackupError::Step { source, .. } => source.root(),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, BackupError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_wrapper_display() {
        let err = BackupError::ToolNotFound("pg_dump".to_string()).in_step(BackupStep::DatabaseDump);
        assert_eq!(err.step(), Some(BackupStep::DatabaseDump));
        assert_eq!(err.to_string(), "database dump step failed: pg_dump not found in PATH");
        assert!(matches!(err.root(), BackupError::ToolNotFound(_)));
    }

    #[test]
    fn test_missing_config_lists_variables() {
        let err = BackupError::MissingConfig(vec!["HOST".to_string(), "PASSWORD".to_string()]);
        assert_eq!(err.to_string(), "Missing environment variables: HOST, PASSWORD");
    }
}

//! Backup job executor - Orchestrates the backup run.
//!
//! Steps run strictly in order and the first failure ends the run:
//! - Server version query
//! - Staging directory creation
//! - Database dump
//! - Filestore and addons copies
//! - Manifest
//! - Archive
//! - Optional staging cleanup
//!
//! A failed run leaves its staging directory behind for inspection.

pub mod manifest;

use crate::config::Config;
use crate::fs::staging::{self, StagingArea};
use crate::fs::walker::{format_bytes, summarize, TreeSummary};
use crate::rpc::VersionResolver;
use crate::tools::{Archiver, DatabaseDumper, RecursiveCopier};
use crate::utils::errors::{BackupError, BackupStep, Result};
use chrono::Local;
use manifest::BackupManifest;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Inputs of one backup run
#[derive(Debug, Clone)]
pub struct BackupJob {
    pub db_name: String,
    pub backup_dir: PathBuf,
    pub addons_dir: PathBuf,
    /// Filestore of this database (`<filestore_root>/<db_name>`)
    pub filestore_dir: PathBuf,
    pub remove_staging: bool,
    pub sort_addons: bool,
}

impl BackupJob {
    /// Build a job for `db_name` from resolved configuration.
    pub fn from_config(db_name: &str, config: &Config) -> Result<Self> {
        validate_db_name(db_name)?;

        Ok(Self {
            db_name: db_name.to_string(),
            backup_dir: config.paths.backup_dir.clone(),
            addons_dir: config.paths.addons_dir.clone(),
            filestore_dir: config.paths.filestore_root.join(db_name),
            remove_staging: config.backup.remove_staging,
            sort_addons: config.backup.sort_addons,
        })
    }
}

/// The name ends up in directory and file names, so it must be a single
/// path component. It is also the last `pg_dump` argument and must not read
/// as an option.
fn validate_db_name(db_name: &str) -> Result<()> {
    if db_name.trim().is_empty() {
        return Err(BackupError::Config("database name is required".to_string()));
    }
    if db_name.starts_with('-') {
        return Err(BackupError::Config(format!(
            "database name {:?} must not start with '-'",
            db_name
        )));
    }
    if db_name.contains(['/', '\\']) || db_name == "." || db_name == ".." {
        return Err(BackupError::Config(format!(
            "invalid database name {:?}",
            db_name
        )));
    }
    Ok(())
}

/// Backup execution result
#[derive(Debug)]
pub struct BackupResult {
    pub archive_path: PathBuf,
    /// Staging directory, when it was kept
    pub staging_path: Option<PathBuf>,
    pub manifest: BackupManifest,
    pub staged_files: usize,
    pub staged_bytes: u64,
    pub duration: Duration,
}

/// Main backup executor
pub struct BackupExecutor {
    version: Box<dyn VersionResolver>,
    dumper: Box<dyn DatabaseDumper>,
    copier: Box<dyn RecursiveCopier>,
    archiver: Box<dyn Archiver>,
}

impl BackupExecutor {
    pub fn new(
        version: Box<dyn VersionResolver>,
        dumper: Box<dyn DatabaseDumper>,
        copier: Box<dyn RecursiveCopier>,
        archiver: Box<dyn Archiver>,
    ) -> Self {
        Self {
            version,
            dumper,
            copier,
            archiver,
        }
    }

    /// Execute a backup job
    pub async fn execute(&self, job: &BackupJob) -> Result<BackupResult> {
        let start_time = Instant::now();
        let started_at = Local::now();

        info!("Starting Odoo backup of database {}", job.db_name);

        info!("Getting Odoo information via XML-RPC...");
        let version = self
            .version
            .server_version()
            .await
            .map_err(|e| e.in_step(BackupStep::VersionQuery))?;
        info!("Odoo version: {}", version);

        info!("Creating backup directory at {}", job.backup_dir.display());
        let area = StagingArea::create(&job.backup_dir, &job.db_name, &started_at)
            .map_err(|e| e.in_step(BackupStep::Staging))?;
        info!("Backup path: {}", area.root().display());

        self.dumper
            .dump(&job.db_name, &area.dump_file(&job.db_name))
            .await
            .map_err(|e| e.in_step(BackupStep::DatabaseDump))?;

        info!("Copying filestore...");
        self.copier
            .copy(&job.filestore_dir, &area.filestore_dir())
            .await
            .map_err(|e| e.in_step(BackupStep::FilestoreCopy))?;

        info!("Copying addons...");
        self.copier
            .copy(&job.addons_dir, &area.addons_dir())
            .await
            .map_err(|e| e.in_step(BackupStep::AddonsCopy))?;

        let manifest = self
            .write_manifest(&area, job, &version)
            .map_err(|e| e.in_step(BackupStep::Metadata))?;

        let summary = summarize(area.root()).unwrap_or_else(|e| {
            warn!("Could not total staging directory: {}", e);
            TreeSummary::default()
        });
        info!(
            "Staged {} files ({})",
            summary.files,
            format_bytes(summary.bytes)
        );

        let archive_path = staging::archive_path(&job.backup_dir, &job.db_name, &started_at);
        self.create_archive(area.root(), &archive_path)
            .await
            .map_err(|e| e.in_step(BackupStep::Archive))?;
        info!("Archive created successfully: {}", archive_path.display());

        let staging_path = if job.remove_staging {
            info!("Deleting backup folder {}...", area.root().display());
            area.remove().map_err(|source| {
                BackupError::Cleanup {
                    path: area.root().to_path_buf(),
                    archive: archive_path.clone(),
                    source,
                }
                .in_step(BackupStep::Cleanup)
            })?;
            None
        } else {
            info!("Skipping backup folder deletion");
            Some(area.root().to_path_buf())
        };

        Ok(BackupResult {
            archive_path,
            staging_path,
            manifest,
            staged_files: summary.files,
            staged_bytes: summary.bytes,
            duration: start_time.elapsed(),
        })
    }

    fn write_manifest(
        &self,
        area: &StagingArea,
        job: &BackupJob,
        version: &str,
    ) -> Result<BackupManifest> {
        let manifest = BackupManifest::collect(
            version,
            &job.db_name,
            &job.addons_dir,
            job.sort_addons,
            &Local::now(),
        )?;
        manifest.write_to(&area.metadata_file())?;
        info!(
            "Metadata file created at: {} ({} addons)",
            area.metadata_file().display(),
            manifest.addons.len()
        );
        Ok(manifest)
    }

    /// Archive into a side file and move it into place only on success, so
    /// the target path never holds a partial archive.
    async fn create_archive(&self, source_dir: &Path, archive_path: &Path) -> Result<()> {
        let mut partial = archive_path.as_os_str().to_owned();
        partial.push(".partial");
        let partial = PathBuf::from(partial);

        info!("Creating backup archive file: {}", archive_path.display());
        if let Err(e) = self.archiver.archive(source_dir, &partial).await {
            remove_if_exists(&partial);
            return Err(e);
        }

        if archive_path.exists() {
            warn!("Replacing existing archive {}", archive_path.display());
        }
        if let Err(e) = std::fs::rename(&partial, archive_path) {
            remove_if_exists(&partial);
            return Err(BackupError::Write {
                path: archive_path.to_path_buf(),
                source: e,
            });
        }

        Ok(())
    }
}

fn remove_if_exists(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Failed to remove {}: {}", path.display(), e);
        }
    }
}

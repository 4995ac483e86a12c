//! Backup manifest written as `metadata.json` at the top of each staging
//! directory (and therefore at the top of the archive).

use crate::utils::errors::{BackupError, Result};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::Path;

const BACKUP_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupManifest {
    pub odoo_version: String,
    pub db_name: String,
    pub backup_date: String,
    pub addons: Vec<String>,
}

impl BackupManifest {
    /// Build a manifest from the current contents of `addons_dir`.
    pub fn collect(
        odoo_version: &str,
        db_name: &str,
        addons_dir: &Path,
        sort_addons: bool,
        now: &DateTime<Local>,
    ) -> Result<Self> {
        let mut addons = list_addons(addons_dir)?;
        if sort_addons {
            addons.sort();
        }

        Ok(Self {
            odoo_version: odoo_version.to_string(),
            db_name: db_name.to_string(),
            backup_date: now.format(BACKUP_DATE_FORMAT).to_string(),
            addons,
        })
    }

    /// Write the manifest as indented JSON, replacing any existing file.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|source| BackupError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn read_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Names of the directories directly inside `addons_dir`, in listing order.
/// Plain files and symlinks are skipped.
fn list_addons(addons_dir: &Path) -> Result<Vec<String>> {
    let read_error = |source: std::io::Error| BackupError::AddonsRead {
        path: addons_dir.to_path_buf(),
        source,
    };

    let mut addons = Vec::new();
    for entry in std::fs::read_dir(addons_dir).map_err(read_error)? {
        let entry = entry.map_err(read_error)?;
        if entry.file_type().map_err(read_error)?.is_dir() {
            addons.push(entry.file_name().to_string_lossy().into_owned());
        }
    }

    Ok(addons)
}

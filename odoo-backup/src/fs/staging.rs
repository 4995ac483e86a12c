//! Staging directory layout and output naming.
//!
//! A run stages everything under `<backup_dir>/<name>-<YYYYMMDDHHMM>` and
//! writes the archive next to it as `<backup_dir>/<name>_<YYYYMMDD>.tar.gz`.
//! Two runs for the same name within one minute share a staging directory.

use crate::utils::errors::{BackupError, Result};
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};

const STAGING_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M";
const ARCHIVE_DATE_FORMAT: &str = "%Y%m%d";

pub const DATABASE_DIR: &str = "database";
pub const FILESTORE_DIR: &str = "filestore";
pub const ADDONS_DIR: &str = "addons";
pub const METADATA_FILE: &str = "metadata.json";

/// Staging path for a run started at `at`.
pub fn staging_path(backup_dir: &Path, name: &str, at: &DateTime<Local>) -> PathBuf {
    backup_dir.join(format!("{}-{}", name, at.format(STAGING_TIMESTAMP_FORMAT)))
}

/// Archive path for a run started at `at`.
pub fn archive_path(backup_dir: &Path, name: &str, at: &DateTime<Local>) -> PathBuf {
    backup_dir.join(format!("{}_{}.tar.gz", name, at.format(ARCHIVE_DATE_FORMAT)))
}

/// A created staging directory with its fixed subdirectories
#[derive(Debug, Clone)]
pub struct StagingArea {
    root: PathBuf,
}

impl StagingArea {
    /// Create the staging directory and its subdirectories (mode 0755).
    pub fn create(backup_dir: &Path, name: &str, at: &DateTime<Local>) -> Result<Self> {
        let area = Self {
            root: staging_path(backup_dir, name, at),
        };

        create_dir(&area.root)?;
        for dir in [area.database_dir(), area.filestore_dir(), area.addons_dir()] {
            create_dir(&dir)?;
        }

        Ok(area)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn database_dir(&self) -> PathBuf {
        self.root.join(DATABASE_DIR)
    }

    pub fn filestore_dir(&self) -> PathBuf {
        self.root.join(FILESTORE_DIR)
    }

    pub fn addons_dir(&self) -> PathBuf {
        self.root.join(ADDONS_DIR)
    }

    pub fn metadata_file(&self) -> PathBuf {
        self.root.join(METADATA_FILE)
    }

    /// Where the database dump for `name` goes
    pub fn dump_file(&self, name: &str) -> PathBuf {
        self.database_dir().join(format!("{}_dump.sql", name))
    }

    /// Delete the whole staging tree
    pub fn remove(&self) -> std::io::Result<()> {
        std::fs::remove_dir_all(&self.root)
    }
}

fn create_dir(path: &Path) -> Result<()> {
    let mut builder = std::fs::DirBuilder::new();
    builder.recursive(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o755);
    }

    builder.create(path).map_err(|source| BackupError::DirectoryCreation {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::fs;
    use tempfile::TempDir;

    fn at() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 5, 1, 13, 45, 10).unwrap()
    }

    #[test]
    fn test_output_names() {
        let root = Path::new("/tmp/odoo-backup");
        assert_eq!(
            staging_path(root, "prod", &at()),
            PathBuf::from("/tmp/odoo-backup/prod-202405011345")
        );
        assert_eq!(
            archive_path(root, "prod", &at()),
            PathBuf::from("/tmp/odoo-backup/prod_20240501.tar.gz")
        );
    }

    #[test]
    fn test_create_layout() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let backup_dir = temp_dir.path().join("nested/backups");

        let area = StagingArea::create(&backup_dir, "prod", &at())?;
        assert_eq!(area.root(), backup_dir.join("prod-202405011345"));
        assert!(area.database_dir().is_dir());
        assert!(area.filestore_dir().is_dir());
        assert!(area.addons_dir().is_dir());
        assert_eq!(
            area.dump_file("prod"),
            area.root().join("database/prod_dump.sql")
        );

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(area.root())?.permissions().mode() & 0o700;
            assert_eq!(mode, 0o700);
        }

        Ok(())
    }

    #[test]
    fn test_same_minute_reuses_directory() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let first = StagingArea::create(temp_dir.path(), "prod", &at())?;
        let later = Local.with_ymd_and_hms(2024, 5, 1, 13, 45, 55).unwrap();
        let second = StagingArea::create(temp_dir.path(), "prod", &later)?;
        assert_eq!(first.root(), second.root());
        Ok(())
    }

    #[test]
    fn test_create_fails_under_a_file() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let blocker = temp_dir.path().join("not-a-dir");
        fs::write(&blocker, b"x")?;

        let err = StagingArea::create(&blocker, "prod", &at()).unwrap_err();
        assert!(matches!(err, BackupError::DirectoryCreation { .. }));
        Ok(())
    }

    #[test]
    fn test_remove() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let area = StagingArea::create(temp_dir.path(), "prod", &at())?;
        fs::write(area.metadata_file(), b"{}")?;

        area.remove()?;
        assert!(!area.root().exists());
        Ok(())
    }
}

//! Configuration management for the backup tool.
//!
//! Loads configuration from a TOML file. Every section has defaults, so a
//! partial file (or no file at all) is valid. Command-line flags are applied
//! on top by `main`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub odoo: OdooConfig,
    pub paths: PathsConfig,
    pub tools: ToolsConfig,
    pub backup: BackupConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OdooConfig {
    /// Base URL of the Odoo server (XML-RPC lives under /xmlrpc/2)
    pub url: String,

    /// Request timeout for the version query
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Root directory for staging directories and archives
    pub backup_dir: PathBuf,

    /// Addons source directory
    pub addons_dir: PathBuf,

    /// Directory holding one filestore per database
    pub filestore_root: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Database dump utility (name looked up on PATH, or a path)
    pub pg_dump: String,

    /// Recursive copy utility
    pub cp: String,

    /// Archive utility
    pub tar: String,

    /// Per-invocation limit for external tools (unset = no limit)
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    /// Delete the staging directory once the archive exists
    pub remove_staging: bool,

    /// Sort addon names in the manifest instead of keeping listing order
    pub sort_addons: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for OdooConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8069".to_string(),
            timeout_secs: 30,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            backup_dir: PathBuf::from("/tmp/odoo-backup"),
            addons_dir: PathBuf::from("/mnt/extra-addons"),
            filestore_root: PathBuf::from("/var/lib/odoo/filestore"),
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            pg_dump: "pg_dump".to_string(),
            cp: "cp".to_string(),
            tar: "tar".to_string(),
            timeout_secs: None,
        }
    }
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            remove_staging: true,
            sort_addons: false,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &PathBuf) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.odoo.timeout_secs)
    }

    pub fn tool_timeout(&self) -> Option<Duration> {
        self.tools.timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.odoo.url, "http://localhost:8069");
        assert_eq!(config.paths.backup_dir, PathBuf::from("/tmp/odoo-backup"));
        assert_eq!(config.paths.addons_dir, PathBuf::from("/mnt/extra-addons"));
        assert!(config.backup.remove_staging);
        assert!(!config.backup.sort_addons);
        assert!(config.tool_timeout().is_none());
    }

    #[test]
    fn test_partial_file_keeps_defaults() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("odoo-backup.toml");
        fs::write(
            &path,
            "[paths]\nbackup_dir = \"/srv/backups\"\n\n[tools]\ntimeout_secs = 600\n",
        )?;

        let config = Config::from_file(&path)?;
        assert_eq!(config.paths.backup_dir, PathBuf::from("/srv/backups"));
        assert_eq!(config.paths.addons_dir, PathBuf::from("/mnt/extra-addons"));
        assert_eq!(config.tools.pg_dump, "pg_dump");
        assert_eq!(config.tool_timeout(), Some(Duration::from_secs(600)));
        assert_eq!(config.log.level, "info");

        Ok(())
    }

    #[test]
    fn test_example_config_parses() {
        let config: Config = toml::from_str(include_str!("../odoo-backup.example.toml")).unwrap();
        assert_eq!(config.paths.filestore_root, PathBuf::from("/var/lib/odoo/filestore"));
        assert_eq!(config.rpc_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_invalid_file_is_rejected() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("broken.toml");
        fs::write(&path, "[backup]\nremove_staging = \"maybe\"\n")?;

        assert!(Config::from_file(&path).is_err());
        Ok(())
    }
}

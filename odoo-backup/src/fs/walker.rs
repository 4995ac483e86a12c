//! Directory traversal for reporting what a staging tree holds.

use std::path::Path;
use walkdir::WalkDir;

/// Totals for a directory tree
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeSummary {
    /// Regular files and symlinks (symlinks are not followed)
    pub files: usize,

    /// Sum of file sizes in bytes
    pub bytes: u64,
}

/// Walk a directory tree and total its contents.
///
/// # Example
/// ```no_run
/// use odoo_backup::fs::walker::summarize;
/// use std::path::Path;
///
/// let summary = summarize(Path::new("/tmp/odoo-backup/prod-202405011345")).unwrap();
/// println!("{} files, {} bytes", summary.files, summary.bytes);
/// ```
pub fn summarize(root: &Path) -> std::io::Result<TreeSummary> {
    let mut summary = TreeSummary::default();

    for entry in WalkDir::new(root).follow_links(false).min_depth(1) {
        let entry = entry?;

        if entry.file_type().is_dir() {
            continue;
        }

        summary.files += 1;
        summary.bytes += entry.metadata()?.len();
    }

    Ok(summary)
}

/// Human-readable byte count
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.2} {}", value, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_summarize_empty_directory() -> std::io::Result<()> {
        let temp_dir = TempDir::new()?;
        assert_eq!(summarize(temp_dir.path())?, TreeSummary::default());
        Ok(())
    }

    #[test]
    fn test_summarize_nested_tree() -> std::io::Result<()> {
        let temp_dir = TempDir::new()?;

        fs::create_dir_all(temp_dir.path().join("filestore/prod/ab"))?;
        fs::write(temp_dir.path().join("metadata.json"), b"12345")?;     // 5 bytes
        fs::write(temp_dir.path().join("filestore/prod/ab/f1"), b"1234567")?; // 7 bytes

        let summary = summarize(temp_dir.path())?;
        assert_eq!(summary.files, 2);
        assert_eq!(summary.bytes, 12);

        Ok(())
    }

    #[test]
    fn test_summarize_missing_root() {
        assert!(summarize(Path::new("/nonexistent/odoo-backup-root")).is_err());
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.00 MB");
    }
}

//! Odoo Backup - Main entry point

use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand};
use odoo_backup::fs::walker::format_bytes;
use odoo_backup::rpc::OdooRpc;
use odoo_backup::tools::{CpCopier, PgDump, TarArchiver};
use odoo_backup::{utils, BackupExecutor, BackupJob, Config};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Backup Odoo container, including the database, filestore, and addons.
    ///
    /// Creates a tar.gz archive named after the database and today's date.
    Backup(BackupArgs),
}

#[derive(Args, Debug)]
struct BackupArgs {
    /// Database name
    #[arg(long)]
    db: String,

    /// Backup directory [default: /tmp/odoo-backup]
    #[arg(long, value_name = "DIR")]
    backup_dir: Option<PathBuf>,

    /// Addons directory [default: /mnt/extra-addons]
    #[arg(long, value_name = "DIR")]
    addons_dir: Option<PathBuf>,

    /// Delete backup folder after creating the archive [default: true]
    #[arg(long, value_name = "BOOL", num_args = 0..=1, default_missing_value = "true")]
    rm_backup_dir: Option<bool>,

    /// Odoo server URL [default: http://localhost:8069]
    #[arg(long, value_name = "URL")]
    odoo_url: Option<String>,

    /// Directory holding per-database filestores [default: /var/lib/odoo/filestore]
    #[arg(long, value_name = "DIR")]
    filestore_dir: Option<PathBuf>,

    /// Sort addon names in metadata.json
    #[arg(long)]
    sort_addons: bool,

    /// Kill pg_dump, cp or tar if one runs longer than this
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,
}

impl BackupArgs {
    /// Command-line flags win over the config file.
    fn apply(&self, config: &mut Config) {
        if let Some(dir) = &self.backup_dir {
            config.paths.backup_dir = dir.clone();
        }
        if let Some(dir) = &self.addons_dir {
            config.paths.addons_dir = dir.clone();
        }
        if let Some(dir) = &self.filestore_dir {
            config.paths.filestore_root = dir.clone();
        }
        if let Some(url) = &self.odoo_url {
            config.odoo.url = url.clone();
        }
        if let Some(remove) = self.rm_backup_dir {
            config.backup.remove_staging = remove;
        }
        if self.sort_addons {
            config.backup.sort_addons = true;
        }
        if let Some(secs) = self.timeout {
            config.tools.timeout_secs = Some(secs);
        }
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        // Library errors already carry their cause in the message
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    // HOST/PORT/USER/PASSWORD may come from a .env file
    let _ = dotenvy::dotenv();

    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)
            .map_err(|e| anyhow!("loading config {}: {}", path.display(), e))?,
        None => Config::default(),
    };

    let log_level = cli.log_level.as_deref().unwrap_or(&config.log.level);
    utils::logger::init(log_level)?;

    match cli.command {
        Command::Backup(args) => {
            args.apply(&mut config);
            backup(&args.db, &config).await
        }
    }
}

async fn backup(db_name: &str, config: &Config) -> Result<()> {
    let job = BackupJob::from_config(db_name, config)?;

    tracing::info!(
        "Starting odoo-backup v{} (server: {})",
        env!("CARGO_PKG_VERSION"),
        config.odoo.url
    );

    let timeout = config.tool_timeout();
    let executor = BackupExecutor::new(
        Box::new(OdooRpc::new(&config.odoo.url, config.rpc_timeout())?),
        Box::new(PgDump::new(config.tools.pg_dump.clone(), timeout)),
        Box::new(CpCopier::new(config.tools.cp.clone(), timeout)),
        Box::new(TarArchiver::new(config.tools.tar.clone(), timeout)),
    );

    let result = executor.execute(&job).await?;

    println!();
    println!("Odoo backup completed successfully!");
    println!("  Archive:  {}", result.archive_path.display());
    if let Some(staging) = &result.staging_path {
        println!("  Staging:  {}", staging.display());
    }
    println!(
        "  Contents: {} files, {} (Odoo {}, {} addons)",
        result.staged_files,
        format_bytes(result.staged_bytes),
        result.manifest.odoo_version,
        result.manifest.addons.len()
    );
    println!("  Duration: {:.1}s", result.duration.as_secs_f64());
    println!();
    println!("[NOTE]: You can copy the archive file to your local machine using:");
    println!("docker cp <container_id>:{} .", result.archive_path.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["odoo-backup", "backup", "--db", "prod"]).unwrap();
        let Command::Backup(args) = cli.command;

        let mut config = Config::default();
        args.apply(&mut config);
        assert!(config.backup.remove_staging);
        assert_eq!(config.paths.backup_dir, PathBuf::from("/tmp/odoo-backup"));
        assert_eq!(config.paths.addons_dir, PathBuf::from("/mnt/extra-addons"));
    }

    #[test]
    fn test_cli_overrides() {
        let cli = Cli::try_parse_from([
            "odoo-backup",
            "backup",
            "--db",
            "prod",
            "--backup-dir",
            "/srv/backups",
            "--rm-backup-dir",
            "false",
            "--sort-addons",
            "--timeout",
            "900",
        ])
        .unwrap();
        let Command::Backup(args) = cli.command;

        let mut config = Config::default();
        args.apply(&mut config);
        assert_eq!(args.db, "prod");
        assert_eq!(config.paths.backup_dir, PathBuf::from("/srv/backups"));
        assert!(!config.backup.remove_staging);
        assert!(config.backup.sort_addons);
        assert_eq!(config.tools.timeout_secs, Some(900));
    }

    #[test]
    fn test_rm_backup_dir_forms() {
        for (flag, expected) in [
            (vec!["--rm-backup-dir=false"], false),
            (vec!["--rm-backup-dir"], true),
        ] {
            let mut argv = vec!["odoo-backup", "backup", "--db", "prod"];
            argv.extend(flag);
            let cli = Cli::try_parse_from(argv).unwrap();
            let Command::Backup(args) = cli.command;
            assert_eq!(args.rm_backup_dir, Some(expected));
        }
    }

    #[test]
    fn test_db_is_required() {
        assert!(Cli::try_parse_from(["odoo-backup", "backup"]).is_err());
    }
}

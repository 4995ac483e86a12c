//! Odoo Backup Library
//!
//! Backs up an Odoo server's database, filestore and addons into a single
//! timestamped archive, shelling out to `pg_dump`, `cp` and `tar`.

pub mod config;
pub mod executor;
pub mod fs;
pub mod rpc;
pub mod tools;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use executor::{BackupExecutor, BackupJob, BackupResult};
pub use utils::errors::{BackupError, BackupStep};
pub type Result<T> = std::result::Result<T, BackupError>;

//! PostgreSQL dump via the external `pg_dump` utility.

use super::{display_command, resolve_program, run_tool, stderr_tail, DatabaseDumper};
use crate::utils::errors::{BackupError, Result};
use async_trait::async_trait;
use std::ffi::OsString;
use std::fmt;
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;
use tracing::info;

pub const ENV_HOST: &str = "HOST";
pub const ENV_PORT: &str = "PORT";
pub const ENV_USER: &str = "USER";
pub const ENV_PASSWORD: &str = "PASSWORD";

/// Variable pg_dump reads the password from
const PGPASSWORD: &str = "PGPASSWORD";

type EnvLookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Connection settings for the dump. All four are required.
#[derive(Clone)]
pub struct DbCredentials {
    pub host: String,
    pub port: String,
    pub user: String,
    pub password: String,
}

impl DbCredentials {
    /// Read `HOST`, `PORT`, `USER` and `PASSWORD` through `lookup`.
    /// Unset and empty values are both missing; every missing name is reported.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut missing = Vec::new();
        let mut get = |key: &str| match lookup(key).filter(|v| !v.is_empty()) {
            Some(value) => value,
            None => {
                missing.push(key.to_string());
                String::new()
            }
        };

        let credentials = Self {
            host: get(ENV_HOST),
            port: get(ENV_PORT),
            user: get(ENV_USER),
            password: get(ENV_PASSWORD),
        };

        if missing.is_empty() {
            Ok(credentials)
        } else {
            Err(BackupError::MissingConfig(missing))
        }
    }
}

impl fmt::Debug for DbCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbCredentials")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// [`DatabaseDumper`] backed by `pg_dump` in custom format.
pub struct PgDump {
    program: String,
    timeout: Option<Duration>,
    lookup: EnvLookup,
}

impl PgDump {
    /// Credentials are read from the process environment when the dump runs.
    pub fn new(program: impl Into<String>, timeout: Option<Duration>) -> Self {
        Self {
            program: program.into(),
            timeout,
            lookup: Box::new(|key: &str| std::env::var(key).ok()),
        }
    }

    /// Read credentials through `lookup` instead of the process environment.
    pub fn with_env_lookup<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.lookup = Box::new(lookup);
        self
    }
}

#[async_trait]
impl DatabaseDumper for PgDump {
    async fn dump(&self, db_name: &str, output: &Path) -> Result<()> {
        info!("Dumping database: {}", db_name);

        // Positional, so a leading '-' would be parsed as a pg_dump option
        if db_name.starts_with('-') {
            return Err(BackupError::Config(format!(
                "database name {:?} must not start with '-'",
                db_name
            )));
        }

        let credentials = DbCredentials::from_lookup(&self.lookup)?;
        info!(
            "HOST: {}, PORT: {}, USER: {}",
            credentials.host, credentials.port, credentials.user
        );

        let program = resolve_program(&self.program)?;

        let args: Vec<OsString> = vec![
            "-h".into(),
            credentials.host.clone().into(),
            "-p".into(),
            credentials.port.clone().into(),
            "-U".into(),
            credentials.user.clone().into(),
            "-F".into(),
            "c".into(),
            "-f".into(),
            output.as_os_str().to_owned(),
            db_name.into(),
        ];
        info!("Executing command: {}", display_command(&self.program, &args));

        let mut cmd = Command::new(&program);
        cmd.args(&args).env(PGPASSWORD, &credentials.password);

        let result = run_tool(&self.program, cmd, self.timeout).await?;
        if !result.status.success() {
            return Err(BackupError::DumpExecution {
                status: result.status.to_string(),
                stderr: stderr_tail(&result),
            });
        }

        info!("Database dumped successfully to: {}", output.display());
        Ok(())
    }
}

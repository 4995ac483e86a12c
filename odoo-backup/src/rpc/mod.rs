//! Odoo server version lookup over XML-RPC.

pub mod xmlrpc;

use crate::utils::errors::{BackupError, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;
use xmlrpc::{Response, Value};

/// Path of Odoo's unauthenticated "common" service.
const COMMON_ENDPOINT: &str = "/xmlrpc/2/common";

/// Source of the server version recorded in the manifest.
#[async_trait]
pub trait VersionResolver: Send + Sync {
    async fn server_version(&self) -> Result<String>;
}

/// XML-RPC client for an Odoo server.
pub struct OdooRpc {
    client: reqwest::Client,
    endpoint: String,
}

impl OdooRpc {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackupError::VersionQuery(format!("cannot build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}{}", base_url.trim_end_matches('/'), COMMON_ENDPOINT),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn call(&self, method: &str) -> Result<Value> {
        debug!("XML-RPC call {} on {}", method, self.endpoint);

        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "text/xml")
            .body(xmlrpc::encode_call(method))
            .send()
            .await
            .map_err(|e| BackupError::VersionQuery(format!("{}: {e}", self.endpoint)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BackupError::VersionQuery(format!(
                "HTTP {} from {}",
                status, self.endpoint
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| BackupError::VersionQuery(format!("reading response: {e}")))?;

        match xmlrpc::parse_response(&body).map_err(|e| BackupError::VersionQuery(e.to_string()))? {
            Response::Success(value) => Ok(value),
            Response::Fault { code, message } => Err(BackupError::VersionQuery(format!(
                "server fault {code}: {message}"
            ))),
        }
    }
}

#[async_trait]
impl VersionResolver for OdooRpc {
    async fn server_version(&self) -> Result<String> {
        let info = self.call("version").await?;
        match info.member("server_version") {
            Some(Value::String(version)) => Ok(version.clone()),
            Some(other) => Err(BackupError::VersionQuery(format!(
                "server_version is not a string: {other:?}"
            ))),
            None => Err(BackupError::VersionQuery(
                "server_version not found in response".to_string(),
            )),
        }
    }
}

use std::path::PathBuf;
use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Coordinates of the watched custom resource collection and the fallback
/// API server endpoint used outside the cluster.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StoreConfig {
    /// Default: "traefik.containo.us"
    #[serde(default = "default_group")]
    pub group: String,

    /// Default: "v1alpha1"
    #[serde(default = "default_version")]
    pub version: String,

    /// Default: "kube-system"
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Default: "traefikservices"
    #[serde(default = "default_plural")]
    pub plural: String,

    /// API server URL used when no in-cluster service account is mounted,
    /// e.g. "https://127.0.0.1:6443"
    #[serde(default)]
    pub api_server: Option<String>,

    /// Bearer token file for `api_server`
    #[serde(default)]
    pub token_file: Option<PathBuf>,

    /// PEM bundle trusted for `api_server`
    #[serde(default)]
    pub ca_file: Option<PathBuf>,

    /// Skip certificate verification (development clusters only)
    /// Default: false
    #[serde(default)]
    pub accept_invalid_certs: bool,

    /// Timeout for get/list/replace requests. Watches are not bounded by it.
    /// Default: 10000ms
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            group: default_group(),
            version: default_version(),
            namespace: default_namespace(),
            plural: default_plural(),
            api_server: None,
            token_file: None,
            ca_file: None,
            accept_invalid_certs: false,
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl StoreConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Path of the collection, relative to the API server root.
    pub fn collection_path(&self) -> String {
        format!(
            "/apis/{}/{}/namespaces/{}/{}",
            self.group, self.version, self.namespace, self.plural
        )
    }

    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("group", &self.group),
            ("version", &self.version),
            ("namespace", &self.namespace),
            ("plural", &self.plural),
        ] {
            if value.trim().is_empty() {
                return Err(Error::Config(ConfigError::Message(format!(
                    "store.{field} must not be empty"
                ))));
            }
        }

        if let Some(server) = &self.api_server {
            if !server.starts_with("http://") && !server.starts_with("https://") {
                return Err(Error::Config(ConfigError::Message(format!(
                    "store.api_server {server} must start with http:// or https://"
                ))));
            }
        }

        if self.request_timeout_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "store.request_timeout_ms must be greater than 0".into(),
            )));
        }

        Ok(())
    }
}

fn default_group() -> String {
    "traefik.containo.us".into()
}
fn default_version() -> String {
    "v1alpha1".into()
}
fn default_namespace() -> String {
    "kube-system".into()
}
fn default_plural() -> String {
    "traefikservices".into()
}
fn default_request_timeout_ms() -> u64 {
    10_000
}

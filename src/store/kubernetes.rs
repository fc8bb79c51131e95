//! [`ResourceStore`] backed by the Kubernetes custom-objects REST API.
//!
//! Credentials are resolved lazily: the in-cluster service account is tried
//! first, then the `store.api_server` settings. Until one of them yields a
//! client every call fails with [`StoreError::Unavailable`].

use std::env;
use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures::future;
use futures::StreamExt;
use futures::TryStreamExt;
use parking_lot::Mutex;
use reqwest::Certificate;
use reqwest::RequestBuilder;
use reqwest::Response;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use tokio_util::codec::FramedRead;
use tokio_util::codec::LinesCodec;
use tokio_util::io::StreamReader;
use tracing::debug;
use tracing::info;

use super::ChangeKind;
use super::RawChangeEvent;
use super::ResourceStore;
use super::StoreResult;
use super::WatchStream;
use crate::StoreConfig;
use crate::StoreError;

const SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";
const MAX_WATCH_LINE_BYTES: usize = 16 * 1024 * 1024;

#[derive(Clone)]
struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    fn in_cluster() -> StoreResult<Self> {
        let host = env::var("KUBERNETES_SERVICE_HOST")
            .map_err(|_| StoreError::Unavailable("KUBERNETES_SERVICE_HOST not set".into()))?;
        let port = env::var("KUBERNETES_SERVICE_PORT").unwrap_or_else(|_| "443".into());
        let dir = Path::new(SERVICE_ACCOUNT_DIR);

        let token = read_trimmed(&dir.join("token"))?;
        let ca = fs::read(dir.join("ca.crt"))
            .map_err(|e| StoreError::Unavailable(format!("service account CA: {e}")))?;
        let ca = Certificate::from_pem(&ca)
            .map_err(|e| StoreError::Unavailable(format!("service account CA: {e}")))?;

        let http = reqwest::Client::builder()
            .add_root_certificate(ca)
            .build()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        // IPv6 service hosts need brackets
        let host = if host.contains(':') { format!("[{host}]") } else { host };
        Ok(Self {
            http,
            base_url: format!("https://{host}:{port}"),
            token: Some(token),
        })
    }

    fn from_settings(config: &StoreConfig) -> StoreResult<Self> {
        let server = config.api_server.as_ref().ok_or_else(|| {
            StoreError::Unavailable("not running in cluster and store.api_server is not set".into())
        })?;

        let mut builder =
            reqwest::Client::builder().danger_accept_invalid_certs(config.accept_invalid_certs);
        if let Some(ca_file) = &config.ca_file {
            let pem = fs::read(ca_file)
                .map_err(|e| StoreError::Unavailable(format!("{}: {e}", ca_file.display())))?;
            let ca = Certificate::from_pem(&pem)
                .map_err(|e| StoreError::Unavailable(format!("{}: {e}", ca_file.display())))?;
            builder = builder.add_root_certificate(ca);
        }
        let http = builder
            .build()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let token = config.token_file.as_deref().map(read_trimmed).transpose()?;

        Ok(Self {
            http,
            base_url: server.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn request(
        &self,
        method: reqwest::Method,
        path: &str,
    ) -> RequestBuilder {
        let request = self.http.request(method, format!("{}{}", self.base_url, path));
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

fn read_trimmed(path: &Path) -> StoreResult<String> {
    fs::read_to_string(path)
        .map(|s| s.trim().to_string())
        .map_err(|e| StoreError::Unavailable(format!("{}: {e}", path.display())))
}

pub struct KubeStore {
    config: StoreConfig,
    client: Mutex<Option<ApiClient>>,
}

impl KubeStore {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            client: Mutex::new(None),
        }
    }

    /// Returns the cached client, building it on first success.
    fn client(&self) -> StoreResult<ApiClient> {
        let mut guard = self.client.lock();
        if let Some(client) = guard.as_ref() {
            return Ok(client.clone());
        }

        let client = match ApiClient::in_cluster() {
            Ok(client) => {
                info!("Loaded in-cluster Kubernetes credentials");
                client
            }
            Err(e) => {
                debug!("In-cluster credentials unavailable: {}", e);
                let client = ApiClient::from_settings(&self.config)?;
                info!(api_server = %client.base_url, "Loaded Kubernetes credentials from settings");
                client
            }
        };

        *guard = Some(client.clone());
        Ok(client)
    }

    fn item_path(
        &self,
        name: &str,
    ) -> String {
        format!("{}/{}", self.config.collection_path(), name)
    }
}

#[async_trait]
impl ResourceStore for KubeStore {
    fn is_ready(&self) -> bool {
        self.client.lock().is_some()
    }

    async fn get(
        &self,
        name: &str,
    ) -> StoreResult<Value> {
        let client = self.client()?;
        let response = client
            .request(reqwest::Method::GET, &self.item_path(name))
            .timeout(self.config.request_timeout())
            .send()
            .await?;
        Ok(check_status(response, name).await?.json().await?)
    }

    async fn list(&self) -> StoreResult<Vec<Value>> {
        let client = self.client()?;
        let response = client
            .request(reqwest::Method::GET, &self.config.collection_path())
            .timeout(self.config.request_timeout())
            .send()
            .await?;
        let body: Value = check_status(response, &self.config.plural).await?.json().await?;
        match body.get("items") {
            Some(Value::Array(items)) => Ok(items.clone()),
            Some(_) => Err(StoreError::Protocol("list items is not an array".into())),
            None => Ok(Vec::new()),
        }
    }

    async fn replace(
        &self,
        name: &str,
        resource: Value,
    ) -> StoreResult<Value> {
        let client = self.client()?;
        let response = client
            .request(reqwest::Method::PUT, &self.item_path(name))
            .timeout(self.config.request_timeout())
            .json(&resource)
            .send()
            .await?;
        Ok(check_status(response, name).await?.json().await?)
    }

    async fn watch(
        &self,
        resume_token: &str,
        timeout_hint: Option<Duration>,
    ) -> StoreResult<WatchStream> {
        let client = self.client()?;
        let mut query = vec![("watch", "true".to_string())];
        if !resume_token.is_empty() {
            query.push(("resourceVersion", resume_token.to_string()));
        }
        if let Some(timeout) = timeout_hint {
            query.push(("timeoutSeconds", timeout.as_secs().to_string()));
        }

        let response = client
            .request(reqwest::Method::GET, &self.config.collection_path())
            .query(&query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let reason = response.text().await.unwrap_or_default();
            return Err(StoreError::Subscription {
                status: status.as_u16(),
                reason,
            });
        }

        let body = response
            .bytes_stream()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e));
        let lines = FramedRead::new(
            StreamReader::new(body),
            LinesCodec::new_with_max_length(MAX_WATCH_LINE_BYTES),
        );

        Ok(lines
            .filter_map(|line| {
                future::ready(match line {
                    Ok(line) if line.trim().is_empty() => None,
                    Ok(line) => Some(decode_watch_line(&line)),
                    Err(e) => Some(Err(StoreError::Transport(e.to_string()))),
                })
            })
            .boxed())
    }
}

async fn check_status(
    response: Response,
    name: &str,
) -> StoreResult<Response> {
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Err(StoreError::NotFound(name.to_string()));
    }
    if !status.is_success() {
        let reason = response.text().await.unwrap_or_default();
        return Err(StoreError::Api {
            status: status.as_u16(),
            reason,
        });
    }
    Ok(response)
}

#[derive(Deserialize)]
struct WatchLine {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    object: Value,
}

/// Decodes one line of a watch response body.
///
/// `ERROR` lines carry a `Status` object and become
/// [`StoreError::Subscription`].
pub(crate) fn decode_watch_line(line: &str) -> StoreResult<RawChangeEvent> {
    let parsed: WatchLine = serde_json::from_str(line)
        .map_err(|e| StoreError::Protocol(format!("undecodable watch line: {e}")))?;

    if parsed.kind == "ERROR" {
        let status = parsed.object.get("code").and_then(Value::as_u64).unwrap_or(0) as u16;
        let reason = parsed
            .object
            .get("message")
            .or_else(|| parsed.object.get("reason"))
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        return Err(StoreError::Subscription { status, reason });
    }

    let kind = ChangeKind::parse(&parsed.kind)
        .ok_or_else(|| StoreError::Protocol(format!("unexpected watch event type {}", parsed.kind)))?;

    let metadata = parsed.object.get("metadata");
    let field = |key: &str| {
        metadata
            .and_then(|m| m.get(key))
            .and_then(Value::as_str)
            .map(str::to_string)
    };

    Ok(RawChangeEvent {
        kind,
        name: field("name").unwrap_or_else(|| "unknown".into()),
        resume_token: field("resourceVersion").unwrap_or_default(),
        spec: parsed.object.get("spec").cloned().unwrap_or(Value::Null),
    })
}

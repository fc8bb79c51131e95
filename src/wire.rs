//! JSON payloads pushed to observers and returned by the REST API.

use chrono::SecondsFormat;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

/// Message pushed over an observer connection.
///
/// Serializes as `{"type": "full" | "update" | "echo", "data": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum BroadcastMessage {
    /// Initial snapshot or any non-MODIFIED change
    Full(Vec<ServiceView>),
    /// MODIFIED change
    Update(Vec<ServiceView>),
    /// Reply to an inbound observer message
    Echo(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Online,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceView {
    pub service: String,
    pub status: ServiceStatus,
    pub backends: Vec<BackendView>,
    pub total_traffic: String,
    pub updated_at: String,
}

/// A weighted backend. Fields missing from the stored entry stay `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendView {
    pub name: Option<String>,
    /// Stored `weight`, passed through as-is whatever its JSON type
    pub ratio: Option<Value>,
    pub namespace: Option<String>,
    pub port: Option<PortRef>,
}

/// Service port, either numeric or named
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PortRef {
    Number(u16),
    Name(String),
}

impl PortRef {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()).map(PortRef::Number),
            Value::String(s) => Some(PortRef::Name(s.clone())),
            _ => None,
        }
    }
}

impl BackendView {
    /// Reads one entry of `spec.weighted.services`; `weight` becomes `ratio`.
    pub fn from_entry(entry: &Value) -> Self {
        Self {
            name: entry.get("name").and_then(Value::as_str).map(str::to_string),
            ratio: entry.get("weight").cloned(),
            namespace: entry.get("namespace").and_then(Value::as_str).map(str::to_string),
            port: entry.get("port").and_then(PortRef::from_value),
        }
    }
}

impl ServiceView {
    /// Builds the view of one resource from its `spec`.
    ///
    /// A spec without a weighted section yields an empty backend list.
    pub fn from_spec(
        service: impl Into<String>,
        spec: &Value,
        updated_at: String,
    ) -> Self {
        let backends = spec
            .get("weighted")
            .and_then(|weighted| weighted.get("services"))
            .and_then(Value::as_array)
            .map(|entries| entries.iter().map(BackendView::from_entry).collect())
            .unwrap_or_default();

        Self {
            service: service.into(),
            status: ServiceStatus::Online,
            backends,
            total_traffic: "100".into(),
            updated_at,
        }
    }
}

/// Response of the service list endpoint, also sent to every new observer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceListResponse {
    pub code: u16,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub data: Vec<ServiceView>,
}

impl ServiceListResponse {
    pub fn full(data: Vec<ServiceView>) -> Self {
        Self {
            code: 200,
            message: "success".into(),
            kind: "full".into(),
            data,
        }
    }
}

/// Current time as an ISO-8601 timestamp.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

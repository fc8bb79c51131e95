use serde::Deserialize;
use serde::Serialize;
use serde_json::json;
use serde_json::Value;
use tracing::info;

use crate::wire::PortRef;
use crate::Error;
use crate::ResourceStore;
use crate::Result;
use crate::StoreError;

/// Ratios of a split must add up to exactly this.
const TOTAL_RATIO: u64 = 100;

/// Body of the traffic update endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficConfigRequest {
    pub service_name: String,
    pub backends: Vec<BackendSplit>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendSplit {
    pub name: String,
    pub namespace: String,
    /// Share of traffic in whole percent; fractional or negative input is
    /// rejected at deserialization.
    pub ratio: u32,
    pub port: PortRef,
}

/// Rejects splits that cannot be applied: no backends, unnamed backends or
/// ratios not summing to 100.
pub fn validate_split(request: &TrafficConfigRequest) -> Result<()> {
    if request.service_name.trim().is_empty() {
        return Err(Error::Validation("service_name must not be empty".into()));
    }
    if request.backends.is_empty() {
        return Err(Error::Validation("at least one backend is required".into()));
    }
    if let Some(backend) = request.backends.iter().find(|b| b.name.trim().is_empty()) {
        return Err(Error::Validation(format!(
            "backend name must not be empty (namespace {})",
            backend.namespace
        )));
    }

    let total: u64 = request.backends.iter().map(|b| u64::from(b.ratio)).sum();
    if total != TOTAL_RATIO {
        return Err(Error::Validation(format!(
            "backend ratios must sum to 100, got {}",
            total
        )));
    }
    Ok(())
}

/// The `spec` written for a split; each ratio becomes the backend weight.
pub fn weighted_spec_for(backends: &[BackendSplit]) -> Value {
    let services: Vec<Value> = backends
        .iter()
        .map(|b| {
            json!({
                "name": b.name,
                "namespace": b.namespace,
                "port": b.port,
                "weight": b.ratio,
            })
        })
        .collect();
    json!({ "weighted": { "services": services } })
}

/// Replaces the weighted section of the named resource with `request`.
pub async fn apply_traffic_split(
    store: &dyn ResourceStore,
    request: &TrafficConfigRequest,
) -> Result<()> {
    validate_split(request)?;

    let mut resource = store.get(&request.service_name).await?;
    let object = resource.as_object_mut().ok_or_else(|| {
        StoreError::Protocol(format!("resource {} is not an object", request.service_name))
    })?;
    object.insert("spec".into(), weighted_spec_for(&request.backends));

    store.replace(&request.service_name, resource).await?;
    info!(
        resource = %request.service_name,
        backends = request.backends.len(),
        "Traffic split applied"
    );
    Ok(())
}

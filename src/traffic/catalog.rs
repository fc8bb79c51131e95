use serde_json::Value;
use tracing::debug;
use tracing::warn;

use crate::now_timestamp;
use crate::wire::BackendView;
use crate::wire::ServiceListResponse;
use crate::wire::ServiceStatus;
use crate::ResourceStore;
use crate::ServiceView;

/// Lists every resource as a service view.
///
/// Falls back to [`fallback_services`] when the store cannot be reached, so
/// the dashboard always has something to render.
pub async fn list_services(store: &dyn ResourceStore) -> ServiceListResponse {
    match store.list().await {
        Ok(items) => {
            let services: Vec<ServiceView> = items.iter().map(service_view_of).collect();
            debug!(count = services.len(), "Listed services");
            ServiceListResponse::full(services)
        }
        Err(e) => {
            warn!("Failed to list services, serving fallback data: {}", e);
            ServiceListResponse::full(fallback_services())
        }
    }
}

fn service_view_of(item: &Value) -> ServiceView {
    let metadata = item.get("metadata");
    let name = metadata
        .and_then(|m| m.get("name"))
        .and_then(Value::as_str)
        .unwrap_or("unknown");
    let updated_at = metadata
        .and_then(|m| m.get("creationTimestamp"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(now_timestamp);

    ServiceView::from_spec(name, item.get("spec").unwrap_or(&Value::Null), updated_at)
}

/// Static demo data served when the cluster is unreachable.
pub fn fallback_services() -> Vec<ServiceView> {
    let backend = |name: &str, ratio: u32| BackendView {
        name: Some(name.to_string()),
        ratio: Some(Value::from(ratio)),
        namespace: None,
        port: None,
    };

    vec![ServiceView {
        service: "web-service".into(),
        status: ServiceStatus::Online,
        backends: vec![backend("backend-1", 60), backend("backend-2", 30), backend("backend-3", 10)],
        total_traffic: "100".into(),
        updated_at: now_timestamp(),
    }]
}

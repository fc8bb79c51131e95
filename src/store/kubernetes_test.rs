use std::collections::HashMap;
use std::net::SocketAddr;

use futures::StreamExt;
use serde_json::json;
use serial_test::serial;
use warp::Filter;

use super::*;
use crate::StoreConfig;
use crate::StoreError;

fn settings_for(addr: Option<SocketAddr>) -> StoreConfig {
    StoreConfig {
        api_server: addr.map(|a| format!("http://{a}")),
        ..StoreConfig::default()
    }
}

/// Fake API server answering list and watch on the default collection.
async fn spawn_api_server(watch_body: &'static str) -> SocketAddr {
    let collection = warp::path!("apis" / "traefik.containo.us" / "v1alpha1" / "namespaces" / "kube-system" / "traefikservices")
        .and(warp::get())
        .and(warp::query::<HashMap<String, String>>())
        .map(move |query: HashMap<String, String>| {
            if query.get("watch").map(String::as_str) == Some("true") {
                watch_body.to_string()
            } else {
                json!({"items": [{"metadata": {"name": "svc-a"}, "spec": {}}]}).to_string()
            }
        });
    let item = warp::path!("apis" / "traefik.containo.us" / "v1alpha1" / "namespaces" / "kube-system" / "traefikservices" / String)
        .and(warp::get())
        .map(|name: String| {
            warp::reply::with_status(
                json!({"kind": "Status", "code": 404, "message": name}).to_string(),
                warp::http::StatusCode::NOT_FOUND,
            )
        });

    let (addr, server) = warp::serve(collection.or(item)).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);
    addr
}

#[test]
fn decode_watch_line_should_extract_metadata_and_spec() {
    let line = r#"{"type":"MODIFIED","object":{"metadata":{"name":"svc-a","resourceVersion":"101"},"spec":{"weighted":{"services":[]}}}}"#;

    let event = decode_watch_line(line).unwrap();

    assert_eq!(event.kind, ChangeKind::Modified);
    assert_eq!(event.name, "svc-a");
    assert_eq!(event.resume_token, "101");
    assert_eq!(event.spec, json!({"weighted": {"services": []}}));
}

#[test]
fn decode_watch_line_should_default_missing_fields() {
    let event = decode_watch_line(r#"{"type":"DELETED","object":{}}"#).unwrap();

    assert_eq!(event.name, "unknown");
    assert_eq!(event.resume_token, "");
    assert_eq!(event.spec, Value::Null);
}

#[test]
fn decode_watch_line_should_turn_error_status_into_subscription_error() {
    let line = r#"{"type":"ERROR","object":{"kind":"Status","code":410,"reason":"Expired","message":"too old resource version"}}"#;

    match decode_watch_line(line) {
        Err(StoreError::Subscription { status, reason }) => {
            assert_eq!(status, 410);
            assert_eq!(reason, "too old resource version");
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn decode_watch_line_should_reject_unknown_types_and_garbage() {
    assert!(matches!(
        decode_watch_line(r#"{"type":"BOOKMARK","object":{}}"#),
        Err(StoreError::Protocol(_))
    ));
    assert!(matches!(decode_watch_line("not json"), Err(StoreError::Protocol(_))));
}

#[tokio::test]
#[serial]
async fn store_without_credentials_should_be_unavailable() {
    std::env::remove_var("KUBERNETES_SERVICE_HOST");
    let store = KubeStore::new(settings_for(None));

    assert!(!store.is_ready());
    assert!(matches!(store.list().await, Err(StoreError::Unavailable(_))));
    assert!(matches!(store.watch("", None).await, Err(StoreError::Unavailable(_))));
    assert!(!store.is_ready());
}

#[tokio::test]
#[serial]
async fn watch_should_stream_events_until_body_ends() {
    std::env::remove_var("KUBERNETES_SERVICE_HOST");
    let body = concat!(
        r#"{"type":"ADDED","object":{"metadata":{"name":"svc-a","resourceVersion":"100"},"spec":{}}}"#,
        "\n\n",
        r#"{"type":"MODIFIED","object":{"metadata":{"name":"svc-a","resourceVersion":"101"},"spec":{}}}"#,
        "\n",
    );
    let addr = spawn_api_server(body).await;
    let store = KubeStore::new(settings_for(Some(addr)));

    let events: Vec<_> = store.watch("", None).await.unwrap().collect().await;

    assert!(store.is_ready());
    assert_eq!(events.len(), 2);
    let tokens: Vec<_> = events
        .into_iter()
        .map(|e| e.unwrap().resume_token)
        .collect();
    assert_eq!(tokens, vec!["100", "101"]);
}

#[tokio::test]
#[serial]
async fn list_and_get_should_map_responses() {
    std::env::remove_var("KUBERNETES_SERVICE_HOST");
    let addr = spawn_api_server("").await;
    let store = KubeStore::new(settings_for(Some(addr)));

    let items = store.list().await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["metadata"]["name"], "svc-a");

    assert!(matches!(store.get("missing").await, Err(StoreError::NotFound(name)) if name == "missing"));
}

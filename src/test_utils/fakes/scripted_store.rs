use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream;
use futures::StreamExt;
use parking_lot::Mutex;
use serde_json::json;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::ChangeKind;
use crate::RawChangeEvent;
use crate::ResourceStore;
use crate::StoreError;
use crate::StoreResult;
use crate::WatchStream;

/// What one call to `watch` produces
pub enum WatchSession {
    /// Client not ready
    Unavailable,
    /// Request answered with an error before streaming
    Rejected(StoreError),
    /// Yields `events`, then ends cleanly or with `end`
    Events {
        events: Vec<RawChangeEvent>,
        end: Option<StoreError>,
    },
    /// Stays open without yielding until dropped
    Hang,
}

/// Store whose watch replays a fixed script of sessions.
///
/// Once the script is exhausted every watch reports `Unavailable` and, when
/// configured, cancels the given token so the supervisor stops.
pub struct ScriptedStore {
    sessions: Mutex<VecDeque<WatchSession>>,
    requested_tokens: Mutex<Vec<String>>,
    on_exhausted: Option<CancellationToken>,
    resources: Mutex<BTreeMap<String, Value>>,
    ready: AtomicBool,
    fail_requests: AtomicBool,
}

impl ScriptedStore {
    pub fn new(sessions: Vec<WatchSession>) -> Self {
        Self {
            sessions: Mutex::new(sessions.into()),
            requested_tokens: Mutex::new(Vec::new()),
            on_exhausted: None,
            resources: Mutex::new(BTreeMap::new()),
            ready: AtomicBool::new(true),
            fail_requests: AtomicBool::new(false),
        }
    }

    pub fn cancel_when_exhausted(
        mut self,
        token: CancellationToken,
    ) -> Self {
        self.on_exhausted = Some(token);
        self
    }

    pub fn with_resource(
        self,
        name: &str,
        resource: Value,
    ) -> Self {
        self.resources.lock().insert(name.to_string(), resource);
        self
    }

    /// get/list/replace fail with a transport error.
    pub fn failing_requests(self) -> Self {
        self.fail_requests.store(true, Ordering::SeqCst);
        self.ready.store(false, Ordering::SeqCst);
        self
    }

    pub fn requested_tokens(&self) -> Vec<String> {
        self.requested_tokens.lock().clone()
    }

    pub fn resource(
        &self,
        name: &str,
    ) -> Option<Value> {
        self.resources.lock().get(name).cloned()
    }

    fn check_requests(&self) -> StoreResult<()> {
        if self.fail_requests.load(Ordering::SeqCst) {
            return Err(StoreError::Transport("connection refused".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl ResourceStore for ScriptedStore {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn get(
        &self,
        name: &str,
    ) -> StoreResult<Value> {
        self.check_requests()?;
        self.resource(name).ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    async fn list(&self) -> StoreResult<Vec<Value>> {
        self.check_requests()?;
        Ok(self.resources.lock().values().cloned().collect())
    }

    async fn replace(
        &self,
        name: &str,
        resource: Value,
    ) -> StoreResult<Value> {
        self.check_requests()?;
        let mut resources = self.resources.lock();
        if !resources.contains_key(name) {
            return Err(StoreError::NotFound(name.to_string()));
        }
        resources.insert(name.to_string(), resource.clone());
        Ok(resource)
    }

    async fn watch(
        &self,
        resume_token: &str,
        _timeout_hint: Option<Duration>,
    ) -> StoreResult<WatchStream> {
        self.requested_tokens.lock().push(resume_token.to_string());

        let next = self.sessions.lock().pop_front();
        match next {
            None => {
                if let Some(token) = &self.on_exhausted {
                    token.cancel();
                }
                Err(StoreError::Unavailable("script exhausted".into()))
            }
            Some(WatchSession::Unavailable) => Err(StoreError::Unavailable("no credentials".into())),
            Some(WatchSession::Rejected(e)) => Err(e),
            Some(WatchSession::Events { events, end }) => Ok(stream::iter(
                events.into_iter().map(Ok).chain(end.map(Err)),
            )
            .boxed()),
            Some(WatchSession::Hang) => Ok(stream::pending().boxed()),
        }
    }
}

/// Store replaying a fixed change log keyed by numeric resume token.
///
/// Each watch serves at most `page` events newer than the requested token and
/// then ends, simulating a disconnect. An empty page cancels `on_caught_up`.
pub struct ReplayLogStore {
    log: Vec<RawChangeEvent>,
    page: usize,
    requested_tokens: Mutex<Vec<String>>,
    on_caught_up: CancellationToken,
}

impl ReplayLogStore {
    pub fn new(
        log: Vec<RawChangeEvent>,
        page: usize,
        on_caught_up: CancellationToken,
    ) -> Self {
        Self {
            log,
            page,
            requested_tokens: Mutex::new(Vec::new()),
            on_caught_up,
        }
    }

    pub fn requested_tokens(&self) -> Vec<String> {
        self.requested_tokens.lock().clone()
    }
}

#[async_trait]
impl ResourceStore for ReplayLogStore {
    fn is_ready(&self) -> bool {
        true
    }

    async fn get(
        &self,
        name: &str,
    ) -> StoreResult<Value> {
        Err(StoreError::NotFound(name.to_string()))
    }

    async fn list(&self) -> StoreResult<Vec<Value>> {
        Ok(Vec::new())
    }

    async fn replace(
        &self,
        name: &str,
        _resource: Value,
    ) -> StoreResult<Value> {
        Err(StoreError::NotFound(name.to_string()))
    }

    async fn watch(
        &self,
        resume_token: &str,
        _timeout_hint: Option<Duration>,
    ) -> StoreResult<WatchStream> {
        self.requested_tokens.lock().push(resume_token.to_string());

        let after: u64 = resume_token.parse().unwrap_or(0);
        let page: Vec<_> = self
            .log
            .iter()
            .filter(|e| e.resume_token.parse::<u64>().unwrap_or(0) > after)
            .take(self.page)
            .cloned()
            .collect();

        if page.is_empty() {
            self.on_caught_up.cancel();
        }
        Ok(stream::iter(page.into_iter().map(Ok)).boxed())
    }
}

pub fn raw_event(
    kind: ChangeKind,
    name: &str,
    token: &str,
    spec: Value,
) -> RawChangeEvent {
    RawChangeEvent {
        kind,
        name: name.to_string(),
        resume_token: token.to_string(),
        spec,
    }
}

/// `spec` with a weighted section listing `(name, weight, namespace, port)`.
pub fn weighted_spec(backends: &[(&str, u64, &str, u16)]) -> Value {
    let services: Vec<Value> = backends
        .iter()
        .map(|(name, weight, namespace, port)| {
            json!({"name": name, "weight": weight, "namespace": namespace, "port": port})
        })
        .collect();
    json!({"weighted": {"services": services}})
}

/// A stored TraefikService resource as returned by get/list.
pub fn stored_resource(
    name: &str,
    spec: Value,
) -> Value {
    json!({
        "apiVersion": "traefik.containo.us/v1alpha1",
        "kind": "TraefikService",
        "metadata": {
            "name": name,
            "namespace": "kube-system",
            "resourceVersion": "100",
            "creationTimestamp": "2024-05-01T10:00:00Z"
        },
        "spec": spec
    })
}

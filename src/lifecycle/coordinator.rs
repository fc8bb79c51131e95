use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::now_timestamp;
use crate::ConnectionRegistry;
use crate::EventBridge;
use crate::ResourceStore;
use crate::Result;
use crate::SupervisorState;
use crate::WatchConfig;
use crate::WatchSupervisor;

/// Snapshot served by the health endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: String,
    pub timestamp: String,
    pub client_initialized: bool,
    pub watch_context_alive: bool,
    pub shutdown_requested: bool,
    pub broadcast_domain_running: bool,
}

struct WatchContext {
    shutdown: CancellationToken,
    thread: Option<thread::JoinHandle<()>>,
    state: Option<watch::Receiver<SupervisorState>>,
    pump: Option<JoinHandle<()>>,
}

impl WatchContext {
    fn thread_alive(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }
}

pub struct LifecycleCoordinator {
    store: Arc<dyn ResourceStore>,
    registry: Arc<ConnectionRegistry>,
    config: WatchConfig,
    inner: Mutex<WatchContext>,
}

impl LifecycleCoordinator {
    pub fn new(
        store: Arc<dyn ResourceStore>,
        registry: Arc<ConnectionRegistry>,
        config: WatchConfig,
    ) -> Self {
        Self {
            store,
            registry,
            config,
            inner: Mutex::new(WatchContext {
                shutdown: CancellationToken::new(),
                thread: None,
                state: None,
                pump: None,
            }),
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Spawns the watch thread with a fresh shutdown token.
    ///
    /// Must run inside a tokio runtime, which hosts the broadcast pump.
    /// Returns `false` without doing anything when the thread is already
    /// running. A thread left behind by a timed-out `stop` already holds a
    /// cancelled token; it is detached and a new one is spawned.
    pub fn start(&self) -> Result<bool> {
        let mut inner = self.inner.lock();
        if inner.thread_alive() {
            if !inner.shutdown.is_cancelled() {
                debug!("Watch thread already running, start ignored");
                return Ok(false);
            }
            warn!("Previous watch thread is still stopping, detaching it");
        }

        let shutdown = CancellationToken::new();
        let (bridge, pump) = EventBridge::connect(self.registry.clone());
        let (supervisor, state) = WatchSupervisor::new(
            self.store.clone(),
            bridge,
            self.config.clone(),
            shutdown.clone(),
        );
        let thread = supervisor.spawn()?;

        inner.shutdown = shutdown;
        inner.thread = Some(thread);
        inner.state = Some(state);
        inner.pump = Some(pump);

        info!("Watch thread started");
        Ok(true)
    }

    /// Requests shutdown, closes every observer and waits up to
    /// `join_timeout` for the watch thread to stop.
    ///
    /// A thread that does not stop in time is left running and reported.
    pub async fn stop(
        &self,
        join_timeout: Duration,
    ) {
        let (thread, state) = {
            let mut inner = self.inner.lock();
            inner.shutdown.cancel();
            (inner.thread.take(), inner.state.clone())
        };
        info!("Shutdown requested");

        let closed = self.registry.drain_all().await;
        info!(closed, "Observer connections closed");

        let Some(mut state) = state else {
            return;
        };

        let stopped = tokio::time::timeout(join_timeout, async {
            // A dropped sender means the supervisor is gone
            let _ = state.wait_for(|s| *s == SupervisorState::Stopped).await;
        })
        .await
        .is_ok();

        if !stopped {
            warn!("Watch thread did not stop within {:?}, continuing shutdown", join_timeout);
            self.inner.lock().thread = thread;
            return;
        }

        if let Some(thread) = thread {
            match tokio::task::spawn_blocking(move || thread.join()).await {
                Ok(Ok(())) => info!("Watch thread joined"),
                Ok(Err(_)) => error!("Watch thread panicked"),
                Err(e) => error!("Failed to join watch thread: {}", e),
            }
        }
    }

    pub fn shutdown_requested(&self) -> bool {
        self.inner.lock().shutdown.is_cancelled()
    }

    /// Current supervisor state, `None` before the first start.
    pub fn supervisor_state(&self) -> Option<SupervisorState> {
        self.inner.lock().state.as_ref().map(|state| *state.borrow())
    }

    pub fn health(&self) -> HealthReport {
        let inner = self.inner.lock();
        HealthReport {
            status: "running".into(),
            timestamp: now_timestamp(),
            client_initialized: self.store.is_ready(),
            watch_context_alive: inner.thread_alive(),
            shutdown_requested: inner.shutdown.is_cancelled(),
            broadcast_domain_running: inner.pump.as_ref().is_some_and(|pump| !pump.is_finished()),
        }
    }
}

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::ChangeEvent;
use super::ResumeCursor;
use super::SupervisorState;
use crate::EventBridge;
use crate::RawChangeEvent;
use crate::ResourceStore;
use crate::Result;
use crate::StoreError;
use crate::WatchConfig;
use crate::WatchStream;
use crate::WATCH_EVENTS_TOTAL;
use crate::WATCH_RECONNECTS_TOTAL;

const WATCH_THREAD_NAME: &str = "resource-watch";

/// How an open subscription ended
#[derive(Debug)]
enum StreamEnd {
    /// Server closed the stream cleanly (idle timeout)
    Closed,
    Failed(StoreError),
    Shutdown,
}

pub struct WatchSupervisor {
    store: Arc<dyn ResourceStore>,
    bridge: EventBridge,
    config: WatchConfig,
    shutdown: CancellationToken,
    cursor: ResumeCursor,
    state_tx: watch::Sender<SupervisorState>,
}

impl WatchSupervisor {
    /// Builds a supervisor in `INIT` and returns a receiver tracking its state.
    pub fn new(
        store: Arc<dyn ResourceStore>,
        bridge: EventBridge,
        config: WatchConfig,
        shutdown: CancellationToken,
    ) -> (Self, watch::Receiver<SupervisorState>) {
        let (state_tx, state_rx) = watch::channel(SupervisorState::Init);
        let supervisor = Self {
            store,
            bridge,
            config,
            shutdown,
            cursor: ResumeCursor::new(),
            state_tx,
        };
        (supervisor, state_rx)
    }

    pub fn cursor(&self) -> &ResumeCursor {
        &self.cursor
    }

    /// Moves the supervisor onto a dedicated OS thread and runs it there.
    pub fn spawn(mut self) -> Result<JoinHandle<()>> {
        let handle = std::thread::Builder::new()
            .name(WATCH_THREAD_NAME.into())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        error!("Failed to build watch runtime: {}", e);
                        self.transition(SupervisorState::Stopped);
                        return;
                    }
                };
                runtime.block_on(self.run());
            })?;
        Ok(handle)
    }

    /// Runs the subscribe/retry loop until the shutdown token is cancelled.
    pub async fn run(&mut self) {
        info!("Watch supervisor started");

        while !self.shutdown.is_cancelled() {
            self.transition(SupervisorState::Connecting);

            let stream = match self
                .store
                .watch(self.cursor.token(), self.config.watch_timeout())
                .await
            {
                Ok(stream) => stream,
                Err(StoreError::Unavailable(reason)) => {
                    warn!(
                        "Resource store not ready ({}), retrying in {:?}",
                        reason,
                        self.config.unavailable_delay()
                    );
                    WATCH_RECONNECTS_TOTAL.with_label_values(&["unavailable"]).inc();
                    self.pause(self.config.unavailable_delay()).await;
                    continue;
                }
                Err(e) => {
                    error!("Failed to open watch: {}", e);
                    WATCH_RECONNECTS_TOTAL.with_label_values(&[e.cause()]).inc();
                    self.backoff().await;
                    continue;
                }
            };

            self.transition(SupervisorState::Streaming);
            info!(token = %self.cursor.token(), "Watching resources");

            match self.stream_events(stream).await {
                StreamEnd::Shutdown => {
                    info!("Shutdown requested, watch stream closed");
                    break;
                }
                StreamEnd::Closed => {
                    info!("Watch stream ended, reconnecting");
                    WATCH_RECONNECTS_TOTAL.with_label_values(&["closed"]).inc();
                }
                StreamEnd::Failed(e) => {
                    match &e {
                        StoreError::Subscription { status, reason } => {
                            error!(status, %reason, "Watch API error")
                        }
                        other => error!("Watch stream failed: {}", other),
                    }
                    WATCH_RECONNECTS_TOTAL.with_label_values(&[e.cause()]).inc();
                }
            }

            // The first end of stream closes the initial enumeration
            if self.cursor.is_first_sync() {
                self.cursor.mark_first_sync_done();
                debug!("Initial enumeration finished");
            }

            self.backoff().await;
        }

        self.transition(SupervisorState::Stopped);
        info!(token = %self.cursor.token(), "Watch supervisor stopped");
    }

    async fn stream_events(
        &mut self,
        mut stream: WatchStream,
    ) -> StreamEnd {
        let shutdown = self.shutdown.clone();
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => return StreamEnd::Shutdown,
                item = stream.next() => match item {
                    Some(Ok(raw)) => self.forward(raw),
                    Some(Err(e)) => return StreamEnd::Failed(e),
                    None => return StreamEnd::Closed,
                },
            }
        }
    }

    /// Normalizes one raw event and hands it to the bridge.
    fn forward(
        &mut self,
        raw: RawChangeEvent,
    ) {
        self.cursor.observe(&raw.resume_token);
        let kind = self.cursor.next_event_kind_for(raw.kind);

        WATCH_EVENTS_TOTAL.with_label_values(&[kind.as_str()]).inc();
        debug!(
            %kind,
            raw_kind = %raw.kind,
            resource = %raw.name,
            token = %raw.resume_token,
            "Change event received"
        );

        self.bridge.forward(ChangeEvent {
            kind,
            resource_name: raw.name,
            resume_token: raw.resume_token,
            raw_spec: raw.spec,
        });
    }

    async fn backoff(&self) {
        if self.shutdown.is_cancelled() {
            return;
        }
        self.transition(SupervisorState::Backoff);
        info!("Reconnecting watch in {:?}", self.config.reconnect_delay());
        self.pause(self.config.reconnect_delay()).await;
    }

    /// Sleeps up to `total` in poll ticks, returning early on shutdown.
    async fn pause(
        &self,
        total: Duration,
    ) {
        let tick = self.config.shutdown_poll();
        let mut waited = Duration::ZERO;
        while waited < total && !self.shutdown.is_cancelled() {
            let step = tick.min(total - waited);
            tokio::time::sleep(step).await;
            waited += step;
        }
    }

    fn transition(
        &self,
        next: SupervisorState,
    ) {
        let changed = self.state_tx.send_if_modified(|state| {
            if *state == next {
                false
            } else {
                *state = next;
                true
            }
        });
        if changed {
            debug!(state = %next, "Watch supervisor state changed");
        }
    }
}

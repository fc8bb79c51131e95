use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing::trace;
use tracing::warn;

use crate::now_timestamp;
use crate::BroadcastMessage;
use crate::ChangeEvent;
use crate::ChangeKind;
use crate::ConnectionRegistry;
use crate::ServiceView;

/// Sending side of the handoff, owned by the watch supervisor.
#[derive(Debug, Clone)]
pub struct EventBridge {
    queue: mpsc::UnboundedSender<BroadcastMessage>,
}

impl EventBridge {
    pub fn new(queue: mpsc::UnboundedSender<BroadcastMessage>) -> Self {
        Self { queue }
    }

    /// Creates a bridge and spawns its broadcast pump on the current runtime.
    ///
    /// The pump exits once every clone of the returned bridge is dropped and
    /// the queue is empty.
    pub fn connect(registry: Arc<ConnectionRegistry>) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let pump = tokio::spawn(run_broadcast_pump(registry, rx));
        (Self::new(tx), pump)
    }

    /// Maps a change to its wire message; `MODIFIED` is an update, anything
    /// else a full refresh of that service.
    pub fn translate(event: &ChangeEvent) -> BroadcastMessage {
        let view = ServiceView::from_spec(
            event.resource_name.clone(),
            &event.raw_spec,
            now_timestamp(),
        );
        match event.kind {
            ChangeKind::Modified => BroadcastMessage::Update(vec![view]),
            ChangeKind::Added | ChangeKind::Deleted => BroadcastMessage::Full(vec![view]),
        }
    }

    /// Enqueues `message` for broadcast without waiting for delivery.
    ///
    /// Returns `false` when the broadcast pump is gone.
    pub fn dispatch(
        &self,
        message: BroadcastMessage,
    ) -> bool {
        match self.queue.send(message) {
            Ok(()) => true,
            Err(_) => {
                warn!("Broadcast pump stopped, change dropped");
                false
            }
        }
    }

    pub fn forward(
        &self,
        event: ChangeEvent,
    ) -> bool {
        self.dispatch(Self::translate(&event))
    }
}

/// Broadcasts queued messages one at a time, in enqueue order.
pub async fn run_broadcast_pump(
    registry: Arc<ConnectionRegistry>,
    mut queue: mpsc::UnboundedReceiver<BroadcastMessage>,
) {
    debug!("Broadcast pump started");
    while let Some(message) = queue.recv().await {
        let delivered = registry.broadcast(&message).await;
        trace!(delivered, "Change broadcast to observers");
    }
    debug!("Broadcast pump stopped");
}

use std::collections::BTreeMap;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::trace;
use tracing::warn;

#[cfg(test)]
use mockall::automock;

use crate::BroadcastMessage;
use crate::DeliveryError;
use crate::BROADCAST_FAILURES_TOTAL;
use crate::OBSERVER_CONNECTIONS;

/// WebSocket close code "going away"
pub const CLOSE_GOING_AWAY: u16 = 1001;
pub const SHUTDOWN_REASON: &str = "Server shutdown";

pub type ConnectionId = u64;

/// Outbound half of one observer's bidirectional channel.
///
/// The transport owns the socket; the registry only sends through it.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ObserverChannel: Send + Sync + 'static {
    async fn send_text(
        &self,
        payload: &str,
    ) -> Result<(), DeliveryError>;

    async fn close(
        &self,
        code: u16,
        reason: &str,
    ) -> Result<(), DeliveryError>;
}

#[derive(Default)]
pub struct ConnectionRegistry {
    connections: Mutex<BTreeMap<ConnectionId, Arc<dyn ObserverChannel>>>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("connections", &self.len())
            .field("next_id", &self.next_id)
            .finish()
    }
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an accepted connection and returns its id.
    pub fn register(
        &self,
        channel: Arc<dyn ObserverChannel>,
    ) -> ConnectionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let count = {
            let mut connections = self.connections.lock();
            connections.insert(id, channel);
            OBSERVER_CONNECTIONS.set(connections.len() as i64);
            connections.len()
        };
        info!(connection_id = id, active = count, "Observer connected");
        id
    }

    /// Removes `id`. Returns whether it was registered; absence is not an error.
    pub fn unregister(
        &self,
        id: ConnectionId,
    ) -> bool {
        let (removed, count) = {
            let mut connections = self.connections.lock();
            let removed = connections.remove(&id).is_some();
            if removed {
                OBSERVER_CONNECTIONS.set(connections.len() as i64);
            }
            (removed, connections.len())
        };
        if removed {
            info!(connection_id = id, active = count, "Observer disconnected");
        }
        removed
    }

    pub fn contains(
        &self,
        id: ConnectionId,
    ) -> bool {
        self.connections.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.connections.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sends `message` to one connection, best-effort.
    ///
    /// A failed send unregisters the connection. Returns whether the message
    /// was delivered.
    pub async fn unicast<M: Serialize + ?Sized>(
        &self,
        id: ConnectionId,
        message: &M,
    ) -> bool {
        let channel = self.connections.lock().get(&id).cloned();
        let Some(channel) = channel else {
            debug!(connection_id = id, "Unicast to unknown connection skipped");
            return false;
        };

        let payload = match serde_json::to_string(message) {
            Ok(payload) => payload,
            Err(e) => {
                error!("Failed to encode unicast message: {}", e);
                return false;
            }
        };

        match channel.send_text(&payload).await {
            Ok(()) => true,
            Err(e) => {
                error!(connection_id = id, "Unicast failed: {}", e);
                BROADCAST_FAILURES_TOTAL.inc();
                self.unregister(id);
                false
            }
        }
    }

    /// Delivers `message` to every connection registered at call time.
    ///
    /// Members are served one after another from a snapshot; a failing member
    /// is unregistered and delivery continues with the rest. Returns the
    /// number of successful deliveries.
    pub async fn broadcast(
        &self,
        message: &BroadcastMessage,
    ) -> usize {
        let members: Vec<(ConnectionId, Arc<dyn ObserverChannel>)> = self
            .connections
            .lock()
            .iter()
            .map(|(id, channel)| (*id, Arc::clone(channel)))
            .collect();

        if members.is_empty() {
            trace!("Broadcast skipped, no observers");
            return 0;
        }

        let payload = match serde_json::to_string(message) {
            Ok(payload) => payload,
            Err(e) => {
                error!("Failed to encode broadcast message: {}", e);
                return 0;
            }
        };

        let mut delivered = 0;
        for (id, channel) in members {
            match channel.send_text(&payload).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    error!(connection_id = id, "Broadcast failed: {}", e);
                    BROADCAST_FAILURES_TOTAL.inc();
                    self.unregister(id);
                }
            }
        }

        debug!(delivered, "Broadcast finished");
        delivered
    }

    /// Empties the registry and closes every former member.
    ///
    /// Only used during shutdown. Returns how many connections were drained.
    pub async fn drain_all(&self) -> usize {
        let members: Vec<(ConnectionId, Arc<dyn ObserverChannel>)> = {
            let mut connections = self.connections.lock();
            OBSERVER_CONNECTIONS.set(0);
            std::mem::take(&mut *connections).into_iter().collect()
        };

        let drained = members.len();
        for (id, channel) in members {
            match channel.close(CLOSE_GOING_AWAY, SHUTDOWN_REASON).await {
                Ok(()) => debug!(connection_id = id, "Observer connection closed"),
                Err(e) => warn!(connection_id = id, "Failed to close observer connection: {}", e),
            }
        }

        info!(drained, "All observer connections drained");
        drained
    }
}

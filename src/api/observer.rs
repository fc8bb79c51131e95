use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::SplitSink;
use futures::SinkExt;
use futures::StreamExt;
use tokio::sync::Mutex;
use tracing::debug;
use tracing::info;
use warp::ws::Message;
use warp::ws::WebSocket;

use super::AppContext;
use crate::list_services;
use crate::BroadcastMessage;
use crate::DeliveryError;
use crate::ObserverChannel;

/// Outbound half of an observer's WebSocket.
pub struct WsObserver {
    sink: Mutex<SplitSink<WebSocket, Message>>,
}

impl WsObserver {
    pub fn new(sink: SplitSink<WebSocket, Message>) -> Self {
        Self { sink: Mutex::new(sink) }
    }
}

#[async_trait]
impl ObserverChannel for WsObserver {
    async fn send_text(
        &self,
        payload: &str,
    ) -> Result<(), DeliveryError> {
        self.sink
            .lock()
            .await
            .send(Message::text(payload))
            .await
            .map_err(|e| DeliveryError::Send(e.to_string()))
    }

    async fn close(
        &self,
        code: u16,
        reason: &str,
    ) -> Result<(), DeliveryError> {
        let mut sink = self.sink.lock().await;
        sink.send(Message::close_with(code, reason.to_string()))
            .await
            .map_err(|e| DeliveryError::Send(e.to_string()))?;
        sink.close().await.map_err(|_| DeliveryError::Closed)
    }
}

/// Drives one observer connection from upgrade to close.
///
/// The observer is registered, sent the current service list, then echoed
/// every text it sends. Between messages the session wakes every
/// `websocket.receive_timeout_ms` to notice a shutdown request.
pub async fn observer_session(
    socket: WebSocket,
    ctx: AppContext,
) {
    let (sink, mut inbound) = socket.split();
    let registry = ctx.lifecycle.registry().clone();
    let id = registry.register(Arc::new(WsObserver::new(sink)));

    let snapshot = list_services(ctx.store.as_ref()).await;
    if !registry.unicast(id, &snapshot).await {
        return;
    }

    let receive_timeout = ctx.websocket.receive_timeout();
    while !ctx.lifecycle.shutdown_requested() {
        let message = match tokio::time::timeout(receive_timeout, inbound.next()).await {
            Err(_) => continue,
            Ok(None) => break,
            Ok(Some(Err(e))) => {
                debug!(connection_id = id, "Observer connection failed: {}", e);
                break;
            }
            Ok(Some(Ok(message))) => message,
        };

        if message.is_close() {
            break;
        }
        if let Ok(text) = message.to_str() {
            let echo = BroadcastMessage::Echo(text.to_string());
            if !registry.unicast(id, &echo).await {
                break;
            }
        }
    }

    registry.unregister(id);
    info!(connection_id = id, "Observer session ended");
}

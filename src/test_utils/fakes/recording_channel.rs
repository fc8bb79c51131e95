use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::BroadcastMessage;
use crate::DeliveryError;
use crate::ObserverChannel;

/// Observer channel that records every payload it is asked to send.
#[derive(Default)]
pub struct RecordingChannel {
    sent: Mutex<Vec<String>>,
    closed: Mutex<Option<(u16, String)>>,
    broken: AtomicBool,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every later send fails.
    pub fn break_channel(&self) {
        self.broken.store(true, Ordering::SeqCst);
    }

    pub fn payloads(&self) -> Vec<String> {
        self.sent.lock().clone()
    }

    pub fn messages(&self) -> Vec<BroadcastMessage> {
        self.sent
            .lock()
            .iter()
            .map(|p| serde_json::from_str(p).expect("payload is a broadcast message"))
            .collect()
    }

    pub fn closed_with(&self) -> Option<(u16, String)> {
        self.closed.lock().clone()
    }
}

#[async_trait]
impl ObserverChannel for RecordingChannel {
    async fn send_text(
        &self,
        payload: &str,
    ) -> Result<(), DeliveryError> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(DeliveryError::Send("broken pipe".into()));
        }
        self.sent.lock().push(payload.to_string());
        Ok(())
    }

    async fn close(
        &self,
        code: u16,
        reason: &str,
    ) -> Result<(), DeliveryError> {
        *self.closed.lock() = Some((code, reason.to_string()));
        Ok(())
    }
}

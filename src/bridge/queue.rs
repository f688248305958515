//! Batching inbound queue between the DGG reader and the relay engine.

use std::sync::{Arc, Mutex};

use crate::common::ChatMessage;

/// Unbounded multi-producer queue drained in whole batches.
///
/// Cloning yields another handle to the same queue.
#[derive(Debug, Clone, Default)]
pub struct InboundQueue {
    messages: Arc<Mutex<Vec<ChatMessage>>>,
}

impl InboundQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message. Never blocks on the consumer and never fails.
    pub fn enqueue(&self, message: ChatMessage) {
        self.messages
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(message);
    }

    /// Take everything queued so far, in arrival order.
    pub fn drain_all(&self) -> Vec<ChatMessage> {
        std::mem::take(&mut *self.messages.lock().unwrap_or_else(|e| e.into_inner()))
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.messages.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

//! One network call at a time on the shared Telegram connection.
//!
//! Probes, delayed commits and immediate deletes all go through this wrapper,
//! so they queue on a single async mutex instead of overlapping on the wire.

use crate::domain::{ConversationEntity, DomainError, Message};
use crate::ports::ConversationSource;
use std::sync::Arc;
use tokio::sync::Mutex;

pub struct SerializedSource {
    inner: Arc<dyn ConversationSource>,
    gate: Mutex<()>,
}

impl SerializedSource {
    pub fn new(inner: Arc<dyn ConversationSource>) -> Self {
        Self {
            inner,
            gate: Mutex::new(()),
        }
    }
}

#[async_trait::async_trait]
impl ConversationSource for SerializedSource {
    async fn list_dialogs(&self) -> Result<Vec<ConversationEntity>, DomainError> {
        let _guard = self.gate.lock().await;
        self.inner.list_dialogs().await
    }

    async fn get_recent_messages(
        &self,
        entity_id: i64,
        limit: usize,
    ) -> Result<Vec<Message>, DomainError> {
        let _guard = self.gate.lock().await;
        self.inner.get_recent_messages(entity_id, limit).await
    }

    async fn delete_dialog(&self, entity_id: i64) -> Result<(), DomainError> {
        let _guard = self.gate.lock().await;
        self.inner.delete_dialog(entity_id).await
    }
}

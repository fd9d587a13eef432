//! Implements ConversationSource using grammers Client.
//!
//! Dialog peers are cached by id on every listing so history probes and
//! deletes don't walk the dialog list again. FloodWait is not retried here;
//! it surfaces as `RateLimited` and the caller decides.

use crate::adapters::telegram::mapper;
use crate::domain::{ConversationEntity, DomainError, Message};
use crate::ports::ConversationSource;
use async_trait::async_trait;
use grammers_client::Client;
use grammers_client::peer::Peer;
use grammers_client::tl;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;

pub struct GrammersConversationSource {
    client: Client,
    peer_cache: Mutex<HashMap<i64, Peer>>,
}

impl GrammersConversationSource {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            peer_cache: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve a dialog id to its peer, walking the dialogs only on a cache miss.
    async fn resolve_peer(&self, chat_id: i64) -> Result<Peer, DomainError> {
        if let Some(peer) = self.peer_cache.lock().await.get(&chat_id) {
            return Ok(peer.clone());
        }
        let mut dialogs = self.client.iter_dialogs();
        while let Some(dialog) = dialogs
            .next()
            .await
            .map_err(|e| mapper::map_invocation_error(e, chat_id))?
        {
            let peer = dialog.peer();
            if peer.id().bot_api_dialog_id() == chat_id {
                self.peer_cache.lock().await.insert(chat_id, peer.clone());
                return Ok(peer.clone());
            }
        }
        Err(DomainError::NotFound(chat_id))
    }
}

#[async_trait]
impl ConversationSource for GrammersConversationSource {
    async fn list_dialogs(&self) -> Result<Vec<ConversationEntity>, DomainError> {
        let mut dialogs = self.client.iter_dialogs();
        let mut entities = Vec::new();
        let mut refs = HashMap::new();
        while let Some(dialog) = dialogs
            .next()
            .await
            .map_err(|e| mapper::map_invocation_error(e, 0))?
        {
            let peer = dialog.peer();
            let entity = mapper::entity_from_peer(peer);
            refs.insert(entity.id(), peer.clone());
            entities.push(entity);
        }
        *self.peer_cache.lock().await = refs;
        debug!(count = entities.len(), "dialogs listed");
        Ok(entities)
    }

    async fn get_recent_messages(
        &self,
        entity_id: i64,
        limit: usize,
    ) -> Result<Vec<Message>, DomainError> {
        use tl::enums::messages::Messages;

        let peer = self.resolve_peer(entity_id).await?;
        let peer_ref = peer
            .to_ref()
            .await
            .ok_or(DomainError::NotFound(entity_id))?;
        let input_peer: tl::enums::InputPeer = peer_ref.into();
        let req = tl::functions::messages::GetHistory {
            peer: input_peer,
            offset_id: 0,
            offset_date: 0,
            add_offset: 0,
            limit: i32::try_from(limit).unwrap_or(i32::MAX),
            max_id: 0,
            min_id: 0,
            hash: 0,
        };
        let raw = self
            .client
            .invoke(&req)
            .await
            .map_err(|e| mapper::map_invocation_error(e, entity_id))?;
        let messages = match raw {
            Messages::Messages(m) => m.messages,
            Messages::Slice(m) => m.messages,
            Messages::ChannelMessages(m) => m.messages,
            Messages::NotModified(_) => return Ok(vec![]),
        };
        Ok(messages
            .iter()
            .filter_map(|m| mapper::message_from_raw(m, entity_id))
            .collect())
    }

    async fn delete_dialog(&self, entity_id: i64) -> Result<(), DomainError> {
        let peer = self.resolve_peer(entity_id).await?;
        let peer_ref = peer
            .to_ref()
            .await
            .ok_or(DomainError::NotFound(entity_id))?;
        self.client
            .delete_dialog(peer_ref)
            .await
            .map_err(|e| mapper::map_invocation_error(e, entity_id))?;
        self.peer_cache.lock().await.remove(&entity_id);
        debug!(entity_id, "dialog deleted");
        Ok(())
    }
}

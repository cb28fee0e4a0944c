//! In-process conversation store.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use beacon_types::{Conversation, ConversationId, Message};

use crate::error::{Error, Result};
use crate::store::ConversationStore;

#[derive(Debug)]
struct Entry {
    conversation: Conversation,
    messages: Vec<Message>,
}

type Slot = Arc<Mutex<Entry>>;

/// Conversation store held entirely in memory.
///
/// The map lock is only held to look up a slot; each conversation has its
/// own async mutex so appends to different conversations never contend.
#[derive(Debug, Default)]
pub struct MemoryStore {
    conversations: RwLock<HashMap<ConversationId, Slot>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, id: &ConversationId) -> Result<Slot> {
        self.conversations
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    /// Number of stored conversations.
    pub fn len(&self) -> usize {
        self.conversations.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.read().is_empty()
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn create_conversation(&self, title: Option<String>) -> Result<Conversation> {
        let conversation = Conversation::new(title);
        let entry = Entry {
            conversation: conversation.clone(),
            messages: Vec::new(),
        };
        self.conversations
            .write()
            .insert(conversation.id.clone(), Arc::new(Mutex::new(entry)));

        tracing::debug!(conversation_id = %conversation.id, "Created conversation");
        Ok(conversation)
    }

    async fn get_conversation(&self, id: &ConversationId) -> Result<Conversation> {
        let slot = self.slot(id)?;
        let entry = slot.lock().await;
        Ok(entry.conversation.clone())
    }

    async fn list_conversations(&self, limit: usize) -> Result<Vec<Conversation>> {
        let slots: Vec<Slot> = self.conversations.read().values().cloned().collect();

        let mut conversations = Vec::with_capacity(slots.len());
        for slot in slots {
            conversations.push(slot.lock().await.conversation.clone());
        }
        conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        conversations.truncate(limit);
        Ok(conversations)
    }

    async fn delete_conversation(&self, id: &ConversationId) -> Result<()> {
        match self.conversations.write().remove(id) {
            Some(_) => {
                tracing::debug!(conversation_id = %id, "Deleted conversation");
                Ok(())
            }
            None => Err(Error::NotFound(id.to_string())),
        }
    }

    async fn get_messages(&self, id: &ConversationId) -> Result<Vec<Message>> {
        let slot = self.slot(id)?;
        let entry = slot.lock().await;
        Ok(entry.messages.clone())
    }

    async fn append_message(&self, id: &ConversationId, message: Message) -> Result<()> {
        let slot = self.slot(id)?;
        let mut entry = slot.lock().await;
        entry.messages.push(message);
        entry.conversation.touch();
        Ok(())
    }
}

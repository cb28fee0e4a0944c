//! Conversation store trait.

use async_trait::async_trait;
use std::sync::Arc;

use beacon_types::{Conversation, ConversationId, Message};

use crate::error::Result;

/// Default page size for [`ConversationStore::list_conversations`].
pub const DEFAULT_LIST_LIMIT: usize = 50;

/// Durable home of conversations and their messages.
///
/// Conversations are mutable only by appending. Implementations serialize
/// appends per conversation so concurrent turns never interleave writes.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Create an empty conversation.
    async fn create_conversation(&self, title: Option<String>) -> Result<Conversation>;

    /// Fetch a conversation header.
    async fn get_conversation(&self, id: &ConversationId) -> Result<Conversation>;

    /// Most recently updated conversations first.
    async fn list_conversations(&self, limit: usize) -> Result<Vec<Conversation>>;

    /// Delete a conversation and all of its messages.
    async fn delete_conversation(&self, id: &ConversationId) -> Result<()>;

    /// All messages of a conversation in stored order.
    async fn get_messages(&self, id: &ConversationId) -> Result<Vec<Message>>;

    /// Append a message and bump the conversation's `updated_at`.
    async fn append_message(&self, id: &ConversationId, message: Message) -> Result<()>;

    /// Whether the conversation exists.
    async fn exists(&self, id: &ConversationId) -> Result<bool> {
        match self.get_conversation(id).await {
            Ok(_) => Ok(true),
            Err(crate::Error::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// A store that can be shared across tasks.
pub type SharedStore = Arc<dyn ConversationStore>;

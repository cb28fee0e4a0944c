//! Context building for model requests.
//!
//! The [`ContextBuilder`] turns stored conversation history plus the tool
//! registry into the [`Context`] a model gateway consumes. It never writes.

use std::sync::Arc;

use beacon_session::SharedStore;
use beacon_types::{Context, ConversationId, Message};

use crate::error::Result;
use crate::tool::ToolRegistry;

/// Default number of most recent messages sent to the model.
pub const DEFAULT_HISTORY_LIMIT: usize = 20;

/// Assembles model context from a conversation store and a tool registry.
#[derive(Clone)]
pub struct ContextBuilder {
    store: SharedStore,
    tools: Arc<ToolRegistry>,
    history_limit: usize,
}

impl ContextBuilder {
    pub fn new(store: SharedStore, tools: Arc<ToolRegistry>) -> Self {
        Self {
            store,
            tools,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    /// Include at most `limit` of the most recent messages.
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// Prior messages in stored order plus all tool declarations.
    pub async fn build(&self, conversation_id: &ConversationId) -> Result<Context> {
        let messages = self.history(conversation_id).await?;
        Ok(Context::new(messages, self.tools.definitions()))
    }

    /// Like [`build`](Self::build), with `input` appended as the newest
    /// message. `input` is not persisted.
    pub async fn build_for_turn(
        &self,
        conversation_id: &ConversationId,
        input: &Message,
    ) -> Result<Context> {
        let mut messages = self.history(conversation_id).await?;
        messages.push(input.clone());
        Ok(Context::new(messages, self.tools.definitions()))
    }

    async fn history(&self, conversation_id: &ConversationId) -> Result<Vec<Message>> {
        let mut messages = self.store.get_messages(conversation_id).await?;
        if messages.len() > self.history_limit {
            let skip = messages.len() - self.history_limit;
            messages.drain(..skip);
        }

        tracing::debug!(
            %conversation_id,
            messages = messages.len(),
            tools = self.tools.len(),
            "Context built"
        );
        Ok(messages)
    }
}

impl std::fmt::Debug for ContextBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextBuilder")
            .field("tools", &self.tools)
            .field("history_limit", &self.history_limit)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AgentError;
    use crate::tool::MockTool;
    use beacon_session::{ConversationStore, MemoryStore};

    async fn setup() -> (Arc<MemoryStore>, ContextBuilder, ConversationId) {
        let store = Arc::new(MemoryStore::new());
        let mut tools = ToolRegistry::new();
        tools.register(MockTool::new("calculator"));
        tools.register(MockTool::new("fetch_fact"));

        let conv = store.create_conversation(None).await.unwrap();
        let builder = ContextBuilder::new(store.clone(), Arc::new(tools));
        (store, builder, conv.id)
    }

    #[tokio::test]
    async fn test_build_orders_history_and_tools() {
        let (store, builder, id) = setup().await;
        store.append_message(&id, Message::user("first")).await.unwrap();
        store.append_message(&id, Message::assistant("second")).await.unwrap();

        let context = builder.build(&id).await.unwrap();
        let contents: Vec<&str> = context.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second"]);

        let tools: Vec<&str> = context.tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(tools, vec!["calculator", "fetch_fact"]);
    }

    #[tokio::test]
    async fn test_build_is_repeatable() {
        let (store, builder, id) = setup().await;
        store.append_message(&id, Message::user("hello")).await.unwrap();

        let first = builder.build(&id).await.unwrap();
        let second = builder.build(&id).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_build_for_turn_does_not_persist() {
        let (store, builder, id) = setup().await;
        let input = Message::user("what is the budget?");

        let context = builder.build_for_turn(&id, &input).await.unwrap();
        assert_eq!(context.messages.last().unwrap().id, input.id);
        assert!(store.get_messages(&id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_history_window_keeps_most_recent() {
        let (store, builder, id) = setup().await;
        let builder = builder.with_history_limit(3);
        for i in 0..5 {
            store
                .append_message(&id, Message::user(format!("m{}", i)))
                .await
                .unwrap();
        }

        let context = builder.build(&id).await.unwrap();
        let contents: Vec<&str> = context.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m2", "m3", "m4"]);
    }

    #[tokio::test]
    async fn test_unknown_conversation() {
        let (_store, builder, _id) = setup().await;
        let err = builder.build(&ConversationId::new()).await.unwrap_err();
        assert!(matches!(err, AgentError::ConversationNotFound(_)));
    }
}

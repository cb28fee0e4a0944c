//! API routes.

pub mod chat;
pub mod conversations;
pub mod health;
pub mod tools;

pub use chat::{ChatRequest, ChatResponse, chat_handler, chat_stream_handler};
pub use conversations::{
    AppendMessageRequest, ConversationDetail, CreateConversationRequest, ListConversationsQuery,
    ListConversationsResponse, ListMessagesResponse, append_message_handler,
    create_conversation_handler, delete_conversation_handler, get_conversation_handler,
    list_conversations_handler, list_messages_handler,
};
pub use health::health_routes;
pub use tools::{
    IncidentsQuery, ProjectsQuery, TeamMembersQuery, ToolDataResponse, ToolDefinitionsResponse,
    incidents_handler, projects_handler, team_members_handler, tool_definitions_handler,
};

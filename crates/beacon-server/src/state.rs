//! Application state shared across handlers.

use std::sync::Arc;

use beacon_agent::Agent;
use beacon_session::SharedStore;

use crate::config::ServerConfig;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// The agent instance.
    pub agent: Arc<Agent>,

    /// The agent's conversation store.
    pub store: SharedStore,

    /// Server configuration.
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Create a new application state. Conversations are served from the
    /// agent's own store.
    pub fn new(agent: Agent, config: ServerConfig) -> Self {
        Self {
            store: agent.store(),
            agent: Arc::new(agent),
            config: Arc::new(config),
        }
    }
}

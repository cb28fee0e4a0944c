//! HTTP API and SSE server for Beacon.
//!
//! Thin transport over [`beacon_agent::Agent`]: conversation CRUD backed by
//! the agent's store, blocking and streaming chat, and the tool catalog.
//! Everything lives under `/api/v1`.
//!
//! # Example
//!
//! ```ignore
//! use beacon_server::{Server, ServerConfig};
//!
//! let config = ServerConfig::new().with_bind_address("127.0.0.1:8000".parse()?);
//! Server::new(agent, config).run().await?;
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod routes;
pub mod state;

pub use config::ServerConfig;
pub use error::{ErrorResponse, Result, ServerError};
pub use logging::request_logging_middleware;
pub use routes::{ChatRequest, ChatResponse};
pub use state::AppState;

use std::future::Future;
use std::net::SocketAddr;

use axum::{Router, http::HeaderValue, middleware};
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use beacon_agent::Agent;

/// The Beacon HTTP server.
pub struct Server {
    state: AppState,
}

impl Server {
    /// Create a new server with the given agent and configuration.
    pub fn new(agent: Agent, config: ServerConfig) -> Self {
        Self {
            state: AppState::new(agent, config),
        }
    }

    /// Create a server from a pre-built application state.
    pub fn from_state(state: AppState) -> Self {
        Self { state }
    }

    /// Build the router with all routes and middleware.
    pub fn router(&self) -> Router {
        Router::new()
            .nest("/api/v1", self.api_routes())
            .layer(middleware::from_fn_with_state(
                self.state.clone(),
                logging::request_logging_middleware,
            ))
            .layer(self.cors_layer())
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// API routes (v1).
    fn api_routes(&self) -> Router<AppState> {
        use axum::routing::{get, post};

        Router::new()
            .merge(routes::health_routes())
            // Conversations
            .route(
                "/conversations",
                post(routes::create_conversation_handler).get(routes::list_conversations_handler),
            )
            .route(
                "/conversations/{id}",
                get(routes::get_conversation_handler).delete(routes::delete_conversation_handler),
            )
            .route(
                "/conversations/{id}/messages",
                post(routes::append_message_handler).get(routes::list_messages_handler),
            )
            // Chat
            .route("/chat", post(routes::chat_handler))
            .route("/chat/stream", post(routes::chat_stream_handler))
            // Tools
            .route("/tools/definitions", get(routes::tool_definitions_handler))
            .route("/tools/team-members", get(routes::team_members_handler))
            .route("/tools/projects", get(routes::projects_handler))
            .route("/tools/incidents", get(routes::incidents_handler))
    }

    /// Any origin when none are configured, otherwise only the listed ones.
    fn cors_layer(&self) -> CorsLayer {
        let origins = &self.state.config.cors_origins;
        if origins.is_empty() {
            return CorsLayer::permissive();
        }

        let allowed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| match origin.parse::<HeaderValue>() {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods(Any)
            .allow_headers(Any)
    }

    /// Run the server until the process exits.
    pub async fn run(self) -> Result<()> {
        let addr = self.state.config.bind_address;
        self.run_on(addr).await
    }

    /// Run the server on a specific address (useful for testing).
    pub async fn run_on(self, addr: SocketAddr) -> Result<()> {
        self.run_until(addr, std::future::pending()).await
    }

    /// Run the server until `shutdown` resolves, then drain in-flight
    /// requests.
    pub async fn run_until(
        self,
        addr: SocketAddr,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<()> {
        let router = self.router();

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Internal(format!("Failed to bind {}: {}", addr, e)))?;
        let local = listener
            .local_addr()
            .map_err(|e| ServerError::Internal(format!("Failed to read local address: {}", e)))?;

        info!(
            addr = %local,
            tools = self.state.agent.tools().len(),
            "Starting server"
        );

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| ServerError::Internal(format!("Server error: {}", e)))?;

        info!("Server stopped");
        Ok(())
    }

    /// Get the configured bind address.
    pub fn bind_address(&self) -> SocketAddr {
        self.state.config.bind_address
    }
}

//! Model gateway for Beacon.
//!
//! The orchestration loop talks to the model through the [`ModelGateway`]
//! trait. A gateway receives the conversation context plus the rounds taken
//! so far and answers with the next [`Round`](beacon_types::Round).
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │  ModelGateway trait                      │
//! │  - ask(&ModelRequest) -> Round           │
//! └──────────────────────────────────────────┘
//!                    │
//!          ┌─────────┴─────────┐
//!          ▼                   ▼
//!   ┌────────────┐      ┌────────────┐
//!   │ Anthropic  │      │    Mock    │
//!   └────────────┘      └────────────┘
//! ```
//!
//! Failures are [`LlmError`] values classified as transient or fatal by
//! [`LlmError::kind`]; [`with_retry`] retries the transient ones.

pub mod anthropic;
pub mod error;
pub mod gateway;

#[cfg(any(test, feature = "testing"))]
pub mod mock;

pub use anthropic::{AnthropicConfig, AnthropicGateway, PROGRAM_TOOL_NAME};
pub use error::{FailureKind, LlmError, RateLimitInfo, Result};
pub use gateway::{ModelGateway, ModelRequest, SharedGateway, validate_round, with_retry};

#[cfg(any(test, feature = "testing"))]
pub use mock::MockGateway;

//! Agent core for Beacon.
//!
//! This crate runs the orchestration loop that turns a user message into an
//! answer: it asks the model for the next round, dispatches tools directly or
//! through model-authored programs, and streams progress as it goes.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Agent                                                      │
//! │  - Drives rounds until final text or the round cap          │
//! │  - Emits progress events                                    │
//! │  - Persists the user message and the answer                 │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!       ┌──────────────┬───────┴───────┬──────────────┐
//!       ▼              ▼               ▼              ▼
//!  ┌─────────┐   ┌───────────┐   ┌──────────┐   ┌──────────┐
//!  │ Gateway │   │  Context  │   │ ToolReg  │   │ Sandbox  │
//!  │(beacon- │   │  Builder  │   │          │◀──│ (bridge) │
//!  │  llm)   │   │           │   │          │   │          │
//!  └─────────┘   └───────────┘   └──────────┘   └──────────┘
//! ```
//!
//! # Core Components
//!
//! - [`Agent`]: the orchestration loop
//! - [`ToolRegistry`]: tool declarations, validation and capability checks
//! - [`ContextBuilder`]: history plus tool declarations for the model
//! - [`Sandbox`]: runs model-authored programs against a [`ToolBridge`]
//! - [`EventEmitter`]: bounded progress channel

pub mod agent;
pub mod context;
pub mod error;
pub mod event;
pub mod sandbox;
pub mod tool;
pub mod tools;
pub mod types;

pub use agent::{Agent, AgentBuilder};
pub use context::ContextBuilder;
pub use error::{AgentError, Result};
pub use event::{EventEmitter, EventStream, StreamEvent, channel, channel_with_timeout};
pub use sandbox::{
    Program, ProgramError, ProgramRun, RegistryBridge, Sandbox, SandboxConfig, ToolBridge,
};
pub use tool::{
    CallLimits, ParamExt, Tool, ToolContext, ToolRegistry, ValidationError, validate_parameters,
};
pub use tools::{builtin_registry, register_builtin_tools};
pub use types::{AgentConfig, ToolFailurePolicy, Turn, TurnId, TurnOutcome, TurnStatus};

//! Conversation storage for Beacon.
//!
//! The orchestration loop reads history and appends messages through the
//! [`ConversationStore`] trait. Two implementations are provided:
//!
//! - [`MemoryStore`]: process-local, one async mutex per conversation
//! - [`SqliteStore`]: durable, backed by a single SQLite connection
//!
//! # Example
//!
//! ```rust,ignore
//! use beacon_session::{ConversationStore, MemoryStore};
//!
//! let store = MemoryStore::new();
//! let conversation = store.create_conversation(Some("Ops".into())).await?;
//! ```

mod error;
mod memory;
mod sqlite;
mod store;

pub use error::{Error, Result};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use store::{ConversationStore, DEFAULT_LIST_LIMIT, SharedStore};

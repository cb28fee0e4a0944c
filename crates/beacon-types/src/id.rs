//! Prefixed string identifiers.
//!
//! Identifiers are short, human-readable and carry a type prefix
//! (`conv_1a2b3c4d`, `msg_…`, `call_…`) so they can be told apart in logs
//! and on the wire.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

fn random_hex(len: usize) -> String {
    let mut hex = Uuid::new_v4().simple().to_string();
    hex.truncate(len);
    hex
}

macro_rules! prefixed_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal, $len:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Prefix every generated identifier starts with.
            pub const PREFIX: &'static str = $prefix;

            /// Generate a new random identifier.
            pub fn new() -> Self {
                Self(format!("{}{}", $prefix, random_hex($len)))
            }

            /// Wrap an existing identifier string without validation.
            pub fn from_string(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Whether the identifier carries the expected prefix.
            pub fn has_prefix(&self) -> bool {
                self.0.starts_with($prefix) && self.0.len() > $prefix.len()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self::from_string(id)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

prefixed_id!(
    /// Identifier of a conversation (`conv_<8 hex>`).
    ConversationId,
    "conv_",
    8
);

prefixed_id!(
    /// Identifier of a persisted message (`msg_<8 hex>`).
    MessageId,
    "msg_",
    8
);

prefixed_id!(
    /// Identity of a single tool invocation attempt (`call_<12 hex>`).
    ///
    /// Results are routed back to their call by this value alone, never by
    /// tool name or timing.
    ToolCallId,
    "call_",
    12
);

//! Model gateway trait and shared retry logic.
//!
//! A gateway turns the current conversation context, plus the rounds already
//! taken in this turn, into the next [`Round`]: final text, a direct tool
//! request, or a program for the sandbox.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use beacon_types::{Context, Round, RoundRecord};

use crate::error::{LlmError, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Shared Retry Logic
// ─────────────────────────────────────────────────────────────────────────────

/// Execute an async operation with exponential backoff retry.
///
/// Retries only on transient errors. Fatal errors are returned immediately.
pub async fn with_retry<F, Fut, T>(
    max_retries: u32,
    initial_backoff: Duration,
    gateway_name: &str,
    mut f: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut backoff = initial_backoff;
    let mut attempt = 0;

    loop {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) if !e.is_retryable() || attempt >= max_retries => return Err(e),
            Err(e) => {
                let wait = e.retry_after().unwrap_or(backoff);
                tracing::warn!(
                    gateway = gateway_name,
                    attempt = attempt + 1,
                    max_retries = max_retries,
                    backoff_ms = wait.as_millis() as u64,
                    error = %e,
                    "Model request failed, retrying"
                );
                tokio::time::sleep(wait).await;
                backoff *= 2;
                attempt += 1;
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Request
// ─────────────────────────────────────────────────────────────────────────────

/// Everything a gateway needs to produce the next round.
#[derive(Debug, Clone, Default)]
pub struct ModelRequest {
    /// Optional system instructions.
    pub system_prompt: Option<String>,
    /// Conversation history and tool declarations.
    pub context: Context,
    /// Rounds already taken in this turn, with their outcomes.
    pub rounds: Vec<RoundRecord>,
}

impl ModelRequest {
    pub fn new(context: Context) -> Self {
        Self {
            system_prompt: None,
            context,
            rounds: Vec::new(),
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_rounds(mut self, rounds: Vec<RoundRecord>) -> Self {
        self.rounds = rounds;
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Gateway Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Sends a context to a model and interprets its reply as a [`Round`].
///
/// Implementations must not retry internally; the orchestration loop owns
/// retry policy and cancellation so it can stop between attempts.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Ask the model for the next round.
    async fn ask(&self, request: &ModelRequest) -> Result<Round>;

    /// Name of this gateway, for logs.
    fn name(&self) -> &str;

    /// Check if the gateway is reachable and configured.
    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

/// A gateway that can be shared across tasks.
pub type SharedGateway = Arc<dyn ModelGateway>;

/// Reject a round the loop cannot act on.
pub fn validate_round(round: &Round) -> Result<()> {
    match round {
        Round::FinalText { .. } => Ok(()),
        Round::DirectToolRequest { call } if call.tool_name.trim().is_empty() => Err(
            LlmError::InvalidRequest("tool request has an empty tool name".to_string()),
        ),
        Round::DirectToolRequest { .. } => Ok(()),
        Round::ProgramRequest { code, .. } if code.trim().is_empty() => Err(
            LlmError::InvalidRequest("program request has no code".to_string()),
        ),
        Round::ProgramRequest { .. } => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_types::ToolCall;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_retry_recovers_from_transient() {
        let attempts = AtomicU32::new(0);
        let result = with_retry(2, Duration::from_millis(1), "test", || async {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(LlmError::Network("reset".to_string()))
            } else {
                Ok(n)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max() {
        let attempts = AtomicU32::new(0);
        let result: Result<()> = with_retry(1, Duration::from_millis(1), "test", || async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(LlmError::Overloaded("busy".to_string()))
        })
        .await;

        assert!(matches!(result, Err(LlmError::Overloaded(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retry_skips_fatal() {
        let attempts = AtomicU32::new(0);
        let result: Result<()> = with_retry(5, Duration::from_millis(1), "test", || async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(LlmError::Auth("bad key".to_string()))
        })
        .await;

        assert!(matches!(result, Err(LlmError::Auth(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_validate_round() {
        assert!(validate_round(&Round::text("ok")).is_ok());
        assert!(validate_round(&Round::program("p", "  ")).is_err());
        let call = ToolCall::direct("", serde_json::json!({}));
        assert!(validate_round(&Round::tool(call)).is_err());
    }
}

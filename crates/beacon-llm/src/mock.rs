//! Scripted gateway for tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;

use beacon_types::Round;

use crate::error::{LlmError, Result};
use crate::gateway::{ModelGateway, ModelRequest};

/// A mock gateway for testing purposes.
///
/// Returns pre-configured rounds (or errors) in order, useful for
/// deterministic testing of the orchestration loop. Once the script is
/// exhausted the repeating round is returned if set, otherwise an error.
#[derive(Debug)]
pub struct MockGateway {
    name: String,
    script: Mutex<VecDeque<Result<Round>>>,
    repeat: Option<Round>,
    delay: Option<Duration>,
    request_log: Mutex<Vec<ModelRequest>>,
}

impl MockGateway {
    /// Create a mock gateway with the given rounds.
    pub fn new(rounds: Vec<Round>) -> Self {
        Self::scripted(rounds.into_iter().map(Ok).collect())
    }

    /// Create a mock gateway from rounds and errors interleaved.
    pub fn scripted(script: Vec<Result<Round>>) -> Self {
        Self {
            name: "mock".to_string(),
            script: Mutex::new(script.into()),
            repeat: None,
            delay: None,
            request_log: Mutex::new(Vec::new()),
        }
    }

    /// Create a mock gateway that answers once with text.
    pub fn with_text(text: impl Into<String>) -> Self {
        Self::new(vec![Round::text(text)])
    }

    /// Return `round` forever once the script runs out.
    pub fn repeating(mut self, round: Round) -> Self {
        self.repeat = Some(round);
        self
    }

    /// Sleep before every answer.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Get all requests that were made to this gateway.
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.request_log.lock().clone()
    }

    /// Get the number of requests made.
    pub fn request_count(&self) -> usize {
        self.request_log.lock().len()
    }
}

#[async_trait]
impl ModelGateway for MockGateway {
    async fn ask(&self, request: &ModelRequest) -> Result<Round> {
        self.request_log.lock().push(request.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = self.script.lock().pop_front();
        match (next, &self.repeat) {
            (Some(result), _) => result,
            (None, Some(round)) => Ok(round.clone()),
            (None, None) => Err(LlmError::Backend(
                "MockGateway: no more responses available".to_string(),
            )),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

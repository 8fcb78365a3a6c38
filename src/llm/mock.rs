//! Deterministic `AgentRuntime` for tests: returns a scripted sequence of
//! responses rather than calling out to a real provider.

use super::provider::{AgentRuntime, LlmResult};
use super::types::{LlmRequest, LlmResponse};
use async_trait::async_trait;
use std::sync::Mutex;

pub struct MockRuntime {
    responses: Mutex<Vec<LlmResponse>>,
    requests_seen: Mutex<Vec<LlmRequest>>,
}

impl MockRuntime {
    /// Responses are consumed in order, first call pops the front one.
    /// If the script runs out, the last response is repeated.
    pub fn scripted(responses: Vec<LlmResponse>) -> Self {
        Self {
            responses: Mutex::new(responses),
            requests_seen: Mutex::new(Vec::new()),
        }
    }

    pub fn requests_seen(&self) -> Vec<LlmRequest> {
        self.requests_seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl AgentRuntime for MockRuntime {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: LlmRequest) -> LlmResult<LlmResponse> {
        self.requests_seen.lock().unwrap().push(request);
        let mut responses = self.responses.lock().unwrap();
        if responses.len() > 1 {
            Ok(responses.remove(0))
        } else {
            Ok(responses.first().cloned().unwrap_or_default())
        }
    }
}

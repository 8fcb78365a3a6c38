//! The `AgentRuntime` trait (§6.3): the pipeline's only dependency on an
//! actual LLM. Grounded on `agenticlaw-llm::LlmProvider`, narrowed from a
//! streaming contract to a single-turn chat completion since P4 drives its
//! own bounded tool loop rather than rendering output live.

use super::types::{LlmRequest, LlmResponse};
use async_trait::async_trait;

pub type LlmResult<T> = Result<T, LlmError>;

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("request failed: {0}")]
    RequestFailed(String),
    #[error("authentication failed: {0}")]
    AuthFailed(String),
    #[error("rate limited")]
    RateLimited,
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error(transparent)]
    Network(#[from] reqwest::Error),
}

#[async_trait]
pub trait AgentRuntime: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, request: LlmRequest) -> LlmResult<LlmResponse>;
}

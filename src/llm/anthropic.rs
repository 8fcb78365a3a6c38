//! Real `AgentRuntime` backed by the Anthropic Messages API, non-streaming.

use super::provider::{AgentRuntime, LlmError, LlmResult};
use super::types::{ContentBlock, LlmContent, LlmRequest, LlmResponse, StopReason};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";

pub struct AnthropicRuntime {
    client: Client,
    api_key: String,
    base_url: String,
}

impl AnthropicRuntime {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

#[async_trait]
impl AgentRuntime for AnthropicRuntime {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn complete(&self, request: LlmRequest) -> LlmResult<LlmResponse> {
        let body = AnthropicRequest {
            model: request.model.clone(),
            messages: request
                .messages
                .iter()
                .map(|m| AnthropicMessage {
                    role: m.role.clone(),
                    content: match &m.content {
                        LlmContent::Text(s) => serde_json::json!(s),
                        LlmContent::Blocks(blocks) => serde_json::to_value(blocks).unwrap_or_default(),
                    },
                })
                .collect(),
            max_tokens: request.max_tokens,
            system: request.system.clone(),
            tools: request.tools.as_ref().map(|tools| {
                tools
                    .iter()
                    .map(|t| AnthropicTool {
                        name: t.name.clone(),
                        description: t.description.clone(),
                        input_schema: t.input_schema.clone(),
                    })
                    .collect()
            }),
        };

        debug!(model = %body.model, "sending synthesis request");

        let response = self
            .client
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(%status, "anthropic request failed");
            return Err(match status.as_u16() {
                401 | 403 => LlmError::AuthFailed(text),
                429 => LlmError::RateLimited,
                _ => LlmError::RequestFailed(format!("{status}: {text}")),
            });
        }

        let parsed: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        Ok(LlmResponse {
            blocks: parsed.content,
            stop_reason: match parsed.stop_reason.as_deref() {
                Some("tool_use") => StopReason::ToolUse,
                Some("max_tokens") => StopReason::MaxTokens,
                Some("end_turn") | None => StopReason::EndTurn,
                _ => StopReason::Other,
            },
        })
    }
}

#[derive(Serialize)]
struct AnthropicRequest {
    model: String,
    messages: Vec<AnthropicMessage>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<AnthropicTool>>,
}

#[derive(Serialize)]
struct AnthropicMessage {
    role: String,
    content: serde_json::Value,
}

#[derive(Serialize)]
struct AnthropicTool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
    stop_reason: Option<String>,
}

//! The pipeline's single point of contact with a language model (§6.3).
//!
//! `AgentRuntime` is the trait P4 synthesis drives; [`anthropic::AnthropicRuntime`]
//! is the production implementation and [`mock::MockRuntime`] is the
//! deterministic double used throughout the test suite.

pub mod anthropic;
pub mod mock;
pub mod provider;
pub mod types;

pub use provider::{AgentRuntime, LlmError, LlmResult};
pub use types::{ContentBlock, LlmContent, LlmMessage, LlmRequest, LlmResponse, LlmTool, StopReason};

/// Model identifier used when none is supplied on the command line or via
/// `FEATURE_AGENT_MODEL`. A concrete, generally-available model rather than
/// a placeholder, so a default run is never silently misconfigured.
pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";

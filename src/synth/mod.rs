//! P4 — Synthesize Code (§4.6), the hardest subsystem in the pipeline.
//!
//! Drives the LLM through a bounded tool loop wrapped in three independent
//! middleware layers (intent-reminder, output guardrail, tool-call
//! guardrail — [`middleware`]), then extracts well-formed [`crate::state::Patch`]
//! records from the resulting tool-invocation log ([`patch_extract`]).
//! Scope is computed once, before any model call, and never recomputed
//! mid-loop ([`scope`]).

pub mod middleware;
pub mod patch_extract;
pub mod prompt;
pub mod scope;
pub mod tools;

use crate::framework::FrameworkAdapter;
use crate::llm::{AgentRuntime, LlmContent, LlmMessage, LlmRequest};
use crate::state::{FeatureSpec, GuardrailMode, ImpactAnalysis, Patch, Phase, RefactoringPlan};
use std::path::Path;
use std::time::{Duration, Instant};

pub use scope::{compute_scope, Scope};

/// Per-iteration model-call timeout (§5: "P4 per-iteration default 30-60s").
const PER_ITERATION_TIMEOUT: Duration = Duration::from_secs(45);
/// Overall wall-clock cap on the agent loop (§5 default ~600s).
const WALL_CLOCK_CAP: Duration = Duration::from_secs(600);
/// Iteration cap independent of wall-clock, guards against a model that
/// never stops emitting tool calls inside the timeout window.
const MAX_ITERATIONS: usize = 25;

pub struct SynthesisOutcome {
    pub patches: Vec<Patch>,
    pub scope: Scope,
}

/// Run P4 end to end: compute scope, run the guarded agent loop, extract
/// patches. Never panics; every failure mode degrades to an empty or
/// partial patch list plus a recorded error (§4.6.4 failure semantics).
#[allow(clippy::too_many_arguments)]
pub async fn synthesize_code(
    codebase_path: &Path,
    feature_spec: &FeatureSpec,
    impact: &ImpactAnalysis,
    refactoring_plan: Option<&RefactoringPlan>,
    adapter: &dyn FrameworkAdapter,
    runtime: &dyn AgentRuntime,
    guardrail_enabled: bool,
    guardrail_mode: GuardrailMode,
    errors_sink: &mut Vec<(Phase, String)>,
) -> SynthesisOutcome {
    let scope = compute_scope(codebase_path, feature_spec, impact, refactoring_plan, adapter);
    if scope.fallback_used {
        errors_sink.push((
            Phase::SynthesizeCode,
            format!(
                "scope computation yielded no in-scope files; falling back to conventional \
                 source root `{}`",
                adapter.conventional_source_root()
            ),
        ));
    }

    let system = prompt::build_prompt(feature_spec, impact, refactoring_plan, adapter, &scope);
    let mut messages = vec![LlmMessage {
        role: "user".to_string(),
        content: feature_spec.intent_summary.as_str().into(),
    }];

    let mut log: Vec<tools::ToolInvocation> = Vec::new();
    let start = Instant::now();
    let mut guardrail_terminated = false;

    for _ in 0..MAX_ITERATIONS {
        if start.elapsed() > WALL_CLOCK_CAP {
            errors_sink.push((
                Phase::SynthesizeCode,
                format!("synthesis exceeded its {}s wall-clock cap; using patches emitted so far", WALL_CLOCK_CAP.as_secs()),
            ));
            break;
        }

        let reminder = middleware::intent_reminder(feature_spec, &scope);
        let request = LlmRequest {
            model: crate::llm::DEFAULT_MODEL.to_string(),
            messages: messages.clone(),
            tools: Some(tools::tool_definitions()),
            max_tokens: 4096,
            system: Some(format!("{system}\n\n{reminder}")),
        };

        let response = match tokio::time::timeout(PER_ITERATION_TIMEOUT, runtime.complete(request)).await {
            Ok(Ok(r)) => r,
            Ok(Err(e)) => {
                errors_sink.push((Phase::SynthesizeCode, format!("synthesis call failed: {e}")));
                break;
            }
            Err(_) => {
                errors_sink.push((
                    Phase::SynthesizeCode,
                    format!("synthesis iteration exceeded its {}s timeout", PER_ITERATION_TIMEOUT.as_secs()),
                ));
                break;
            }
        };

        let (response, violation) = middleware::apply_output_guardrail(
            response,
            &scope,
            guardrail_enabled,
            guardrail_mode,
        );
        if let Some(message) = violation {
            errors_sink.push((Phase::SynthesizeCode, message));
            if guardrail_enabled && guardrail_mode == GuardrailMode::Strict {
                messages.push(LlmMessage {
                    role: "assistant".to_string(),
                    content: LlmContent::Blocks(response.blocks.clone()),
                });
                guardrail_terminated = true;
                break;
            }
        }

        let tool_calls = response.tool_calls();
        messages.push(LlmMessage {
            role: "assistant".to_string(),
            content: LlmContent::Blocks(response.blocks.clone()),
        });

        if tool_calls.is_empty() {
            // No further tool calls: the model considers the turn finished.
            break;
        }

        let mut result_blocks = Vec::with_capacity(tool_calls.len());
        for (id, name, input) in tool_calls {
            let invocation = tools::execute_tool(
                codebase_path,
                id,
                name,
                input,
                &scope,
                guardrail_enabled,
                guardrail_mode,
                errors_sink,
            );
            result_blocks.push(invocation.as_tool_result_block());
            log.push(invocation);
        }
        messages.push(LlmMessage {
            role: "user".to_string(),
            content: LlmContent::Blocks(result_blocks),
        });
    }

    let patches = patch_extract::extract_patches(&log, feature_spec, errors_sink);
    if patches.is_empty() {
        let reason = if guardrail_terminated {
            "synthesis ended on a strict-mode scope violation with no valid patches"
        } else {
            "synthesis produced no valid patches"
        };
        errors_sink.push((Phase::SynthesizeCode, reason.to_string()));
    }

    SynthesisOutcome { patches, scope }
}

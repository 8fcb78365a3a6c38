//! The seven-phase workflow graph (§2, §4.8) that drives the agent from
//! request to patch set over a shared [`AgentState`].
//!
//! Phases are nodes in a [`petgraph::graph::DiGraph`]; [`phase_graph`] is
//! the declared topology (every phase has an edge to the terminal error
//! node, per §4.8). The actual walk in [`run`] does not traverse the graph
//! node-by-node — routing is a fixed sequence with skip/terminate branches,
//! not genuine multi-successor fan-out, so `phase_graph` exists to document
//! and test the topology rather than to drive dispatch.
//!
//! Routing functions are pure: they inspect `&AgentState` and return a
//! [`RouteDecision`], never mutating state fields another phase owns (§4.8).

use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

use crate::config::Config;
use crate::error::AgentError;
use crate::execution::{self, sandbox::SandboxRuntime};
use crate::framework::{self, Language};
use crate::impact;
use crate::intent;
use crate::llm::AgentRuntime;
use crate::state::{AgentState, GuardrailMode, Phase};
use crate::structure;
use crate::{checkpoint, context, entities, synth};

/// What a routing function decided between two phases (§4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    Proceed,
    Skip,
    Terminate,
}

/// The declared seven-phase topology plus the terminal error node every
/// phase can route to. See the module doc for why `run` doesn't walk this
/// directly.
pub fn phase_graph() -> DiGraph<Phase, ()> {
    let mut graph = DiGraph::new();
    let phases = [
        Phase::Start,
        Phase::AnalyzeContext,
        Phase::DiscoverEntities,
        Phase::ParseIntent,
        Phase::ValidateStructure,
        Phase::AnalyzeImpact,
        Phase::SynthesizeCode,
        Phase::ExecuteChanges,
    ];
    let nodes: HashMap<Phase, NodeIndex> =
        phases.into_iter().map(|p| (p, graph.add_node(p))).collect();

    let edges = [
        (Phase::Start, Phase::AnalyzeContext),
        (Phase::AnalyzeContext, Phase::DiscoverEntities),
        (Phase::DiscoverEntities, Phase::ParseIntent),
        (Phase::ParseIntent, Phase::ValidateStructure),
        (Phase::ValidateStructure, Phase::AnalyzeImpact),
        (Phase::AnalyzeImpact, Phase::SynthesizeCode),
        (Phase::SynthesizeCode, Phase::ExecuteChanges),
    ];
    for (from, to) in edges {
        graph.add_edge(nodes[&from], nodes[&to], ());
    }

    let error_node = graph.add_node(Phase::Error);
    for idx in nodes.values() {
        graph.add_edge(*idx, error_node, ());
    }

    graph
}

/// §4.8(a)/(b): terminate once a fatal error has been recorded, or once P4
/// is about to run without a `feature_spec`.
fn route_on_fatal_or_missing_spec(state: &AgentState) -> RouteDecision {
    if state.has_fatal_error() {
        return RouteDecision::Terminate;
    }
    if state.feature_spec.is_none() {
        return RouteDecision::Terminate;
    }
    RouteDecision::Proceed
}

pub fn route_after_discover_entities(state: &AgentState) -> RouteDecision {
    if state.has_fatal_error() {
        return RouteDecision::Terminate;
    }
    RouteDecision::Proceed
}

pub fn route_after_parse_intent(state: &AgentState) -> RouteDecision {
    route_on_fatal_or_missing_spec(state)
}

/// §4.4: P2A is optional; `skip_structure_validation` lets the CLI disable
/// it without that counting as an error.
pub fn route_before_structure_validation(skip_requested: bool) -> RouteDecision {
    if skip_requested {
        RouteDecision::Skip
    } else {
        RouteDecision::Proceed
    }
}

pub fn route_before_synthesis(state: &AgentState) -> RouteDecision {
    route_on_fatal_or_missing_spec(state)
}

/// §4.8(c): scope computation fell back to the conventional source root
/// AND the user configured strict guardrails — terminate rather than let
/// P5 apply whatever the model produced against an unscoped fallback.
pub fn route_after_synthesis(scope_fallback_used: bool, guardrail_mode: GuardrailMode) -> RouteDecision {
    if scope_fallback_used && guardrail_mode == GuardrailMode::Strict {
        RouteDecision::Terminate
    } else {
        RouteDecision::Proceed
    }
}

fn drain_sink(state: &mut AgentState, sink: Vec<(Phase, String)>) {
    for (phase, message) in sink {
        state.record_warning(phase, message);
    }
}

fn checkpoint_if_configured(config: &Config, state: &AgentState) {
    if let Some(dir) = &config.checkpoint_dir {
        checkpoint::save(dir, state);
    }
}

/// Run the full pipeline end to end. Returns the final `AgentState` on
/// success, or `Err` only for the fatal-termination / input-error cases
/// that §7 maps to a non-zero exit; every other failure mode is recorded in
/// `state.errors` and the phase degrades instead of aborting the process.
pub async fn run(
    config: &Config,
    runtime: &dyn AgentRuntime,
    sandbox_runtime: Option<&dyn SandboxRuntime>,
) -> Result<AgentState, AgentError> {
    let run_id = uuid::Uuid::new_v4();
    tracing::info!(%run_id, codebase = %config.codebase_path.display(), "starting workflow run");

    let mut state = AgentState::new(
        config.codebase_path.clone(),
        config.feature_request.clone(),
        config.mode,
        config.guardrail_mode,
        config.guardrail_enabled,
        config.sandbox_enabled,
        config.max_iterations,
    );
    checkpoint_if_configured(config, &state);

    // P1 — Analyze Context
    let mut sink = Vec::new();
    let context_analysis = context::analyze_context(&state.codebase_path, &mut sink);
    drain_sink(&mut state, sink);
    tracing::info!(
        framework = %context_analysis.framework_candidate,
        language = %context_analysis.language,
        "analyzed repository context"
    );
    state.context_analysis = Some(context_analysis);
    state.current_phase = Phase::AnalyzeContext;
    checkpoint_if_configured(config, &state);

    // P1.5 — Discover Existing Entities
    let language = Language::from_str_tag(&state.context_analysis.as_ref().unwrap().language);
    let mut sink = Vec::new();
    let existing_entities = entities::discover_entities(&state.codebase_path, language, &mut sink);
    drain_sink(&mut state, sink);
    tracing::info!(count = existing_entities.entities.len(), "discovered existing entities");
    state.existing_entities = Some(existing_entities);
    state.current_phase = Phase::DiscoverEntities;
    checkpoint_if_configured(config, &state);

    if route_after_discover_entities(&state) == RouteDecision::Terminate {
        state.current_phase = Phase::Error;
        return Err(AgentError::WorkflowFatal(first_fatal_message(&state)));
    }

    // P2 — Parse Intent
    let context_analysis = state.context_analysis.clone().unwrap();
    let framework_tag = framework::confirm_framework(
        &context_analysis.framework_candidate,
        &state.feature_request,
    );
    let adapter = framework::adapter_for_tag(&framework_tag, language);

    let mut sink = Vec::new();
    let feature_spec = intent::parse_intent(
        &state.feature_request,
        &framework_tag,
        state.existing_entities.as_ref().unwrap(),
        adapter.as_ref(),
        runtime,
        &mut sink,
    )
    .await;
    drain_sink(&mut state, sink);

    if !feature_spec.partition_is_valid() {
        state.record_fatal(
            Phase::ParseIntent,
            "entities_to_extend and entities_to_create overlap",
        );
    }
    if !feature_spec.todo_dag_is_acyclic() {
        state.record_fatal(Phase::ParseIntent, "todo_list depends_on graph has a cycle");
    }

    state.framework = Some(framework_tag);
    state.feature_spec = Some(feature_spec);
    state.current_phase = Phase::ParseIntent;
    checkpoint_if_configured(config, &state);

    if route_after_parse_intent(&state) == RouteDecision::Terminate {
        state.current_phase = Phase::Error;
        return Err(AgentError::WorkflowFatal(first_fatal_message(&state)));
    }

    // P2A — Validate Structure (optional)
    match route_before_structure_validation(config.skip_structure_validation) {
        RouteDecision::Skip => {
            tracing::info!("skipping structure validation per configuration");
        }
        _ => {
            let assessment = structure::validate_structure(
                &state.codebase_path,
                state.existing_entities.as_ref().unwrap(),
                adapter.as_ref(),
            );
            tracing::info!(
                score = assessment.score,
                production_ready = assessment.is_production_ready,
                "validated project structure"
            );
            state.structure_assessment = Some(assessment);
        }
    }
    state.current_phase = Phase::ValidateStructure;
    checkpoint_if_configured(config, &state);

    // P3 — Analyze Impact
    let mut sink = Vec::new();
    let impact_analysis = impact::analyze_impact(
        &state.codebase_path,
        state.feature_spec.as_ref().unwrap(),
        state.context_analysis.as_ref().unwrap(),
        runtime,
        &mut sink,
    )
    .await;
    drain_sink(&mut state, sink);
    state.impact_analysis = Some(impact_analysis);
    state.current_phase = Phase::AnalyzeImpact;
    checkpoint_if_configured(config, &state);

    // P4 — Synthesize Code
    if route_before_synthesis(&state) == RouteDecision::Terminate {
        state.current_phase = Phase::Error;
        return Err(AgentError::WorkflowFatal(first_fatal_message(&state)));
    }

    let mut sink = Vec::new();
    let refactoring_plan = state
        .structure_assessment
        .as_ref()
        .map(|a| &a.refactoring_plan);
    let outcome = synth::synthesize_code(
        &state.codebase_path,
        state.feature_spec.as_ref().unwrap(),
        state.impact_analysis.as_ref().unwrap(),
        refactoring_plan,
        adapter.as_ref(),
        runtime,
        state.guardrail_enabled,
        state.guardrail_mode,
        &mut sink,
    )
    .await;
    drain_sink(&mut state, sink);

    if outcome.patches.is_empty() && state.errors.iter().all(|e| !e.is_fatal()) {
        state.record_warning(
            Phase::SynthesizeCode,
            "synthesis produced no valid patches; execution will be a no-op",
        );
    }
    state.patches = outcome.patches;
    state.current_phase = Phase::SynthesizeCode;
    checkpoint_if_configured(config, &state);

    if route_after_synthesis(outcome.scope.fallback_used, state.guardrail_mode)
        == RouteDecision::Terminate
    {
        state.record_fatal(
            Phase::SynthesizeCode,
            "scope fell back to the conventional source root under strict guardrails",
        );
        state.current_phase = Phase::Error;
        return Err(AgentError::WorkflowFatal(first_fatal_message(&state)));
    }

    // P5 — Execute Changes
    let mut results = execution::apply_patches(&state.codebase_path, &state.patches, state.mode);

    if config.sandbox_enabled {
        if let Some(sandbox_runtime) = sandbox_runtime {
            let sandbox = execution::run_sandbox_verification(
                sandbox_runtime,
                &state.codebase_path,
                &config.sandbox_build_command,
                &config.sandbox_run_command,
                state.max_iterations,
            )
            .await;

            if let Some(error_type) = sandbox.error_type {
                if !sandbox.build_success || !sandbox.run_success {
                    results.errors.push(format!(
                        "sandbox verification failed: {error_type:?} after {} iteration(s)",
                        sandbox.iterations
                    ));
                }
            }
            let critical = sandbox.build_success && !sandbox.run_success;
            results.sandbox = Some(sandbox);

            if critical {
                state.execution_results = Some(results);
                state.current_phase = Phase::ExecuteChanges;
                return Err(AgentError::SandboxCritical(
                    state
                        .execution_results
                        .as_ref()
                        .and_then(|r| r.sandbox.as_ref())
                        .and_then(|s| s.error_type)
                        .unwrap_or(crate::error::SandboxErrorType::Unknown),
                ));
            }
        }
    }

    state.execution_results = Some(results);
    state.current_phase = Phase::ExecuteChanges;
    checkpoint_if_configured(config, &state);

    Ok(state)
}

fn first_fatal_message(state: &AgentState) -> String {
    state
        .errors
        .iter()
        .find(|e| e.is_fatal())
        .map(|e| format!("[{}] {}", e.phase, e.message))
        .unwrap_or_else(|| "workflow terminated without a recorded fatal error".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::MockRuntime;
    use crate::llm::{ContentBlock, LlmResponse, StopReason};
    use crate::state::{GuardrailMode as StateGuardrailMode, Mode as StateMode};
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn phase_graph_has_error_edges_from_every_phase() {
        let graph = phase_graph();
        // 8 real phases + 1 error node
        assert_eq!(graph.node_count(), 9);
        // one forward edge per consecutive pair (7) + one error edge per phase (8)
        assert_eq!(graph.edge_count(), 7 + 8);
    }

    #[test]
    fn route_terminates_on_fatal_error() {
        let mut state = AgentState::new(
            std::env::temp_dir(),
            "x".to_string(),
            StateMode::DryRun,
            StateGuardrailMode::Strict,
            true,
            false,
            10,
        );
        state.record_fatal(Phase::ParseIntent, "boom");
        assert_eq!(route_after_parse_intent(&state), RouteDecision::Terminate);
    }

    #[test]
    fn route_skips_structure_validation_when_requested() {
        assert_eq!(
            route_before_structure_validation(true),
            RouteDecision::Skip
        );
        assert_eq!(
            route_before_structure_validation(false),
            RouteDecision::Proceed
        );
    }

    #[test]
    fn route_terminates_on_strict_fallback_scope() {
        assert_eq!(
            route_after_synthesis(true, StateGuardrailMode::Strict),
            RouteDecision::Terminate
        );
        assert_eq!(
            route_after_synthesis(true, StateGuardrailMode::Soft),
            RouteDecision::Proceed
        );
        assert_eq!(
            route_after_synthesis(false, StateGuardrailMode::Strict),
            RouteDecision::Proceed
        );
    }

    fn intent_response(name: &str, action: &str) -> LlmResponse {
        LlmResponse {
            blocks: vec![ContentBlock::ToolUse {
                id: "1".into(),
                name: "record_feature_intent".into(),
                input: serde_json::json!({
                    "feature_name": "Add stock tracking",
                    "intent_summary": format!("Add stock tracking to {name}"),
                    "entities": [{"name": name, "action": action, "fields_to_add": [["stockLevel", "int"]], "methods_to_add": []}]
                }),
            }],
            stop_reason: StopReason::ToolUse,
        }
    }

    fn impact_response() -> LlmResponse {
        LlmResponse {
            blocks: vec![ContentBlock::ToolUse {
                id: "2".into(),
                name: "record_architecture_insights".into(),
                input: serde_json::json!({
                    "patterns_to_follow": [],
                    "constraints": [],
                    "testing_approach": "",
                    "architecture_insights": ""
                }),
            }],
            stop_reason: StopReason::ToolUse,
        }
    }

    fn done_response() -> LlmResponse {
        LlmResponse {
            blocks: vec![ContentBlock::Text { text: "Done.".into() }],
            stop_reason: StopReason::EndTurn,
        }
    }

    #[tokio::test]
    async fn extend_existing_entity_end_to_end_produces_one_edit_patch() {
        let dir = tempdir().unwrap();
        let model_dir = dir.path().join("src/main/java/com/example/model");
        fs::create_dir_all(&model_dir).unwrap();
        fs::write(
            model_dir.join("Product.java"),
            "public class Product {\n    private Long id;\n    private String name;\n    private double price;\n}\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("pom.xml"),
            "<project><dependencies><dependency><artifactId>spring-boot-starter-web</artifactId></dependency></dependencies></project>",
        )
        .unwrap();

        let product_path = model_dir.join("Product.java");
        let edit_response = LlmResponse {
            blocks: vec![ContentBlock::ToolUse {
                id: "3".into(),
                name: "edit_file".into(),
                input: serde_json::json!({
                    "path": product_path.to_string_lossy(),
                    "old_string": "private double price;",
                    "new_string": "private double price;\n    private int stockLevel;",
                    "description": "add stock tracking"
                }),
            }],
            stop_reason: StopReason::ToolUse,
        };

        let runtime = MockRuntime::scripted(vec![
            intent_response("Product", "extend"),
            impact_response(),
            edit_response,
            done_response(),
        ]);

        let config = Config {
            codebase_path: dir.path().to_path_buf(),
            feature_request: "Add stock tracking to products".to_string(),
            mode: StateMode::DryRun,
            guardrail_mode: StateGuardrailMode::Strict,
            guardrail_enabled: true,
            skip_structure_validation: true,
            sandbox_enabled: false,
            max_iterations: 10,
            model: crate::llm::DEFAULT_MODEL.to_string(),
            llm_api_key: "test".to_string(),
            sandbox_api_key: None,
            checkpoint_dir: None,
            sandbox_build_command: "true".to_string(),
            sandbox_run_command: "true".to_string(),
        };

        let state = run(&config, &runtime, None).await.expect("workflow should succeed");

        let spec = state.feature_spec.unwrap();
        assert_eq!(spec.entities_to_extend, vec!["Product".to_string()]);
        assert!(spec.entities_to_create.is_empty());
        assert_eq!(state.patches.len(), 1);
        assert_eq!(state.patches[0].tool, crate::state::PatchTool::EditFile);
        assert_eq!(state.patches[0].file, product_path);
    }
}

//! P3 — Analyze Impact (§4.5).
//!
//! The `files_to_modify` union is deterministic and always computed; the
//! pattern/constraint/testing-approach fields are LLM-derived under a hard
//! timeout and degrade to empty rather than failing the phase.

use crate::llm::{AgentRuntime, LlmMessage, LlmRequest, LlmTool};
use crate::state::{ContextAnalysis, FeatureSpec, ImpactAnalysis, Phase};
use std::path::Path;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(30);
const MAX_EXCERPT_FILES: usize = 6;
const EXCERPT_LINES: usize = 40;

pub async fn analyze_impact(
    codebase_path: &Path,
    feature_spec: &FeatureSpec,
    context: &ContextAnalysis,
    runtime: &dyn AgentRuntime,
    errors_sink: &mut Vec<(Phase, String)>,
) -> ImpactAnalysis {
    let files_to_modify = files_to_modify_union(feature_spec);

    let prompt = build_prompt(codebase_path, context, &files_to_modify);
    let request = LlmRequest {
        model: crate::llm::DEFAULT_MODEL.to_string(),
        messages: vec![LlmMessage {
            role: "user".to_string(),
            content: prompt.as_str().into(),
        }],
        tools: Some(vec![architecture_tool()]),
        max_tokens: 1536,
        system: Some(
            "You study an existing codebase's conventions before a feature is added to it. \
             Call record_architecture_insights exactly once."
                .to_string(),
        ),
    };

    match tokio::time::timeout(TIMEOUT, runtime.complete(request)).await {
        Ok(Ok(response)) => {
            let draft = response
                .tool_calls()
                .into_iter()
                .find(|(_, name, _)| *name == "record_architecture_insights")
                .and_then(|(_, _, input)| serde_json::from_value::<ArchitectureDraft>(input.clone()).ok());

            match draft {
                Some(draft) => ImpactAnalysis {
                    patterns_to_follow: draft.patterns_to_follow,
                    files_to_modify,
                    constraints: draft.constraints,
                    testing_approach: draft.testing_approach,
                    architecture_insights: draft.architecture_insights,
                    degraded: false,
                },
                None => {
                    errors_sink.push((
                        Phase::AnalyzeImpact,
                        "model returned no usable architecture analysis; proceeding with a neutral analysis"
                            .to_string(),
                    ));
                    neutral(files_to_modify)
                }
            }
        }
        Ok(Err(e)) => {
            errors_sink.push((Phase::AnalyzeImpact, format!("architecture analysis call failed: {e}")));
            neutral(files_to_modify)
        }
        Err(_) => {
            errors_sink.push((
                Phase::AnalyzeImpact,
                format!("architecture analysis exceeded its {}s timeout", TIMEOUT.as_secs()),
            ));
            neutral(files_to_modify)
        }
    }
}

fn files_to_modify_union(feature_spec: &FeatureSpec) -> Vec<String> {
    let mut files = feature_spec.affected_files.clone();
    files.extend(feature_spec.modifications.iter().map(|m| m.file.clone()));
    files.sort();
    files.dedup();
    files
}

fn neutral(files_to_modify: Vec<String>) -> ImpactAnalysis {
    ImpactAnalysis {
        patterns_to_follow: Vec::new(),
        files_to_modify,
        constraints: Vec::new(),
        testing_approach: String::new(),
        architecture_insights: String::new(),
        degraded: true,
    }
}

fn build_prompt(codebase_path: &Path, context: &ContextAnalysis, files_to_modify: &[String]) -> String {
    let mut prompt = format!(
        "Language: {}\nFramework candidate: {}\nFiles about to be modified: {}\n\nSample file excerpts:\n",
        context.language,
        context.framework_candidate,
        files_to_modify.join(", "),
    );

    for rel_path in context.representative_files.iter().take(MAX_EXCERPT_FILES) {
        if let Ok(contents) = std::fs::read_to_string(codebase_path.join(rel_path)) {
            let excerpt: String = contents.lines().take(EXCERPT_LINES).collect::<Vec<_>>().join("\n");
            prompt.push_str(&format!("\n--- {rel_path} ---\n{excerpt}\n"));
        }
    }

    prompt
}

fn architecture_tool() -> LlmTool {
    LlmTool {
        name: "record_architecture_insights".to_string(),
        description: "Record design patterns observed, testing conventions, and constraints \
            for this codebase."
            .to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "required": ["patterns_to_follow", "constraints", "testing_approach", "architecture_insights"],
            "properties": {
                "patterns_to_follow": {"type": "array", "items": {"type": "string"}},
                "constraints": {"type": "array", "items": {"type": "string"}},
                "testing_approach": {"type": "string"},
                "architecture_insights": {"type": "string"}
            }
        }),
    }
}

#[derive(Debug, Default, serde::Deserialize)]
struct ArchitectureDraft {
    #[serde(default)]
    patterns_to_follow: Vec<String>,
    #[serde(default)]
    constraints: Vec<String>,
    #[serde(default)]
    testing_approach: String,
    #[serde(default)]
    architecture_insights: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::MockRuntime;
    use crate::llm::{ContentBlock, LlmResponse, StopReason};
    use crate::state::{ModificationAction, ModificationDescriptor};
    use tempfile::tempdir;
    use tokio_test::block_on;

    fn spec_with(affected: Vec<&str>, modified: Vec<&str>) -> FeatureSpec {
        FeatureSpec {
            feature_name: "f".into(),
            intent_summary: "s".into(),
            affected_files: affected.into_iter().map(String::from).collect(),
            entities_to_extend: vec![],
            entities_to_create: vec![],
            existing_context: vec![],
            new_files_planning: Default::default(),
            modifications: modified
                .into_iter()
                .map(|f| ModificationDescriptor {
                    file: f.to_string(),
                    entity: "E".into(),
                    action: ModificationAction::AddFields,
                    details: vec![],
                })
                .collect(),
            todo_list: vec![],
        }
    }

    #[test]
    fn unions_and_dedups_files_to_modify() {
        let spec = spec_with(vec!["a.rs", "b.rs"], vec!["b.rs", "c.rs"]);
        let union = files_to_modify_union(&spec);
        assert_eq!(union, vec!["a.rs".to_string(), "b.rs".to_string(), "c.rs".to_string()]);
    }

    #[test]
    fn degrades_on_model_error_without_losing_the_file_union() {
        struct FailingRuntime;
        #[async_trait::async_trait]
        impl AgentRuntime for FailingRuntime {
            fn name(&self) -> &str {
                "failing"
            }
            async fn complete(&self, _r: LlmRequest) -> crate::llm::LlmResult<LlmResponse> {
                Err(crate::llm::LlmError::RequestFailed("down".into()))
            }
        }

        let dir = tempdir().unwrap();
        let spec = spec_with(vec!["a.rs"], vec![]);
        let context = ContextAnalysis::default();
        let mut errors = Vec::new();

        let analysis = block_on(analyze_impact(dir.path(), &spec, &context, &FailingRuntime, &mut errors));
        assert!(analysis.degraded);
        assert_eq!(analysis.files_to_modify, vec!["a.rs".to_string()]);
        assert!(!errors.is_empty());
    }

    #[test]
    fn parses_successful_architecture_response() {
        let response = LlmResponse {
            blocks: vec![ContentBlock::ToolUse {
                id: "t".into(),
                name: "record_architecture_insights".into(),
                input: serde_json::json!({
                    "patterns_to_follow": ["repository"],
                    "constraints": ["no new dependencies"],
                    "testing_approach": "JUnit per service",
                    "architecture_insights": "layered MVC"
                }),
            }],
            stop_reason: StopReason::ToolUse,
        };
        let runtime = MockRuntime::scripted(vec![response]);
        let dir = tempdir().unwrap();
        let spec = spec_with(vec!["a.rs"], vec![]);
        let context = ContextAnalysis::default();
        let mut errors = Vec::new();

        let analysis = block_on(analyze_impact(dir.path(), &spec, &context, &runtime, &mut errors));
        assert!(!analysis.degraded);
        assert_eq!(analysis.testing_approach, "JUnit per service");
        assert!(errors.is_empty());
    }
}

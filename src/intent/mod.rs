//! P2 — Parse Intent.
//!
//! Turns the free-text feature request plus P1/P1.5's findings into a fully
//! populated [`FeatureSpec`]. Entity/field extraction is LLM-assisted (the
//! genuinely language-understanding part of this phase) with a single
//! repair attempt on malformed structured output (§9 Design Notes), falling
//! back to a deterministic heuristic when the model is unavailable or keeps
//! returning unusable JSON — P2 never fails the workflow outright.

mod naming;
mod planning;

use crate::framework::FrameworkAdapter;
use crate::llm::{AgentRuntime, ContentBlock, LlmContent, LlmMessage, LlmRequest, LlmTool};
use crate::state::{
    EntityAction, ExistingContext, ExistingEntities, FeatureSpec, ModificationAction,
    ModificationDescriptor, Phase,
};

pub use naming::names_match;

const MAX_TOKENS: u32 = 2048;

#[derive(Debug, Default, serde::Deserialize)]
struct IntentDraft {
    feature_name: String,
    intent_summary: String,
    #[serde(default)]
    entities: Vec<EntityDraft>,
}

#[derive(Debug, Default, serde::Deserialize)]
struct EntityDraft {
    name: String,
    action: String,
    #[serde(default)]
    fields_to_add: Vec<(String, String)>,
    #[serde(default)]
    methods_to_add: Vec<String>,
}

fn intent_tool() -> LlmTool {
    LlmTool {
        name: "record_feature_intent".to_string(),
        description: "Record the structured intent behind a feature request: its name, a \
            one-sentence summary, and the entities it touches."
            .to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "required": ["feature_name", "intent_summary", "entities"],
            "properties": {
                "feature_name": {"type": "string"},
                "intent_summary": {"type": "string"},
                "entities": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "required": ["name", "action"],
                        "properties": {
                            "name": {"type": "string"},
                            "action": {"type": "string", "enum": ["extend", "create"]},
                            "fields_to_add": {
                                "type": "array",
                                "items": {"type": "array", "items": {"type": "string"}}
                            },
                            "methods_to_add": {
                                "type": "array",
                                "items": {"type": "string"}
                            }
                        }
                    }
                }
            }
        }),
    }
}

fn system_prompt(framework_tag: &str, existing_names: &[String]) -> String {
    format!(
        "You analyze feature requests for a {framework_tag} repository. Existing entities: \
         [{}]. Call record_feature_intent exactly once with your analysis. An entity is \
         'extend' only if its name matches one of the existing entities; otherwise 'create'.",
        existing_names.join(", ")
    )
}

/// Run P2. Never fails: an unusable model response falls back to
/// [`heuristic_draft`] after one repair attempt.
pub async fn parse_intent(
    feature_request: &str,
    framework_tag: &str,
    existing: &ExistingEntities,
    adapter: &dyn FrameworkAdapter,
    runtime: &dyn AgentRuntime,
    errors_sink: &mut Vec<(Phase, String)>,
) -> FeatureSpec {
    let existing_names: Vec<String> = existing.entities.keys().cloned().collect();
    let draft = match llm_draft(feature_request, framework_tag, &existing_names, runtime).await {
        Some(draft) => draft,
        None => {
            errors_sink.push((
                Phase::ParseIntent,
                "model returned no usable structured intent; falling back to heuristic extraction"
                    .to_string(),
            ));
            naming::heuristic_draft(feature_request, &existing_names)
        }
    };

    build_feature_spec(draft, existing, adapter)
}

/// One attempt plus one repair attempt at getting a valid tool call back
/// (§9 Design Notes: "single-repair-attempt LLM structured output").
async fn llm_draft(
    feature_request: &str,
    framework_tag: &str,
    existing_names: &[String],
    runtime: &dyn AgentRuntime,
) -> Option<IntentDraft> {
    let mut messages = vec![LlmMessage {
        role: "user".to_string(),
        content: feature_request.into(),
    }];

    for attempt in 0..2 {
        let request = LlmRequest {
            model: crate::llm::DEFAULT_MODEL.to_string(),
            messages: messages.clone(),
            tools: Some(vec![intent_tool()]),
            max_tokens: MAX_TOKENS,
            system: Some(system_prompt(framework_tag, existing_names)),
        };

        let response = match runtime.complete(request).await {
            Ok(r) => r,
            Err(_) => return None,
        };

        let tool_call = response
            .tool_calls()
            .into_iter()
            .find(|(_, name, _)| *name == "record_feature_intent");

        match tool_call {
            Some((_, _, input)) => match serde_json::from_value::<IntentDraft>(input.clone()) {
                Ok(draft) if !draft.feature_name.is_empty() => return Some(draft),
                _ if attempt == 0 => {
                    messages.push(LlmMessage {
                        role: "assistant".to_string(),
                        content: LlmContent::Blocks(response.blocks.clone()),
                    });
                    messages.push(LlmMessage {
                        role: "user".to_string(),
                        content: "That call's arguments didn't match the schema. Call \
                            record_feature_intent again with valid JSON."
                            .into(),
                    });
                    continue;
                }
                _ => return None,
            },
            None if attempt == 0 => {
                messages.push(LlmMessage {
                    role: "assistant".to_string(),
                    content: LlmContent::Blocks(
                        response
                            .blocks
                            .iter()
                            .cloned()
                            .chain(std::iter::once(ContentBlock::Text {
                                text: String::new(),
                            }))
                            .collect(),
                    ),
                });
                messages.push(LlmMessage {
                    role: "user".to_string(),
                    content: "Call record_feature_intent with your analysis.".into(),
                });
                continue;
            }
            None => return None,
        }
    }
    None
}

fn build_feature_spec(
    draft: IntentDraft,
    existing: &ExistingEntities,
    adapter: &dyn FrameworkAdapter,
) -> FeatureSpec {
    let mut entities_to_extend = Vec::new();
    let mut entities_to_create = Vec::new();
    let mut existing_context = Vec::new();
    let mut modifications = Vec::new();

    for entity in &draft.entities {
        let resolved_existing_name = existing
            .entities
            .keys()
            .find(|name| names_match(name, &entity.name));

        let action = match resolved_existing_name {
            Some(_) => EntityAction::Extend,
            None if entity.action == "extend" => {
                // LLM claimed extend but the name doesn't resolve; treat as
                // create so the partition invariant never needs policing.
                EntityAction::Create
            }
            None => EntityAction::Create,
        };

        match action {
            EntityAction::Extend => {
                let canonical = resolved_existing_name.unwrap().clone();
                if !entities_to_extend.contains(&canonical) {
                    entities_to_extend.push(canonical.clone());
                }
                let discovered = &existing.entities[&canonical];
                let target_file = Some(discovered.file.clone());

                if !entity.fields_to_add.is_empty() {
                    modifications.push(ModificationDescriptor {
                        file: discovered.file.clone(),
                        entity: canonical.clone(),
                        action: ModificationAction::AddFields,
                        details: entity
                            .fields_to_add
                            .iter()
                            .map(|(n, t)| format!("{n}: {t}"))
                            .collect(),
                    });
                }
                if !entity.methods_to_add.is_empty() {
                    modifications.push(ModificationDescriptor {
                        file: discovered.file.clone(),
                        entity: canonical.clone(),
                        action: ModificationAction::AddMethod,
                        details: entity.methods_to_add.clone(),
                    });
                }

                existing_context.push(ExistingContext {
                    entity: canonical,
                    action,
                    target_file,
                    current_fields: discovered.fields.clone(),
                    relationships: discovered.relationships.clone(),
                    fields_to_add: entity.fields_to_add.clone(),
                    methods_to_add: entity.methods_to_add.clone(),
                });
            }
            EntityAction::Create => {
                if !entities_to_create.contains(&entity.name) {
                    entities_to_create.push(entity.name.clone());
                }
                existing_context.push(ExistingContext {
                    entity: entity.name.clone(),
                    action,
                    target_file: None,
                    current_fields: Vec::new(),
                    relationships: Vec::new(),
                    fields_to_add: entity.fields_to_add.clone(),
                    methods_to_add: entity.methods_to_add.clone(),
                });
            }
        }
    }

    let new_files_planning = planning::plan_new_files(&entities_to_create, adapter);

    let mut affected_files: Vec<String> = modifications.iter().map(|m| m.file.clone()).collect();
    affected_files.sort();
    affected_files.dedup();

    let mut todo_files = affected_files.clone();
    todo_files.extend(new_files_planning.creation_order.clone());
    todo_files.sort();
    todo_files.dedup();

    let todo_list = planning::build_todo_list(&entities_to_extend, &entities_to_create, &todo_files);

    FeatureSpec {
        feature_name: draft.feature_name,
        intent_summary: draft.intent_summary,
        affected_files,
        entities_to_extend,
        entities_to_create,
        existing_context,
        new_files_planning,
        modifications,
        todo_list,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::generic::GenericAdapter;
    use crate::framework::Language;
    use crate::llm::mock::MockRuntime;
    use crate::llm::{LlmResponse, StopReason};
    use crate::state::DiscoveredEntity;
    use std::collections::HashMap;
    use tokio_test::block_on;

    fn existing_with_product() -> ExistingEntities {
        let mut entities = HashMap::new();
        entities.insert(
            "Product".to_string(),
            DiscoveredEntity {
                name: "Product".to_string(),
                file: "src/models/product.rs".to_string(),
                fields: vec![("id".to_string(), "u64".to_string())],
                relationships: vec![],
            },
        );
        ExistingEntities { entities }
    }

    fn scripted_response(input: serde_json::Value) -> LlmResponse {
        LlmResponse {
            blocks: vec![ContentBlock::ToolUse {
                id: "t1".to_string(),
                name: "record_feature_intent".to_string(),
                input,
            }],
            stop_reason: StopReason::ToolUse,
        }
    }

    #[test]
    fn extends_existing_entity_when_llm_resolves_it() {
        let runtime = MockRuntime::scripted(vec![scripted_response(serde_json::json!({
            "feature_name": "add_price_history",
            "intent_summary": "Track price history for products",
            "entities": [
                {"name": "Product", "action": "extend", "fields_to_add": [["price_history", "Vec<f64>"]], "methods_to_add": []}
            ]
        }))]);
        let existing = existing_with_product();
        let adapter = GenericAdapter { language: Language::Rust };
        let mut errors = Vec::new();

        let spec = block_on(parse_intent(
            "Add price history tracking to Product",
            "generic",
            &existing,
            &adapter,
            &runtime,
            &mut errors,
        ));

        assert!(spec.partition_is_valid());
        assert_eq!(spec.entities_to_extend, vec!["Product".to_string()]);
        assert!(spec.entities_to_create.is_empty());
        assert_eq!(spec.modifications.len(), 1);
        assert!(spec.todo_dag_is_acyclic());
    }

    #[test]
    fn creates_new_entity_when_not_in_existing_set() {
        let runtime = MockRuntime::scripted(vec![scripted_response(serde_json::json!({
            "feature_name": "add_reviews",
            "intent_summary": "Add a review entity",
            "entities": [
                {"name": "Review", "action": "create", "fields_to_add": [["rating", "i32"]], "methods_to_add": []}
            ]
        }))]);
        let existing = existing_with_product();
        let adapter = GenericAdapter { language: Language::Rust };
        let mut errors = Vec::new();

        let spec = block_on(parse_intent(
            "Add customer reviews",
            "generic",
            &existing,
            &adapter,
            &runtime,
            &mut errors,
        ));

        assert!(spec.partition_is_valid());
        assert_eq!(spec.entities_to_create, vec!["Review".to_string()]);
        assert!(!spec.new_files_planning.suggested_files.is_empty());
    }

    #[test]
    fn falls_back_to_heuristic_when_model_errors() {
        struct FailingRuntime;
        #[async_trait::async_trait]
        impl AgentRuntime for FailingRuntime {
            fn name(&self) -> &str {
                "failing"
            }
            async fn complete(
                &self,
                _request: LlmRequest,
            ) -> crate::llm::LlmResult<LlmResponse> {
                Err(crate::llm::LlmError::RequestFailed("boom".to_string()))
            }
        }

        let existing = ExistingEntities::default();
        let adapter = GenericAdapter { language: Language::Rust };
        let mut errors = Vec::new();
        let spec = block_on(parse_intent(
            "Add a Coupon entity with a discount field",
            "generic",
            &existing,
            &adapter,
            &FailingRuntime,
            &mut errors,
        ));

        assert!(!errors.is_empty());
        assert!(spec.partition_is_valid());
        assert!(spec.todo_dag_is_acyclic());
    }
}

//! §4.6.2 prompt construction: a single structured system prompt covering
//! intent, framework conventions, per-file generation instructions, and the
//! scope exhortation. Built once per P4 run; the intent-reminder middleware
//! ([`super::middleware::intent_reminder`]) re-asserts the scope portion on
//! every subsequent turn.

use super::scope::Scope;
use crate::framework::FrameworkAdapter;
use crate::state::{FeatureSpec, ImpactAnalysis, RefactoringPlan, TodoPhase};

pub fn build_prompt(
    feature_spec: &FeatureSpec,
    impact: &ImpactAnalysis,
    refactoring_plan: Option<&RefactoringPlan>,
    adapter: &dyn FrameworkAdapter,
    scope: &Scope,
) -> String {
    let mut sections = Vec::new();

    sections.push(format!(
        "Feature: {}\nIntent: {}",
        feature_spec.feature_name, feature_spec.intent_summary
    ));

    sections.push(format!(
        "Target framework: {}\n{}",
        adapter.tag(),
        adapter.synthesis_prompt_fragment()
    ));

    if !feature_spec.new_files_planning.creation_order.is_empty() {
        sections.push(format!(
            "Creation order (respect this — earlier files may be depended on by later ones):\n{}",
            feature_spec.new_files_planning.creation_order.join(" -> ")
        ));
    }

    sections.push(file_mapping_section(feature_spec));

    if let Some(plan) = refactoring_plan {
        if !plan.create_layers.is_empty() {
            sections.push(format!(
                "The structure validator flagged missing layers; create these directories as \
                 part of this work if they don't already hold files: {}",
                plan.create_layers.join(", ")
            ));
        }
    }

    if !impact.patterns_to_follow.is_empty() {
        sections.push(format!(
            "Design patterns already in use in this codebase — follow them: {}",
            impact.patterns_to_follow.join(", ")
        ));
    }
    if !impact.constraints.is_empty() {
        sections.push(format!("Constraints: {}", impact.constraints.join("; ")));
    }
    if !impact.testing_approach.is_empty() {
        sections.push(format!("Testing approach to mirror: {}", impact.testing_approach));
    }

    let generation_todos: Vec<&str> = feature_spec
        .todo_list
        .iter()
        .filter(|t| t.phase == TodoPhase::Generation)
        .map(|t| t.title.as_str())
        .collect();
    if !generation_todos.is_empty() {
        sections.push(format!("Generation tasks: {}", generation_todos.join("; ")));
    }

    sections.push(scope_section(scope));

    sections.push(
        "Use only the read_file, ls, write_file, edit_file, and write_todos tools. Do not \
         propose or mention any file outside the allowed scope above. Stop calling tools once \
         every file in the creation order and modification list has been handled."
            .to_string(),
    );

    sections.join("\n\n")
}

fn file_mapping_section(feature_spec: &FeatureSpec) -> String {
    let mut lines = vec!["File plan:".to_string()];

    for file in &feature_spec.new_files_planning.suggested_files {
        lines.push(format!(
            "  CREATE {} (layer: {}, class: {}, conventions: [{}], SOLID: [{}])",
            file.full_path(),
            file.layer,
            file.class_name,
            file.framework_conventions.join(", "),
            file.solid_principles.join(", "),
        ));
    }

    for modification in &feature_spec.modifications {
        lines.push(format!(
            "  EDIT {} (entity: {}, action: {:?}, details: [{}])",
            modification.file,
            modification.entity,
            modification.action,
            modification.details.join(", "),
        ));
    }

    lines.join("\n")
}

fn scope_section(scope: &Scope) -> String {
    let mut files: Vec<String> = scope.allowed_files.iter().map(|p| p.display().to_string()).collect();
    files.sort();
    let mut dirs: Vec<String> = scope.allowed_dirs.iter().map(|p| p.display().to_string()).collect();
    dirs.sort();

    let mut out = format!(
        "Allowed files:\n{}\nAllowed directories (any sibling file inside these is also allowed):\n{}",
        files.join("\n"),
        dirs.join("\n"),
    );
    if scope.fallback_used {
        out.push_str(
            "\nNote: no files were planned in advance, so scope fell back to the conventional \
             source root above. Stay within it.",
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::generic::GenericAdapter;
    use crate::framework::Language;
    use crate::state::{NewFilesPlanning, SuggestedFile};

    #[test]
    fn prompt_includes_feature_name_and_creation_order() {
        let spec = FeatureSpec {
            feature_name: "add_coupons".into(),
            intent_summary: "Add a Coupon entity".into(),
            affected_files: vec![],
            entities_to_extend: vec![],
            entities_to_create: vec!["Coupon".into()],
            existing_context: vec![],
            new_files_planning: NewFilesPlanning {
                suggested_files: vec![SuggestedFile {
                    filename: "coupon.rs".into(),
                    relative_path: "src/models".into(),
                    layer: "model".into(),
                    class_name: "Coupon".into(),
                    solid_principles: vec![],
                    framework_conventions: vec![],
                    for_entity: Some("Coupon".into()),
                }],
                creation_order: vec!["src/models/coupon.rs".into()],
            },
            modifications: vec![],
            todo_list: vec![],
        };
        let adapter = GenericAdapter { language: Language::Rust };
        let impact = ImpactAnalysis::default();
        let scope = super::super::compute_scope(
            std::path::Path::new("/repo"),
            &spec,
            &impact,
            None,
            &adapter,
        );

        let prompt = build_prompt(&spec, &impact, None, &adapter, &scope);
        assert!(prompt.contains("add_coupons"));
        assert!(prompt.contains("src/models/coupon.rs"));
        assert!(prompt.contains("CREATE"));
    }
}

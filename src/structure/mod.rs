//! P2A — Validate Structure (§4.4).
//!
//! Scores the target repository's conformance to its detected framework's
//! layering conventions. Optional: the workflow may skip this phase
//! entirely (§4.4 routing effect), and nothing downstream treats a low
//! score as fatal — it's advisory context for P4.

use crate::framework::FrameworkAdapter;
use crate::state::{
    ExtractClass, RefactoringPlan, Severity, StructureAssessment, Violation, ViolationType,
};
use crate::state::ExistingEntities;
use std::path::Path;

/// A file whose line count exceeds this is flagged `monolithic_class`.
const MONOLITHIC_LINE_THRESHOLD: usize = 400;

const STORAGE_NEEDLES: &[&str] = &[
    "jdbc:", "Connection conn", "PreparedStatement", ".save(", "INSERT INTO", "SELECT * FROM",
    "session.query", "cursor.execute",
];

pub fn validate_structure(
    codebase_path: &Path,
    existing: &ExistingEntities,
    adapter: &dyn FrameworkAdapter,
) -> StructureAssessment {
    let mut violations = Vec::new();

    violations.extend(missing_layers(codebase_path, adapter));
    violations.extend(nested_models(existing, adapter));
    violations.extend(misplaced_files(existing, adapter));
    violations.extend(monolithic_classes(codebase_path, existing));
    violations.extend(data_storage_in_controllers(codebase_path, adapter));

    let refactoring_plan = build_refactoring_plan(&violations);

    StructureAssessment::from_violations(violations, refactoring_plan)
}

/// A layer counts as present if any directory anywhere in the tree is named
/// after it (singular or with a trailing `s`). The `{base_package}`
/// placeholder in a framework's `directory_template` isn't resolvable
/// without actually knowing the package, so this checks for the layer's
/// conventional directory name directly rather than the full template path.
fn missing_layers(codebase_path: &Path, adapter: &dyn FrameworkAdapter) -> Vec<Violation> {
    let present: std::collections::HashSet<String> = walkdir::WalkDir::new(codebase_path)
        .into_iter()
        .filter_entry(|e| {
            e.file_name()
                .to_str()
                .map(|n| !crate::context::DENY_LIST.contains(&n))
                .unwrap_or(true)
        })
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir())
        .filter_map(|e| e.file_name().to_str().map(|s| s.to_lowercase()))
        .collect();

    adapter
        .creation_order()
        .iter()
        .filter_map(|layer| {
            let lower = layer.to_lowercase();
            if present.contains(&lower) || present.contains(&format!("{lower}s")) {
                None
            } else {
                Some(Violation {
                    violation_type: ViolationType::MissingLayer,
                    severity: Severity::Medium,
                    file: None,
                    layer: Some(layer.to_string()),
                    message: format!("no `{layer}` directory found anywhere in the repository"),
                })
            }
        })
        .collect()
}

/// An entity's own directory hint appearing twice in its path (e.g.
/// `models/models/product.rs`) indicates an accidentally nested model
/// package, usually from a prior refactor gone half-finished.
fn nested_models(existing: &ExistingEntities, adapter: &dyn FrameworkAdapter) -> Vec<Violation> {
    let hints = crate::framework::entity_directory_hints(adapter.language());
    existing
        .entities
        .values()
        .filter_map(|entity| {
            let hit_count = hints
                .iter()
                .map(|hint| entity.file.matches(hint).count())
                .max()
                .unwrap_or(0);
            if hit_count > 1 {
                Some(Violation {
                    violation_type: ViolationType::NestedModel,
                    severity: Severity::Low,
                    file: Some(entity.file.clone()),
                    layer: Some("model".to_string()),
                    message: format!("entity `{}` sits under a nested model directory", entity.name),
                })
            } else {
                None
            }
        })
        .collect()
}

/// An entity whose file isn't under any directory hint for its language at
/// all is a candidate for being in the wrong place entirely.
fn misplaced_files(existing: &ExistingEntities, adapter: &dyn FrameworkAdapter) -> Vec<Violation> {
    let hints = crate::framework::entity_directory_hints(adapter.language());
    if hints.is_empty() {
        return Vec::new();
    }
    existing
        .entities
        .values()
        .filter(|entity| !hints.iter().any(|hint| entity.file.contains(hint)))
        .map(|entity| Violation {
            violation_type: ViolationType::MisplacedFile,
            severity: Severity::Low,
            file: Some(entity.file.clone()),
            layer: Some("model".to_string()),
            message: format!(
                "entity `{}` is declared outside any of this framework's conventional model directories",
                entity.name
            ),
        })
        .collect()
}

fn monolithic_classes(codebase_path: &Path, existing: &ExistingEntities) -> Vec<Violation> {
    let mut files: Vec<&str> = existing.entities.values().map(|e| e.file.as_str()).collect();
    files.sort();
    files.dedup();

    files
        .into_iter()
        .filter_map(|rel_path| {
            let contents = std::fs::read_to_string(codebase_path.join(rel_path)).ok()?;
            let line_count = contents.lines().count();
            if line_count > MONOLITHIC_LINE_THRESHOLD {
                Some(Violation {
                    violation_type: ViolationType::MonolithicClass,
                    severity: Severity::High,
                    file: Some(rel_path.to_string()),
                    layer: None,
                    message: format!("{rel_path} is {line_count} lines, over the {MONOLITHIC_LINE_THRESHOLD}-line threshold"),
                })
            } else {
                None
            }
        })
        .collect()
}

fn data_storage_in_controllers(codebase_path: &Path, adapter: &dyn FrameworkAdapter) -> Vec<Violation> {
    let Some(rule) = adapter.placement_rules().into_iter().find(|r| r.layer == "controller" || r.layer == "router") else {
        return Vec::new();
    };
    let dir = codebase_path.join(rule.directory_template.split("{base_package}").next().unwrap_or(&rule.directory_template).trim_end_matches('/'));
    let Ok(entries) = std::fs::read_dir(&dir) else {
        return Vec::new();
    };

    entries
        .flatten()
        .filter(|e| e.path().is_file())
        .filter_map(|entry| {
            let contents = std::fs::read_to_string(entry.path()).ok()?;
            if STORAGE_NEEDLES.iter().any(|needle| contents.contains(needle)) {
                Some(Violation {
                    violation_type: ViolationType::DataStorageInController,
                    severity: Severity::High,
                    file: Some(entry.path().to_string_lossy().to_string()),
                    layer: Some(rule.layer.clone()),
                    message: "controller/router layer appears to talk to storage directly".to_string(),
                })
            } else {
                None
            }
        })
        .collect()
}

fn build_refactoring_plan(violations: &[Violation]) -> RefactoringPlan {
    let create_layers: Vec<String> = violations
        .iter()
        .filter(|v| v.violation_type == ViolationType::MissingLayer)
        .filter_map(|v| v.layer.clone())
        .collect();

    let extract_classes: Vec<ExtractClass> = violations
        .iter()
        .filter(|v| v.violation_type == ViolationType::MonolithicClass)
        .filter_map(|v| {
            let from_file = v.file.clone()?;
            let stem = Path::new(&from_file)
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("Extracted")
                .to_string();
            let ext = Path::new(&from_file)
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("rs");
            Some(ExtractClass {
                from_file: from_file.clone(),
                class_name: format!("{stem}Helper"),
                target_file: from_file.replace(&format!(".{ext}"), &format!("_helper.{ext}")),
            })
        })
        .collect();

    let move_code: Vec<String> = violations
        .iter()
        .filter(|v| v.violation_type == ViolationType::MisplacedFile)
        .filter_map(|v| v.file.clone())
        .collect();

    let add_interfaces: Vec<String> = violations
        .iter()
        .filter(|v| v.violation_type == ViolationType::DataStorageInController)
        .filter_map(|v| v.file.clone())
        .map(|f| format!("extract a repository interface for {f}"))
        .collect();

    RefactoringPlan {
        create_layers,
        extract_classes,
        move_code,
        add_interfaces,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::generic::GenericAdapter;
    use crate::framework::Language;
    use crate::state::DiscoveredEntity;
    use std::collections::HashMap;
    use std::fs;
    use tempfile::tempdir;

    fn entities_with(file: &str) -> ExistingEntities {
        let mut entities = HashMap::new();
        entities.insert(
            "Product".to_string(),
            DiscoveredEntity {
                name: "Product".to_string(),
                file: file.to_string(),
                fields: vec![],
                relationships: vec![],
            },
        );
        ExistingEntities { entities }
    }

    #[test]
    fn flags_missing_service_layer() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src/models")).unwrap();
        let adapter = GenericAdapter { language: Language::Rust };
        let existing = entities_with("src/models/product.rs");

        let assessment = validate_structure(dir.path(), &existing, &adapter);
        assert!(assessment
            .violations
            .iter()
            .any(|v| v.violation_type == ViolationType::MissingLayer && v.layer.as_deref() == Some("service")));
        assert!(assessment.refactoring_plan.create_layers.contains(&"service".to_string()));
    }

    #[test]
    fn flags_misplaced_entity() {
        let dir = tempdir().unwrap();
        let adapter = GenericAdapter { language: Language::Rust };
        let existing = entities_with("src/lib.rs");

        let assessment = validate_structure(dir.path(), &existing, &adapter);
        assert!(assessment
            .violations
            .iter()
            .any(|v| v.violation_type == ViolationType::MisplacedFile));
    }

    #[test]
    fn flags_monolithic_class() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src/models")).unwrap();
        let big = "pub struct Product {}\n".repeat(500);
        fs::write(dir.path().join("src/models/product.rs"), big).unwrap();
        let adapter = GenericAdapter { language: Language::Rust };
        let existing = entities_with("src/models/product.rs");

        let assessment = validate_structure(dir.path(), &existing, &adapter);
        assert!(assessment
            .violations
            .iter()
            .any(|v| v.violation_type == ViolationType::MonolithicClass));
        assert!(!assessment.is_production_ready);
    }

    #[test]
    fn score_is_perfect_with_no_violations() {
        let assessment = StructureAssessment::from_violations(vec![], RefactoringPlan::default());
        assert_eq!(assessment.score, 100);
        assert!(assessment.is_production_ready);
    }
}

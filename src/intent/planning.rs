//! New-file planning (§3, §4.3 step 5) and todo-list generation (§8
//! Property 3: the `depends_on` graph is acyclic).

use crate::framework::FrameworkAdapter;
use crate::state::{NewFilesPlanning, SuggestedFile, TodoItem, TodoPhase};

/// Suggest one file per (layer, entity) pair, in the framework's
/// `creation_order`. Grouping by layer before entity keeps every earlier
/// layer's files ahead of every later layer's, which is what the §3
/// dependency invariant actually requires — it does not mandate any
/// particular ordering *within* a layer.
pub fn plan_new_files(
    entities_to_create: &[String],
    adapter: &dyn FrameworkAdapter,
) -> NewFilesPlanning {
    let placement_rules = adapter.placement_rules();
    let mut suggested_files = Vec::new();
    let mut creation_order = Vec::new();

    for layer in adapter.creation_order() {
        let Some(rule) = placement_rules.iter().find(|r| r.layer == *layer) else {
            continue;
        };

        for entity in entities_to_create {
            let filename = substitute(&rule.filename_template, entity);
            let relative_path = substitute(&rule.directory_template, entity);
            let class_name = filename
                .rsplit_once('.')
                .map(|(stem, _)| stem.to_string())
                .unwrap_or_else(|| filename.clone());

            let solid_principles = if *layer == "service" {
                vec!["single_responsibility".to_string(), "dependency_inversion".to_string()]
            } else if *layer == "repository" {
                vec!["interface_segregation".to_string()]
            } else {
                Vec::new()
            };

            let file = SuggestedFile {
                filename: filename.clone(),
                relative_path: relative_path.clone(),
                layer: layer.to_string(),
                class_name,
                solid_principles,
                framework_conventions: rule.framework_conventions.clone(),
                for_entity: Some(entity.clone()),
            };
            creation_order.push(file.full_path());
            suggested_files.push(file);
        }
    }

    NewFilesPlanning {
        suggested_files,
        creation_order,
    }
}

fn substitute(template: &str, entity_name: &str) -> String {
    template
        .replace("{Name}", entity_name)
        .replace("{name}", &to_snake_case(entity_name))
}

fn to_snake_case(name: &str) -> String {
    let mut out = String::new();
    for (i, ch) in name.char_indices() {
        if ch.is_uppercase() && i > 0 {
            out.push('_');
        }
        out.push(ch.to_ascii_lowercase());
    }
    out
}

/// Fixed analysis -> planning -> validation -> generation -> execution ->
/// testing -> review chain. A linear chain is trivially acyclic and gives
/// every downstream phase an explicit dependency on the work that must
/// precede it; per-entity parallelism within a phase isn't tracked since
/// nothing downstream needs to distinguish it.
pub fn build_todo_list(
    entities_to_extend: &[String],
    entities_to_create: &[String],
    affected_files: &[String],
) -> Vec<TodoItem> {
    let summary = format!(
        "{} entities to extend, {} to create",
        entities_to_extend.len(),
        entities_to_create.len()
    );

    let phases = [
        (TodoPhase::Analysis, "Analyze context and existing entities".to_string(), Vec::new()),
        (TodoPhase::Planning, format!("Plan feature implementation ({summary})"), Vec::new()),
        (TodoPhase::Validation, "Validate target structure".to_string(), Vec::new()),
        (
            TodoPhase::Generation,
            "Synthesize patches for affected and new files".to_string(),
            affected_files.to_vec(),
        ),
        (
            TodoPhase::Execution,
            "Apply patches and run the sandbox".to_string(),
            affected_files.to_vec(),
        ),
        (TodoPhase::Testing, "Verify build and test results".to_string(), Vec::new()),
        (TodoPhase::Review, "Summarize outcome".to_string(), Vec::new()),
    ];

    phases
        .into_iter()
        .enumerate()
        .map(|(i, (phase, title, files_affected))| TodoItem {
            id: (i + 1) as u32,
            title,
            phase,
            depends_on: if i == 0 { Vec::new() } else { vec![i as u32] },
            files_affected,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::framework_registry;

    #[test]
    fn plans_files_in_layer_order() {
        let adapter = framework_registry()
            .into_iter()
            .find(|a| a.tag() == "spring_boot")
            .unwrap();
        let planning = plan_new_files(&["Coupon".to_string()], adapter.as_ref());

        let layers: Vec<&str> = planning
            .suggested_files
            .iter()
            .map(|f| f.layer.as_str())
            .collect();
        assert_eq!(layers, vec!["model", "dto", "repository", "service", "controller"]);
        assert!(planning.creation_order[0].ends_with("Coupon.java"));
    }

    #[test]
    fn todo_chain_is_linear_and_acyclic() {
        let todos = build_todo_list(&["Product".to_string()], &[], &["a.rs".to_string()]);
        assert_eq!(todos.len(), 7);
        assert_eq!(todos[0].depends_on, Vec::<u32>::new());
        assert_eq!(todos[3].depends_on, vec![3]);
    }
}

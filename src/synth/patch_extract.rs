//! §4.6.4 patch extraction: turn the raw tool-invocation log into the
//! well-formed, deduplicated `Vec<Patch>` that becomes `state.patches`.

use super::tools::ToolInvocation;
use crate::state::{FeatureSpec, Patch, PatchTool, Phase};
use std::collections::HashSet;

pub fn extract_patches(
    log: &[ToolInvocation],
    feature_spec: &FeatureSpec,
    errors_sink: &mut Vec<(Phase, String)>,
) -> Vec<Patch> {
    let mut seen_writes: HashSet<std::path::PathBuf> = HashSet::new();
    let mut patches = Vec::new();

    for invocation in log {
        if invocation.is_error {
            continue;
        }
        let Some(path) = &invocation.path else { continue };

        let tool = match invocation.name.as_str() {
            "write_file" => PatchTool::WriteFile,
            "edit_file" => PatchTool::EditFile,
            _ => continue,
        };

        if tool == PatchTool::WriteFile {
            if !seen_writes.insert(path.clone()) {
                errors_sink.push((
                    Phase::SynthesizeCode,
                    format!("duplicate write_file call for `{}`; keeping the first", path.display()),
                ));
                continue;
            }
        }

        let patch = Patch {
            tool,
            file: path.clone(),
            content: invocation.content.clone(),
            old_string: invocation.old_string.clone(),
            new_string: invocation.new_string.clone(),
            description: invocation.description.clone(),
        };

        if !patch.is_well_formed() {
            errors_sink.push((
                Phase::SynthesizeCode,
                format!("discarding malformed patch for `{}`", path.display()),
            ));
            continue;
        }

        patches.push(patch);
    }

    check_creation_order(&patches, feature_spec, errors_sink);
    patches
}

/// Warn (never reject) when a suggested file's creation order is violated —
/// i.e. a later-layer file was written before an earlier one it's meant to
/// depend on. The model retains final say over ordering; this is a hint for
/// the operator, not an invariant P4 enforces.
fn check_creation_order(patches: &[Patch], feature_spec: &FeatureSpec, errors_sink: &mut Vec<(Phase, String)>) {
    let order = &feature_spec.new_files_planning.creation_order;
    if order.len() < 2 {
        return;
    }

    let written_index = |suffix: &str| {
        patches
            .iter()
            .position(|p| p.file.ends_with(suffix) || p.file.to_string_lossy().ends_with(suffix))
    };

    let mut last_seen: Option<(usize, &str)> = None;
    for expected in order {
        if let Some(idx) = written_index(expected) {
            if let Some((prev_idx, prev_name)) = last_seen {
                if idx < prev_idx {
                    errors_sink.push((
                        Phase::SynthesizeCode,
                        format!(
                            "creation order warning: `{expected}` was written before `{prev_name}`, \
                             which the file plan expected it to follow"
                        ),
                    ));
                }
            }
            last_seen = Some((idx, expected.as_str()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::NewFilesPlanning;
    use std::path::PathBuf;

    fn spec_with_order(order: Vec<&str>) -> FeatureSpec {
        FeatureSpec {
            feature_name: "f".into(),
            intent_summary: "s".into(),
            affected_files: vec![],
            entities_to_extend: vec![],
            entities_to_create: vec![],
            existing_context: vec![],
            new_files_planning: NewFilesPlanning {
                suggested_files: vec![],
                creation_order: order.into_iter().map(String::from).collect(),
            },
            modifications: vec![],
            todo_list: vec![],
        }
    }

    fn write_invocation(path: &str, content: &str) -> ToolInvocation {
        ToolInvocation {
            id: "1".into(),
            name: "write_file".into(),
            path: Some(PathBuf::from(path)),
            content: Some(content.to_string()),
            old_string: None,
            new_string: None,
            description: "d".into(),
            is_error: false,
            result_text: String::new(),
        }
    }

    #[test]
    fn malformed_patch_is_discarded() {
        let log = vec![write_invocation("/repo/src/models/a.rs", "")];
        let mut errors = Vec::new();
        let patches = extract_patches(&log, &spec_with_order(vec![]), &mut errors);
        assert!(patches.is_empty());
        assert!(!errors.is_empty());
    }

    #[test]
    fn duplicate_write_keeps_first() {
        let log = vec![
            write_invocation("/repo/src/models/a.rs", "v1"),
            write_invocation("/repo/src/models/a.rs", "v2"),
        ];
        let mut errors = Vec::new();
        let patches = extract_patches(&log, &spec_with_order(vec![]), &mut errors);
        assert_eq!(patches.len(), 1);
        assert_eq!(patches[0].content.as_deref(), Some("v1"));
    }

    #[test]
    fn out_of_order_creation_emits_warning_but_keeps_patches() {
        let log = vec![
            write_invocation("/repo/src/services/a_service.rs", "x"),
            write_invocation("/repo/src/models/a.rs", "y"),
        ];
        let spec = spec_with_order(vec!["src/models/a.rs", "src/services/a_service.rs"]);
        let mut errors = Vec::new();
        let patches = extract_patches(&log, &spec, &mut errors);
        assert_eq!(patches.len(), 2);
        assert!(errors.iter().any(|(_, m)| m.contains("creation order warning")));
    }
}

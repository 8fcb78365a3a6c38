//! §4.6.1 scope computation: the set of files and directories P4 is allowed
//! to touch, computed once before any model call and enforced by every
//! middleware layer in [`super::middleware`].

use crate::framework::FrameworkAdapter;
use crate::state::{FeatureSpec, ImpactAnalysis, RefactoringPlan};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct Scope {
    pub allowed_files: HashSet<PathBuf>,
    pub allowed_dirs: HashSet<PathBuf>,
    /// Set when `E` was empty and the scope fell back to the conventional
    /// source root (§4.6.1 last bullet).
    pub fallback_used: bool,
}

impl Scope {
    /// The four-criterion allowability check shared by the output guardrail
    /// (§4.6.3 step 2) and the tool-call guardrail (step 3).
    pub fn is_allowed(&self, path: &Path) -> bool {
        if self.allowed_files.contains(path) {
            return true;
        }
        if self
            .allowed_files
            .iter()
            .any(|allowed| path.ends_with(allowed) || allowed.ends_with(path))
        {
            return true;
        }
        if self.allowed_dirs.iter().any(|dir| path.starts_with(dir)) {
            return true;
        }
        if let Some(parent) = path.parent() {
            let sibling = self
                .allowed_files
                .iter()
                .any(|allowed| allowed.parent() == Some(parent));
            if sibling {
                return true;
            }
        }
        false
    }
}

pub fn compute_scope(
    codebase_path: &Path,
    feature_spec: &FeatureSpec,
    impact: &ImpactAnalysis,
    refactoring_plan: Option<&RefactoringPlan>,
    adapter: &dyn FrameworkAdapter,
) -> Scope {
    let mut allowed_files: HashSet<PathBuf> = HashSet::new();

    for rel in feature_spec
        .affected_files
        .iter()
        .chain(impact.files_to_modify.iter())
        .chain(feature_spec.new_files_planning.creation_order.iter())
    {
        allowed_files.insert(codebase_path.join(rel));
    }

    let mut allowed_dirs: HashSet<PathBuf> = allowed_files
        .iter()
        .filter_map(|f| f.parent().map(PathBuf::from))
        .collect();

    if let Some(plan) = refactoring_plan {
        for layer_dir in &plan.create_layers {
            allowed_dirs.insert(codebase_path.join(layer_dir));
        }
    }

    let fallback_used = allowed_files.is_empty() && allowed_dirs.is_empty();
    if fallback_used {
        allowed_dirs.insert(codebase_path.join(adapter.conventional_source_root()));
    }

    Scope {
        allowed_files,
        allowed_dirs,
        fallback_used,
    }
}

//! Fallback adapter used when no registered framework's manifest/import
//! signature matches. Heuristics only, per §4.1 "fails soft to `generic`".

use super::{FrameworkAdapter, Language, PlacementRule};

pub struct GenericAdapter {
    pub language: Language,
}

impl FrameworkAdapter for GenericAdapter {
    fn tag(&self) -> &'static str {
        "generic"
    }

    fn language(&self) -> Language {
        self.language
    }

    fn matches_manifest(&self, _manifest_name: &str, _contents: &str) -> bool {
        false
    }

    fn creation_order(&self) -> &'static [&'static str] {
        &["model", "service"]
    }

    fn placement_rules(&self) -> Vec<PlacementRule> {
        vec![
            PlacementRule {
                layer: "model".into(),
                directory_template: "src/models".into(),
                filename_template: "{name}.rs".into(),
                framework_conventions: vec![],
            },
            PlacementRule {
                layer: "service".into(),
                directory_template: "src/services".into(),
                filename_template: "{name}_service.rs".into(),
                framework_conventions: vec![],
            },
        ]
    }

    fn synthesis_prompt_fragment(&self) -> String {
        "No framework-specific conventions were detected; follow the \
         existing repository's naming and module layout as closely as \
         possible and avoid introducing a new architectural style."
            .to_string()
    }

    fn conventional_source_root(&self) -> &'static str {
        "src"
    }
}

//! Framework detection and per-framework conventions.
//!
//! §9 Design Notes recommends replacing ad-hoc `if framework == "..."`
//! dispatch with a polymorphic capability set. `FrameworkAdapter` is that
//! capability set: one implementation per framework tag, selected at
//! runtime by [`detect`], with a `generic` fallback that uses heuristics
//! only. The detection table itself mirrors §6.6.

pub mod generic;
mod registry;

pub use registry::{adapter_for_tag, detect, framework_registry};

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Source-level language, independent of framework. Drives which tree-sitter
/// grammar P1.5 uses (or falls back to regex when no grammar is vendored).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    Java,
    Python,
    Go,
    Rust,
    TypeScript,
    Unknown,
}

impl Language {
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "java" => Self::Java,
            "py" => Self::Python,
            "go" => Self::Go,
            "rs" => Self::Rust,
            "ts" | "tsx" | "js" | "jsx" => Self::TypeScript,
            _ => Self::Unknown,
        }
    }

    /// Inverse of [`Self::as_str`], used to recover the enum from
    /// `ContextAnalysis::language` once P1 has picked a dominant language.
    pub fn from_str_tag(tag: &str) -> Self {
        match tag {
            "java" => Self::Java,
            "python" => Self::Python,
            "go" => Self::Go,
            "rust" => Self::Rust,
            "typescript" => Self::TypeScript,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Java => "java",
            Self::Python => "python",
            Self::Go => "go",
            Self::Rust => "rust",
            Self::TypeScript => "typescript",
            Self::Unknown => "unknown",
        }
    }

    /// Manifest filenames this language's build systems use (§6.6).
    pub fn manifests(&self) -> &'static [&'static str] {
        match self {
            Self::Java => &["pom.xml", "build.gradle", "build.gradle.kts"],
            Self::Python => &["pyproject.toml", "requirements.txt"],
            Self::Go => &["go.mod"],
            Self::Rust => &["Cargo.toml"],
            Self::TypeScript => &["package.json"],
            Self::Unknown => &[],
        }
    }
}

/// A directory name the entity-discovery walk treats as a hint that files
/// under it are likely to declare domain entities.
pub fn entity_directory_hints(lang: Language) -> &'static [&'static str] {
    match lang {
        Language::Java => &["model", "entity", "domain"],
        Language::Python => &["models", "schemas"],
        Language::Go => &["model", "models", "domain"],
        Language::Rust => &["models", "domain"],
        Language::TypeScript => &["models", "entities", "schemas"],
        Language::Unknown => &[],
    }
}

/// A single artifact P4 can generate for a new entity, e.g. `model`, `dto`,
/// `repository`, `service`, `controller`. Distinct from [`Language`]: the
/// same layer name means different conventions per framework.
pub type Layer = String;

/// Placement + naming conventions for one generated file.
#[derive(Debug, Clone)]
pub struct PlacementRule {
    pub layer: Layer,
    /// Directory relative to the repository root (or, for Java, relative to
    /// the detected base package directory).
    pub directory_template: String,
    /// `{Name}` is substituted with the entity name.
    pub filename_template: String,
    pub framework_conventions: Vec<String>,
}

/// The full capability set for one framework tag (§9 `FrameworkAdapter`).
pub trait FrameworkAdapter: Send + Sync {
    /// Stable identifier, e.g. `"spring_boot"`, `"fastapi"`, `"generic"`.
    fn tag(&self) -> &'static str;

    fn language(&self) -> Language;

    /// Substring/regex match against manifest file contents. Returns a
    /// confidence-ordered guess; `detect` in [`registry`] picks the best.
    fn matches_manifest(&self, manifest_name: &str, contents: &str) -> bool;

    /// The conventional layer-creation order for scaffolding a new entity,
    /// e.g. `["model", "dto", "repository", "service", "controller"]`.
    fn creation_order(&self) -> &'static [&'static str];

    /// Placement + naming rules for each layer this framework scaffolds.
    fn placement_rules(&self) -> Vec<PlacementRule>;

    /// A short fragment to splice into the P4 synthesis prompt describing
    /// annotations/decorators, DI style, and naming conventions (§4.6.2).
    fn synthesis_prompt_fragment(&self) -> String;

    /// Conventional source root used as the P4 scope fallback when no
    /// files are in scope after expansion (§4.6.1).
    fn conventional_source_root(&self) -> &'static str;
}

/// Best-effort reconciliation of P1's manifest-based guess with a semantic
/// check against the feature request text (§4.3 step 1).
pub fn confirm_framework(candidate: &str, feature_request: &str) -> String {
    let lower = feature_request.to_lowercase();
    let hints: &[(&str, &[&str])] = &[
        ("spring_boot", &["spring", "@restcontroller", "@entity", "jpa"]),
        ("fastapi", &["fastapi", "pydantic", "uvicorn"]),
        ("django", &["django", "models.model"]),
        ("express", &["express", "express.js"]),
        ("gin", &["gin", "gin-gonic"]),
        ("axum_rust", &["axum", "tokio"]),
    ];

    for (tag, needles) in hints {
        if needles.iter().any(|n| lower.contains(n)) {
            return tag.to_string();
        }
    }

    if candidate.is_empty() {
        "generic".to_string()
    } else {
        candidate.to_string()
    }
}

/// Heuristic build-system identifier from the manifests found at the repo root.
pub fn build_system_for(root: &Path) -> Option<String> {
    let checks: &[(&str, &str)] = &[
        ("Cargo.toml", "cargo"),
        ("pom.xml", "maven"),
        ("build.gradle", "gradle"),
        ("build.gradle.kts", "gradle"),
        ("package.json", "npm"),
        ("go.mod", "go"),
        ("pyproject.toml", "poetry-or-pip"),
        ("requirements.txt", "pip"),
    ];
    checks
        .iter()
        .find(|(file, _)| root.join(file).is_file())
        .map(|(_, system)| system.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_from_extension() {
        assert_eq!(Language::from_extension("java"), Language::Java);
        assert_eq!(Language::from_extension("PY"), Language::Python);
        assert_eq!(Language::from_extension("xyz"), Language::Unknown);
    }

    #[test]
    fn confirm_framework_prefers_semantic_hint() {
        let confirmed = confirm_framework("generic", "Add a @RestController using Spring Data JPA");
        assert_eq!(confirmed, "spring_boot");
    }

    #[test]
    fn confirm_framework_falls_back_to_candidate() {
        let confirmed = confirm_framework("fastapi", "add a health check endpoint");
        assert_eq!(confirmed, "fastapi");
    }
}

//! Static registry of [`FrameworkAdapter`]s and the detection entry point.

use super::generic::GenericAdapter;
use super::{FrameworkAdapter, Language, PlacementRule};
use std::path::Path;

struct SpringBootAdapter;

impl FrameworkAdapter for SpringBootAdapter {
    fn tag(&self) -> &'static str {
        "spring_boot"
    }

    fn language(&self) -> Language {
        Language::Java
    }

    fn matches_manifest(&self, manifest_name: &str, contents: &str) -> bool {
        matches!(manifest_name, "pom.xml" | "build.gradle" | "build.gradle.kts")
            && (contents.contains("spring-boot") || contents.contains("org.springframework"))
    }

    fn creation_order(&self) -> &'static [&'static str] {
        &["model", "dto", "repository", "service", "controller"]
    }

    fn placement_rules(&self) -> Vec<PlacementRule> {
        vec![
            PlacementRule {
                layer: "model".into(),
                directory_template: "src/main/java/{base_package}/model".into(),
                filename_template: "{Name}.java".into(),
                framework_conventions: vec!["@Entity".into(), "@Table".into(), "@Id".into()],
            },
            PlacementRule {
                layer: "dto".into(),
                directory_template: "src/main/java/{base_package}/dto".into(),
                filename_template: "{Name}DTO.java".into(),
                framework_conventions: vec!["record or plain POJO with getters".into()],
            },
            PlacementRule {
                layer: "repository".into(),
                directory_template: "src/main/java/{base_package}/repository".into(),
                filename_template: "{Name}Repository.java".into(),
                framework_conventions: vec!["extends JpaRepository<{Name}, Long>".into()],
            },
            PlacementRule {
                layer: "service".into(),
                directory_template: "src/main/java/{base_package}/service".into(),
                filename_template: "{Name}Service.java".into(),
                framework_conventions: vec!["@Service".into(), "constructor injection".into()],
            },
            PlacementRule {
                layer: "controller".into(),
                directory_template: "src/main/java/{base_package}/controller".into(),
                filename_template: "{Name}Controller.java".into(),
                framework_conventions: vec!["@RestController".into(), "@RequestMapping".into()],
            },
        ]
    }

    fn synthesis_prompt_fragment(&self) -> String {
        "Target framework: Spring Boot. Use constructor-based dependency \
         injection, `@RestController`/`@Service`/`@Repository` stereotypes, \
         `@Entity`/`@Table`/`@Id`/`@Column` on persisted models, and \
         `JpaRepository<Entity, Long>` for repositories. Package layout: \
         model -> dto -> repository -> service -> controller."
            .to_string()
    }

    fn conventional_source_root(&self) -> &'static str {
        "src/main/java"
    }
}

struct FastApiAdapter;

impl FrameworkAdapter for FastApiAdapter {
    fn tag(&self) -> &'static str {
        "fastapi"
    }

    fn language(&self) -> Language {
        Language::Python
    }

    fn matches_manifest(&self, manifest_name: &str, contents: &str) -> bool {
        matches!(manifest_name, "pyproject.toml" | "requirements.txt")
            && (contents.contains("fastapi") || contents.contains("FastAPI"))
    }

    fn creation_order(&self) -> &'static [&'static str] {
        &["model", "schema", "repository", "service", "router"]
    }

    fn placement_rules(&self) -> Vec<PlacementRule> {
        vec![
            PlacementRule {
                layer: "model".into(),
                directory_template: "app/models".into(),
                filename_template: "{name}.py".into(),
                framework_conventions: vec!["SQLAlchemy declarative model".into()],
            },
            PlacementRule {
                layer: "schema".into(),
                directory_template: "app/schemas".into(),
                filename_template: "{name}.py".into(),
                framework_conventions: vec!["pydantic BaseModel".into()],
            },
            PlacementRule {
                layer: "repository".into(),
                directory_template: "app/repositories".into(),
                filename_template: "{name}_repository.py".into(),
                framework_conventions: vec!["async SQLAlchemy session methods".into()],
            },
            PlacementRule {
                layer: "service".into(),
                directory_template: "app/services".into(),
                filename_template: "{name}_service.py".into(),
                framework_conventions: vec!["plain class, injected repository".into()],
            },
            PlacementRule {
                layer: "router".into(),
                directory_template: "app/routers".into(),
                filename_template: "{name}.py".into(),
                framework_conventions: vec!["APIRouter with Depends()".into()],
            },
        ]
    }

    fn synthesis_prompt_fragment(&self) -> String {
        "Target framework: FastAPI. Use pydantic `BaseModel` for schemas, \
         SQLAlchemy declarative models, `APIRouter` with `Depends()` for \
         dependency injection, and `async def` for IO-bound endpoints. \
         Package layout: model -> schema -> repository -> service -> router."
            .to_string()
    }

    fn conventional_source_root(&self) -> &'static str {
        "app"
    }
}

/// Every registered adapter, in detection-priority order.
pub fn framework_registry() -> Vec<Box<dyn FrameworkAdapter>> {
    vec![Box::new(SpringBootAdapter), Box::new(FastApiAdapter)]
}

/// Resolve a confirmed framework tag (§4.3 step 1) back to its adapter.
/// Used after P2 reconciles P1's manifest guess with the request text,
/// since the confirmed tag may differ from whatever `detect` first picked.
pub fn adapter_for_tag(tag: &str, fallback_language: Language) -> Box<dyn FrameworkAdapter> {
    framework_registry()
        .into_iter()
        .find(|a| a.tag() == tag)
        .unwrap_or_else(|| {
            Box::new(GenericAdapter {
                language: fallback_language,
            })
        })
}

/// §4.1 framework detection: regex/substring match on manifest contents,
/// falling soft to `generic` on no match or any IO error reading manifests.
pub fn detect(root: &Path, manifest_contents: &[(String, String)]) -> Box<dyn FrameworkAdapter> {
    for adapter in framework_registry() {
        for (name, contents) in manifest_contents {
            if adapter.matches_manifest(name, contents) {
                return adapter;
            }
        }
    }

    let language = manifest_contents
        .iter()
        .find_map(|(name, _)| {
            let ext = Path::new(name).extension()?.to_str()?;
            let _ = root; // root kept for signature symmetry / future use
            Some(Language::from_extension(ext))
        })
        .unwrap_or(Language::Unknown);

    Box::new(GenericAdapter { language })
}

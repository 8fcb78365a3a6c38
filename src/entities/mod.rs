//! P1.5 — Discover Existing Entities.
//!
//! Walks the repository for record/struct/class declarations that carry
//! data fields, dedupes by declared name (first occurrence wins, later
//! ones logged as warnings), and derives relationship descriptors by
//! textually matching field types against other discovered entity names
//! (§4.2). The result is a subset of what's actually declared — false
//! negatives are fine, since anything missed is simply treated as "create
//! new" by P2.

mod regex_extract;
mod ts_extract;

use crate::framework::{entity_directory_hints, Language};
use crate::state::{DiscoveredEntity, ExistingEntities, Phase, RelationshipDescriptor};
use std::path::Path;
use walkdir::WalkDir;

/// A file is a discovery candidate if either its path contains a directory
/// named like a conventional entity-holding directory, or — for languages
/// with an indicative declaration pattern we can cheaply eyeball — its
/// content looks entity-shaped. We only apply the content check to keep
/// recall reasonable for repositories that don't follow the `model/`
/// convention; it never runs on files the directory hint already rejected
/// when the language itself is unsupported.
fn is_candidate_file(rel_path: &Path, lang: Language) -> bool {
    let hints = entity_directory_hints(lang);
    let dir_hint_matches = rel_path.components().any(|c| {
        c.as_os_str()
            .to_str()
            .map(|s| hints.contains(&s))
            .unwrap_or(false)
    });

    if dir_hint_matches {
        return true;
    }

    // Fall back to extension match only; the per-language extractor itself
    // filters out files with no matching declaration.
    rel_path
        .extension()
        .and_then(|e| e.to_str())
        .map(|ext| Language::from_extension(ext) == lang)
        .unwrap_or(false)
}

/// Run P1.5 against `codebase_path` for the given dominant language.
/// Never fails: IO/parse errors are skipped per-file and logged as
/// warnings, and the phase returns whatever partial result it gathered.
pub fn discover_entities(
    codebase_path: &Path,
    lang: Language,
    errors_sink: &mut Vec<(Phase, String)>,
) -> ExistingEntities {
    let mut by_name: std::collections::HashMap<String, DiscoveredEntity> =
        std::collections::HashMap::new();

    let walker = WalkDir::new(codebase_path).into_iter().filter_entry(|e| {
        e.file_name()
            .to_str()
            .map(|n| !crate::context::DENY_LIST.contains(&n))
            .unwrap_or(true)
    });

    for entry in walker.filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let abs_path = entry.path();
        let rel_path = match abs_path.strip_prefix(codebase_path) {
            Ok(p) => p,
            Err(_) => continue,
        };

        if !is_candidate_file(rel_path, lang) {
            continue;
        }

        let source = match std::fs::read_to_string(abs_path) {
            Ok(s) => s,
            Err(e) => {
                errors_sink.push((
                    Phase::DiscoverEntities,
                    format!("skipping {}: {e}", rel_path.display()),
                ));
                continue;
            }
        };

        let rel_str = rel_path.to_string_lossy().to_string();
        let extracted = match lang {
            Language::Java => regex_extract::extract_java_entities(&rel_str, &source),
            _ => ts_extract::extract_entities(lang, &rel_str, &source).unwrap_or_default(),
        };

        for entity in extracted {
            if by_name.contains_key(&entity.name) {
                errors_sink.push((
                    Phase::DiscoverEntities,
                    format!(
                        "duplicate entity '{}' in {} (keeping first occurrence from {})",
                        entity.name,
                        rel_str,
                        by_name[&entity.name].file
                    ),
                ));
                continue;
            }
            by_name.insert(entity.name.clone(), entity);
        }
    }

    attach_relationships(&mut by_name);

    ExistingEntities { entities: by_name }
}

/// Heuristic relationship extraction (§4.2): a field whose type textually
/// contains another discovered entity's name is recorded as a reference to
/// that entity. This is descriptor-only — no live graph is built, so the
/// result can never contain a reference cycle even when the modeled
/// entities do (§9 Design Notes).
fn attach_relationships(entities: &mut std::collections::HashMap<String, DiscoveredEntity>) {
    let names: Vec<String> = entities.keys().cloned().collect();
    for name in &names {
        let mut relationships = Vec::new();
        {
            let entity = &entities[name];
            for (field_name, field_type) in &entity.fields {
                for other in &names {
                    if other == name {
                        continue;
                    }
                    if field_type.contains(other.as_str()) {
                        let kind = if field_type.starts_with("Vec<")
                            || field_type.starts_with("List<")
                            || field_type.contains('[')
                        {
                            "has_many"
                        } else {
                            "references"
                        };
                        relationships.push(RelationshipDescriptor {
                            target_entity: other.clone(),
                            kind: kind.to_string(),
                            via_field: Some(field_name.clone()),
                        });
                    }
                }
            }
        }
        entities.get_mut(name).unwrap().relationships = relationships;
    }
}

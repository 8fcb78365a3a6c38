//! Regex-based entity extraction for languages with no vendored tree-sitter
//! grammar in this crate (currently Java). Per §4.2, the guarantee is "no
//! false positives when the directory-name heuristic succeeds" — we keep
//! that guarantee by only regex-scanning files already selected by
//! [`super::is_candidate_file`], and by requiring a `class` keyword match
//! rather than scanning arbitrary text.

use crate::state::DiscoveredEntity;
use regex::Regex;
use std::sync::OnceLock;

fn class_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^\s*(?:@\w+(?:\([^)]*\))?\s*)*(?:public\s+|private\s+)?(?:final\s+)?class\s+(\w+)")
            .expect("static regex")
    })
}

fn field_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^\s*(?:private|protected|public)\s+(?:final\s+)?([\w<>\[\], .]+?)\s+(\w+)\s*;")
            .expect("static regex")
    })
}

/// Extract Java-style entity declarations (`class Name { ... }`) from a
/// single file's source text. One entity per top-level `class` match;
/// nested/inner classes are not separately recorded (acceptable per §4.2's
/// "missing entities are acceptable" guarantee).
pub fn extract_java_entities(file_path: &str, source: &str) -> Vec<DiscoveredEntity> {
    let mut entities = Vec::new();

    for caps in class_re().captures_iter(source) {
        let Some(name) = caps.get(1).map(|m| m.as_str().to_string()) else {
            continue;
        };
        let start = caps.get(0).unwrap().start();

        // Scope the field scan to the body following this class header up
        // to the next top-level `class` keyword (or EOF), a cheap
        // approximation of brace matching that's good enough for flat
        // entity classes.
        let body_end = class_re()
            .find_at(source, start + 1)
            .map(|m| m.start())
            .unwrap_or(source.len());
        let body = &source[start..body_end];

        let fields = field_re()
            .captures_iter(body)
            .filter_map(|c| {
                let ty = c.get(1)?.as_str().trim().to_string();
                let field_name = c.get(2)?.as_str().to_string();
                Some((field_name, ty))
            })
            .collect();

        entities.push(DiscoveredEntity {
            name,
            file: file_path.to_string(),
            fields,
            relationships: Vec::new(),
        });
    }

    entities
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_annotated_entity_class() {
        let src = r#"
package com.example.model;

import jakarta.persistence.*;

@Entity
@Table(name = "products")
public class Product {
    private Long id;
    private String name;
    private BigDecimal price;
}
"#;
        let entities = extract_java_entities("src/main/java/com/example/model/Product.java", src);
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].name, "Product");
        assert_eq!(entities[0].fields.len(), 3);
        assert!(entities[0]
            .fields
            .contains(&("id".to_string(), "Long".to_string())));
    }

    #[test]
    fn skips_non_entity_classes() {
        let src = "public class ProductUtils {\n    public static int helper() { return 1; }\n}";
        let entities = extract_java_entities("Utils.java", src);
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].fields.len(), 0);
    }
}

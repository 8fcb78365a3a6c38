//! Entity-name resolution (§ Open Question: case-sensitive matching with
//! symmetric singular/plural normalization) and the deterministic fallback
//! used when no usable model response is available.

use super::{EntityDraft, IntentDraft};

/// Two names refer to the same entity if they're identical, or one is the
/// other with a trailing `s`/`es` added or removed. Case-sensitive: `product`
/// and `Product` are different entities, matching how declared identifiers
/// are actually cased in source.
pub fn names_match(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    singularize(a) == singularize(b)
}

fn singularize(name: &str) -> String {
    if let Some(stem) = name.strip_suffix("ies") {
        return format!("{stem}y");
    }
    if let Some(stem) = name.strip_suffix("es") {
        return stem.to_string();
    }
    if let Some(stem) = name.strip_suffix('s') {
        return stem.to_string();
    }
    name.to_string()
}

/// Best-effort entity extraction with no model available: capitalized words
/// are candidate entity names, resolved against `existing_names` by
/// [`names_match`]; anything unresolved becomes a `create` candidate. No
/// fields/methods are inferred — P3/P4 work from an intent summary alone.
pub fn heuristic_draft(feature_request: &str, existing_names: &[String]) -> IntentDraft {
    let mut seen = std::collections::HashSet::new();
    let mut entities = Vec::new();

    for word in feature_request.split(|c: char| !c.is_alphanumeric()) {
        if word.is_empty() || !word.chars().next().unwrap().is_uppercase() {
            continue;
        }
        if !seen.insert(word.to_string()) {
            continue;
        }

        let resolved = existing_names.iter().find(|n| names_match(n, word));
        let (name, action) = match resolved {
            Some(existing) => (existing.clone(), "extend"),
            None => (word.to_string(), "create"),
        };

        entities.push(EntityDraft {
            name,
            action: action.to_string(),
            fields_to_add: Vec::new(),
            methods_to_add: Vec::new(),
        });
    }

    IntentDraft {
        feature_name: slugify(feature_request),
        intent_summary: feature_request.trim().to_string(),
        entities,
    }
}

fn slugify(text: &str) -> String {
    let words: Vec<&str> = text
        .split_whitespace()
        .take(6)
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|w| !w.is_empty())
        .collect();
    words.join("_").to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_exact_and_plural_variants() {
        assert!(names_match("Product", "Product"));
        assert!(names_match("Product", "Products"));
        assert!(names_match("Category", "Categories"));
        assert!(!names_match("product", "Product"));
        assert!(!names_match("Product", "Order"));
    }

    #[test]
    fn heuristic_resolves_existing_and_invents_new() {
        let draft = heuristic_draft(
            "Add a Coupon that applies a discount to Product",
            &["Product".to_string()],
        );
        let names: Vec<&str> = draft.entities.iter().map(|e| e.name.as_str()).collect();
        assert!(names.contains(&"Coupon"));
        assert!(names.contains(&"Product"));
        let product = draft.entities.iter().find(|e| e.name == "Product").unwrap();
        assert_eq!(product.action, "extend");
        let coupon = draft.entities.iter().find(|e| e.name == "Coupon").unwrap();
        assert_eq!(coupon.action, "create");
    }
}

//! Tree-sitter based entity extraction for the languages this crate
//! vendors a grammar for (Rust, Python, Go, TypeScript). Grounded on the
//! same per-language dispatch `CodeParser::parse_file` uses, narrowed to
//! record-like declarations.

use crate::framework::Language;
use crate::state::DiscoveredEntity;
use tree_sitter::{Node, Parser};

fn tree_sitter_language(lang: Language) -> Option<tree_sitter::Language> {
    match lang {
        Language::Rust => Some(tree_sitter_rust::LANGUAGE.into()),
        Language::TypeScript => Some(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
        Language::Python => Some(tree_sitter_python::LANGUAGE.into()),
        Language::Go => Some(tree_sitter_go::LANGUAGE.into()),
        _ => None,
    }
}

/// Parse `source` and return every record-like declaration found.
/// Returns `None` if `lang` has no vendored grammar, or if parsing fails.
pub fn extract_entities(lang: Language, file_path: &str, source: &str) -> Option<Vec<DiscoveredEntity>> {
    let ts_lang = tree_sitter_language(lang)?;
    let mut parser = Parser::new();
    parser.set_language(&ts_lang).ok()?;
    let tree = parser.parse(source, None)?;
    let root = tree.root_node();

    let mut entities = Vec::new();
    let mut cursor = root.walk();

    for node in root.children(&mut cursor) {
        match lang {
            Language::Rust => {
                if node.kind() == "struct_item" {
                    if let Some(entity) = extract_rust_struct(&node, source, file_path) {
                        entities.push(entity);
                    }
                }
            }
            Language::Python => {
                if node.kind() == "class_definition" {
                    if let Some(entity) = extract_python_class(&node, source, file_path) {
                        entities.push(entity);
                    }
                }
            }
            Language::Go => {
                if node.kind() == "type_declaration" {
                    entities.extend(extract_go_structs(&node, source, file_path));
                }
            }
            Language::TypeScript => {
                if node.kind() == "class_declaration" {
                    if let Some(entity) = extract_ts_class(&node, source, file_path) {
                        entities.push(entity);
                    }
                }
            }
            _ => {}
        }
    }

    Some(entities)
}

fn node_text<'a>(node: &Node, source: &'a str) -> &'a str {
    node.utf8_text(source.as_bytes()).unwrap_or_default()
}

fn extract_rust_struct(node: &Node, source: &str, file_path: &str) -> Option<DiscoveredEntity> {
    let name = node_text(&node.child_by_field_name("name")?, source).to_string();
    let body = node.child_by_field_name("body")?;
    if body.kind() != "field_declaration_list" {
        return None; // tuple struct / unit struct: no named fields to record
    }

    let mut fields = Vec::new();
    let mut cursor = body.walk();
    for field in body.children(&mut cursor) {
        if field.kind() != "field_declaration" {
            continue;
        }
        let field_name = field
            .child_by_field_name("name")
            .map(|n| node_text(&n, source).to_string());
        let field_type = field
            .child_by_field_name("type")
            .map(|n| node_text(&n, source).to_string());
        if let (Some(name), Some(ty)) = (field_name, field_type) {
            fields.push((name, ty));
        }
    }

    Some(DiscoveredEntity {
        name,
        file: file_path.to_string(),
        fields,
        relationships: Vec::new(),
    })
}

fn extract_python_class(node: &Node, source: &str, file_path: &str) -> Option<DiscoveredEntity> {
    let name = node_text(&node.child_by_field_name("name")?, source).to_string();
    let body = node.child_by_field_name("body")?;

    let mut fields = Vec::new();
    let mut cursor = body.walk();
    for stmt in body.children(&mut cursor) {
        // `field: Type` or `field: Type = default` — annotated assignment
        if stmt.kind() == "expression_statement" {
            if let Some(inner) = stmt.named_child(0) {
                if inner.kind() == "assignment" {
                    if let (Some(left), Some(ty)) =
                        (inner.child_by_field_name("left"), inner.child_by_field_name("type"))
                    {
                        fields.push((
                            node_text(&left, source).to_string(),
                            node_text(&ty, source).to_string(),
                        ));
                    }
                }
            }
        }
    }

    Some(DiscoveredEntity {
        name,
        file: file_path.to_string(),
        fields,
        relationships: Vec::new(),
    })
}

fn extract_go_structs(type_decl: &Node, source: &str, file_path: &str) -> Vec<DiscoveredEntity> {
    let mut out = Vec::new();
    let mut cursor = type_decl.walk();
    for spec in type_decl.children(&mut cursor) {
        if spec.kind() != "type_spec" {
            continue;
        }
        let Some(name_node) = spec.child_by_field_name("name") else {
            continue;
        };
        let Some(ty) = spec.child_by_field_name("type") else {
            continue;
        };
        if ty.kind() != "struct_type" {
            continue;
        }
        let name = node_text(&name_node, source).to_string();

        let mut fields = Vec::new();
        if let Some(field_list) = ty.child_by_field_name("body").or_else(|| ty.named_child(0)) {
            let mut fc = field_list.walk();
            for field in field_list.children(&mut fc) {
                if field.kind() != "field_declaration" {
                    continue;
                }
                let field_type = field
                    .child_by_field_name("type")
                    .map(|n| node_text(&n, source).to_string())
                    .unwrap_or_default();
                let mut fname_cursor = field.walk();
                for fname in field.children(&mut fname_cursor) {
                    if fname.kind() == "field_identifier" {
                        fields.push((node_text(&fname, source).to_string(), field_type.clone()));
                    }
                }
            }
        }

        out.push(DiscoveredEntity {
            name,
            file: file_path.to_string(),
            fields,
            relationships: Vec::new(),
        });
    }
    out
}

fn extract_ts_class(node: &Node, source: &str, file_path: &str) -> Option<DiscoveredEntity> {
    let name = node_text(&node.child_by_field_name("name")?, source).to_string();
    let body = node.child_by_field_name("body")?;

    let mut fields = Vec::new();
    let mut cursor = body.walk();
    for member in body.children(&mut cursor) {
        if member.kind() != "public_field_definition" {
            continue;
        }
        let field_name = member
            .child_by_field_name("property")
            .or_else(|| member.child_by_field_name("name"))
            .map(|n| node_text(&n, source).to_string());
        let field_type = member
            .child_by_field_name("type")
            .map(|n| node_text(&n, source).trim_start_matches(':').trim().to_string())
            .unwrap_or_else(|| "any".to_string());
        if let Some(name) = field_name {
            fields.push((name, field_type));
        }
    }

    Some(DiscoveredEntity {
        name,
        file: file_path.to_string(),
        fields,
        relationships: Vec::new(),
    })
}

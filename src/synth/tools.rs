//! §6.3 file-manipulation tool registry and the tool-execution step of the
//! P4 agent loop. The real agent/tool-execution runtime is an external
//! collaborator (§1); this module is the minimal in-crate stand-in that
//! satisfies its contract — `read_file`/`ls` touch the real filesystem
//! read-only, `write_file`/`edit_file` are recorded as candidate patches
//! (never applied here; P5 owns filesystem mutation) after the tool-call
//! guardrail ([`super::middleware::check_tool_call`]) clears the path, and
//! `write_todos` is acknowledged without side effects.

use super::middleware::{self, ToolCallDecision};
use super::scope::Scope;
use crate::llm::{ContentBlock, LlmTool};
use crate::state::{GuardrailMode, Phase};
use std::path::{Path, PathBuf};

pub fn tool_definitions() -> Vec<LlmTool> {
    vec![
        LlmTool {
            name: "read_file".to_string(),
            description: "Read a file's contents, relative to the repository root.".to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "required": ["path"],
                "properties": {"path": {"type": "string"}}
            }),
        },
        LlmTool {
            name: "ls".to_string(),
            description: "List a directory's entries, relative to the repository root."
                .to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "required": ["path"],
                "properties": {"path": {"type": "string"}}
            }),
        },
        LlmTool {
            name: "write_file".to_string(),
            description: "Create or fully overwrite a file with the given content.".to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "required": ["path", "content"],
                "properties": {
                    "path": {"type": "string"},
                    "content": {"type": "string"},
                    "description": {"type": "string"}
                }
            }),
        },
        LlmTool {
            name: "edit_file".to_string(),
            description: "Replace a unique substring of an existing file.".to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "required": ["path", "old_string", "new_string"],
                "properties": {
                    "path": {"type": "string"},
                    "old_string": {"type": "string"},
                    "new_string": {"type": "string"},
                    "description": {"type": "string"}
                }
            }),
        },
        LlmTool {
            name: "write_todos".to_string(),
            description: "Record or update the agent's working todo list for this turn."
                .to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "required": ["todos"],
                "properties": {"todos": {"type": "array", "items": {"type": "string"}}}
            }),
        },
    ]
}

/// The outcome of one tool call, kept as a flat record so
/// [`super::patch_extract`] can scan the log without re-parsing JSON.
pub struct ToolInvocation {
    pub id: String,
    pub name: String,
    pub path: Option<PathBuf>,
    pub content: Option<String>,
    pub old_string: Option<String>,
    pub new_string: Option<String>,
    pub description: String,
    pub is_error: bool,
    pub result_text: String,
}

impl ToolInvocation {
    pub fn as_tool_result_block(&self) -> ContentBlock {
        ContentBlock::ToolResult {
            tool_use_id: self.id.clone(),
            content: self.result_text.clone(),
            is_error: self.is_error.then_some(true),
        }
    }
}

/// §4.6.3 key order for the path argument: try `path`, then `file_path`,
/// then `file`.
fn extract_path_arg(input: &serde_json::Value) -> Option<String> {
    for key in ["path", "file_path", "file"] {
        if let Some(v) = input.get(key).and_then(|v| v.as_str()) {
            if !v.is_empty() {
                return Some(v.to_string());
            }
        }
    }
    None
}

#[allow(clippy::too_many_arguments)]
pub fn execute_tool(
    codebase_path: &Path,
    id: &str,
    name: &str,
    input: &serde_json::Value,
    scope: &Scope,
    guardrail_enabled: bool,
    guardrail_mode: GuardrailMode,
    errors_sink: &mut Vec<(Phase, String)>,
) -> ToolInvocation {
    let base = ToolInvocation {
        id: id.to_string(),
        name: name.to_string(),
        path: None,
        content: None,
        old_string: None,
        new_string: None,
        description: String::new(),
        is_error: false,
        result_text: String::new(),
    };

    match name {
        "read_file" => read_file(codebase_path, input, base),
        "ls" => list_dir(codebase_path, input, base),
        "write_file" | "edit_file" => {
            write_or_edit(codebase_path, name, input, scope, guardrail_enabled, guardrail_mode, errors_sink, base)
        }
        "write_todos" => ToolInvocation {
            result_text: "todos recorded".to_string(),
            ..base
        },
        other => ToolInvocation {
            is_error: true,
            result_text: format!("unknown tool `{other}`"),
            ..base
        },
    }
}

fn read_file(codebase_path: &Path, input: &serde_json::Value, base: ToolInvocation) -> ToolInvocation {
    let Some(rel) = extract_path_arg(input) else {
        return ToolInvocation {
            is_error: true,
            result_text: "missing `path` argument".to_string(),
            ..base
        };
    };
    let abs = codebase_path.join(&rel);
    match std::fs::read_to_string(&abs) {
        Ok(contents) => ToolInvocation {
            path: Some(abs),
            result_text: contents,
            ..base
        },
        Err(e) => ToolInvocation {
            is_error: true,
            result_text: format!("could not read {rel}: {e}"),
            ..base
        },
    }
}

fn list_dir(codebase_path: &Path, input: &serde_json::Value, base: ToolInvocation) -> ToolInvocation {
    let rel = extract_path_arg(input).unwrap_or_default();
    let abs = codebase_path.join(&rel);
    match std::fs::read_dir(&abs) {
        Ok(entries) => {
            let names: Vec<String> = entries
                .flatten()
                .filter_map(|e| e.file_name().into_string().ok())
                .collect();
            ToolInvocation {
                path: Some(abs),
                result_text: names.join("\n"),
                ..base
            }
        }
        Err(e) => ToolInvocation {
            is_error: true,
            result_text: format!("could not list {rel}: {e}"),
            ..base
        },
    }
}

#[allow(clippy::too_many_arguments)]
fn write_or_edit(
    codebase_path: &Path,
    name: &str,
    input: &serde_json::Value,
    scope: &Scope,
    guardrail_enabled: bool,
    guardrail_mode: GuardrailMode,
    errors_sink: &mut Vec<(Phase, String)>,
    base: ToolInvocation,
) -> ToolInvocation {
    let Some(rel_or_abs) = extract_path_arg(input) else {
        // §4.6.3: empty/missing path is a typical exploration mistake —
        // skip with a warning, never fail the call outright.
        errors_sink.push((Phase::SynthesizeCode, format!("{name} call had no path argument; skipped")));
        return ToolInvocation {
            result_text: "no path argument given; call skipped".to_string(),
            ..base
        };
    };

    let candidate = Path::new(&rel_or_abs);
    let abs = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        codebase_path.join(candidate)
    };

    match middleware::check_tool_call(&abs, scope, guardrail_enabled, guardrail_mode) {
        ToolCallDecision::Rejected { message } => {
            errors_sink.push((Phase::SynthesizeCode, message.clone()));
            ToolInvocation {
                path: Some(abs),
                is_error: true,
                result_text: message,
                ..base
            }
        }
        ToolCallDecision::Allowed => {
            let description = input
                .get("description")
                .and_then(|v| v.as_str())
                .unwrap_or(name)
                .to_string();

            if name == "write_file" {
                let content = input.get("content").and_then(|v| v.as_str()).map(str::to_string);
                ToolInvocation {
                    path: Some(abs),
                    content,
                    description,
                    result_text: "write recorded".to_string(),
                    ..base
                }
            } else {
                let old_string = input.get("old_string").and_then(|v| v.as_str()).map(str::to_string);
                let new_string = input.get("new_string").and_then(|v| v.as_str()).map(str::to_string);
                ToolInvocation {
                    path: Some(abs),
                    old_string,
                    new_string,
                    description,
                    result_text: "edit recorded".to_string(),
                    ..base
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tempfile::tempdir;

    fn scope_allowing_all() -> Scope {
        Scope {
            allowed_files: HashSet::new(),
            allowed_dirs: HashSet::from([PathBuf::from("/")]),
            fallback_used: false,
        }
    }

    #[test]
    fn read_file_reads_from_real_fs() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "hello").unwrap();
        let mut errors = Vec::new();
        let inv = execute_tool(
            dir.path(),
            "1",
            "read_file",
            &serde_json::json!({"path": "a.txt"}),
            &scope_allowing_all(),
            true,
            GuardrailMode::Strict,
            &mut errors,
        );
        assert!(!inv.is_error);
        assert_eq!(inv.result_text, "hello");
    }

    #[test]
    fn write_file_missing_path_is_skipped_not_failed() {
        let dir = tempdir().unwrap();
        let mut errors = Vec::new();
        let inv = execute_tool(
            dir.path(),
            "1",
            "write_file",
            &serde_json::json!({"content": "x"}),
            &scope_allowing_all(),
            true,
            GuardrailMode::Strict,
            &mut errors,
        );
        assert!(!inv.is_error);
        assert!(inv.path.is_none());
    }

    #[test]
    fn write_file_out_of_scope_strict_is_rejected() {
        let dir = tempdir().unwrap();
        let scope = Scope {
            allowed_files: HashSet::from([dir.path().join("src/models/a.rs")]),
            allowed_dirs: HashSet::from([dir.path().join("src/models")]),
            fallback_used: false,
        };
        let mut errors = Vec::new();
        let inv = execute_tool(
            dir.path(),
            "1",
            "write_file",
            &serde_json::json!({"path": "/etc/passwd", "content": "x"}),
            &scope,
            true,
            GuardrailMode::Strict,
            &mut errors,
        );
        assert!(inv.is_error);
        assert!(!errors.is_empty());
    }
}

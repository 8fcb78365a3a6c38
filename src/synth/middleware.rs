//! The three P4 middleware layers (§4.6.3). Each is an independent, stateless
//! function — none shares state with another, per §9 Design Notes. Composition
//! order is fixed by the caller in [`super::synthesize_code`]: intent-reminder
//! pre-model, output-guardrail post-model, tool-call guardrail around each
//! tool execution.

use super::scope::Scope;
use crate::llm::LlmResponse;
use crate::state::{FeatureSpec, GuardrailMode};
use regex::Regex;
use std::sync::OnceLock;

/// File-path-shaped tokens the output guardrail scans for in free text.
/// Broad on purpose: false positives here only cost an extra scope check,
/// never a missed violation.
fn path_mention_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?:[\w./-]+/)?[\w.-]+\.(?:java|py|go|rs|ts|tsx|js|jsx|kt|rb|php|yaml|yml|toml|json|xml)\b|pom\.xml|package\.json|go\.mod|Cargo\.toml|requirements\.txt|pyproject\.toml",
        )
        .expect("static regex")
    })
}

/// §4.6.3 layer 1: restate the feature request and the full allowed scope
/// on every model invocation. Stateless by construction — the caller always
/// supplies this fresh, so there's no "already present" bookkeeping to do;
/// it's present by definition on every turn.
pub fn intent_reminder(feature_spec: &FeatureSpec, scope: &Scope) -> String {
    let mut files: Vec<String> = scope
        .allowed_files
        .iter()
        .map(|p| p.display().to_string())
        .collect();
    files.sort();
    let mut dirs: Vec<String> = scope
        .allowed_dirs
        .iter()
        .map(|p| p.display().to_string())
        .collect();
    dirs.sort();

    format!(
        "Reminder — the feature being implemented is: \"{}\". You may only write to these \
         files:\n{}\nor create new files inside these directories:\n{}\nAny other path is out \
         of scope.",
        feature_spec.intent_summary,
        files.join("\n"),
        dirs.join("\n"),
    )
}

/// §4.6.3 layer 2: scan the model's text output for file-path mentions and
/// check each against `scope`. In strict mode, the offending message is
/// replaced with an error listing the violations and the workflow should
/// terminate this phase; in soft mode the original response passes through
/// with a warning recorded by the caller.
pub fn apply_output_guardrail(
    response: LlmResponse,
    scope: &Scope,
    guardrail_enabled: bool,
    guardrail_mode: GuardrailMode,
) -> (LlmResponse, Option<String>) {
    if !guardrail_enabled {
        return (response, None);
    }

    let text = response.text();
    let mentions: Vec<&str> = path_mention_re()
        .find_iter(&text)
        .map(|m| m.as_str())
        .collect();

    let violations: Vec<&str> = mentions
        .into_iter()
        .filter(|mention| !scope.is_allowed(std::path::Path::new(mention)))
        .collect();

    if violations.is_empty() {
        return (response, None);
    }

    let message = format!(
        "model output mentioned path(s) outside the allowed scope: {}",
        violations.join(", ")
    );

    match guardrail_mode {
        GuardrailMode::Strict => {
            let replaced = LlmResponse {
                blocks: vec![crate::llm::ContentBlock::Text {
                    text: format!(
                        "Scope violation: {message}. Allowed files: {:?}. Allowed directories: {:?}.",
                        scope.allowed_files, scope.allowed_dirs
                    ),
                }],
                stop_reason: response.stop_reason,
            };
            (replaced, Some(message))
        }
        GuardrailMode::Soft => (response, Some(message)),
    }
}

/// §4.6.3 layer 3 result for a single tool call targeting a file.
pub enum ToolCallDecision {
    /// Either no guardrail applies (disabled, non-file tool, soft mode) or
    /// the path passed the four-criterion check.
    Allowed,
    /// Strict mode rejected the call; the agent gets a tool-error message
    /// and may retry with a different path. No patch is recorded.
    Rejected { message: String },
}

/// §4.6.3 layer 3: check a `write_file`/`edit_file`/`create_file` path
/// argument against `scope`. Soft mode logs and proceeds — tolerating the
/// violation rather than rejecting the call — exactly as specified; callers
/// that need the strict scope-closure guarantee must run in strict mode.
pub fn check_tool_call(
    path: &std::path::Path,
    scope: &Scope,
    guardrail_enabled: bool,
    guardrail_mode: GuardrailMode,
) -> ToolCallDecision {
    if !guardrail_enabled || scope.is_allowed(path) {
        return ToolCallDecision::Allowed;
    }

    match guardrail_mode {
        GuardrailMode::Strict => ToolCallDecision::Rejected {
            message: format!(
                "path `{}` is outside allowed scope; allowed files: {:?}, allowed directories: {:?}",
                path.display(),
                scope.allowed_files,
                scope.allowed_dirs
            ),
        },
        GuardrailMode::Soft => ToolCallDecision::Allowed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ContentBlock, StopReason};
    use crate::state::NewFilesPlanning;
    use std::collections::HashSet;
    use std::path::PathBuf;

    fn empty_spec() -> FeatureSpec {
        FeatureSpec {
            feature_name: "f".into(),
            intent_summary: "add coupons".into(),
            affected_files: vec![],
            entities_to_extend: vec![],
            entities_to_create: vec![],
            existing_context: vec![],
            new_files_planning: NewFilesPlanning::default(),
            modifications: vec![],
            todo_list: vec![],
        }
    }

    fn scope_with(file: &str) -> Scope {
        let mut allowed_files = HashSet::new();
        allowed_files.insert(PathBuf::from(file));
        Scope {
            allowed_files,
            allowed_dirs: HashSet::new(),
            fallback_used: false,
        }
    }

    #[test]
    fn intent_reminder_mentions_feature_and_scope() {
        let spec = empty_spec();
        let scope = scope_with("/repo/src/models/coupon.rs");
        let reminder = intent_reminder(&spec, &scope);
        assert!(reminder.contains("add coupons"));
        assert!(reminder.contains("coupon.rs"));
    }

    #[test]
    fn output_guardrail_strict_replaces_violating_message() {
        let scope = scope_with("/repo/src/models/coupon.rs");
        let response = LlmResponse {
            blocks: vec![ContentBlock::Text {
                text: "I'll also write to src/Evil.java for fun.".into(),
            }],
            stop_reason: StopReason::EndTurn,
        };
        let (out, violation) = apply_output_guardrail(response, &scope, true, GuardrailMode::Strict);
        assert!(violation.is_some());
        assert!(out.text().contains("Scope violation"));
    }

    #[test]
    fn output_guardrail_soft_passes_through() {
        let scope = scope_with("/repo/src/models/coupon.rs");
        let response = LlmResponse {
            blocks: vec![ContentBlock::Text {
                text: "I'll also write to src/Evil.java for fun.".into(),
            }],
            stop_reason: StopReason::EndTurn,
        };
        let (out, violation) = apply_output_guardrail(response, &scope, true, GuardrailMode::Soft);
        assert!(violation.is_some());
        assert!(out.text().contains("src/Evil.java"));
    }

    #[test]
    fn tool_call_guardrail_strict_rejects_out_of_scope() {
        let scope = scope_with("/repo/src/models/coupon.rs");
        let decision = check_tool_call(
            std::path::Path::new("/etc/passwd"),
            &scope,
            true,
            GuardrailMode::Strict,
        );
        assert!(matches!(decision, ToolCallDecision::Rejected { .. }));
    }

    #[test]
    fn tool_call_guardrail_soft_allows_out_of_scope() {
        let scope = scope_with("/repo/src/models/coupon.rs");
        let decision = check_tool_call(
            std::path::Path::new("/etc/passwd"),
            &scope,
            true,
            GuardrailMode::Soft,
        );
        assert!(matches!(decision, ToolCallDecision::Allowed));
    }
}

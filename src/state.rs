//! The shared cross-phase state (`AgentState`) and the data types each
//! phase reads and writes (§3).
//!
//! Fields are written exactly once by their owning phase; later phases
//! never mutate a field another phase owns, except to append to `errors`.
//! See [`crate::workflow`] for the routing functions that decide, between
//! phases, whether to proceed, skip, or terminate based on this state.

use crate::error::RecordedError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Execution mode selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    DryRun,
    Implement,
}

impl Default for Mode {
    fn default() -> Self {
        Self::DryRun
    }
}

/// Guardrail strictness for the P4 middleware layers (§4.6.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardrailMode {
    Strict,
    Soft,
}

impl Default for GuardrailMode {
    fn default() -> Self {
        Self::Strict
    }
}

/// The last-completed phase, used for user-facing status lines and to
/// drive routing decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Start,
    AnalyzeContext,
    DiscoverEntities,
    ParseIntent,
    ValidateStructure,
    AnalyzeImpact,
    SynthesizeCode,
    ExecuteChanges,
    Error,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Phase::Start => "start",
            Phase::AnalyzeContext => "analyze_context",
            Phase::DiscoverEntities => "discover_entities",
            Phase::ParseIntent => "parse_intent",
            Phase::ValidateStructure => "validate_structure",
            Phase::AnalyzeImpact => "analyze_impact",
            Phase::SynthesizeCode => "synthesize_code",
            Phase::ExecuteChanges => "execute_changes",
            Phase::Error => "error",
        };
        f.write_str(s)
    }
}

// ============================================================================
// P1 — context_analysis
// ============================================================================

/// Structured summary of the target repository produced by P1 (§4.1).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextAnalysis {
    /// Detected framework tag, before P2's confirmation pass.
    pub framework_candidate: String,
    /// Dominant language by extension count (manifest tie-break applied).
    pub language: String,
    /// Build system identifier, e.g. "cargo", "maven", "npm".
    pub build_system: Option<String>,
    /// Top-level directories under `codebase_path`, excluding the deny-list.
    pub top_level_dirs: Vec<String>,
    /// A small sample of representative files, relative to `codebase_path`.
    pub representative_files: Vec<String>,
    /// File-extension counts gathered during the traversal.
    pub extension_counts: HashMap<String, usize>,
    /// True if the phase fell back to a minimal summary after an IO error.
    pub degraded: bool,
}

// ============================================================================
// P1.5 — existing_entities
// ============================================================================

/// One discovered entity: a record/struct/class declaration carrying data
/// fields, found in the target repository (§4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveredEntity {
    pub name: String,
    /// Path relative to `codebase_path`.
    pub file: String,
    /// Ordered field-name -> type-string mapping, in declaration order.
    pub fields: Vec<(String, String)>,
    /// Heuristically extracted cross-entity references.
    pub relationships: Vec<RelationshipDescriptor>,
}

/// A heuristic cross-entity reference, e.g. an embedded foreign key or an
/// ORM association annotation. Descriptors are name-keyed, never live
/// references, so the discovery output cannot contain reference cycles
/// even when the entities themselves do (§9 Design Notes).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipDescriptor {
    pub target_entity: String,
    pub kind: String,
    pub via_field: Option<String>,
}

/// The full entity map produced by P1.5: one record per discovered entity,
/// keyed by declared name (first occurrence wins, §4.2 dedup rule).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExistingEntities {
    pub entities: HashMap<String, DiscoveredEntity>,
}

impl ExistingEntities {
    pub fn fields_of(&self, name: &str) -> Option<&[(String, String)]> {
        self.entities.get(name).map(|e| e.fields.as_slice())
    }

    pub fn file_of(&self, name: &str) -> Option<&str> {
        self.entities.get(name).map(|e| e.file.as_str())
    }
}

// ============================================================================
// P2 — feature_spec
// ============================================================================

/// Whether P2 will extend an existing entity or scaffold a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityAction {
    Extend,
    Create,
}

/// Per-entity impact record (§3 `existing_context`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExistingContext {
    pub entity: String,
    pub action: EntityAction,
    pub target_file: Option<String>,
    #[serde(default)]
    pub current_fields: Vec<(String, String)>,
    #[serde(default)]
    pub relationships: Vec<RelationshipDescriptor>,
    #[serde(default)]
    pub fields_to_add: Vec<(String, String)>,
    #[serde(default)]
    pub methods_to_add: Vec<String>,
}

/// A single file suggested for creation by the new-files planner (§3,§4.3 step 5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestedFile {
    pub filename: String,
    /// Relative to the repository root, using the framework's conventional layout.
    pub relative_path: String,
    pub layer: String,
    pub class_name: String,
    #[serde(default)]
    pub solid_principles: Vec<String>,
    #[serde(default)]
    pub framework_conventions: Vec<String>,
    /// Entity this file supports, if any (model/dto/repository/etc. for a
    /// `create` entity); `None` for feature-only helper files.
    pub for_entity: Option<String>,
}

impl SuggestedFile {
    pub fn full_path(&self) -> String {
        format!("{}/{}", self.relative_path.trim_end_matches('/'), self.filename)
    }
}

/// New-files planning output: a set of suggested files plus a topological
/// creation order over their layers (§3 invariant: model before repository
/// before service before controller, or a framework-specific override).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewFilesPlanning {
    pub suggested_files: Vec<SuggestedFile>,
    /// Full paths (relative_path/filename) in creation order.
    pub creation_order: Vec<String>,
}

/// What kind of change a modification descriptor represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModificationAction {
    AddFields,
    AddMethod,
    Other,
}

/// A modification to an existing file (§3 `modifications`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModificationDescriptor {
    pub file: String,
    pub entity: String,
    pub action: ModificationAction,
    pub details: Vec<String>,
}

/// Phase a todo item belongs to (§3 `todo_list`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoPhase {
    Analysis,
    Planning,
    Validation,
    Generation,
    Execution,
    Testing,
    Review,
}

/// A single todo item in the dependency-ordered task list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TodoItem {
    pub id: u32,
    pub title: String,
    pub phase: TodoPhase,
    #[serde(default)]
    pub depends_on: Vec<u32>,
    #[serde(default)]
    pub files_affected: Vec<String>,
}

/// The fully populated feature plan produced by P2 (§3 `FeatureSpec`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureSpec {
    pub feature_name: String,
    pub intent_summary: String,
    pub affected_files: Vec<String>,
    pub entities_to_extend: Vec<String>,
    pub entities_to_create: Vec<String>,
    pub existing_context: Vec<ExistingContext>,
    pub new_files_planning: NewFilesPlanning,
    pub modifications: Vec<ModificationDescriptor>,
    pub todo_list: Vec<TodoItem>,
}

impl FeatureSpec {
    /// §3 invariant: `entities_to_extend` and `entities_to_create` partition
    /// the candidate set with empty intersection.
    pub fn partition_is_valid(&self) -> bool {
        self.entities_to_extend
            .iter()
            .all(|e| !self.entities_to_create.contains(e))
    }

    /// §8 Property 3: the `depends_on` graph over todo ids is acyclic.
    pub fn todo_dag_is_acyclic(&self) -> bool {
        let by_id: HashMap<u32, &TodoItem> =
            self.todo_list.iter().map(|t| (t.id, t)).collect();
        let mut visiting = std::collections::HashSet::new();
        let mut done = std::collections::HashSet::new();

        fn visit(
            id: u32,
            by_id: &HashMap<u32, &TodoItem>,
            visiting: &mut std::collections::HashSet<u32>,
            done: &mut std::collections::HashSet<u32>,
        ) -> bool {
            if done.contains(&id) {
                return true;
            }
            if !visiting.insert(id) {
                return false; // back-edge: cycle
            }
            if let Some(item) = by_id.get(&id) {
                for dep in &item.depends_on {
                    if !visit(*dep, by_id, visiting, done) {
                        return false;
                    }
                }
            }
            visiting.remove(&id);
            done.insert(id);
            true
        }

        self.todo_list
            .iter()
            .all(|t| visit(t.id, &by_id, &mut visiting, &mut done))
    }
}

// ============================================================================
// P2A — structure_assessment
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn weight(self) -> u32 {
        match self {
            Severity::Low => 2,
            Severity::Medium => 5,
            Severity::High => 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationType {
    MissingLayer,
    NestedModel,
    DataStorageInController,
    MisplacedFile,
    MonolithicClass,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Violation {
    #[serde(rename = "type")]
    pub violation_type: ViolationType,
    pub severity: Severity,
    pub file: Option<String>,
    pub layer: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractClass {
    pub from_file: String,
    pub class_name: String,
    pub target_file: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefactoringPlan {
    pub create_layers: Vec<String>,
    pub extract_classes: Vec<ExtractClass>,
    pub move_code: Vec<String>,
    pub add_interfaces: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructureAssessment {
    pub is_production_ready: bool,
    pub score: i32,
    pub violations: Vec<Violation>,
    pub refactoring_plan: RefactoringPlan,
}

impl StructureAssessment {
    pub fn from_violations(violations: Vec<Violation>, refactoring_plan: RefactoringPlan) -> Self {
        let penalty: u32 = violations.iter().map(|v| v.severity.weight()).sum();
        let score = 100i32.saturating_sub(penalty as i32).max(0);
        let has_high = violations.iter().any(|v| v.severity == Severity::High);
        Self {
            is_production_ready: score >= 70 && !has_high,
            score,
            violations,
            refactoring_plan,
        }
    }
}

// ============================================================================
// P3 — impact_analysis
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImpactAnalysis {
    pub patterns_to_follow: Vec<String>,
    pub files_to_modify: Vec<String>,
    pub constraints: Vec<String>,
    pub testing_approach: String,
    pub architecture_insights: String,
    /// Set when P3 hit its timeout and returned a neutral/empty analysis
    /// (§4.5 failure semantics — degraded, not failed).
    pub degraded: bool,
}

// ============================================================================
// P4 — patches
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatchTool {
    WriteFile,
    EditFile,
}

/// A single file operation (§3 `Patch`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patch {
    pub tool: PatchTool,
    /// Absolute target path.
    pub file: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_string: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_string: Option<String>,
    pub description: String,
}

impl Patch {
    /// §3 per-tool field validity, checked before a patch is accepted into
    /// `state.patches` (§4.6.4 patch extraction).
    pub fn is_well_formed(&self) -> bool {
        match self.tool {
            PatchTool::WriteFile => self
                .content
                .as_ref()
                .map(|c| !c.is_empty())
                .unwrap_or(false),
            PatchTool::EditFile => {
                let old_ok = self.old_string.as_ref().map(|s| !s.is_empty()).unwrap_or(false);
                let new_ok = self.new_string.as_ref().map(|s| !s.is_empty()).unwrap_or(false);
                old_ok && new_ok
            }
        }
    }
}

// ============================================================================
// P5 — execution_results
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxResult {
    pub build_success: bool,
    pub run_success: bool,
    pub error_type: Option<crate::error::SandboxErrorType>,
    pub iterations: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionResults {
    pub patches_applied: Vec<PathBuf>,
    pub errors: Vec<String>,
    pub verification_status: String,
    pub sandbox: Option<SandboxResult>,
}

// ============================================================================
// AgentState
// ============================================================================

/// The full cross-phase state. Created at entry with only the input fields
/// populated; every other field is `None`/empty until its owning phase runs
/// (§3 Lifecycle).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentState {
    // Inputs
    pub codebase_path: PathBuf,
    pub feature_request: String,
    pub mode: Mode,
    pub guardrail_mode: GuardrailMode,
    pub guardrail_enabled: bool,
    pub sandbox_enabled: bool,
    pub max_iterations: u32,

    // Phase outputs
    pub context_analysis: Option<ContextAnalysis>,
    pub existing_entities: Option<ExistingEntities>,
    pub framework: Option<String>,
    pub feature_spec: Option<FeatureSpec>,
    pub structure_assessment: Option<StructureAssessment>,
    pub impact_analysis: Option<ImpactAnalysis>,
    pub patches: Vec<Patch>,
    pub execution_results: Option<ExecutionResults>,

    // Bookkeeping
    pub current_phase: Phase,
    pub errors: Vec<RecordedError>,
}

impl AgentState {
    pub fn new(
        codebase_path: PathBuf,
        feature_request: String,
        mode: Mode,
        guardrail_mode: GuardrailMode,
        guardrail_enabled: bool,
        sandbox_enabled: bool,
        max_iterations: u32,
    ) -> Self {
        Self {
            codebase_path,
            feature_request,
            mode,
            guardrail_mode,
            guardrail_enabled,
            sandbox_enabled,
            max_iterations,
            context_analysis: None,
            existing_entities: None,
            framework: None,
            feature_spec: None,
            structure_assessment: None,
            impact_analysis: None,
            patches: Vec::new(),
            execution_results: None,
            current_phase: Phase::Start,
            errors: Vec::new(),
        }
    }

    pub fn record_warning(&mut self, phase: Phase, message: impl Into<String>) {
        self.errors
            .push(RecordedError::warning(phase.to_string(), message));
    }

    pub fn record_fatal(&mut self, phase: Phase, message: impl Into<String>) {
        self.errors
            .push(RecordedError::fatal(phase.to_string(), message));
    }

    pub fn has_fatal_error(&self) -> bool {
        self.errors.iter().any(|e| e.is_fatal())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn todo(id: u32, deps: &[u32]) -> TodoItem {
        TodoItem {
            id,
            title: format!("todo {id}"),
            phase: TodoPhase::Planning,
            depends_on: deps.to_vec(),
            files_affected: vec![],
        }
    }

    fn spec_with_todos(todos: Vec<TodoItem>) -> FeatureSpec {
        FeatureSpec {
            feature_name: "x".into(),
            intent_summary: "x".into(),
            affected_files: vec![],
            entities_to_extend: vec![],
            entities_to_create: vec![],
            existing_context: vec![],
            new_files_planning: NewFilesPlanning::default(),
            modifications: vec![],
            todo_list: todos,
        }
    }

    #[test]
    fn todo_dag_acyclic_passes_for_a_dag() {
        let spec = spec_with_todos(vec![todo(1, &[]), todo(2, &[1]), todo(3, &[1, 2])]);
        assert!(spec.todo_dag_is_acyclic());
    }

    #[test]
    fn todo_dag_detects_cycle() {
        let spec = spec_with_todos(vec![todo(1, &[2]), todo(2, &[1])]);
        assert!(!spec.todo_dag_is_acyclic());
    }

    #[test]
    fn partition_rejects_overlap() {
        let mut spec = spec_with_todos(vec![]);
        spec.entities_to_extend = vec!["Product".into()];
        spec.entities_to_create = vec!["Product".into()];
        assert!(!spec.partition_is_valid());
    }

    #[test]
    fn structure_score_floors_at_zero() {
        let violations = vec![Violation {
            violation_type: ViolationType::MonolithicClass,
            severity: Severity::High,
            file: None,
            layer: None,
            message: "huge".into(),
        }; 15];
        let assessment = StructureAssessment::from_violations(violations, RefactoringPlan::default());
        assert_eq!(assessment.score, 0);
        assert!(!assessment.is_production_ready);
    }

    #[test]
    fn patch_validity_rules() {
        let write_empty = Patch {
            tool: PatchTool::WriteFile,
            file: "/tmp/x".into(),
            content: Some(String::new()),
            old_string: None,
            new_string: None,
            description: "d".into(),
        };
        assert!(!write_empty.is_well_formed());

        let edit_ok = Patch {
            tool: PatchTool::EditFile,
            file: "/tmp/x".into(),
            content: None,
            old_string: Some("a".into()),
            new_string: Some("b".into()),
            description: "d".into(),
        };
        assert!(edit_ok.is_well_formed());
    }
}

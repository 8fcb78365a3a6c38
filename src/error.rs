//! Error taxonomy for the pipeline.
//!
//! Input errors are the only ones that terminate the process (exit 3, §7).
//! Everything else is recorded into `AgentState::errors` and inspected by
//! the routing functions in [`crate::workflow`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Severity of a recorded phase error. Only `Fatal` stops the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSeverity {
    Warning,
    Fatal,
}

/// Top-level error type for anything that aborts the process outright.
/// Phase-internal failures are represented as [`RecordedError`] instead and
/// never raised as exceptions (§7 propagation policy).
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("codebase path does not exist or is not a directory: {0}")]
    InvalidCodebasePath(String),

    #[error("exactly one of --feature-request or --feature-request-spec is required")]
    AmbiguousFeatureRequest,

    #[error("workflow ended in a fatal error: {0}")]
    WorkflowFatal(String),

    #[error("sandbox reported a critical error: {0:?}")]
    SandboxCritical(SandboxErrorType),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl AgentError {
    /// Process exit code per §6.1.
    pub fn exit_code(&self) -> i32 {
        match self {
            AgentError::Config(_)
            | AgentError::InvalidCodebasePath(_)
            | AgentError::AmbiguousFeatureRequest => 3,
            AgentError::SandboxCritical(_) => 2,
            _ => 1,
        }
    }
}

/// Classification of a sandbox run failure (§4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SandboxErrorType {
    Compilation,
    Dependency,
    Runtime,
    Configuration,
    Network,
    Unknown,
}

/// A single recorded error, appended to `AgentState::errors`. Never raised
/// as an exception across phase boundaries (§7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordedError {
    pub phase: String,
    pub message: String,
    pub severity: ErrorSeverity,
}

impl RecordedError {
    pub fn warning(phase: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            phase: phase.into(),
            message: message.into(),
            severity: ErrorSeverity::Warning,
        }
    }

    pub fn fatal(phase: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            phase: phase.into(),
            message: message.into(),
            severity: ErrorSeverity::Fatal,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.severity == ErrorSeverity::Fatal
    }
}

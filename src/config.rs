//! CLI surface and runtime configuration (§6.1, §6.2).
//!
//! `Cli` is the `clap::Parser` entry point; `Config` is what the rest of the
//! crate actually consumes, validated once at startup the way
//! `chat::config::ChatConfig` validates its fields before any phase runs.

use crate::error::AgentError;
use crate::state::{GuardrailMode as StateGuardrailMode, Mode as StateMode};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// `--mode` values (§6.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "snake_case")]
pub enum CliMode {
    DryRun,
    Implement,
}

impl From<CliMode> for StateMode {
    fn from(m: CliMode) -> Self {
        match m {
            CliMode::DryRun => StateMode::DryRun,
            CliMode::Implement => StateMode::Implement,
        }
    }
}

/// `--guardrail-mode` values (§6.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "snake_case")]
pub enum CliGuardrailMode {
    Strict,
    Soft,
}

impl From<CliGuardrailMode> for StateGuardrailMode {
    fn from(m: CliGuardrailMode) -> Self {
        match m {
            CliGuardrailMode::Strict => StateGuardrailMode::Strict,
            CliGuardrailMode::Soft => StateGuardrailMode::Soft,
        }
    }
}

/// Feature-implementation agent: turns a feature request into a patch set
/// against an existing repository (§6.1).
#[derive(Parser, Debug)]
#[command(name = "feature-agent", version, about)]
pub struct Cli {
    /// Root of the target repository.
    #[arg(long)]
    pub codebase_path: PathBuf,

    /// The natural-language feature request, given inline.
    #[arg(long, conflicts_with = "feature_request_spec")]
    pub feature_request: Option<String>,

    /// Path to a file holding the feature request / specification document.
    #[arg(long, conflicts_with = "feature_request")]
    pub feature_request_spec: Option<PathBuf>,

    #[arg(long, value_enum, default_value = "dry_run")]
    pub mode: CliMode,

    /// Enable P5 sandbox build/run verification.
    #[arg(long)]
    pub sandbox: bool,

    /// Sandbox build/run retry cap.
    #[arg(long, default_value_t = 10)]
    pub max_iteration: u32,

    /// Toggle the three P4 middleware layers (intent-reminder, output
    /// guardrail, tool-call guardrail). Enabled by default; `--no-guardrail`
    /// turns all three off.
    #[arg(long, default_value_t = true)]
    pub enable_guardrail: bool,

    /// Inverse of `--enable-guardrail`.
    #[arg(long)]
    pub no_guardrail: bool,

    #[arg(long, value_enum, default_value = "strict")]
    pub guardrail_mode: CliGuardrailMode,

    /// Skip P2A (structure validation) entirely; it is optional per §4.8.
    #[arg(long)]
    pub skip_structure_validation: bool,

    /// Model identifier passed to the LLM provider.
    #[arg(long, env = "FEATURE_AGENT_MODEL", default_value = crate::llm::DEFAULT_MODEL)]
    pub model: String,

    /// Directory to write a between-phase `AgentState` checkpoint into
    /// (§6.5). Unset disables checkpointing.
    #[arg(long)]
    pub checkpoint_dir: Option<PathBuf>,

    /// Build command run inside the sandbox, when `--sandbox` is set.
    #[arg(long, default_value = "cargo build")]
    pub sandbox_build_command: String,

    /// Run command used for the sandbox's critical-error monitor.
    #[arg(long, default_value = "cargo run")]
    pub sandbox_run_command: String,
}

/// Fully validated configuration the rest of the crate consumes. Built once
/// from [`Cli`] plus environment variables (§6.2).
#[derive(Debug, Clone)]
pub struct Config {
    pub codebase_path: PathBuf,
    pub feature_request: String,
    pub mode: StateMode,
    pub guardrail_mode: StateGuardrailMode,
    pub guardrail_enabled: bool,
    pub skip_structure_validation: bool,
    pub sandbox_enabled: bool,
    pub max_iterations: u32,
    pub model: String,
    pub llm_api_key: String,
    pub sandbox_api_key: Option<String>,
    pub checkpoint_dir: Option<PathBuf>,
    pub sandbox_build_command: String,
    pub sandbox_run_command: String,
}

impl Config {
    /// Resolve a [`Cli`] into a [`Config`], reading `LLM_API_KEY` /
    /// `SANDBOX_API_KEY` from the environment and validating the
    /// input-error conditions of §7 (bad path, ambiguous request). All of
    /// these failures are input errors and exit 3.
    pub fn from_cli(cli: Cli) -> Result<Self, AgentError> {
        if !cli.codebase_path.is_dir() {
            return Err(AgentError::InvalidCodebasePath(
                cli.codebase_path.display().to_string(),
            ));
        }

        let feature_request = match (cli.feature_request, cli.feature_request_spec) {
            (Some(text), None) => text,
            (None, Some(path)) => std::fs::read_to_string(&path).map_err(|e| {
                AgentError::Config(format!(
                    "could not read feature request spec at {}: {e}",
                    path.display()
                ))
            })?,
            _ => return Err(AgentError::AmbiguousFeatureRequest),
        };

        if feature_request.trim().is_empty() {
            return Err(AgentError::Config(
                "feature request is empty".to_string(),
            ));
        }

        let llm_api_key = std::env::var("LLM_API_KEY").map_err(|_| {
            AgentError::Config("LLM_API_KEY must be set to run any phase that calls the model".into())
        })?;

        let sandbox_api_key = std::env::var("SANDBOX_API_KEY").ok();
        if cli.sandbox && sandbox_api_key.is_none() {
            return Err(AgentError::Config(
                "--sandbox requires SANDBOX_API_KEY to be set".to_string(),
            ));
        }

        Ok(Self {
            codebase_path: cli
                .codebase_path
                .canonicalize()
                .unwrap_or(cli.codebase_path),
            feature_request,
            mode: cli.mode.into(),
            guardrail_mode: cli.guardrail_mode.into(),
            guardrail_enabled: cli.enable_guardrail && !cli.no_guardrail,
            skip_structure_validation: cli.skip_structure_validation,
            sandbox_enabled: cli.sandbox,
            max_iterations: cli.max_iteration,
            model: cli.model,
            llm_api_key,
            sandbox_api_key,
            checkpoint_dir: cli.checkpoint_dir,
            sandbox_build_command: cli.sandbox_build_command,
            sandbox_run_command: cli.sandbox_run_command,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_cli(codebase_path: PathBuf) -> Cli {
        Cli {
            codebase_path,
            feature_request: Some("add a thing".to_string()),
            feature_request_spec: None,
            mode: CliMode::DryRun,
            sandbox: false,
            max_iteration: 10,
            enable_guardrail: true,
            no_guardrail: false,
            guardrail_mode: CliGuardrailMode::Strict,
            skip_structure_validation: false,
            model: crate::llm::DEFAULT_MODEL.to_string(),
            checkpoint_dir: None,
            sandbox_build_command: "cargo build".to_string(),
            sandbox_run_command: "cargo run".to_string(),
        }
    }

    #[test]
    fn rejects_nonexistent_codebase_path() {
        std::env::set_var("LLM_API_KEY", "test-key");
        let cli = base_cli(PathBuf::from("/nonexistent/xyz/path"));
        let err = Config::from_cli(cli).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn rejects_sandbox_without_api_key() {
        std::env::set_var("LLM_API_KEY", "test-key");
        std::env::remove_var("SANDBOX_API_KEY");
        let dir = tempfile::tempdir().unwrap();
        let mut cli = base_cli(dir.path().to_path_buf());
        cli.sandbox = true;
        let err = Config::from_cli(cli).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn accepts_a_valid_configuration() {
        std::env::set_var("LLM_API_KEY", "test-key");
        let dir = tempfile::tempdir().unwrap();
        let cli = base_cli(dir.path().to_path_buf());
        let config = Config::from_cli(cli).unwrap();
        assert_eq!(config.feature_request, "add a thing");
        assert!(!config.sandbox_enabled);
    }
}

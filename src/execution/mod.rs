//! P5 — Execute Changes (§4.7). Applies the patches P4 emitted, either as a
//! dry-run summary or as real filesystem writes, then optionally hands the
//! repository to a [`sandbox::SandboxRuntime`] for build/run verification.

pub mod sandbox;

use crate::error::SandboxErrorType;
use crate::state::{ExecutionResults, Mode, Patch, PatchTool, SandboxResult};
use sandbox::{CriticalError, SandboxRuntime};
use std::path::Path;

/// §4.7 dry-run rendering: first N bytes of content, or the diff pair for
/// an edit. Kept small so a CLI can print it directly.
const DRY_RUN_EXCERPT_BYTES: usize = 200;

/// Apply (or, in dry-run mode, describe) every patch in emission order.
/// Never rolls back already-applied patches on a later failure — best-effort
/// semantics per §4.7's invariants.
pub fn apply_patches(codebase_path: &Path, patches: &[Patch], mode: Mode) -> ExecutionResults {
    let mut results = ExecutionResults {
        patches_applied: Vec::new(),
        errors: Vec::new(),
        verification_status: String::new(),
        sandbox: None,
    };

    for patch in patches {
        if !patch.file.starts_with(codebase_path) {
            results.errors.push(format!(
                "refusing to touch `{}`: outside codebase root `{}`",
                patch.file.display(),
                codebase_path.display()
            ));
            continue;
        }

        match mode {
            Mode::DryRun => render_dry_run(patch, &mut results),
            Mode::Implement => apply_one(patch, &mut results),
        }
    }

    results.verification_status = if results.errors.is_empty() {
        "clean".to_string()
    } else {
        format!("{} error(s)", results.errors.len())
    };

    results
}

fn render_dry_run(patch: &Patch, results: &mut ExecutionResults) {
    let summary = match patch.tool {
        PatchTool::WriteFile => {
            let content = patch.content.as_deref().unwrap_or_default();
            let excerpt: String = content.chars().take(DRY_RUN_EXCERPT_BYTES).collect();
            format!("write_file {} :: {excerpt}", patch.file.display())
        }
        PatchTool::EditFile => format!(
            "edit_file {} :: {:?} -> {:?}",
            patch.file.display(),
            patch.old_string.as_deref().unwrap_or_default(),
            patch.new_string.as_deref().unwrap_or_default()
        ),
    };
    tracing::info!(target: "execution", "{summary}");
    results.patches_applied.push(patch.file.clone());
}

fn apply_one(patch: &Patch, results: &mut ExecutionResults) {
    match patch.tool {
        PatchTool::WriteFile => {
            let content = patch.content.as_deref().unwrap_or_default();
            if let Some(parent) = patch.file.parent() {
                if let Err(e) = std::fs::create_dir_all(parent) {
                    results
                        .errors
                        .push(format!("could not create `{}`: {e}", parent.display()));
                    return;
                }
            }
            match std::fs::write(&patch.file, content) {
                Ok(()) => results.patches_applied.push(patch.file.clone()),
                Err(e) => results
                    .errors
                    .push(format!("could not write `{}`: {e}", patch.file.display())),
            }
        }
        PatchTool::EditFile => apply_edit(patch, results),
    }
}

fn apply_edit(patch: &Patch, results: &mut ExecutionResults) {
    let old = patch.old_string.as_deref().unwrap_or_default();
    let new = patch.new_string.as_deref().unwrap_or_default();

    let existing = match std::fs::read_to_string(&patch.file) {
        Ok(s) => s,
        Err(e) => {
            results
                .errors
                .push(format!("could not read `{}` for edit: {e}", patch.file.display()));
            return;
        }
    };

    let occurrences = existing.matches(old).count();
    if occurrences != 1 {
        results.errors.push(format!(
            "`old_string` occurs {occurrences} time(s) in `{}`, expected exactly 1; skipping",
            patch.file.display()
        ));
        return;
    }

    let updated = existing.replacen(old, new, 1);
    match std::fs::write(&patch.file, updated) {
        Ok(()) => results.patches_applied.push(patch.file.clone()),
        Err(e) => results
            .errors
            .push(format!("could not write `{}`: {e}", patch.file.display())),
    }
}

/// §4.7 sandbox verification loop: build, then run with critical-error
/// monitoring, retrying the build on non-critical failures up to
/// `max_iterations` times. Never retries after a critical run error.
pub async fn run_sandbox_verification(
    runtime: &dyn SandboxRuntime,
    codebase_path: &Path,
    build_command: &str,
    run_command: &str,
    max_iterations: u32,
) -> SandboxResult {
    let session = match runtime.create().await {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!("sandbox session creation failed: {e}");
            return SandboxResult {
                build_success: false,
                run_success: false,
                error_type: Some(SandboxErrorType::Unknown),
                iterations: 0,
            };
        }
    };

    if let Err(e) = session.upload(codebase_path).await {
        tracing::warn!("sandbox upload failed: {e}");
        return SandboxResult {
            build_success: false,
            run_success: false,
            error_type: Some(SandboxErrorType::Unknown),
            iterations: 0,
        };
    }

    let mut iterations = 0u32;
    let mut build_success = false;

    while iterations < max_iterations.max(1) {
        iterations += 1;
        let build = session.run(build_command, sandbox::BUILD_TIMEOUT).await;
        match build {
            Ok(output) if output.exit_code == 0 => {
                build_success = true;
                break;
            }
            Ok(output) => {
                tracing::info!(
                    "sandbox build attempt {iterations}/{max_iterations} failed (exit {})",
                    output.exit_code
                );
                if iterations >= max_iterations {
                    session.close().await;
                    return SandboxResult {
                        build_success: false,
                        run_success: false,
                        error_type: Some(SandboxErrorType::Compilation),
                        iterations,
                    };
                }
            }
            Err(e) => {
                tracing::warn!("sandbox build command failed to execute: {e}");
                session.close().await;
                return SandboxResult {
                    build_success: false,
                    run_success: false,
                    error_type: Some(SandboxErrorType::Unknown),
                    iterations,
                };
            }
        }
    }

    if !build_success {
        session.close().await;
        return SandboxResult {
            build_success: false,
            run_success: false,
            error_type: Some(SandboxErrorType::Compilation),
            iterations,
        };
    }

    let run_outcome = sandbox::monitor_run(&session, run_command).await;
    session.close().await;

    match run_outcome {
        Ok(()) => SandboxResult {
            build_success: true,
            run_success: true,
            error_type: None,
            iterations,
        },
        Err(CriticalError { error_type, .. }) => SandboxResult {
            build_success: true,
            run_success: false,
            error_type: Some(error_type),
            iterations,
        },
    }
}

//! Optional between-phase checkpointing (§6.5).
//!
//! No persistence is required; this is the optional checkpoint hook for
//! resumability. Writes the full `AgentState` as JSON, one file
//! per phase, named by phase so a later run can be eyeballed or replayed
//! by hand. Never consulted by routing — purely a debugging/resume aid.

use crate::state::AgentState;
use std::path::Path;

/// Serialize `state` to `<dir>/<phase>.json`. Failures are logged and
/// swallowed: a checkpoint write must never fail the workflow.
pub fn save(dir: &Path, state: &AgentState) {
    if let Err(e) = std::fs::create_dir_all(dir) {
        tracing::warn!("could not create checkpoint dir {}: {e}", dir.display());
        return;
    }

    let path = dir.join(format!("{}.json", state.current_phase));
    match serde_json::to_vec_pretty(state) {
        Ok(bytes) => {
            if let Err(e) = std::fs::write(&path, bytes) {
                tracing::warn!("could not write checkpoint {}: {e}", path.display());
            }
        }
        Err(e) => tracing::warn!("could not serialize checkpoint for {}: {e}", path.display()),
    }
}

/// Load a previously saved checkpoint for a given phase name, e.g. for
/// manual inspection or an out-of-process resume. Implementation-defined
/// per §6.5; format is just the `save` output.
pub fn load(dir: &Path, phase: &str) -> Option<AgentState> {
    let path = dir.join(format!("{phase}.json"));
    let bytes = std::fs::read(path).ok()?;
    serde_json::from_slice(&bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{GuardrailMode, Mode};
    use tempfile::tempdir;

    #[test]
    fn round_trips_through_a_checkpoint_file() {
        let dir = tempdir().unwrap();
        let state = AgentState::new(
            dir.path().to_path_buf(),
            "add a widget".to_string(),
            Mode::DryRun,
            GuardrailMode::Strict,
            true,
            false,
            10,
        );

        save(dir.path(), &state);
        let loaded = load(dir.path(), "start").expect("checkpoint should exist");
        assert_eq!(loaded.feature_request, "add a widget");
    }

    #[test]
    fn missing_checkpoint_returns_none() {
        let dir = tempdir().unwrap();
        assert!(load(dir.path(), "nonexistent").is_none());
    }
}

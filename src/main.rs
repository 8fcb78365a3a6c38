//! Feature-implementation agent — CLI entry point (§6.1).

use clap::Parser;
use feature_agent::config::{Cli, Config};
use feature_agent::error::AgentError;
use feature_agent::execution::sandbox::LocalSandbox;
use feature_agent::llm::anthropic::AnthropicRuntime;
use feature_agent::state::AgentState;
use feature_agent::workflow;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,feature_agent=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = match Config::from_cli(cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {e}");
            std::process::exit(e.exit_code());
        }
    };

    let runtime = AnthropicRuntime::new(config.llm_api_key.clone());
    let sandbox_runtime = config.sandbox_enabled.then_some(LocalSandbox);

    match workflow::run(&config, &runtime, sandbox_runtime.as_ref().map(|s| s as _)).await {
        Ok(state) => {
            print_success(&state);
            std::process::exit(0);
        }
        Err(e) => {
            print_failure(&e);
            std::process::exit(e.exit_code());
        }
    }
}

/// §7 user-visible behavior: on success, a per-phase status line plus (in
/// implement mode) the list of created/modified files and a final status
/// line.
fn print_success(state: &AgentState) {
    println!("phase: {}", state.current_phase);
    if let Some(framework) = &state.framework {
        println!("framework: {framework}");
    }
    if let Some(spec) = &state.feature_spec {
        println!("feature: {}", spec.feature_name);
        println!(
            "entities: {} extended, {} created",
            spec.entities_to_extend.len(),
            spec.entities_to_create.len()
        );
    }
    println!("patches: {}", state.patches.len());

    if let Some(results) = &state.execution_results {
        match state.mode {
            feature_agent::state::Mode::DryRun => {
                println!("(dry run — no files were written)");
            }
            feature_agent::state::Mode::Implement => {
                for file in &results.patches_applied {
                    println!("  wrote {}", file.display());
                }
            }
        }
        if let Some(sandbox) = &results.sandbox {
            println!(
                "sandbox: build_success={} run_success={} iterations={}",
                sandbox.build_success, sandbox.run_success, sandbox.iterations
            );
        }
        println!("status: {}", results.verification_status);
    }

    let warnings: Vec<_> = state.errors.iter().filter(|e| !e.is_fatal()).collect();
    if !warnings.is_empty() {
        println!("{} warning(s) recorded during the run:", warnings.len());
        for warning in warnings {
            println!("  [{}] {}", warning.phase, warning.message);
        }
    }
}

/// §7: on any non-zero exit, print a summary of errors by phase with the
/// first error's message verbatim.
fn print_failure(error: &AgentError) {
    eprintln!("workflow failed: {error}");
}

//! `workflow-runner` CLI entry-point.
//!
//! Available sub-commands:
//! - `validate`: check a workflow JSON file without running it.
//! - `run`: execute a workflow from its first step.
//! - `resume`: continue a suspended run from a saved outcome.
//!
//! Every run prints the outcome JSON on stdout; logs go to stderr.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use engine::{
    Collaborators, ExecutorConfig, ResumePoint, RunOutcome, WorkflowDefinition, WorkflowExecutor,
};
use gateways::{
    EchoToolCaller, FileStateStore, MemoryStateStore, SchemaProvider, StateStore,
    StaticSchemaProvider,
};
use serde_json::Value;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "workflow-runner",
    about = "Run typed, resumable workflow definitions",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate a workflow definition JSON file.
    Validate {
        /// Path to the workflow JSON file.
        path: PathBuf,
    },
    /// Execute a workflow from its first step.
    Run {
        /// Path to the workflow JSON file.
        path: PathBuf,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Continue a suspended run.
    Resume {
        /// Path to the workflow JSON file.
        path: PathBuf,
        /// Outcome JSON printed by a suspended run, or a bare resume point.
        #[arg(long)]
        snapshot: PathBuf,
        #[command(flatten)]
        run: RunArgs,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Input JSON object, or `@path` to read it from a file.
    #[arg(long, default_value = "{}")]
    inputs: String,
    /// JSON file backing `load_state` / `save_state`; in-memory when unset.
    #[arg(long, env = "WORKFLOW_STATE_FILE")]
    state_file: Option<PathBuf>,
    /// JSON file mapping template ids to property lists.
    #[arg(long, env = "WORKFLOW_SCHEMA_FILE")]
    schema_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Validate { path } => {
            let workflow = read_workflow(&path)?;
            match engine::validate_references(&workflow) {
                Ok(order) => {
                    println!("Workflow '{}' is valid. Steps: {order:?}", workflow.name);
                }
                Err(e) => {
                    eprintln!("Validation failed: {e}");
                    std::process::exit(1);
                }
            }
        }
        Command::Run { path, run } => {
            let workflow = read_workflow(&path)?;
            let inputs = read_inputs(&run.inputs)?;
            let executor = build_executor(&run)?;
            let outcome = executor.start(&workflow, inputs).await;
            report(&outcome)?;
        }
        Command::Resume { path, snapshot, run } => {
            let workflow = read_workflow(&path)?;
            let inputs = read_inputs(&run.inputs)?;
            let point = read_snapshot(&snapshot)?;
            info!("resuming '{}' at step {}", workflow.name, point.start_step);
            let executor = build_executor(&run)?;
            let outcome = executor.resume(&workflow, inputs, point).await;
            report(&outcome)?;
        }
    }

    Ok(())
}

fn read_workflow(path: &Path) -> Result<WorkflowDefinition> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read workflow file {}", path.display()))?;
    WorkflowDefinition::from_json(&raw)
        .with_context(|| format!("invalid workflow definition in {}", path.display()))
}

fn read_inputs(arg: &str) -> Result<Value> {
    let raw = match arg.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("cannot read inputs file {path}"))?,
        None => arg.to_string(),
    };
    serde_json::from_str(&raw).context("inputs are not valid JSON")
}

/// Accepts a full outcome document (`{"status": "suspended", "resume": ...}`)
/// or the resume point on its own.
fn read_snapshot(path: &Path) -> Result<ResumePoint> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read snapshot {}", path.display()))?;
    let mut doc: Value = serde_json::from_str(&raw).context("snapshot is not valid JSON")?;

    if let Some(status) = doc.get("status").and_then(Value::as_str) {
        if status != "suspended" {
            bail!("snapshot has status '{status}', only suspended runs can be resumed");
        }
    }
    let point = match doc.get_mut("resume") {
        Some(resume) => resume.take(),
        None => doc,
    };
    serde_json::from_value(point).context("snapshot does not contain a resume point")
}

fn build_executor(args: &RunArgs) -> Result<WorkflowExecutor> {
    let state: Arc<dyn StateStore> = match &args.state_file {
        Some(path) => Arc::new(FileStateStore::new(path.clone())),
        None => Arc::new(MemoryStateStore::new()),
    };

    let schemas: Arc<dyn SchemaProvider> = match &args.schema_file {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("cannot read schema file {}", path.display()))?;
            Arc::new(StaticSchemaProvider::from_json(&raw).context("invalid schema file")?)
        }
        None => {
            warn!("no schema file given, object steps will not find any template");
            Arc::new(StaticSchemaProvider::new())
        }
    };

    // No sampling backend here: agent and load_object steps pause with
    // `samplingResult: null`.
    let gateways = Collaborators {
        tools: Arc::new(EchoToolCaller),
        schemas,
        state,
        sampler: None,
    };
    Ok(WorkflowExecutor::new(gateways, ExecutorConfig::default()))
}

fn report(outcome: &RunOutcome) -> Result<()> {
    let doc = serde_json::to_string_pretty(&outcome.to_json())?;
    println!("{doc}");
    if let Some(error) = outcome.error() {
        eprintln!("Run failed: {error}");
        std::process::exit(1);
    }
    Ok(())
}

// ============================================================
// Unit tests
// ============================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_accepts_inputs_and_file_flags() {
        let cli = Cli::try_parse_from([
            "workflow-runner", "run", "wf.json",
            "--inputs", "{\"n\": 1}",
            "--state-file", "state.json",
        ])
        .unwrap();
        let Command::Run { path, run } = cli.command else {
            panic!("expected run");
        };
        assert_eq!(path, PathBuf::from("wf.json"));
        assert_eq!(read_inputs(&run.inputs).unwrap(), serde_json::json!({ "n": 1 }));
        assert_eq!(run.state_file, Some(PathBuf::from("state.json")));
    }

    #[test]
    fn sampling_flags_are_not_offered() {
        for flag in ["--no-sampling", "--sampling-max-tokens"] {
            let args = ["workflow-runner", "run", "wf.json", flag, "10"];
            assert!(Cli::try_parse_from(args).is_err(), "{flag} should be rejected");
        }
    }

    #[test]
    fn executor_uses_default_config() {
        let run = RunArgs { inputs: "{}".into(), state_file: None, schema_file: None };
        let executor = build_executor(&run).unwrap();
        assert_eq!(executor.config().sampling_max_tokens, 1000);
        assert_eq!(executor.config().create_object_tool, "create_object");
    }
}

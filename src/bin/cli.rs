use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use decision_flow::engine::result::LogStatus;
use decision_flow::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "decision-flow")]
#[command(about = "Run decision workflows against application data", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to engine.yaml (default: engine.yaml next to the workflow, if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a workflow against one application
    Run {
        /// Path to the workflow file
        #[arg(value_name = "WORKFLOW")]
        workflow: PathBuf,

        /// Application data (JSON or YAML)
        #[arg(short, long)]
        input: PathBuf,

        /// Canned data source responses (JSON or YAML)
        #[arg(short = 'x', long)]
        fixtures: Option<PathBuf>,

        /// Print the full execution result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Execute a workflow against every application in a directory
    Batch {
        /// Path to the workflow file
        #[arg(value_name = "WORKFLOW")]
        workflow: PathBuf,

        /// Directory of application files (*.json)
        #[arg(short, long)]
        inputs: PathBuf,

        /// Canned data source responses (JSON or YAML)
        #[arg(short = 'x', long)]
        fixtures: Option<PathBuf>,

        /// Maximum number of parallel evaluations (overrides config)
        #[arg(short, long)]
        parallel: Option<usize>,

        /// Stop after the first application that is not fully decisioned
        #[arg(short, long)]
        fail_fast: bool,

        /// Print per-application results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate a workflow file or directory of workflows
    Validate {
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },

    /// List workflows in a directory
    List {
        #[arg(value_name = "DIR")]
        dir: PathBuf,
    },
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        "decision_flow=debug"
    } else {
        "decision_flow=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            tracing::error!(error = %e, "decision-flow failed");
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<bool> {
    let config = cli.config;

    match cli.command {
        Commands::Run {
            workflow,
            input,
            fixtures,
            json,
        } => run_single(workflow, input, fixtures, config, json).await,
        Commands::Batch {
            workflow,
            inputs,
            fixtures,
            parallel,
            fail_fast,
            json,
        } => {
            run_batch(
                workflow, inputs, fixtures, config, parallel, fail_fast, json,
            )
            .await
        }
        Commands::Validate { path } => validate(path),
        Commands::List { dir } => list_workflows(dir),
    }
}

/// Explicit config path, else `engine.yaml` next to the workflow, else defaults
fn load_config(explicit: Option<PathBuf>, workflow: &Path) -> anyhow::Result<EngineConfig> {
    if let Some(path) = explicit {
        return Ok(EngineConfig::load(&path)?);
    }
    let sibling = workflow
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join("engine.yaml");
    if sibling.exists() {
        Ok(EngineConfig::load(&sibling)?)
    } else {
        Ok(EngineConfig::default())
    }
}

fn build_engine(config: EngineConfig, fixtures: Option<PathBuf>) -> anyhow::Result<WorkflowEngine> {
    let engine = WorkflowEngine::new().with_config(config);
    Ok(match fixtures {
        Some(path) => engine.with_data_fetcher(FixtureDataFetcher::from_file(&path)?),
        None => engine,
    })
}

async fn run_single(
    workflow: PathBuf,
    input: PathBuf,
    fixtures: Option<PathBuf>,
    config: Option<PathBuf>,
    json: bool,
) -> anyhow::Result<bool> {
    if !workflow.exists() {
        anyhow::bail!("Workflow file not found: {}", workflow.display());
    }

    let definition = WorkflowLoader::load_file(&workflow)?;
    let application = WorkflowLoader::load_record(&input)?;
    let engine = build_engine(load_config(config, &workflow)?, fixtures)?;

    let result = engine.test(&definition, application).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_execution_result(&result);
    }
    Ok(result.is_fully_decisioned())
}

#[tracing::instrument(skip_all, fields(workflow = %workflow.display()))]
async fn run_batch(
    workflow: PathBuf,
    inputs: PathBuf,
    fixtures: Option<PathBuf>,
    config: Option<PathBuf>,
    parallel: Option<usize>,
    fail_fast: bool,
    json: bool,
) -> anyhow::Result<bool> {
    if !inputs.is_dir() {
        anyhow::bail!("Inputs directory not found: {}", inputs.display());
    }

    let definition = Arc::new(WorkflowLoader::load_file(&workflow)?);
    let records = WorkflowLoader::load_records(&inputs)?;
    if records.is_empty() {
        println!("No applications found in: {}", inputs.display());
        return Ok(true);
    }

    let config = load_config(config, &workflow)?;
    let parallel = parallel.unwrap_or(config.parallel);
    let fail_fast = fail_fast || config.fail_fast;
    let engine = Arc::new(build_engine(config, fixtures)?);

    let batch = BatchEvaluator::new(engine)
        .parallel(parallel)
        .fail_fast(fail_fast)
        .run(definition, records)
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&batch.executions)?);
    }

    let mut ids: Vec<_> = batch.executions.keys().collect();
    ids.sort();
    println!("\n=== Batch Result ===\n");
    for id in ids {
        let result = &batch.executions[id];
        let mark = if result.is_fully_decisioned() { "✓" } else { "✗" };
        println!("{} {} ({:?}, {} error(s))", mark, id, result.status, result.errors.len());
    }
    for (id, reason) in &batch.rejected {
        println!("✗ {} rejected: {}", id, reason);
    }
    for id in &batch.skipped {
        println!("- {} skipped", id);
    }
    println!(
        "\n{} of {} application(s) fully decisioned",
        batch.decisioned(),
        batch.executions.len() + batch.rejected.len() + batch.skipped.len()
    );

    Ok(batch.success)
}

fn list_workflows(dir: PathBuf) -> anyhow::Result<bool> {
    if !dir.exists() {
        anyhow::bail!("Directory not found: {}", dir.display());
    }

    let workflows = WorkflowLoader::load_directory(&dir)?;

    if workflows.is_empty() {
        println!("No workflows found in: {}", dir.display());
        return Ok(true);
    }

    println!("Workflows in {}:\n", dir.display());
    for w in &workflows {
        println!(
            "  {} v{} [{:?}] - {} node(s), {} connection(s)",
            w.id,
            w.version,
            w.status,
            w.nodes.len(),
            w.connections.len()
        );
    }

    Ok(true)
}

fn validate(path: PathBuf) -> anyhow::Result<bool> {
    if !path.exists() {
        anyhow::bail!("Path not found: {}", path.display());
    }

    if path.is_dir() {
        let workflows = WorkflowLoader::load_directory(&path)?;
        if workflows.is_empty() {
            println!("No workflows found in: {}", path.display());
            return Ok(true);
        }
        println!("✓ {} workflows validated", workflows.len());
    } else {
        let workflow = WorkflowLoader::load_file(&path)?;
        println!("✓ {} ({}) is valid", path.display(), workflow.id);
    }

    Ok(true)
}

fn print_execution_result(result: &ExecutionResult) {
    println!("\n=== Execution Result ===\n");
    println!("Status: {:?}", result.status);
    println!("Execution ID: {}", result.execution_id);
    println!("Duration: {:.1}ms\n", result.metrics.total_duration_ms);

    for entry in &result.execution_log {
        let mark = match entry.status {
            LogStatus::Started => continue,
            LogStatus::Completed => "✓",
            LogStatus::Error => "✗",
        };
        println!("{} {} [{}] {}", mark, entry.node_id, entry.node_kind, entry.label);
        if let Some(err) = &entry.error {
            println!("      Error: {}", err);
        }
    }

    if !result.output.is_empty() {
        println!("\nOutput:");
        for (key, value) in &result.output {
            println!("  {} = {}", key, value);
        }
    }

    for (i, outcome) in result.results.iter().enumerate() {
        println!("\nBranch {} (from {}):", i + 1, outcome.node_id());
        for leaf in outcome.completed() {
            println!("  {} -> {}", leaf.kind(), leaf.payload());
        }
    }
}

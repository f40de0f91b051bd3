mod collaborator;
mod dataset;
mod registry;
mod settings;

use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Args, Parser, Subcommand};
use clinplan_agent::{Pipeline, PipelineError, PipelineOutcome};
use clinplan_core::{DatasetSchema, Error as CoreError, infer_schema};
use clinplan_plan::{
    ConditionError, IssueSeverity, ValidationIssue, ValidationReport, check_plan, parse_condition,
    plan_json_schema, validate_plan_against_schema,
};
use collaborator::{CollaboratorError, build_client, describe};
use dataset::{DatasetError, dataset_name, load_table};
use registry::{
    RunContext, TranscriptClient, init_run_logging, init_stderr_logging, start_run, write_plan,
    write_validation,
};
use serde::Serialize;
use settings::{SettingsError, load_or_create_settings};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
enum CliError {
    #[error("registry error: {0}")]
    Registry(#[from] registry::RegistryError),
    #[error("settings error: {0}")]
    Settings(#[from] SettingsError),
    #[error("dataset error: {0}")]
    Dataset(#[from] DatasetError),
    #[error("core error: {0}")]
    Core(#[from] CoreError),
    #[error("collaborator error: {0}")]
    Collaborator(#[from] CollaboratorError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error(transparent)]
    Condition(#[from] ConditionError),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("condition not recognised: {0}")]
    Unparsed(String),
    #[error("plan rejected with {0} error(s)")]
    Rejected(usize),
}

#[derive(Parser, Debug)]
#[command(name = "clinplan", version, about = "Clinical analysis planner")]
struct Cli {
    /// Settings file; created with defaults when missing.
    #[arg(long, global = true, default_value = "clinplan.toml")]
    config: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Infer and print the dataset schema.
    Schema(TableArgs),
    /// Parse one condition against a dataset.
    Condition(ConditionArgs),
    /// Verify and validate a plan file.
    Check(CheckArgs),
    /// Plan a research question end to end.
    Ask(AskArgs),
    /// Print the plan JSON Schema.
    PlanSchema,
}

#[derive(Args, Debug)]
struct TableArgs {
    /// TSV or CSV file with a header row.
    #[arg(value_name = "TABLE")]
    table: PathBuf,
}

#[derive(Args, Debug)]
struct ConditionArgs {
    #[arg(value_name = "TABLE")]
    table: PathBuf,
    /// Condition text, e.g. "TUMOR_STAGE is in {Stage III, Stage IV}".
    #[arg(value_name = "TEXT")]
    text: String,
}

#[derive(Args, Debug)]
struct CheckArgs {
    #[arg(value_name = "TABLE")]
    table: PathBuf,
    /// Candidate plan JSON.
    #[arg(value_name = "PLAN_JSON")]
    plan: PathBuf,
}

#[derive(Args, Debug)]
struct AskArgs {
    #[arg(value_name = "TABLE")]
    table: PathBuf,
    /// Research question in free text.
    #[arg(value_name = "QUERY")]
    query: String,
    /// Canned collaborator responses, one JSON string per line.
    #[arg(long, value_name = "FILE")]
    replay: Option<PathBuf>,
    /// Output directory for runs (overrides the settings file).
    #[arg(long)]
    run_dir: Option<PathBuf>,
}

#[derive(Serialize)]
struct ConditionOutput<'a> {
    text: &'a str,
    display: String,
    condition: &'a clinplan_plan::ConditionExpression,
}

fn main() -> Result<(), CliError> {
    let cli = Cli::parse();

    match cli.command {
        Command::Schema(args) => run_schema(args),
        Command::Condition(args) => run_condition(args),
        Command::Check(args) => run_check(args),
        Command::Ask(args) => run_ask(args, &cli.config),
        Command::PlanSchema => print_json(&plan_json_schema()),
    }
}

fn load_schema(path: &Path) -> Result<DatasetSchema, CliError> {
    let table = load_table(path)?;
    Ok(infer_schema(dataset_name(path), &table)?)
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run_schema(args: TableArgs) -> Result<(), CliError> {
    init_stderr_logging()?;
    let schema = load_schema(&args.table)?;
    print_json(&schema)
}

fn run_condition(args: ConditionArgs) -> Result<(), CliError> {
    init_stderr_logging()?;
    let schema = load_schema(&args.table)?;
    let condition = parse_condition(&args.text, Some(&schema))?
        .ok_or_else(|| CliError::Unparsed(args.text.clone()))?;
    print_json(&ConditionOutput {
        text: &args.text,
        display: condition.to_string(),
        condition: &condition,
    })
}

fn run_check(args: CheckArgs) -> Result<(), CliError> {
    init_stderr_logging()?;
    let schema = load_schema(&args.table)?;
    let content = std::fs::read_to_string(&args.plan)?;
    let candidate: serde_json::Value = serde_json::from_str(&content)?;

    match check_plan(&candidate, &schema) {
        Ok(checked) => {
            let report = ValidationReport {
                errors: Vec::new(),
                warnings: checked.warnings,
            };
            print_json(&report)?;
            print_json(&checked.plan)
        }
        Err(report) => {
            print_json(&report)?;
            Err(CliError::Rejected(report.errors.len()))
        }
    }
}

fn run_ask(args: AskArgs, config_path: &Path) -> Result<(), CliError> {
    let settings = load_or_create_settings(config_path)?;
    let schema = load_schema(&args.table)?;

    let run_id = Uuid::new_v4().to_string();
    let run_ctx = RunContext {
        run_id: run_id.clone(),
        started_at: chrono::Utc::now(),
        run_dir: args.run_dir.clone().unwrap_or_else(|| settings.runs.dir.clone()),
        dataset: args.table.display().to_string(),
        query: args.query.clone(),
        collaborator: describe(&settings.llm, args.replay.as_deref()),
        planner: settings.planner_config(),
    };

    let run_paths = start_run(&run_ctx)?;
    init_run_logging(&run_paths.logs_path)?;

    tracing::info!(event = "run_started", run_id = %run_id, dataset = %run_ctx.dataset);
    tracing::info!(
        event = "schema_inferred",
        columns = schema.variables.len(),
        dataset = %schema.name
    );

    let timer = Instant::now();

    let client = build_client(&settings.llm, args.replay.as_deref())?;
    let client = TranscriptClient::create(client, &run_paths.transcript_path)?;
    let pipeline = Pipeline::new(client, run_ctx.planner.clone());

    let outcome = pipeline.run(&args.query, &schema);
    let duration_ms = timer.elapsed().as_millis();
    eprintln!("run directory: {}", run_paths.root.display());

    match outcome {
        Ok(PipelineOutcome::NeedsClarification(question)) => {
            tracing::info!(
                event = "run_finished",
                status = "needs_clarification",
                duration_ms = duration_ms
            );
            println!("{question}");
            Ok(())
        }
        Ok(PipelineOutcome::Accepted(accepted)) => {
            let report = validate_plan_against_schema(accepted.plan(), &schema);
            write_validation(&run_paths, &report)?;
            write_plan(&run_paths, &accepted)?;
            tracing::info!(event = "plan_written", path = %run_paths.plan_path.display());
            tracing::info!(event = "run_finished", status = "accepted", duration_ms = duration_ms);
            print_json(&accepted)
        }
        Err(err) => {
            let mut report = ValidationReport::default();
            report.push_error(failure_issue(&err));
            write_validation(&run_paths, &report)?;
            tracing::info!(event = "run_finished", status = "rejected", duration_ms = duration_ms);
            Err(CliError::Pipeline(err))
        }
    }
}

fn failure_issue(err: &PipelineError) -> ValidationIssue {
    match err {
        PipelineError::Rejected(validation) => validation.to_issue(),
        PipelineError::MalformedPlan { .. } => ValidationIssue::new(
            IssueSeverity::Error,
            "malformed_plan",
            "/",
            err.to_string(),
            None,
        ),
        PipelineError::Ambiguous { field, .. } => ValidationIssue::new(
            IssueSeverity::Error,
            "ambiguous_condition",
            format!("/{field}"),
            err.to_string(),
            None,
        ),
    }
}

use std::fs::{OpenOptions, create_dir_all};
use std::path::PathBuf;
use std::process::Command;

use chrono::{DateTime, Utc};
use clinplan_agent::PlannerConfig;
use clinplan_plan::{AcceptedPlan, ValidationReport};
use serde::Serialize;

use super::{RegistryResult, write_json};

/// Metadata captured at run start.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub run_dir: PathBuf,
    pub dataset: String,
    pub query: String,
    /// `openai`, `replay:<file>` or similar; never a credential.
    pub collaborator: String,
    pub planner: PlannerConfig,
}

/// JSON config written to each run directory.
#[derive(Debug, Serialize)]
pub struct RunConfig {
    pub run_id: String,
    pub started_at: String,
    pub dataset: String,
    pub query: String,
    pub collaborator: String,
    pub planner: PlannerConfig,
    pub git: GitInfo,
}

/// Git metadata for reproducibility.
#[derive(Debug, Serialize)]
pub struct GitInfo {
    pub commit: Option<String>,
    pub dirty: Option<bool>,
}

/// Paths for run artifacts.
#[derive(Debug, Clone)]
pub struct RunPaths {
    pub root: PathBuf,
    pub logs_path: PathBuf,
    pub transcript_path: PathBuf,
    pub plan_path: PathBuf,
    pub validation_path: PathBuf,
}

pub fn start_run(ctx: &RunContext) -> RegistryResult<RunPaths> {
    let timestamp = ctx.started_at.format("%Y-%m-%dT%H-%M-%SZ").to_string();
    let root = ctx.run_dir.join(format!("{timestamp}__run_{}", ctx.run_id));

    create_dir_all(&root)?;

    let config = RunConfig {
        run_id: ctx.run_id.clone(),
        started_at: ctx.started_at.to_rfc3339(),
        dataset: ctx.dataset.clone(),
        query: ctx.query.clone(),
        collaborator: ctx.collaborator.clone(),
        planner: ctx.planner.clone(),
        git: collect_git_info(),
    };
    write_json(&root.join("config.json"), &config)?;

    let logs_path = root.join("logs.ndjson");
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&logs_path)?;

    Ok(RunPaths {
        logs_path,
        transcript_path: root.join("llm_transcript.jsonl"),
        plan_path: root.join("plan.json"),
        validation_path: root.join("validation.json"),
        root,
    })
}

pub fn write_plan(paths: &RunPaths, plan: &AcceptedPlan) -> RegistryResult<()> {
    write_json(&paths.plan_path, plan)
}

pub fn write_validation(paths: &RunPaths, report: &ValidationReport) -> RegistryResult<()> {
    write_json(&paths.validation_path, report)
}

fn collect_git_info() -> GitInfo {
    let commit = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .map(|output| String::from_utf8_lossy(&output.stdout).trim().to_string())
        .filter(|value| !value.is_empty());

    let dirty = Command::new("git")
        .args(["status", "--porcelain"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .map(|output| !output.stdout.is_empty());

    GitInfo { commit, dirty }
}

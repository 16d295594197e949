// ABOUTME: Command implementations for the stagehand CLI
// ABOUTME: Handles execution of run, validate, and init commands

use anyhow::{anyhow, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::config::Config;
use crate::engine::{FailurePolicy, RunReport};
use crate::output::{self, Destination, OutputConfig, OutputFormat, ProgressReporter};
use crate::plan::{Plan, PlanAssembler, PlanParser, PlanValidator};

/// Options for a single `run` invocation.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub variables: BTreeMap<String, String>,
    pub policy: Option<FailurePolicy>,
    pub dry_run: bool,
    pub output: Option<String>,
    pub format: Option<OutputFormat>,
}

/// Execute a plan. Returns the run report, or `None` for a dry run.
pub async fn run_plan(
    plan_path: &Path,
    options: RunOptions,
    config: &Config,
) -> Result<Option<RunReport>> {
    info!("Starting plan execution: {}", plan_path.display());

    let mut plan = load_plan(plan_path, config).await?;
    info!("Loaded plan: {}", plan.name);

    let assembled = assembler(config, &options.variables, options.policy)
        .assemble(&plan)
        .map_err(|e| anyhow!("Failed to prepare plan '{}': {}", plan.name, e))?;

    if options.dry_run {
        let snapshot = assembled.runner.initial_snapshot();
        println!(
            "Dry run: plan '{}' has {} steps in {} groups ({})",
            plan.name,
            snapshot.tasks.len(),
            snapshot.groups.len(),
            assembled.runner.policy()
        );
        for task in &snapshot.tasks {
            println!("  [{}] {} ({})", task.group, task.title, task.key);
        }
        return Ok(None);
    }

    plan.output = assembled.output.clone();
    let output = resolve_output(&plan, &options, config, assembled.runner.run_id())?;

    let handle = assembled.runner.spawn(assembled.context);
    ProgressReporter::stdout()
        .follow(handle.progress())
        .await
        .map_err(|e| anyhow!("Failed to render progress: {}", e))?;
    let outcome = handle
        .wait()
        .await
        .map_err(|e| anyhow!("Plan execution failed: {}", e))?;

    output::write_report(&outcome.report, &output)
        .await
        .map_err(|e| anyhow!("Failed to write report: {}", e))?;

    info!(
        "Plan '{}' finished with status {:?}",
        plan.name, outcome.report.status
    );
    Ok(Some(outcome.report))
}

/// Validate a plan file
pub async fn validate_plan(
    plan_path: &Path,
    variables: BTreeMap<String, String>,
    config: &Config,
) -> Result<()> {
    info!("Validating plan: {}", plan_path.display());

    let plan = load_plan(plan_path, config)
        .await
        .map_err(|e| anyhow!("Plan validation failed: {}", e))?;

    let assembler = assembler(config, &variables, None);
    let report = PlanValidator::with_registry(assembler.registry().clone()).validate(&plan);

    for warning in &report.warnings {
        println!("⚠ {}", warning);
    }

    if !report.is_valid {
        for error in &report.errors {
            println!("✗ {}", error);
        }
        return Err(anyhow!(
            "Plan '{}' has {} validation error(s)",
            plan.name,
            report.errors.len()
        ));
    }

    // Variables only render once the plan is assembled
    assembler
        .assemble(&plan)
        .map_err(|e| anyhow!("Plan validation failed: {}", e))?;

    println!("✓ Plan '{}' is valid", plan.name);
    println!("  Groups: {}", plan.groups.len());
    println!("  Steps: {}", plan.tasks.len());
    println!("  Variables: {}", plan.variables.len());
    println!("  Policy: {}", plan.policy());

    info!("Plan validation completed successfully");
    Ok(())
}

/// Initialize a new plan file
pub async fn init_plan(name: &str, output_dir: &Path, template: &str) -> Result<PathBuf> {
    info!("Initializing plan '{}' in {}", name, output_dir.display());

    let content = generate_plan_template(name, template)?;

    tokio::fs::create_dir_all(output_dir).await?;
    let plan_file = output_dir.join(format!("{}.yaml", name));
    if plan_file.exists() {
        return Err(anyhow!("Plan file already exists: {}", plan_file.display()));
    }

    tokio::fs::write(&plan_file, content).await?;
    println!("✓ Created plan file: {}", plan_file.display());

    info!("Created plan file: {}", plan_file.display());
    Ok(plan_file)
}

async fn load_plan(plan_path: &Path, config: &Config) -> Result<Plan> {
    let mut plan = PlanParser::new()
        .parse_file(plan_path)
        .await
        .map_err(|e| anyhow!("Failed to parse plan {}: {}", plan_path.display(), e))?;

    for (key, value) in &config.template_vars {
        plan.variables
            .entry(key.clone())
            .or_insert_with(|| value.clone());
    }
    Ok(plan)
}

fn assembler(
    config: &Config,
    variables: &BTreeMap<String, String>,
    policy: Option<FailurePolicy>,
) -> PlanAssembler {
    PlanAssembler::new()
        .with_shell(config.shell.clone())
        .with_command_timeout(config.command_timeout)
        .with_variables(variables.clone())
        .with_policy(policy)
}

/// `-o` and `--format` beat the plan; a plan writing to stdout is redirected
/// into `default_output_dir` when one is configured.
fn resolve_output(
    plan: &Plan,
    options: &RunOptions,
    config: &Config,
    run_id: &str,
) -> Result<OutputConfig> {
    let mut output = plan.output.clone();
    if let Some(format) = options.format {
        output.format = format;
    }

    if let Some(ref destination) = options.output {
        output.destination = destination.clone();
    } else if let (Destination::Stdout, Some(dir)) =
        (output.destination()?, config.default_output_dir.as_ref())
    {
        let file = dir.join(format!(
            "{}-{}.{}",
            plan.name,
            run_id,
            output.format.file_extension()
        ));
        output.destination = format!("file://{}", file.display());
    }

    if let Err(e) = output.destination() {
        warn!("Invalid report destination '{}'", output.destination);
        return Err(anyhow!("Invalid report destination: {}", e));
    }
    Ok(output)
}

fn generate_plan_template(name: &str, template_type: &str) -> Result<String> {
    match template_type {
        "provision" => Ok(generate_provision_template(name)),
        "teardown" => Ok(generate_teardown_template(name)),
        _ => Err(anyhow!("Unknown template type: {}", template_type)),
    }
}

fn generate_provision_template(name: &str) -> String {
    format!(
        r#"name: {name}
description: Provision resources, skipping anything that already exists

variables:
  environment: dev
  workdir: "/tmp/{name}-{{{{variables.environment}}}}"

groups:
  - {{ key: discover, title: Discover existing resources }}
  - {{ key: create, title: Create resources }}

tasks:
  - key: check-workdir
    title: Check working directory
    group: discover
    type: probe
    config:
      resource: workdir
      command: test
      args: ["-d", "{{{{variables.workdir}}}}"]

  - key: create-workdir
    title: Create working directory
    group: create
    type: command
    skip_if: {{ exists: workdir }}
    creates: [workdir]
    timeout: 30s
    config:
      command: mkdir
      args: ["-p", "{{{{variables.workdir}}}}"]

output:
  format: json
  destination: "file://./output/{{{{plan.name}}}}-{{{{run.run_id}}}}.json"
"#
    )
}

fn generate_teardown_template(name: &str) -> String {
    format!(
        r#"name: {name}
description: Remove resources, continuing past individual failures
exit_on_error: false

variables:
  environment: dev
  workdir: "/tmp/{name}-{{{{variables.environment}}}}"

groups:
  - {{ key: discover, title: Discover existing resources }}
  - {{ key: remove, title: Remove resources }}

tasks:
  - key: check-workdir
    title: Check working directory
    group: discover
    type: probe
    config:
      resource: workdir
      command: test
      args: ["-d", "{{{{variables.workdir}}}}"]

  - key: remove-workdir
    title: Remove working directory
    group: remove
    type: command
    skip_if: {{ missing: workdir }}
    deletes: [workdir]
    config:
      command: rm
      args: ["-rf", "{{{{variables.workdir}}}}"]

output:
  format: text
  destination: stdout
"#
    )
}

// ABOUTME: Command line argument definitions and parsing using Clap
// ABOUTME: Defines the main CLI structure and subcommands for stagehand

use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::engine::FailurePolicy;
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "stagehand")]
#[command(about = "Runs provisioning and teardown plans one step at a time")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(short, long, global = true, help = "Path to configuration file")]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, help = "Disable colored output")]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Execute a plan from a YAML file
    Run {
        #[arg(help = "Path to plan YAML file")]
        plan: PathBuf,

        #[arg(
            short = 'V',
            long = "var",
            help = "Override plan variables (key=value)"
        )]
        vars: Vec<String>,

        #[arg(
            long,
            conflicts_with = "exit_on_error",
            help = "Keep going after a failed step"
        )]
        continue_on_error: bool,

        #[arg(long, help = "Stop at the first failed step")]
        exit_on_error: bool,

        #[arg(long, help = "Assemble the plan and list its steps without executing")]
        dry_run: bool,

        #[arg(short, long, help = "Report destination (stdout or file://path)")]
        output: Option<String>,

        #[arg(long, help = "Report format (json, pretty, yaml, text)")]
        format: Option<OutputFormat>,
    },

    /// Validate a plan file without executing
    Validate {
        #[arg(help = "Path to plan YAML file")]
        plan: PathBuf,

        #[arg(short = 'V', long = "var", help = "Plan variables for validation (key=value)")]
        vars: Vec<String>,
    },

    /// Initialize a new plan file from a template
    Init {
        #[arg(help = "Name of the plan to create")]
        name: String,

        #[arg(short, long, help = "Output directory", default_value = ".")]
        output_dir: PathBuf,

        #[arg(long, help = "Plan template (provision, teardown)", default_value = "provision")]
        template: String,
    },
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Parse variables from key=value format
    pub fn parse_variables(vars: &[String]) -> anyhow::Result<BTreeMap<String, String>> {
        let mut variables = BTreeMap::new();

        for var in vars {
            match var.split_once('=') {
                Some((key, value)) if !key.trim().is_empty() => {
                    variables.insert(key.trim().to_string(), value.to_string());
                }
                _ => {
                    return Err(anyhow::anyhow!(
                        "Invalid variable format '{}'. Expected 'key=value'",
                        var
                    ));
                }
            }
        }

        Ok(variables)
    }

    /// `None` when neither flag is given, so the plan's own setting applies.
    pub fn policy_override(continue_on_error: bool, exit_on_error: bool) -> Option<FailurePolicy> {
        if continue_on_error {
            Some(FailurePolicy::ContinueOnError)
        } else if exit_on_error {
            Some(FailurePolicy::HaltOnError)
        } else {
            None
        }
    }
}

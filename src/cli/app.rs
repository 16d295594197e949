// ABOUTME: Main application orchestration for the stagehand CLI
// ABOUTME: Coordinates between CLI arguments, configuration, and command execution

use anyhow::{anyhow, Result};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use super::commands::{self, RunOptions};
use super::{Args, Commands, Config};
use crate::engine::RunStatus;

pub struct App {
    config: Config,
}

impl App {
    /// Create a new application instance
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Initialize logging based on configuration
    pub fn init_logging(&self, verbose: bool, no_color: bool) -> Result<()> {
        let log_level = if verbose {
            "debug"
        } else {
            &self.config.logging.level
        };

        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

        let result = match self.config.logging.format.as_str() {
            "compact" => tracing_subscriber::fmt()
                .compact()
                .with_env_filter(env_filter)
                .with_ansi(!no_color)
                .with_target(false)
                .try_init(),
            _ => tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_ansi(!no_color)
                .with_target(false)
                .try_init(),
        };
        result.map_err(|e| anyhow!("Failed to initialize logging: {}", e))?;

        debug!("Logging initialized with level: {}", log_level);
        Ok(())
    }

    /// Run the application with parsed arguments
    pub async fn run(&mut self, args: Args) -> Result<()> {
        self.init_logging(args.verbose, args.no_color)?;

        info!("Starting stagehand v{}", env!("CARGO_PKG_VERSION"));
        debug!("Configuration loaded from: {:?}", args.config);

        self.execute(args.command).await
    }

    /// Dispatch a parsed subcommand.
    pub async fn execute(&mut self, command: Commands) -> Result<()> {
        match command {
            Commands::Run {
                plan,
                vars,
                continue_on_error,
                exit_on_error,
                dry_run,
                output,
                format,
            } => {
                let options = RunOptions {
                    variables: Args::parse_variables(&vars)?,
                    policy: Args::policy_override(continue_on_error, exit_on_error),
                    dry_run,
                    output,
                    format,
                };

                match commands::run_plan(&plan, options, &self.config).await? {
                    Some(report) if report.status != RunStatus::Success => Err(anyhow!(
                        "Plan '{}' finished with status {:?}: {} failed, {} pending",
                        report.name,
                        report.status,
                        report.summary.failed,
                        report.summary.pending
                    )),
                    _ => Ok(()),
                }
            }

            Commands::Validate { plan, vars } => {
                let variables = Args::parse_variables(&vars)?;
                commands::validate_plan(&plan, variables, &self.config).await
            }

            Commands::Init {
                name,
                output_dir,
                template,
            } => commands::init_plan(&name, &output_dir, &template)
                .await
                .map(|_| ()),
        }
    }

    /// Create application from command line arguments
    pub fn from_args(args: &Args) -> Result<Self> {
        let config = Config::load(args.config.clone())?;
        Ok(Self::new(config))
    }
}

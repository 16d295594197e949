// ABOUTME: Configuration management for the stagehand application
// ABOUTME: Handles loading configuration from files and STAGEHAND_* environment overrides

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::tasks::{DEFAULT_COMMAND_TIMEOUT, DEFAULT_SHELL};

fn default_shell() -> String {
    DEFAULT_SHELL.to_string()
}

fn default_command_timeout() -> Duration {
    DEFAULT_COMMAND_TIMEOUT
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Where reports go when a plan writes to stdout and no `-o` is given.
    #[serde(default)]
    pub default_output_dir: Option<PathBuf>,

    #[serde(default = "default_shell")]
    pub shell: String,

    #[serde(default = "default_command_timeout", with = "humantime_serde")]
    pub command_timeout: Duration,

    /// Defaults for plan variables; plans and `-V` take precedence.
    #[serde(default)]
    pub template_vars: BTreeMap<String, String>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_output_dir: None,
            shell: default_shell(),
            command_timeout: default_command_timeout(),
            template_vars: BTreeMap::new(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file path or default locations
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let mut config = Self::load_file(path)?;
        config.merge_env()?;
        Ok(config)
    }

    fn load_file(path: Option<PathBuf>) -> Result<Self> {
        let explicit = path.is_some();
        let config_path = match path {
            Some(p) => p,
            None => Self::find_config_file(),
        };

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)?;
            serde_yaml::from_str(&contents).map_err(|e| {
                anyhow!(
                    "Failed to parse config file {}: {}",
                    config_path.display(),
                    e
                )
            })
        } else if explicit {
            Err(anyhow!(
                "Config file not found: {}",
                config_path.display()
            ))
        } else {
            Ok(Config::default())
        }
    }

    /// Find configuration file in standard locations
    fn find_config_file() -> PathBuf {
        let possible_paths = [
            PathBuf::from("stagehand.yaml"),
            PathBuf::from("stagehand.yml"),
            PathBuf::from(".stagehand.yaml"),
            PathBuf::from(".stagehand.yml"),
        ];

        for path in possible_paths {
            if path.exists() {
                return path;
            }
        }

        if let Some(home_dir) = dirs::home_dir() {
            let home_config = home_dir.join(".stagehand").join("config.yaml");
            if home_config.exists() {
                return home_config;
            }
        }

        PathBuf::from("stagehand.yaml")
    }

    /// Merge environment variables into configuration
    fn merge_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(level) = lookup("STAGEHAND_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("STAGEHAND_LOG_FORMAT") {
            self.logging.format = format;
        }
        if let Some(shell) = lookup("STAGEHAND_SHELL") {
            self.shell = shell;
        }
        if let Some(timeout) = lookup("STAGEHAND_COMMAND_TIMEOUT") {
            self.command_timeout = humantime::parse_duration(&timeout)
                .map_err(|e| anyhow!("Invalid STAGEHAND_COMMAND_TIMEOUT '{}': {}", timeout, e))?;
        }
        if let Some(dir) = lookup("STAGEHAND_OUTPUT_DIR") {
            self.default_output_dir = Some(PathBuf::from(dir));
        }

        Ok(())
    }

    /// Merge additional variables into template variables
    pub fn merge_variables<I>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.template_vars.extend(vars);
    }
}

// ABOUTME: Configuration types for run report output
// ABOUTME: Report format selection and destination parsing (stdout or file:// paths)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

use super::error::{OutputError, Result};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
    #[serde(default = "default_destination")]
    pub destination: String,
    #[serde(default)]
    pub options: OutputOptions,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Pretty,
    Yaml,
    Text,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutputOptions {
    #[serde(default = "default_true")]
    pub include_timestamps: bool,
    #[serde(default = "default_true")]
    pub include_tasks: bool,
    /// Truncate task messages longer than this in text output.
    #[serde(default)]
    pub max_message_length: Option<usize>,
    #[serde(default = "default_true")]
    pub create_dirs: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Stdout,
    File(PathBuf),
}

fn default_destination() -> String {
    "stdout".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            destination: default_destination(),
            options: OutputOptions::default(),
        }
    }
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            include_timestamps: true,
            include_tasks: true,
            max_message_length: None,
            create_dirs: true,
        }
    }
}

impl OutputConfig {
    pub fn destination(&self) -> Result<Destination> {
        self.destination.parse()
    }
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Pretty => "pretty",
            OutputFormat::Yaml => "yaml",
            OutputFormat::Text => "text",
        }
    }

    pub fn file_extension(&self) -> &'static str {
        match self {
            OutputFormat::Json | OutputFormat::Pretty => "json",
            OutputFormat::Yaml => "yaml",
            OutputFormat::Text => "txt",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = OutputError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "pretty" => Ok(OutputFormat::Pretty),
            "yaml" | "yml" => Ok(OutputFormat::Yaml),
            "text" | "txt" => Ok(OutputFormat::Text),
            other => Err(OutputError::FormatterNotFound {
                format: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Destination {
    type Err = OutputError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() || s == "stdout" || s == "-" {
            return Ok(Destination::Stdout);
        }
        match s.strip_prefix("file://") {
            Some("") => Err(OutputError::ConfigError {
                message: "file destination requires a path".to_string(),
            }),
            Some(path) => Ok(Destination::File(PathBuf::from(path))),
            None if s.contains("://") => Err(OutputError::WriterNotFound {
                writer_type: s.split("://").next().unwrap_or_default().to_string(),
            }),
            None => Ok(Destination::File(PathBuf::from(s))),
        }
    }
}

impl std::fmt::Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Destination::Stdout => f.write_str("stdout"),
            Destination::File(path) => write!(f, "file://{}", path.display()),
        }
    }
}

// ABOUTME: Output handling for run reports and live progress
// ABOUTME: Formats reports as JSON/YAML/text and writes them to stdout or files

pub mod config;
pub mod error;
pub mod formatter;
pub mod progress;
pub mod writer;

pub use config::{Destination, OutputConfig, OutputFormat, OutputOptions};
pub use error::{OutputError, Result};
pub use formatter::{formatter_for, JsonFormatter, ReportFormatter, TextFormatter, YamlFormatter};
pub use progress::ProgressReporter;
pub use writer::{writer_for, FileWriter, ReportWriter, StdoutWriter};

use tracing::debug;

use crate::engine::RunReport;

/// Format `report` per `config` and write it to the configured destination.
pub async fn write_report(report: &RunReport, config: &OutputConfig) -> Result<()> {
    let destination = config.destination()?;
    let content = formatter_for(config.format).format_report(report, &config.options)?;

    debug!(
        "Writing {} report for run {} to {}",
        config.format, report.run_id, destination
    );
    writer_for(&destination, config.options.create_dirs)
        .write(&content)
        .await
}

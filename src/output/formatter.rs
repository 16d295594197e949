// ABOUTME: Report formatters for JSON, YAML, and human-readable text
// ABOUTME: Turns a finished run report into the string written to the destination

use serde_json::{self, Value as JsonValue};

use super::config::{OutputFormat, OutputOptions};
use super::error::{OutputError, Result};
use crate::engine::{RunReport, TaskSnapshot, TaskStatus};

pub trait ReportFormatter: Send + Sync {
    fn format_report(&self, report: &RunReport, options: &OutputOptions) -> Result<String>;
}

pub fn formatter_for(format: OutputFormat) -> Box<dyn ReportFormatter> {
    match format {
        OutputFormat::Json => Box::new(JsonFormatter::new()),
        OutputFormat::Pretty => Box::new(JsonFormatter::new_pretty()),
        OutputFormat::Yaml => Box::new(YamlFormatter::new()),
        OutputFormat::Text => Box::new(TextFormatter::new()),
    }
}

/// Status glyph shared by the text report and live progress output.
pub fn status_icon(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Success => "✓",
        TaskStatus::Error => "✗",
        TaskStatus::Skipped => "⊘",
        TaskStatus::Pending => "⧖",
        TaskStatus::Running => "⟳",
    }
}

pub struct JsonFormatter {
    pretty: bool,
}

pub struct YamlFormatter;

pub struct TextFormatter;

impl Default for JsonFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonFormatter {
    pub fn new() -> Self {
        Self { pretty: false }
    }

    pub fn new_pretty() -> Self {
        Self { pretty: true }
    }

    fn prepare_report(&self, report: &RunReport, options: &OutputOptions) -> Result<JsonValue> {
        let mut value = serde_json::to_value(report)?;

        if let JsonValue::Object(ref mut output) = value {
            output.insert(
                "duration_seconds".to_string(),
                serde_json::Number::from_f64(report.duration.as_secs_f64())
                    .map(JsonValue::Number)
                    .unwrap_or(JsonValue::Null),
            );
            output.remove("duration");

            if !options.include_timestamps {
                output.remove("start_time");
                output.remove("end_time");
                if let Some(JsonValue::Array(tasks)) = output.get_mut("tasks") {
                    for task in tasks {
                        if let Some(state) =
                            task.get_mut("state").and_then(JsonValue::as_object_mut)
                        {
                            state.remove("started_at");
                            state.remove("finished_at");
                        }
                    }
                }
            }
            if !options.include_tasks {
                output.remove("tasks");
            }
        }

        Ok(value)
    }
}

impl ReportFormatter for JsonFormatter {
    fn format_report(&self, report: &RunReport, options: &OutputOptions) -> Result<String> {
        let prepared = self.prepare_report(report, options)?;

        if self.pretty {
            serde_json::to_string_pretty(&prepared).map_err(OutputError::SerializationError)
        } else {
            serde_json::to_string(&prepared).map_err(OutputError::SerializationError)
        }
    }
}

impl Default for YamlFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl YamlFormatter {
    pub fn new() -> Self {
        Self
    }
}

impl ReportFormatter for YamlFormatter {
    fn format_report(&self, report: &RunReport, options: &OutputOptions) -> Result<String> {
        let prepared = JsonFormatter::new().prepare_report(report, options)?;
        serde_yaml::to_string(&prepared).map_err(OutputError::YamlSerializationError)
    }
}

impl Default for TextFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl TextFormatter {
    pub fn new() -> Self {
        Self
    }

    fn format_task(&self, task: &TaskSnapshot, options: &OutputOptions) -> String {
        let mut line = format!(
            "{} {} [{}] ({})",
            status_icon(task.state.status),
            task.title,
            task.key,
            task.state.status
        );

        if let Some(duration) = task.state.duration() {
            line.push_str(&format!(" [{:.2}s]", duration.as_secs_f64()));
        }

        if let Some(ref message) = task.state.message {
            let message = truncate(message, options.max_message_length);
            let label = if task.state.status == TaskStatus::Error {
                "Error"
            } else {
                "Reason"
            };
            line.push_str(&format!("\n    {}: {}", label, message.replace('\n', "\n    ")));
        }

        line
    }
}

impl ReportFormatter for TextFormatter {
    fn format_report(&self, report: &RunReport, options: &OutputOptions) -> Result<String> {
        let mut output = String::new();

        output.push_str(&format!("Run: {} ({})\n", report.name, report.run_id));
        output.push_str(&format!("Status: {}\n", report.status));
        output.push_str(&format!("Policy: {}\n", report.policy));

        if options.include_timestamps {
            output.push_str(&format!(
                "Started: {}\n",
                report.start_time.format("%Y-%m-%d %H:%M:%S UTC")
            ));
            output.push_str(&format!(
                "Completed: {}\n",
                report.end_time.format("%Y-%m-%d %H:%M:%S UTC")
            ));
        }
        output.push_str(&format!("Duration: {:.2}s\n", report.duration.as_secs_f64()));

        if let Some(ref error) = report.error {
            output.push_str(&format!("Error: {}\n", error));
        }

        output.push_str("\nSummary:\n");
        output.push_str(&format!("  Total tasks: {}\n", report.summary.total_tasks));
        output.push_str(&format!("  Succeeded: {}\n", report.summary.succeeded));
        output.push_str(&format!("  Skipped: {}\n", report.summary.skipped));
        output.push_str(&format!("  Failed: {}\n", report.summary.failed));
        output.push_str(&format!("  Not run: {}\n", report.summary.pending));

        if options.include_tasks && !report.tasks.is_empty() {
            for group in &report.groups {
                output.push_str(&format!("\n{} ({})\n", group.title, group.status));
                for task in report.tasks.iter().filter(|t| t.group == group.key) {
                    for line in self.format_task(task, options).lines() {
                        output.push_str(&format!("  {}\n", line));
                    }
                }
            }
        }

        Ok(output)
    }
}

fn truncate(message: &str, max_len: Option<usize>) -> String {
    match max_len {
        Some(max_len) if message.chars().count() > max_len => {
            let truncated: String = message.chars().take(max_len).collect();
            format!("{}... [truncated]", truncated)
        }
        _ => message.to_string(),
    }
}

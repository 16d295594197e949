// ABOUTME: Output writers for report destinations (stdout, files)
// ABOUTME: File destinations create parent directories before writing

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use super::config::Destination;
use super::error::{OutputError, Result};

#[async_trait]
pub trait ReportWriter: Send + Sync {
    async fn write(&self, content: &str) -> Result<()>;
}

pub fn writer_for(destination: &Destination, create_dirs: bool) -> Box<dyn ReportWriter> {
    match destination {
        Destination::Stdout => Box::new(StdoutWriter::new()),
        Destination::File(path) => {
            Box::new(FileWriter::new(path.clone()).with_create_dirs(create_dirs))
        }
    }
}

pub struct StdoutWriter;

pub struct FileWriter {
    path: PathBuf,
    create_dirs: bool,
}

impl Default for StdoutWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl StdoutWriter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ReportWriter for StdoutWriter {
    async fn write(&self, content: &str) -> Result<()> {
        let mut stdout = tokio::io::stdout();
        stdout.write_all(content.as_bytes()).await?;
        if !content.ends_with('\n') {
            stdout.write_all(b"\n").await?;
        }
        stdout.flush().await?;

        debug!("Output written to stdout ({} chars)", content.len());
        Ok(())
    }
}

impl FileWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            create_dirs: true,
        }
    }

    pub fn with_create_dirs(mut self, create_dirs: bool) -> Self {
        self.create_dirs = create_dirs;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ReportWriter for FileWriter {
    async fn write(&self, content: &str) -> Result<()> {
        if self.create_dirs {
            if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|e| OutputError::WriteError {
                        message: format!("Failed to create directory {}: {}", parent.display(), e),
                    })?;
            }
        }

        fs::write(&self.path, content)
            .await
            .map_err(|e| OutputError::WriteError {
                message: format!("Failed to write file {}: {}", self.path.display(), e),
            })?;

        info!(
            "Output written to file: {} ({} bytes)",
            self.path.display(),
            content.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_file_writer_creates_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested/dir/report.json");

        FileWriter::new(&path).write("{}").await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{}");
    }

    #[tokio::test]
    async fn test_file_writer_without_create_dirs_fails() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("missing/report.json");

        let result = FileWriter::new(&path)
            .with_create_dirs(false)
            .write("{}")
            .await;

        assert!(matches!(result, Err(OutputError::WriteError { .. })));
    }

    #[tokio::test]
    async fn test_writer_for_destination() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("out.txt");

        let writer = writer_for(&Destination::File(path.clone()), true);
        writer.write("done").await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "done");
    }
}

//! Raw plan text collaborator

use async_trait::async_trait;
use std::io;
use std::path::Path;
use tokio::fs;

/// Reads and writes the plan markdown as plain text
#[async_trait]
pub trait PlanTextIo: Send + Sync {
    /// Read the whole file
    async fn read_text(&self, path: &Path) -> io::Result<String>;

    /// Replace the whole file
    async fn write_text(&self, path: &Path, text: &str) -> io::Result<()>;
}

/// Plan text on the local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct FsPlanText;

#[async_trait]
impl PlanTextIo for FsPlanText {
    async fn read_text(&self, path: &Path) -> io::Result<String> {
        fs::read_to_string(path).await
    }

    async fn write_text(&self, path: &Path, text: &str) -> io::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        fs::write(path, text).await
    }
}

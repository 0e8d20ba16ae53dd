use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

/// Local copy of the generated file, overwritten after each successful run.
#[derive(Debug, Clone)]
pub struct LocalMirror {
    path: PathBuf,
}

impl LocalMirror {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the whole file with `content`, creating parent directories.
    pub async fn write(&self, content: &str) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        tokio::fs::write(&self.path, content)
            .await
            .with_context(|| format!("Failed to write {}", self.path.display()))?;

        info!(
            "Wrote {} bytes to local mirror {}",
            content.len(),
            self.path.display()
        );
        Ok(())
    }
}

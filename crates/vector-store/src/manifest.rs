use crate::error::Result;
use crate::layout::StoreLayout;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Append-only list of ingested document names, one per line.
///
/// Advisory only: the chunk store is the source of truth for what is searchable. A document
/// that produced no chunks is still recorded here.
#[derive(Debug, Clone)]
pub struct DocumentManifest {
    path: PathBuf,
}

impl DocumentManifest {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn for_layout(layout: &StoreLayout) -> Self {
        Self::new(layout.manifest_path())
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn record(&self, document: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let line = document.replace(['\r', '\n'], " ");
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(format!("{line}\n").as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    /// Recorded names in ingestion order; empty when nothing was recorded yet
    pub async fn list(&self) -> Result<Vec<String>> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        Ok(raw
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(ToString::to_string)
            .collect())
    }
}

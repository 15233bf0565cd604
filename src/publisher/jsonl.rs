use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::types::Snapshot;
use super::SnapshotSink;

/// Appends every snapshot as one JSON document per line
pub struct JsonLinesSink {
    path: PathBuf,
    file: File,
}

impl JsonLinesSink {
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .with_context(|| format!("Failed to open snapshot log {}", path.display()))?;
        Ok(Self { path: path.to_path_buf(), file })
    }
}

#[async_trait]
impl SnapshotSink for JsonLinesSink {
    fn name(&self) -> &str { "jsonl" }

    async fn publish(&mut self, snapshot: &Snapshot) -> Result<()> {
        let mut line = serde_json::to_vec(snapshot)?;
        line.push(b'\n');
        self.file
            .write_all(&line)
            .await
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        self.file.flush().await?;
        Ok(())
    }
}

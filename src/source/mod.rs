pub mod replay;
pub mod simulated;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::config::{SourceConfig, SourceKind};
use crate::error::SourceError;
use crate::types::Reading;

/// Produces one sensor reading per tick.
///
/// Values are passed through unchecked; range enforcement is not the
/// source's job.
#[async_trait]
pub trait ReadingSource: Send {
    /// Human-readable name for this source (e.g., "simulated")
    fn name(&self) -> &str;

    /// Produce the next reading, or fail the current tick.
    async fn next_reading(&mut self) -> Result<Reading, SourceError>;
}

/// Create the configured reading source
pub fn create_source(config: &SourceConfig) -> Result<Box<dyn ReadingSource>> {
    let source: Box<dyn ReadingSource> = match config.kind {
        SourceKind::Simulated => Box::new(simulated::SimulatedSource::new(config.seed)),
        SourceKind::Replay => {
            let path = config
                .replay_path
                .as_deref()
                .context("source.replay_path is required for the replay source")?;
            Box::new(replay::ReplaySource::open(path, config.replay_loop)?)
        }
    };

    tracing::info!(source = source.name(), "Initialized reading source");
    Ok(source)
}

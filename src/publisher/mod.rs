pub mod jsonl;
pub mod log_sink;
pub mod webhook;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::PublishConfig;
use crate::types::Snapshot;

/// A consumer of published snapshots (dashboards, files, notifications)
#[async_trait]
pub trait SnapshotSink: Send {
    /// Sink name
    fn name(&self) -> &str;

    /// Deliver one snapshot
    async fn publish(&mut self, snapshot: &Snapshot) -> Result<()>;
}

/// Fans each snapshot out to every configured sink. A failing sink is
/// logged and skipped; it never affects the monitor.
pub struct Publisher {
    sinks: Vec<Box<dyn SnapshotSink>>,
}

impl Publisher {
    pub async fn new(config: &PublishConfig) -> Result<Self> {
        let mut sinks: Vec<Box<dyn SnapshotSink>> = Vec::new();

        if config.log {
            sinks.push(Box::new(log_sink::LogSink::new()));
        }

        if let Some(ref path) = config.jsonl_path {
            sinks.push(Box::new(jsonl::JsonLinesSink::open(path).await?));
        }

        if let Some(ref wc) = config.webhook {
            if wc.enabled {
                sinks.push(Box::new(webhook::WebhookSink::new(wc)?));
            }
        }

        tracing::info!(sinks = sinks.len(), "Initialized snapshot sinks");
        Ok(Self { sinks })
    }

    pub fn with_sinks(sinks: Vec<Box<dyn SnapshotSink>>) -> Self {
        Self { sinks }
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    pub async fn dispatch(&mut self, snapshot: &Snapshot) {
        for sink in self.sinks.iter_mut() {
            if let Err(e) = sink.publish(snapshot).await {
                tracing::error!(
                    sink = sink.name(),
                    tick = snapshot.tick,
                    error = %e,
                    "Failed to publish snapshot"
                );
            }
        }
    }
}

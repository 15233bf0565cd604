use anyhow::Result;
use async_trait::async_trait;
use tracing::{info, warn};

use crate::types::{Snapshot, Status};
use super::SnapshotSink;

/// Minimum probability worth showing next to a reading
const NOTABLE_PROBABILITY: f64 = 0.05;

/// Writes a one-line summary of each snapshot to the log
#[derive(Debug, Default)]
pub struct LogSink;

impl LogSink {
    pub fn new() -> Self {
        Self
    }
}

pub(crate) fn summarize(snapshot: &Snapshot) -> String {
    let r = &snapshot.reading;
    let mut line = format!(
        "temp={:.2}C vib={:.2}g rpm={:.0} hum={:.0}% age={:.0}y hours={:.0}",
        r.temperature, r.vibration, r.rpm, r.humidity, r.machine_age, r.operating_hours
    );

    let flags: Vec<String> = snapshot.flags.raised().map(|f| f.to_string()).collect();
    if !flags.is_empty() {
        line.push_str(&format!(" flags=[{}]", flags.join(",")));
    }

    let probs: Vec<String> = snapshot
        .notable_probabilities(NOTABLE_PROBABILITY)
        .into_iter()
        .map(|p| format!("{}:{:.1}%", p.label, p.probability * 100.0))
        .collect();
    line.push_str(&format!(" probs=[{}]", probs.join(", ")));
    line
}

#[async_trait]
impl SnapshotSink for LogSink {
    fn name(&self) -> &str { "log" }

    async fn publish(&mut self, snapshot: &Snapshot) -> Result<()> {
        let summary = summarize(snapshot);
        match snapshot.status {
            Status::Normal => info!(
                tick = snapshot.tick,
                machine = %snapshot.machine.machine_id,
                "{}",
                summary
            ),
            Status::Anomaly => {
                let labels: Vec<&str> = snapshot.labels.iter().map(|l| l.as_str()).collect();
                warn!(
                    tick = snapshot.tick,
                    machine = %snapshot.machine.machine_id,
                    labels = %labels.join(", "),
                    "{}",
                    summary
                )
            }
        }
        Ok(())
    }
}

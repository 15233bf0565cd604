use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::analyzer::{AnomalySelector, ThresholdEvaluator};
use crate::config::Config;
use crate::error::TickError;
use crate::model::{Classifier, LoadedModel};
use crate::source::ReadingSource;
use crate::storage::RollingHistory;
use crate::types::{MachineInfo, ModelInfo, Reading, Snapshot, Status};

/// Cloneable handle to the most recently published snapshot.
///
/// Publication swaps the whole `Arc`, so a reader sees either the previous
/// snapshot or the new one, never a mix.
#[derive(Clone, Default)]
pub struct SnapshotCell {
    inner: Arc<RwLock<Option<Arc<Snapshot>>>>,
}

impl SnapshotCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, snapshot: Arc<Snapshot>) {
        let mut slot = self.inner.write().unwrap_or_else(|e| e.into_inner());
        *slot = Some(snapshot);
    }

    pub fn latest(&self) -> Option<Arc<Snapshot>> {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

/// Drives one ingest → classify → select → record → publish cycle per tick.
///
/// The monitor owns all mutable state (histories, last reading, published
/// snapshot). A failed tick leaves that state exactly as it was.
pub struct Monitor {
    source: Box<dyn ReadingSource>,
    classifier: Box<dyn Classifier>,
    selector: AnomalySelector,
    evaluator: ThresholdEvaluator,
    history: RollingHistory,
    model: ModelInfo,
    machine: MachineInfo,
    ticks: u64,
    last_reading: Option<Reading>,
    published: SnapshotCell,
}

impl Monitor {
    /// Takes an already-initialized classifier; there is no way to tick
    /// before one exists.
    pub fn new(config: &Config, source: Box<dyn ReadingSource>, model: LoadedModel) -> Self {
        let info = model.info();
        Self {
            source,
            classifier: model.classifier,
            selector: AnomalySelector::new(config.monitor.probability_threshold),
            evaluator: ThresholdEvaluator::new(&config.thresholds),
            history: RollingHistory::new(config.monitor.reading_window, config.monitor.anomaly_window),
            model: info,
            machine: MachineInfo {
                machine_id: config.agent.machine_id.clone(),
                location: config.agent.location.clone(),
            },
            ticks: 0,
            last_reading: None,
            published: SnapshotCell::new(),
        }
    }

    /// Pull a reading from the source and process it
    pub async fn tick(&mut self) -> Result<Arc<Snapshot>, TickError> {
        let reading = self.source.next_reading().await?;
        self.process(reading)
    }

    /// Run one cycle on a reading that was obtained elsewhere
    pub fn process(&mut self, reading: Reading) -> Result<Arc<Snapshot>, TickError> {
        // everything fallible happens before any state changes
        let probabilities = self.classifier.predict(&reading)?;
        let labels = self.selector.select(&probabilities);
        let flags = self.evaluator.evaluate(&reading);

        let added = self.history.record(&reading, &labels);
        self.ticks += 1;
        self.last_reading = Some(reading);

        let status = Status::from_labels(&labels);
        let snapshot = Arc::new(Snapshot {
            tick: self.ticks,
            reading,
            labels,
            status,
            probabilities,
            flags,
            readings: self.history.readings().to_vec(),
            anomalies: self.history.anomalies().to_vec(),
            model: self.model.clone(),
            machine: self.machine.clone(),
        });

        // the log sink reports anomalies at warn level
        debug!(
            tick = self.ticks,
            status = %status,
            anomaly_events = added,
            "Tick complete"
        );

        self.published.publish(snapshot.clone());
        Ok(snapshot)
    }

    /// Handle for concurrent readers of the published snapshot
    pub fn snapshots(&self) -> SnapshotCell {
        self.published.clone()
    }

    pub fn latest(&self) -> Option<Arc<Snapshot>> {
        self.published.latest()
    }

    pub fn last_reading(&self) -> Option<&Reading> {
        self.last_reading.as_ref()
    }

    pub fn history(&self) -> &RollingHistory {
        &self.history
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn model(&self) -> &ModelInfo {
        &self.model
    }
}

use serde::Serialize;

use crate::types::{is_all_normal, AnomalyEvent, Label, Reading, TrendPoint};

/// Fixed-capacity ring buffer. Pushing into a full window evicts the oldest
/// entry; iteration is always oldest first.
#[derive(Debug, Clone)]
pub struct Window<T> {
    data: Vec<T>,
    head: usize,
    capacity: usize,
}

impl<T> Window<T> {
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            data: Vec::with_capacity(capacity),
            head: 0,
            capacity,
        }
    }

    /// Append an entry, returning the evicted one if the window was full
    pub fn push(&mut self, item: T) -> Option<T> {
        if self.data.len() < self.capacity {
            self.data.push(item);
            None
        } else {
            let evicted = std::mem::replace(&mut self.data[self.head], item);
            self.head = (self.head + 1) % self.capacity;
            Some(evicted)
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn latest(&self) -> Option<&T> {
        if self.data.is_empty() {
            return None;
        }
        let idx = if self.data.len() < self.capacity {
            self.data.len() - 1
        } else {
            (self.head + self.capacity - 1) % self.capacity
        };
        self.data.get(idx)
    }

    /// Entries in insertion order, oldest first
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> {
        // head stays 0 until the buffer fills, so this also covers the partial case
        let (newer, older) = self.data.split_at(self.head);
        older.iter().chain(newer.iter())
    }

    /// The most recent `n` entries in chronological order
    pub fn recent(&self, n: usize) -> Vec<&T> {
        let skip = self.data.len().saturating_sub(n);
        self.iter().skip(skip).collect()
    }

    pub fn clear(&mut self) {
        self.data.clear();
        self.head = 0;
    }
}

impl<T: Clone> Window<T> {
    pub fn to_vec(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }
}

impl<T: Serialize> Serialize for Window<T> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

/// The two bounded histories kept by the monitor: trend points for every
/// tick and anomaly events for ticks that reported something other than
/// "Normal".
#[derive(Debug, Clone)]
pub struct RollingHistory {
    readings: Window<TrendPoint>,
    anomalies: Window<AnomalyEvent>,
}

impl RollingHistory {
    pub fn new(reading_capacity: usize, anomaly_capacity: usize) -> Self {
        Self {
            readings: Window::new(reading_capacity),
            anomalies: Window::new(anomaly_capacity),
        }
    }

    /// Record one tick. Returns the number of anomaly events appended.
    pub fn record(&mut self, reading: &Reading, labels: &[Label]) -> usize {
        self.readings.push(TrendPoint::from(reading));

        if is_all_normal(labels) {
            return 0;
        }

        let mut added = 0;
        for label in labels.iter().filter(|l| !l.is_normal()) {
            self.anomalies.push(AnomalyEvent::new(label.clone(), reading));
            added += 1;
        }
        added
    }

    pub fn readings(&self) -> &Window<TrendPoint> {
        &self.readings
    }

    pub fn anomalies(&self) -> &Window<AnomalyEvent> {
        &self.anomalies
    }
}

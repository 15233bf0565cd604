use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::Path;

use crate::error::SourceError;
use crate::types::Reading;
use super::ReadingSource;

/// One line of a recorded readings file. A missing timestamp is replaced
/// by the time of replay.
#[derive(Debug, Clone, Deserialize)]
struct ReplayRecord {
    timestamp: Option<DateTime<Utc>>,
    temperature: f64,
    vibration: f64,
    machine_age: f64,
    humidity: f64,
    rpm: f64,
    operating_hours: f64,
}

/// Replays readings from a JSON-lines file, optionally looping
pub struct ReplaySource {
    records: Vec<ReplayRecord>,
    position: usize,
    looping: bool,
}

impl ReplaySource {
    pub fn open(path: &Path, looping: bool) -> Result<Self, SourceError> {
        let content = std::fs::read_to_string(path).map_err(|source| SourceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, looping)
    }

    pub fn parse(content: &str, looping: bool) -> Result<Self, SourceError> {
        let mut records = Vec::new();
        for (i, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let record = serde_json::from_str(line)
                .map_err(|source| SourceError::Malformed { line: i + 1, source })?;
            records.push(record);
        }
        Ok(Self { records, position: 0, looping })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl ReadingSource for ReplaySource {
    fn name(&self) -> &str { "replay" }

    async fn next_reading(&mut self) -> Result<Reading, SourceError> {
        if self.position >= self.records.len() {
            if !self.looping || self.records.is_empty() {
                return Err(SourceError::Exhausted);
            }
            self.position = 0;
        }
        let r = &self.records[self.position];
        self.position += 1;

        Ok(Reading {
            timestamp: r.timestamp.unwrap_or_else(Utc::now),
            temperature: r.temperature,
            vibration: r.vibration,
            machine_age: r.machine_age,
            humidity: r.humidity,
            rpm: r.rpm,
            operating_hours: r.operating_hours,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO: &str = r#"
{"timestamp":"2024-03-01T10:00:00Z","temperature":110,"vibration":0.4,"machine_age":3,"humidity":50,"rpm":2000,"operating_hours":2000}
# comment lines are skipped
{"temperature":70.5,"vibration":1.9,"machine_age":9,"humidity":31,"rpm":4100,"operating_hours":7100}
"#;

    #[tokio::test]
    async fn replays_in_order_then_exhausts() {
        let mut source = ReplaySource::parse(TWO, false).unwrap();
        assert_eq!(source.len(), 2);

        let first = source.next_reading().await.unwrap();
        assert_eq!(first.temperature, 110.0);
        assert_eq!(first.timestamp.to_rfc3339(), "2024-03-01T10:00:00+00:00");

        let second = source.next_reading().await.unwrap();
        assert_eq!(second.vibration, 1.9);

        assert!(matches!(source.next_reading().await, Err(SourceError::Exhausted)));
    }

    #[tokio::test]
    async fn looping_wraps_around() {
        let mut source = ReplaySource::parse(TWO, true).unwrap();
        for _ in 0..2 {
            source.next_reading().await.unwrap();
        }
        let again = source.next_reading().await.unwrap();
        assert_eq!(again.temperature, 110.0);
    }

    #[tokio::test]
    async fn empty_file_is_exhausted_even_when_looping() {
        let mut source = ReplaySource::parse("\n\n", true).unwrap();
        assert!(source.is_empty());
        assert!(matches!(source.next_reading().await, Err(SourceError::Exhausted)));
    }

    #[test]
    fn malformed_lines_report_their_position() {
        let err = ReplaySource::parse("{\"temperature\":1}\n", false).err().unwrap();
        assert!(matches!(err, SourceError::Malformed { line: 1, .. }));
    }

    #[test]
    fn open_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("readings.jsonl");
        std::fs::write(&path, TWO).unwrap();
        assert_eq!(ReplaySource::open(&path, false).unwrap().len(), 2);

        let missing = ReplaySource::open(&dir.path().join("nope.jsonl"), false).err().unwrap();
        assert!(matches!(missing, SourceError::Io { .. }));
    }
}

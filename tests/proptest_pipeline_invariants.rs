//! Property-based invariant tests for label selection and the rolling windows.
//!
//! 1. Selection is never empty.
//! 2. "Normal" never appears next to another label.
//! 3. Every label at or above the threshold is selected, most probable first.
//! 4. Nothing qualifying falls back to exactly `["Normal"]`.
//! 5. The reading window holds min(ticks, 15) entries for any tick sequence.
//! 6. The anomaly window never exceeds 10 and grows only on non-Normal ticks,
//!    by one event per selected label.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use equipment_monitor::analyzer::AnomalySelector;
use equipment_monitor::config::Config;
use equipment_monitor::error::{ModelError, SourceError};
use equipment_monitor::model::{Classifier, LoadedModel};
use equipment_monitor::monitor::Monitor;
use equipment_monitor::source::ReadingSource;
use equipment_monitor::types::{is_all_normal, ClassProbabilities, Label, ModelOrigin, Reading};
use proptest::prelude::*;

const LABEL_POOL: [&str; 4] = ["Bearing Failure", "Misalignment", "Motor Overheating", "Normal"];

// ── Helpers ─────────────────────────────────────────────────────────────

/// Scores drawn from a grid that includes the 0.15 boundary itself
fn score_strategy() -> impl Strategy<Value = f64> {
    prop_oneof![
        (0u32..=100).prop_map(|n| f64::from(n) / 100.0),
        Just(0.15),
        0.0f64..=1.0,
    ]
}

/// Distinct labels (a random subset of the pool, in pool order) with scores
fn distribution_strategy() -> impl Strategy<Value = Vec<(Label, f64)>> {
    proptest::sample::subsequence(LABEL_POOL.to_vec(), 1..=LABEL_POOL.len()).prop_flat_map(|names| {
        let n = names.len();
        proptest::collection::vec(score_strategy(), n).prop_map(move |scores| {
            names.iter().map(|l| Label::from(*l)).zip(scores).collect()
        })
    })
}

/// Scores per tick for the full pool
fn tick_scores_strategy() -> impl Strategy<Value = Vec<Vec<f64>>> {
    proptest::collection::vec(proptest::collection::vec(score_strategy(), LABEL_POOL.len()), 1..60)
}

/// Looks up the scores for a tick by the reading's `operating_hours`
struct ScriptedClassifier {
    labels: Vec<Label>,
    scores: Vec<Vec<f64>>,
}

impl Classifier for ScriptedClassifier {
    fn name(&self) -> &str { "scripted" }

    fn labels(&self) -> &[Label] { &self.labels }

    fn predict(&self, reading: &Reading) -> Result<ClassProbabilities, ModelError> {
        let scores = self
            .scores
            .get(reading.operating_hours as usize)
            .ok_or_else(|| ModelError::MalformedInput("no scores for tick".into()))?;
        Ok(ClassProbabilities::new(self.labels.iter().cloned().zip(scores.iter().copied())))
    }
}

struct NoSource;

#[async_trait]
impl ReadingSource for NoSource {
    fn name(&self) -> &str { "none" }

    async fn next_reading(&mut self) -> Result<Reading, SourceError> {
        Err(SourceError::Exhausted)
    }
}

fn reading_for_tick(i: usize) -> Reading {
    Reading {
        timestamp: Utc.timestamp_opt(1_700_000_000 + i as i64, 0).unwrap(),
        temperature: 70.0,
        vibration: 0.5,
        machine_age: 3.0,
        humidity: 50.0,
        rpm: 2000.0,
        operating_hours: i as f64,
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 1-4. Selector invariants
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn selection_is_never_empty_and_never_mixes_normal(entries in distribution_strategy()) {
        let selector = AnomalySelector::default();
        let labels = selector.select(&ClassProbabilities::new(entries.clone()));

        prop_assert!(!labels.is_empty());
        if labels.len() > 1 {
            prop_assert!(labels.iter().all(|l| !l.is_normal()), "mixed selection {:?}", labels);
        }

        let other_qualifies = entries
            .iter()
            .any(|(l, p)| !l.is_normal() && *p >= AnomalySelector::DEFAULT_THRESHOLD);
        if other_qualifies {
            prop_assert!(labels.iter().all(|l| !l.is_normal()), "Normal kept in {:?}", labels);
        }
    }
}

proptest! {
    #[test]
    fn selection_is_exactly_the_qualifying_labels_by_score(entries in distribution_strategy()) {
        let threshold = AnomalySelector::DEFAULT_THRESHOLD;
        let labels = AnomalySelector::default().select(&ClassProbabilities::new(entries.clone()));
        let score = |label: &Label| entries.iter().find(|(l, _)| l == label).map(|(_, p)| *p);

        let qualifying: Vec<&Label> = entries.iter().filter(|(_, p)| *p >= threshold).map(|(l, _)| l).collect();
        let anomalous: Vec<&Label> = qualifying.iter().copied().filter(|l| !l.is_normal()).collect();

        if anomalous.is_empty() {
            prop_assert!(is_all_normal(&labels), "expected [Normal], got {:?}", labels);
        } else {
            prop_assert_eq!(labels.len(), anomalous.len());
            for label in &anomalous {
                prop_assert!(labels.contains(*label), "{:?} missing from {:?}", label, labels);
            }
            for pair in labels.windows(2) {
                prop_assert!(score(&pair[0]) >= score(&pair[1]), "out of order: {:?}", labels);
            }
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 5-6. Window invariants over arbitrary tick sequences
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn windows_stay_bounded_and_grow_only_on_anomalies(ticks in tick_scores_strategy()) {
        let count = ticks.len();
        let classifier = ScriptedClassifier {
            labels: LABEL_POOL.iter().map(|l| Label::from(*l)).collect(),
            scores: ticks,
        };
        let model = LoadedModel { classifier: Box::new(classifier), origin: ModelOrigin::Loaded };
        let mut monitor = Monitor::new(&Config::default(), Box::new(NoSource), model);

        let mut prev_anomalies = 0usize;
        for i in 0..count {
            let snap = monitor.process(reading_for_tick(i)).unwrap();

            prop_assert_eq!(snap.readings.len(), (i + 1).min(15));
            prop_assert!(snap.anomalies.len() <= 10);

            let added = if is_all_normal(&snap.labels) { 0 } else { snap.labels.len() };
            prop_assert_eq!(snap.anomalies.len(), (prev_anomalies + added).min(10));

            let newest: Vec<&Label> = snap.anomalies.iter().rev().take(added).map(|e| &e.label).collect();
            let expected: Vec<&Label> = snap.labels.iter().rev().take(added).collect();
            prop_assert_eq!(newest, expected);

            prev_anomalies = snap.anomalies.len();
        }
        prop_assert_eq!(monitor.ticks(), count as u64);
    }
}

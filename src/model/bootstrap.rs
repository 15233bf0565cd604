use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::ModelError;
use crate::types::Label;
use super::{TrainingDataProvider, TrainingSample, TrainingSet};

/// Failure classes of the synthetic data set, in canonical (sorted) order
pub const FAILURE_TYPES: [&str; 6] = [
    "Bearing Failure",
    "Excessive Load",
    "Loose Components",
    "Misalignment",
    "Motor Overheating",
    "Normal",
];

/// Rule-based ground truth for a synthetic sample. First matching rule wins.
pub fn ground_truth(
    temperature: f64,
    vibration: f64,
    machine_age: f64,
    humidity: f64,
    rpm: f64,
    operating_hours: f64,
) -> &'static str {
    if temperature > 105.0 && vibration > 1.2 {
        "Motor Overheating"
    } else if vibration > 1.8 && rpm > 4000.0 {
        "Misalignment"
    } else if humidity < 30.0 && vibration > 1.0 {
        "Bearing Failure"
    } else if machine_age > 8.0 && operating_hours > 7000.0 {
        "Loose Components"
    } else if rpm > 4800.0 || (rpm > 4200.0 && temperature > 95.0) {
        "Excessive Load"
    } else {
        "Normal"
    }
}

/// Seeded generator of rule-labelled readings with a fraction of labels
/// reassigned at random.
pub struct SyntheticTrainingData {
    rng: StdRng,
    label_noise: f64,
}

impl SyntheticTrainingData {
    pub fn new(seed: u64, label_noise: f64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            label_noise: if label_noise.is_nan() { 0.0 } else { label_noise.clamp(0.0, 1.0) },
        }
    }

    fn sample(&mut self) -> TrainingSample {
        let temperature = self.rng.gen_range(50.0..130.0);
        let vibration = self.rng.gen_range(0.1..2.5);
        let machine_age = self.rng.gen_range(1..=10) as f64;
        let humidity = self.rng.gen_range(25..=75) as f64;
        let rpm = self.rng.gen_range(1000..=5500) as f64;
        let operating_hours = self.rng.gen_range(1000..=8500) as f64;

        let rule = ground_truth(temperature, vibration, machine_age, humidity, rpm, operating_hours);
        let mut label = FAILURE_TYPES.iter().position(|l| *l == rule).unwrap_or(FAILURE_TYPES.len() - 1);
        if self.rng.gen_bool(self.label_noise) {
            label = self.rng.gen_range(0..FAILURE_TYPES.len());
        }

        TrainingSample {
            features: [temperature, vibration, machine_age, humidity, rpm, operating_hours],
            label,
        }
    }
}

impl TrainingDataProvider for SyntheticTrainingData {
    fn name(&self) -> &str { "synthetic" }

    fn training_set(&mut self, count: usize) -> Result<TrainingSet, ModelError> {
        if count == 0 {
            return Err(ModelError::Training("requested zero samples".into()));
        }
        let samples = (0..count).map(|_| self.sample()).collect();
        Ok(TrainingSet {
            labels: FAILURE_TYPES.iter().map(|l| Label::from(*l)).collect(),
            samples,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rules_follow_priority_order() {
        assert_eq!(ground_truth(110.0, 2.0, 9.0, 20.0, 5000.0, 8000.0), "Motor Overheating");
        assert_eq!(ground_truth(90.0, 2.0, 9.0, 20.0, 4100.0, 8000.0), "Misalignment");
        assert_eq!(ground_truth(90.0, 1.1, 9.0, 29.0, 3000.0, 8000.0), "Bearing Failure");
        assert_eq!(ground_truth(90.0, 0.5, 9.0, 50.0, 3000.0, 7001.0), "Loose Components");
        assert_eq!(ground_truth(90.0, 0.5, 3.0, 50.0, 4900.0, 2000.0), "Excessive Load");
        assert_eq!(ground_truth(96.0, 0.5, 3.0, 50.0, 4300.0, 2000.0), "Excessive Load");
        assert_eq!(ground_truth(94.0, 0.5, 3.0, 50.0, 4300.0, 2000.0), "Normal");
    }

    #[test]
    fn samples_respect_ranges() {
        let set = SyntheticTrainingData::new(9, 0.15).training_set(500).unwrap();
        assert_eq!(set.samples.len(), 500);
        assert_eq!(set.labels.len(), FAILURE_TYPES.len());
        for s in &set.samples {
            let [t, v, age, hum, rpm, hours] = s.features;
            assert!((50.0..130.0).contains(&t));
            assert!((0.1..2.5).contains(&v));
            assert!((1.0..=10.0).contains(&age) && age.fract() == 0.0);
            assert!((25.0..=75.0).contains(&hum));
            assert!((1000.0..=5500.0).contains(&rpm));
            assert!((1000.0..=8500.0).contains(&hours));
            assert!(s.label < FAILURE_TYPES.len());
        }
    }

    #[test]
    fn zero_noise_matches_rules_exactly() {
        let set = SyntheticTrainingData::new(13, 0.0).training_set(300).unwrap();
        for s in &set.samples {
            let [t, v, age, hum, rpm, hours] = s.features;
            assert_eq!(FAILURE_TYPES[s.label], ground_truth(t, v, age, hum, rpm, hours));
        }
    }

    #[test]
    fn noise_relabels_roughly_the_configured_fraction() {
        let set = SyntheticTrainingData::new(21, 0.5).training_set(2000).unwrap();
        let disagreements = set
            .samples
            .iter()
            .filter(|s| {
                let [t, v, age, hum, rpm, hours] = s.features;
                FAILURE_TYPES[s.label] != ground_truth(t, v, age, hum, rpm, hours)
            })
            .count();
        // half are redrawn, and a redraw keeps the rule label one time in six
        let expected = 2000.0 * 0.5 * 5.0 / 6.0;
        assert!((disagreements as f64 - expected).abs() < 150.0, "got {}", disagreements);
    }

    #[test]
    fn seeded_generation_is_reproducible() {
        let a = SyntheticTrainingData::new(77, 0.15).training_set(50).unwrap();
        let b = SyntheticTrainingData::new(77, 0.15).training_set(50).unwrap();
        assert_eq!(a.samples, b.samples);
    }

    #[test]
    fn nan_noise_means_no_noise() {
        let set = SyntheticTrainingData::new(13, f64::NAN).training_set(200).unwrap();
        for s in &set.samples {
            let [t, v, age, hum, rpm, hours] = s.features;
            assert_eq!(FAILURE_TYPES[s.label], ground_truth(t, v, age, hum, rpm, hours));
        }
    }

    #[test]
    fn zero_samples_is_an_error() {
        assert!(SyntheticTrainingData::new(1, 0.1).training_set(0).is_err());
    }
}

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::SourceError;
use crate::types::Reading;
use super::ReadingSource;

/// Stand-in for real sensors: uniform random values in plausible ranges
pub struct SimulatedSource {
    rng: StdRng,
}

impl SimulatedSource {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        Self { rng }
    }

    pub fn generate(&mut self, timestamp: DateTime<Utc>) -> Reading {
        Reading {
            timestamp,
            temperature: round2(self.rng.gen_range(50.0..=120.0)),
            vibration: round2(self.rng.gen_range(0.1..=2.0)),
            machine_age: self.rng.gen_range(1..=10) as f64,
            humidity: self.rng.gen_range(30..=70) as f64,
            rpm: self.rng.gen_range(1000..=5000) as f64,
            operating_hours: self.rng.gen_range(1000..=8000) as f64,
        }
    }
}

#[async_trait]
impl ReadingSource for SimulatedSource {
    fn name(&self) -> &str { "simulated" }

    async fn next_reading(&mut self) -> Result<Reading, SourceError> {
        Ok(self.generate(Utc::now()))
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

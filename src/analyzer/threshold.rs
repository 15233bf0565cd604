use crate::config::ThresholdConfig;
use crate::types::{Reading, ThresholdFlags};

/// Fixed-rule alert flags computed from the raw reading alone.
/// Never consults, and never feeds, the classifier.
#[derive(Debug, Clone)]
pub struct ThresholdEvaluator {
    thresholds: ThresholdConfig,
}

impl Default for ThresholdEvaluator {
    fn default() -> Self {
        Self::new(&ThresholdConfig::default())
    }
}

impl ThresholdEvaluator {
    pub fn new(config: &ThresholdConfig) -> Self {
        Self { thresholds: config.clone() }
    }

    pub fn evaluate(&self, reading: &Reading) -> ThresholdFlags {
        let t = &self.thresholds;
        let operating_hours_high = reading.operating_hours > t.operating_hours_high;

        ThresholdFlags {
            temperature_high: reading.temperature > t.temperature_high,
            vibration_high: reading.vibration > t.vibration_high,
            rpm_high: reading.rpm > t.rpm_high,
            humidity_low: reading.humidity < t.humidity_low,
            machine_age_high: reading.machine_age > t.machine_age_high && operating_hours_high,
            operating_hours_high,
        }
    }
}

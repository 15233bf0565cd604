pub mod analyzer;
pub mod config;
pub mod error;
pub mod model;
pub mod monitor;
pub mod publisher;
pub mod source;
pub mod storage;

/// Common types used across modules
pub mod types {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Serialize};
    use smallvec::SmallVec;

    /// Label reserved for the healthy condition
    pub const NORMAL: &str = "Normal";

    /// Number of numeric features a reading exposes to a classifier
    pub const FEATURE_COUNT: usize = 6;

    /// Feature names in the order `Reading::features` emits them
    pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
        "Temperature",
        "Vibration",
        "Machine_Age",
        "Humidity",
        "RPM",
        "Operating_Hours",
    ];

    /// One timestamped set of raw sensor values.
    ///
    /// Values are taken as-is; no physical range checks are applied.
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Reading {
        pub timestamp: DateTime<Utc>,
        /// Degrees Celsius
        pub temperature: f64,
        /// g-force
        pub vibration: f64,
        /// Years
        pub machine_age: f64,
        /// Percent
        pub humidity: f64,
        pub rpm: f64,
        pub operating_hours: f64,
    }

    impl Reading {
        pub fn features(&self) -> [f64; FEATURE_COUNT] {
            [
                self.temperature,
                self.vibration,
                self.machine_age,
                self.humidity,
                self.rpm,
                self.operating_hours,
            ]
        }

        pub fn from_features(timestamp: DateTime<Utc>, f: [f64; FEATURE_COUNT]) -> Self {
            Self {
                timestamp,
                temperature: f[0],
                vibration: f[1],
                machine_age: f[2],
                humidity: f[3],
                rpm: f[4],
                operating_hours: f[5],
            }
        }
    }

    /// A named condition class
    #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct Label(String);

    impl Label {
        pub fn new(name: impl Into<String>) -> Self {
            Self(name.into())
        }

        pub fn normal() -> Self {
            Self(NORMAL.to_string())
        }

        pub fn as_str(&self) -> &str {
            &self.0
        }

        pub fn is_normal(&self) -> bool {
            self.0 == NORMAL
        }
    }

    impl From<&str> for Label {
        fn from(s: &str) -> Self {
            Self(s.to_string())
        }
    }

    impl std::fmt::Display for Label {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str(&self.0)
        }
    }

    /// Labels reported for one tick, most probable first
    pub type Labels = SmallVec<[Label; 4]>;

    /// True when the labels are exactly `["Normal"]`
    pub fn is_all_normal(labels: &[Label]) -> bool {
        labels.len() == 1 && labels[0].is_normal()
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct ClassProbability {
        pub label: Label,
        pub probability: f64,
    }

    /// Per-label scores produced by a classifier, in the classifier's
    /// canonical label order.
    #[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct ClassProbabilities(Vec<ClassProbability>);

    impl ClassProbabilities {
        pub fn new(entries: impl IntoIterator<Item = (Label, f64)>) -> Self {
            Self(
                entries
                    .into_iter()
                    .map(|(label, probability)| ClassProbability { label, probability })
                    .collect(),
            )
        }

        pub fn iter(&self) -> std::slice::Iter<'_, ClassProbability> {
            self.0.iter()
        }

        pub fn get(&self, label: &str) -> Option<f64> {
            self.0
                .iter()
                .find(|p| p.label.as_str() == label)
                .map(|p| p.probability)
        }

        pub fn len(&self) -> usize {
            self.0.len()
        }

        pub fn is_empty(&self) -> bool {
            self.0.is_empty()
        }
    }

    impl<'a> IntoIterator for &'a ClassProbabilities {
        type Item = &'a ClassProbability;
        type IntoIter = std::slice::Iter<'a, ClassProbability>;

        fn into_iter(self) -> Self::IntoIter {
            self.0.iter()
        }
    }

    /// Trend data kept for every tick
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct TrendPoint {
        pub timestamp: DateTime<Utc>,
        pub temperature: f64,
        pub vibration: f64,
        pub rpm: f64,
    }

    impl From<&Reading> for TrendPoint {
        fn from(r: &Reading) -> Self {
            Self {
                timestamp: r.timestamp,
                temperature: r.temperature,
                vibration: r.vibration,
                rpm: r.rpm,
            }
        }
    }

    /// A non-Normal classification with the reading fields at detection time
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct AnomalyEvent {
        pub timestamp: DateTime<Utc>,
        pub label: Label,
        pub temperature: f64,
        pub vibration: f64,
        pub rpm: f64,
        pub humidity: f64,
    }

    impl AnomalyEvent {
        pub fn new(label: Label, reading: &Reading) -> Self {
            Self {
                timestamp: reading.timestamp,
                label,
                temperature: reading.temperature,
                vibration: reading.vibration,
                rpm: reading.rpm,
                humidity: reading.humidity,
            }
        }
    }

    /// Rule-based alert flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub enum Flag {
        TemperatureHigh,
        VibrationHigh,
        RpmHigh,
        HumidityLow,
        MachineAgeHigh,
        OperatingHoursHigh,
    }

    impl Flag {
        pub const ALL: [Flag; 6] = [
            Flag::TemperatureHigh,
            Flag::VibrationHigh,
            Flag::RpmHigh,
            Flag::HumidityLow,
            Flag::MachineAgeHigh,
            Flag::OperatingHoursHigh,
        ];
    }

    impl std::fmt::Display for Flag {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            let s = match self {
                Flag::TemperatureHigh => "temperature_high",
                Flag::VibrationHigh => "vibration_high",
                Flag::RpmHigh => "rpm_high",
                Flag::HumidityLow => "humidity_low",
                Flag::MachineAgeHigh => "machine_age_high",
                Flag::OperatingHoursHigh => "operating_hours_high",
            };
            write!(f, "{}", s)
        }
    }

    /// Threshold flags for one reading, one field per rule
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub struct ThresholdFlags {
        pub temperature_high: bool,
        pub vibration_high: bool,
        pub rpm_high: bool,
        pub humidity_low: bool,
        pub machine_age_high: bool,
        pub operating_hours_high: bool,
    }

    impl ThresholdFlags {
        pub fn get(&self, flag: Flag) -> bool {
            match flag {
                Flag::TemperatureHigh => self.temperature_high,
                Flag::VibrationHigh => self.vibration_high,
                Flag::RpmHigh => self.rpm_high,
                Flag::HumidityLow => self.humidity_low,
                Flag::MachineAgeHigh => self.machine_age_high,
                Flag::OperatingHoursHigh => self.operating_hours_high,
            }
        }

        pub fn raised(&self) -> impl Iterator<Item = Flag> + '_ {
            Flag::ALL.into_iter().filter(|f| self.get(*f))
        }

        pub fn any(&self) -> bool {
            self.raised().next().is_some()
        }
    }

    /// Overall condition of a tick
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub enum Status {
        Normal,
        Anomaly,
    }

    impl Status {
        pub fn from_labels(labels: &[Label]) -> Self {
            if is_all_normal(labels) {
                Status::Normal
            } else {
                Status::Anomaly
            }
        }
    }

    impl std::fmt::Display for Status {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Status::Normal => write!(f, "NORMAL"),
                Status::Anomaly => write!(f, "ANOMALY"),
            }
        }
    }

    /// How the running classifier came to be
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum ModelOrigin {
        Loaded,
        Bootstrapped,
    }

    impl std::fmt::Display for ModelOrigin {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                ModelOrigin::Loaded => write!(f, "loaded"),
                ModelOrigin::Bootstrapped => write!(f, "bootstrapped"),
            }
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct ModelInfo {
        pub name: String,
        pub origin: ModelOrigin,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct MachineInfo {
        pub machine_id: String,
        pub location: Option<String>,
    }

    /// Everything published for one tick.
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Snapshot {
        /// Count of successful ticks, starting at 1
        pub tick: u64,
        pub reading: Reading,
        pub labels: Labels,
        pub status: Status,
        pub probabilities: ClassProbabilities,
        pub flags: ThresholdFlags,
        /// Oldest first
        pub readings: Vec<TrendPoint>,
        /// Oldest first
        pub anomalies: Vec<AnomalyEvent>,
        pub model: ModelInfo,
        pub machine: MachineInfo,
    }

    impl Snapshot {
        /// Probabilities at or above `min`, in canonical label order
        pub fn notable_probabilities(&self, min: f64) -> Vec<&ClassProbability> {
            self.probabilities
                .iter()
                .filter(|p| p.probability >= min)
                .collect()
        }

        pub fn anomalies_newest_first(&self) -> impl Iterator<Item = &AnomalyEvent> {
            self.anomalies.iter().rev()
        }
    }
}

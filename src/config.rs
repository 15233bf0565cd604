use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Top-level configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub thresholds: ThresholdConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub publish: PublishConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AgentConfig {
    #[serde(default = "default_hostname")]
    pub machine_id: String,
    pub location: Option<String>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            machine_id: default_hostname(),
            location: None,
            log_level: default_log_level(),
        }
    }
}

/// Tick cadence and the tuning constants of the selector and history windows
#[derive(Debug, Deserialize, Clone)]
pub struct MonitorConfig {
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
    #[serde(default = "default_probability_threshold")]
    pub probability_threshold: f64,
    #[serde(default = "default_reading_window")]
    pub reading_window: usize,
    #[serde(default = "default_anomaly_window")]
    pub anomaly_window: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
            probability_threshold: default_probability_threshold(),
            reading_window: default_reading_window(),
            anomaly_window: default_anomaly_window(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ThresholdConfig {
    #[serde(default = "default_temperature_high")]
    pub temperature_high: f64,
    #[serde(default = "default_vibration_high")]
    pub vibration_high: f64,
    #[serde(default = "default_rpm_high")]
    pub rpm_high: f64,
    #[serde(default = "default_humidity_low")]
    pub humidity_low: f64,
    #[serde(default = "default_machine_age_high")]
    pub machine_age_high: f64,
    #[serde(default = "default_operating_hours_high")]
    pub operating_hours_high: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            temperature_high: 100.0,
            vibration_high: 1.5,
            rpm_high: 4500.0,
            humidity_low: 35.0,
            machine_age_high: 8.0,
            operating_hours_high: 7000.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    #[serde(default = "default_model_path")]
    pub path: PathBuf,
    #[serde(default = "default_true")]
    pub save_bootstrapped: bool,
    #[serde(default = "default_bootstrap_samples")]
    pub bootstrap_samples: usize,
    #[serde(default = "default_label_noise")]
    pub label_noise: f64,
    #[serde(default = "default_trees")]
    pub trees: usize,
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    #[serde(default = "default_min_samples_split")]
    pub min_samples_split: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: default_model_path(),
            save_bootstrapped: true,
            bootstrap_samples: default_bootstrap_samples(),
            label_noise: default_label_noise(),
            trees: default_trees(),
            max_depth: default_max_depth(),
            min_samples_split: default_min_samples_split(),
            seed: default_seed(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    Simulated,
    Replay,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    #[serde(default)]
    pub kind: SourceKind,
    pub seed: Option<u64>,
    pub replay_path: Option<PathBuf>,
    #[serde(default = "default_true")]
    pub replay_loop: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::Simulated,
            seed: None,
            replay_path: None,
            replay_loop: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PublishConfig {
    #[serde(default = "default_true")]
    pub log: bool,
    pub jsonl_path: Option<PathBuf>,
    #[serde(default)]
    pub webhook: Option<WebhookConfig>,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self { log: true, jsonl_path: None, webhook: None }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct WebhookConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub url: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default = "default_dedup_window")]
    pub dedup_window_secs: u64,
    #[serde(default = "default_rate_per_min")]
    pub rate_limit_per_minute: u32,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        // Expand environment variables
        let expanded = expand_env_vars(content)?;

        let config: Config = toml::from_str(&expanded)
            .with_context(|| "Failed to parse configuration")?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let m = &self.monitor;
        if m.interval_secs == 0 {
            bail!("monitor.interval_secs must be greater than zero");
        }
        if !(m.probability_threshold > 0.0 && m.probability_threshold <= 1.0) {
            bail!("monitor.probability_threshold must be in (0, 1], got {}", m.probability_threshold);
        }
        if m.reading_window == 0 || m.anomaly_window == 0 {
            bail!("monitor window capacities must be at least 1");
        }

        let t = &self.thresholds;
        for (name, value) in [
            ("temperature_high", t.temperature_high),
            ("vibration_high", t.vibration_high),
            ("rpm_high", t.rpm_high),
            ("humidity_low", t.humidity_low),
            ("machine_age_high", t.machine_age_high),
            ("operating_hours_high", t.operating_hours_high),
        ] {
            if !value.is_finite() {
                bail!("thresholds.{} must be a finite number, got {}", name, value);
            }
        }

        let model = &self.model;
        if !(0.0..=1.0).contains(&model.label_noise) {
            bail!("model.label_noise must be in [0, 1], got {}", model.label_noise);
        }
        if model.trees == 0 {
            bail!("model.trees must be at least 1");
        }
        if model.bootstrap_samples == 0 {
            bail!("model.bootstrap_samples must be at least 1");
        }

        if self.source.kind == SourceKind::Replay && self.source.replay_path.is_none() {
            bail!("source.replay_path is required for the replay source");
        }

        Ok(())
    }
}

/// Expand ${ENV_VAR} references in config string
fn expand_env_vars(input: &str) -> Result<String> {
    let re = regex::Regex::new(r"\$\{([^}]+)\}").context("invalid env pattern")?;
    Ok(re
        .replace_all(input, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_default()
        })
        .to_string())
}

// Default value functions
fn default_hostname() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}
fn default_log_level() -> String { "info".to_string() }
fn default_interval() -> u64 { 5 }
fn default_probability_threshold() -> f64 { 0.15 }
fn default_reading_window() -> usize { 15 }
fn default_anomaly_window() -> usize { 10 }
fn default_temperature_high() -> f64 { 100.0 }
fn default_vibration_high() -> f64 { 1.5 }
fn default_rpm_high() -> f64 { 4500.0 }
fn default_humidity_low() -> f64 { 35.0 }
fn default_machine_age_high() -> f64 { 8.0 }
fn default_operating_hours_high() -> f64 { 7000.0 }
fn default_model_path() -> PathBuf { PathBuf::from("machine_failure_model.json") }
fn default_true() -> bool { true }
fn default_bootstrap_samples() -> usize { 2000 }
fn default_label_noise() -> f64 { 0.15 }
fn default_trees() -> usize { 100 }
fn default_max_depth() -> usize { 12 }
fn default_min_samples_split() -> usize { 2 }
fn default_seed() -> u64 { 42 }
fn default_dedup_window() -> u64 { 300 }
fn default_rate_per_min() -> u32 { 10 }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.monitor.interval_secs, 5);
        assert_eq!(config.monitor.reading_window, 15);
        assert_eq!(config.monitor.anomaly_window, 10);
        assert!((config.monitor.probability_threshold - 0.15).abs() < f64::EPSILON);
        assert_eq!(config.thresholds.rpm_high, 4500.0);
        assert_eq!(config.model.trees, 100);
        assert_eq!(config.source.kind, SourceKind::Simulated);
        assert!(config.publish.log);
        assert!(config.publish.webhook.is_none());
    }

    #[test]
    fn sections_override_defaults() {
        let config = Config::parse(
            r#"
            [agent]
            machine_id = "press-07"
            location = "Line 2"

            [monitor]
            probability_threshold = 0.25
            reading_window = 30

            [source]
            kind = "replay"
            replay_path = "readings.jsonl"
            replay_loop = false

            [publish.webhook]
            url = "http://localhost:9000/hook"
            "#,
        )
        .unwrap();

        assert_eq!(config.agent.machine_id, "press-07");
        assert_eq!(config.agent.location.as_deref(), Some("Line 2"));
        assert_eq!(config.monitor.reading_window, 30);
        assert_eq!(config.monitor.anomaly_window, 10);
        assert_eq!(config.source.kind, SourceKind::Replay);
        assert!(!config.source.replay_loop);
        let webhook = config.publish.webhook.unwrap();
        assert!(webhook.enabled);
        assert_eq!(webhook.dedup_window_secs, 300);
    }

    #[test]
    fn env_vars_are_expanded() {
        std::env::set_var("EQUIPMENT_MONITOR_TEST_MACHINE", "lathe-3");
        let config = Config::parse(
            "[agent]\nmachine_id = \"${EQUIPMENT_MONITOR_TEST_MACHINE}\"\n",
        )
        .unwrap();
        assert_eq!(config.agent.machine_id, "lathe-3");
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(Config::parse("[monitor]\nreading_window = 0\n").is_err());
        assert!(Config::parse("[monitor]\nprobability_threshold = 1.5\n").is_err());
        assert!(Config::parse("[monitor]\ninterval_secs = 0\n").is_err());
        assert!(Config::parse("[model]\nlabel_noise = -0.1\n").is_err());
        assert!(Config::parse("[model]\ntrees = 0\n").is_err());
        assert!(Config::parse("[source]\nkind = \"replay\"\n").is_err());
    }

    #[test]
    fn rejects_non_finite_thresholds() {
        assert!(Config::parse("[thresholds]\ntemperature_high = nan\n").is_err());
        assert!(Config::parse("[thresholds]\nhumidity_low = -inf\n").is_err());
        assert!(Config::parse("[thresholds]\noperating_hours_high = inf\n").is_err());
        assert!(Config::parse("[thresholds]\nrpm_high = 5000.0\n").is_ok());
    }
}

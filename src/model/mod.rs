pub mod bootstrap;
pub mod forest;

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

use crate::config::ModelConfig;
use crate::error::ModelError;
use crate::types::{ClassProbabilities, Label, ModelInfo, ModelOrigin, Reading, FEATURE_COUNT, FEATURE_NAMES};
use forest::{ForestParams, RandomForest};

/// Maps a reading to a probability per label.
///
/// Implementations are deterministic for a fixed model and input, and the
/// label set never changes after construction.
pub trait Classifier: Send + Sync {
    /// Human-readable model name
    fn name(&self) -> &str;

    /// The fixed label set, in canonical order
    fn labels(&self) -> &[Label];

    /// Score a reading against every label
    fn predict(&self, reading: &Reading) -> Result<ClassProbabilities, ModelError>;
}

/// One labelled feature vector. `label` indexes into `TrainingSet::labels`.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSample {
    pub features: [f64; FEATURE_COUNT],
    pub label: usize,
}

#[derive(Debug, Clone, Default)]
pub struct TrainingSet {
    pub labels: Vec<Label>,
    pub samples: Vec<TrainingSample>,
}

/// Supplies labelled data for building a classifier when no artifact exists.
/// Only consulted during startup.
pub trait TrainingDataProvider: Send {
    fn name(&self) -> &str;

    fn training_set(&mut self, count: usize) -> Result<TrainingSet, ModelError>;
}

/// A ready classifier and how it was obtained
pub struct LoadedModel {
    pub classifier: Box<dyn Classifier>,
    pub origin: ModelOrigin,
}

impl LoadedModel {
    pub fn info(&self) -> ModelInfo {
        ModelInfo {
            name: self.classifier.name().to_string(),
            origin: self.origin,
        }
    }
}

impl std::fmt::Debug for LoadedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedModel")
            .field("name", &self.classifier.name())
            .field("labels", &self.classifier.labels())
            .field("origin", &self.origin)
            .finish()
    }
}

/// On-disk model format. The model's own fields (`labels`, `forest`) sit
/// at the top level next to the header.
#[derive(Serialize, Deserialize)]
struct ModelArtifact<M> {
    format_version: u32,
    model_name: String,
    feature_names: Vec<String>,
    #[serde(flatten)]
    model: M,
}

const FORMAT_VERSION: u32 = 1;

pub fn load_artifact(path: &Path) -> Result<RandomForest, ModelError> {
    let content = std::fs::read_to_string(path).map_err(|source| ModelError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let artifact: ModelArtifact<RandomForest> =
        serde_json::from_str(&content).map_err(|source| ModelError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

    if artifact.format_version != FORMAT_VERSION {
        return Err(ModelError::Invalid(format!(
            "unsupported format version {}",
            artifact.format_version
        )));
    }
    if artifact.feature_names.iter().map(String::as_str).ne(FEATURE_NAMES) {
        return Err(ModelError::Invalid(format!(
            "feature mismatch: {:?}",
            artifact.feature_names
        )));
    }
    artifact.model.validate()?;
    Ok(artifact.model)
}

pub fn save_artifact(model: &RandomForest, path: &Path) -> Result<(), ModelError> {
    let artifact = ModelArtifact {
        format_version: FORMAT_VERSION,
        model_name: RandomForest::NAME.to_string(),
        feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
        model,
    };
    let json = serde_json::to_string(&artifact).map_err(ModelError::Serialize)?;

    let io_err = |source| ModelError::Io { path: path.to_path_buf(), source };
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(io_err)?;
    }
    // write then rename so a crash never leaves a truncated artifact behind
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, json).map_err(io_err)?;
    std::fs::rename(&tmp, path).map_err(io_err)?;
    Ok(())
}

/// Two-step classifier initialization: load the artifact at `config.path`,
/// or, if that fails for any reason, train a forest from `provider`.
/// Blocks for the duration of training.
pub fn load_or_bootstrap(
    config: &ModelConfig,
    provider: &mut dyn TrainingDataProvider,
) -> Result<LoadedModel, ModelError> {
    match load_artifact(&config.path) {
        Ok(forest) => {
            info!(
                path = %config.path.display(),
                trees = forest.tree_count(),
                labels = forest.labels().len(),
                "Loaded classifier"
            );
            Ok(LoadedModel { classifier: Box::new(forest), origin: ModelOrigin::Loaded })
        }
        Err(e) => {
            warn!(
                path = %config.path.display(),
                error = %e,
                provider = provider.name(),
                "Classifier artifact unavailable, bootstrapping from training data"
            );

            let training = provider.training_set(config.bootstrap_samples)?;
            let forest = RandomForest::fit(&training, &ForestParams::from(config))?;
            info!(
                samples = training.samples.len(),
                trees = forest.tree_count(),
                "Bootstrapped classifier"
            );

            if config.save_bootstrapped {
                match save_artifact(&forest, &config.path) {
                    Ok(()) => info!(path = %config.path.display(), "Saved bootstrapped classifier"),
                    Err(e) => warn!(error = %e, "Failed to save bootstrapped classifier"),
                }
            }

            Ok(LoadedModel { classifier: Box::new(forest), origin: ModelOrigin::Bootstrapped })
        }
    }
}

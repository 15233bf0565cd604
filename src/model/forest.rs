use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::types::{ClassProbabilities, Label, Reading, FEATURE_COUNT};
use super::{Classifier, TrainingSet};

/// Growth parameters for a forest
#[derive(Debug, Clone)]
pub struct ForestParams {
    pub trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self { trees: 100, max_depth: 12, min_samples_split: 2, seed: 42 }
    }
}

impl From<&crate::config::ModelConfig> for ForestParams {
    fn from(c: &crate::config::ModelConfig) -> Self {
        Self {
            trees: c.trees,
            max_depth: c.max_depth,
            min_samples_split: c.min_samples_split,
            seed: c.seed,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        distribution: Vec<f64>,
    },
}

const LEAF_SUM_TOLERANCE: f64 = 1e-6;

/// CART tree stored as a flat node list with the root at index 0.
/// Children always sit after their parent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
}

impl DecisionTree {
    fn leaf_distribution(&self, features: &[f64; FEATURE_COUNT]) -> Result<&[f64], ModelError> {
        let mut idx = 0;
        loop {
            match self.nodes.get(idx) {
                Some(Node::Split { feature, threshold, left, right }) => {
                    idx = if features[*feature] <= *threshold { *left } else { *right };
                }
                Some(Node::Leaf { distribution }) => return Ok(distribution),
                None => return Err(ModelError::Invalid(format!("dangling node index {}", idx))),
            }
        }
    }

    fn validate(&self, classes: usize) -> Result<(), ModelError> {
        if self.nodes.is_empty() {
            return Err(ModelError::Invalid("empty tree".into()));
        }
        for (i, node) in self.nodes.iter().enumerate() {
            match node {
                Node::Split { feature, threshold, left, right } => {
                    if *feature >= FEATURE_COUNT || !threshold.is_finite() {
                        return Err(ModelError::Invalid(format!("bad split at node {}", i)));
                    }
                    // forward-only links keep traversal acyclic
                    if *left <= i || *right <= i || *left >= self.nodes.len() || *right >= self.nodes.len() {
                        return Err(ModelError::Invalid(format!("bad child link at node {}", i)));
                    }
                }
                Node::Leaf { distribution } => {
                    if distribution.len() != classes {
                        return Err(ModelError::Invalid(format!(
                            "leaf {} has {} classes, expected {}",
                            i,
                            distribution.len(),
                            classes
                        )));
                    }
                    if distribution.iter().any(|p| !(0.0..=1.0).contains(p)) {
                        return Err(ModelError::Invalid(format!("leaf {} has a value outside [0, 1]", i)));
                    }
                    let total: f64 = distribution.iter().sum();
                    if (total - 1.0).abs() > LEAF_SUM_TOLERANCE {
                        return Err(ModelError::Invalid(format!("leaf {} sums to {}", i, total)));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Bagged ensemble of CART trees. Class probabilities are the mean of the
/// leaf distributions each tree reaches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    labels: Vec<Label>,
    #[serde(rename = "forest")]
    trees: Vec<DecisionTree>,
}

impl RandomForest {
    pub const NAME: &'static str = "RandomForest Classifier";

    pub fn fit(training: &TrainingSet, params: &ForestParams) -> Result<Self, ModelError> {
        let classes = training.labels.len();
        if classes == 0 {
            return Err(ModelError::Training("empty label set".into()));
        }
        if training.samples.is_empty() {
            return Err(ModelError::Training("no training samples".into()));
        }
        if params.trees == 0 {
            return Err(ModelError::Training("forest needs at least one tree".into()));
        }
        if let Some(s) = training.samples.iter().find(|s| s.label >= classes) {
            return Err(ModelError::Training(format!("label index {} out of range", s.label)));
        }
        if training.samples.iter().any(|s| s.features.iter().any(|v| !v.is_finite())) {
            return Err(ModelError::Training("non-finite feature value".into()));
        }

        let mut rng = StdRng::seed_from_u64(params.seed);
        let n = training.samples.len();
        let mut trees = Vec::with_capacity(params.trees);

        for _ in 0..params.trees {
            let resample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
            let mut grower = TreeGrower {
                training,
                classes,
                params,
                rng: &mut rng,
                nodes: Vec::new(),
            };
            grower.grow(resample, 0);
            trees.push(DecisionTree { nodes: grower.nodes });
        }

        tracing::debug!(trees = trees.len(), samples = n, classes, "Forest trained");
        Ok(Self { labels: training.labels.clone(), trees })
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    /// Structural checks for a deserialized forest
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.labels.is_empty() {
            return Err(ModelError::Invalid("empty label set".into()));
        }
        if !self.labels.iter().any(Label::is_normal) {
            return Err(ModelError::Invalid("label set lacks \"Normal\"".into()));
        }
        let mut seen = std::collections::HashSet::new();
        if let Some(dup) = self.labels.iter().find(|l| !seen.insert(l.as_str())) {
            return Err(ModelError::Invalid(format!("duplicate label {:?}", dup.as_str())));
        }
        if self.trees.is_empty() {
            return Err(ModelError::Invalid("forest has no trees".into()));
        }
        for tree in &self.trees {
            tree.validate(self.labels.len())?;
        }
        Ok(())
    }
}

impl Classifier for RandomForest {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn labels(&self) -> &[Label] {
        &self.labels
    }

    fn predict(&self, reading: &Reading) -> Result<ClassProbabilities, ModelError> {
        let features = reading.features();
        if let Some(v) = features.iter().find(|v| !v.is_finite()) {
            return Err(ModelError::MalformedInput(format!("non-finite feature value {}", v)));
        }
        if self.trees.is_empty() {
            return Err(ModelError::Invalid("forest has no trees".into()));
        }

        let mut sums = vec![0.0; self.labels.len()];
        for tree in &self.trees {
            let dist = tree.leaf_distribution(&features)?;
            for (sum, p) in sums.iter_mut().zip(dist) {
                *sum += p;
            }
        }

        let count = self.trees.len() as f64;
        Ok(ClassProbabilities::new(
            self.labels.iter().cloned().zip(sums.into_iter().map(|s| s / count)),
        ))
    }
}

struct TreeGrower<'a> {
    training: &'a TrainingSet,
    classes: usize,
    params: &'a ForestParams,
    rng: &'a mut StdRng,
    nodes: Vec<Node>,
}

impl TreeGrower<'_> {
    /// Grow the subtree for `indices`, returning its node index
    fn grow(&mut self, indices: Vec<usize>, depth: usize) -> usize {
        let counts = self.class_counts(&indices);
        let id = self.nodes.len();

        let pure = counts.iter().filter(|&&c| c > 0).count() <= 1;
        if pure || depth >= self.params.max_depth || indices.len() < self.params.min_samples_split.max(2) {
            self.nodes.push(leaf(&counts, indices.len()));
            return id;
        }

        let Some((feature, threshold)) = self.best_split(&indices, gini(&counts, indices.len())) else {
            self.nodes.push(leaf(&counts, indices.len()));
            return id;
        };

        // reserve the slot; replaced once both children exist
        self.nodes.push(leaf(&counts, indices.len()));

        let (lo, hi): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| self.training.samples[i].features[feature] <= threshold);

        let left = self.grow(lo, depth + 1);
        let right = self.grow(hi, depth + 1);
        self.nodes[id] = Node::Split { feature, threshold, left, right };
        id
    }

    fn class_counts(&self, indices: &[usize]) -> Vec<usize> {
        let mut counts = vec![0; self.classes];
        for &i in indices {
            counts[self.training.samples[i].label] += 1;
        }
        counts
    }

    /// Lowest weighted-Gini split over a random subset of features. Falls
    /// through to the remaining features when the subset has no valid split.
    fn best_split(&mut self, indices: &[usize], parent_impurity: f64) -> Option<(usize, f64)> {
        let mut features: Vec<usize> = (0..FEATURE_COUNT).collect();
        features.shuffle(&mut *self.rng);
        let mtry = (FEATURE_COUNT as f64).sqrt().ceil() as usize;

        let mut best: Option<(f64, usize, f64)> = None;
        for (k, &feature) in features.iter().enumerate() {
            if k >= mtry && best.is_some() {
                break;
            }
            if let Some((impurity, threshold)) = self.best_threshold(indices, feature) {
                if impurity < parent_impurity - 1e-12 && best.map_or(true, |(b, _, _)| impurity < b) {
                    best = Some((impurity, feature, threshold));
                }
            }
        }
        best.map(|(_, feature, threshold)| (feature, threshold))
    }

    fn best_threshold(&self, indices: &[usize], feature: usize) -> Option<(f64, f64)> {
        let samples = &self.training.samples;
        let mut column: Vec<(f64, usize)> = indices
            .iter()
            .map(|&i| (samples[i].features[feature], samples[i].label))
            .collect();
        column.sort_by(|a, b| a.0.total_cmp(&b.0));

        let n = column.len();
        let mut right = vec![0usize; self.classes];
        for &(_, label) in &column {
            right[label] += 1;
        }
        let mut left = vec![0usize; self.classes];

        let mut best: Option<(f64, f64)> = None;
        for i in 0..n.saturating_sub(1) {
            let (value, label) = column[i];
            left[label] += 1;
            right[label] -= 1;

            let next = column[i + 1].0;
            if next <= value {
                continue;
            }
            let nl = i + 1;
            let nr = n - nl;
            let impurity = (nl as f64 * gini(&left, nl) + nr as f64 * gini(&right, nr)) / n as f64;
            if best.map_or(true, |(b, _)| impurity < b) {
                // adjacent floats can round the midpoint up onto `next`
                let mid = value + (next - value) / 2.0;
                best = Some((impurity, if mid < next { mid } else { value }));
            }
        }
        best
    }
}

fn gini(counts: &[usize], total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let t = total as f64;
    1.0 - counts.iter().map(|&c| (c as f64 / t).powi(2)).sum::<f64>()
}

fn leaf(counts: &[usize], total: usize) -> Node {
    let t = total.max(1) as f64;
    Node::Leaf {
        distribution: counts.iter().map(|&c| c as f64 / t).collect(),
    }
}

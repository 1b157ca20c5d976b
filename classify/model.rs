use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;

// --- Public Data Structures ---
// These structs define the public, human-readable format of a trained disease
// classifier when serialized to a TOML file.

/// One node of a decision tree, stored in a flat array. Children are indices
/// into the same array.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum TreeNode {
    /// Samples with `features[feature] <= threshold` go left.
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    /// Fraction of positive training samples that reached this leaf.
    Leaf { probability: f64 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    /// Node 0 is the root.
    pub nodes: Vec<TreeNode>,
}

/// The inference structure of a classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClassifierKind {
    /// Logistic regression. One coefficient per feature, in schema order.
    Logistic {
        intercept: f64,
        coefficients: Array1<f64>,
    },
    /// A bagged ensemble of decision trees. The positive-class probability is
    /// the mean of the leaf probabilities reached in each tree.
    Forest { trees: Vec<DecisionTree> },
}

/// The top-level, self-contained, trained classifier artifact for one disease.
/// This is the structure that gets saved to and loaded from a file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainedClassifier {
    /// The training-time column set, in training-time order. Feature vectors
    /// passed to `predict_proba` must follow exactly this order.
    pub feature_names: Vec<String>,
    pub model: ClassifierKind,
}

/// Custom error type for classifier loading, saving, and inference.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Failed to read or write classifier file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML classifier file: {0}")]
    TomlParseError(#[from] toml::de::Error),
    #[error("Failed to serialize classifier to TOML format: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),
    #[error("Feature vector has {found} columns, but the classifier was trained on {expected}.")]
    FeatureCountMismatch { found: usize, expected: usize },
    #[error("Feature '{0}' is not a finite number.")]
    NonFiniteFeature(String),
    #[error("Classifier produced an invalid probability: {0}")]
    InvalidProbability(f64),
    #[error("Classifier artifact is malformed: {0}")]
    MalformedArtifact(String),
}

/// A trained binary classifier consuming a fixed, ordered feature schema.
///
/// This is the seam between the scoring pipeline and the model artifacts. Any
/// implementation must be callable concurrently from many requests.
pub trait RiskClassifier: Send + Sync {
    /// The training-time feature names, in training-time order.
    fn feature_names(&self) -> &[String];

    /// Returns the positive-class probability for one feature vector laid out
    /// in `feature_names` order.
    fn predict_proba(&self, features: ArrayView1<f64>) -> Result<f64, ModelError>;
}

impl TrainedClassifier {
    /// Saves the classifier to a file in a human-readable TOML format.
    pub fn save(&self, path: &Path) -> Result<(), ModelError> {
        let toml_string = toml::to_string_pretty(self)?;
        let mut file = BufWriter::new(fs::File::create(path)?);
        file.write_all(toml_string.as_bytes())?;
        Ok(())
    }

    /// Loads a classifier from a TOML file and checks its internal consistency.
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let toml_string = fs::read_to_string(path)?;
        let classifier: Self = toml::from_str(&toml_string)?;
        classifier.validate()?;
        Ok(classifier)
    }

    /// Checks that every index in the artifact refers to something that exists.
    pub fn validate(&self) -> Result<(), ModelError> {
        let n_features = self.feature_names.len();
        match &self.model {
            ClassifierKind::Logistic {
                intercept,
                coefficients,
            } => {
                if coefficients.len() != n_features {
                    return Err(ModelError::MalformedArtifact(format!(
                        "{} coefficients for {} features",
                        coefficients.len(),
                        n_features
                    )));
                }
                if !intercept.is_finite() || coefficients.iter().any(|c| !c.is_finite()) {
                    return Err(ModelError::MalformedArtifact(
                        "non-finite logistic coefficient".to_string(),
                    ));
                }
            }
            ClassifierKind::Forest { trees } => {
                if trees.is_empty() {
                    return Err(ModelError::MalformedArtifact(
                        "forest contains no trees".to_string(),
                    ));
                }
                for (tree_idx, tree) in trees.iter().enumerate() {
                    internal::validate_tree(tree, n_features)
                        .map_err(|msg| ModelError::MalformedArtifact(format!("tree {tree_idx}: {msg}")))?;
                }
            }
        }
        Ok(())
    }
}

impl RiskClassifier for TrainedClassifier {
    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn predict_proba(&self, features: ArrayView1<f64>) -> Result<f64, ModelError> {
        // --- 1. Validate Inputs ---
        if features.len() != self.feature_names.len() {
            return Err(ModelError::FeatureCountMismatch {
                found: features.len(),
                expected: self.feature_names.len(),
            });
        }
        if let Some(idx) = features.iter().position(|x| !x.is_finite()) {
            return Err(ModelError::NonFiniteFeature(self.feature_names[idx].clone()));
        }

        // --- 2. Evaluate ---
        let probability = match &self.model {
            ClassifierKind::Logistic {
                intercept,
                coefficients,
            } => {
                let eta = features.dot(coefficients) + intercept;
                // Clamp eta to prevent overflow in exp().
                let eta = eta.clamp(-700.0, 700.0);
                1.0 / (1.0 + f64::exp(-eta))
            }
            ClassifierKind::Forest { trees } => {
                let mut total = 0.0;
                for tree in trees {
                    total += internal::leaf_probability(tree, features)?;
                }
                total / trees.len() as f64
            }
        };

        if !probability.is_finite() || !(0.0..=1.0).contains(&probability) {
            return Err(ModelError::InvalidProbability(probability));
        }
        Ok(probability)
    }
}

/// Internal module for tree traversal details.
mod internal {
    use super::*;

    pub(super) fn validate_tree(tree: &DecisionTree, n_features: usize) -> Result<(), String> {
        if tree.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }
        for (idx, node) in tree.nodes.iter().enumerate() {
            match *node {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if feature >= n_features {
                        return Err(format!(
                            "node {idx} splits on feature {feature}, but only {n_features} exist"
                        ));
                    }
                    if !threshold.is_finite() {
                        return Err(format!("node {idx} has a non-finite threshold"));
                    }
                    // Children must come after their parent, which also rules out cycles.
                    for child in [left, right] {
                        if child <= idx || child >= tree.nodes.len() {
                            return Err(format!("node {idx} has invalid child index {child}"));
                        }
                    }
                }
                TreeNode::Leaf { probability } => {
                    if !(0.0..=1.0).contains(&probability) {
                        return Err(format!("leaf {idx} has probability {probability}"));
                    }
                }
            }
        }
        Ok(())
    }

    pub(super) fn leaf_probability(
        tree: &DecisionTree,
        features: ArrayView1<f64>,
    ) -> Result<f64, ModelError> {
        let mut idx = 0;
        // Child indices strictly increase, so the walk is bounded by the node count.
        for _ in 0..tree.nodes.len() {
            match tree.nodes.get(idx) {
                Some(TreeNode::Leaf { probability }) => return Ok(*probability),
                Some(TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let value = features.get(*feature).copied().ok_or_else(|| {
                        ModelError::MalformedArtifact(format!(
                            "split on missing feature index {feature}"
                        ))
                    })?;
                    idx = if value <= *threshold { *left } else { *right };
                }
                None => {
                    return Err(ModelError::MalformedArtifact(format!(
                        "node index {idx} out of range"
                    )));
                }
            }
        }
        Err(ModelError::MalformedArtifact(
            "tree walk did not reach a leaf".to_string(),
        ))
    }
}

//! Disease risk evaluation: one trained classifier per disease, loaded once.

use super::features::FeatureFrame;
use super::model::{ModelError, RiskClassifier, TrainedClassifier};
use crate::types::{DiseaseResult, RiskTier};
use std::path::Path;

/// Probabilities strictly above this are high risk.
pub const HIGH_RISK_THRESHOLD: f64 = 0.7;
/// Probabilities strictly above this (and not high) are intermediate risk.
pub const INTERMEDIATE_RISK_THRESHOLD: f64 = 0.4;

/// The diseases the portal screens for, in report order.
pub const DEFAULT_DISEASES: [&str; 4] = ["Obesity", "Hypertension", "Diabetes", "HeartDisease"];

impl RiskTier {
    pub fn from_probability(probability: f64) -> Self {
        if probability > HIGH_RISK_THRESHOLD {
            RiskTier::High
        } else if probability > INTERMEDIATE_RISK_THRESHOLD {
            RiskTier::Intermediate
        } else {
            RiskTier::Low
        }
    }
}

/// Runs one disease classifier over a request's features.
pub fn evaluate(
    disease: &str,
    classifier: &dyn RiskClassifier,
    frame: &FeatureFrame,
) -> Result<DiseaseResult, ModelError> {
    let x = frame.align(classifier.feature_names());
    let probability = classifier.predict_proba(x.view())?;
    log::debug!("{disease}: positive-class probability {probability:.4}");
    Ok(DiseaseResult::new(disease, probability))
}

/// The disease classifiers, in report order. Immutable once built.
pub struct ModelSet {
    models: Vec<(String, Box<dyn RiskClassifier>)>,
}

impl ModelSet {
    pub fn new() -> Self {
        Self { models: Vec::new() }
    }

    /// Appends a classifier. Diseases are evaluated in insertion order.
    pub fn with(mut self, disease: impl Into<String>, classifier: impl RiskClassifier + 'static) -> Self {
        self.models.push((disease.into(), Box::new(classifier)));
        self
    }

    /// Loads `<directory>/<Disease>_model.toml` for each disease, in the given order.
    pub fn load<S: AsRef<str>>(directory: &Path, diseases: &[S]) -> Result<Self, ModelError> {
        let mut set = Self::new();
        for disease in diseases {
            let disease = disease.as_ref();
            let path = directory.join(format!("{disease}_model.toml"));
            log::info!("Loading {disease} classifier from: {}", path.display());
            let classifier = TrainedClassifier::load(&path)?;
            log::info!(
                "{disease} classifier expects {} features",
                classifier.feature_names.len()
            );
            set = set.with(disease, classifier);
        }
        Ok(set)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &dyn RiskClassifier)> {
        self.models
            .iter()
            .map(|(name, classifier)| (name.as_str(), classifier.as_ref()))
    }
}

impl Default for ModelSet {
    fn default() -> Self {
        Self::new()
    }
}

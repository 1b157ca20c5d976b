//! # Precaution Knowledge Base
//!
//! Static reference data mapping a trigger to diet, exercise and habit
//! recommendations. Two kinds of trigger exist: a metric classified with a
//! particular status, and a disease assessed as high risk. Both resolve
//! through one `PrecautionKey` lookup into the same `PrecautionSet` fragment
//! type, so consumers never inspect the shape of an entry.
//!
//! The built-in table is embedded at compile time and parsed once at startup.
//! Deployments may replace it with a file in the same TOML format.

use crate::types::{MetricKind, PrecautionSet, Status};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

const BUILTIN_TABLE: &str = include_str!("data/precautions.toml");

/// What triggers a precaution fragment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PrecautionKey {
    /// A metric classified with this status. The status carries its metric.
    Metric(Status),
    /// A disease, by name, assessed as high risk.
    Disease(String),
}

#[derive(Error, Debug)]
pub enum KnowledgeError {
    #[error("Failed to read precaution table: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML precaution table: {0}")]
    TomlParseError(#[from] toml::de::Error),
    #[error("Precaution table names an unknown metric '{0}'.")]
    UnknownMetric(String),
    #[error("Precaution table names status '{status}', which metric '{metric}' never produces.")]
    UnknownStatus { metric: MetricKind, status: String },
    #[error("Precaution table defines {0} more than once.")]
    DuplicateEntry(String),
}

/// The immutable precaution lookup table.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeBase {
    entries: HashMap<PrecautionKey, PrecautionSet>,
}

// --- On-disk format ---

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct TableFile {
    #[serde(default)]
    metric: Vec<MetricEntry>,
    #[serde(default)]
    disease: Vec<DiseaseEntry>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct MetricEntry {
    metric: String,
    status: String,
    #[serde(default)]
    diet: Vec<String>,
    #[serde(default)]
    exercise: Vec<String>,
    #[serde(default)]
    habit: Vec<String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct DiseaseEntry {
    disease: String,
    #[serde(default)]
    diet: Vec<String>,
    #[serde(default)]
    exercise: Vec<String>,
    #[serde(default)]
    habit: Vec<String>,
}

impl KnowledgeBase {
    /// The precaution table shipped with the engine.
    pub fn builtin() -> Result<Self, KnowledgeError> {
        Self::from_toml_str(BUILTIN_TABLE)
    }

    /// Loads a replacement table from a TOML file.
    pub fn load(path: &Path) -> Result<Self, KnowledgeError> {
        log::info!("Loading precaution table from: {}", path.display());
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, KnowledgeError> {
        let file: TableFile = toml::from_str(text)?;
        let mut entries = HashMap::with_capacity(file.metric.len() + file.disease.len());

        for entry in file.metric {
            let metric = MetricKind::from_name(&entry.metric)
                .ok_or_else(|| KnowledgeError::UnknownMetric(entry.metric.clone()))?;
            let status = Status::parse(metric, &entry.status).ok_or_else(|| {
                KnowledgeError::UnknownStatus {
                    metric,
                    status: entry.status.clone(),
                }
            })?;
            let fragment = PrecautionSet {
                diet: entry.diet,
                exercise: entry.exercise,
                habit: entry.habit,
            };
            if entries
                .insert(PrecautionKey::Metric(status), fragment)
                .is_some()
            {
                return Err(KnowledgeError::DuplicateEntry(format!(
                    "{metric} status '{status}'"
                )));
            }
        }

        for entry in file.disease {
            let fragment = PrecautionSet {
                diet: entry.diet,
                exercise: entry.exercise,
                habit: entry.habit,
            };
            let description = format!("disease '{}'", entry.disease);
            if entries
                .insert(PrecautionKey::Disease(entry.disease), fragment)
                .is_some()
            {
                return Err(KnowledgeError::DuplicateEntry(description));
            }
        }

        log::debug!("Precaution table holds {} entries", entries.len());
        Ok(Self { entries })
    }

    pub fn lookup(&self, key: &PrecautionKey) -> Option<&PrecautionSet> {
        self.entries.get(key)
    }

    pub fn for_status(&self, status: Status) -> Option<&PrecautionSet> {
        self.lookup(&PrecautionKey::Metric(status))
    }

    pub fn for_disease(&self, disease: &str) -> Option<&PrecautionSet> {
        self.lookup(&PrecautionKey::Disease(disease.to_string()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

//! Engine configuration, read from a TOML file. Every field has a default, so
//! an empty file (or no file at all) describes the stock deployment:
//!
//! ```toml
//! [models]
//! directory = "models"
//! diseases = ["Obesity", "Hypertension", "Diabetes", "HeartDisease"]
//!
//! [precautions]
//! # path = "precautions.toml"   # replaces the built-in table
//!
//! [records]
//! path = "analyses.jsonl"
//! ```
//!
//! Relative paths are resolved against the directory containing the config file.

use crate::classify::model::ModelError;
use crate::classify::risk::{DEFAULT_DISEASES, ModelSet};
use crate::knowledge::{KnowledgeBase, KnowledgeError};
use crate::pipeline::ScoringPipeline;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file '{path}': {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse TOML configuration: {0}")]
    TomlParseError(#[from] toml::de::Error),
    #[error("Failed to load disease classifiers: {0}")]
    Model(#[from] ModelError),
    #[error("Failed to load precaution table: {0}")]
    Knowledge(#[from] KnowledgeError),
    #[error("The configuration lists no diseases to screen for.")]
    NoDiseases,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelsConfig {
    /// Directory holding one `<Disease>_model.toml` per disease.
    pub directory: PathBuf,
    /// Diseases to screen for, in report order.
    pub diseases: Vec<String>,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("models"),
            diseases: DEFAULT_DISEASES.iter().map(|d| d.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PrecautionsConfig {
    /// Replacement precaution table. The built-in table is used when unset.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RecordsConfig {
    /// JSON-lines file that analysis records are appended to.
    pub path: PathBuf,
}

impl Default for RecordsConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("analyses.jsonl"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub models: ModelsConfig,
    pub precautions: PrecautionsConfig,
    pub records: RecordsConfig,
}

impl EngineConfig {
    /// Reads a config file and anchors its relative paths at the file's directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::IoError {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Self = toml::from_str(&text)?;
        if let Some(base) = path.parent() {
            config.rebase(base);
        }
        Ok(config)
    }

    fn rebase(&mut self, base: &Path) {
        let anchor = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        anchor(&mut self.models.directory);
        if let Some(path) = self.precautions.path.as_mut() {
            anchor(path);
        }
        anchor(&mut self.records.path);
    }

    /// Loads the classifiers and the precaution table, once, into a pipeline.
    pub fn build_pipeline(&self) -> Result<ScoringPipeline, ConfigError> {
        if self.models.diseases.is_empty() {
            return Err(ConfigError::NoDiseases);
        }
        let models = ModelSet::load(&self.models.directory, self.models.diseases.as_slice())?;
        let knowledge = match &self.precautions.path {
            Some(path) => KnowledgeBase::load(path)?,
            None => KnowledgeBase::builtin()?,
        };
        log::info!(
            "Scoring pipeline ready: {} classifiers, {} precaution entries",
            models.len(),
            knowledge.len()
        );
        Ok(ScoringPipeline::new(models, knowledge))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn empty_file_yields_defaults() {
        let config: EngineConfig = toml::from_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(
            config.models.diseases,
            vec!["Obesity", "Hypertension", "Diabetes", "HeartDisease"]
        );
    }

    #[test]
    fn relative_paths_follow_the_config_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("lifescreen.toml");
        fs::write(
            &path,
            "[models]\ndirectory = \"artifacts\"\ndiseases = [\"Diabetes\"]\n\n[records]\npath = \"/var/lib/analyses.jsonl\"\n",
        )
        .unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.models.directory, dir.path().join("artifacts"));
        assert_eq!(config.models.diseases, vec!["Diabetes"]);
        assert_eq!(config.records.path, PathBuf::from("/var/lib/analyses.jsonl"));
        assert_eq!(config.precautions.path, None);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(toml::from_str::<EngineConfig>("[models]\ndirectroy = \"x\"\n").is_err());
    }

    #[test]
    fn empty_disease_list_cannot_build() {
        let mut config = EngineConfig::default();
        config.models.diseases.clear();
        assert!(matches!(
            config.build_pipeline(),
            Err(ConfigError::NoDiseases)
        ));
    }
}

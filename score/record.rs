//! # Analysis Records
//!
//! The persisted unit of one screening: who was screened, the classified
//! metrics, the disease results, the precautions, and when. A record is built
//! once from a report and never updated.
//!
//! `RecordLog` keeps records as JSON lines in a single append-only file and
//! answers the two read paths the portal needs: a user's full history (newest
//! first) and their latest analysis.

use crate::pipeline::ScoreReport;
use crate::types::{DiseaseResult, Metric, PrecautionSet};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecordError {
    #[error("Failed to access record log '{path}': {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Record log '{path}' line {line} is not a valid analysis record: {source}")]
    Corrupt {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to encode analysis record: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub user_id: String,
    pub metrics: Vec<Metric>,
    pub diseases: Vec<DiseaseResult>,
    pub precautions: PrecautionSet,
    pub recorded_at: DateTime<Utc>,
}

impl AnalysisRecord {
    pub fn new(user_id: impl Into<String>, report: ScoreReport) -> Self {
        Self::at(user_id, report, Utc::now())
    }

    pub fn at(user_id: impl Into<String>, report: ScoreReport, recorded_at: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.into(),
            metrics: report.metrics,
            diseases: report.diseases,
            precautions: report.precautions,
            recorded_at,
        }
    }

    /// True when every stored status and tier is what the classifiers would
    /// produce from the stored values.
    pub fn is_consistent(&self) -> bool {
        self.metrics.iter().all(Metric::is_consistent)
            && self.diseases.iter().all(DiseaseResult::is_consistent)
    }
}

/// An append-only JSON-lines file of analysis records.
#[derive(Debug, Clone)]
pub struct RecordLog {
    path: PathBuf,
}

impl RecordLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: io::Error) -> RecordError {
        RecordError::IoError {
            path: self.path.clone(),
            source,
        }
    }

    pub fn append(&self, record: &AnalysisRecord) -> Result<(), RecordError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_error(e))?;
        // A record goes out in a single write.
        file.write_all(line.as_bytes()).map_err(|e| self.io_error(e))?;
        log::debug!(
            "Appended analysis for user {} to {}",
            record.user_id,
            self.path.display()
        );
        Ok(())
    }

    /// Every consistent record for `user_id`, newest first. A missing log is an empty history.
    pub fn history(&self, user_id: &str) -> Result<Vec<AnalysisRecord>, RecordError> {
        let file = match fs::File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.io_error(e)),
        };

        let mut records = Vec::new();
        for (idx, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| self.io_error(e))?;
            if line.trim().is_empty() {
                continue;
            }
            let record: AnalysisRecord =
                serde_json::from_str(&line).map_err(|source| RecordError::Corrupt {
                    path: self.path.clone(),
                    line: idx + 1,
                    source,
                })?;
            if record.user_id != user_id {
                continue;
            }
            if !record.is_consistent() {
                log::warn!(
                    "Skipping record on line {} of {}: stored statuses do not match stored values",
                    idx + 1,
                    self.path.display()
                );
                continue;
            }
            records.push(record);
        }

        // Stable sort keeps file order for identical timestamps; reverse gives newest first.
        records.sort_by_key(|record| record.recorded_at);
        records.reverse();
        Ok(records)
    }

    pub fn latest(&self, user_id: &str) -> Result<Option<AnalysisRecord>, RecordError> {
        Ok(self.history(user_id)?.into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MetricKind, Reading, RiskTier};
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn report(bmi: f64, probability: f64) -> ScoreReport {
        ScoreReport {
            diseases: vec![DiseaseResult::new("Obesity", probability)],
            metrics: vec![
                Metric::measure(MetricKind::Bmi, Reading::Scalar(bmi)),
                Metric::measure(MetricKind::BloodPressure, Reading::Pair(128.0, 78.0)),
            ],
            precautions: PrecautionSet {
                diet: vec!["Control portion sizes".to_string()],
                ..PrecautionSet::default()
            },
        }
    }

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, day, 9, 30, 0).unwrap()
    }

    #[test]
    fn history_is_per_user_and_newest_first() {
        let dir = tempdir().unwrap();
        let log = RecordLog::new(dir.path().join("nested").join("analyses.jsonl"));

        log.append(&AnalysisRecord::at("u1", report(27.0, 0.8), at(2)))
            .unwrap();
        log.append(&AnalysisRecord::at("u2", report(22.0, 0.1), at(3)))
            .unwrap();
        log.append(&AnalysisRecord::at("u1", report(31.0, 0.9), at(5)))
            .unwrap();
        log.append(&AnalysisRecord::at("u1", report(24.0, 0.3), at(1)))
            .unwrap();

        let history = log.history("u1").unwrap();
        let days: Vec<DateTime<Utc>> = history.iter().map(|r| r.recorded_at).collect();
        assert_eq!(days, vec![at(5), at(2), at(1)]);

        let latest = log.latest("u1").unwrap().unwrap();
        assert_eq!(latest.diseases[0].tier, RiskTier::High);
        assert_eq!(latest.metrics[0].reading(), Reading::Scalar(31.0));
        assert!(log.latest("nobody").unwrap().is_none());
    }

    #[test]
    fn missing_log_is_empty_history() {
        let dir = tempdir().unwrap();
        let log = RecordLog::new(dir.path().join("absent.jsonl"));
        assert!(log.history("u1").unwrap().is_empty());
    }

    #[test]
    fn tampered_records_are_skipped() {
        let dir = tempdir().unwrap();
        let log = RecordLog::new(dir.path().join("analyses.jsonl"));
        log.append(&AnalysisRecord::at("u1", report(27.0, 0.8), at(2)))
            .unwrap();

        let mut forged = serde_json::to_value(AnalysisRecord::at("u1", report(27.0, 0.8), at(3)))
            .unwrap();
        forged["diseases"][0]["tier"] = serde_json::json!("Low Risk");
        let mut text = fs::read_to_string(log.path()).unwrap();
        text.push_str(&forged.to_string());
        text.push('\n');
        fs::write(log.path(), text).unwrap();

        let history = log.history("u1").unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].recorded_at, at(2));
    }

    #[test]
    fn concurrent_appends_keep_records_whole() {
        let dir = tempdir().unwrap();
        let log = RecordLog::new(dir.path().join("analyses.jsonl"));
        let mut big = report(27.0, 0.8);
        big.precautions.habit = (0..400)
            .map(|i| format!("Keep a daily log of blood pressure readings, entry {i}"))
            .collect();

        std::thread::scope(|scope| {
            for worker in 0..4 {
                let log = &log;
                let big = &big;
                scope.spawn(move || {
                    for n in 0..5 {
                        let user = format!("u{worker}");
                        log.append(&AnalysisRecord::at(user, big.clone(), at(n + 1)))
                            .unwrap();
                    }
                });
            }
        });

        let text = fs::read_to_string(log.path()).unwrap();
        assert_eq!(text.lines().count(), 20);
        for worker in 0..4 {
            assert_eq!(log.history(&format!("u{worker}")).unwrap().len(), 5);
        }
    }

    #[test]
    fn garbage_line_is_reported_with_its_position() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("analyses.jsonl");
        fs::write(&path, "\n{not json}\n").unwrap();
        match RecordLog::new(&path).history("u1") {
            Err(RecordError::Corrupt { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected corrupt-line error, got {other:?}"),
        }
    }
}

// ========================================================================================
//                             High-Level Data Contracts
// ========================================================================================

// This file is ONLY for types that are SHARED BETWEEN FILES, not types that only are used in one file.

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// The clinical measurements the screening engine classifies.
///
/// The declaration order is the canonical metric order: reports list metrics in
/// this order and the precaution aggregator visits them in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetricKind {
    #[serde(rename = "BMI")]
    Bmi,
    BloodPressure,
    BloodSugar,
    Cholesterol,
}

impl MetricKind {
    pub const ALL: [MetricKind; 4] = [
        MetricKind::Bmi,
        MetricKind::BloodPressure,
        MetricKind::BloodSugar,
        MetricKind::Cholesterol,
    ];

    pub fn name(self) -> &'static str {
        match self {
            MetricKind::Bmi => "BMI",
            MetricKind::BloodPressure => "BloodPressure",
            MetricKind::BloodSugar => "BloodSugar",
            MetricKind::Cholesterol => "Cholesterol",
        }
    }

    /// Resolves a metric by its exact name. Names are case-sensitive.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BmiStatus {
    Underweight,
    Normal,
    Overweight,
    Obese,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BloodPressureStatus {
    Normal,
    Elevated,
    Stage1,
    Stage2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BloodSugarStatus {
    Normal,
    Prediabetes,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CholesterolStatus {
    Desirable,
    BorderlineHigh,
    High,
}

/// A qualitative status derived from one metric reading.
///
/// Each variant carries the metric it belongs to, so `Cholesterol(High)` and
/// `BloodSugar(High)` are distinct keys even though both read "High".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Bmi(BmiStatus),
    BloodPressure(BloodPressureStatus),
    BloodSugar(BloodSugarStatus),
    Cholesterol(CholesterolStatus),
    /// Returned for metric names the classifier does not recognise.
    Unknown,
}

impl Status {
    pub fn label(self) -> &'static str {
        match self {
            Status::Bmi(BmiStatus::Underweight) => "Underweight",
            Status::Bmi(BmiStatus::Normal) => "Normal",
            Status::Bmi(BmiStatus::Overweight) => "Overweight",
            Status::Bmi(BmiStatus::Obese) => "Obese",
            Status::BloodPressure(BloodPressureStatus::Normal) => "Normal",
            Status::BloodPressure(BloodPressureStatus::Elevated) => "Elevated",
            Status::BloodPressure(BloodPressureStatus::Stage1) => "High BP Stage 1",
            Status::BloodPressure(BloodPressureStatus::Stage2) => "High BP Stage 2",
            Status::BloodSugar(BloodSugarStatus::Normal) => "Normal",
            Status::BloodSugar(BloodSugarStatus::Prediabetes) => "Prediabetes",
            Status::BloodSugar(BloodSugarStatus::High) => "High",
            Status::Cholesterol(CholesterolStatus::Desirable) => "Desirable",
            Status::Cholesterol(CholesterolStatus::BorderlineHigh) => "Borderline High",
            Status::Cholesterol(CholesterolStatus::High) => "High",
            Status::Unknown => "Unknown",
        }
    }

    pub fn metric(self) -> Option<MetricKind> {
        match self {
            Status::Bmi(_) => Some(MetricKind::Bmi),
            Status::BloodPressure(_) => Some(MetricKind::BloodPressure),
            Status::BloodSugar(_) => Some(MetricKind::BloodSugar),
            Status::Cholesterol(_) => Some(MetricKind::Cholesterol),
            Status::Unknown => None,
        }
    }

    /// Every status a metric can take, in ascending severity.
    pub fn all_for(metric: MetricKind) -> &'static [Status] {
        match metric {
            MetricKind::Bmi => &[
                Status::Bmi(BmiStatus::Underweight),
                Status::Bmi(BmiStatus::Normal),
                Status::Bmi(BmiStatus::Overweight),
                Status::Bmi(BmiStatus::Obese),
            ],
            MetricKind::BloodPressure => &[
                Status::BloodPressure(BloodPressureStatus::Normal),
                Status::BloodPressure(BloodPressureStatus::Elevated),
                Status::BloodPressure(BloodPressureStatus::Stage1),
                Status::BloodPressure(BloodPressureStatus::Stage2),
            ],
            MetricKind::BloodSugar => &[
                Status::BloodSugar(BloodSugarStatus::Normal),
                Status::BloodSugar(BloodSugarStatus::Prediabetes),
                Status::BloodSugar(BloodSugarStatus::High),
            ],
            MetricKind::Cholesterol => &[
                Status::Cholesterol(CholesterolStatus::Desirable),
                Status::Cholesterol(CholesterolStatus::BorderlineHigh),
                Status::Cholesterol(CholesterolStatus::High),
            ],
        }
    }

    /// Resolves a status label within the given metric. `None` if the metric has no such status.
    pub fn parse(metric: MetricKind, label: &str) -> Option<Status> {
        Self::all_for(metric)
            .iter()
            .copied()
            .find(|status| status.label() == label)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for Status {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

/// A raw metric value. Blood pressure is the only paired reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reading {
    Scalar(f64),
    /// Systolic, diastolic.
    Pair(f64, f64),
}

/// One classified metric. The status is always computed from the reading;
/// `Metric::measure` is the only constructor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StoredMetric")]
pub struct Metric {
    kind: MetricKind,
    reading: Reading,
    status: Status,
}

impl Metric {
    pub fn measure(kind: MetricKind, reading: Reading) -> Self {
        Self {
            kind,
            reading,
            status: kind.status(reading),
        }
    }

    pub fn kind(&self) -> MetricKind {
        self.kind
    }

    pub fn reading(&self) -> Reading {
        self.reading
    }

    pub fn status(&self) -> Status {
        self.status
    }

    /// True when the stored status is exactly what the classifier yields for the stored reading.
    pub fn is_consistent(&self) -> bool {
        self.kind.status(self.reading) == self.status
    }
}

/// Wire form of a `Metric`. Status labels are only unique within a metric,
/// so the label is resolved against the metric during deserialization.
#[derive(Deserialize)]
struct StoredMetric {
    kind: MetricKind,
    reading: Reading,
    status: String,
}

impl TryFrom<StoredMetric> for Metric {
    type Error = String;

    fn try_from(stored: StoredMetric) -> Result<Self, Self::Error> {
        let status = if stored.status == Status::Unknown.label() {
            Status::Unknown
        } else {
            Status::parse(stored.kind, &stored.status).ok_or_else(|| {
                format!(
                    "'{}' is not a valid status for metric '{}'",
                    stored.status, stored.kind
                )
            })?
        };
        Ok(Self {
            kind: stored.kind,
            reading: stored.reading,
            status,
        })
    }
}

/// Discrete risk level derived from a disease probability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskTier {
    #[serde(rename = "Low Risk")]
    Low,
    #[serde(rename = "Intermediate Risk")]
    Intermediate,
    #[serde(rename = "High Risk")]
    High,
}

impl RiskTier {
    pub fn label(self) -> &'static str {
        match self {
            RiskTier::Low => "Low Risk",
            RiskTier::Intermediate => "Intermediate Risk",
            RiskTier::High => "High Risk",
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The outcome of one disease classifier for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiseaseResult {
    pub disease: String,
    pub probability: f64,
    pub tier: RiskTier,
}

impl DiseaseResult {
    pub fn new(disease: impl Into<String>, probability: f64) -> Self {
        Self {
            disease: disease.into(),
            probability,
            tier: RiskTier::from_probability(probability),
        }
    }

    /// The probability as a percentage with one decimal place, e.g. "73.2%".
    pub fn chance(&self) -> String {
        format!("{:.1}%", self.probability * 100.0)
    }

    pub fn is_consistent(&self) -> bool {
        RiskTier::from_probability(self.probability) == self.tier
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrecautionCategory {
    Diet,
    Exercise,
    Habit,
}

impl PrecautionCategory {
    pub const ALL: [PrecautionCategory; 3] = [
        PrecautionCategory::Diet,
        PrecautionCategory::Exercise,
        PrecautionCategory::Habit,
    ];
}

/// Diet, exercise and habit recommendations. Used both for a single
/// knowledge-base fragment and for the aggregated result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrecautionSet {
    #[serde(default)]
    pub diet: Vec<String>,
    #[serde(default)]
    pub exercise: Vec<String>,
    #[serde(default)]
    pub habit: Vec<String>,
}

impl PrecautionSet {
    pub fn category(&self, category: PrecautionCategory) -> &[String] {
        match category {
            PrecautionCategory::Diet => &self.diet,
            PrecautionCategory::Exercise => &self.exercise,
            PrecautionCategory::Habit => &self.habit,
        }
    }

    pub fn category_mut(&mut self, category: PrecautionCategory) -> &mut Vec<String> {
        match category {
            PrecautionCategory::Diet => &mut self.diet,
            PrecautionCategory::Exercise => &mut self.exercise,
            PrecautionCategory::Habit => &mut self.habit,
        }
    }

    pub fn is_empty(&self) -> bool {
        PrecautionCategory::ALL
            .iter()
            .all(|&category| self.category(category).is_empty())
    }
}

// ========================================================================================
//
//                               THE SCORING PIPELINE
//
// ========================================================================================
//
// ### Purpose ###
//
// Orchestrates one screening request end to end: validate the raw form, derive
// BMI, build the feature frame, run every disease classifier, classify every
// metric, and aggregate the triggered precautions. The pipeline owns only
// read-only state (classifiers and the precaution table), so a single instance
// serves any number of concurrent requests without locking.

use crate::aggregate::aggregate;
use crate::classify::features::FeatureFrame;
use crate::classify::model::ModelError;
use crate::classify::risk::{ModelSet, evaluate};
use crate::input::{InputError, RawInput, Vitals};
use crate::knowledge::KnowledgeBase;
use crate::types::{DiseaseResult, Metric, MetricKind, PrecautionSet, Reading};
use rayon::prelude::*;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid screening input: {0}")]
    Validation(#[from] InputError),
    #[error("The {disease} classifier could not score this request: {source}")]
    ModelInference {
        disease: String,
        #[source]
        source: ModelError,
    },
}

/// Everything one screening produces. Serializes to the caller-facing shape:
/// `{"diseases": {..}, "metrics": {..}, "precautions": {..}}`.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreReport {
    /// One result per classifier, in model-set order.
    pub diseases: Vec<DiseaseResult>,
    /// BMI, BloodPressure, BloodSugar, Cholesterol.
    pub metrics: Vec<Metric>,
    pub precautions: PrecautionSet,
}

impl ScoreReport {
    pub fn disease(&self, name: &str) -> Option<&DiseaseResult> {
        self.diseases.iter().find(|result| result.disease == name)
    }

    pub fn metric(&self, kind: MetricKind) -> Option<&Metric> {
        self.metrics.iter().find(|metric| metric.kind() == kind)
    }
}

pub struct ScoringPipeline {
    models: ModelSet,
    knowledge: KnowledgeBase,
}

impl ScoringPipeline {
    pub fn new(models: ModelSet, knowledge: KnowledgeBase) -> Self {
        Self { models, knowledge }
    }

    pub fn models(&self) -> &ModelSet {
        &self.models
    }

    pub fn knowledge(&self) -> &KnowledgeBase {
        &self.knowledge
    }

    /// Scores one request. Input is fully validated before any classifier runs,
    /// so a malformed request never yields partial results.
    pub fn score(&self, raw: &RawInput) -> Result<ScoreReport, PipelineError> {
        let vitals = raw.validate()?;
        self.score_vitals(&vitals)
    }

    pub fn score_vitals(&self, vitals: &Vitals) -> Result<ScoreReport, PipelineError> {
        // BMI is part of the feature frame, so it must exist before inference.
        let frame = FeatureFrame::from_vitals(vitals);

        let diseases = self
            .models
            .iter()
            .map(|(disease, classifier)| {
                evaluate(disease, classifier, &frame).map_err(|source| {
                    PipelineError::ModelInference {
                        disease: disease.to_string(),
                        source,
                    }
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let metrics = measure_metrics(vitals);
        let precautions = aggregate(&self.knowledge, &metrics, &diseases);

        Ok(ScoreReport {
            diseases,
            metrics,
            precautions,
        })
    }

    /// Scores independent requests in parallel. Results keep input order.
    pub fn score_batch(&self, inputs: &[RawInput]) -> Vec<Result<ScoreReport, PipelineError>> {
        inputs.par_iter().map(|raw| self.score(raw)).collect()
    }
}

/// Classifies the four screened metrics in canonical order.
pub fn measure_metrics(vitals: &Vitals) -> Vec<Metric> {
    MetricKind::ALL
        .into_iter()
        .map(|kind| {
            let reading = match kind {
                MetricKind::Bmi => Reading::Scalar(vitals.bmi()),
                MetricKind::BloodPressure => Reading::Pair(vitals.systolic, vitals.diastolic),
                MetricKind::BloodSugar => Reading::Scalar(vitals.blood_sugar),
                MetricKind::Cholesterol => Reading::Scalar(vitals.cholesterol),
            };
            Metric::measure(kind, reading)
        })
        .collect()
}

// ========================================================================================
//                              Caller-facing serialization
// ========================================================================================

/// Metric values as shown to the caller: BMI rounded to one decimal (ties to even), blood
/// pressure as "systolic/diastolic", everything else as the raw number.
#[derive(Serialize)]
#[serde(untagged)]
enum DisplayValue {
    Number(f64),
    Text(String),
}

fn display_value(metric: &Metric) -> DisplayValue {
    match (metric.kind(), metric.reading()) {
        (MetricKind::Bmi, Reading::Scalar(bmi)) => {
            DisplayValue::Number((bmi * 10.0).round_ties_even() / 10.0)
        }
        (_, Reading::Scalar(value)) => DisplayValue::Number(value),
        (_, Reading::Pair(systolic, diastolic)) => {
            DisplayValue::Text(format!("{systolic}/{diastolic}"))
        }
    }
}

#[derive(Serialize)]
struct DiseaseView {
    chance: String,
    status: &'static str,
}

#[derive(Serialize)]
struct MetricView {
    value: DisplayValue,
    status: &'static str,
}

struct DiseaseMap<'a>(&'a [DiseaseResult]);
struct MetricMap<'a>(&'a [Metric]);

impl Serialize for DiseaseMap<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for result in self.0 {
            map.serialize_entry(
                &result.disease,
                &DiseaseView {
                    chance: result.chance(),
                    status: result.tier.label(),
                },
            )?;
        }
        map.end()
    }
}

impl Serialize for MetricMap<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for metric in self.0 {
            map.serialize_entry(
                metric.kind().name(),
                &MetricView {
                    value: display_value(metric),
                    status: metric.status().label(),
                },
            )?;
        }
        map.end()
    }
}

impl Serialize for ScoreReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry("diseases", &DiseaseMap(&self.diseases))?;
        map.serialize_entry("metrics", &MetricMap(&self.metrics))?;
        map.serialize_entry("precautions", &self.precautions)?;
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::model::RiskClassifier;
    use crate::input::*;
    use crate::types::{BloodPressureStatus, BmiStatus, RiskTier, Status};
    use ndarray::ArrayView1;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Constant {
        probability: f64,
        schema: Vec<String>,
        calls: Arc<AtomicUsize>,
    }

    impl Constant {
        fn new(probability: f64, calls: &Arc<AtomicUsize>) -> Self {
            Self {
                probability,
                schema: vec!["BMI".to_string(), "Stress_Level".to_string()],
                calls: Arc::clone(calls),
            }
        }
    }

    impl RiskClassifier for Constant {
        fn feature_names(&self) -> &[String] {
            &self.schema
        }

        fn predict_proba(&self, features: ArrayView1<f64>) -> Result<f64, ModelError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            // The absent stress column must be zero-filled, not omitted.
            assert_eq!(features.len(), 2);
            assert_eq!(features[1], 0.0);
            Ok(self.probability)
        }
    }

    struct Broken;

    impl RiskClassifier for Broken {
        fn feature_names(&self) -> &[String] {
            &[]
        }

        fn predict_proba(&self, features: ArrayView1<f64>) -> Result<f64, ModelError> {
            Err(ModelError::FeatureCountMismatch {
                found: features.len(),
                expected: 3,
            })
        }
    }

    fn form() -> RawInput {
        RawInput::new()
            .with(FIELD_AGE, "50")
            .with(FIELD_GENDER, "Male")
            .with(FIELD_SMOKING, "Yes")
            .with(FIELD_ALCOHOL, "No")
            .with(FIELD_EXERCISE, "Never")
            .with(FIELD_SLEEP, "6")
            .with(FIELD_HEIGHT, "170")
            .with(FIELD_WEIGHT, "85")
            .with(FIELD_SYSTOLIC, "145")
            .with(FIELD_DIASTOLIC, "95")
            .with(FIELD_CHOLESTEROL, "250")
            .with(FIELD_BLOOD_SUGAR, "130")
    }

    fn pipeline(calls: &Arc<AtomicUsize>) -> ScoringPipeline {
        let models = ModelSet::new()
            .with("Obesity", Constant::new(0.71, calls))
            .with("Diabetes", Constant::new(0.70, calls));
        ScoringPipeline::new(models, KnowledgeBase::builtin().unwrap())
    }

    #[test]
    fn metrics_are_classified_from_derived_bmi() {
        let calls = Arc::new(AtomicUsize::new(0));
        let report = pipeline(&calls).score(&form()).unwrap();

        let bmi = report.metric(MetricKind::Bmi).unwrap();
        assert_eq!(bmi.status(), Status::Bmi(BmiStatus::Overweight));
        assert_eq!(
            report.metric(MetricKind::BloodPressure).unwrap().status(),
            Status::BloodPressure(BloodPressureStatus::Stage2)
        );
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn invalid_input_fails_before_any_inference() {
        let calls = Arc::new(AtomicUsize::new(0));
        let raw = form().with(FIELD_HEIGHT, "abc");
        let err = pipeline(&calls).score(&raw).unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn overflowing_bmi_fails_validation_before_inference() {
        let calls = Arc::new(AtomicUsize::new(0));
        let raw = form().with(FIELD_HEIGHT, "1e-160");
        let err = pipeline(&calls).score(&raw).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Validation(InputError::NonFiniteBmi { .. })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn displayed_bmi_rounds_half_to_even() {
        let calls = Arc::new(AtomicUsize::new(0));
        // 89 / 2.0^2 is exactly 22.25.
        let raw = form().with(FIELD_HEIGHT, "200").with(FIELD_WEIGHT, "89");
        let report = pipeline(&calls).score(&raw).unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["metrics"]["BMI"]["value"], 22.2);
    }

    #[test]
    fn classifier_failure_names_the_disease() {
        let models = ModelSet::new().with("HeartDisease", Broken);
        let pipeline = ScoringPipeline::new(models, KnowledgeBase::default());
        match pipeline.score(&form()) {
            Err(PipelineError::ModelInference { disease, .. }) => {
                assert_eq!(disease, "HeartDisease")
            }
            other => panic!("expected inference failure, got {other:?}"),
        }
    }

    #[test]
    fn only_high_risk_diseases_add_precautions() {
        let calls = Arc::new(AtomicUsize::new(0));
        let report = pipeline(&calls).score(&form()).unwrap();
        assert_eq!(report.disease("Obesity").unwrap().tier, RiskTier::High);
        assert_eq!(
            report.disease("Diabetes").unwrap().tier,
            RiskTier::Intermediate
        );

        let kb = KnowledgeBase::builtin().unwrap();
        let obesity = kb.for_disease("Obesity").unwrap();
        let diabetes = kb.for_disease("Diabetes").unwrap();
        assert!(obesity.diet.iter().all(|d| report.precautions.diet.contains(d)));
        assert!(!report.precautions.diet.contains(&diabetes.diet[0]));
    }

    #[test]
    fn report_serializes_to_caller_shape() {
        let calls = Arc::new(AtomicUsize::new(0));
        let report = pipeline(&calls).score(&form()).unwrap();
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["diseases"]["Obesity"]["chance"], "71.0%");
        assert_eq!(json["diseases"]["Obesity"]["status"], "High Risk");
        assert_eq!(json["diseases"]["Diabetes"]["status"], "Intermediate Risk");
        assert_eq!(json["metrics"]["BMI"]["value"], 29.4);
        assert_eq!(json["metrics"]["BMI"]["status"], "Overweight");
        assert_eq!(json["metrics"]["BloodPressure"]["value"], "145/95");
        assert_eq!(json["metrics"]["BloodPressure"]["status"], "High BP Stage 2");
        assert_eq!(json["metrics"]["BloodSugar"]["value"], 130.0);
        assert_eq!(json["metrics"]["Cholesterol"]["status"], "High");
        assert!(json["precautions"]["habit"].is_array());
    }

    #[test]
    fn batch_results_keep_input_order() {
        let calls = Arc::new(AtomicUsize::new(0));
        let pipeline = pipeline(&calls);
        let inputs = vec![
            form(),
            form().with(FIELD_WEIGHT, ""),
            form().with(FIELD_WEIGHT, "50"),
        ];
        let results = pipeline.score_batch(&inputs);

        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(PipelineError::Validation(_))));
        let light = results[2].as_ref().unwrap();
        assert_eq!(
            light.metric(MetricKind::Bmi).unwrap().status(),
            Status::Bmi(BmiStatus::Underweight)
        );
    }
}

//! Merges the precaution fragments triggered by one screening into a single set.

use crate::knowledge::KnowledgeBase;
use crate::types::{DiseaseResult, Metric, PrecautionCategory, PrecautionSet, RiskTier};
use itertools::Itertools;

/// Collects every fragment triggered by `metrics` (in the order given) and
/// then by high-risk `diseases` (in the order given), and removes repeated
/// recommendations per category, keeping the first occurrence.
///
/// Metrics whose status has no entry, diseases below high risk, and diseases
/// the table does not know contribute nothing.
pub fn aggregate(
    knowledge: &KnowledgeBase,
    metrics: &[Metric],
    diseases: &[DiseaseResult],
) -> PrecautionSet {
    let metric_fragments = metrics
        .iter()
        .filter_map(|metric| knowledge.for_status(metric.status()));
    let disease_fragments = diseases
        .iter()
        .filter(|result| result.tier == RiskTier::High)
        .filter_map(|result| knowledge.for_disease(&result.disease));
    let fragments: Vec<&PrecautionSet> = metric_fragments.chain(disease_fragments).collect();

    let mut merged = PrecautionSet::default();
    for category in PrecautionCategory::ALL {
        *merged.category_mut(category) = fragments
            .iter()
            .flat_map(|fragment| fragment.category(category))
            .unique()
            .cloned()
            .collect();
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MetricKind, Reading};

    const TABLE: &str = r#"
[[metric]]
metric = "BMI"
status = "Overweight"
diet = ["Control portion sizes", "Avoid sugary drinks"]
habit = ["Track weight"]

[[metric]]
metric = "BloodSugar"
status = "High"
diet = ["Avoid sugary drinks", "Eat more fibre"]

[[disease]]
disease = "Diabetes"
diet = ["Eat more fibre", "Low glycemic index diet"]
exercise = ["Walk daily"]
habit = ["Track weight", "Monitor glucose"]
"#;

    fn kb() -> KnowledgeBase {
        KnowledgeBase::from_toml_str(TABLE).unwrap()
    }

    fn metrics(bmi: f64, sugar: f64) -> Vec<Metric> {
        vec![
            Metric::measure(MetricKind::Bmi, Reading::Scalar(bmi)),
            Metric::measure(MetricKind::BloodSugar, Reading::Scalar(sugar)),
        ]
    }

    #[test]
    fn shared_recommendations_appear_once_at_first_position() {
        let diseases = vec![DiseaseResult::new("Diabetes", 0.9)];
        let set = aggregate(&kb(), &metrics(27.0, 140.0), &diseases);

        assert_eq!(
            set.diet,
            vec![
                "Control portion sizes",
                "Avoid sugary drinks",
                "Eat more fibre",
                "Low glycemic index diet",
            ]
        );
        assert_eq!(set.exercise, vec!["Walk daily"]);
        assert_eq!(set.habit, vec!["Track weight", "Monitor glucose"]);
    }

    #[test]
    fn diseases_below_high_risk_do_not_trigger() {
        let diseases = vec![DiseaseResult::new("Diabetes", 0.70)];
        let set = aggregate(&kb(), &metrics(22.0, 90.0), &diseases);
        assert!(set.is_empty());
        assert!(set.diet.is_empty() && set.exercise.is_empty() && set.habit.is_empty());

        let diseases = vec![DiseaseResult::new("Diabetes", 0.71)];
        let set = aggregate(&kb(), &metrics(22.0, 90.0), &diseases);
        assert_eq!(set.exercise, vec!["Walk daily"]);
    }

    #[test]
    fn unknown_diseases_and_statuses_are_ignored() {
        let diseases = vec![DiseaseResult::new("Gout", 0.99)];
        let odd = vec![Metric::measure(
            MetricKind::BloodPressure,
            Reading::Scalar(150.0),
        )];
        let set = aggregate(&kb(), &odd, &diseases);
        assert_eq!(set, PrecautionSet::default());
    }

    #[test]
    fn metric_order_drives_output_order() {
        let reversed: Vec<Metric> = metrics(27.0, 140.0).into_iter().rev().collect();
        let set = aggregate(&kb(), &reversed, &[]);
        assert_eq!(
            set.diet,
            vec!["Avoid sugary drinks", "Eat more fibre", "Control portion sizes"]
        );
    }
}

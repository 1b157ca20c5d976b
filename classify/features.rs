//! # Feature Frame Construction
//!
//! Turns validated vitals into the named, one-row feature table the disease
//! classifiers were trained on, and projects it onto a classifier's schema.
//!
//! - Encoding: numeric fields keep their training-time column names.
//!   Categorical fields become a single indicator column named
//!   `<Field>_<value>` set to 1.0, exactly as a dummy encoder produces for a
//!   one-row table.
//! - Alignment: the classifier's schema is authoritative. Columns it expects
//!   but the request lacks are filled with 0.0; columns it does not know are
//!   dropped. The result is in schema order.

use crate::input::Vitals;
use ndarray::Array1;

/// Training-time names of the numeric columns, in the order they are emitted.
pub const NUMERIC_COLUMNS: [&str; 9] = [
    "Age",
    "Height_cm",
    "Weight_kg",
    "Sleep_Hours",
    "SystolicBP",
    "DiastolicBP",
    "Cholesterol",
    "BloodSugar",
    "BMI",
];

/// Training-time prefixes of the one-hot encoded categorical columns.
pub const CATEGORICAL_PREFIXES: [&str; 4] = ["Gender", "Smoking", "Alcohol", "Exercise_Freq"];

/// A single request's features as ordered `(column name, value)` pairs.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureFrame {
    columns: Vec<(String, f64)>,
}

impl FeatureFrame {
    pub fn from_vitals(vitals: &Vitals) -> Self {
        let numeric = [
            vitals.age as f64,
            vitals.height_cm,
            vitals.weight_kg,
            vitals.sleep_hours,
            vitals.systolic,
            vitals.diastolic,
            vitals.cholesterol,
            vitals.blood_sugar,
            vitals.bmi(),
        ];
        let categorical = [
            &vitals.gender,
            &vitals.smoking,
            &vitals.alcohol,
            &vitals.exercise,
        ];

        let mut columns: Vec<(String, f64)> = NUMERIC_COLUMNS
            .iter()
            .zip(numeric)
            .map(|(name, value)| (name.to_string(), value))
            .collect();
        columns.extend(
            CATEGORICAL_PREFIXES
                .iter()
                .zip(categorical)
                .map(|(prefix, value)| (format!("{prefix}_{value}"), 1.0)),
        );

        Self { columns }
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.columns
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, value)| *value)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    /// Projects the frame onto `schema`: missing columns become 0.0, unknown
    /// columns are dropped, and the output follows schema order.
    pub fn align(&self, schema: &[String]) -> Array1<f64> {
        let mut filled = Vec::new();
        let aligned: Array1<f64> = schema
            .iter()
            .map(|name| match self.get(name) {
                Some(value) => value,
                None => {
                    filled.push(name.as_str());
                    0.0
                }
            })
            .collect();

        if log::log_enabled!(log::Level::Debug) {
            let dropped: Vec<&str> = self
                .column_names()
                .filter(|name| !schema.iter().any(|s| s == name))
                .collect();
            if !filled.is_empty() {
                log::debug!("Filled absent feature columns with 0: {filled:?}");
            }
            if !dropped.is_empty() {
                log::debug!("Dropped feature columns unknown to the classifier: {dropped:?}");
            }
        }

        aligned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn vitals() -> Vitals {
        Vitals {
            age: 52,
            gender: "Male".to_string(),
            smoking: "Yes".to_string(),
            alcohol: "No".to_string(),
            exercise: "Rarely".to_string(),
            height_cm: 170.0,
            weight_kg: 85.0,
            sleep_hours: 6.5,
            systolic: 145.0,
            diastolic: 95.0,
            cholesterol: 250.0,
            blood_sugar: 130.0,
        }
    }

    #[test]
    fn frame_one_hot_encodes_categoricals() {
        let frame = FeatureFrame::from_vitals(&vitals());
        assert_eq!(frame.get("Gender_Male"), Some(1.0));
        assert_eq!(frame.get("Smoking_Yes"), Some(1.0));
        assert_eq!(frame.get("Alcohol_No"), Some(1.0));
        assert_eq!(frame.get("Exercise_Freq_Rarely"), Some(1.0));
        assert_eq!(frame.get("Gender_Female"), None);
        assert_eq!(frame.get("Age"), Some(52.0));
        assert_abs_diff_eq!(frame.get("BMI").unwrap(), 85.0 / (1.7 * 1.7), epsilon = 1e-9);
        assert_eq!(frame.column_names().count(), 13);
    }

    #[test]
    fn align_fills_missing_and_drops_unknown_columns() {
        let frame = FeatureFrame::from_vitals(&vitals());
        let schema: Vec<String> = ["Stress_Level", "BMI", "Gender_Male", "Gender_Female", "Age"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let x = frame.align(&schema);
        assert_eq!(x.len(), 5);
        assert_eq!(x[0], 0.0);
        assert_abs_diff_eq!(x[1], 85.0 / (1.7 * 1.7), epsilon = 1e-9);
        assert_eq!(x[2], 1.0);
        assert_eq!(x[3], 0.0);
        assert_eq!(x[4], 52.0);
    }

    #[test]
    fn align_on_empty_schema_is_empty() {
        let frame = FeatureFrame::from_vitals(&vitals());
        assert!(frame.align(&[]).is_empty());
    }
}

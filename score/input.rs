//! # Raw Request Input and Validation
//!
//! This module is the only entry point for untrusted request data. A
//! `RawInput` holds the screening form exactly as submitted; `validate`
//! either produces fully typed `Vitals` or fails with the first offending
//! field. Nothing downstream ever sees a partially parsed request.

use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use thiserror::Error;

pub const FIELD_AGE: &str = "age";
pub const FIELD_GENDER: &str = "gender";
pub const FIELD_SMOKING: &str = "smoking";
pub const FIELD_ALCOHOL: &str = "alcohol";
pub const FIELD_EXERCISE: &str = "exercise";
pub const FIELD_SLEEP: &str = "sleep";
pub const FIELD_HEIGHT: &str = "height";
pub const FIELD_WEIGHT: &str = "weight";
pub const FIELD_SYSTOLIC: &str = "systolic";
pub const FIELD_DIASTOLIC: &str = "diastolic";
pub const FIELD_CHOLESTEROL: &str = "cholesterol";
pub const FIELD_BLOOD_SUGAR: &str = "bloodSugar";

/// Every required form field, in validation order.
pub const REQUIRED_FIELDS: [&str; 12] = [
    FIELD_AGE,
    FIELD_GENDER,
    FIELD_SMOKING,
    FIELD_ALCOHOL,
    FIELD_EXERCISE,
    FIELD_SLEEP,
    FIELD_HEIGHT,
    FIELD_WEIGHT,
    FIELD_SYSTOLIC,
    FIELD_DIASTOLIC,
    FIELD_CHOLESTEROL,
    FIELD_BLOOD_SUGAR,
];

/// A comprehensive error type for malformed screening requests.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InputError {
    #[error("The required field '{0}' is missing or empty.")]
    MissingField(&'static str),
    #[error("The field '{field}' must be a whole number, but '{value}' was given.")]
    NotAnInteger { field: &'static str, value: String },
    #[error("The field '{field}' must be a finite number, but '{value}' was given.")]
    NotANumber { field: &'static str, value: String },
    #[error("The field '{field}' must be greater than zero, but {value} was given.")]
    NonPositive { field: &'static str, value: f64 },
    #[error("Height {height_cm} cm and weight {weight_kg} kg do not give a finite BMI.")]
    NonFiniteBmi { height_cm: f64, weight_kg: f64 },
}

/// The screening form as submitted: field name to raw text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawInput {
    fields: HashMap<String, String>,
}

/// A fully validated request.
#[derive(Debug, Clone, PartialEq)]
pub struct Vitals {
    pub age: i64,
    pub gender: String,
    pub smoking: String,
    pub alcohol: String,
    pub exercise: String,
    pub height_cm: f64,
    pub weight_kg: f64,
    pub sleep_hours: f64,
    pub systolic: f64,
    pub diastolic: f64,
    pub cholesterol: f64,
    pub blood_sugar: f64,
}

impl Vitals {
    /// Body-mass index, `weight_kg / height_m^2`.
    pub fn bmi(&self) -> f64 {
        let height_m = self.height_cm / 100.0;
        self.weight_kg / (height_m * height_m)
    }
}

impl RawInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: &str, value: impl Into<String>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn insert(&mut self, field: &str, value: impl Into<String>) {
        self.fields.insert(field.to_string(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    /// Parses every required field. Fails on the first invalid field in
    /// `REQUIRED_FIELDS` order.
    pub fn validate(&self) -> Result<Vitals, InputError> {
        let age = self.integer(FIELD_AGE)?;
        let gender = self.text(FIELD_GENDER)?;
        let smoking = self.text(FIELD_SMOKING)?;
        let alcohol = self.text(FIELD_ALCOHOL)?;
        let exercise = self.text(FIELD_EXERCISE)?;
        let sleep_hours = self.number(FIELD_SLEEP)?;
        let height_cm = self.number(FIELD_HEIGHT)?;
        if height_cm <= 0.0 {
            return Err(InputError::NonPositive {
                field: FIELD_HEIGHT,
                value: height_cm,
            });
        }
        let weight_kg = self.number(FIELD_WEIGHT)?;
        let systolic = self.number(FIELD_SYSTOLIC)?;
        let diastolic = self.number(FIELD_DIASTOLIC)?;
        let cholesterol = self.number(FIELD_CHOLESTEROL)?;
        let blood_sugar = self.number(FIELD_BLOOD_SUGAR)?;

        let vitals = Vitals {
            age,
            gender,
            smoking,
            alcohol,
            exercise,
            height_cm,
            weight_kg,
            sleep_hours,
            systolic,
            diastolic,
            cholesterol,
            blood_sugar,
        };
        // Tiny heights overflow the division even though both inputs are finite.
        if !vitals.bmi().is_finite() {
            return Err(InputError::NonFiniteBmi {
                height_cm,
                weight_kg,
            });
        }
        Ok(vitals)
    }

    fn required(&self, field: &'static str) -> Result<&str, InputError> {
        match self.get(field).map(str::trim) {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(InputError::MissingField(field)),
        }
    }

    fn text(&self, field: &'static str) -> Result<String, InputError> {
        self.required(field).map(str::to_string)
    }

    fn integer(&self, field: &'static str) -> Result<i64, InputError> {
        let raw = self.required(field)?;
        raw.parse::<i64>().map_err(|_| InputError::NotAnInteger {
            field,
            value: raw.to_string(),
        })
    }

    fn number(&self, field: &'static str) -> Result<f64, InputError> {
        let raw = self.required(field)?;
        match raw.parse::<f64>() {
            Ok(value) if value.is_finite() => Ok(value),
            _ => Err(InputError::NotANumber {
                field,
                value: raw.to_string(),
            }),
        }
    }
}

impl FromIterator<(String, String)> for RawInput {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

// Form posts arrive as strings, JSON clients often send numbers. Both are kept
// as text so validation treats them identically; nulls count as absent.
impl<'de> Deserialize<'de> for RawInput {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let values = HashMap::<String, serde_json::Value>::deserialize(deserializer)?;
        Ok(values
            .into_iter()
            .filter_map(|(field, value)| match value {
                serde_json::Value::Null => None,
                serde_json::Value::String(text) => Some((field, text)),
                other => Some((field, other.to_string())),
            })
            .collect())
    }
}

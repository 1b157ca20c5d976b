//! # Metric Status Classification
//!
//! Maps raw clinical readings to qualitative statuses using fixed thresholds.
//! Every boundary is exclusive below and inclusive above: a BMI of exactly
//! 18.5 is `Normal`, a fasting blood sugar of exactly 126 is `High`.
//!
//! Classification is selected by metric identity, never by inspecting the
//! shape of the value. The string-keyed `classify` entry point exists for
//! callers holding untyped metric names; it degrades to `Status::Unknown`
//! instead of failing.

use crate::types::{
    BloodPressureStatus, BloodSugarStatus, BmiStatus, CholesterolStatus, MetricKind, Reading,
    Status,
};

pub fn bmi_status(bmi: f64) -> BmiStatus {
    if bmi < 18.5 {
        BmiStatus::Underweight
    } else if bmi < 25.0 {
        BmiStatus::Normal
    } else if bmi < 30.0 {
        BmiStatus::Overweight
    } else {
        BmiStatus::Obese
    }
}

pub fn blood_sugar_status(mg_dl: f64) -> BloodSugarStatus {
    if mg_dl < 100.0 {
        BloodSugarStatus::Normal
    } else if mg_dl < 126.0 {
        BloodSugarStatus::Prediabetes
    } else {
        BloodSugarStatus::High
    }
}

/// Branch order is significant. The stage-1 branch is a disjunction, so a
/// reading like 135/95 fails the elevated branch (diastolic >= 80) and lands
/// in stage 1 through the systolic test alone.
pub fn blood_pressure_status(systolic: f64, diastolic: f64) -> BloodPressureStatus {
    if systolic < 120.0 && diastolic < 80.0 {
        BloodPressureStatus::Normal
    } else if systolic < 130.0 && diastolic < 80.0 {
        BloodPressureStatus::Elevated
    } else if systolic < 140.0 || diastolic < 90.0 {
        BloodPressureStatus::Stage1
    } else {
        BloodPressureStatus::Stage2
    }
}

pub fn cholesterol_status(mg_dl: f64) -> CholesterolStatus {
    if mg_dl < 200.0 {
        CholesterolStatus::Desirable
    } else if mg_dl < 240.0 {
        CholesterolStatus::BorderlineHigh
    } else {
        CholesterolStatus::High
    }
}

impl MetricKind {
    /// Classifies a reading for this metric. A reading of the wrong shape
    /// (a scalar blood pressure, a paired BMI) yields `Status::Unknown`.
    pub fn status(self, reading: Reading) -> Status {
        match (self, reading) {
            (MetricKind::Bmi, Reading::Scalar(value)) => Status::Bmi(bmi_status(value)),
            (MetricKind::BloodSugar, Reading::Scalar(value)) => {
                Status::BloodSugar(blood_sugar_status(value))
            }
            (MetricKind::Cholesterol, Reading::Scalar(value)) => {
                Status::Cholesterol(cholesterol_status(value))
            }
            (MetricKind::BloodPressure, Reading::Pair(systolic, diastolic)) => {
                Status::BloodPressure(blood_pressure_status(systolic, diastolic))
            }
            _ => Status::Unknown,
        }
    }
}

/// Classifies a reading by metric name. Unrecognised names are not an error.
pub fn classify(metric_name: &str, reading: Reading) -> Status {
    match MetricKind::from_name(metric_name) {
        Some(kind) => kind.status(reading),
        None => Status::Unknown,
    }
}

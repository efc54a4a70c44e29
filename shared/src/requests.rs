use crate::error::{HealthError, Result};
use crate::types::{Metric, MetricValues};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;

pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Numeric parameter as the gateway sends it: a JSON number or a string
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum NumericParam {
    Number(serde_json::Number),
    Text(String),
}

impl NumericParam {
    pub fn to_decimal(&self) -> Option<Decimal> {
        let raw = match self {
            NumericParam::Number(n) => n.to_string(),
            NumericParam::Text(s) => s.trim().to_string(),
        };
        Decimal::from_str(&raw)
            .or_else(|_| Decimal::from_scientific(&raw))
            .ok()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct MetricParams {
    pub weight: Option<NumericParam>,
    pub height: Option<NumericParam>,
    pub body_fat_percentage: Option<NumericParam>,
}

impl MetricParams {
    /// Parse whatever metrics were supplied. Range checks happen in the
    /// service; this only rejects values that aren't numbers.
    pub fn parse(&self) -> Result<MetricValues> {
        let mut values = MetricValues::default();
        let mut errors = Vec::new();

        let supplied = [
            (Metric::Weight, &self.weight),
            (Metric::Height, &self.height),
            (Metric::BodyFatPercentage, &self.body_fat_percentage),
        ];
        for (metric, raw) in supplied {
            let Some(raw) = raw else { continue };
            match raw.to_decimal() {
                Some(value) => values.set(metric, value),
                None => errors.push(format!("{} must be a valid number", metric)),
            }
        }

        if errors.is_empty() {
            Ok(values)
        } else {
            Err(HealthError::Validation(errors.join("; ")))
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AddMeasurementRequest {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(flatten)]
    pub metrics: MetricParams,
    pub measurement_time: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateMeasurementRequest {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub measurement_id: Option<String>,
    #[serde(flatten)]
    pub metrics: MetricParams,
}

#[derive(Debug, Deserialize)]
pub struct DeleteMeasurementRequest {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub measurement_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UserRequest {
    #[serde(rename = "userId")]
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct HistoryRequest {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub limit: Option<NumericParam>,
}

impl HistoryRequest {
    pub fn limit(&self) -> Result<usize> {
        let Some(raw) = &self.limit else {
            return Ok(DEFAULT_HISTORY_LIMIT);
        };
        raw.to_decimal()
            .filter(|d| d.fract().is_zero() && *d >= Decimal::ONE)
            .and_then(|d| d.to_usize())
            .ok_or_else(|| HealthError::validation("limit must be a positive integer"))
    }
}

/// Non-empty string parameter or a "<name> is required" validation error
pub fn required<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str> {
    value
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| HealthError::Validation(format!("{} is required", name)))
}

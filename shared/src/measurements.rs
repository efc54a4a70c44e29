use crate::error::{HealthError, Result};
use crate::store::{history_bounds, MeasurementStore};
use crate::summary::{now_rfc3339, AggregateMaintainer};
use crate::types::{MeasurementRecord, MetricValues, StoredRecord, SummaryKind, SummaryRecord};

/// Reject empty metric sets and out-of-range values. Every violation is
/// reported, joined with "; ".
pub fn validate_values(values: &MetricValues) -> Result<()> {
    if values.is_empty() {
        return Err(HealthError::validation(
            "at least one of weight, height or body_fat_percentage is required",
        ));
    }

    let errors: Vec<&str> = values
        .iter()
        .filter(|(metric, value)| {
            let (min, max) = metric.bounds();
            *value < min || *value > max
        })
        .map(|(metric, _)| metric.range_message())
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(HealthError::Validation(errors.join("; ")))
    }
}

/// A caller-supplied `measurement_time` becomes the record id, so it must be
/// a real timestamp: RFC 3339, or ISO-8601 date-time without an offset.
/// Anything else (summary sentinel ids included) is rejected.
pub fn validate_measurement_time(measurement_time: &str) -> Result<()> {
    let parses = chrono::DateTime::parse_from_rfc3339(measurement_time).is_ok()
        || chrono::NaiveDateTime::parse_from_str(measurement_time, "%Y-%m-%dT%H:%M:%S%.f").is_ok();
    if parses {
        Ok(())
    } else {
        Err(HealthError::Validation(format!(
            "measurement_time must be an ISO-8601 timestamp, got '{}'",
            measurement_time
        )))
    }
}

/// Body measurement operations over a measurement store
pub struct BodyMeasurementService<S> {
    store: S,
}

impl<S: MeasurementStore> BodyMeasurementService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn maintainer(&self) -> AggregateMaintainer<'_, S> {
        AggregateMaintainer::new(&self.store)
    }

    /// Record a new measurement. `measurement_time` defaults to now and
    /// becomes the measurement id.
    pub async fn add(
        &self,
        user_id: &str,
        values: MetricValues,
        measurement_time: Option<String>,
    ) -> Result<MeasurementRecord> {
        validate_values(&values)?;

        let now = now_rfc3339();
        let measurement_time = match measurement_time.filter(|t| !t.is_empty()) {
            Some(time) => {
                validate_measurement_time(&time)?;
                time
            }
            None => now.clone(),
        };

        let record = MeasurementRecord {
            user_id: user_id.to_string(),
            measurement_time,
            values,
            created_at: now,
            updated_at: None,
        };

        self.store.put_measurement(&record).await?;
        tracing::debug!("Saved measurement record: {:?}", record);

        let summary_result = self.maintainer().record_added(&record).await;
        log_summary_failure("add", user_id, summary_result);

        tracing::info!("Measurement added successfully for user: {}", user_id);
        Ok(record)
    }

    /// Merge `values` into an existing measurement; unmentioned metrics keep
    /// their stored value. Returns the rewritten record.
    pub async fn update(
        &self,
        user_id: &str,
        measurement_id: &str,
        values: MetricValues,
    ) -> Result<MeasurementRecord> {
        validate_values(&values)?;

        let mut record = self.existing(user_id, measurement_id).await?;
        record.values.merge(&values);
        record.updated_at = Some(now_rfc3339());

        self.store.put_measurement(&record).await?;
        tracing::debug!("Updated measurement record: {}", measurement_id);

        let summary_result = self.maintainer().record_updated(user_id).await;
        log_summary_failure("update", user_id, summary_result);

        tracing::info!("Measurement updated successfully for user: {}", user_id);
        Ok(record)
    }

    pub async fn delete(&self, user_id: &str, measurement_id: &str) -> Result<()> {
        let record = self.existing(user_id, measurement_id).await?;

        self.store
            .delete_measurement(user_id, record.measurement_id())
            .await?;
        tracing::debug!("Deleted measurement record: {}", measurement_id);

        let summary_result = self.maintainer().record_deleted(user_id).await;
        log_summary_failure("delete", user_id, summary_result);

        tracing::info!("Measurement deleted successfully for user: {}", user_id);
        Ok(())
    }

    /// Latest summary, or `None` if the user has no measurements
    pub async fn latest(&self, user_id: &str) -> Result<Option<SummaryRecord>> {
        self.store.get_summary(user_id, SummaryKind::Latest).await
    }

    /// Oldest summary, or `None` if the user has no measurements
    pub async fn oldest(&self, user_id: &str) -> Result<Option<SummaryRecord>> {
        self.store.get_summary(user_id, SummaryKind::Oldest).await
    }

    /// Regular records between the two dates, newest first, at most `limit`
    pub async fn history(
        &self,
        user_id: &str,
        start_date: &str,
        end_date: &str,
        limit: usize,
    ) -> Result<Vec<MeasurementRecord>> {
        let (start_key, end_key) = history_bounds(start_date, end_date);
        let records = self
            .store
            .query_range(user_id, &start_key, &end_key, limit)
            .await?;

        Ok(records
            .into_iter()
            .filter_map(StoredRecord::into_measurement)
            .collect())
    }

    /// The store is keyed by user, so a hit is always owned by the caller
    async fn existing(&self, user_id: &str, measurement_id: &str) -> Result<MeasurementRecord> {
        self.store
            .get_measurement(user_id, measurement_id)
            .await?
            .ok_or_else(|| {
                HealthError::Validation(format!("measurement {} not found", measurement_id))
            })
    }
}

/// Summary maintenance never fails the primary write
fn log_summary_failure(operation: &str, user_id: &str, result: Result<()>) {
    if let Err(e) = result {
        tracing::warn!(
            "Error updating latest/oldest records after {} for user {}: {}",
            operation,
            user_id,
            e
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn only(metric: crate::types::Metric, value: Decimal) -> MetricValues {
        let mut values = MetricValues::default();
        values.set(metric, value);
        values
    }

    #[test]
    fn range_boundaries_are_inclusive() {
        use crate::types::Metric::*;

        for (metric, value) in [
            (Weight, dec!(1)),
            (Weight, dec!(1000)),
            (Height, dec!(50)),
            (Height, dec!(300)),
            (BodyFatPercentage, dec!(0)),
            (BodyFatPercentage, dec!(100)),
        ] {
            assert!(
                validate_values(&only(metric, value)).is_ok(),
                "{} = {} should be accepted",
                metric,
                value
            );
        }

        for (metric, value) in [
            (Weight, dec!(0)),
            (Weight, dec!(1001)),
            (Height, dec!(49)),
            (Height, dec!(301)),
            (BodyFatPercentage, dec!(-1)),
            (BodyFatPercentage, dec!(101)),
        ] {
            assert!(
                validate_values(&only(metric, value)).is_err(),
                "{} = {} should be rejected",
                metric,
                value
            );
        }
    }

    #[test]
    fn all_violations_reported_together() {
        let values = MetricValues {
            weight: Some(dec!(0)),
            height: Some(dec!(400)),
            body_fat_percentage: Some(dec!(20)),
        };

        let message = validate_values(&values).unwrap_err().to_string();

        assert!(message.contains("weight must be between 1 and 1000 kg"));
        assert!(message.contains("; height must be between 50 and 300 cm"));
        assert!(!message.contains("body_fat_percentage"));
    }

    #[test]
    fn measurement_time_must_be_a_timestamp() {
        for ok in [
            "2024-03-01T07:30:00+00:00",
            "2024-03-01T07:30:00Z",
            "2024-03-01T07:30:00.123456+09:00",
            "2024-03-01T07:30:00",
        ] {
            assert!(validate_measurement_time(ok).is_ok(), "{} should be accepted", ok);
        }

        for bad in ["latest", "oldest", "x#latest", "2024-03-01", "yesterday"] {
            let err = validate_measurement_time(bad).unwrap_err();
            assert_eq!(err.error_type(), "ValidationError", "{} should be rejected", bad);
        }
    }

    #[test]
    fn empty_metric_set_rejected() {
        let err = validate_values(&MetricValues::default()).unwrap_err();
        assert_eq!(err.error_type(), "ValidationError");
    }
}

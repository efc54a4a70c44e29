use super::{
    is_summary_sort_key, measurement_sort_key, summary_sort_key, MeasurementStore, PARTITION_KEY,
    SORT_KEY,
};
use crate::error::{HealthError, Result};
use crate::types::{
    MeasurementRecord, Metric, MetricValues, StoredRecord, SummaryEntry, SummaryKind,
    SummaryRecord,
};
use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client as DynamoClient;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;

type Item = HashMap<String, AttributeValue>;

const RECORD_TYPE: &str = "record_type";

/// Measurement store backed by a single DynamoDB table keyed on
/// (userId, measurementId)
pub struct DynamoMeasurementStore {
    client: DynamoClient,
    table_name: String,
}

impl DynamoMeasurementStore {
    pub fn new(client: DynamoClient, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    async fn get_by_sort_key(&self, user_id: &str, sort_key: String) -> Result<Option<Item>> {
        let result = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key(PARTITION_KEY, AttributeValue::S(user_id.to_string()))
            .key(SORT_KEY, AttributeValue::S(sort_key))
            .send()
            .await?;

        Ok(result.item().cloned())
    }

    async fn delete_by_sort_key(&self, user_id: &str, sort_key: String) -> Result<()> {
        self.client
            .delete_item()
            .table_name(&self.table_name)
            .key(PARTITION_KEY, AttributeValue::S(user_id.to_string()))
            .key(SORT_KEY, AttributeValue::S(sort_key))
            .send()
            .await?;
        Ok(())
    }
}

#[async_trait]
impl MeasurementStore for DynamoMeasurementStore {
    async fn put_measurement(&self, record: &MeasurementRecord) -> Result<()> {
        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(measurement_to_item(record)))
            .send()
            .await?;

        tracing::debug!(
            "Saved measurement record {} for user {}",
            record.measurement_id(),
            record.user_id
        );
        Ok(())
    }

    async fn get_measurement(
        &self,
        user_id: &str,
        measurement_id: &str,
    ) -> Result<Option<MeasurementRecord>> {
        let sort_key = measurement_sort_key(measurement_id);
        if is_summary_sort_key(&sort_key) {
            return Ok(None);
        }

        match self.get_by_sort_key(user_id, sort_key).await? {
            Some(item) => Ok(Some(item_to_measurement(&item)?)),
            None => Ok(None),
        }
    }

    async fn delete_measurement(&self, user_id: &str, measurement_id: &str) -> Result<()> {
        self.delete_by_sort_key(user_id, measurement_sort_key(measurement_id))
            .await
    }

    async fn query_all(&self, user_id: &str) -> Result<Vec<StoredRecord>> {
        let mut records = Vec::new();
        let mut start_key: Option<Item> = None;

        loop {
            let resp = self
                .client
                .query()
                .table_name(&self.table_name)
                .key_condition_expression("#pk = :pk")
                .expression_attribute_names("#pk", PARTITION_KEY)
                .expression_attribute_values(":pk", AttributeValue::S(user_id.to_string()))
                .set_exclusive_start_key(start_key.take())
                .send()
                .await?;

            for item in resp.items() {
                records.push(item_to_record(item)?);
            }

            match resp.last_evaluated_key() {
                Some(key) if !key.is_empty() => start_key = Some(key.clone()),
                _ => break,
            }
        }

        Ok(records)
    }

    async fn query_range(
        &self,
        user_id: &str,
        start_key: &str,
        end_key: &str,
        limit: usize,
    ) -> Result<Vec<StoredRecord>> {
        let resp = self
            .client
            .query()
            .table_name(&self.table_name)
            .key_condition_expression("#pk = :pk AND #sk BETWEEN :start_sk AND :end_sk")
            .expression_attribute_names("#pk", PARTITION_KEY)
            .expression_attribute_names("#sk", SORT_KEY)
            .expression_attribute_values(":pk", AttributeValue::S(user_id.to_string()))
            .expression_attribute_values(":start_sk", AttributeValue::S(start_key.to_string()))
            .expression_attribute_values(":end_sk", AttributeValue::S(end_key.to_string()))
            .limit(i32::try_from(limit).unwrap_or(i32::MAX))
            .scan_index_forward(false)
            .send()
            .await?;

        resp.items().iter().map(item_to_record).collect()
    }

    async fn get_summary(&self, user_id: &str, kind: SummaryKind) -> Result<Option<SummaryRecord>> {
        match self.get_by_sort_key(user_id, summary_sort_key(kind)).await? {
            Some(item) => Ok(Some(item_to_summary(&item, kind)?)),
            None => Ok(None),
        }
    }

    async fn put_summary(&self, summary: &SummaryRecord) -> Result<()> {
        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(summary_to_item(summary)))
            .send()
            .await?;

        tracing::debug!(
            "Wrote {} record for user {}",
            summary.kind.as_str(),
            summary.user_id
        );
        Ok(())
    }

    async fn delete_summary(&self, user_id: &str, kind: SummaryKind) -> Result<()> {
        self.delete_by_sort_key(user_id, summary_sort_key(kind)).await
    }
}

// ========== ITEM CODEC ==========

pub(crate) fn measurement_to_item(record: &MeasurementRecord) -> Item {
    let mut item = HashMap::new();
    item.insert(
        PARTITION_KEY.to_string(),
        AttributeValue::S(record.user_id.clone()),
    );
    item.insert(
        SORT_KEY.to_string(),
        AttributeValue::S(measurement_sort_key(record.measurement_id())),
    );
    for (metric, value) in record.values.iter() {
        item.insert(metric.as_str().to_string(), AttributeValue::N(value.to_string()));
    }
    item.insert(
        "measurement_time".to_string(),
        AttributeValue::S(record.measurement_time.clone()),
    );
    item.insert(
        "created_at".to_string(),
        AttributeValue::S(record.created_at.clone()),
    );
    if let Some(updated_at) = &record.updated_at {
        item.insert("updated_at".to_string(), AttributeValue::S(updated_at.clone()));
    }
    item
}

pub(crate) fn summary_to_item(summary: &SummaryRecord) -> Item {
    let mut item = HashMap::new();
    item.insert(
        PARTITION_KEY.to_string(),
        AttributeValue::S(summary.user_id.clone()),
    );
    item.insert(
        SORT_KEY.to_string(),
        AttributeValue::S(summary_sort_key(summary.kind)),
    );
    item.insert(
        RECORD_TYPE.to_string(),
        AttributeValue::S(summary.kind.as_str().to_string()),
    );
    for (metric, entry) in summary.entries() {
        item.insert(
            metric.as_str().to_string(),
            AttributeValue::N(entry.value.to_string()),
        );
        item.insert(
            summary.kind.timestamp_field(metric),
            AttributeValue::S(entry.reported_at.clone()),
        );
    }
    item.insert(
        "updated_at".to_string(),
        AttributeValue::S(summary.updated_at.clone()),
    );
    item
}

pub(crate) fn item_to_record(item: &Item) -> Result<StoredRecord> {
    let sort_key = required_s(item, SORT_KEY)?;
    if is_summary_sort_key(sort_key) {
        let kind = item
            .get(RECORD_TYPE)
            .and_then(|v| v.as_s().ok())
            .and_then(|s| SummaryKind::parse(s))
            .or_else(|| sort_key.rsplit('#').next().and_then(SummaryKind::parse))
            .ok_or_else(|| {
                HealthError::Internal(format!("unrecognised summary record {}", sort_key))
            })?;
        Ok(StoredRecord::Summary(item_to_summary(item, kind)?))
    } else {
        Ok(StoredRecord::Measurement(item_to_measurement(item)?))
    }
}

pub(crate) fn item_to_measurement(item: &Item) -> Result<MeasurementRecord> {
    let user_id = required_s(item, PARTITION_KEY)?.to_string();
    let sort_key = required_s(item, SORT_KEY)?;
    let measurement_time = match item.get("measurement_time").and_then(|v| v.as_s().ok()) {
        Some(time) => time.to_string(),
        None => sort_key
            .strip_prefix(super::SORT_KEY_PREFIX)
            .unwrap_or(sort_key)
            .to_string(),
    };

    let mut values = MetricValues::default();
    for metric in Metric::ALL {
        if let Some(value) = optional_n(item, metric.as_str())? {
            values.set(metric, value);
        }
    }

    Ok(MeasurementRecord {
        user_id,
        measurement_time,
        values,
        created_at: item
            .get("created_at")
            .and_then(|v| v.as_s().ok())
            .map(|s| s.to_string())
            .unwrap_or_default(),
        updated_at: item
            .get("updated_at")
            .and_then(|v| v.as_s().ok())
            .map(|s| s.to_string()),
    })
}

pub(crate) fn item_to_summary(item: &Item, kind: SummaryKind) -> Result<SummaryRecord> {
    let user_id = required_s(item, PARTITION_KEY)?;
    let updated_at = item
        .get("updated_at")
        .and_then(|v| v.as_s().ok())
        .map(|s| s.as_str())
        .unwrap_or_default();

    let mut summary = SummaryRecord::empty(user_id, kind, updated_at);
    for metric in Metric::ALL {
        if let Some(value) = optional_n(item, metric.as_str())? {
            let reported_at = item
                .get(&kind.timestamp_field(metric))
                .and_then(|v| v.as_s().ok())
                .map(|s| s.to_string())
                .unwrap_or_default();
            summary.set_entry(metric, SummaryEntry { value, reported_at });
        }
    }
    Ok(summary)
}

fn required_s<'a>(item: &'a Item, key: &str) -> Result<&'a String> {
    item.get(key)
        .and_then(|v| v.as_s().ok())
        .ok_or_else(|| HealthError::Internal(format!("item is missing string attribute {}", key)))
}

fn optional_n(item: &Item, key: &str) -> Result<Option<Decimal>> {
    match item.get(key).and_then(|v| v.as_n().ok()) {
        Some(raw) => Decimal::from_str(raw)
            .or_else(|_| Decimal::from_scientific(raw))
            .map(Some)
            .map_err(|e| HealthError::Internal(format!("attribute {} is not a decimal: {}", key, e))),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_record() -> MeasurementRecord {
        MeasurementRecord {
            user_id: "user-1".to_string(),
            measurement_time: "2024-02-10T07:15:00+00:00".to_string(),
            values: MetricValues {
                weight: Some(dec!(68.40)),
                height: None,
                body_fat_percentage: Some(dec!(21.5)),
            },
            created_at: "2024-02-10T07:15:02+00:00".to_string(),
            updated_at: None,
        }
    }

    #[test]
    fn measurement_item_layout() {
        let item = measurement_to_item(&sample_record());

        assert_eq!(item["userId"].as_s().unwrap(), "user-1");
        assert_eq!(
            item["measurementId"].as_s().unwrap(),
            "MEASUREMENT#2024-02-10T07:15:00+00:00"
        );
        assert_eq!(item["weight"].as_n().unwrap(), "68.40");
        assert!(!item.contains_key("height"));
        assert!(!item.contains_key("record_type"));
        assert!(!item.contains_key("updated_at"));
    }

    #[test]
    fn measurement_item_decodes_without_precision_loss() {
        let record = sample_record();
        let decoded = item_to_measurement(&measurement_to_item(&record)).unwrap();

        assert_eq!(decoded, record);
        assert_eq!(decoded.values.weight.unwrap().to_string(), "68.40");
    }

    #[test]
    fn summary_item_uses_kind_timestamp_fields() {
        let mut summary = SummaryRecord::empty("user-1", SummaryKind::Oldest, "2024-02-11T00:00:00Z");
        summary.set_entry(
            Metric::Weight,
            SummaryEntry {
                value: dec!(70),
                reported_at: "2023-12-31T08:00:00Z".to_string(),
            },
        );

        let item = summary_to_item(&summary);

        assert_eq!(item["measurementId"].as_s().unwrap(), "MEASUREMENT#oldest");
        assert_eq!(item["record_type"].as_s().unwrap(), "oldest");
        assert_eq!(item["first_weight_record"].as_s().unwrap(), "2023-12-31T08:00:00Z");
        assert!(!item.contains_key("last_weight_update"));
    }

    #[test]
    fn partition_items_are_classified_by_sort_key() {
        let summary = SummaryRecord::empty("user-1", SummaryKind::Latest, "t");
        let stored = item_to_record(&summary_to_item(&summary)).unwrap();
        assert!(matches!(stored, StoredRecord::Summary(s) if s.kind == SummaryKind::Latest));

        let stored = item_to_record(&measurement_to_item(&sample_record())).unwrap();
        assert!(matches!(stored, StoredRecord::Measurement(_)));
    }

    #[test]
    fn store_reports_configured_table() {
        let conf = aws_sdk_dynamodb::Config::builder()
            .behavior_version(aws_sdk_dynamodb::config::BehaviorVersion::latest())
            .region(aws_sdk_dynamodb::config::Region::new("us-east-1"))
            .build();
        let store = DynamoMeasurementStore::new(DynamoClient::from_conf(conf), "measurements-dev");

        assert_eq!(store.table_name(), "measurements-dev");
    }

    #[test]
    fn non_numeric_attribute_is_internal_error() {
        let mut item = measurement_to_item(&sample_record());
        item.insert("weight".to_string(), AttributeValue::N("heavy".to_string()));

        let err = item_to_measurement(&item).unwrap_err();
        assert_eq!(err.error_type(), "InternalError");
    }
}

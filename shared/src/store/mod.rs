pub mod dynamo;
pub mod memory;

use crate::error::Result;
use crate::types::{MeasurementRecord, StoredRecord, SummaryKind, SummaryRecord};
use async_trait::async_trait;

pub use dynamo::DynamoMeasurementStore;
pub use memory::InMemoryMeasurementStore;

pub const PARTITION_KEY: &str = "userId";
pub const SORT_KEY: &str = "measurementId";
pub const SORT_KEY_PREFIX: &str = "MEASUREMENT#";

/// Sort key for a regular measurement: MEASUREMENT#<measurement_time>
pub fn measurement_sort_key(measurement_id: &str) -> String {
    format!("{}{}", SORT_KEY_PREFIX, measurement_id)
}

/// Sort key for a summary sentinel: MEASUREMENT#latest / MEASUREMENT#oldest
pub fn summary_sort_key(kind: SummaryKind) -> String {
    format!("{}{}", SORT_KEY_PREFIX, kind.as_str())
}

/// Summary sentinels share the partition with regular records and are
/// told apart by id suffix only.
pub fn is_summary_sort_key(sort_key: &str) -> bool {
    SummaryKind::ALL
        .iter()
        .any(|kind| sort_key.ends_with(&format!("#{}", kind.as_str())))
}

/// Inclusive sort-key bounds for a history query. The trailing `Z` makes
/// the end bound cover every timestamp on the end date.
pub fn history_bounds(start_date: &str, end_date: &str) -> (String, String) {
    (
        measurement_sort_key(start_date),
        format!("{}Z", measurement_sort_key(end_date)),
    )
}

/// Durable storage of measurement and summary records, one partition per
/// user. Summary writes go only through `put_summary`/`delete_summary`, so
/// an implementation may make them conditional without touching callers.
#[async_trait]
pub trait MeasurementStore: Send + Sync {
    /// Insert or fully replace the record at (user, measurement id)
    async fn put_measurement(&self, record: &MeasurementRecord) -> Result<()>;

    async fn get_measurement(
        &self,
        user_id: &str,
        measurement_id: &str,
    ) -> Result<Option<MeasurementRecord>>;

    /// Deleting an absent key is not an error here
    async fn delete_measurement(&self, user_id: &str, measurement_id: &str) -> Result<()>;

    /// Every record in the user's partition, summaries included
    async fn query_all(&self, user_id: &str) -> Result<Vec<StoredRecord>>;

    /// Records whose sort key lies in `[start_key, end_key]`, newest first,
    /// at most `limit`. The limit applies before callers filter sentinels.
    async fn query_range(
        &self,
        user_id: &str,
        start_key: &str,
        end_key: &str,
        limit: usize,
    ) -> Result<Vec<StoredRecord>>;

    async fn get_summary(&self, user_id: &str, kind: SummaryKind) -> Result<Option<SummaryRecord>>;

    async fn put_summary(&self, summary: &SummaryRecord) -> Result<()>;

    async fn delete_summary(&self, user_id: &str, kind: SummaryKind) -> Result<()>;
}

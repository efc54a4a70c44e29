use super::{measurement_sort_key, summary_sort_key, MeasurementStore};
use crate::error::{HealthError, Result};
use crate::types::{MeasurementRecord, StoredRecord, SummaryKind, SummaryRecord};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// In-process store with the same key layout as the DynamoDB table.
/// Summary writes and partition reads can be made to fail to exercise
/// best-effort handling.
#[derive(Default)]
pub struct InMemoryMeasurementStore {
    items: Mutex<BTreeMap<(String, String), StoredRecord>>,
    fail_summary_writes: AtomicBool,
    fail_queries: AtomicBool,
}

impl InMemoryMeasurementStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, `put_summary` and `delete_summary` return a storage error
    pub fn set_fail_summary_writes(&self, fail: bool) {
        self.fail_summary_writes.store(fail, Ordering::SeqCst);
    }

    /// While set, `query_all` and `get_summary` return a storage error.
    /// Single-record reads and writes are unaffected.
    pub fn set_fail_queries(&self, fail: bool) {
        self.fail_queries.store(fail, Ordering::SeqCst);
    }

    /// Number of stored items for a user, sentinels included
    pub fn item_count(&self, user_id: &str) -> usize {
        self.lock()
            .map(|items| items.keys().filter(|(user, _)| user == user_id).count())
            .unwrap_or(0)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<(String, String), StoredRecord>>> {
        self.items
            .lock()
            .map_err(|_| HealthError::Internal("in-memory store lock poisoned".to_string()))
    }

    fn check_summary_write(&self) -> Result<()> {
        if self.fail_summary_writes.load(Ordering::SeqCst) {
            return Err(HealthError::Storage {
                code: "InternalServerError".to_string(),
                message: "injected summary write failure".to_string(),
            });
        }
        Ok(())
    }

    fn check_query(&self) -> Result<()> {
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(HealthError::Storage {
                code: "ProvisionedThroughputExceededException".to_string(),
                message: "injected query failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl MeasurementStore for InMemoryMeasurementStore {
    async fn put_measurement(&self, record: &MeasurementRecord) -> Result<()> {
        let key = (
            record.user_id.clone(),
            measurement_sort_key(record.measurement_id()),
        );
        self.lock()?
            .insert(key, StoredRecord::Measurement(record.clone()));
        Ok(())
    }

    async fn get_measurement(
        &self,
        user_id: &str,
        measurement_id: &str,
    ) -> Result<Option<MeasurementRecord>> {
        let key = (user_id.to_string(), measurement_sort_key(measurement_id));
        Ok(self
            .lock()?
            .get(&key)
            .cloned()
            .and_then(StoredRecord::into_measurement))
    }

    async fn delete_measurement(&self, user_id: &str, measurement_id: &str) -> Result<()> {
        let key = (user_id.to_string(), measurement_sort_key(measurement_id));
        self.lock()?.remove(&key);
        Ok(())
    }

    async fn query_all(&self, user_id: &str) -> Result<Vec<StoredRecord>> {
        self.check_query()?;
        Ok(self
            .lock()?
            .iter()
            .filter(|((user, _), _)| user == user_id)
            .map(|(_, record)| record.clone())
            .collect())
    }

    async fn query_range(
        &self,
        user_id: &str,
        start_key: &str,
        end_key: &str,
        limit: usize,
    ) -> Result<Vec<StoredRecord>> {
        Ok(self
            .lock()?
            .iter()
            .rev()
            .filter(|((user, sort_key), _)| {
                user == user_id && sort_key.as_str() >= start_key && sort_key.as_str() <= end_key
            })
            .take(limit)
            .map(|(_, record)| record.clone())
            .collect())
    }

    async fn get_summary(&self, user_id: &str, kind: SummaryKind) -> Result<Option<SummaryRecord>> {
        self.check_query()?;
        let key = (user_id.to_string(), summary_sort_key(kind));
        Ok(match self.lock()?.get(&key) {
            Some(StoredRecord::Summary(summary)) => Some(summary.clone()),
            _ => None,
        })
    }

    async fn put_summary(&self, summary: &SummaryRecord) -> Result<()> {
        self.check_summary_write()?;
        let key = (summary.user_id.clone(), summary_sort_key(summary.kind));
        self.lock()?
            .insert(key, StoredRecord::Summary(summary.clone()));
        Ok(())
    }

    async fn delete_summary(&self, user_id: &str, kind: SummaryKind) -> Result<()> {
        self.check_summary_write()?;
        let key = (user_id.to_string(), summary_sort_key(kind));
        self.lock()?.remove(&key);
        Ok(())
    }
}

//! Latest/Oldest summary maintenance.
//!
//! Every user has up to two summary records next to their measurements:
//! Latest holds, per metric, the most recently reported value and Oldest
//! the earliest. They are maintained incrementally on add and recomputed
//! from the full partition on update and delete.
//!
//! Consistency is best-effort. Nothing here locks or writes conditionally,
//! so two concurrent adds for one user can clobber each other's summary
//! write; the next update or delete recomputes from scratch and repairs
//! it. Callers log failures from this module instead of failing the
//! primary write, which has already been persisted.
//!
//! Known limitation: the add path treats the new record as the latest
//! report for every metric it carries, whatever its `measurement_time`.
//! A backfilled add with an old timestamp therefore overwrites Latest
//! until the next recompute. Downstream consumers rely on this, so it is
//! kept pending a product decision.

use crate::error::Result;
use crate::store::MeasurementStore;
use crate::types::{MeasurementRecord, Metric, StoredRecord, SummaryEntry, SummaryKind, SummaryRecord};

/// Both summaries as exact clones of a user's only record
pub fn clone_first(record: &MeasurementRecord, now: &str) -> (SummaryRecord, SummaryRecord) {
    let build = |kind| {
        let mut summary = SummaryRecord::empty(&record.user_id, kind, now);
        for (metric, value) in record.values.iter() {
            summary.set_entry(
                metric,
                SummaryEntry {
                    value,
                    reported_at: record.measurement_time.clone(),
                },
            );
        }
        summary
    };
    (build(SummaryKind::Latest), build(SummaryKind::Oldest))
}

/// Fold a newly added record into a summary.
///
/// Latest: every metric the record carries is overwritten (last write wins).
/// Oldest: a metric is only filled in if the summary has none yet.
pub fn apply_add(
    current: Option<SummaryRecord>,
    kind: SummaryKind,
    record: &MeasurementRecord,
    now: &str,
) -> SummaryRecord {
    let mut summary =
        current.unwrap_or_else(|| SummaryRecord::empty(&record.user_id, kind, now));

    for (metric, value) in record.values.iter() {
        let overwrite = match kind {
            SummaryKind::Latest => true,
            SummaryKind::Oldest => summary.entry(metric).is_none(),
        };
        if overwrite {
            summary.set_entry(
                metric,
                SummaryEntry {
                    value,
                    reported_at: record.measurement_time.clone(),
                },
            );
        }
    }

    summary.updated_at = now.to_string();
    summary
}

/// Full recomputation: per metric, take the record with the greatest
/// (Latest) or smallest (Oldest) `measurement_time` carrying it.
/// Returns `None` when no record carries any metric.
pub fn recompute(
    user_id: &str,
    kind: SummaryKind,
    records: &[MeasurementRecord],
    now: &str,
) -> Option<SummaryRecord> {
    let mut summary = SummaryRecord::empty(user_id, kind, now);

    for metric in Metric::ALL {
        let carrying = records
            .iter()
            .filter_map(|r| r.values.get(metric).map(|value| (r, value)));
        let chosen = match kind {
            SummaryKind::Latest => {
                carrying.max_by(|(a, _), (b, _)| a.measurement_time.cmp(&b.measurement_time))
            }
            SummaryKind::Oldest => {
                carrying.min_by(|(a, _), (b, _)| a.measurement_time.cmp(&b.measurement_time))
            }
        };

        if let Some((record, value)) = chosen {
            summary.set_entry(
                metric,
                SummaryEntry {
                    value,
                    reported_at: record.measurement_time.clone(),
                },
            );
        }
    }

    if summary.is_empty() {
        None
    } else {
        Some(summary)
    }
}

/// Keeps a user's summary records in step with their measurements
pub struct AggregateMaintainer<'a, S: MeasurementStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: MeasurementStore + ?Sized> AggregateMaintainer<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Regular (non-sentinel) records for a user
    pub async fn regular_records(&self, user_id: &str) -> Result<Vec<MeasurementRecord>> {
        Ok(self
            .store
            .query_all(user_id)
            .await?
            .into_iter()
            .filter_map(StoredRecord::into_measurement)
            .collect())
    }

    /// Called after `record` has been persisted
    pub async fn record_added(&self, record: &MeasurementRecord) -> Result<()> {
        let now = now_rfc3339();
        let regular = self.regular_records(&record.user_id).await?;

        // Count includes the record just written
        if regular.len() <= 1 {
            let (latest, oldest) = clone_first(record, &now);
            self.store.put_summary(&latest).await?;
            self.store.put_summary(&oldest).await?;
            tracing::debug!(
                "Created initial latest/oldest records for user {}",
                record.user_id
            );
            return Ok(());
        }

        for kind in SummaryKind::ALL {
            let current = self.store.get_summary(&record.user_id, kind).await?;
            let updated = apply_add(current, kind, record, &now);
            self.store.put_summary(&updated).await?;
            tracing::debug!("Updated {} record for user {}", kind.as_str(), record.user_id);
        }
        Ok(())
    }

    /// Called after a record's values changed. Only Latest is rebuilt: an
    /// update changes a value, not which record came first.
    pub async fn record_updated(&self, user_id: &str) -> Result<()> {
        let regular = self.regular_records(user_id).await?;
        self.rewrite(user_id, SummaryKind::Latest, &regular).await
    }

    /// Called after a record was removed; rebuilds both summaries
    pub async fn record_deleted(&self, user_id: &str) -> Result<()> {
        let regular = self.regular_records(user_id).await?;
        for kind in SummaryKind::ALL {
            self.rewrite(user_id, kind, &regular).await?;
        }
        Ok(())
    }

    async fn rewrite(
        &self,
        user_id: &str,
        kind: SummaryKind,
        regular: &[MeasurementRecord],
    ) -> Result<()> {
        match recompute(user_id, kind, regular, &now_rfc3339()) {
            Some(summary) => {
                self.store.put_summary(&summary).await?;
                tracing::debug!("Recalculated {} record for user {}", kind.as_str(), user_id);
            }
            None => {
                self.store.delete_summary(user_id, kind).await?;
                tracing::debug!(
                    "Deleted {} record (no measurements left) for user {}",
                    kind.as_str(),
                    user_id
                );
            }
        }
        Ok(())
    }
}

pub(crate) fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, false)
}

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;

// ========== METRIC ==========
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    Weight,
    Height,
    BodyFatPercentage,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::Weight, Metric::Height, Metric::BodyFatPercentage];

    /// Attribute / parameter name used on the wire and in DynamoDB
    pub fn as_str(self) -> &'static str {
        match self {
            Metric::Weight => "weight",
            Metric::Height => "height",
            Metric::BodyFatPercentage => "body_fat_percentage",
        }
    }

    /// Inclusive accepted range: weight in kg, height in cm, body fat in %
    pub fn bounds(self) -> (Decimal, Decimal) {
        match self {
            Metric::Weight => (Decimal::ONE, Decimal::ONE_THOUSAND),
            Metric::Height => (Decimal::from(50), Decimal::from(300)),
            Metric::BodyFatPercentage => (Decimal::ZERO, Decimal::ONE_HUNDRED),
        }
    }

    pub fn range_message(self) -> &'static str {
        match self {
            Metric::Weight => "weight must be between 1 and 1000 kg",
            Metric::Height => "height must be between 50 and 300 cm",
            Metric::BodyFatPercentage => "body_fat_percentage must be between 0 and 100 %",
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sparse set of reported metrics. A record only carries what was measured.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricValues {
    pub weight: Option<Decimal>,
    pub height: Option<Decimal>,
    pub body_fat_percentage: Option<Decimal>,
}

impl MetricValues {
    pub fn get(&self, metric: Metric) -> Option<Decimal> {
        match metric {
            Metric::Weight => self.weight,
            Metric::Height => self.height,
            Metric::BodyFatPercentage => self.body_fat_percentage,
        }
    }

    pub fn set(&mut self, metric: Metric, value: Decimal) {
        match metric {
            Metric::Weight => self.weight = Some(value),
            Metric::Height => self.height = Some(value),
            Metric::BodyFatPercentage => self.body_fat_percentage = Some(value),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    /// Present metrics in `Metric::ALL` order
    pub fn iter(&self) -> impl Iterator<Item = (Metric, Decimal)> + '_ {
        Metric::ALL
            .into_iter()
            .filter_map(move |metric| self.get(metric).map(|value| (metric, value)))
    }

    /// Overlay `other` on top of `self`; metrics not in `other` are kept
    pub fn merge(&mut self, other: &MetricValues) {
        for (metric, value) in other.iter() {
            self.set(metric, value);
        }
    }

    /// Presentation form: metric name -> float
    pub fn to_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        for (metric, value) in self.iter() {
            map.insert(metric.as_str().to_string(), decimal_to_json(value));
        }
        serde_json::Value::Object(map)
    }
}

/// Decimals stay exact through storage; floats only appear in responses
pub fn decimal_to_json(value: Decimal) -> serde_json::Value {
    value
        .to_f64()
        .and_then(serde_json::Number::from_f64)
        .map(serde_json::Value::Number)
        .unwrap_or_else(|| serde_json::Value::String(value.to_string()))
}

// ========== MEASUREMENT ==========
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeasurementRecord {
    pub user_id: String,
    /// ISO-8601 time the user reported; doubles as the record id
    pub measurement_time: String,
    pub values: MetricValues,
    pub created_at: String,
    pub updated_at: Option<String>,
}

impl MeasurementRecord {
    pub fn measurement_id(&self) -> &str {
        &self.measurement_time
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct MeasurementView {
    pub measurement_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_fat_percentage: Option<f64>,
    pub measurement_time: String,
    pub created_at: String,
}

impl From<&MeasurementRecord> for MeasurementView {
    fn from(record: &MeasurementRecord) -> Self {
        let to_f64 = |v: Option<Decimal>| v.and_then(|d| d.to_f64());
        Self {
            measurement_id: record.measurement_id().to_string(),
            weight: to_f64(record.values.weight),
            height: to_f64(record.values.height),
            body_fat_percentage: to_f64(record.values.body_fat_percentage),
            measurement_time: record.measurement_time.clone(),
            created_at: record.created_at.clone(),
        }
    }
}

// ========== SUMMARY ==========
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SummaryKind {
    Latest,
    Oldest,
}

impl SummaryKind {
    pub const ALL: [SummaryKind; 2] = [SummaryKind::Latest, SummaryKind::Oldest];

    pub fn as_str(self) -> &'static str {
        match self {
            SummaryKind::Latest => "latest",
            SummaryKind::Oldest => "oldest",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "latest" => Some(SummaryKind::Latest),
            "oldest" => Some(SummaryKind::Oldest),
            _ => None,
        }
    }

    /// `last_weight_update` for Latest, `first_weight_record` for Oldest
    pub fn timestamp_field(self, metric: Metric) -> String {
        match self {
            SummaryKind::Latest => format!("last_{}_update", metric.as_str()),
            SummaryKind::Oldest => format!("first_{}_record", metric.as_str()),
        }
    }
}

/// One metric's value in a summary and when it was reported
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryEntry {
    pub value: Decimal,
    pub reported_at: String,
}

/// Denormalized Latest/Oldest rollup; always recomputable from the
/// user's regular records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryRecord {
    pub user_id: String,
    pub kind: SummaryKind,
    pub weight: Option<SummaryEntry>,
    pub height: Option<SummaryEntry>,
    pub body_fat_percentage: Option<SummaryEntry>,
    pub updated_at: String,
}

impl SummaryRecord {
    pub fn empty(user_id: &str, kind: SummaryKind, updated_at: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            kind,
            weight: None,
            height: None,
            body_fat_percentage: None,
            updated_at: updated_at.to_string(),
        }
    }

    pub fn entry(&self, metric: Metric) -> Option<&SummaryEntry> {
        match metric {
            Metric::Weight => self.weight.as_ref(),
            Metric::Height => self.height.as_ref(),
            Metric::BodyFatPercentage => self.body_fat_percentage.as_ref(),
        }
    }

    pub fn set_entry(&mut self, metric: Metric, entry: SummaryEntry) {
        let slot = match metric {
            Metric::Weight => &mut self.weight,
            Metric::Height => &mut self.height,
            Metric::BodyFatPercentage => &mut self.body_fat_percentage,
        };
        *slot = Some(entry);
    }

    pub fn entries(&self) -> impl Iterator<Item = (Metric, &SummaryEntry)> + '_ {
        Metric::ALL
            .into_iter()
            .filter_map(move |metric| self.entry(metric).map(|entry| (metric, entry)))
    }

    pub fn is_empty(&self) -> bool {
        self.entries().next().is_none()
    }

    pub fn values(&self) -> MetricValues {
        let mut values = MetricValues::default();
        for (metric, entry) in self.entries() {
            values.set(metric, entry.value);
        }
        values
    }

    /// Response body for GetLatest/GetOldest: metric values plus the
    /// kind-specific timestamp fields
    pub fn to_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        for (metric, entry) in self.entries() {
            map.insert(metric.as_str().to_string(), decimal_to_json(entry.value));
            map.insert(
                self.kind.timestamp_field(metric),
                serde_json::Value::String(entry.reported_at.clone()),
            );
        }
        serde_json::Value::Object(map)
    }
}

/// Anything stored under a user's partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredRecord {
    Measurement(MeasurementRecord),
    Summary(SummaryRecord),
}

impl StoredRecord {
    pub fn into_measurement(self) -> Option<MeasurementRecord> {
        match self {
            StoredRecord::Measurement(record) => Some(record),
            StoredRecord::Summary(_) => None,
        }
    }
}

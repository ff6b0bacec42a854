use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Upper bound on any retention window, in hours (ten years).
pub const MAX_RETENTION_HOURS: i64 = 87_600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TelemetryKind {
    UserBehavior,
    TaskPatterns,
    ProductivityMetrics,
    Environmental,
    Temporal,
}

impl TelemetryKind {
    pub const ALL: [TelemetryKind; 5] = [
        TelemetryKind::UserBehavior,
        TelemetryKind::TaskPatterns,
        TelemetryKind::ProductivityMetrics,
        TelemetryKind::Environmental,
        TelemetryKind::Temporal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TelemetryKind::UserBehavior => "user_behavior",
            TelemetryKind::TaskPatterns => "task_patterns",
            TelemetryKind::ProductivityMetrics => "productivity_metrics",
            TelemetryKind::Environmental => "environmental",
            TelemetryKind::Temporal => "temporal",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TelemetryCategory {
    RealTime,
    Historical,
    Predictive,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskBehaviorStats {
    pub tasks_created: usize,
    pub creation_rate_per_hour: f64,
    pub status_distribution: BTreeMap<String, usize>,
    pub priority_distribution: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionBehaviorStats {
    pub session_count: usize,
    pub avg_duration_minutes: f64,
    pub avg_productivity: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskPatternStats {
    pub total_tasks: usize,
    /// Keyed by project id; tasks without a project land under `unassigned`.
    pub project_distribution: BTreeMap<String, usize>,
    pub with_deadline: usize,
    pub overdue: usize,
    pub due_within_48h: usize,
    pub overdue_percentage: f64,
    pub avg_days_to_deadline: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductivityStats {
    /// 24 entries, one per hour of day. Hours without sessions hold 0.
    pub hourly_productivity: Vec<f64>,
    pub hourly_sessions: Vec<usize>,
    pub peak_hours: Vec<u32>,
    pub scored_sessions: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnvironmentalContext {
    pub signals: BTreeMap<String, String>,
}

impl EnvironmentalContext {
    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    pub fn with_signal(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.signals.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemporalContext {
    pub hour: u32,
    /// 0 = Sunday.
    pub day_of_week: u32,
    pub is_weekend: bool,
    pub is_business_hours: bool,
    pub day_quarter: u32,
}

/// Kind-specific record body. The variant decides the record's [`TelemetryKind`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum TelemetryPayload {
    TaskBehavior(TaskBehaviorStats),
    SessionBehavior(SessionBehaviorStats),
    TaskPatterns(TaskPatternStats),
    Productivity(ProductivityStats),
    Environmental(EnvironmentalContext),
    Temporal(TemporalContext),
}

impl TelemetryPayload {
    pub fn kind(&self) -> TelemetryKind {
        match self {
            TelemetryPayload::TaskBehavior(_) | TelemetryPayload::SessionBehavior(_) => {
                TelemetryKind::UserBehavior
            }
            TelemetryPayload::TaskPatterns(_) => TelemetryKind::TaskPatterns,
            TelemetryPayload::Productivity(_) => TelemetryKind::ProductivityMetrics,
            TelemetryPayload::Environmental(_) => TelemetryKind::Environmental,
            TelemetryPayload::Temporal(_) => TelemetryKind::Temporal,
        }
    }

    /// Field view used by the aggregator.
    pub fn fields(&self) -> serde_json::Map<String, serde_json::Value> {
        let value = match self {
            TelemetryPayload::TaskBehavior(p) => serde_json::to_value(p),
            TelemetryPayload::SessionBehavior(p) => serde_json::to_value(p),
            TelemetryPayload::TaskPatterns(p) => serde_json::to_value(p),
            TelemetryPayload::Productivity(p) => serde_json::to_value(p),
            TelemetryPayload::Environmental(p) => serde_json::to_value(&p.signals),
            TelemetryPayload::Temporal(p) => serde_json::to_value(p),
        };
        match value {
            Ok(serde_json::Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordMetadata {
    pub collection_method: String,
    pub confidence: f64,
    pub data_sources: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryRecord {
    pub id: String,
    pub kind: TelemetryKind,
    pub category: TelemetryCategory,
    pub payload: TelemetryPayload,
    pub timestamp: DateTime<Utc>,
    pub relevance_score: f64,
    pub source: String,
    pub metadata: RecordMetadata,
    pub expires_at: Option<DateTime<Utc>>,
}

impl TelemetryRecord {
    pub fn new(
        payload: TelemetryPayload,
        category: TelemetryCategory,
        timestamp: DateTime<Utc>,
        relevance_score: f64,
        source: &str,
        metadata: RecordMetadata,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind: payload.kind(),
            category,
            payload,
            timestamp,
            relevance_score: relevance_score.clamp(0.0, 1.0),
            source: source.to_string(),
            metadata,
            expires_at: None,
        }
    }

    pub fn expiring_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// `expires_at`, or `timestamp + default_retention_hours` when unset.
    /// Saturates at the latest representable instant.
    pub fn expiry(&self, default_retention_hours: i64) -> DateTime<Utc> {
        self.expires_at.unwrap_or_else(|| {
            let hours = default_retention_hours.clamp(0, MAX_RETENTION_HOURS);
            self.timestamp
                .checked_add_signed(Duration::hours(hours))
                .unwrap_or(DateTime::<Utc>::MAX_UTC)
        })
    }

    pub fn is_expired(&self, now: DateTime<Utc>, default_retention_hours: i64) -> bool {
        now > self.expiry(default_retention_hours)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    Timestamp,
    Relevance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Filter for [`crate::services::retention_store::RetentionStore::query`].
/// Stages apply in field order: kinds, categories, time range, relevance, sort, limit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelemetryQuery {
    pub kinds: Option<Vec<TelemetryKind>>,
    pub categories: Option<Vec<TelemetryCategory>>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    /// Falls back to the store-wide relevance threshold.
    pub min_relevance: Option<f64>,
    pub order: Option<(SortField, SortDirection)>,
    pub limit: Option<usize>,
}

impl TelemetryQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kinds(mut self, kinds: &[TelemetryKind]) -> Self {
        self.kinds = Some(kinds.to_vec());
        self
    }

    pub fn categories(mut self, categories: &[TelemetryCategory]) -> Self {
        self.categories = Some(categories.to_vec());
        self
    }

    pub fn between(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self
    }

    pub fn min_relevance(mut self, min: f64) -> Self {
        self.min_relevance = Some(min);
        self
    }

    pub fn order_by(mut self, field: SortField, direction: SortDirection) -> Self {
        self.order = Some((field, direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetentionStats {
    pub total_records: usize,
    pub records_by_kind: BTreeMap<String, usize>,
    pub oldest_record: Option<DateTime<Utc>>,
    pub newest_record: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldStats {
    Numeric {
        avg: f64,
        min: f64,
        max: f64,
        count: usize,
    },
    /// Object or array fields keep the most recent value.
    Latest { value: serde_json::Value },
    Histogram { counts: BTreeMap<String, usize> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trend {
    pub field: String,
    pub direction: TrendDirection,
    pub change_percent: f64,
    pub confidence: f64,
    pub timespan_hours: f64,
    pub sample_count: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelemetrySummary {
    pub record_count: usize,
    pub fields: BTreeMap<String, FieldStats>,
    pub trends: Vec<Trend>,
}

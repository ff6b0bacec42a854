use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, VecDeque};

use chrono::{DateTime, Utc};

use crate::models::{
    RetentionSettings, RetentionStats, SortDirection, SortField, TelemetryKind, TelemetryQuery,
    TelemetryRecord,
};

/// Bounded per-kind FIFO of telemetry records.
///
/// Each kind holds at most `max_data_points_per_type` records. Overflow drops the
/// oldest insertions first, regardless of relevance.
#[derive(Debug)]
pub struct RetentionStore {
    records: HashMap<TelemetryKind, VecDeque<TelemetryRecord>>,
    max_per_kind: usize,
    default_retention_hours: i64,
    relevance_threshold: f64,
}

impl RetentionStore {
    pub fn new(settings: &RetentionSettings) -> Self {
        Self {
            records: HashMap::new(),
            max_per_kind: settings.max_data_points_per_type,
            default_retention_hours: settings.default_retention_hours,
            relevance_threshold: settings.relevance_threshold,
        }
    }

    pub fn put(&mut self, records: Vec<TelemetryRecord>) {
        for record in records {
            let queue = self.records.entry(record.kind).or_default();
            queue.push_back(record);
            while queue.len() > self.max_per_kind {
                queue.pop_front();
            }
        }
    }

    /// Applies the filter stages in order: kind, category, time range, relevance, sort, limit.
    /// Expired records are never returned.
    pub fn query(&self, filter: &TelemetryQuery, now: DateTime<Utc>) -> Vec<TelemetryRecord> {
        let kinds: Vec<TelemetryKind> = match &filter.kinds {
            Some(kinds) => kinds.clone(),
            None => TelemetryKind::ALL.to_vec(),
        };

        let mut results: Vec<TelemetryRecord> = kinds
            .iter()
            .filter_map(|kind| self.records.get(kind))
            .flat_map(|queue| queue.iter())
            .filter(|r| !r.is_expired(now, self.default_retention_hours))
            .cloned()
            .collect();

        if let Some(categories) = &filter.categories {
            results.retain(|r| categories.contains(&r.category));
        }
        if let Some(start) = filter.start {
            results.retain(|r| r.timestamp >= start);
        }
        if let Some(end) = filter.end {
            results.retain(|r| r.timestamp <= end);
        }

        let min_relevance = filter.min_relevance.unwrap_or(self.relevance_threshold);
        results.retain(|r| r.relevance_score >= min_relevance);

        if let Some((field, direction)) = filter.order {
            results.sort_by(|a, b| {
                let ord = match field {
                    SortField::Timestamp => a.timestamp.cmp(&b.timestamp),
                    SortField::Relevance => a
                        .relevance_score
                        .partial_cmp(&b.relevance_score)
                        .unwrap_or(Ordering::Equal),
                };
                match direction {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                }
            });
        }

        if let Some(limit) = filter.limit {
            results.truncate(limit);
        }
        results
    }

    /// Drops every record past its expiry. Returns how many were removed.
    pub fn evict_expired(&mut self, now: DateTime<Utc>) -> usize {
        let retention = self.default_retention_hours;
        let mut removed = 0;
        for queue in self.records.values_mut() {
            let before = queue.len();
            queue.retain(|r| !r.is_expired(now, retention));
            removed += before - queue.len();
        }
        self.records.retain(|_, queue| !queue.is_empty());
        if removed > 0 {
            log::debug!("[RetentionStore] Evicted {} expired records", removed);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.records.values().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn count(&self, kind: TelemetryKind) -> usize {
        self.records.get(&kind).map(VecDeque::len).unwrap_or(0)
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn stats(&self) -> RetentionStats {
        let mut records_by_kind = BTreeMap::new();
        let mut oldest: Option<DateTime<Utc>> = None;
        let mut newest: Option<DateTime<Utc>> = None;

        for (kind, queue) in &self.records {
            records_by_kind.insert(kind.as_str().to_string(), queue.len());
            for record in queue {
                oldest = Some(oldest.map_or(record.timestamp, |o| o.min(record.timestamp)));
                newest = Some(newest.map_or(record.timestamp, |n| n.max(record.timestamp)));
            }
        }

        RetentionStats {
            total_records: self.len(),
            records_by_kind,
            oldest_record: oldest,
            newest_record: newest,
        }
    }
}

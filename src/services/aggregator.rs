use std::collections::BTreeMap;

use chrono::Duration;
use serde_json::Value;

use crate::models::{FieldStats, TelemetryRecord, Trend, TrendDirection};

const TREND_THRESHOLD_PERCENT: f64 = 5.0;

/// Per-field statistics across a record set.
///
/// Numeric fields produce avg/min/max/count. Object and array fields keep the value from
/// the most recent record. Anything else becomes a histogram keyed by its string form.
pub fn aggregate(records: &[TelemetryRecord]) -> BTreeMap<String, FieldStats> {
    let mut ordered: Vec<&TelemetryRecord> = records.iter().collect();
    ordered.sort_by_key(|r| r.timestamp);

    let mut numeric: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    let mut latest: BTreeMap<String, Value> = BTreeMap::new();
    let mut histograms: BTreeMap<String, BTreeMap<String, usize>> = BTreeMap::new();

    for record in ordered {
        for (field, value) in record.payload.fields() {
            match value {
                Value::Number(n) => {
                    if let Some(v) = n.as_f64() {
                        numeric.entry(field).or_default().push(v);
                    }
                }
                Value::Object(_) | Value::Array(_) => {
                    latest.insert(field, value);
                }
                Value::String(s) => {
                    *histograms.entry(field).or_default().entry(s).or_insert(0) += 1;
                }
                other => {
                    *histograms
                        .entry(field)
                        .or_default()
                        .entry(other.to_string())
                        .or_insert(0) += 1;
                }
            }
        }
    }

    let mut result = BTreeMap::new();
    for (field, values) in numeric {
        let count = values.len();
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let avg = values.iter().sum::<f64>() / count as f64;
        result.insert(field, FieldStats::Numeric { avg, min, max, count });
    }
    for (field, value) in latest {
        result.insert(field, FieldStats::Latest { value });
    }
    for (field, counts) in histograms {
        result.insert(field, FieldStats::Histogram { counts });
    }
    result
}

/// Percent change from first to last sample for every numeric field with at least two samples.
pub fn trends(records: &[TelemetryRecord], window: Duration) -> Vec<Trend> {
    let mut ordered: Vec<&TelemetryRecord> = records.iter().collect();
    ordered.sort_by_key(|r| r.timestamp);

    let mut series: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for record in ordered {
        for (field, value) in record.payload.fields() {
            if let Some(v) = value.as_f64() {
                series.entry(field).or_default().push(v);
            }
        }
    }

    let timespan_hours = window.num_minutes() as f64 / 60.0;
    series
        .into_iter()
        .filter(|(_, samples)| samples.len() >= 2)
        .map(|(field, samples)| {
            let first = samples[0];
            let last = samples[samples.len() - 1];
            let change_percent = percent_change(first, last);
            let direction = if change_percent > TREND_THRESHOLD_PERCENT {
                TrendDirection::Increasing
            } else if change_percent < -TREND_THRESHOLD_PERCENT {
                TrendDirection::Decreasing
            } else {
                TrendDirection::Stable
            };
            Trend {
                field,
                direction,
                change_percent,
                confidence: (samples.len() as f64 / 10.0).min(1.0),
                timespan_hours,
                sample_count: samples.len(),
            }
        })
        .collect()
}

/// A zero baseline counts as a full 100% swing in the direction of the new value.
fn percent_change(first: f64, last: f64) -> f64 {
    if first == 0.0 {
        if last == 0.0 {
            0.0
        } else {
            100.0 * last.signum()
        }
    } else {
        (last - first) / first.abs() * 100.0
    }
}

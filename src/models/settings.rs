use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use super::telemetry::MAX_RETENTION_HOURS;

const MAX_DATA_POINTS_PER_TYPE: usize = 1_000_000;
const MAX_INTERVAL_SECS: u64 = 7 * 24 * 3600;
const MAX_ANALYSIS_WINDOW_DAYS: i64 = 3650;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub version: String,
    #[serde(default)]
    pub retention: RetentionSettings,
    #[serde(default)]
    pub collection: CollectionSettings,
    #[serde(default)]
    pub analysis: AnalysisSettings,
    #[serde(default)]
    pub insights: InsightSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: "1.0.0".to_string(),
            retention: RetentionSettings::default(),
            collection: CollectionSettings::default(),
            analysis: AnalysisSettings::default(),
            insights: InsightSettings::default(),
        }
    }
}

fn unit_interval(name: &str, value: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        bail!("{} must be between 0 and 1, got {}", name, value);
    }
    Ok(())
}

impl Settings {
    /// Range-checks every numeric knob. Loaded settings must pass before any service sees them.
    pub fn validate(&self) -> Result<()> {
        let retention = &self.retention;
        if retention.max_data_points_per_type == 0
            || retention.max_data_points_per_type > MAX_DATA_POINTS_PER_TYPE
        {
            bail!(
                "retention.max_data_points_per_type must be in 1..={}, got {}",
                MAX_DATA_POINTS_PER_TYPE,
                retention.max_data_points_per_type
            );
        }
        if !(1..=MAX_RETENTION_HOURS).contains(&retention.default_retention_hours) {
            bail!(
                "retention.default_retention_hours must be in 1..={}, got {}",
                MAX_RETENTION_HOURS,
                retention.default_retention_hours
            );
        }
        unit_interval("retention.relevance_threshold", retention.relevance_threshold)?;
        if !(1..=MAX_INTERVAL_SECS).contains(&retention.eviction_interval_secs) {
            bail!(
                "retention.eviction_interval_secs must be in 1..={}, got {}",
                MAX_INTERVAL_SECS,
                retention.eviction_interval_secs
            );
        }
        if !(1..=MAX_INTERVAL_SECS).contains(&self.collection.collection_interval_secs) {
            bail!(
                "collection.collection_interval_secs must be in 1..={}, got {}",
                MAX_INTERVAL_SECS,
                self.collection.collection_interval_secs
            );
        }
        if !(1..=MAX_ANALYSIS_WINDOW_DAYS).contains(&self.analysis.analysis_window_days) {
            bail!(
                "analysis.analysis_window_days must be in 1..={}, got {}",
                MAX_ANALYSIS_WINDOW_DAYS,
                self.analysis.analysis_window_days
            );
        }
        let insights = &self.insights;
        if insights.max_insights_per_session == 0 {
            bail!("insights.max_insights_per_session must be at least 1");
        }
        unit_interval("insights.min_confidence_threshold", insights.min_confidence_threshold)?;
        if !(1..=MAX_RETENTION_HOURS).contains(&insights.insight_ttl_hours) {
            bail!(
                "insights.insight_ttl_hours must be in 1..={}, got {}",
                MAX_RETENTION_HOURS,
                insights.insight_ttl_hours
            );
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionSettings {
    pub max_data_points_per_type: usize,
    pub default_retention_hours: i64,
    pub relevance_threshold: f64,
    pub eviction_interval_secs: u64,
}

impl Default for RetentionSettings {
    fn default() -> Self {
        Self {
            max_data_points_per_type: 1000,
            default_retention_hours: 168,
            relevance_threshold: 0.3,
            eviction_interval_secs: 3600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionSettings {
    pub user_behavior: bool,
    pub task_patterns: bool,
    pub productivity_metrics: bool,
    pub environmental: bool,
    pub temporal: bool,
    pub collection_interval_secs: u64,
}

impl Default for CollectionSettings {
    fn default() -> Self {
        Self {
            user_behavior: true,
            task_patterns: true,
            productivity_metrics: true,
            environmental: true,
            temporal: true,
            collection_interval_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisSettings {
    pub analysis_window_days: i64,
    pub min_data_points: usize,
    pub temporal: bool,
    pub task_type: bool,
    pub duration: bool,
    pub productivity: bool,
    pub blockage: bool,
    /// IANA name; hour-of-day bucketing happens in this zone.
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            analysis_window_days: 30,
            min_data_points: 10,
            temporal: true,
            task_type: true,
            duration: true,
            productivity: true,
            blockage: true,
            timezone: default_timezone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightSettings {
    pub max_insights_per_session: usize,
    pub min_confidence_threshold: f64,
    pub insight_ttl_hours: i64,
}

impl Default for InsightSettings {
    fn default() -> Self {
        Self {
            max_insights_per_session: 5,
            min_confidence_threshold: 0.3,
            insight_ttl_hours: 24,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(Settings::default().validate().is_ok());
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let cases: [fn(&mut Settings); 10] = [
            |s| s.retention.default_retention_hours = 10_000_000_000,
            |s| s.retention.default_retention_hours = -1,
            |s| s.retention.max_data_points_per_type = 0,
            |s| s.retention.relevance_threshold = f64::NAN,
            |s| s.retention.eviction_interval_secs = 0,
            |s| s.collection.collection_interval_secs = u64::MAX,
            |s| s.analysis.analysis_window_days = i64::MAX,
            |s| s.insights.max_insights_per_session = 0,
            |s| s.insights.min_confidence_threshold = 1.5,
            |s| s.insights.insight_ttl_hours = 0,
        ];
        for (i, mutate) in cases.iter().enumerate() {
            let mut settings = Settings::default();
            mutate(&mut settings);
            assert!(settings.validate().is_err(), "case {} should be rejected", i);
        }
    }
}

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::insight::Insight;
use super::task::TaskPriority;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternFamily {
    Temporal,
    TaskType,
    Duration,
    Productivity,
    Blockage,
}

impl PatternFamily {
    /// Stable key embedded in pattern and insight ids.
    pub fn key(&self) -> &'static str {
        match self {
            PatternFamily::Temporal => "temporal",
            PatternFamily::TaskType => "task_type",
            PatternFamily::Duration => "duration",
            PatternFamily::Productivity => "productivity",
            PatternFamily::Blockage => "blockage",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayPeriod {
    Morning,
    Afternoon,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemporalPattern {
    pub hour: u32,
    pub completion_count: usize,
    pub productivity_score: Option<f64>,
    pub avg_duration_minutes: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskTypePattern {
    pub priority: TaskPriority,
    pub task_count: usize,
    pub completed_count: usize,
    pub completion_rate: f64,
    pub avg_duration_minutes: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DurationPattern {
    pub priority: TaskPriority,
    pub sample_count: usize,
    pub avg_estimated: f64,
    pub avg_actual: f64,
    /// mean(actual) / mean(estimated)
    pub estimated_vs_actual: f64,
    pub q1_actual: f64,
    pub q3_actual: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductivityPattern {
    pub period: DayPeriod,
    pub avg_productivity: f64,
    pub session_count: usize,
    pub avg_duration_minutes: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockagePattern {
    pub stuck_count: usize,
    pub task_ids: Vec<String>,
    pub priority_distribution: BTreeMap<String, usize>,
    pub avg_days_stale: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "family", content = "data", rename_all = "snake_case")]
pub enum PatternData {
    Temporal(TemporalPattern),
    TaskType(TaskTypePattern),
    Duration(DurationPattern),
    Productivity(ProductivityPattern),
    Blockage(BlockagePattern),
}

impl PatternData {
    pub fn family(&self) -> PatternFamily {
        match self {
            PatternData::Temporal(_) => PatternFamily::Temporal,
            PatternData::TaskType(_) => PatternFamily::TaskType,
            PatternData::Duration(_) => PatternFamily::Duration,
            PatternData::Productivity(_) => PatternFamily::Productivity,
            PatternData::Blockage(_) => PatternFamily::Blockage,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkPattern {
    pub id: String,
    pub family: PatternFamily,
    pub confidence: f64,
    /// Number of samples backing the pattern.
    pub frequency: usize,
    pub data: PatternData,
    pub insights: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub last_observed: DateTime<Utc>,
}

impl WorkPattern {
    pub fn new(
        key: &str,
        confidence: f64,
        frequency: usize,
        data: PatternData,
        insights: Vec<String>,
        last_observed: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        let family = data.family();
        Self {
            id: format!("pattern_{}_{}", family.key(), key),
            family,
            confidence,
            frequency,
            data,
            insights,
            created_at: now,
            last_observed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataQuality {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Impact {
    High,
    Medium,
    Low,
}

impl Impact {
    /// Insight priority (1 = highest).
    pub fn priority(&self) -> u8 {
        match self {
            Impact::High => 1,
            Impact::Medium => 2,
            Impact::Low => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationType {
    Timing,
    Estimation,
    Unblocking,
    Focus,
}

impl RecommendationType {
    pub fn key(&self) -> &'static str {
        match self {
            RecommendationType::Timing => "timing",
            RecommendationType::Estimation => "estimation",
            RecommendationType::Unblocking => "unblocking",
            RecommendationType::Focus => "focus",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: String,
    pub rec_type: RecommendationType,
    pub title: String,
    pub description: String,
    pub expected_impact: Impact,
    pub confidence: f64,
    pub action_steps: Vec<String>,
    /// Ids of the patterns this recommendation was derived from.
    pub pattern_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternAnalysisResult {
    pub patterns: Vec<WorkPattern>,
    pub insights: Vec<Insight>,
    pub recommendations: Vec<Recommendation>,
    pub confidence: f64,
    pub data_quality: DataQuality,
    pub tasks_analyzed: usize,
    pub sessions_analyzed: usize,
    pub analyzed_at: DateTime<Utc>,
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::telemetry::TrendDirection;

/// Ordered so that sorting descending puts `High` first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionPriority {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictiveInsightType {
    CompletionPrediction,
    DurationEstimate,
    ScheduleOptimization,
    WorkloadWarning,
    VelocityTrend,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionPrediction {
    pub project_id: String,
    pub project_name: String,
    pub completed_tasks: usize,
    pub remaining_tasks: usize,
    pub velocity_per_day: f64,
    pub days_to_complete: i64,
    pub predicted_date: DateTime<Utc>,
    pub confidence: f64,
    pub deadline: Option<DateTime<Utc>>,
    /// `None` when the project has no deadline.
    pub on_track: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DurationPrediction {
    pub task_id: String,
    pub task_title: String,
    pub predicted_minutes: f64,
    pub similar_task_count: usize,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VelocityTrend {
    /// Completed tasks per day over the trailing 7 days.
    pub current_velocity: f64,
    /// Completed tasks per day over the 7 days before that.
    pub previous_velocity: f64,
    pub change_percent: f64,
    pub trend: TrendDirection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum PredictionData {
    Completion(CompletionPrediction),
    Duration(DurationPrediction),
    FreeSlot {
        hour: u32,
        task_ids: Vec<String>,
    },
    PeakTiming {
        morning_avg: f64,
        afternoon_avg: f64,
        task_ids: Vec<String>,
    },
    Workload {
        high_priority_ratio: f64,
        pending_count: usize,
    },
    Velocity(VelocityTrend),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictiveInsight {
    pub id: String,
    pub insight_type: PredictiveInsightType,
    pub title: String,
    pub description: String,
    pub confidence: f64,
    pub priority: PredictionPriority,
    pub actionable: bool,
    pub data: PredictionData,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictiveAnalysisResult {
    /// Top five by priority then confidence.
    pub insights: Vec<PredictiveInsight>,
    pub completions: Vec<CompletionPrediction>,
    pub durations: Vec<DurationPrediction>,
    pub velocity: VelocityTrend,
    pub generated_at: DateTime<Utc>,
}

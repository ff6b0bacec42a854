use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightType {
    Productivity,
    TaskHealth,
    Timing,
    Recommendation,
    PatternSummary,
    DataQuality,
    AnalysisError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightCategory {
    Positive,
    Suggestion,
    Warning,
    Critical,
    Opportunity,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightActionType {
    Navigate,
    Schedule,
    Review,
    Dismiss,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightAction {
    pub label: String,
    pub action_type: InsightActionType,
    /// View or entity the presentation layer should open.
    pub target: Option<String>,
}

impl InsightAction {
    pub fn new(label: &str, action_type: InsightActionType, target: Option<&str>) -> Self {
        Self {
            label: label.to_string(),
            action_type,
            target: target.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Insight {
    pub id: String,
    pub insight_type: InsightType,
    pub category: InsightCategory,
    pub title: String,
    pub description: String,
    pub actionable: bool,
    /// 1 = highest.
    pub priority: u8,
    pub confidence: f64,
    pub data: serde_json::Value,
    pub actions: Vec<InsightAction>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub dismissed_at: Option<DateTime<Utc>>,
}

impl Insight {
    /// Creates an insight with no actions and empty data. `key` is embedded in the id so
    /// later runs can recognise what an insight was about.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        key: &str,
        insight_type: InsightType,
        category: InsightCategory,
        title: impl Into<String>,
        description: impl Into<String>,
        priority: u8,
        confidence: f64,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            id: format!("insight_{}_{}", key, now.timestamp_millis()),
            insight_type,
            category,
            title: title.into(),
            description: description.into(),
            actionable: false,
            priority,
            confidence: confidence.clamp(0.0, 1.0),
            data: serde_json::Value::Null,
            actions: Vec::new(),
            created_at: now,
            expires_at: now + ttl,
            dismissed_at: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }

    pub fn with_actions(mut self, actions: Vec<InsightAction>) -> Self {
        self.actionable = !actions.is_empty();
        self.actions = actions;
        self
    }

    /// Not dismissed and not past `expires_at`.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.dismissed_at.is_none() && now <= self.expires_at
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InsightGenerationResult {
    pub insights: Vec<Insight>,
    pub confidence: f64,
    pub patterns_used: Vec<String>,
    pub processing_time_ms: u64,
}

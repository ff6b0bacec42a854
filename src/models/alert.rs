use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::task::TaskPriority;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertActionType {
    OpenTask,
    StartFocusSession,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskReference {
    pub task_id: String,
    pub title: String,
    pub priority: TaskPriority,
    pub due_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadlineAlert {
    pub id: String,
    pub severity: AlertSeverity,
    pub title: String,
    pub message: String,
    pub task: TaskReference,
    pub days_until_due: u32,
    pub action_label: String,
    pub action_type: AlertActionType,
    pub session_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserAction {
    Shown,
    Accepted,
    Dismissed,
    Snoozed,
}

impl UserAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserAction::Shown => "shown",
            UserAction::Accepted => "accepted",
            UserAction::Dismissed => "dismissed",
            UserAction::Snoozed => "snoozed",
        }
    }
}

/// Row appended to the effectiveness sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectivenessRecord {
    pub alert_id: String,
    pub alert_type: String,
    pub user_action: UserAction,
    pub relevance_score: Option<f64>,
    pub context_data: serde_json::Value,
    pub shown_at: DateTime<Utc>,
}

//! Builders shared by the service tests.

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::models::{Project, ProjectStatus, Task, TaskPriority, TaskSession, TaskStatus};

/// Monday 2024-03-04 12:00 UTC.
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 4, 12, 0, 0).unwrap()
}

pub fn task(id: &str, status: TaskStatus, priority: TaskPriority) -> Task {
    let created = now() - Duration::days(3);
    Task {
        id: id.to_string(),
        title: format!("Task {}", id),
        description: None,
        status,
        priority,
        due_date: None,
        created_at: created,
        updated_at: created,
        completed_at: None,
        estimated_duration: None,
        actual_duration: None,
        project_id: None,
        tags: Vec::new(),
    }
}

pub fn completed_at(id: &str, at: DateTime<Utc>) -> Task {
    let mut t = task(id, TaskStatus::Completed, TaskPriority::Medium);
    t.completed_at = Some(at);
    t.updated_at = at;
    t
}

pub fn session(id: &str, started_at: DateTime<Utc>, score: Option<f64>) -> TaskSession {
    TaskSession {
        id: id.to_string(),
        task_id: None,
        started_at,
        duration_minutes: Some(45.0),
        productivity_score: score,
    }
}

pub fn project(id: &str) -> Project {
    Project {
        id: id.to_string(),
        name: format!("Project {}", id),
        status: ProjectStatus::Active,
        color: "#3b82f6".to_string(),
        deadline: None,
    }
}

/// Today at the given UTC hour.
pub fn at_hour(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 4, hour, 0, 0).unwrap()
}

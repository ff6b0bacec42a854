use anyhow::{anyhow, Result};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::models::{ActivitySnapshot, EffectivenessRecord, UserProductivityPreferences};
use crate::services::collaborators::{ActivitySource, EffectivenessSink, PreferenceStore};

pub mod schema;
pub mod queries;

pub fn init_database(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;

    // Enable WAL mode
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    // Create schema
    schema::create_tables(&conn)?;

    Ok(conn)
}

/// SQLite-backed task, preference and alert-feedback store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(db_path: &Path) -> Result<Self> {
        Ok(Self {
            conn: Mutex::new(init_database(db_path)?),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        schema::create_tables(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| anyhow!("database lock poisoned: {}", e))
    }

    /// Writes every project, task and session in the snapshot.
    pub fn import_snapshot(&self, snapshot: &ActivitySnapshot) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        for project in &snapshot.projects {
            queries::insert_project(&tx, project)?;
        }
        for task in &snapshot.tasks {
            queries::insert_task(&tx, task)?;
        }
        for session in &snapshot.sessions {
            queries::insert_session(&tx, session)?;
        }
        tx.commit()?;
        Ok(())
    }
}

impl ActivitySource for SqliteStore {
    fn snapshot(&self) -> Result<ActivitySnapshot> {
        let conn = self.conn()?;
        Ok(ActivitySnapshot {
            tasks: queries::get_tasks(&conn)?,
            projects: queries::get_projects(&conn)?,
            sessions: queries::get_sessions(&conn, None)?,
        })
    }
}

impl PreferenceStore for SqliteStore {
    fn load(&self, user_id: &str) -> Result<Option<UserProductivityPreferences>> {
        let conn = self.conn()?;
        queries::get_preferences(&conn, user_id)
    }

    fn ensure_defaults(&self, user_id: &str) -> Result<UserProductivityPreferences> {
        let conn = self.conn()?;
        if let Some(existing) = queries::get_preferences(&conn, user_id)? {
            return Ok(existing);
        }
        let prefs = UserProductivityPreferences::defaults_for(user_id);
        queries::upsert_preferences(&conn, &prefs)?;
        log::info!("[Database] Created default preferences for {}", user_id);
        Ok(prefs)
    }
}

impl EffectivenessSink for SqliteStore {
    fn record(&self, entry: &EffectivenessRecord) -> Result<()> {
        let conn = self.conn()?;
        queries::insert_effectiveness(&conn, entry)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        AlertSeverity, Project, ProjectStatus, Task, TaskPriority, TaskSession, TaskStatus,
        UserAction,
    };
    use chrono::{Duration, TimeZone, Utc};

    fn sample_snapshot() -> ActivitySnapshot {
        let now = Utc.with_ymd_and_hms(2024, 3, 4, 12, 0, 0).unwrap();
        let project = Project {
            id: "p1".to_string(),
            name: "Launch".to_string(),
            status: ProjectStatus::Active,
            color: "#22c55e".to_string(),
            deadline: Some(now + Duration::days(14)),
        };
        let task = Task {
            id: "t1".to_string(),
            title: "Write release notes".to_string(),
            description: Some("Draft for review".to_string()),
            status: TaskStatus::Completed,
            priority: TaskPriority::High,
            due_date: Some(now + Duration::days(1)),
            created_at: now - Duration::days(2),
            updated_at: now,
            completed_at: Some(now),
            estimated_duration: Some(30.0),
            actual_duration: Some(45.5),
            project_id: Some("p1".to_string()),
            tags: vec!["docs".to_string(), "release".to_string()],
        };
        let session = TaskSession {
            id: "s1".to_string(),
            task_id: Some("t1".to_string()),
            started_at: now - Duration::hours(1),
            duration_minutes: Some(45.0),
            productivity_score: Some(4.5),
        };
        ActivitySnapshot {
            tasks: vec![task],
            projects: vec![project],
            sessions: vec![session],
        }
    }

    #[test]
    fn snapshot_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(&dir.path().join("flowsense.db")).unwrap();
        store.import_snapshot(&sample_snapshot()).unwrap();

        let snapshot = store.snapshot().unwrap();
        assert_eq!(snapshot.projects.len(), 1);
        assert_eq!(snapshot.projects[0].status, ProjectStatus::Active);
        let task = &snapshot.tasks[0];
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.priority, TaskPriority::High);
        assert_eq!(task.tags, vec!["docs".to_string(), "release".to_string()]);
        assert_eq!(task.actual_duration, Some(45.5));
        assert_eq!(snapshot.sessions[0].productivity_score, Some(4.5));
    }

    #[test]
    fn missing_preferences_are_none_until_defaults_exist() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.load("u1").unwrap().is_none());

        let created = store.ensure_defaults("u1").unwrap();
        assert_eq!(created.alerts.max_daily_alerts, 3);

        let loaded = store.load("u1").unwrap().unwrap();
        assert_eq!(loaded.user_id, "u1");
        assert_eq!(loaded.work_hours.start_hour, 9);
    }

    #[test]
    fn stored_preferences_win_over_defaults() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut prefs = UserProductivityPreferences::defaults_for("u1");
        prefs.alerts.min_severity = AlertSeverity::High;
        queries::upsert_preferences(&store.conn().unwrap(), &prefs).unwrap();

        let ensured = store.ensure_defaults("u1").unwrap();
        assert_eq!(ensured.alerts.min_severity, AlertSeverity::High);
    }

    #[test]
    fn effectiveness_entries_append() {
        let store = SqliteStore::open_in_memory().unwrap();
        let shown_at = Utc.with_ymd_and_hms(2024, 3, 4, 10, 0, 0).unwrap();
        for action in [UserAction::Shown, UserAction::Dismissed] {
            store
                .record(&EffectivenessRecord {
                    alert_id: "alert_1".to_string(),
                    alert_type: "deadline".to_string(),
                    user_action: action,
                    relevance_score: Some(0.8),
                    context_data: serde_json::json!({ "task_id": "t1" }),
                    shown_at,
                })
                .unwrap();
        }

        let entries = queries::get_effectiveness(&store.conn().unwrap(), "alert_1").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].user_action, UserAction::Dismissed);
        assert_eq!(entries[0].context_data["task_id"], "t1");
        assert_eq!(entries[0].shown_at, shown_at);
    }
}

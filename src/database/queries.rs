use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, Row};
use std::str::FromStr;

use crate::models::{
    EffectivenessRecord, Project, Task, TaskSession, UserAction, UserProductivityPreferences,
};

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
}

fn parse_column<T: FromStr<Err = String>>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    raw.parse::<T>().map_err(|e| conversion_error(idx, e))
}

fn to_datetime(idx: usize, secs: i64) -> rusqlite::Result<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| conversion_error(idx, format!("invalid timestamp {}", secs)))
}

fn timestamp_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    to_datetime(idx, row.get(idx)?)
}

fn optional_timestamp_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    row.get::<_, Option<i64>>(idx)?
        .map(|secs| to_datetime(idx, secs))
        .transpose()
}

pub fn insert_project(conn: &Connection, project: &Project) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO projects (id, name, status, color, deadline)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![
            &project.id,
            &project.name,
            project.status.as_str(),
            &project.color,
            project.deadline.map(|d| d.timestamp()),
        ],
    )?;
    Ok(())
}

pub fn get_projects(conn: &Connection) -> Result<Vec<Project>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, status, color, deadline FROM projects ORDER BY name",
    )?;

    let projects = stmt.query_map([], |row| {
        Ok(Project {
            id: row.get(0)?,
            name: row.get(1)?,
            status: parse_column(row, 2)?,
            color: row.get(3)?,
            deadline: optional_timestamp_column(row, 4)?,
        })
    })?.collect::<Result<Vec<_>, _>>()?;

    Ok(projects)
}

pub fn insert_task(conn: &Connection, task: &Task) -> Result<()> {
    let tags_json = serde_json::to_string(&task.tags)?;

    conn.execute(
        "INSERT OR REPLACE INTO tasks
         (id, title, description, status, priority, due_date, created_at, updated_at,
          completed_at, estimated_duration, actual_duration, project_id, tags)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        rusqlite::params![
            &task.id,
            &task.title,
            &task.description,
            task.status.as_str(),
            task.priority.as_str(),
            task.due_date.map(|d| d.timestamp()),
            task.created_at.timestamp(),
            task.updated_at.timestamp(),
            task.completed_at.map(|d| d.timestamp()),
            task.estimated_duration,
            task.actual_duration,
            &task.project_id,
            &tags_json,
        ],
    )?;
    Ok(())
}

pub fn get_tasks(conn: &Connection) -> Result<Vec<Task>> {
    let mut stmt = conn.prepare(
        "SELECT id, title, description, status, priority, due_date, created_at, updated_at,
                completed_at, estimated_duration, actual_duration, project_id, tags
         FROM tasks
         ORDER BY created_at DESC",
    )?;

    let tasks = stmt.query_map([], |row| {
        Ok(Task {
            id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            status: parse_column(row, 3)?,
            priority: parse_column(row, 4)?,
            due_date: optional_timestamp_column(row, 5)?,
            created_at: timestamp_column(row, 6)?,
            updated_at: timestamp_column(row, 7)?,
            completed_at: optional_timestamp_column(row, 8)?,
            estimated_duration: row.get(9)?,
            actual_duration: row.get(10)?,
            project_id: row.get(11)?,
            tags: row
                .get::<_, Option<String>>(12)?
                .map(|json| serde_json::from_str(&json).unwrap_or_default())
                .unwrap_or_default(),
        })
    })?.collect::<Result<Vec<_>, _>>()?;

    Ok(tasks)
}

pub fn insert_session(conn: &Connection, session: &TaskSession) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO task_sessions
         (id, task_id, started_at, duration_minutes, productivity_score)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![
            &session.id,
            &session.task_id,
            session.started_at.timestamp(),
            session.duration_minutes,
            session.productivity_score,
        ],
    )?;
    Ok(())
}

pub fn get_sessions(conn: &Connection, since: Option<DateTime<Utc>>) -> Result<Vec<TaskSession>> {
    let since = since.map(|d| d.timestamp()).unwrap_or(0);
    let mut stmt = conn.prepare(
        "SELECT id, task_id, started_at, duration_minutes, productivity_score
         FROM task_sessions
         WHERE started_at >= ?1
         ORDER BY started_at ASC",
    )?;

    let sessions = stmt.query_map([since], |row| {
        Ok(TaskSession {
            id: row.get(0)?,
            task_id: row.get(1)?,
            started_at: timestamp_column(row, 2)?,
            duration_minutes: row.get(3)?,
            productivity_score: row.get(4)?,
        })
    })?.collect::<Result<Vec<_>, _>>()?;

    Ok(sessions)
}

/// `Ok(None)` when the user has no row yet.
pub fn get_preferences(conn: &Connection, user_id: &str) -> Result<Option<UserProductivityPreferences>> {
    let result: Result<String, _> = conn.query_row(
        "SELECT preferences_json FROM user_productivity_preferences WHERE user_id = ?1",
        [user_id],
        |row| row.get(0),
    );

    match result {
        Ok(json) => Ok(Some(serde_json::from_str(&json)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn upsert_preferences(conn: &Connection, prefs: &UserProductivityPreferences) -> Result<()> {
    let json = serde_json::to_string(prefs)?;
    conn.execute(
        "INSERT INTO user_productivity_preferences (user_id, preferences_json, updated_at)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(user_id) DO UPDATE SET
            preferences_json = excluded.preferences_json,
            updated_at = excluded.updated_at",
        rusqlite::params![&prefs.user_id, &json, Utc::now().timestamp()],
    )?;
    Ok(())
}

pub fn insert_effectiveness(conn: &Connection, entry: &EffectivenessRecord) -> Result<i64> {
    let context_json = serde_json::to_string(&entry.context_data)?;
    conn.execute(
        "INSERT INTO alert_effectiveness
         (alert_id, alert_type, user_action, relevance_score, context_data, shown_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            &entry.alert_id,
            &entry.alert_type,
            entry.user_action.as_str(),
            entry.relevance_score,
            &context_json,
            entry.shown_at.timestamp(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn parse_user_action(raw: &str) -> Option<UserAction> {
    match raw {
        "shown" => Some(UserAction::Shown),
        "accepted" => Some(UserAction::Accepted),
        "dismissed" => Some(UserAction::Dismissed),
        "snoozed" => Some(UserAction::Snoozed),
        _ => None,
    }
}

pub fn get_effectiveness(conn: &Connection, alert_id: &str) -> Result<Vec<EffectivenessRecord>> {
    let mut stmt = conn.prepare(
        "SELECT alert_id, alert_type, user_action, relevance_score, context_data, shown_at
         FROM alert_effectiveness
         WHERE alert_id = ?1
         ORDER BY id ASC",
    )?;

    let entries = stmt.query_map([alert_id], |row| {
        let action: String = row.get(2)?;
        Ok(EffectivenessRecord {
            alert_id: row.get(0)?,
            alert_type: row.get(1)?,
            user_action: parse_user_action(&action)
                .ok_or_else(|| conversion_error(2, format!("unknown user action: {}", action)))?,
            relevance_score: row.get(3)?,
            context_data: row
                .get::<_, Option<String>>(4)?
                .and_then(|json| serde_json::from_str(&json).ok())
                .unwrap_or(serde_json::Value::Null),
            shown_at: timestamp_column(row, 5)?,
        })
    })?.collect::<Result<Vec<_>, _>>()?;

    Ok(entries)
}

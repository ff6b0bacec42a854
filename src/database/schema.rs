use anyhow::Result;
use rusqlite::Connection;

pub fn create_tables(conn: &Connection) -> Result<()> {
    // Projects table
    conn.execute(
        "CREATE TABLE IF NOT EXISTS projects (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'active',
            color TEXT NOT NULL,
            deadline INTEGER
        )",
        [],
    )?;

    // Tasks table
    conn.execute(
        "CREATE TABLE IF NOT EXISTS tasks (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            description TEXT,
            status TEXT NOT NULL DEFAULT 'todo',
            priority TEXT NOT NULL DEFAULT 'medium',
            due_date INTEGER,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            completed_at INTEGER,
            estimated_duration REAL,
            actual_duration REAL,
            project_id TEXT,
            tags TEXT,
            FOREIGN KEY (project_id) REFERENCES projects(id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_tasks_project_id ON tasks(project_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_tasks_due_date ON tasks(due_date)",
        [],
    )?;

    // Focus sessions
    conn.execute(
        "CREATE TABLE IF NOT EXISTS task_sessions (
            id TEXT PRIMARY KEY,
            task_id TEXT,
            started_at INTEGER NOT NULL,
            duration_minutes REAL,
            productivity_score REAL,
            FOREIGN KEY (task_id) REFERENCES tasks(id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_task_sessions_started_at ON task_sessions(started_at)",
        [],
    )?;

    // One JSON document per user
    conn.execute(
        "CREATE TABLE IF NOT EXISTS user_productivity_preferences (
            user_id TEXT PRIMARY KEY,
            preferences_json TEXT NOT NULL,
            updated_at INTEGER NOT NULL
        )",
        [],
    )?;

    // Append-only alert feedback
    conn.execute(
        "CREATE TABLE IF NOT EXISTS alert_effectiveness (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            alert_id TEXT NOT NULL,
            alert_type TEXT NOT NULL,
            user_action TEXT NOT NULL,
            relevance_score REAL,
            context_data TEXT,
            shown_at INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_alert_effectiveness_alert_id ON alert_effectiveness(alert_id)",
        [],
    )?;

    Ok(())
}

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use chrono_tz::Tz;

use flowsense_core::database::{queries, SqliteStore};
use flowsense_core::models::{
    ActivitySnapshot, AlertSeverity, AnalysisSettings, InsightSettings, PatternData, Project,
    ProjectStatus, Settings, Task, TaskPriority, TaskSession, TaskStatus, TelemetryKind,
    TelemetryQuery, UserAction,
};
use flowsense_core::services::{
    ActivitySource, AlertSource, InsightSynthesizer, PatternAnalyzer, PredictiveAnalyzer,
    ProactiveAlertScheduler, TelemetryHub,
};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 4, 12, 0, 0).unwrap()
}

fn task(id: &str, status: TaskStatus, priority: TaskPriority, created: DateTime<Utc>) -> Task {
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
        project_id: Some("launch".to_string()),
        tags: Vec::new(),
    }
}

fn finished_at_ten(id: &str, days_ago: i64) -> Task {
    let done = now() - Duration::days(days_ago) - Duration::hours(2);
    let mut t = task(id, TaskStatus::Completed, TaskPriority::Medium, done - Duration::days(1));
    t.completed_at = Some(done);
    t.updated_at = done;
    t.actual_duration = Some(40.0);
    t
}

fn focus_at_ten(id: &str, days_ago: i64, score: f64) -> TaskSession {
    TaskSession {
        id: id.to_string(),
        task_id: None,
        started_at: now() - Duration::days(days_ago) - Duration::hours(2),
        duration_minutes: Some(50.0),
        productivity_score: Some(score),
    }
}

fn workspace() -> ActivitySnapshot {
    let mut tasks: Vec<Task> = (1..=5).map(|d| finished_at_ten(&format!("done{}", d), d)).collect();
    for i in 0..3 {
        tasks.push(task(&format!("open{}", i), TaskStatus::Todo, TaskPriority::Low, now() - Duration::days(1)));
    }
    let mut due = task("ship", TaskStatus::InProgress, TaskPriority::Urgent, now() - Duration::days(1));
    due.due_date = Some(now() + Duration::days(1));
    tasks.push(due);

    let sessions = [4.0, 5.0, 4.0, 5.0, 4.0]
        .iter()
        .enumerate()
        .map(|(i, score)| focus_at_ten(&format!("s{}", i), i as i64 + 1, *score))
        .collect();

    ActivitySnapshot {
        tasks,
        projects: vec![Project {
            id: "launch".to_string(),
            name: "Launch".to_string(),
            status: ProjectStatus::Active,
            color: "#6366f1".to_string(),
            deadline: Some(now() + Duration::days(30)),
        }],
        sessions,
    }
}

fn seeded_store() -> (tempfile::TempDir, Arc<SqliteStore>) {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::open(&dir.path().join("flowsense.db")).unwrap();
    store.import_snapshot(&workspace()).unwrap();
    (dir, Arc::new(store))
}

#[test]
fn analysis_to_insights_end_to_end() {
    let (_dir, store) = seeded_store();
    let snapshot = store.snapshot().unwrap();
    assert_eq!(snapshot.tasks.len(), 9);

    let analyzer = PatternAnalyzer::new(AnalysisSettings::default(), 24);
    let analysis = analyzer.analyze(&snapshot.tasks, &snapshot.sessions, now());

    let temporal = analysis
        .patterns
        .iter()
        .find_map(|p| match &p.data {
            PatternData::Temporal(t) if t.hour == 10 => Some((p.confidence, t.productivity_score)),
            _ => None,
        })
        .expect("hour 10 pattern");
    assert!((temporal.0 - 0.5).abs() < 1e-9);
    assert!((temporal.1.unwrap() - 4.4).abs() < 1e-9);

    let settings = InsightSettings {
        max_insights_per_session: 3,
        ..InsightSettings::default()
    };
    let synthesizer = InsightSynthesizer::new(analyzer, settings, Tz::UTC);
    let result = synthesizer.synthesize(&analysis, &[], now());
    assert!(!result.insights.is_empty());
    assert!(result.insights.len() <= 3);
    for pair in result.insights.windows(2) {
        assert!(
            pair[0].priority < pair[1].priority
                || (pair[0].priority == pair[1].priority && pair[0].confidence >= pair[1].confidence)
        );
    }
    assert!(result.patterns_used.iter().any(|id| id == "pattern_temporal_10"));

    // the same findings are not repeated while the first batch is still active
    let repeat = synthesizer.synthesize(&analysis, &result.insights, now() + Duration::hours(1));
    assert!(repeat.insights.iter().all(|i| !i.id.contains("temporal")));
}

#[test]
fn predictions_from_stored_projects() {
    let (_dir, store) = seeded_store();
    let snapshot = store.snapshot().unwrap();
    let result = PredictiveAnalyzer::new(Tz::UTC).analyze(&snapshot.tasks, &snapshot.projects, &snapshot.sessions, now());

    let launch = result.completions.iter().find(|c| c.project_id == "launch").unwrap();
    assert_eq!(launch.completed_tasks, 5);
    assert_eq!(launch.remaining_tasks, 4);
    assert_eq!(launch.on_track, Some(true));
    assert!(result.insights.len() <= 5);
    assert!((launch.velocity_per_day - 1.25).abs() < 1e-9);
}

#[test]
fn alerts_use_stored_preferences_and_log_feedback() {
    let (_dir, store) = seeded_store();
    let snapshot = store.snapshot().unwrap();

    let mut scheduler = ProactiveAlertScheduler::personalized(store.clone(), "u1", Tz::UTC, store.clone());
    let alert = scheduler
        .check_for_deadline_alerts(&snapshot.tasks, "session-1", now())
        .expect("urgent task due tomorrow");
    assert_eq!(alert.task.task_id, "ship");
    assert_eq!(alert.days_until_due, 1);
    // 12:00 is a low-energy hour in the default schedule
    assert_eq!(alert.severity, AlertSeverity::Medium);

    assert!(scheduler
        .check_for_deadline_alerts(&snapshot.tasks, "session-1", now())
        .is_none());

    scheduler.record_feedback(&alert, UserAction::Dismissed, Some(0.2), now());
    let entries = queries::get_effectiveness(&store.conn().unwrap(), &alert.id).unwrap();
    let actions: Vec<UserAction> = entries.iter().map(|e| e.user_action).collect();
    assert_eq!(actions, vec![UserAction::Shown, UserAction::Dismissed]);
}

#[test]
fn telemetry_hub_collects_from_the_database() {
    let (_dir, store) = seeded_store();
    let hub = TelemetryHub::new(&Settings::default(), Tz::UTC);

    let stored = hub.collect_from(store.as_ref(), &TelemetryKind::ALL, now());
    assert!(stored >= 3);

    let productivity = hub.query(
        &TelemetryQuery::new().kinds(&[TelemetryKind::ProductivityMetrics]),
        now(),
    );
    assert_eq!(productivity.len(), 1);

    let summary = hub.summarize(&TelemetryQuery::new(), Duration::hours(1), now());
    assert_eq!(summary.record_count, stored);

    // a week past the default retention window everything is gone
    let later = now() + Duration::hours(169);
    assert_eq!(hub.evict_expired(later), stored);
    assert_eq!(hub.stats().total_records, 0);
}

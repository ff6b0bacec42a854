use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;

use super::collaborators::ActivitySource;
use crate::error::Result;
use crate::models::{
    CollectionSettings, EnvironmentalContext, ProductivityStats, RecordMetadata,
    SessionBehaviorStats, Task, TaskBehaviorStats, TaskPatternStats, TaskSession,
    TelemetryCategory, TelemetryKind, TelemetryPayload, TelemetryRecord, TemporalContext,
};
use crate::utils::stats::mean;
use crate::utils::time::{local_hour, local_weekday};

const SOURCE: &str = "flowsense.collectors";
const PEAK_FACTOR: f64 = 1.2;
const ENVIRONMENTAL_RELEVANCE: f64 = 0.4;
const TEMPORAL_RELEVANCE: f64 = 0.7;

fn metadata(method: &str, confidence: f64, sources: &[&str]) -> RecordMetadata {
    RecordMetadata {
        collection_method: method.to_string(),
        confidence,
        data_sources: sources.iter().map(|s| s.to_string()).collect(),
    }
}

/// Runs the five telemetry collectors that are switched on in [`CollectionSettings`].
#[derive(Debug, Clone)]
pub struct TelemetryCollector {
    settings: CollectionSettings,
    tz: Tz,
}

impl TelemetryCollector {
    pub fn new(settings: CollectionSettings, tz: Tz) -> Self {
        Self { settings, tz }
    }

    pub fn is_enabled(&self, kind: TelemetryKind) -> bool {
        match kind {
            TelemetryKind::UserBehavior => self.settings.user_behavior,
            TelemetryKind::TaskPatterns => self.settings.task_patterns,
            TelemetryKind::ProductivityMetrics => self.settings.productivity_metrics,
            TelemetryKind::Environmental => self.settings.environmental,
            TelemetryKind::Temporal => self.settings.temporal,
        }
    }

    /// Runs every enabled collector listed in `kinds`.
    pub fn collect(
        &self,
        kinds: &[TelemetryKind],
        tasks: &[Task],
        sessions: &[TaskSession],
        environment: Option<&EnvironmentalContext>,
        now: DateTime<Utc>,
    ) -> Vec<TelemetryRecord> {
        let mut records = Vec::new();
        for kind in kinds.iter().copied().filter(|k| self.is_enabled(*k)) {
            let collected = match kind {
                TelemetryKind::UserBehavior => collect_user_behavior(tasks, sessions, now),
                TelemetryKind::TaskPatterns => collect_task_patterns(tasks, now),
                TelemetryKind::ProductivityMetrics => collect_productivity(sessions, self.tz, now),
                TelemetryKind::Environmental => collect_environmental(environment, now),
                TelemetryKind::Temporal => vec![collect_temporal(now, self.tz)],
            };
            log::debug!("[Collector] {} produced {} records", kind.as_str(), collected.len());
            records.extend(collected);
        }
        records
    }

    /// One collection cycle against the task store. A failed read yields no records.
    pub fn collect_cycle(
        &self,
        source: &dyn ActivitySource,
        kinds: &[TelemetryKind],
        environment: Option<&EnvironmentalContext>,
        now: DateTime<Utc>,
    ) -> Vec<TelemetryRecord> {
        match self.try_collect_cycle(source, kinds, environment, now) {
            Ok(records) => records,
            Err(e) => {
                log::error!("[Collector] Collection cycle failed: {}", e);
                Vec::new()
            }
        }
    }

    fn try_collect_cycle(
        &self,
        source: &dyn ActivitySource,
        kinds: &[TelemetryKind],
        environment: Option<&EnvironmentalContext>,
        now: DateTime<Utc>,
    ) -> Result<Vec<TelemetryRecord>> {
        let snapshot = source.snapshot()?;
        Ok(self.collect(kinds, &snapshot.tasks, &snapshot.sessions, environment, now))
    }
}

/// Last-24h task creation and session activity. Emits nothing for an idle day.
pub fn collect_user_behavior(
    tasks: &[Task],
    sessions: &[TaskSession],
    now: DateTime<Utc>,
) -> Vec<TelemetryRecord> {
    let since = now - Duration::hours(24);
    let mut records = Vec::new();

    let recent_tasks: Vec<&Task> = tasks
        .iter()
        .filter(|t| t.created_at >= since && t.created_at <= now)
        .collect();
    if !recent_tasks.is_empty() {
        let mut status_distribution = BTreeMap::new();
        let mut priority_distribution = BTreeMap::new();
        for task in &recent_tasks {
            *status_distribution.entry(task.status.to_string()).or_insert(0) += 1;
            *priority_distribution.entry(task.priority.to_string()).or_insert(0) += 1;
        }
        let stats = TaskBehaviorStats {
            tasks_created: recent_tasks.len(),
            creation_rate_per_hour: recent_tasks.len() as f64 / 24.0,
            status_distribution,
            priority_distribution,
        };
        records.push(TelemetryRecord::new(
            TelemetryPayload::TaskBehavior(stats),
            TelemetryCategory::RealTime,
            now,
            0.8,
            SOURCE,
            metadata("task_activity_scan", 0.9, &["tasks"]),
        ));
    }

    let recent_sessions: Vec<&TaskSession> = sessions
        .iter()
        .filter(|s| s.started_at >= since && s.started_at <= now)
        .collect();
    if !recent_sessions.is_empty() {
        let durations: Vec<f64> = recent_sessions.iter().filter_map(|s| s.duration_minutes).collect();
        let scores: Vec<f64> = recent_sessions.iter().filter_map(|s| s.productivity_score).collect();
        let stats = SessionBehaviorStats {
            session_count: recent_sessions.len(),
            avg_duration_minutes: mean(&durations).unwrap_or(0.0),
            avg_productivity: mean(&scores),
        };
        records.push(TelemetryRecord::new(
            TelemetryPayload::SessionBehavior(stats),
            TelemetryCategory::RealTime,
            now,
            0.8,
            SOURCE,
            metadata("session_activity_scan", 0.85, &["task_sessions"]),
        ));
    }

    records
}

/// Project distribution and deadline risk over all tasks.
pub fn collect_task_patterns(tasks: &[Task], now: DateTime<Utc>) -> Vec<TelemetryRecord> {
    if tasks.is_empty() {
        return Vec::new();
    }

    let mut project_distribution = BTreeMap::new();
    for task in tasks {
        let key = task.project_id.clone().unwrap_or_else(|| "unassigned".to_string());
        *project_distribution.entry(key).or_insert(0) += 1;
    }

    let with_deadline: Vec<&Task> = tasks.iter().filter(|t| t.due_date.is_some()).collect();
    let horizon = now + Duration::hours(48);
    let mut overdue = 0;
    let mut due_within_48h = 0;
    let mut remaining_days = Vec::new();
    for task in with_deadline.iter().filter(|t| t.is_open()) {
        let Some(due) = task.due_date else { continue };
        if due < now {
            overdue += 1;
        } else {
            if due <= horizon {
                due_within_48h += 1;
            }
            remaining_days.push((due - now).num_seconds() as f64 / 86_400.0);
        }
    }

    let overdue_percentage = if with_deadline.is_empty() {
        0.0
    } else {
        overdue as f64 / with_deadline.len() as f64 * 100.0
    };

    let stats = TaskPatternStats {
        total_tasks: tasks.len(),
        project_distribution,
        with_deadline: with_deadline.len(),
        overdue,
        due_within_48h,
        overdue_percentage,
        avg_days_to_deadline: mean(&remaining_days),
    };
    vec![TelemetryRecord::new(
        TelemetryPayload::TaskPatterns(stats),
        TelemetryCategory::Historical,
        now,
        0.9,
        SOURCE,
        metadata("task_distribution_scan", 0.9, &["tasks", "projects"]),
    )]
}

/// Per-hour mean productivity over every scored session.
pub fn collect_productivity(sessions: &[TaskSession], tz: Tz, now: DateTime<Utc>) -> Vec<TelemetryRecord> {
    let mut buckets: Vec<Vec<f64>> = vec![Vec::new(); 24];
    for session in sessions {
        if let Some(score) = session.productivity_score {
            buckets[local_hour(session.started_at, tz) as usize].push(score);
        }
    }
    let session_count: usize = buckets.iter().map(Vec::len).sum();
    if session_count == 0 {
        return Vec::new();
    }

    let hourly_productivity: Vec<f64> = buckets.iter().map(|b| mean(b).unwrap_or(0.0)).collect();
    let hourly_sessions: Vec<usize> = buckets.iter().map(Vec::len).collect();
    let overall = hourly_productivity.iter().sum::<f64>() / 24.0;
    let peak_hours: Vec<u32> = hourly_productivity
        .iter()
        .enumerate()
        .filter(|(_, avg)| **avg > overall * PEAK_FACTOR)
        .map(|(hour, _)| hour as u32)
        .collect();

    let stats = ProductivityStats {
        hourly_productivity,
        hourly_sessions,
        peak_hours,
        scored_sessions: session_count,
    };
    vec![TelemetryRecord::new(
        TelemetryPayload::Productivity(stats),
        TelemetryCategory::Historical,
        now,
        0.85,
        SOURCE,
        metadata("hourly_bucketing", (session_count as f64 / 20.0).min(1.0), &["task_sessions"]),
    )]
}

/// Caller-supplied ambient context, merged over platform signals. Caller keys win.
pub fn collect_environmental(
    context: Option<&EnvironmentalContext>,
    now: DateTime<Utc>,
) -> Vec<TelemetryRecord> {
    let Some(context) = context.filter(|c| !c.is_empty()) else {
        return Vec::new();
    };

    let mut merged = EnvironmentalContext::default()
        .with_signal("platform.os", std::env::consts::OS)
        .with_signal("platform.arch", std::env::consts::ARCH);
    merged.signals.extend(context.signals.clone());

    vec![TelemetryRecord::new(
        TelemetryPayload::Environmental(merged),
        TelemetryCategory::RealTime,
        now,
        ENVIRONMENTAL_RELEVANCE,
        SOURCE,
        metadata("context_capture", 0.6, &["caller", "platform"]),
    )]
}

pub fn collect_temporal(now: DateTime<Utc>, tz: Tz) -> TelemetryRecord {
    let hour = local_hour(now, tz);
    let day_of_week = local_weekday(now, tz);
    let is_weekend = day_of_week == 0 || day_of_week == 6;
    let context = TemporalContext {
        hour,
        day_of_week,
        is_weekend,
        is_business_hours: !is_weekend && (9..17).contains(&hour),
        day_quarter: hour / 6,
    };
    TelemetryRecord::new(
        TelemetryPayload::Temporal(context),
        TelemetryCategory::RealTime,
        now,
        TEMPORAL_RELEVANCE,
        SOURCE,
        metadata("clock", 1.0, &["system_clock"]),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{TaskPriority, TaskStatus};
    use crate::services::collaborators::StaticActivitySource;
    use crate::services::fixtures::{at_hour, now, session, task};

    #[test]
    fn behavior_is_empty_without_recent_activity() {
        let mut old = task("a", TaskStatus::Todo, TaskPriority::Low);
        old.created_at = now() - Duration::days(2);
        assert!(collect_user_behavior(&[old], &[], now()).is_empty());
    }

    #[test]
    fn behavior_reports_rate_and_histograms() {
        let mut tasks = Vec::new();
        for (i, priority) in [TaskPriority::High, TaskPriority::High, TaskPriority::Low].iter().enumerate() {
            let mut t = task(&i.to_string(), TaskStatus::Todo, *priority);
            t.created_at = now() - Duration::hours(2);
            tasks.push(t);
        }
        let sessions = vec![
            session("s1", now() - Duration::hours(1), Some(4.0)),
            session("s2", now() - Duration::hours(3), Some(2.0)),
        ];
        let records = collect_user_behavior(&tasks, &sessions, now());
        assert_eq!(records.len(), 2);

        match &records[0].payload {
            TelemetryPayload::TaskBehavior(stats) => {
                assert_eq!(stats.tasks_created, 3);
                assert!((stats.creation_rate_per_hour - 0.125).abs() < 1e-9);
                assert_eq!(stats.priority_distribution.get("high"), Some(&2));
            }
            other => panic!("unexpected payload {:?}", other),
        }
        match &records[1].payload {
            TelemetryPayload::SessionBehavior(stats) => {
                assert_eq!(stats.session_count, 2);
                assert_eq!(stats.avg_productivity, Some(3.0));
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn task_patterns_compute_deadline_risk() {
        let mut overdue = task("o", TaskStatus::Todo, TaskPriority::High);
        overdue.due_date = Some(now() - Duration::days(1));
        let mut soon = task("s", TaskStatus::InProgress, TaskPriority::Medium);
        soon.due_date = Some(now() + Duration::hours(24));
        let mut later = task("l", TaskStatus::Todo, TaskPriority::Low);
        later.due_date = Some(now() + Duration::days(3));
        later.project_id = Some("p1".to_string());
        let none = task("n", TaskStatus::Todo, TaskPriority::Low);

        let records = collect_task_patterns(&[overdue, soon, later, none], now());
        let TelemetryPayload::TaskPatterns(stats) = &records[0].payload else {
            panic!("expected task pattern payload");
        };
        assert_eq!(stats.with_deadline, 3);
        assert_eq!(stats.overdue, 1);
        assert_eq!(stats.due_within_48h, 1);
        assert!((stats.overdue_percentage - 100.0 / 3.0).abs() < 1e-9);
        assert_eq!(stats.avg_days_to_deadline, Some(2.0));
        assert_eq!(stats.project_distribution.get("unassigned"), Some(&3));
    }

    #[test]
    fn productivity_flags_peak_hours() {
        let sessions = vec![
            session("a", at_hour(9), Some(5.0)),
            session("b", at_hour(9), Some(5.0)),
            session("c", at_hour(15), Some(2.0)),
        ];
        let records = collect_productivity(&sessions, Tz::UTC, now());
        let TelemetryPayload::Productivity(stats) = &records[0].payload else {
            panic!("expected productivity payload");
        };
        // 24-bucket average is 7/24; both populated hours exceed 1.2x that.
        assert_eq!(stats.peak_hours, vec![9, 15]);
        assert_eq!(stats.hourly_sessions[9], 2);
        assert_eq!(stats.scored_sessions, 3);
    }

    #[test]
    fn environmental_requires_context_and_has_low_relevance() {
        assert!(collect_environmental(None, now()).is_empty());
        assert!(collect_environmental(Some(&EnvironmentalContext::default()), now()).is_empty());

        let ctx = EnvironmentalContext::default().with_signal("location", "office");
        let records = collect_environmental(Some(&ctx), now());
        assert_eq!(records.len(), 1);
        assert!((records[0].relevance_score - 0.4).abs() < 1e-9);
        let TelemetryPayload::Environmental(merged) = &records[0].payload else {
            panic!("expected environmental payload");
        };
        assert_eq!(merged.signals.get("location").map(String::as_str), Some("office"));
        assert!(merged.signals.contains_key("platform.os"));
    }

    #[test]
    fn temporal_record_describes_the_clock() {
        let record = collect_temporal(at_hour(14), Tz::UTC);
        assert!((record.relevance_score - 0.7).abs() < 1e-9);
        let TelemetryPayload::Temporal(ctx) = &record.payload else {
            panic!("expected temporal payload");
        };
        assert_eq!(ctx.hour, 14);
        assert_eq!(ctx.day_of_week, 1);
        assert!(!ctx.is_weekend);
        assert!(ctx.is_business_hours);
        assert_eq!(ctx.day_quarter, 2);
    }

    #[test]
    fn disabled_collectors_are_skipped() {
        let settings = CollectionSettings {
            temporal: false,
            ..CollectionSettings::default()
        };
        let collector = TelemetryCollector::new(settings, Tz::UTC);
        let records = collector.collect(&TelemetryKind::ALL, &[], &[], None, now());
        assert!(records.is_empty());
    }

    struct FailingSource;

    impl ActivitySource for FailingSource {
        fn snapshot(&self) -> anyhow::Result<crate::models::ActivitySnapshot> {
            anyhow::bail!("store offline")
        }
    }

    #[test]
    fn failed_cycle_returns_nothing() {
        let collector = TelemetryCollector::new(CollectionSettings::default(), Tz::UTC);
        assert!(collector
            .collect_cycle(&FailingSource, &TelemetryKind::ALL, None, now())
            .is_empty());

        let ok = collector.collect_cycle(
            &StaticActivitySource::default(),
            &[TelemetryKind::Temporal],
            None,
            now(),
        );
        assert_eq!(ok.len(), 1);
    }
}

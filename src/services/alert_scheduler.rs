//! Deadline alerts, rate limited per day and per session.
//!
//! [`DeadlineDetector`] finds and ranks due tasks. An [`AlertPolicy`] supplies the rules it runs
//! under: a fixed working-hours policy, or one resolved from the user's stored preferences.
//! [`ProactiveAlertScheduler`] owns both plus the per-day and per-session bookkeeping.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use uuid::Uuid;

use super::collaborators::{EffectivenessSink, PreferenceStore};
use crate::models::{
    AlertActionType, AlertPreferences, AlertSeverity, AlertTiming, AllowedHours, DeadlineAlert,
    EffectivenessRecord, EnergySchedule, EnergyTier, Task, TaskPriority, TaskReference,
    UserAction, UserProductivityPreferences, WorkHours,
};
use crate::utils::time::{calendar_days_until, local_date, local_hour, local_weekday, parse_timezone};

const ENERGY_MATCH_BONUS: i32 = 25;
const LOW_ENERGY_LONG_TASK_PENALTY: i32 = 20;
const LONG_TASK_MINUTES: f64 = 60.0;
const DEADLINE_ALERT_TYPE: &str = "deadline";

/// Anything that can be asked for at most one deadline alert per call.
pub trait AlertSource {
    fn check_for_deadline_alerts(
        &mut self,
        tasks: &[Task],
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Option<DeadlineAlert>;
}

/// Resolved gating and personalization rules for one user.
#[derive(Debug, Clone)]
pub struct AlertRules {
    pub enabled: bool,
    pub deadline_alerts: bool,
    pub allowed_hours: AllowedHours,
    pub work_hours: WorkHours,
    pub preferred_work_days: Vec<u32>,
    pub days_before: Vec<u32>,
    pub min_severity: AlertSeverity,
    pub max_daily_alerts: usize,
    pub timing: AlertTiming,
    /// `None` disables energy scoring and softening.
    pub energy: Option<EnergySchedule>,
    pub tz: Tz,
}

impl AlertRules {
    /// Fixed working hours, no energy awareness.
    pub fn basic(tz: Tz) -> Self {
        let defaults = AlertPreferences::default();
        Self {
            enabled: true,
            deadline_alerts: true,
            allowed_hours: AllowedHours::WorkHours,
            work_hours: WorkHours::default(),
            preferred_work_days: vec![1, 2, 3, 4, 5],
            days_before: defaults.deadline_days_before,
            min_severity: AlertSeverity::Low,
            max_daily_alerts: defaults.max_daily_alerts,
            timing: AlertTiming::Immediate,
            energy: None,
            tz,
        }
    }

    /// Used when preferences could not be loaded.
    pub fn permissive(tz: Tz) -> Self {
        Self {
            allowed_hours: AllowedHours::AnyTime,
            ..Self::basic(tz)
        }
    }

    pub fn from_preferences(prefs: &UserProductivityPreferences) -> Self {
        let alerts = &prefs.alerts;
        Self {
            enabled: alerts.enabled,
            deadline_alerts: alerts.deadline_alerts,
            allowed_hours: alerts.allowed_hours,
            work_hours: prefs.work_hours.clone(),
            preferred_work_days: prefs.preferred_work_days.clone(),
            days_before: alerts.deadline_days_before.clone(),
            min_severity: alerts.min_severity,
            max_daily_alerts: alerts.max_daily_alerts,
            timing: alerts.timing,
            energy: Some(prefs.energy_schedule.clone()),
            tz: parse_timezone(&prefs.timezone),
        }
    }

    pub fn energy_at(&self, now: DateTime<Utc>) -> Option<EnergyTier> {
        self.energy
            .as_ref()
            .map(|schedule| schedule.tier_at(local_hour(now, self.tz)))
    }

    pub fn allows(&self, now: DateTime<Utc>) -> bool {
        let hour = local_hour(now, self.tz);
        match self.allowed_hours {
            AllowedHours::AnyTime => true,
            AllowedHours::WorkHours => self.work_hours.contains(hour),
            AllowedHours::EnergyBased => {
                let work_day = self.preferred_work_days.contains(&local_weekday(now, self.tz));
                let tier = self
                    .energy
                    .as_ref()
                    .map_or(EnergyTier::Medium, |schedule| schedule.tier_at(hour));
                work_day && matches!(tier, EnergyTier::High | EnergyTier::Medium)
            }
        }
    }

    /// Energy match bonus and long-task penalty on top of the priority score.
    pub fn adjust_score(&self, task: &Task, base: i32, now: DateTime<Utc>) -> i32 {
        let Some(current) = self.energy_at(now) else {
            return base;
        };
        let long = task.estimated_duration.is_some_and(|d| d > LONG_TASK_MINUTES);
        let mut score = base;
        if estimated_energy_need(task) == current {
            score += ENERGY_MATCH_BONUS;
        }
        if current == EnergyTier::Low && long {
            score -= LOW_ENERGY_LONG_TASK_PENALTY;
        }
        score
    }

    pub fn adjust_severity(&self, severity: AlertSeverity, now: DateTime<Utc>) -> AlertSeverity {
        let low_energy = self.energy_at(now) == Some(EnergyTier::Low);
        if severity == AlertSeverity::High && self.timing == AlertTiming::EnergyAware && low_energy {
            AlertSeverity::Medium
        } else {
            severity
        }
    }
}

/// Urgent or high priority needs high energy, long work medium, the rest low.
fn estimated_energy_need(task: &Task) -> EnergyTier {
    if task.priority.is_high() {
        EnergyTier::High
    } else if task.estimated_duration.is_some_and(|d| d > LONG_TASK_MINUTES) {
        EnergyTier::Medium
    } else {
        EnergyTier::Low
    }
}

/// Supplies the rules a scheduler runs under.
pub trait AlertPolicy: Send {
    fn name(&self) -> &'static str;

    fn rules(&mut self) -> &AlertRules;
}

#[derive(Debug, Clone)]
pub struct BasicAlertPolicy {
    rules: AlertRules,
}

impl BasicAlertPolicy {
    pub fn new(tz: Tz) -> Self {
        Self {
            rules: AlertRules::basic(tz),
        }
    }
}

impl AlertPolicy for BasicAlertPolicy {
    fn name(&self) -> &'static str {
        "basic"
    }

    fn rules(&mut self) -> &AlertRules {
        &self.rules
    }
}

/// Rules derived from stored preferences, loaded on first use and cached.
pub struct PreferenceAlertPolicy {
    store: Arc<dyn PreferenceStore>,
    user_id: String,
    fallback_tz: Tz,
    cached: Option<AlertRules>,
}

impl PreferenceAlertPolicy {
    pub fn new(store: Arc<dyn PreferenceStore>, user_id: &str, fallback_tz: Tz) -> Self {
        Self {
            store,
            user_id: user_id.to_string(),
            fallback_tz,
            cached: None,
        }
    }

    fn load(&self) -> AlertRules {
        match self.store.load(&self.user_id) {
            Ok(Some(prefs)) => AlertRules::from_preferences(&prefs),
            Ok(None) => {
                log::info!("[AlertScheduler] No preferences for {}, using defaults", self.user_id);
                AlertRules::from_preferences(&UserProductivityPreferences::defaults_for(&self.user_id))
            }
            Err(e) => {
                log::warn!(
                    "[AlertScheduler] Failed to load preferences for {}: {}. Falling back to permissive rules",
                    self.user_id,
                    e
                );
                AlertRules::permissive(self.fallback_tz)
            }
        }
    }
}

impl AlertPolicy for PreferenceAlertPolicy {
    fn name(&self) -> &'static str {
        "preferences"
    }

    fn rules(&mut self) -> &AlertRules {
        if self.cached.is_none() {
            let loaded = self.load();
            self.cached = Some(loaded);
        }
        let fallback = self.fallback_tz;
        self.cached.get_or_insert_with(|| AlertRules::permissive(fallback))
    }
}

#[derive(Debug, Clone)]
pub struct DeadlineCandidate<'a> {
    pub task: &'a Task,
    pub due_date: DateTime<Utc>,
    pub days_until_due: u32,
    pub score: i32,
    pub severity: AlertSeverity,
}

/// Finds open tasks due on one of the whitelisted day offsets and ranks them.
#[derive(Debug, Clone, Default)]
pub struct DeadlineDetector;

impl DeadlineDetector {
    pub fn base_score(priority: TaskPriority) -> i32 {
        match priority {
            TaskPriority::Urgent => 100,
            TaskPriority::High => 75,
            TaskPriority::Medium => 50,
            TaskPriority::Low => 25,
        }
    }

    /// Urgent priority or due today wins over the due-tomorrow rule.
    pub fn base_severity(priority: TaskPriority, days_until_due: u32) -> AlertSeverity {
        if days_until_due == 0 || priority == TaskPriority::Urgent {
            AlertSeverity::High
        } else if days_until_due == 1 || priority == TaskPriority::High {
            AlertSeverity::Medium
        } else {
            AlertSeverity::Low
        }
    }

    /// Scored candidates, best first: score desc, then soonest due.
    pub fn candidates<'a>(
        &self,
        tasks: &'a [Task],
        rules: &AlertRules,
        now: DateTime<Utc>,
    ) -> Vec<DeadlineCandidate<'a>> {
        let mut candidates: Vec<DeadlineCandidate<'a>> = tasks
            .iter()
            .filter(|t| !t.is_completed())
            .filter_map(|task| {
                let due_date = task.due_date?;
                let days = u32::try_from(calendar_days_until(due_date, now, rules.tz)).ok()?;
                if !rules.days_before.contains(&days) {
                    return None;
                }
                let severity = rules.adjust_severity(Self::base_severity(task.priority, days), now);
                if severity < rules.min_severity {
                    return None;
                }
                Some(DeadlineCandidate {
                    task,
                    due_date,
                    days_until_due: days,
                    score: rules.adjust_score(task, Self::base_score(task.priority), now),
                    severity,
                })
            })
            .collect();
        candidates.sort_by(|a, b| match b.score.cmp(&a.score) {
            Ordering::Equal => a.days_until_due.cmp(&b.days_until_due),
            other => other,
        });
        candidates
    }

    pub fn build_alert(
        &self,
        candidate: &DeadlineCandidate<'_>,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> DeadlineAlert {
        let task = candidate.task;
        let when = match candidate.days_until_due {
            0 => "today".to_string(),
            1 => "tomorrow".to_string(),
            n => format!("in {} days", n),
        };
        let (action_label, action_type) =
            if candidate.days_until_due == 0 || candidate.severity == AlertSeverity::High {
                ("Start focus session", AlertActionType::StartFocusSession)
            } else {
                ("Open task", AlertActionType::OpenTask)
            };
        DeadlineAlert {
            id: format!("alert_{}", Uuid::new_v4()),
            severity: candidate.severity,
            title: format!("\"{}\" is due {}", task.title, when),
            message: format!(
                "This {} priority task is due {}. Now is a good time to make progress on it.",
                task.priority, when
            ),
            task: TaskReference {
                task_id: task.id.clone(),
                title: task.title.clone(),
                priority: task.priority,
                due_date: candidate.due_date,
            },
            days_until_due: candidate.days_until_due,
            action_label: action_label.to_string(),
            action_type,
            session_id: session_id.to_string(),
            created_at: now,
        }
    }
}

#[derive(Debug, Default)]
struct DailyCounter {
    date: Option<NaiveDate>,
    count: usize,
}

impl DailyCounter {
    fn count_on(&mut self, date: NaiveDate) -> usize {
        if self.date != Some(date) {
            self.date = Some(date);
            self.count = 0;
        }
        self.count
    }

    fn increment(&mut self, date: NaiveDate) {
        self.count_on(date);
        self.count += 1;
    }
}

pub struct ProactiveAlertScheduler {
    detector: DeadlineDetector,
    policy: Box<dyn AlertPolicy>,
    sink: Arc<dyn EffectivenessSink>,
    /// Session id to the local date it was alerted. Only today and yesterday are kept.
    alerted_sessions: HashMap<String, NaiveDate>,
    daily: DailyCounter,
}

impl ProactiveAlertScheduler {
    pub fn new(policy: Box<dyn AlertPolicy>, sink: Arc<dyn EffectivenessSink>) -> Self {
        Self {
            detector: DeadlineDetector,
            policy,
            sink,
            alerted_sessions: HashMap::new(),
            daily: DailyCounter::default(),
        }
    }

    pub fn basic(tz: Tz, sink: Arc<dyn EffectivenessSink>) -> Self {
        Self::new(Box::new(BasicAlertPolicy::new(tz)), sink)
    }

    pub fn personalized(
        store: Arc<dyn PreferenceStore>,
        user_id: &str,
        fallback_tz: Tz,
        sink: Arc<dyn EffectivenessSink>,
    ) -> Self {
        Self::new(Box::new(PreferenceAlertPolicy::new(store, user_id, fallback_tz)), sink)
    }

    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }

    pub fn alerts_sent_on(&mut self, date: NaiveDate) -> usize {
        self.daily.count_on(date)
    }

    pub fn tracked_sessions(&self) -> usize {
        self.alerted_sessions.len()
    }

    /// Drops sessions alerted before yesterday. A session running past midnight stays deduplicated.
    fn prune_sessions(&mut self, today: NaiveDate) {
        if let Some(yesterday) = today.pred_opt() {
            self.alerted_sessions.retain(|_, day| *day >= yesterday);
        }
    }

    /// Relays the user's reaction to an alert. Sink failures are logged, never returned.
    pub fn record_feedback(
        &self,
        alert: &DeadlineAlert,
        action: UserAction,
        relevance_score: Option<f64>,
        now: DateTime<Utc>,
    ) {
        let entry = EffectivenessRecord {
            alert_id: alert.id.clone(),
            alert_type: DEADLINE_ALERT_TYPE.to_string(),
            user_action: action,
            relevance_score,
            context_data: serde_json::json!({
                "task_id": alert.task.task_id,
                "severity": alert.severity,
                "days_until_due": alert.days_until_due,
                "session_id": alert.session_id,
                "alert_created_at": alert.created_at,
            }),
            shown_at: now,
        };
        if let Err(e) = self.sink.record(&entry) {
            log::warn!(
                "[AlertScheduler] Failed to record '{}' for {}: {}",
                action.as_str(),
                alert.id,
                e
            );
        }
    }
}

impl AlertSource for ProactiveAlertScheduler {
    fn check_for_deadline_alerts(
        &mut self,
        tasks: &[Task],
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Option<DeadlineAlert> {
        let rules = self.policy.rules().clone();
        if !rules.enabled || !rules.deadline_alerts {
            log::debug!("[AlertScheduler] Deadline alerts disabled");
            return None;
        }
        if !rules.allows(now) {
            log::debug!("[AlertScheduler] Outside allowed hours");
            return None;
        }
        let today = local_date(now, rules.tz);
        self.prune_sessions(today);
        if self.daily.count_on(today) >= rules.max_daily_alerts {
            log::debug!("[AlertScheduler] Daily cap of {} reached", rules.max_daily_alerts);
            return None;
        }
        if self.alerted_sessions.contains_key(session_id) {
            return None;
        }

        let candidates = self.detector.candidates(tasks, &rules, now);
        let best = candidates.first()?;
        let alert = self.detector.build_alert(best, session_id, now);

        self.daily.increment(today);
        self.alerted_sessions.insert(session_id.to_string(), today);
        log::info!(
            "[AlertScheduler] {:?} alert for task {} ({} candidates, policy {})",
            alert.severity,
            alert.task.task_id,
            candidates.len(),
            self.policy.name()
        );

        let relevance = (best.score as f64 / 125.0).clamp(0.0, 1.0);
        self.record_feedback(&alert, UserAction::Shown, Some(relevance), now);
        Some(alert)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskStatus;
    use crate::services::collaborators::NullEffectivenessSink;
    use crate::services::fixtures::{at_hour, now, task};
    use chrono::{Duration, TimeZone};
    use std::sync::Mutex;

    fn due(id: &str, priority: TaskPriority, days: i64) -> Task {
        let mut t = task(id, TaskStatus::Todo, priority);
        t.due_date = Some(now() + Duration::days(days));
        t
    }

    #[derive(Default)]
    struct RecordingSink {
        entries: Mutex<Vec<EffectivenessRecord>>,
    }

    impl EffectivenessSink for RecordingSink {
        fn record(&self, entry: &EffectivenessRecord) -> anyhow::Result<()> {
            self.entries.lock().unwrap().push(entry.clone());
            Ok(())
        }
    }

    struct FailingSink;

    impl EffectivenessSink for FailingSink {
        fn record(&self, _entry: &EffectivenessRecord) -> anyhow::Result<()> {
            anyhow::bail!("sink offline")
        }
    }

    struct FixedPreferences {
        prefs: Option<UserProductivityPreferences>,
        fail: bool,
        loads: Mutex<usize>,
    }

    impl FixedPreferences {
        fn with(prefs: Option<UserProductivityPreferences>, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                prefs,
                fail,
                loads: Mutex::new(0),
            })
        }
    }

    impl PreferenceStore for FixedPreferences {
        fn load(&self, _user_id: &str) -> anyhow::Result<Option<UserProductivityPreferences>> {
            *self.loads.lock().unwrap() += 1;
            if self.fail {
                anyhow::bail!("connection refused");
            }
            Ok(self.prefs.clone())
        }

        fn ensure_defaults(&self, user_id: &str) -> anyhow::Result<UserProductivityPreferences> {
            Ok(UserProductivityPreferences::defaults_for(user_id))
        }
    }

    fn basic() -> ProactiveAlertScheduler {
        ProactiveAlertScheduler::basic(Tz::UTC, Arc::new(NullEffectivenessSink))
    }

    #[test]
    fn one_alert_per_session() {
        let mut scheduler = basic();
        let tasks = vec![due("a", TaskPriority::High, 1), due("b", TaskPriority::Medium, 2)];
        assert!(scheduler.check_for_deadline_alerts(&tasks, "s1", now()).is_some());
        assert!(scheduler.check_for_deadline_alerts(&tasks, "s1", now()).is_none());
    }

    #[test]
    fn alerted_sessions_are_pruned_after_a_day() {
        let mut scheduler = basic();
        let due_next_day = |day: DateTime<Utc>| {
            let mut t = task("a", TaskStatus::Todo, TaskPriority::High);
            t.due_date = Some(day + Duration::days(1));
            vec![t]
        };
        let monday = at_hour(10);
        let tuesday = monday + Duration::days(1);
        let wednesday = monday + Duration::days(2);

        assert!(scheduler.check_for_deadline_alerts(&due_next_day(monday), "s1", monday).is_some());
        // still remembered the next day
        assert!(scheduler.check_for_deadline_alerts(&due_next_day(tuesday), "s1", tuesday).is_none());
        assert!(scheduler.check_for_deadline_alerts(&due_next_day(tuesday), "s2", tuesday).is_some());
        assert_eq!(scheduler.tracked_sessions(), 2);

        assert!(scheduler.check_for_deadline_alerts(&due_next_day(wednesday), "s3", wednesday).is_some());
        assert_eq!(scheduler.tracked_sessions(), 2);
        assert!(scheduler.check_for_deadline_alerts(&due_next_day(wednesday), "s1", wednesday).is_some());
    }

    #[test]
    fn stored_preference_offsets_drive_the_whitelist() {
        let json = r#"{
            "user_id": "u1",
            "alerts": {
                "enabled": true,
                "deadline_days_before": [5],
                "allowed_hours": "any_time",
                "min_severity": "low",
                "max_daily_alerts": 2,
                "deadline_alerts": true,
                "overload_alerts": false,
                "timing": "immediate"
            }
        }"#;
        let prefs: UserProductivityPreferences = serde_json::from_str(json).unwrap();
        let rules = AlertRules::from_preferences(&prefs);
        assert_eq!(rules.days_before, vec![5]);
        assert_eq!(rules.max_daily_alerts, 2);

        let tasks = vec![due("five", TaskPriority::Low, 5), due("one", TaskPriority::Urgent, 1)];
        let ranked = DeadlineDetector.candidates(&tasks, &rules, at_hour(10));
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].days_until_due, 5);
    }

    #[test]
    fn priority_dominates_due_date() {
        let mut scheduler = basic();
        let tasks = vec![due("soon", TaskPriority::Medium, 0), due("later", TaskPriority::Urgent, 2)];
        let alert = scheduler.check_for_deadline_alerts(&tasks, "s1", now()).unwrap();
        assert_eq!(alert.task.task_id, "later");
        assert_eq!(alert.severity, AlertSeverity::High);
        assert_eq!(alert.days_until_due, 2);
    }

    #[test]
    fn ties_go_to_the_sooner_task() {
        let mut scheduler = basic();
        let tasks = vec![due("later", TaskPriority::Medium, 3), due("soon", TaskPriority::Medium, 1)];
        let alert = scheduler.check_for_deadline_alerts(&tasks, "s1", now()).unwrap();
        assert_eq!(alert.task.task_id, "soon");
        assert_eq!(alert.severity, AlertSeverity::Medium);
        assert_eq!(alert.action_type, AlertActionType::OpenTask);
    }

    #[test]
    fn ignores_completed_and_unlisted_offsets() {
        let mut scheduler = basic();
        let mut done = due("done", TaskPriority::Urgent, 1);
        done.status = TaskStatus::Completed;
        let tasks = vec![done, due("five", TaskPriority::Urgent, 5), due("late", TaskPriority::Urgent, -1)];
        assert!(scheduler.check_for_deadline_alerts(&tasks, "s1", now()).is_none());
    }

    #[test]
    fn severity_rules_keep_their_precedence() {
        assert_eq!(DeadlineDetector::base_severity(TaskPriority::Low, 0), AlertSeverity::High);
        assert_eq!(DeadlineDetector::base_severity(TaskPriority::Urgent, 7), AlertSeverity::High);
        assert_eq!(DeadlineDetector::base_severity(TaskPriority::Low, 1), AlertSeverity::Medium);
        assert_eq!(DeadlineDetector::base_severity(TaskPriority::High, 3), AlertSeverity::Medium);
        assert_eq!(DeadlineDetector::base_severity(TaskPriority::Medium, 2), AlertSeverity::Low);
    }

    #[test]
    fn basic_policy_stays_inside_work_hours() {
        let mut scheduler = basic();
        let tasks = vec![due("a", TaskPriority::High, 1)];
        assert!(scheduler.check_for_deadline_alerts(&tasks, "s1", at_hour(20)).is_none());
        assert!(scheduler.check_for_deadline_alerts(&tasks, "s1", at_hour(10)).is_some());
    }

    #[test]
    fn daily_cap_holds_and_resets_on_a_new_day() {
        let mut prefs = UserProductivityPreferences::defaults_for("u1");
        prefs.alerts.max_daily_alerts = 1;
        let store = FixedPreferences::with(Some(prefs), false);
        let mut scheduler =
            ProactiveAlertScheduler::personalized(store.clone(), "u1", Tz::UTC, Arc::new(NullEffectivenessSink));

        let tasks = vec![due("a", TaskPriority::High, 1), due("b", TaskPriority::Low, 2)];
        assert!(scheduler.check_for_deadline_alerts(&tasks, "s1", at_hour(10)).is_some());
        assert!(scheduler.check_for_deadline_alerts(&tasks, "s2", at_hour(11)).is_none());

        let tomorrow = Utc.with_ymd_and_hms(2024, 3, 5, 10, 0, 0).unwrap();
        assert!(scheduler.check_for_deadline_alerts(&tasks, "s3", tomorrow).is_some());
        assert_eq!(*store.loads.lock().unwrap(), 1);
    }

    #[test]
    fn cap_is_never_exceeded_over_many_sessions() {
        let mut scheduler = basic();
        let tasks = vec![due("a", TaskPriority::High, 1)];
        let sent = (0..20)
            .filter(|i| {
                scheduler
                    .check_for_deadline_alerts(&tasks, &format!("s{}", i), at_hour(9 + (i % 8) as u32))
                    .is_some()
            })
            .count();
        assert_eq!(sent, 3);
        assert_eq!(scheduler.alerts_sent_on(now().date_naive()), 3);
    }

    #[test]
    fn energy_match_can_outrank_priority() {
        // 16:00 is a medium-energy hour; the long medium task gains +25 over the high one
        let prefs = UserProductivityPreferences::defaults_for("u1");
        let rules = AlertRules::from_preferences(&prefs);
        let mut long = due("long", TaskPriority::Medium, 2);
        long.estimated_duration = Some(90.0);
        let high = due("high", TaskPriority::High, 2);
        let tasks = vec![high, long];
        let ranked = DeadlineDetector.candidates(&tasks, &rules, at_hour(16));
        assert_eq!(ranked[0].task.id, "high");
        assert_eq!(ranked[0].score, 75);
        assert_eq!(ranked[1].score, 75);

        // 19:00 is low energy: long task loses 20
        let ranked = DeadlineDetector.candidates(&tasks, &rules, at_hour(19));
        let long_score = ranked.iter().find(|c| c.task.id == "long").unwrap().score;
        assert_eq!(long_score, 30);
    }

    #[test]
    fn energy_aware_timing_softens_high_severity() {
        let prefs = UserProductivityPreferences::defaults_for("u1");
        let rules = AlertRules::from_preferences(&prefs);
        let tasks = vec![due("a", TaskPriority::Urgent, 1)];
        let ranked = DeadlineDetector.candidates(&tasks, &rules, at_hour(12));
        assert_eq!(ranked[0].severity, AlertSeverity::Medium);
        let ranked = DeadlineDetector.candidates(&tasks, &rules, at_hour(10));
        assert_eq!(ranked[0].severity, AlertSeverity::High);
    }

    #[test]
    fn min_severity_filters_candidates() {
        let mut prefs = UserProductivityPreferences::defaults_for("u1");
        prefs.alerts.min_severity = AlertSeverity::Medium;
        prefs.alerts.allowed_hours = AllowedHours::AnyTime;
        let store = FixedPreferences::with(Some(prefs), false);
        let mut scheduler =
            ProactiveAlertScheduler::personalized(store, "u1", Tz::UTC, Arc::new(NullEffectivenessSink));
        let tasks = vec![due("a", TaskPriority::Low, 3)];
        assert!(scheduler.check_for_deadline_alerts(&tasks, "s1", at_hour(10)).is_none());
    }

    #[test]
    fn energy_based_hours_require_a_work_day() {
        let mut prefs = UserProductivityPreferences::defaults_for("u1");
        prefs.alerts.allowed_hours = AllowedHours::EnergyBased;
        let rules = AlertRules::from_preferences(&prefs);
        assert!(rules.allows(at_hour(10)));
        assert!(!rules.allows(at_hour(19)));
        let saturday = Utc.with_ymd_and_hms(2024, 3, 9, 10, 0, 0).unwrap();
        assert!(!rules.allows(saturday));
    }

    #[test]
    fn disabled_preferences_block_everything() {
        let mut prefs = UserProductivityPreferences::defaults_for("u1");
        prefs.alerts.enabled = false;
        let store = FixedPreferences::with(Some(prefs), false);
        let mut scheduler =
            ProactiveAlertScheduler::personalized(store, "u1", Tz::UTC, Arc::new(NullEffectivenessSink));
        let tasks = vec![due("a", TaskPriority::Urgent, 0)];
        assert!(scheduler.check_for_deadline_alerts(&tasks, "s1", at_hour(10)).is_none());
    }

    #[test]
    fn missing_preferences_use_defaults_and_errors_fall_open() {
        let tasks = vec![due("a", TaskPriority::High, 1)];

        let store = FixedPreferences::with(None, false);
        let mut defaults =
            ProactiveAlertScheduler::personalized(store, "u1", Tz::UTC, Arc::new(NullEffectivenessSink));
        assert!(defaults.check_for_deadline_alerts(&tasks, "s1", at_hour(20)).is_none());

        let store = FixedPreferences::with(None, true);
        let mut permissive =
            ProactiveAlertScheduler::personalized(store.clone(), "u1", Tz::UTC, Arc::new(NullEffectivenessSink));
        assert!(permissive.check_for_deadline_alerts(&tasks, "s1", at_hour(20)).is_some());
        assert!(permissive.check_for_deadline_alerts(&tasks, "s2", at_hour(21)).is_some());
        assert_eq!(*store.loads.lock().unwrap(), 1);
    }

    #[test]
    fn emitted_alerts_are_recorded_as_shown() {
        let sink = Arc::new(RecordingSink::default());
        let mut scheduler = ProactiveAlertScheduler::basic(Tz::UTC, sink.clone());
        let tasks = vec![due("a", TaskPriority::Urgent, 0)];
        let alert = scheduler.check_for_deadline_alerts(&tasks, "s1", now()).unwrap();
        assert_eq!(alert.action_type, AlertActionType::StartFocusSession);

        scheduler.record_feedback(&alert, UserAction::Accepted, None, now());
        let entries = sink.entries.lock().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].user_action, UserAction::Shown);
        assert_eq!(entries[0].alert_id, alert.id);
        assert_eq!(entries[1].user_action, UserAction::Accepted);
    }

    #[test]
    fn sink_failures_do_not_block_alerts() {
        let mut scheduler = ProactiveAlertScheduler::basic(Tz::UTC, Arc::new(FailingSink));
        let tasks = vec![due("a", TaskPriority::Urgent, 0)];
        assert!(scheduler.check_for_deadline_alerts(&tasks, "s1", now()).is_some());
    }
}

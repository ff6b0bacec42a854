use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;

use crate::error::{AnalyticsError, Result};
use crate::models::{
    AnalysisSettings, BlockagePattern, DataQuality, DayPeriod, DurationPattern, Impact, Insight,
    InsightAction, InsightActionType, InsightCategory, InsightType, PatternAnalysisResult,
    PatternData, ProductivityPattern, Recommendation, RecommendationType, Task, TaskPriority,
    TaskSession, TaskTypePattern, TemporalPattern, WorkPattern,
};
use crate::utils::stats::{mean, nearest_rank};
use crate::utils::time::{local_hour, parse_timezone};

const MIN_TEMPORAL_SAMPLES: usize = 3;
const MIN_DURATION_SAMPLES: usize = 5;
const MIN_PRODUCTIVITY_SAMPLES: usize = 3;
const MIN_BLOCKED_TASKS: usize = 3;
const STALE_AFTER_DAYS: i64 = 7;
const UNDERESTIMATE_RATIO: f64 = 1.2;
const ESTIMATION_RECOMMENDATION_RATIO: f64 = 1.3;

/// Mines work patterns from a trailing window of tasks and focus sessions.
///
/// Stateless: every call recomputes from the snapshot it is given.
#[derive(Debug, Clone)]
pub struct PatternAnalyzer {
    settings: AnalysisSettings,
    tz: Tz,
    insight_ttl: Duration,
}

impl PatternAnalyzer {
    pub fn new(settings: AnalysisSettings, insight_ttl_hours: i64) -> Self {
        let tz = parse_timezone(&settings.timezone);
        Self {
            settings,
            tz,
            insight_ttl: Duration::hours(insight_ttl_hours),
        }
    }

    /// Never fails. Bad input degrades to an empty result carrying one error insight.
    pub fn analyze(
        &self,
        tasks: &[Task],
        sessions: &[TaskSession],
        now: DateTime<Utc>,
    ) -> PatternAnalysisResult {
        match self.try_analyze(tasks, sessions, now) {
            Ok(result) => {
                log::info!(
                    "[PatternAnalyzer] {} patterns, quality {:?}, confidence {:.2}",
                    result.patterns.len(),
                    result.data_quality,
                    result.confidence
                );
                result
            }
            Err(e) => {
                log::error!("[PatternAnalyzer] Analysis failed: {}", e);
                let insight = Insight::new(
                    "analysis_error",
                    InsightType::AnalysisError,
                    InsightCategory::Warning,
                    "Pattern analysis failed",
                    format!("Your activity could not be analyzed: {}", e),
                    3,
                    0.0,
                    now,
                    self.insight_ttl,
                );
                PatternAnalysisResult {
                    patterns: Vec::new(),
                    insights: vec![insight],
                    recommendations: Vec::new(),
                    confidence: 0.0,
                    data_quality: DataQuality::Low,
                    tasks_analyzed: 0,
                    sessions_analyzed: 0,
                    analyzed_at: now,
                }
            }
        }
    }

    pub fn try_analyze(
        &self,
        tasks: &[Task],
        sessions: &[TaskSession],
        now: DateTime<Utc>,
    ) -> Result<PatternAnalysisResult> {
        validate(tasks, sessions)?;

        let cutoff = now - Duration::days(self.settings.analysis_window_days);
        let tasks: Vec<&Task> = tasks
            .iter()
            .filter(|t| t.created_at >= cutoff || t.completed_at.is_some_and(|c| c >= cutoff))
            .collect();
        let sessions: Vec<&TaskSession> = sessions.iter().filter(|s| s.started_at >= cutoff).collect();

        let data_quality = assess_data_quality(&tasks, &sessions);
        if data_quality == DataQuality::Low {
            log::info!(
                "[PatternAnalyzer] Insufficient data ({} tasks, {} sessions)",
                tasks.len(),
                sessions.len()
            );
            let insight = Insight::new(
                "data_quality_insufficient",
                InsightType::DataQuality,
                InsightCategory::Neutral,
                "Not enough activity yet",
                "Complete a few more tasks and focus sessions to unlock personalized patterns.",
                3,
                0.1,
                now,
                self.insight_ttl,
            );
            return Ok(PatternAnalysisResult {
                patterns: Vec::new(),
                insights: vec![insight],
                recommendations: Vec::new(),
                confidence: 0.1,
                data_quality,
                tasks_analyzed: tasks.len(),
                sessions_analyzed: sessions.len(),
                analyzed_at: now,
            });
        }

        let mut patterns = Vec::new();
        if self.settings.temporal {
            patterns.extend(self.temporal_patterns(&tasks, &sessions, now));
        }
        if self.settings.task_type {
            patterns.extend(self.task_type_patterns(&tasks, now));
        }
        if self.settings.duration {
            patterns.extend(self.duration_patterns(&tasks, now));
        }
        if self.settings.productivity {
            patterns.extend(self.productivity_patterns(&sessions, now));
        }
        if self.settings.blockage {
            patterns.extend(self.blockage_patterns(&tasks, now));
        }

        let insights = self.derive_insights(&patterns, now);
        let recommendations = derive_recommendations(&patterns);
        let confidence = overall_confidence(&patterns);

        Ok(PatternAnalysisResult {
            patterns,
            insights,
            recommendations,
            confidence,
            data_quality,
            tasks_analyzed: tasks.len(),
            sessions_analyzed: sessions.len(),
            analyzed_at: now,
        })
    }

    fn temporal_patterns(
        &self,
        tasks: &[&Task],
        sessions: &[&TaskSession],
        now: DateTime<Utc>,
    ) -> Vec<WorkPattern> {
        let mut buckets: BTreeMap<u32, Vec<&Task>> = BTreeMap::new();
        for task in tasks.iter().filter(|t| t.is_completed()) {
            if let Some(done) = task.completed_at {
                buckets.entry(local_hour(done, self.tz)).or_default().push(*task);
            }
        }

        buckets
            .into_iter()
            .filter(|(_, bucket)| bucket.len() >= MIN_TEMPORAL_SAMPLES)
            .map(|(hour, bucket)| {
                let n = bucket.len();
                let scores: Vec<f64> = sessions
                    .iter()
                    .filter(|s| local_hour(s.started_at, self.tz) == hour)
                    .filter_map(|s| s.productivity_score)
                    .collect();
                let durations: Vec<f64> = bucket.iter().filter_map(|t| t.actual_duration).collect();
                let last_observed = bucket.iter().filter_map(|t| t.completed_at).max().unwrap_or(now);

                let data = TemporalPattern {
                    hour,
                    completion_count: n,
                    productivity_score: mean(&scores),
                    avg_duration_minutes: mean(&durations),
                };
                let mut notes = vec![format!("You completed {} tasks around {:02}:00", n, hour)];
                if let Some(score) = data.productivity_score {
                    notes.push(format!("Average focus score at {:02}:00 is {:.1}", hour, score));
                }
                WorkPattern::new(
                    &hour.to_string(),
                    (n as f64 / 10.0).min(0.9),
                    n,
                    PatternData::Temporal(data),
                    notes,
                    last_observed,
                    now,
                )
            })
            .collect()
    }

    fn task_type_patterns(&self, tasks: &[&Task], now: DateTime<Utc>) -> Vec<WorkPattern> {
        if tasks.len() < self.settings.min_data_points {
            return Vec::new();
        }

        let mut groups: HashMap<TaskPriority, Vec<&Task>> = HashMap::new();
        for task in tasks {
            groups.entry(task.priority).or_default().push(*task);
        }

        TaskPriority::ALL
            .iter()
            .filter_map(|priority| groups.get(priority).map(|g| (*priority, g)))
            .map(|(priority, group)| {
                let n = group.len();
                let completed: Vec<&&Task> = group.iter().filter(|t| t.is_completed()).collect();
                let durations: Vec<f64> = completed.iter().filter_map(|t| t.actual_duration).collect();
                let completion_rate = completed.len() as f64 / n as f64;
                let last_observed = group.iter().map(|t| t.updated_at).max().unwrap_or(now);

                let data = TaskTypePattern {
                    priority,
                    task_count: n,
                    completed_count: completed.len(),
                    completion_rate,
                    avg_duration_minutes: mean(&durations),
                };
                let notes = vec![format!(
                    "{:.0}% of {} priority tasks get completed",
                    completion_rate * 100.0,
                    priority
                )];
                WorkPattern::new(
                    priority.as_str(),
                    (n as f64 / 20.0).min(0.8),
                    n,
                    PatternData::TaskType(data),
                    notes,
                    last_observed,
                    now,
                )
            })
            .collect()
    }

    fn duration_patterns(&self, tasks: &[&Task], now: DateTime<Utc>) -> Vec<WorkPattern> {
        let mut groups: HashMap<TaskPriority, Vec<(f64, f64)>> = HashMap::new();
        let mut last_seen: HashMap<TaskPriority, DateTime<Utc>> = HashMap::new();
        for task in tasks {
            if let (Some(est), Some(actual)) = (task.estimated_duration, task.actual_duration) {
                if est > 0.0 {
                    groups.entry(task.priority).or_default().push((est, actual));
                    let seen = last_seen.entry(task.priority).or_insert(task.updated_at);
                    *seen = (*seen).max(task.updated_at);
                }
            }
        }

        TaskPriority::ALL
            .iter()
            .filter_map(|priority| groups.get(priority).map(|g| (*priority, g)))
            .filter(|(_, samples)| samples.len() >= MIN_DURATION_SAMPLES)
            .filter_map(|(priority, samples)| {
                let n = samples.len();
                let estimated: Vec<f64> = samples.iter().map(|(e, _)| *e).collect();
                let mut actual: Vec<f64> = samples.iter().map(|(_, a)| *a).collect();
                actual.sort_by(|a, b| a.total_cmp(b));

                let avg_estimated = mean(&estimated)?;
                let avg_actual = mean(&actual)?;
                let ratio = avg_actual / avg_estimated;
                let data = DurationPattern {
                    priority,
                    sample_count: n,
                    avg_estimated,
                    avg_actual,
                    estimated_vs_actual: ratio,
                    q1_actual: nearest_rank(&actual, 0.25)?,
                    q3_actual: nearest_rank(&actual, 0.75)?,
                };
                let notes = vec![format!(
                    "{} priority tasks take {:.0}% of their estimate",
                    priority,
                    ratio * 100.0
                )];
                Some(WorkPattern::new(
                    priority.as_str(),
                    (n as f64 / 15.0).min(0.8),
                    n,
                    PatternData::Duration(data),
                    notes,
                    last_seen.get(&priority).copied().unwrap_or(now),
                    now,
                ))
            })
            .collect()
    }

    fn productivity_patterns(&self, sessions: &[&TaskSession], now: DateTime<Utc>) -> Vec<WorkPattern> {
        let mut morning = Vec::new();
        let mut afternoon = Vec::new();
        for session in sessions {
            if session.productivity_score.is_none() {
                continue;
            }
            if local_hour(session.started_at, self.tz) < 12 {
                morning.push(*session);
            } else {
                afternoon.push(*session);
            }
        }

        [(DayPeriod::Morning, morning), (DayPeriod::Afternoon, afternoon)]
            .into_iter()
            .filter(|(_, bucket)| bucket.len() >= MIN_PRODUCTIVITY_SAMPLES)
            .filter_map(|(period, bucket)| {
                let n = bucket.len();
                let scores: Vec<f64> = bucket.iter().filter_map(|s| s.productivity_score).collect();
                let durations: Vec<f64> = bucket.iter().filter_map(|s| s.duration_minutes).collect();
                let avg = mean(&scores)?;
                let key = match period {
                    DayPeriod::Morning => "morning",
                    DayPeriod::Afternoon => "afternoon",
                };
                let last_observed = bucket.iter().map(|s| s.started_at).max().unwrap_or(now);
                Some(WorkPattern::new(
                    key,
                    (n as f64 / 10.0).min(0.8),
                    n,
                    PatternData::Productivity(ProductivityPattern {
                        period,
                        avg_productivity: avg,
                        session_count: n,
                        avg_duration_minutes: mean(&durations),
                    }),
                    vec![format!("Your {} sessions average a focus score of {:.1}", key, avg)],
                    last_observed,
                    now,
                ))
            })
            .collect()
    }

    fn blockage_patterns(&self, tasks: &[&Task], now: DateTime<Utc>) -> Vec<WorkPattern> {
        let stale_before = now - Duration::days(STALE_AFTER_DAYS);
        let stuck: Vec<&&Task> = tasks
            .iter()
            .filter(|t| t.is_open() && t.updated_at < stale_before)
            .collect();
        if stuck.len() < MIN_BLOCKED_TASKS {
            return Vec::new();
        }

        let n = stuck.len();
        let mut priority_distribution = BTreeMap::new();
        for task in &stuck {
            *priority_distribution.entry(task.priority.to_string()).or_insert(0) += 1;
        }
        let stale_days: Vec<f64> = stuck
            .iter()
            .map(|t| (now - t.updated_at).num_hours() as f64 / 24.0)
            .collect();
        let last_observed = stuck.iter().map(|t| t.updated_at).max().unwrap_or(now);

        let data = BlockagePattern {
            stuck_count: n,
            task_ids: stuck.iter().map(|t| t.id.clone()).collect(),
            priority_distribution,
            avg_days_stale: mean(&stale_days).unwrap_or(0.0),
        };
        vec![WorkPattern::new(
            "stale",
            (n as f64 / 10.0).min(0.8),
            n,
            PatternData::Blockage(data),
            vec![format!("{} open tasks have not moved in over a week", n)],
            last_observed,
            now,
        )]
    }

    fn derive_insights(&self, patterns: &[WorkPattern], now: DateTime<Utc>) -> Vec<Insight> {
        let mut insights = Vec::new();

        if let Some((pattern, data)) = best_temporal(patterns) {
            if let Some(score) = data.productivity_score {
                insights.push(
                    Insight::new(
                        "temporal_best_hour",
                        InsightType::Productivity,
                        InsightCategory::Positive,
                        format!("You do your best work around {:02}:00", data.hour),
                        format!(
                            "Sessions at {:02}:00 average a focus score of {:.1} across {} completed tasks.",
                            data.hour, score, data.completion_count
                        ),
                        2,
                        pattern.confidence,
                        now,
                        self.insight_ttl,
                    )
                    .with_data(serde_json::json!({ "hour": data.hour, "productivity_score": score })),
                );
            }
        }

        if let Some((pattern, data)) = worst_duration(patterns) {
            if data.estimated_vs_actual > UNDERESTIMATE_RATIO {
                let overrun = (data.estimated_vs_actual - 1.0) * 100.0;
                insights.push(
                    Insight::new(
                        "duration_underestimate",
                        InsightType::Timing,
                        InsightCategory::Warning,
                        "Tasks are taking longer than planned",
                        format!(
                            "{} priority tasks run {:.0}% over their estimates.",
                            data.priority, overrun
                        ),
                        2,
                        pattern.confidence,
                        now,
                        self.insight_ttl,
                    )
                    .with_data(serde_json::json!({
                        "priority": data.priority,
                        "estimated_vs_actual": data.estimated_vs_actual,
                    })),
                );
            }
        }

        for pattern in patterns {
            if let PatternData::Blockage(data) = &pattern.data {
                insights.push(
                    Insight::new(
                        "blockage_stuck_tasks",
                        InsightType::TaskHealth,
                        InsightCategory::Warning,
                        format!("{} tasks appear to be stuck", data.stuck_count),
                        format!(
                            "These tasks have gone {:.0} days on average without an update.",
                            data.avg_days_stale
                        ),
                        2,
                        pattern.confidence,
                        now,
                        self.insight_ttl,
                    )
                    .with_actions(vec![InsightAction::new(
                        "Review stuck tasks",
                        InsightActionType::Navigate,
                        Some("tasks?filter=stale"),
                    )]),
                );
            }
        }

        insights
    }
}

/// Quality gate applied before any mining.
pub fn assess_data_quality(tasks: &[&Task], sessions: &[&TaskSession]) -> DataQuality {
    let completed = tasks.iter().filter(|t| t.is_completed()).count();
    let with_actual = tasks.iter().filter(|t| t.actual_duration.is_some()).count();
    let session_count = sessions.len();

    if completed < 5 && session_count < 3 {
        DataQuality::Low
    } else if completed >= 15 && session_count >= 10 && with_actual >= 5 {
        DataQuality::High
    } else {
        DataQuality::Medium
    }
}

/// mean(pattern confidence) + min(count / 10, 0.2), capped at 1.
pub fn overall_confidence(patterns: &[WorkPattern]) -> f64 {
    let confidences: Vec<f64> = patterns.iter().map(|p| p.confidence).collect();
    match mean(&confidences) {
        Some(avg) => (avg + (patterns.len() as f64 / 10.0).min(0.2)).min(1.0),
        None => 0.0,
    }
}

/// Temporal pattern with the highest productivity score.
pub fn best_temporal(patterns: &[WorkPattern]) -> Option<(&WorkPattern, &TemporalPattern)> {
    patterns
        .iter()
        .filter_map(|p| match &p.data {
            PatternData::Temporal(data) => data.productivity_score.map(|score| (p, data, score)),
            _ => None,
        })
        .max_by(|a, b| a.2.total_cmp(&b.2))
        .map(|(p, data, _)| (p, data))
}

/// Duration pattern with the largest actual/estimated ratio.
pub fn worst_duration(patterns: &[WorkPattern]) -> Option<(&WorkPattern, &DurationPattern)> {
    patterns
        .iter()
        .filter_map(|p| match &p.data {
            PatternData::Duration(data) => Some((p, data)),
            _ => None,
        })
        .max_by(|a, b| a.1.estimated_vs_actual.total_cmp(&b.1.estimated_vs_actual))
}

fn derive_recommendations(patterns: &[WorkPattern]) -> Vec<Recommendation> {
    let mut recommendations = Vec::new();

    if let Some((pattern, data)) = best_temporal(patterns) {
        let score = data.productivity_score.unwrap_or(0.0);
        recommendations.push(Recommendation {
            id: format!("rec_timing_{}", data.hour),
            rec_type: RecommendationType::Timing,
            title: format!("Schedule demanding work around {:02}:00", data.hour),
            description: format!(
                "Your focus peaks at {:02}:00. Block that hour for your most important task.",
                data.hour
            ),
            expected_impact: if score >= 4.0 { Impact::High } else { Impact::Medium },
            confidence: pattern.confidence,
            action_steps: vec![
                format!("Reserve {:02}:00-{:02}:00 in your calendar", data.hour, (data.hour + 1) % 24),
                "Move low-effort tasks out of that slot".to_string(),
            ],
            pattern_ids: vec![pattern.id.clone()],
        });
    }

    let periods: Vec<(&WorkPattern, &ProductivityPattern)> = patterns
        .iter()
        .filter_map(|p| match &p.data {
            PatternData::Productivity(data) => Some((p, data)),
            _ => None,
        })
        .collect();
    if let [a, b] = periods.as_slice() {
        let (better, worse) = if a.1.avg_productivity >= b.1.avg_productivity { (a, b) } else { (b, a) };
        if better.1.avg_productivity - worse.1.avg_productivity > 0.5 {
            let name = match better.1.period {
                DayPeriod::Morning => "mornings",
                DayPeriod::Afternoon => "afternoons",
            };
            recommendations.push(Recommendation {
                id: format!("rec_focus_{}", name),
                rec_type: RecommendationType::Focus,
                title: format!("Protect your {} for deep work", name),
                description: format!(
                    "Focus averages {:.1} in your {} versus {:.1} otherwise.",
                    better.1.avg_productivity, name, worse.1.avg_productivity
                ),
                expected_impact: Impact::Medium,
                confidence: (better.0.confidence + worse.0.confidence) / 2.0,
                action_steps: vec![format!("Keep meetings out of your {}", name)],
                pattern_ids: vec![better.0.id.clone(), worse.0.id.clone()],
            });
        }
    }

    if let Some((pattern, data)) = worst_duration(patterns) {
        if data.estimated_vs_actual > ESTIMATION_RECOMMENDATION_RATIO {
            let buffer = (data.estimated_vs_actual - 1.0) * 100.0;
            recommendations.push(Recommendation {
                id: format!("rec_estimation_{}", data.priority),
                rec_type: RecommendationType::Estimation,
                title: format!("Add a {:.0}% buffer to {} priority estimates", buffer, data.priority),
                description: format!(
                    "These tasks average {:.0} minutes against {:.0} estimated.",
                    data.avg_actual, data.avg_estimated
                ),
                expected_impact: if data.estimated_vs_actual > 1.5 { Impact::High } else { Impact::Medium },
                confidence: pattern.confidence,
                action_steps: vec!["Break large tasks into pieces under an hour".to_string()],
                pattern_ids: vec![pattern.id.clone()],
            });
        }
    }

    for pattern in patterns {
        if let PatternData::Blockage(data) = &pattern.data {
            recommendations.push(Recommendation {
                id: "rec_unblocking_stale".to_string(),
                rec_type: RecommendationType::Unblocking,
                title: format!("Review {} stalled tasks", data.stuck_count),
                description: "Decide whether each one should be split, delegated or dropped.".to_string(),
                expected_impact: if data.stuck_count > 5 { Impact::High } else { Impact::Medium },
                confidence: pattern.confidence,
                action_steps: vec!["Pick one stalled task and define its next step".to_string()],
                pattern_ids: vec![pattern.id.clone()],
            });
        }
    }

    recommendations
}

fn validate(tasks: &[Task], sessions: &[TaskSession]) -> Result<()> {
    for task in tasks {
        for (name, value) in [("estimated_duration", task.estimated_duration), ("actual_duration", task.actual_duration)] {
            if let Some(v) = value {
                if !v.is_finite() || v < 0.0 {
                    return Err(AnalyticsError::InvalidInput(format!(
                        "task {} has invalid {}: {}",
                        task.id, name, v
                    )));
                }
            }
        }
    }
    for session in sessions {
        if let Some(score) = session.productivity_score {
            if !score.is_finite() {
                return Err(AnalyticsError::InvalidInput(format!(
                    "session {} has a non-finite productivity score",
                    session.id
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskStatus;
    use crate::services::fixtures::{at_hour, completed_at, now, session, task};

    fn analyzer() -> PatternAnalyzer {
        PatternAnalyzer::new(AnalysisSettings::default(), 24)
    }

    fn completions_at(hour: u32, count: usize) -> Vec<Task> {
        (0..count)
            .map(|i| completed_at(&format!("h{}-{}", hour, i), at_hour(hour) - Duration::days(i as i64)))
            .collect()
    }

    #[test]
    fn sparse_data_short_circuits() {
        let tasks = completions_at(10, 4);
        let sessions = vec![session("s1", at_hour(10), Some(4.0))];
        let result = analyzer().analyze(&tasks, &sessions, now());
        assert!(result.patterns.is_empty());
        assert_eq!(result.insights.len(), 1);
        assert_eq!(result.insights[0].category, InsightCategory::Neutral);
        assert_eq!(result.data_quality, DataQuality::Low);
    }

    #[test]
    fn data_quality_tiers() {
        let tasks = completions_at(9, 15);
        let refs: Vec<&Task> = tasks.iter().collect();
        let sessions: Vec<TaskSession> = (0..10).map(|i| session(&i.to_string(), at_hour(9), None)).collect();
        let session_refs: Vec<&TaskSession> = sessions.iter().collect();
        // no actual durations yet
        assert_eq!(assess_data_quality(&refs, &session_refs), DataQuality::Medium);

        let mut with_actual = tasks.clone();
        for t in with_actual.iter_mut().take(5) {
            t.actual_duration = Some(30.0);
        }
        let refs: Vec<&Task> = with_actual.iter().collect();
        assert_eq!(assess_data_quality(&refs, &session_refs), DataQuality::High);
    }

    #[test]
    fn temporal_bucket_needs_three_completions() {
        let mut tasks = completions_at(10, 3);
        tasks.extend(completions_at(15, 2));
        let sessions: Vec<TaskSession> =
            (0..3).map(|i| session(&i.to_string(), at_hour(8), Some(3.0))).collect();

        let result = analyzer().analyze(&tasks, &sessions, now());
        let temporal: Vec<&WorkPattern> = result
            .patterns
            .iter()
            .filter(|p| p.family == crate::models::PatternFamily::Temporal)
            .collect();
        assert_eq!(temporal.len(), 1);
        assert_eq!(temporal[0].id, "pattern_temporal_10");
        assert!((temporal[0].confidence - 0.3).abs() < 1e-9);
    }

    #[test]
    fn temporal_pattern_carries_session_productivity() {
        let tasks = completions_at(10, 5);
        let sessions: Vec<TaskSession> = [4.0, 5.0, 4.0, 5.0, 4.0]
            .iter()
            .enumerate()
            .map(|(i, score)| session(&i.to_string(), at_hour(10) - Duration::days(i as i64), Some(*score)))
            .collect();

        let result = analyzer().analyze(&tasks, &sessions, now());
        let pattern = result.patterns.iter().find(|p| p.id == "pattern_temporal_10").unwrap();
        assert!((pattern.confidence - 0.5).abs() < 1e-9);
        let PatternData::Temporal(data) = &pattern.data else { panic!("expected temporal data") };
        assert!((data.productivity_score.unwrap() - 4.4).abs() < 1e-9);
        assert!(result.insights.iter().any(|i| i.id.starts_with("insight_temporal_best_hour")));
    }

    #[test]
    fn duration_pattern_uses_nearest_rank_quartiles() {
        let actuals = [60.0, 70.0, 80.0, 90.0, 100.0];
        let tasks: Vec<Task> = actuals
            .iter()
            .enumerate()
            .map(|(i, actual)| {
                let mut t = completed_at(&format!("d{}", i), at_hour(11) - Duration::hours(i as i64 * 5));
                t.priority = TaskPriority::High;
                t.estimated_duration = Some(50.0);
                t.actual_duration = Some(*actual);
                t
            })
            .collect();

        let result = analyzer().analyze(&tasks, &[], now());
        let pattern = result.patterns.iter().find(|p| p.id == "pattern_duration_high").unwrap();
        let PatternData::Duration(data) = &pattern.data else { panic!("expected duration data") };
        assert!((data.estimated_vs_actual - 1.6).abs() < 1e-9);
        assert_eq!(data.q1_actual, 70.0);
        assert_eq!(data.q3_actual, 90.0);
        assert!((pattern.confidence - 5.0 / 15.0).abs() < 1e-9);
        assert!(result
            .recommendations
            .iter()
            .any(|r| r.rec_type == RecommendationType::Estimation && r.expected_impact == Impact::High));
    }

    #[test]
    fn task_type_requires_min_data_points() {
        let tasks: Vec<Task> = (0..9)
            .map(|i| completed_at(&i.to_string(), now() - Duration::hours(i)))
            .collect();
        let result = analyzer().analyze(&tasks, &[], now());
        assert!(!result.patterns.iter().any(|p| p.family == crate::models::PatternFamily::TaskType));

        let mut more = tasks.clone();
        more.push(task("open", TaskStatus::Todo, TaskPriority::Medium));
        let result = analyzer().analyze(&more, &[], now());
        let pattern = result.patterns.iter().find(|p| p.id == "pattern_task_type_medium").unwrap();
        assert!((pattern.confidence - 0.5).abs() < 1e-9);
        let PatternData::TaskType(data) = &pattern.data else { panic!("expected task type data") };
        assert!((data.completion_rate - 0.9).abs() < 1e-9);
    }

    #[test]
    fn productivity_splits_morning_and_afternoon() {
        let tasks = completions_at(9, 5);
        let mut sessions: Vec<TaskSession> =
            (0..3).map(|i| session(&format!("m{}", i), at_hour(9), Some(4.5))).collect();
        sessions.extend((0..2).map(|i| session(&format!("a{}", i), at_hour(15), Some(2.0))));

        let result = analyzer().analyze(&tasks, &sessions, now());
        let ids: Vec<&str> = result
            .patterns
            .iter()
            .filter(|p| p.family == crate::models::PatternFamily::Productivity)
            .map(|p| p.id.as_str())
            .collect();
        assert_eq!(ids, vec!["pattern_productivity_morning"]);
    }

    #[test]
    fn stale_open_tasks_form_a_blockage_pattern() {
        let mut tasks = completions_at(9, 5);
        for i in 0..4 {
            let mut t = task(&format!("stuck{}", i), TaskStatus::InProgress, TaskPriority::High);
            t.created_at = now() - Duration::days(20);
            t.updated_at = now() - Duration::days(10);
            tasks.push(t);
        }
        let mut cancelled = task("gone", TaskStatus::Cancelled, TaskPriority::High);
        cancelled.updated_at = now() - Duration::days(10);
        tasks.push(cancelled);

        let result = analyzer().analyze(&tasks, &[], now());
        let pattern = result.patterns.iter().find(|p| p.family == crate::models::PatternFamily::Blockage).unwrap();
        assert_eq!(pattern.frequency, 4);
        assert!((pattern.confidence - 0.4).abs() < 1e-9);
        let PatternData::Blockage(data) = &pattern.data else { panic!("expected blockage data") };
        assert_eq!(data.priority_distribution.get("high"), Some(&4));
        assert!(result.insights.iter().any(|i| i.insight_type == InsightType::TaskHealth));
    }

    #[test]
    fn invalid_input_degrades_to_error_result() {
        let mut tasks = completions_at(10, 5);
        tasks[0].actual_duration = Some(f64::NAN);
        let result = analyzer().analyze(&tasks, &[], now());
        assert!(result.patterns.is_empty());
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.data_quality, DataQuality::Low);
        assert_eq!(result.insights[0].insight_type, InsightType::AnalysisError);
    }

    #[test]
    fn overall_confidence_adds_pattern_count_bonus() {
        let tasks = completions_at(10, 5);
        let result = analyzer().analyze(&tasks, &[], now());
        // one temporal pattern with confidence 0.5, bonus 0.1
        assert_eq!(result.patterns.len(), 1);
        assert!((result.confidence - 0.6).abs() < 1e-9);
    }
}

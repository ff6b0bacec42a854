use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::OnceLock;

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use regex::Regex;

use crate::models::{
    CompletionPrediction, DurationPrediction, PredictionData, PredictionPriority,
    PredictiveAnalysisResult, PredictiveInsight, PredictiveInsightType, Project, ProjectStatus,
    Task, TaskSession, TrendDirection, VelocityTrend,
};
use crate::utils::stats::{coefficient_of_variation, mean};
use crate::utils::time::local_hour;

const MAX_PREDICTIVE_INSIGHTS: usize = 5;
const SIMILARITY_THRESHOLD: u32 = 30;
const MIN_SIMILAR_TASKS: usize = 2;
const MIN_SURFACED_DURATION_CONFIDENCE: f64 = 0.6;
const SHORT_TASK_MINUTES: f64 = 30.0;
const MIN_SHORT_TASKS: usize = 2;
const PEAK_MARGIN: f64 = 1.0;
const OVERLOAD_RATIO: f64 = 0.7;
const STABLE_VELOCITY_PERCENT: f64 = 10.0;
const VELOCITY_WINDOW_DAYS: i64 = 7;

/// Forecasts built directly from tasks, projects and sessions.
#[derive(Debug, Clone)]
pub struct PredictiveAnalyzer {
    tz: Tz,
}

impl PredictiveAnalyzer {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    pub fn analyze(
        &self,
        tasks: &[Task],
        projects: &[Project],
        sessions: &[TaskSession],
        now: DateTime<Utc>,
    ) -> PredictiveAnalysisResult {
        let completions = predict_completions(tasks, projects, now);
        let durations = predict_durations(tasks);
        let velocity = velocity_trend(tasks, now);

        let mut insights: Vec<PredictiveInsight> = Vec::new();
        insights.extend(completions.iter().map(|c| completion_insight(c, now)));
        insights.extend(durations.iter().map(|d| duration_insight(d, now)));
        insights.extend(self.schedule_insights(tasks, sessions, now));
        if let Some(insight) = velocity_insight(&velocity, now) {
            insights.push(insight);
        }

        insights.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| b.confidence.partial_cmp(&a.confidence).unwrap_or(Ordering::Equal))
        });
        insights.truncate(MAX_PREDICTIVE_INSIGHTS);

        log::info!(
            "[PredictiveAnalyzer] {} completions, {} durations, velocity {:?}, {} insights",
            completions.len(),
            durations.len(),
            velocity.trend,
            insights.len()
        );

        PredictiveAnalysisResult {
            insights,
            completions,
            durations,
            velocity,
            generated_at: now,
        }
    }

    /// Free-slot, peak-timing and workload checks. Each fires independently.
    pub fn schedule_insights(
        &self,
        tasks: &[Task],
        sessions: &[TaskSession],
        now: DateTime<Utc>,
    ) -> Vec<PredictiveInsight> {
        let pending: Vec<&Task> = tasks.iter().filter(|t| t.is_open()).collect();
        let mut out = Vec::new();

        let short: Vec<&Task> = pending
            .iter()
            .copied()
            .filter(|t| t.estimated_duration.is_some_and(|d| d <= SHORT_TASK_MINUTES))
            .collect();
        if short.len() >= MIN_SHORT_TASKS {
            if let Some(hour) = self.least_loaded_work_hour(sessions) {
                out.push(PredictiveInsight {
                    id: prediction_id("free_slot", now),
                    insight_type: PredictiveInsightType::ScheduleOptimization,
                    title: format!("Batch quick tasks at {:02}:00", hour),
                    description: format!(
                        "{} short tasks could fit into {:02}:00, your quietest working hour.",
                        short.len(),
                        hour
                    ),
                    confidence: 0.7,
                    priority: PredictionPriority::Medium,
                    actionable: true,
                    data: PredictionData::FreeSlot {
                        hour,
                        task_ids: short.iter().map(|t| t.id.clone()).collect(),
                    },
                    created_at: now,
                });
            }
        }

        let (morning, afternoon): (Vec<f64>, Vec<f64>) = {
            let mut morning = Vec::new();
            let mut afternoon = Vec::new();
            for session in sessions {
                let Some(score) = session.productivity_score else { continue };
                if local_hour(session.started_at, self.tz) < 12 {
                    morning.push(score);
                } else {
                    afternoon.push(score);
                }
            }
            (morning, afternoon)
        };
        let urgent: Vec<&Task> = pending.iter().copied().filter(|t| t.priority.is_high()).collect();
        if let (Some(morning_avg), Some(afternoon_avg)) = (mean(&morning), mean(&afternoon)) {
            if morning_avg - afternoon_avg > PEAK_MARGIN && !urgent.is_empty() {
                out.push(PredictiveInsight {
                    id: prediction_id("peak_timing", now),
                    insight_type: PredictiveInsightType::ScheduleOptimization,
                    title: "Move important work to the morning".to_string(),
                    description: format!(
                        "Mornings average {:.1} against {:.1} in the afternoon. {} high-priority tasks are waiting.",
                        morning_avg,
                        afternoon_avg,
                        urgent.len()
                    ),
                    confidence: 0.75,
                    priority: PredictionPriority::Medium,
                    actionable: true,
                    data: PredictionData::PeakTiming {
                        morning_avg,
                        afternoon_avg,
                        task_ids: urgent.iter().map(|t| t.id.clone()).collect(),
                    },
                    created_at: now,
                });
            }
        }

        if !pending.is_empty() {
            let ratio = urgent.len() as f64 / pending.len() as f64;
            if ratio > OVERLOAD_RATIO {
                out.push(PredictiveInsight {
                    id: prediction_id("workload", now),
                    insight_type: PredictiveInsightType::WorkloadWarning,
                    title: "Workload is top-heavy".to_string(),
                    description: format!(
                        "{:.0}% of your {} pending tasks are high priority. Consider renegotiating some.",
                        ratio * 100.0,
                        pending.len()
                    ),
                    confidence: 0.8,
                    priority: PredictionPriority::High,
                    actionable: true,
                    data: PredictionData::Workload {
                        high_priority_ratio: ratio,
                        pending_count: pending.len(),
                    },
                    created_at: now,
                });
            }
        }

        out
    }

    /// Working hour (09..17 local) with the fewest recorded sessions. Needs session history.
    fn least_loaded_work_hour(&self, sessions: &[TaskSession]) -> Option<u32> {
        if sessions.is_empty() {
            return None;
        }
        let mut load = [0usize; 24];
        for session in sessions {
            load[local_hour(session.started_at, self.tz) as usize] += 1;
        }
        (9u32..17).min_by_key(|h| (load[*h as usize], *h))
    }
}

fn prediction_id(key: &str, now: DateTime<Utc>) -> String {
    format!("prediction_{}_{}", key, now.timestamp_millis())
}

pub fn predict_completions(
    tasks: &[Task],
    projects: &[Project],
    now: DateTime<Utc>,
) -> Vec<CompletionPrediction> {
    projects
        .iter()
        .filter(|p| p.status == ProjectStatus::Active)
        .filter_map(|project| {
            let owned: Vec<&Task> = tasks
                .iter()
                .filter(|t| t.project_id.as_deref() == Some(project.id.as_str()))
                .collect();
            let done: Vec<DateTime<Utc>> = owned
                .iter()
                .filter(|t| t.is_completed())
                .filter_map(|t| t.completed_at)
                .collect();
            let remaining = owned.iter().filter(|t| t.is_open()).count();
            let (first, last) = (done.iter().min()?, done.iter().max()?);

            let span_days = ((*last - *first).num_seconds() as f64 / 86_400.0).max(1.0);
            let velocity = done.len() as f64 / span_days;
            if velocity <= 0.0 || remaining == 0 {
                return None;
            }

            let days = (remaining as f64 / velocity).ceil() as i64;
            let predicted_date = now + Duration::days(days);
            let score = 80.0 - 2.0 * (days - 7).abs() as f64 + 2.0 * done.len() as f64;
            Some(CompletionPrediction {
                project_id: project.id.clone(),
                project_name: project.name.clone(),
                completed_tasks: done.len(),
                remaining_tasks: remaining,
                velocity_per_day: velocity,
                days_to_complete: days,
                predicted_date,
                confidence: score.clamp(50.0, 95.0) / 100.0,
                deadline: project.deadline,
                on_track: project.deadline.map(|d| predicted_date <= d),
            })
        })
        .collect()
}

fn completion_insight(prediction: &CompletionPrediction, now: DateTime<Utc>) -> PredictiveInsight {
    let (priority, description) = match (prediction.on_track, prediction.deadline) {
        (Some(false), Some(deadline)) => (
            PredictionPriority::High,
            format!(
                "At {:.1} tasks/day, {} finishes around {}, after its {} deadline.",
                prediction.velocity_per_day,
                prediction.project_name,
                prediction.predicted_date.format("%Y-%m-%d"),
                deadline.format("%Y-%m-%d")
            ),
        ),
        _ => (
            PredictionPriority::Medium,
            format!(
                "At {:.1} tasks/day, {} should finish in about {} days ({}).",
                prediction.velocity_per_day,
                prediction.project_name,
                prediction.days_to_complete,
                prediction.predicted_date.format("%Y-%m-%d")
            ),
        ),
    };
    PredictiveInsight {
        id: prediction_id(&format!("completion_{}", prediction.project_id), now),
        insight_type: PredictiveInsightType::CompletionPrediction,
        title: format!("{}: {} tasks left", prediction.project_name, prediction.remaining_tasks),
        description,
        confidence: prediction.confidence,
        priority,
        actionable: prediction.on_track == Some(false),
        data: PredictionData::Completion(prediction.clone()),
        created_at: now,
    }
}

fn word_pattern() -> Option<&'static Regex> {
    static WORDS: OnceLock<Option<Regex>> = OnceLock::new();
    WORDS.get_or_init(|| Regex::new(r"[\p{L}\p{N}]+").ok()).as_ref()
}

/// Lowercased title words longer than three characters.
fn significant_words(title: &str) -> HashSet<String> {
    let lower = title.to_lowercase();
    let words: Vec<&str> = match word_pattern() {
        Some(re) => re.find_iter(&lower).map(|m| m.as_str()).collect(),
        None => lower.split_whitespace().collect(),
    };
    words
        .into_iter()
        .filter(|w| w.chars().count() > 3)
        .map(str::to_string)
        .collect()
}

/// Additive similarity between a pending task and a finished one.
pub fn similarity(a: &Task, b: &Task) -> u32 {
    let mut score = 0;
    if a.project_id.is_some() && a.project_id == b.project_id {
        score += 30;
    }
    score += 20 * a.tags.iter().filter(|tag| b.tags.contains(tag)).count() as u32;
    if a.priority == b.priority {
        score += 15;
    }
    let words = significant_words(&b.title);
    score += 10 * significant_words(&a.title).intersection(&words).count() as u32;
    score
}

/// Estimates for pending tasks without one. Only confident estimates are returned.
pub fn predict_durations(tasks: &[Task]) -> Vec<DurationPrediction> {
    let finished: Vec<(&Task, f64)> = tasks
        .iter()
        .filter(|t| t.is_completed())
        .filter_map(|t| t.actual_duration.map(|d| (t, d)))
        .collect();

    tasks
        .iter()
        .filter(|t| t.is_open() && t.estimated_duration.is_none())
        .filter_map(|pending| {
            let actuals: Vec<f64> = finished
                .iter()
                .filter(|(done, _)| similarity(pending, done) >= SIMILARITY_THRESHOLD)
                .map(|(_, actual)| *actual)
                .collect();
            if actuals.len() < MIN_SIMILAR_TASKS {
                return None;
            }
            let predicted = mean(&actuals)?;
            let cv = coefficient_of_variation(&actuals).unwrap_or(1.0);
            let confidence = (90.0 - 100.0 * cv).clamp(40.0, 95.0) / 100.0;
            if confidence <= MIN_SURFACED_DURATION_CONFIDENCE {
                log::debug!(
                    "[PredictiveAnalyzer] Skipping estimate for {} (confidence {:.2})",
                    pending.id,
                    confidence
                );
                return None;
            }
            Some(DurationPrediction {
                task_id: pending.id.clone(),
                task_title: pending.title.clone(),
                predicted_minutes: predicted,
                similar_task_count: actuals.len(),
                confidence,
            })
        })
        .collect()
}

fn duration_insight(prediction: &DurationPrediction, now: DateTime<Utc>) -> PredictiveInsight {
    PredictiveInsight {
        id: prediction_id(&format!("duration_{}", prediction.task_id), now),
        insight_type: PredictiveInsightType::DurationEstimate,
        title: format!("\"{}\" will take about {:.0} min", prediction.task_title, prediction.predicted_minutes),
        description: format!(
            "Based on {} similar finished tasks.",
            prediction.similar_task_count
        ),
        confidence: prediction.confidence,
        priority: PredictionPriority::Low,
        actionable: true,
        data: PredictionData::Duration(prediction.clone()),
        created_at: now,
    }
}

/// Completions in the trailing week against the week before it.
pub fn velocity_trend(tasks: &[Task], now: DateTime<Utc>) -> VelocityTrend {
    let window = Duration::days(VELOCITY_WINDOW_DAYS);
    let current_start = now - window;
    let previous_start = current_start - window;

    let mut current = 0usize;
    let mut previous = 0usize;
    for completed in tasks.iter().filter(|t| t.is_completed()).filter_map(|t| t.completed_at) {
        if completed > current_start && completed <= now {
            current += 1;
        } else if completed > previous_start && completed <= current_start {
            previous += 1;
        }
    }

    let days = VELOCITY_WINDOW_DAYS as f64;
    let change_percent = if previous == 0 {
        if current == 0 {
            0.0
        } else {
            100.0
        }
    } else {
        (current as f64 - previous as f64) / previous as f64 * 100.0
    };
    let trend = if change_percent.abs() < STABLE_VELOCITY_PERCENT {
        TrendDirection::Stable
    } else if change_percent > 0.0 {
        TrendDirection::Increasing
    } else {
        TrendDirection::Decreasing
    };

    VelocityTrend {
        current_velocity: current as f64 / days,
        previous_velocity: previous as f64 / days,
        change_percent,
        trend,
    }
}

fn velocity_insight(velocity: &VelocityTrend, now: DateTime<Utc>) -> Option<PredictiveInsight> {
    if velocity.current_velocity == 0.0 && velocity.previous_velocity == 0.0 {
        return None;
    }
    let samples = (velocity.current_velocity + velocity.previous_velocity) * VELOCITY_WINDOW_DAYS as f64;
    let (title, priority) = match velocity.trend {
        TrendDirection::Increasing => ("Your pace is picking up", PredictionPriority::Low),
        TrendDirection::Decreasing => ("Your pace is slowing", PredictionPriority::Medium),
        TrendDirection::Stable => ("Your pace is steady", PredictionPriority::Low),
    };
    Some(PredictiveInsight {
        id: prediction_id("velocity", now),
        insight_type: PredictiveInsightType::VelocityTrend,
        title: title.to_string(),
        description: format!(
            "{:.1} tasks/day this week against {:.1} the week before ({:+.0}%).",
            velocity.current_velocity, velocity.previous_velocity, velocity.change_percent
        ),
        confidence: (0.5 + samples / 40.0).min(0.9),
        priority,
        actionable: velocity.trend == TrendDirection::Decreasing,
        data: PredictionData::Velocity(velocity.clone()),
        created_at: now,
    })
}

use chrono::{DateTime, Duration, Utc};

use crate::error::Result;
use crate::models::{
    Insight, InsightAction, InsightActionType, InsightCategory, InsightType, PatternAnalysisResult,
    PatternData, PatternFamily, WorkPattern,
};
use crate::utils::stats::mean;

const TIMING_OVERRUN_RATIO: f64 = 1.3;
const CURRENT_HOUR_MARGIN: f64 = 0.5;
const MIN_BLOCKAGE_FREQUENCY: usize = 3;
const CRITICAL_BLOCKAGE_FREQUENCY: usize = 5;

/// Inputs shared by every generator in one synthesis run.
pub struct GenerationContext<'a> {
    pub analysis: &'a PatternAnalysisResult,
    /// Only insights that are neither dismissed nor expired.
    pub existing: &'a [Insight],
    pub now: DateTime<Utc>,
    pub current_hour: u32,
    pub ttl: Duration,
}

impl<'a> GenerationContext<'a> {
    /// An active insight already covers this key.
    pub fn already_reported(&self, key: &str) -> bool {
        self.existing.iter().any(|i| i.id.contains(key))
    }

    /// Patterns of `family` not yet represented by an active insight.
    pub fn fresh_patterns(&self, family: PatternFamily) -> Vec<&'a WorkPattern> {
        if self.already_reported(family.key()) {
            return Vec::new();
        }
        self.analysis.patterns.iter().filter(|p| p.family == family).collect()
    }
}

#[derive(Debug, Default)]
pub struct GeneratorOutput {
    pub insights: Vec<Insight>,
    pub pattern_ids: Vec<String>,
}

pub trait InsightGenerator: Send + Sync {
    fn name(&self) -> &'static str;

    fn generate(&self, ctx: &GenerationContext<'_>) -> Result<GeneratorOutput>;
}

/// Hours apart on a 24h clock.
fn hour_distance(a: u32, b: u32) -> u32 {
    let diff = a.abs_diff(b) % 24;
    diff.min(24 - diff)
}

#[derive(Debug, Default)]
pub struct ProductivityInsightGenerator;

impl InsightGenerator for ProductivityInsightGenerator {
    fn name(&self) -> &'static str {
        "productivity"
    }

    fn generate(&self, ctx: &GenerationContext<'_>) -> Result<GeneratorOutput> {
        let mut out = GeneratorOutput::default();
        let scored: Vec<(&WorkPattern, u32, f64)> = ctx
            .fresh_patterns(PatternFamily::Temporal)
            .into_iter()
            .filter_map(|p| match &p.data {
                PatternData::Temporal(data) => data.productivity_score.map(|s| (p, data.hour, s)),
                _ => None,
            })
            .collect();

        let Some(&(best, best_hour, best_score)) = scored.iter().max_by(|a, b| a.2.total_cmp(&b.2)) else {
            return Ok(out);
        };

        let insight = if hour_distance(best_hour, ctx.current_hour) <= 1 {
            Insight::new(
                "temporal_optimal_now",
                InsightType::Productivity,
                InsightCategory::Opportunity,
                "You're in your most productive window",
                format!(
                    "Your focus peaks around {:02}:00 (score {:.1}). Tackle your hardest task now.",
                    best_hour, best_score
                ),
                1,
                best.confidence,
                ctx.now,
                ctx.ttl,
            )
            .with_actions(vec![InsightAction::new(
                "Start focus session",
                InsightActionType::Schedule,
                Some("focus"),
            )])
        } else {
            Insight::new(
                "temporal_schedule",
                InsightType::Productivity,
                InsightCategory::Suggestion,
                format!("Plan deep work for {:02}:00", best_hour),
                format!(
                    "Your focus score averages {:.1} around {:02}:00, your strongest hour.",
                    best_score, best_hour
                ),
                2,
                best.confidence,
                ctx.now,
                ctx.ttl,
            )
            .with_actions(vec![InsightAction::new(
                "Block time",
                InsightActionType::Schedule,
                Some("calendar"),
            )])
        };
        out.insights.push(insight.with_data(serde_json::json!({
            "hour": best_hour,
            "productivity_score": best_score,
        })));
        out.pattern_ids.push(best.id.clone());

        let scores: Vec<f64> = scored.iter().map(|(_, _, s)| *s).collect();
        let average = mean(&scores).unwrap_or(0.0);
        if let Some(&(current, hour, score)) = scored.iter().find(|(_, h, _)| *h == ctx.current_hour) {
            if score > average + CURRENT_HOUR_MARGIN {
                out.insights.push(
                    Insight::new(
                        "temporal_current_hour",
                        InsightType::Productivity,
                        InsightCategory::Positive,
                        "This is one of your strong hours",
                        format!(
                            "You usually score {:.1} at {:02}:00, above your {:.1} average.",
                            score, hour, average
                        ),
                        2,
                        current.confidence,
                        ctx.now,
                        ctx.ttl,
                    )
                    .with_data(serde_json::json!({ "hour": hour, "productivity_score": score, "average": average })),
                );
                if !out.pattern_ids.contains(&current.id) {
                    out.pattern_ids.push(current.id.clone());
                }
            }
        }

        Ok(out)
    }
}

#[derive(Debug, Default)]
pub struct TaskHealthInsightGenerator;

impl InsightGenerator for TaskHealthInsightGenerator {
    fn name(&self) -> &'static str {
        "task_health"
    }

    fn generate(&self, ctx: &GenerationContext<'_>) -> Result<GeneratorOutput> {
        let mut out = GeneratorOutput::default();
        for pattern in ctx.fresh_patterns(PatternFamily::Blockage) {
            let PatternData::Blockage(data) = &pattern.data else { continue };
            if pattern.frequency < MIN_BLOCKAGE_FREQUENCY {
                continue;
            }
            let critical = pattern.frequency > CRITICAL_BLOCKAGE_FREQUENCY;
            let (category, priority) = if critical {
                (InsightCategory::Critical, 1)
            } else {
                (InsightCategory::Warning, 2)
            };
            let mut actions = vec![InsightAction::new(
                "View stuck tasks",
                InsightActionType::Navigate,
                Some("tasks?filter=stale"),
            )];
            if let Some(first) = data.task_ids.first() {
                let target = format!("tasks/{}", first);
                actions.push(InsightAction::new(
                    "Open a stuck task",
                    InsightActionType::Navigate,
                    Some(target.as_str()),
                ));
            }
            out.insights.push(
                Insight::new(
                    "blockage_health",
                    InsightType::TaskHealth,
                    category,
                    format!("{} tasks have stalled", pattern.frequency),
                    format!(
                        "{} open tasks have had no update for {:.0} days on average.",
                        pattern.frequency, data.avg_days_stale
                    ),
                    priority,
                    pattern.confidence,
                    ctx.now,
                    ctx.ttl,
                )
                .with_data(serde_json::json!({
                    "task_ids": data.task_ids,
                    "priority_distribution": data.priority_distribution,
                }))
                .with_actions(actions),
            );
            out.pattern_ids.push(pattern.id.clone());
        }
        Ok(out)
    }
}

#[derive(Debug, Default)]
pub struct TimingInsightGenerator;

impl InsightGenerator for TimingInsightGenerator {
    fn name(&self) -> &'static str {
        "timing"
    }

    fn generate(&self, ctx: &GenerationContext<'_>) -> Result<GeneratorOutput> {
        let mut out = GeneratorOutput::default();
        let worst = ctx
            .fresh_patterns(PatternFamily::Duration)
            .into_iter()
            .filter_map(|p| match &p.data {
                PatternData::Duration(data) if data.estimated_vs_actual > TIMING_OVERRUN_RATIO => Some((p, data)),
                _ => None,
            })
            .max_by(|a, b| a.1.estimated_vs_actual.total_cmp(&b.1.estimated_vs_actual));

        if let Some((pattern, data)) = worst {
            let overrun = (data.estimated_vs_actual - 1.0) * 100.0;
            out.insights.push(
                Insight::new(
                    "duration_estimation",
                    InsightType::Timing,
                    InsightCategory::Suggestion,
                    "Improve estimation accuracy",
                    format!(
                        "{} priority tasks overrun their estimates by {:.0}% on average.",
                        data.priority, overrun
                    ),
                    2,
                    pattern.confidence,
                    ctx.now,
                    ctx.ttl,
                )
                .with_data(serde_json::json!({
                    "task_type": data.priority,
                    "overrun_percent": overrun,
                    "estimated_vs_actual": data.estimated_vs_actual,
                }))
                .with_actions(vec![InsightAction::new(
                    "Review estimates",
                    InsightActionType::Review,
                    Some("tasks?filter=estimated"),
                )]),
            );
            out.pattern_ids.push(pattern.id.clone());
        }
        Ok(out)
    }
}

#[derive(Debug, Default)]
pub struct RecommendationInsightGenerator;

impl InsightGenerator for RecommendationInsightGenerator {
    fn name(&self) -> &'static str {
        "recommendation"
    }

    fn generate(&self, ctx: &GenerationContext<'_>) -> Result<GeneratorOutput> {
        let mut out = GeneratorOutput::default();
        for rec in &ctx.analysis.recommendations {
            let key = format!("recommendation_{}", rec.rec_type.key());
            if ctx.already_reported(&key) {
                continue;
            }
            let actions = rec
                .action_steps
                .iter()
                .map(|step| InsightAction::new(step, InsightActionType::Review, None))
                .collect();
            out.insights.push(
                Insight::new(
                    &key,
                    InsightType::Recommendation,
                    InsightCategory::Suggestion,
                    rec.title.clone(),
                    rec.description.clone(),
                    rec.expected_impact.priority(),
                    rec.confidence,
                    ctx.now,
                    ctx.ttl,
                )
                .with_data(serde_json::json!({ "recommendation_id": rec.id }))
                .with_actions(actions),
            );
            out.pattern_ids.extend(rec.pattern_ids.iter().cloned());
        }
        Ok(out)
    }
}

pub fn default_generators() -> Vec<Box<dyn InsightGenerator>> {
    vec![
        Box::new(ProductivityInsightGenerator),
        Box::new(TaskHealthInsightGenerator),
        Box::new(TimingInsightGenerator),
        Box::new(RecommendationInsightGenerator),
    ]
}

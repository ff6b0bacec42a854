use std::cmp::Ordering;
use std::time::Instant;

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;

use super::insight_generators::{default_generators, GenerationContext, InsightGenerator};
use super::pattern_analyzer::PatternAnalyzer;
use crate::error::{AnalyticsError, Result};
use crate::models::{
    Insight, InsightGenerationResult, InsightSettings, PatternAnalysisResult, Task, TaskSession,
};
use crate::utils::stats::mean;
use crate::utils::time::local_hour;

/// Turns pattern analysis into a short, ranked list of insights.
pub struct InsightSynthesizer {
    analyzer: PatternAnalyzer,
    settings: InsightSettings,
    tz: Tz,
    generators: Vec<Box<dyn InsightGenerator>>,
}

impl InsightSynthesizer {
    pub fn new(analyzer: PatternAnalyzer, settings: InsightSettings, tz: Tz) -> Self {
        Self::with_generators(analyzer, settings, tz, default_generators())
    }

    pub fn with_generators(
        analyzer: PatternAnalyzer,
        settings: InsightSettings,
        tz: Tz,
        generators: Vec<Box<dyn InsightGenerator>>,
    ) -> Self {
        Self {
            analyzer,
            settings,
            tz,
            generators,
        }
    }

    pub fn analyzer(&self) -> &PatternAnalyzer {
        &self.analyzer
    }

    /// Analyzes the snapshot, then synthesizes insights from the result.
    pub fn generate(
        &self,
        tasks: &[Task],
        sessions: &[TaskSession],
        existing: &[Insight],
        now: DateTime<Utc>,
    ) -> InsightGenerationResult {
        let analysis = self.analyzer.analyze(tasks, sessions, now);
        self.synthesize(&analysis, existing, now)
    }

    /// Never fails. Any generator error empties the result.
    pub fn synthesize(
        &self,
        analysis: &PatternAnalysisResult,
        existing: &[Insight],
        now: DateTime<Utc>,
    ) -> InsightGenerationResult {
        let started = Instant::now();
        match self.try_synthesize(analysis, existing, now) {
            Ok((insights, patterns_used)) => {
                let confidences: Vec<f64> = insights.iter().map(|i| i.confidence).collect();
                let confidence =
                    0.6 * mean(&confidences).unwrap_or(0.0) + 0.4 * analysis.confidence;
                log::info!(
                    "[InsightSynthesizer] {} insights from {} patterns",
                    insights.len(),
                    patterns_used.len()
                );
                InsightGenerationResult {
                    insights,
                    confidence,
                    patterns_used,
                    processing_time_ms: started.elapsed().as_millis() as u64,
                }
            }
            Err(e) => {
                log::error!("[InsightSynthesizer] Insight generation failed: {}", e);
                InsightGenerationResult {
                    insights: Vec::new(),
                    confidence: 0.0,
                    patterns_used: Vec::new(),
                    processing_time_ms: started.elapsed().as_millis() as u64,
                }
            }
        }
    }

    fn try_synthesize(
        &self,
        analysis: &PatternAnalysisResult,
        existing: &[Insight],
        now: DateTime<Utc>,
    ) -> Result<(Vec<Insight>, Vec<String>)> {
        validate_patterns(analysis)?;

        let active: Vec<Insight> = existing.iter().filter(|i| i.is_active(now)).cloned().collect();
        let ctx = GenerationContext {
            analysis,
            existing: &active,
            now,
            current_hour: local_hour(now, self.tz),
            ttl: Duration::hours(self.settings.insight_ttl_hours),
        };

        let mut insights = Vec::new();
        let mut patterns_used: Vec<String> = Vec::new();
        for generator in &self.generators {
            let output = generator.generate(&ctx)?;
            log::debug!(
                "[InsightSynthesizer] {} generator produced {} insights",
                generator.name(),
                output.insights.len()
            );
            insights.extend(output.insights);
            for id in output.pattern_ids {
                if !patterns_used.contains(&id) {
                    patterns_used.push(id);
                }
            }
        }

        Ok((self.prioritize(insights), patterns_used))
    }

    /// Confidence floor, then `(priority asc, confidence desc)`, then the session cap.
    fn prioritize(&self, mut insights: Vec<Insight>) -> Vec<Insight> {
        insights.retain(|i| i.confidence >= self.settings.min_confidence_threshold);
        insights.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then_with(|| b.confidence.partial_cmp(&a.confidence).unwrap_or(Ordering::Equal))
        });
        insights.truncate(self.settings.max_insights_per_session);
        insights
    }
}

fn validate_patterns(analysis: &PatternAnalysisResult) -> Result<()> {
    for pattern in &analysis.patterns {
        if !pattern.confidence.is_finite() || !(0.0..=1.0).contains(&pattern.confidence) {
            return Err(AnalyticsError::InvalidPattern {
                id: pattern.id.clone(),
                reason: format!("confidence {} outside [0, 1]", pattern.confidence),
            });
        }
    }
    Ok(())
}

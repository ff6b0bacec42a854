pub mod aggregator;
pub mod alert_scheduler;
pub mod collaborators;
pub mod collection_scheduler;
pub mod collectors;
pub mod insight_generators;
pub mod insight_synthesizer;
pub mod pattern_analyzer;
pub mod predictive_analyzer;
pub mod retention_store;

#[cfg(test)]
pub mod fixtures;

pub use alert_scheduler::{AlertSource, ProactiveAlertScheduler};
pub use collaborators::{ActivitySource, EffectivenessSink, PreferenceStore};
pub use collection_scheduler::{CollectionRule, CollectionScheduler, TelemetryHub};
pub use collectors::TelemetryCollector;
pub use insight_synthesizer::InsightSynthesizer;
pub use pattern_analyzer::PatternAnalyzer;
pub use predictive_analyzer::PredictiveAnalyzer;
pub use retention_store::RetentionStore;

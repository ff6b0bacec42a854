//! Analytics core of a personal productivity assistant.
//!
//! Telemetry flows from the collectors into a bounded [`services::RetentionStore`]. Tasks and
//! focus sessions feed the [`services::PatternAnalyzer`], whose patterns the
//! [`services::InsightSynthesizer`] turns into ranked insights. The
//! [`services::PredictiveAnalyzer`] and [`services::ProactiveAlertScheduler`] read tasks directly.

pub mod database;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use error::{AnalyticsError, Result};

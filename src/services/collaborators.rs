//! Seams to the systems around the analytics core: the task store, the preference store
//! and the alert effectiveness log.

use anyhow::Result;

use crate::models::{ActivitySnapshot, EffectivenessRecord, UserProductivityPreferences};

/// Read access to tasks, projects and focus sessions.
pub trait ActivitySource: Send + Sync {
    fn snapshot(&self) -> Result<ActivitySnapshot>;
}

pub trait PreferenceStore: Send + Sync {
    /// `Ok(None)` when the user has no stored preferences.
    fn load(&self, user_id: &str) -> Result<Option<UserProductivityPreferences>>;

    /// Writes defaults for the user if none exist yet.
    fn ensure_defaults(&self, user_id: &str) -> Result<UserProductivityPreferences>;
}

/// Append-only log of how users reacted to alerts.
pub trait EffectivenessSink: Send + Sync {
    fn record(&self, entry: &EffectivenessRecord) -> Result<()>;
}

/// Sink that discards everything, for callers without an effectiveness log.
#[derive(Debug, Default)]
pub struct NullEffectivenessSink;

impl EffectivenessSink for NullEffectivenessSink {
    fn record(&self, _entry: &EffectivenessRecord) -> Result<()> {
        Ok(())
    }
}

/// A fixed in-memory snapshot, handy for one-shot analysis and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticActivitySource {
    snapshot: ActivitySnapshot,
}

impl StaticActivitySource {
    pub fn new(snapshot: ActivitySnapshot) -> Self {
        Self { snapshot }
    }
}

impl ActivitySource for StaticActivitySource {
    fn snapshot(&self) -> Result<ActivitySnapshot> {
        Ok(self.snapshot.clone())
    }
}

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::aggregator;
use super::collaborators::ActivitySource;
use super::collectors::TelemetryCollector;
use super::retention_store::RetentionStore;
use crate::error::{AnalyticsError, Result};
use crate::models::{
    EnvironmentalContext, FieldStats, RetentionStats, Settings, TelemetryKind, TelemetryQuery,
    TelemetryRecord, TelemetrySummary, Trend,
};

/// Which collectors run together, and how often.
#[derive(Debug, Clone)]
pub struct CollectionRule {
    pub name: String,
    pub kinds: Vec<TelemetryKind>,
    pub interval: Duration,
}

impl CollectionRule {
    pub fn new(name: &str, kinds: &[TelemetryKind], interval: Duration) -> Self {
        Self {
            name: name.to_string(),
            kinds: kinds.to_vec(),
            interval,
        }
    }

    /// Real-time signals every interval, historical task patterns four times less often.
    pub fn defaults(interval_secs: u64) -> Vec<Self> {
        let interval = Duration::from_secs(interval_secs.max(1));
        vec![
            Self::new(
                "realtime",
                &[
                    TelemetryKind::UserBehavior,
                    TelemetryKind::ProductivityMetrics,
                    TelemetryKind::Environmental,
                    TelemetryKind::Temporal,
                ],
                interval,
            ),
            Self::new("historical", &[TelemetryKind::TaskPatterns], interval.saturating_mul(4)),
        ]
    }
}

/// Shared handle over the retention store and the collectors that feed it.
#[derive(Clone)]
pub struct TelemetryHub {
    store: Arc<Mutex<RetentionStore>>,
    collector: TelemetryCollector,
    environment: Arc<RwLock<Option<EnvironmentalContext>>>,
}

impl TelemetryHub {
    pub fn new(settings: &Settings, tz: Tz) -> Self {
        Self {
            store: Arc::new(Mutex::new(RetentionStore::new(&settings.retention))),
            collector: TelemetryCollector::new(settings.collection.clone(), tz),
            environment: Arc::new(RwLock::new(None)),
        }
    }

    fn store(&self) -> MutexGuard<'_, RetentionStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Ambient context handed to the environmental collector on every cycle.
    pub fn set_environment(&self, context: Option<EnvironmentalContext>) {
        let mut guard = self.environment.write().unwrap_or_else(PoisonError::into_inner);
        *guard = context;
    }

    pub fn ingest(&self, records: Vec<TelemetryRecord>) -> usize {
        let count = records.len();
        self.store().put(records);
        count
    }

    /// Runs one collection cycle and stores whatever it produced.
    pub fn collect_from(
        &self,
        source: &dyn ActivitySource,
        kinds: &[TelemetryKind],
        now: DateTime<Utc>,
    ) -> usize {
        let environment = self
            .environment
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let records = self.collector.collect_cycle(source, kinds, environment.as_ref(), now);
        self.ingest(records)
    }

    pub fn query(&self, filter: &TelemetryQuery, now: DateTime<Utc>) -> Vec<TelemetryRecord> {
        self.store().query(filter, now)
    }

    pub fn aggregate(&self, filter: &TelemetryQuery, now: DateTime<Utc>) -> BTreeMap<String, FieldStats> {
        aggregator::aggregate(&self.query(filter, now))
    }

    pub fn trends(
        &self,
        filter: &TelemetryQuery,
        window: chrono::Duration,
        now: DateTime<Utc>,
    ) -> Vec<Trend> {
        let filter = filter.clone().between(now - window, now);
        aggregator::trends(&self.query(&filter, now), window)
    }

    /// Aggregate and trends over the same `window`-bounded record set.
    pub fn summarize(
        &self,
        filter: &TelemetryQuery,
        window: chrono::Duration,
        now: DateTime<Utc>,
    ) -> TelemetrySummary {
        let filter = filter.clone().between(now - window, now);
        let records = self.query(&filter, now);
        TelemetrySummary {
            record_count: records.len(),
            fields: aggregator::aggregate(&records),
            trends: aggregator::trends(&records, window),
        }
    }

    pub fn evict_expired(&self, now: DateTime<Utc>) -> usize {
        self.store().evict_expired(now)
    }

    pub fn stats(&self) -> RetentionStats {
        self.store().stats()
    }

    pub fn clear(&self) {
        self.store().clear();
    }
}

/// Owns the periodic collection and eviction tasks for one [`TelemetryHub`].
///
/// Nothing runs until [`start`](Self::start). [`shutdown`](Self::shutdown) cancels every
/// ticker and waits for the tasks to finish. Dropping the scheduler cancels them too.
pub struct CollectionScheduler {
    hub: TelemetryHub,
    source: Arc<dyn ActivitySource>,
    rules: Vec<CollectionRule>,
    eviction_interval: Duration,
    token: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl CollectionScheduler {
    pub fn new(
        hub: TelemetryHub,
        source: Arc<dyn ActivitySource>,
        rules: Vec<CollectionRule>,
        eviction_interval: Duration,
    ) -> Self {
        Self {
            hub,
            source,
            rules,
            eviction_interval,
            token: CancellationToken::new(),
            handles: Vec::new(),
        }
    }

    pub fn from_settings(hub: TelemetryHub, source: Arc<dyn ActivitySource>, settings: &Settings) -> Self {
        Self::new(
            hub,
            source,
            CollectionRule::defaults(settings.collection.collection_interval_secs),
            Duration::from_secs(settings.retention.eviction_interval_secs.max(1)),
        )
    }

    pub fn hub(&self) -> &TelemetryHub {
        &self.hub
    }

    pub fn is_running(&self) -> bool {
        !self.handles.is_empty()
    }

    /// Spawns one ticker per rule plus the eviction ticker. Must be called inside a tokio runtime.
    pub fn start(&mut self) -> Result<()> {
        if self.is_running() {
            return Err(AnalyticsError::Scheduler("collection already running".to_string()));
        }
        if self.token.is_cancelled() {
            return Err(AnalyticsError::Scheduler("scheduler was shut down".to_string()));
        }

        for rule in self.rules.clone() {
            let handle = self.spawn_rule(rule);
            self.handles.push(handle);
        }
        let eviction = self.spawn_eviction();
        self.handles.push(eviction);
        log::info!(
            "[Scheduler] Started {} collection rules, eviction every {:?}",
            self.rules.len(),
            self.eviction_interval
        );
        Ok(())
    }

    fn spawn_rule(&self, rule: CollectionRule) -> JoinHandle<()> {
        let hub = self.hub.clone();
        let source = Arc::clone(&self.source);
        let token = self.token.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(rule.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let stored = hub.collect_from(source.as_ref(), &rule.kinds, Utc::now());
                        log::debug!("[Scheduler] Rule '{}' stored {} records", rule.name, stored);
                    }
                }
            }
            log::debug!("[Scheduler] Rule '{}' stopped", rule.name);
        })
    }

    fn spawn_eviction(&self) -> JoinHandle<()> {
        let hub = self.hub.clone();
        let token = self.token.clone();
        let period = self.eviction_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let evicted = hub.evict_expired(Utc::now());
                        if evicted > 0 {
                            log::info!("[Scheduler] Evicted {} expired records", evicted);
                        }
                    }
                }
            }
        })
    }

    /// Cancels every ticker and waits for the tasks to exit. Safe to call more than once.
    pub async fn shutdown(&mut self) {
        self.token.cancel();
        for handle in self.handles.drain(..) {
            if let Err(e) = handle.await {
                log::warn!("[Scheduler] Task ended abnormally: {}", e);
            }
        }
        log::info!("[Scheduler] Stopped");
    }
}

impl Drop for CollectionScheduler {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use clap::Parser;
use serde::Serialize;

use flowsense_core::database::SqliteStore;
use flowsense_core::models::{
    DataQuality, DeadlineAlert, Insight, InsightGenerationResult, PredictiveAnalysisResult, RetentionStats,
    TelemetryKind, TelemetryQuery, TelemetrySummary, WorkPattern,
};
use flowsense_core::services::{
    ActivitySource, AlertSource, CollectionScheduler, InsightSynthesizer, PatternAnalyzer,
    PredictiveAnalyzer, ProactiveAlertScheduler, TelemetryHub,
};
use flowsense_core::utils::config;
use flowsense_core::utils::time::parse_timezone;

#[derive(Parser)]
#[command(name = "flowsense")]
#[command(about = "Productivity analytics over a task database", long_about = None)]
#[command(version)]
struct Cli {
    /// SQLite database holding tasks, projects and focus sessions
    db: PathBuf,

    /// User whose alert preferences apply
    #[arg(long, default_value = "local")]
    user: String,

    /// Session id used for alert de-duplication (random when omitted)
    #[arg(long)]
    session: Option<String>,

    /// Settings file (overrides FLOWSENSE_CONFIG and <db dir>/config/settings.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Keep collecting telemetry until Ctrl-C
    #[arg(long)]
    watch: bool,
}

#[derive(Serialize)]
struct Report {
    generated_at: DateTime<Utc>,
    data_quality: DataQuality,
    patterns: Vec<WorkPattern>,
    pattern_insights: Vec<Insight>,
    insights: InsightGenerationResult,
    predictions: PredictiveAnalysisResult,
    alert: Option<DeadlineAlert>,
    telemetry: TelemetrySummary,
    retention: RetentionStats,
}

fn settings_path(cli: &Cli) -> PathBuf {
    if let Some(path) = &cli.config {
        return path.clone();
    }
    if let Some(path) = config::config_path_from_env() {
        return PathBuf::from(path);
    }
    cli.db
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join("config")
        .join("settings.json")
}

#[tokio::main]
async fn main() -> Result<()> {
    config::load_dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let settings = config::load_settings(&settings_path(&cli))?;
    let tz = parse_timezone(&settings.analysis.timezone);

    let store = Arc::new(
        SqliteStore::open(&cli.db)
            .with_context(|| format!("failed to open database {}", cli.db.display()))?,
    );
    let now = Utc::now();
    let snapshot = store.snapshot()?;
    log::info!(
        "[Main] Loaded {} tasks, {} projects, {} sessions",
        snapshot.tasks.len(),
        snapshot.projects.len(),
        snapshot.sessions.len()
    );

    let hub = TelemetryHub::new(&settings, tz);
    hub.collect_from(store.as_ref(), &TelemetryKind::ALL, now);

    let analyzer = PatternAnalyzer::new(settings.analysis.clone(), settings.insights.insight_ttl_hours);
    let synthesizer = InsightSynthesizer::new(analyzer, settings.insights.clone(), tz);
    let analysis = synthesizer.analyzer().analyze(&snapshot.tasks, &snapshot.sessions, now);
    let insights = synthesizer.synthesize(&analysis, &[], now);

    let predictions =
        PredictiveAnalyzer::new(tz).analyze(&snapshot.tasks, &snapshot.projects, &snapshot.sessions, now);

    let mut alerts = ProactiveAlertScheduler::personalized(store.clone(), &cli.user, tz, store.clone());
    let session_id = cli
        .session
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let alert = alerts.check_for_deadline_alerts(&snapshot.tasks, &session_id, now);

    let report = Report {
        generated_at: now,
        data_quality: analysis.data_quality,
        patterns: analysis.patterns,
        pattern_insights: analysis.insights,
        insights,
        predictions,
        alert,
        telemetry: hub.summarize(&TelemetryQuery::new(), Duration::hours(24), now),
        retention: hub.stats(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    if cli.watch {
        let mut scheduler = CollectionScheduler::from_settings(hub.clone(), store.clone(), &settings);
        scheduler.start()?;
        log::info!("[Main] Collecting telemetry, press Ctrl-C to stop");
        tokio::signal::ctrl_c().await?;
        scheduler.shutdown().await;
        let stats = hub.stats();
        log::info!("[Main] Retained {} telemetry records", stats.total_records);
    }

    Ok(())
}

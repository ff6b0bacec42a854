use std::path::Path;

use anyhow::{Context, Result};

use crate::models::Settings;

const ENV_CONFIG_PATH: &str = "FLOWSENSE_CONFIG";
const ENV_MAX_INSIGHTS: &str = "FLOWSENSE_MAX_INSIGHTS";
const ENV_RETENTION_HOURS: &str = "FLOWSENSE_RETENTION_HOURS";
const ENV_MAX_POINTS: &str = "FLOWSENSE_MAX_POINTS_PER_TYPE";
const ENV_TIMEZONE: &str = "FLOWSENSE_TIMEZONE";

pub fn load_dotenv() {
    let _ = dotenvy::dotenv();
}

pub fn config_path_from_env() -> Option<String> {
    env_value(ENV_CONFIG_PATH)
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = env_value(key)?;
    match raw.parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            log::warn!("[Config] Ignoring {}={}: not a valid value", key, raw);
            None
        }
    }
}

/// Reads settings from a JSON file, then env overrides, then validates.
/// A missing file yields defaults; a malformed or out-of-range one is an error.
pub fn load_settings(path: &Path) -> Result<Settings> {
    let mut settings = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read settings from {}", path.display()))?;
        serde_json::from_str::<Settings>(&content)
            .with_context(|| format!("failed to parse settings in {}", path.display()))?
    } else {
        Settings::default()
    };
    apply_env_defaults(&mut settings);
    settings
        .validate()
        .with_context(|| format!("invalid settings from {}", path.display()))?;
    Ok(settings)
}

pub fn apply_env_defaults(settings: &mut Settings) {
    if let Some(max) = env_parsed::<usize>(ENV_MAX_INSIGHTS) {
        settings.insights.max_insights_per_session = max;
    }
    if let Some(hours) = env_parsed::<i64>(ENV_RETENTION_HOURS) {
        settings.retention.default_retention_hours = hours;
    }
    if let Some(points) = env_parsed::<usize>(ENV_MAX_POINTS) {
        settings.retention.max_data_points_per_type = points;
    }
    if let Some(tz) = env_value(ENV_TIMEZONE) {
        settings.analysis.timezone = tz;
    }
}

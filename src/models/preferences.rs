use serde::{Deserialize, Serialize};

use super::alert::AlertSeverity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnergyTier {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkHours {
    pub start_hour: u32,
    /// Exclusive.
    pub end_hour: u32,
}

impl WorkHours {
    pub fn contains(&self, hour: u32) -> bool {
        hour >= self.start_hour && hour < self.end_hour
    }
}

impl Default for WorkHours {
    fn default() -> Self {
        Self {
            start_hour: 9,
            end_hour: 17,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnergySchedule {
    pub high_energy_hours: Vec<u32>,
    pub medium_energy_hours: Vec<u32>,
    pub low_energy_hours: Vec<u32>,
}

impl EnergySchedule {
    /// Hours missing from all three lists count as medium.
    pub fn tier_at(&self, hour: u32) -> EnergyTier {
        if self.high_energy_hours.contains(&hour) {
            EnergyTier::High
        } else if self.low_energy_hours.contains(&hour) {
            EnergyTier::Low
        } else {
            EnergyTier::Medium
        }
    }
}

impl Default for EnergySchedule {
    fn default() -> Self {
        Self {
            high_energy_hours: vec![9, 10, 11],
            medium_energy_hours: vec![13, 14, 15, 16],
            low_energy_hours: vec![12, 17, 18, 19, 20, 21, 22],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllowedHours {
    WorkHours,
    AnyTime,
    /// High or medium energy hours on a preferred work day.
    EnergyBased,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertTiming {
    Immediate,
    /// Softens high severity to medium during low-energy hours.
    EnergyAware,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertPreferences {
    pub enabled: bool,
    pub deadline_days_before: Vec<u32>,
    pub allowed_hours: AllowedHours,
    pub min_severity: AlertSeverity,
    pub max_daily_alerts: usize,
    pub deadline_alerts: bool,
    pub overload_alerts: bool,
    pub timing: AlertTiming,
}

impl Default for AlertPreferences {
    fn default() -> Self {
        Self {
            enabled: true,
            deadline_days_before: vec![0, 1, 2, 3, 7],
            allowed_hours: AllowedHours::WorkHours,
            min_severity: AlertSeverity::Low,
            max_daily_alerts: 3,
            deadline_alerts: true,
            overload_alerts: true,
            timing: AlertTiming::EnergyAware,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProductivityPreferences {
    pub user_id: String,
    #[serde(default)]
    pub work_hours: WorkHours,
    /// 0 = Sunday.
    #[serde(default = "default_work_days")]
    pub preferred_work_days: Vec<u32>,
    #[serde(default)]
    pub energy_schedule: EnergySchedule,
    #[serde(default)]
    pub alerts: AlertPreferences,
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

fn default_work_days() -> Vec<u32> {
    vec![1, 2, 3, 4, 5]
}

fn default_timezone() -> String {
    "UTC".to_string()
}

impl UserProductivityPreferences {
    pub fn defaults_for(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            work_hours: WorkHours::default(),
            preferred_work_days: default_work_days(),
            energy_schedule: EnergySchedule::default(),
            alerts: AlertPreferences::default(),
            timezone: default_timezone(),
        }
    }
}

use anyhow::{Context, Result, anyhow, bail};
use chrono::FixedOffset;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::alert::BreachScope;

const DEFAULT_CITIES: &[&str] = &["Delhi", "Mumbai", "Chennai", "Bangalore", "Kolkata", "Hyderabad"];
const DB_FILE_NAME: &str = "weather_data.db";
const CHART_FILE_NAME: &str = "temperature_trend.svg";

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// api_key = "..."
/// cities = ["Delhi", "Mumbai"]
/// poll_interval_secs = 300
/// temp_threshold_c = 35.0
/// breach_count = 2
/// hazard_conditions = ["Rain", "Snow"]
/// breach_scope = "per-city"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_key: Option<String>,

    /// Polled in this order every cycle.
    pub cities: Vec<String>,

    pub poll_interval_secs: u64,
    pub request_timeout_secs: u64,

    pub temp_threshold_c: f64,
    pub breach_count: u32,
    pub hazard_conditions: Vec<String>,
    pub breach_scope: BreachScope,

    /// Offset used for every time label shown to the operator. Defaults to IST.
    pub display_utc_offset_minutes: i32,

    pub db_path: Option<PathBuf>,
    pub chart_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            cities: DEFAULT_CITIES.iter().map(|c| c.to_string()).collect(),
            poll_interval_secs: 30,
            request_timeout_secs: 10,
            temp_threshold_c: 35.0,
            breach_count: 2,
            hazard_conditions: vec!["Rain".to_string(), "Snow".to_string()],
            breach_scope: BreachScope::default(),
            display_utc_offset_minutes: 5 * 60 + 30,
            db_path: None,
            chart_path: None,
        }
    }
}

impl Config {
    /// Load config from disk, or return defaults if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, use defaults.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_file_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        Ok(project_dirs()?.config_dir().join("config.toml"))
    }

    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key.as_deref().filter(|k| !k.trim().is_empty()).ok_or_else(|| {
            anyhow!(
                "No OpenWeather API key configured.\n\
                 Hint: run `weather-monitor configure` and enter your API key."
            )
        })
    }

    /// Reject values the monitor loop cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.cities.is_empty() {
            bail!("At least one city must be configured");
        }
        if let Some(pos) = self.cities.iter().position(|c| c.trim().is_empty()) {
            bail!("City #{} in the city list is blank", pos + 1);
        }
        if self.poll_interval_secs == 0 {
            bail!("poll_interval_secs must be greater than zero");
        }
        if self.request_timeout_secs == 0 {
            bail!("request_timeout_secs must be greater than zero");
        }
        if self.breach_count == 0 {
            bail!("breach_count must be at least 1");
        }
        if !self.temp_threshold_c.is_finite() {
            bail!("temp_threshold_c must be a finite number");
        }
        self.display_offset()?;
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn display_offset(&self) -> Result<FixedOffset> {
        FixedOffset::east_opt(self.display_utc_offset_minutes * 60).ok_or_else(|| {
            anyhow!(
                "display_utc_offset_minutes {} is out of range",
                self.display_utc_offset_minutes
            )
        })
    }

    pub fn resolved_db_path(&self) -> Result<PathBuf> {
        match &self.db_path {
            Some(path) => Ok(path.clone()),
            None => Ok(project_dirs()?.data_dir().join(DB_FILE_NAME)),
        }
    }

    pub fn resolved_chart_path(&self) -> Result<PathBuf> {
        match &self.chart_path {
            Some(path) => Ok(path.clone()),
            None => Ok(project_dirs()?.data_dir().join(CHART_FILE_NAME)),
        }
    }
}

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("dev", "weather-monitor", "weather-monitor")
        .ok_or_else(|| anyhow!("Could not determine platform config directory"))
}

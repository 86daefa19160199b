use crate::domain::classifier::{ClassifyOptions, PendingRule, DEFAULT_UPCOMING_LIMIT};
use crate::infrastructure::error::InfraError;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const APP_JSON: &str = "app.json";
const SUPPORTED_SCHEMA: u64 = 1;
const MIN_TICK_MILLIS: u64 = 50;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TokenBackend {
    #[default]
    Storage,
    Keyring,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RetrySettings {
    pub max_attempts: u8,
    pub base_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    pub schema: u8,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_tick_millis")]
    pub tick_millis: u64,
    #[serde(default = "default_upcoming_limit")]
    pub upcoming_limit: usize,
    #[serde(default)]
    pub pending_rule: PendingRule,
    /// Automatic refresh period while watching; 0 means manual refresh only.
    #[serde(default)]
    pub refresh_interval_seconds: u64,
    #[serde(default)]
    pub default_calendar_id: Option<String>,
    #[serde(default)]
    pub token_backend: TokenBackend,
    #[serde(default)]
    pub api_retry: RetrySettings,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_tick_millis() -> u64 {
    1000
}

fn default_upcoming_limit() -> usize {
    DEFAULT_UPCOMING_LIMIT
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            schema: SUPPORTED_SCHEMA as u8,
            timezone: default_timezone(),
            tick_millis: default_tick_millis(),
            upcoming_limit: default_upcoming_limit(),
            pending_rule: PendingRule::default(),
            refresh_interval_seconds: 0,
            default_calendar_id: None,
            token_backend: TokenBackend::default(),
            api_retry: RetrySettings::default(),
        }
    }
}

impl AppConfig {
    pub fn parsed_timezone(&self) -> Result<Tz, InfraError> {
        self.timezone.trim().parse::<Tz>().map_err(|error| {
            InfraError::InvalidConfig(format!("unknown timezone '{}': {error}", self.timezone))
        })
    }

    pub fn classify_options(&self) -> Result<ClassifyOptions, InfraError> {
        Ok(ClassifyOptions {
            timezone: self.parsed_timezone()?,
            upcoming_limit: self.upcoming_limit,
            pending_rule: self.pending_rule,
        })
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_millis.max(MIN_TICK_MILLIS))
    }

    pub fn refresh_interval(&self) -> Option<Duration> {
        (self.refresh_interval_seconds > 0).then(|| Duration::from_secs(self.refresh_interval_seconds))
    }

    pub fn default_calendar_id(&self) -> Option<&str> {
        self.default_calendar_id
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    fn validate(&self) -> Result<(), InfraError> {
        self.parsed_timezone()?;
        if self.upcoming_limit == 0 {
            return Err(InfraError::InvalidConfig(
                "upcomingLimit must be at least 1".to_string(),
            ));
        }
        if self.api_retry.max_attempts == 0 {
            return Err(InfraError::InvalidConfig(
                "apiRetry.maxAttempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

pub fn ensure_default_configs(config_dir: &Path) -> Result<(), InfraError> {
    let path = config_dir.join(APP_JSON);
    if !path.exists() {
        write_config(&path, &AppConfig::default())?;
    }
    Ok(())
}

fn write_config(path: &Path, config: &AppConfig) -> Result<(), InfraError> {
    let formatted = serde_json::to_string_pretty(config)?;
    fs::write(path, format!("{formatted}\n"))?;
    Ok(())
}

fn read_config(path: &Path) -> Result<serde_json::Value, InfraError> {
    let raw = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| InfraError::InvalidConfig(format!("missing schema in {}", path.display())))?;
    if schema != SUPPORTED_SCHEMA {
        return Err(InfraError::InvalidConfig(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    Ok(parsed)
}

pub fn load_app_config(config_dir: &Path) -> Result<AppConfig, InfraError> {
    let path = config_dir.join(APP_JSON);
    let config: AppConfig = serde_json::from_value(read_config(&path)?).map_err(|error| {
        InfraError::InvalidConfig(format!("invalid {}: {error}", path.display()))
    })?;
    config.validate()?;
    Ok(config)
}

pub fn save_default_calendar_id(config_dir: &Path, calendar_id: &str) -> Result<(), InfraError> {
    let calendar_id = calendar_id.trim();
    if calendar_id.is_empty() {
        return Err(InfraError::InvalidConfig(
            "defaultCalendarId must not be empty".to_string(),
        ));
    }

    let mut config = load_app_config(config_dir)?;
    config.default_calendar_id = Some(calendar_id.to_string());
    write_config(&config_dir.join(APP_JSON), &config)
}

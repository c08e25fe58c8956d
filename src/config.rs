use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;
use chrono::format::{Item, StrftimeItems};
use chrono::Duration as ChronoDuration;
use serde::Deserialize;
use thiserror::Error;
use crate::ward::census::DEFAULT_VISIBILITY_WINDOW_HOURS;
use crate::ward::WardSettings;

pub const CONFIG_PATH_ENV: &str = "WARDLINE_CONFIG";
pub const API_KEY_ENV: &str = "WARDLINE_API_KEY";
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";
/// One year.
pub const MAX_VISIBILITY_WINDOW_HOURS: i64 = 24 * 366;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {message}")]
    Read { path: String, message: String },
    #[error("Failed to parse config: {0}")]
    Parse(String),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub backend: BackendConfig,
    pub ward: WardConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Memory,
    Postgrest,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub kind: BackendKind,
    /// Memory backend: snapshot file; no persistence when absent.
    pub snapshot_path: Option<String>,
    /// PostgREST backend: REST root of the hosted database.
    pub url: Option<String>,
    pub api_key: String,
    pub patients_table: String,
    pub reports_table: String,
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig {
            kind: BackendKind::Memory,
            snapshot_path: Some("./data/ward.json".to_string()),
            url: None,
            api_key: String::new(),
            patients_table: "patients".to_string(),
            reports_table: "daily_reports".to_string(),
            timeout_secs: 10,
        }
    }
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WardConfig {
    pub visibility_window_hours: i64,
    pub guard_discharge: bool,
    pub date_display_format: String,
}

impl Default for WardConfig {
    fn default() -> Self {
        WardConfig {
            visibility_window_hours: DEFAULT_VISIBILITY_WINDOW_HOURS,
            guard_discharge: true,
            date_display_format: "%-m/%-d/%Y".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl Config {
    pub fn ward_settings(&self) -> WardSettings {
        WardSettings {
            patients_table: self.backend.patients_table.clone(),
            reports_table: self.backend.reports_table.clone(),
            visibility_window: ChronoDuration::hours(self.ward.visibility_window_hours),
            guard_discharge: self.ward.guard_discharge,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ward.visibility_window_hours <= 0
            || self.ward.visibility_window_hours > MAX_VISIBILITY_WINDOW_HOURS
        {
            return Err(ConfigError::Invalid(format!(
                "ward.visibility_window_hours must be between 1 and {}",
                MAX_VISIBILITY_WINDOW_HOURS
            )));
        }
        if StrftimeItems::new(&self.ward.date_display_format).any(|item| matches!(item, Item::Error)) {
            return Err(ConfigError::Invalid(format!(
                "ward.date_display_format is not a valid strftime format: {}",
                self.ward.date_display_format
            )));
        }
        if self.backend.kind == BackendKind::Postgrest
            && self.backend.url.as_deref().map_or(true, |url| url.trim().is_empty())
        {
            return Err(ConfigError::Invalid(
                "backend.url is required for the postgrest backend".to_string(),
            ));
        }
        if self.backend.patients_table.is_empty() || self.backend.reports_table.is_empty() {
            return Err(ConfigError::Invalid("backend table names must not be empty".to_string()));
        }
        Ok(())
    }
}

pub fn parse_config(raw: &str) -> Result<Config, ConfigError> {
    let config: Config = serde_yaml::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
    config.validate()?;
    Ok(config)
}

/// Loads the YAML config at `path`; a missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let mut config = match fs::read_to_string(path) {
        Ok(raw) => parse_config(&raw)?,
        Err(e) if e.kind() == ErrorKind::NotFound => Config::default(),
        Err(e) => {
            return Err(ConfigError::Read {
                path: path.display().to_string(),
                message: e.to_string(),
            })
        }
    };

    if let Ok(key) = std::env::var(API_KEY_ENV) {
        config.backend.api_key = key;
    }
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_fill_missing_sections() {
        let config = parse_config("api:\n  port: 8080\n").unwrap();

        assert_eq!(config.api.port, 8080);
        assert_eq!(config.api.host, "127.0.0.1");
        assert_eq!(config.backend.kind, BackendKind::Memory);
        assert_eq!(config.ward.visibility_window_hours, 48);
        assert!(config.ward.guard_discharge);
        assert_eq!(config.ward_settings().visibility_window, ChronoDuration::hours(48));
    }

    #[test]
    fn test_postgrest_backend() {
        let raw = r#"
backend:
  kind: postgrest
  url: https://ward.example.org/rest/v1
  api_key: secret
  timeout_secs: 3
ward:
  guard_discharge: false
  visibility_window_hours: 24
logging:
  level: debug
  json: true
"#;
        let config = parse_config(raw).unwrap();

        assert_eq!(config.backend.kind, BackendKind::Postgrest);
        assert_eq!(config.backend.url.as_deref(), Some("https://ward.example.org/rest/v1"));
        assert_eq!(config.backend.timeout(), Duration::from_secs(3));
        assert!(!config.ward_settings().guard_discharge);
        assert!(config.logging.json);
    }

    #[test]
    fn test_postgrest_without_url_is_rejected() {
        let result = parse_config("backend:\n  kind: postgrest\n");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_zero_window_is_rejected() {
        let result = parse_config("ward:\n  visibility_window_hours: 0\n");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_oversized_window_is_rejected() {
        let result = parse_config("ward:\n  visibility_window_hours: 9223372036854775807\n");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));

        let config = parse_config("ward:\n  visibility_window_hours: 8784\n").unwrap();
        assert_eq!(config.ward_settings().visibility_window, ChronoDuration::hours(8784));
    }

    #[test]
    fn test_bad_date_display_format_is_rejected() {
        let result = parse_config("ward:\n  date_display_format: \"%Q\"\n");
        assert!(matches!(result, Err(ConfigError::Invalid(message)) if message.contains("%Q")));

        let config = parse_config("ward:\n  date_display_format: \"%d.%m.%Y\"\n").unwrap();
        assert_eq!(config.ward.date_display_format, "%d.%m.%Y");
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("absent.yaml")).unwrap();
        assert_eq!(config.api.port, 3000);
    }
}

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::api::DEFAULT_BASE_URL;
use crate::downsample::{Downsampler, DOWNSAMPLING_TARGET};
use crate::fallback::{FallbackSearch, MAX_DAYS_BACK};
use crate::logging::{LogConfig, LogFormat, LogLevel};
use crate::models::RollingWindow;
use crate::series::{SeriesFilter, SAMPLE_DATA_LIMIT};
use crate::session::DEFAULT_TIMEZONE_NAME;

/// Main application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub metadata: ConfigMetadata,

    /// Remote API settings
    #[serde(default)]
    pub api: ApiSettings,

    /// Chart pipeline tuning
    #[serde(default)]
    pub pipeline: PipelineSettings,

    /// Lookback search settings
    #[serde(default)]
    pub fallback: FallbackSettings,

    #[serde(default)]
    pub display: DisplaySettings,

    #[serde(default)]
    pub logging: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigMetadata {
    /// Configuration format version
    pub version: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub base_url: String,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    /// User whose readings are charted when none is given on the command line
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Readings considered per recomputation, applied before sorting
    pub sample_limit: usize,

    /// Maximum points handed to the chart
    pub downsample_target: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackSettings {
    /// Calendar days inspected, the start date included
    pub max_days_back: u32,
    pub abort_on_transport_error: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    /// Used when the server reports no timezone
    pub default_timezone: String,

    /// Rolling window in hours (6, 12 or 24)
    pub default_window: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        let now = Utc::now();

        AppConfig {
            metadata: ConfigMetadata {
                version: "1.0".to_string(),
                created_at: now,
                updated_at: now,
            },
            api: ApiSettings::default(),
            pipeline: PipelineSettings::default(),
            fallback: FallbackSettings::default(),
            display: DisplaySettings::default(),
            logging: LogConfig::default(),
        }
    }
}

impl Default for ApiSettings {
    fn default() -> Self {
        ApiSettings {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 30,
            user_id: None,
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        PipelineSettings {
            sample_limit: SAMPLE_DATA_LIMIT,
            downsample_target: DOWNSAMPLING_TARGET,
        }
    }
}

impl Default for FallbackSettings {
    fn default() -> Self {
        FallbackSettings {
            max_days_back: MAX_DAYS_BACK,
            abort_on_transport_error: false,
        }
    }
}

impl Default for DisplaySettings {
    fn default() -> Self {
        DisplaySettings {
            default_timezone: DEFAULT_TIMEZONE_NAME.to_string(),
            default_window: 24,
        }
    }
}

/// Keys understood by `get_value`/`set_value`
pub const CONFIG_KEYS: &[&str] = &[
    "api.base_url",
    "api.timeout_secs",
    "api.user_id",
    "pipeline.sample_limit",
    "pipeline.downsample_target",
    "fallback.max_days_back",
    "fallback.abort_on_transport_error",
    "display.default_timezone",
    "display.default_window",
    "logging.level",
    "logging.format",
    "logging.file_path",
    "logging.filter_sensitive",
];

impl AppConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: AppConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.metadata.updated_at = Utc::now();

        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }

        let toml_content = toml::to_string_pretty(self)
            .with_context(|| "Failed to serialize configuration to TOML")?;

        fs::write(&path, toml_content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }

    pub fn default_config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".glucoview")
            .join("config.toml")
    }

    /// Load `path` (or the default location), falling back to defaults when
    /// the file is missing or invalid
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let config_path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(Self::default_config_path);

        if !config_path.exists() {
            return Self::default();
        }

        match Self::load_from_file(&config_path) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %config_path.display(), error = %e, "Ignoring invalid config file");
                Self::default()
            }
        }
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.api.base_url.trim().is_empty() {
            bail!("api.base_url must not be empty");
        }
        if self.api.timeout_secs == 0 {
            bail!("api.timeout_secs must be greater than zero");
        }
        if self.pipeline.sample_limit == 0 {
            bail!("pipeline.sample_limit must be greater than zero");
        }
        if self.pipeline.downsample_target == 0 {
            bail!("pipeline.downsample_target must be greater than zero");
        }
        if self.fallback.max_days_back == 0 {
            bail!("fallback.max_days_back must be greater than zero");
        }
        self.display
            .default_timezone
            .parse::<Tz>()
            .map_err(|_| anyhow!("Unknown timezone: {}", self.display.default_timezone))?;
        self.default_window()?;
        Ok(())
    }

    pub fn default_window(&self) -> Result<RollingWindow> {
        RollingWindow::from_hours(self.display.default_window).ok_or_else(|| {
            anyhow!(
                "display.default_window must be 6, 12 or 24, got {}",
                self.display.default_window
            )
        })
    }

    pub fn series_filter(&self) -> SeriesFilter {
        SeriesFilter::new(self.pipeline.sample_limit)
    }

    pub fn downsampler(&self) -> Downsampler {
        Downsampler::new(self.pipeline.downsample_target)
    }

    pub fn fallback_search(&self) -> FallbackSearch {
        FallbackSearch {
            max_days_back: self.fallback.max_days_back,
            abort_on_transport_error: self.fallback.abort_on_transport_error,
        }
    }

    /// Read a setting by dotted key
    pub fn get_value(&self, key: &str) -> Result<String> {
        let value = match key {
            "api.base_url" => self.api.base_url.clone(),
            "api.timeout_secs" => self.api.timeout_secs.to_string(),
            "api.user_id" => self.api.user_id.clone().unwrap_or_default(),
            "pipeline.sample_limit" => self.pipeline.sample_limit.to_string(),
            "pipeline.downsample_target" => self.pipeline.downsample_target.to_string(),
            "fallback.max_days_back" => self.fallback.max_days_back.to_string(),
            "fallback.abort_on_transport_error" => self.fallback.abort_on_transport_error.to_string(),
            "display.default_timezone" => self.display.default_timezone.clone(),
            "display.default_window" => self.display.default_window.to_string(),
            "logging.level" => self.logging.level.as_str().to_string(),
            "logging.format" => format!("{:?}", self.logging.format).to_lowercase(),
            "logging.file_path" => self
                .logging
                .file_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            "logging.filter_sensitive" => self.logging.filter_sensitive.to_string(),
            _ => bail!("Unknown configuration key: {}", key),
        };
        Ok(value)
    }

    /// Update a setting by dotted key. The result is validated before it is
    /// kept.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        let mut updated = self.clone();
        let value = value.trim();

        match key {
            "api.base_url" => updated.api.base_url = value.trim_end_matches('/').to_string(),
            "api.timeout_secs" => updated.api.timeout_secs = parse_number(key, value)?,
            "api.user_id" => {
                updated.api.user_id = Some(value.to_string()).filter(|v| !v.is_empty())
            }
            "pipeline.sample_limit" => updated.pipeline.sample_limit = parse_number(key, value)?,
            "pipeline.downsample_target" => {
                updated.pipeline.downsample_target = parse_number(key, value)?
            }
            "fallback.max_days_back" => updated.fallback.max_days_back = parse_number(key, value)?,
            "fallback.abort_on_transport_error" => {
                updated.fallback.abort_on_transport_error = parse_bool(key, value)?
            }
            "display.default_timezone" => updated.display.default_timezone = value.to_string(),
            "display.default_window" => {
                updated.display.default_window =
                    parse_number(key, value.trim_end_matches(['h', 'H']))?
            }
            "logging.level" => {
                updated.logging.level = value.parse::<LogLevel>().map_err(|e| anyhow!(e))?
            }
            "logging.format" => {
                updated.logging.format = value.parse::<LogFormat>().map_err(|e| anyhow!(e))?
            }
            "logging.file_path" => {
                updated.logging.file_path = Some(PathBuf::from(value)).filter(|_| !value.is_empty())
            }
            "logging.filter_sensitive" => updated.logging.filter_sensitive = parse_bool(key, value)?,
            _ => bail!("Unknown configuration key: {}", key),
        }

        updated.validate()?;
        updated.metadata.updated_at = Utc::now();
        *self = updated;
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| anyhow!("{} expects a number, got '{}'", key, value))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(anyhow!("{} expects true or false, got '{}'", key, value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_match_pipeline_constants() {
        let config = AppConfig::default();
        assert_eq!(config.series_filter(), SeriesFilter::default());
        assert_eq!(config.downsampler().target, 20);
        assert_eq!(config.fallback_search(), FallbackSearch::default());
        assert_eq!(config.default_window().unwrap(), RollingWindow::TwentyFourHours);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_file_io() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.toml");

        let mut original = AppConfig::default();
        original.set_value("api.user_id", "6841a2cd").unwrap();
        original.set_value("fallback.max_days_back", "14").unwrap();
        original.save_to_file(&config_path).unwrap();

        let loaded = AppConfig::load_from_file(&config_path).unwrap();
        assert_eq!(loaded.api.user_id.as_deref(), Some("6841a2cd"));
        assert_eq!(loaded.fallback.max_days_back, 14);
        assert_eq!(loaded.pipeline, original.pipeline);
    }

    #[test]
    fn test_partial_file_uses_section_defaults() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(
            &config_path,
            r#"
[metadata]
version = "1.0"
created_at = "2025-01-01T00:00:00Z"
updated_at = "2025-01-01T00:00:00Z"

[pipeline]
downsample_target = 30
"#,
        )
        .unwrap();

        let loaded = AppConfig::load_from_file(&config_path).unwrap();
        assert_eq!(loaded.pipeline.downsample_target, 30);
        assert_eq!(loaded.pipeline.sample_limit, SAMPLE_DATA_LIMIT);
        assert_eq!(loaded.display.default_timezone, "America/Caracas");
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let temp_dir = tempdir().unwrap();
        let config = AppConfig::load_or_default(Some(&temp_dir.path().join("absent.toml")));
        assert_eq!(config.api.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_set_value_rejects_invalid() {
        let mut config = AppConfig::default();
        assert!(config.set_value("pipeline.downsample_target", "0").is_err());
        assert!(config.set_value("display.default_timezone", "Mars/Olympus").is_err());
        assert!(config.set_value("display.default_window", "48").is_err());
        assert!(config.set_value("no.such.key", "1").is_err());
        assert_eq!(config.pipeline.downsample_target, 20);
    }

    #[test]
    fn test_get_and_set_round_trip() {
        let mut config = AppConfig::default();
        config.set_value("display.default_window", "6h").unwrap();
        config.set_value("logging.level", "debug").unwrap();
        config.set_value("fallback.abort_on_transport_error", "yes").unwrap();

        assert_eq!(config.get_value("display.default_window").unwrap(), "6");
        assert_eq!(config.get_value("logging.level").unwrap(), "debug");
        assert_eq!(config.get_value("fallback.abort_on_transport_error").unwrap(), "true");
        for key in CONFIG_KEYS {
            assert!(config.get_value(key).is_ok(), "{}", key);
        }
    }
}

//! ---
//! gw_section: "01-core-functionality"
//! gw_subsection: "module"
//! gw_type: "source"
//! gw_scope: "code"
//! gw_description: "Shared primitives and utilities for the polling client."
//! gw_version: "v0.1.0"
//! gw_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};
use tracing::debug;
use url::Url;

use crate::logging::LogFormat;

fn default_base_url() -> Url {
    Url::parse("http://127.0.0.1:3000/api/").expect("valid default base url")
}

fn default_request_timeout() -> Duration {
    Duration::from_millis(5_000)
}

fn default_device_interval() -> Duration {
    Duration::from_millis(1_000)
}

fn default_dashboard_interval() -> Duration {
    Duration::from_millis(2_000)
}

fn default_fetch_stats() -> bool {
    true
}

fn default_trigger_phrases() -> Vec<String> {
    vec!["is inquiring".to_owned(), "hq inquiry".to_owned()]
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::StructuredJson
}

/// Primary configuration object for the gridwatch client.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub endpoint: EndpointConfig,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub watcher: WatcherConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Metadata describing where an [`AppConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedAppConfig {
    pub config: AppConfig,
    pub source: PathBuf,
}

impl AppConfig {
    pub const ENV_CONFIG_PATH: &'static str = "GRIDWATCH_CONFIG";

    /// Load configuration from disk, respecting the `GRIDWATCH_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration from disk together with the effective source path.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedAppConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(path.clone())?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                let path = candidate.as_ref().to_path_buf();
                let config = Self::from_path(path.clone())?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        Err(anyhow!(
            "no configuration files found. inspected: {}",
            candidates
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    }

    fn from_path(path: PathBuf) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = toml::from_str::<AppConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        self.endpoint.validate()?;
        self.poll.validate()?;
        self.watcher.validate()?;
        Ok(())
    }
}

impl std::str::FromStr for AppConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

/// Which server view the client follows.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// A single controllable device behind `/status`.
    Device,
    /// A multi-node dashboard behind `/nodes`.
    #[default]
    Dashboard,
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    #[serde(default = "default_base_url")]
    pub base_url: Url,
    #[serde(default = "default_request_timeout")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "request_timeout_ms")]
    pub request_timeout: Duration,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout: default_request_timeout(),
        }
    }
}

impl EndpointConfig {
    pub fn validate(&self) -> Result<()> {
        match self.base_url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(anyhow!(
                    "endpoint base_url must use http or https, got '{}'",
                    other
                ))
            }
        }
        if self.request_timeout.is_zero() {
            return Err(anyhow!("endpoint request_timeout_ms must be greater than zero"));
        }
        Ok(())
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    #[serde(default = "default_device_interval")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "device_interval_ms")]
    pub device_interval: Duration,
    #[serde(default = "default_dashboard_interval")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "dashboard_interval_ms")]
    pub dashboard_interval: Duration,
    #[serde(default = "default_fetch_stats")]
    pub fetch_stats: bool,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            device_interval: default_device_interval(),
            dashboard_interval: default_dashboard_interval(),
            fetch_stats: default_fetch_stats(),
        }
    }
}

impl PollConfig {
    /// Polling period used for the given mode.
    pub fn interval_for(&self, mode: Mode) -> Duration {
        match mode {
            Mode::Device => self.device_interval,
            Mode::Dashboard => self.dashboard_interval,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.device_interval.is_zero() || self.dashboard_interval.is_zero() {
            return Err(anyhow!("poll intervals must be greater than zero"));
        }
        Ok(())
    }
}

/// How log cursors are keyed.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CursorScope {
    #[default]
    PerNode,
    Global,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherConfig {
    #[serde(default = "default_trigger_phrases")]
    pub trigger_phrases: Vec<String>,
    #[serde(default)]
    pub scope: CursorScope,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            trigger_phrases: default_trigger_phrases(),
            scope: CursorScope::default(),
        }
    }
}

impl WatcherConfig {
    pub fn validate(&self) -> Result<()> {
        if self.trigger_phrases.is_empty() {
            return Err(anyhow!("watcher must declare at least one trigger phrase"));
        }
        if self.trigger_phrases.iter().any(|p| p.trim().is_empty()) {
            return Err(anyhow!("watcher trigger phrases must not be blank"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: default_log_format(),
            file_prefix: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_documented_intervals() {
        let config = AppConfig::default();
        assert_eq!(config.poll.interval_for(Mode::Device), Duration::from_millis(1_000));
        assert_eq!(
            config.poll.interval_for(Mode::Dashboard),
            Duration::from_millis(2_000)
        );
        assert_eq!(config.endpoint.base_url.as_str(), "http://127.0.0.1:3000/api/");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parses_inline_toml() {
        let config: AppConfig = r#"
            [endpoint]
            base_url = "http://grid.example:8080/api/"
            request_timeout_ms = 750

            [poll]
            dashboard_interval_ms = 250
            fetch_stats = false

            [watcher]
            trigger_phrases = ["escalation"]
            scope = "global"
        "#
        .parse()
        .unwrap();
        assert_eq!(config.endpoint.request_timeout, Duration::from_millis(750));
        assert_eq!(config.poll.dashboard_interval, Duration::from_millis(250));
        assert_eq!(config.poll.device_interval, Duration::from_millis(1_000));
        assert!(!config.poll.fetch_stats);
        assert_eq!(config.watcher.scope, CursorScope::Global);
        assert_eq!(config.watcher.trigger_phrases, vec!["escalation".to_owned()]);
    }

    #[test]
    fn rejects_zero_interval_and_blank_phrases() {
        assert!("[poll]\ndevice_interval_ms = 0".parse::<AppConfig>().is_err());
        assert!("[watcher]\ntrigger_phrases = []".parse::<AppConfig>().is_err());
        assert!("[watcher]\ntrigger_phrases = [\"  \"]"
            .parse::<AppConfig>()
            .is_err());
        assert!("[endpoint]\nbase_url = \"ftp://host/\""
            .parse::<AppConfig>()
            .is_err());
    }

    #[test]
    fn load_picks_first_existing_candidate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gridwatch.toml");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "[poll]\ndevice_interval_ms = 300").unwrap();

        let missing = dir.path().join("missing.toml");
        let loaded = AppConfig::load_with_source(&[missing, path.clone()]).unwrap();
        assert_eq!(loaded.source, path);
        assert_eq!(loaded.config.poll.device_interval, Duration::from_millis(300));
    }
}

//! Client configuration
//!
//! ## Resolution
//!
//! Settings are resolved in three layers, later layers winning:
//! 1. Embedded defaults (compiled into the binary)
//! 2. Override file: an explicit path, or `~/.config/tally/config.toml`
//! 3. Environment: `TALLY_BACKEND`, `TALLY_API_URL`, `TALLY_PAGE_SIZE`

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::history::DEFAULT_CAPACITY;
use crate::models::{SortDirection, SortField, SortSpec, StatisticsPeriod};

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../../config/default.toml");

/// Largest page size the backend accepts
pub const MAX_PAGE_SIZE: u32 = 100;

/// Which gateway implementation to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    #[default]
    Http,
    Mock,
}

impl std::str::FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "http" | "api" => Ok(Self::Http),
            "mock" | "demo" => Ok(Self::Mock),
            _ => Err(format!("Unknown backend: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BrowseConfig {
    pub page_size: u32,
    pub sort: SortSpec,
    pub server_side_filters: bool,
}

impl Default for BrowseConfig {
    fn default() -> Self {
        Self {
            page_size: 10,
            sort: SortSpec::default(),
            server_side_filters: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub backend: BackendKind,
    pub api: ApiConfig,
    pub browse: BrowseConfig,
    pub statistics_period: StatisticsPeriod,
    pub history_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendKind::Http,
            api: ApiConfig::default(),
            browse: BrowseConfig::default(),
            statistics_period: StatisticsPeriod::Monthly,
            history_capacity: DEFAULT_CAPACITY,
        }
    }
}

impl Config {
    /// Load defaults, the override file and the environment
    pub fn load(override_path: Option<&Path>) -> Result<Self> {
        let mut config = parse_config(DEFAULT_CONFIG, Config::default())?;

        match override_path {
            Some(path) => {
                let content = fs::read_to_string(path).map_err(|e| {
                    Error::Config(format!("Failed to read {}: {}", path.display(), e))
                })?;
                config = parse_config(&content, config)?;
            }
            None => {
                if let Some(path) = default_config_path().filter(|p| p.exists()) {
                    let content = fs::read_to_string(&path).map_err(|e| {
                        Error::Config(format!("Failed to read {}: {}", path.display(), e))
                    })?;
                    config = parse_config(&content, config)?;
                }
            }
        }

        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Parse a TOML document on top of the embedded defaults
    pub fn from_toml(content: &str) -> Result<Self> {
        let defaults = parse_config(DEFAULT_CONFIG, Config::default())?;
        parse_config(content, defaults)
    }

    /// Apply environment overrides through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(backend) = lookup("TALLY_BACKEND") {
            self.backend = backend.parse().map_err(Error::Config)?;
        }
        if let Some(url) = lookup("TALLY_API_URL") {
            self.api.base_url = url;
        }
        if let Some(size) = lookup("TALLY_PAGE_SIZE") {
            let size = size
                .parse::<u32>()
                .map_err(|e| Error::Config(format!("Invalid TALLY_PAGE_SIZE '{}': {}", size, e)))?;
            self.browse.page_size = validate_page_size(size)?;
        }
        Ok(())
    }
}

/// Default config override path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("tally").join("config.toml"))
}

fn validate_page_size(size: u32) -> Result<u32> {
    if size == 0 || size > MAX_PAGE_SIZE {
        return Err(Error::Config(format!(
            "page_size must be between 1 and {}, got {}",
            MAX_PAGE_SIZE, size
        )));
    }
    Ok(size)
}

/// Raw config structure for TOML parsing
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    backend: Option<String>,
    api: Option<RawApi>,
    browse: Option<RawBrowse>,
    statistics: Option<RawStatistics>,
    history: Option<RawHistory>,
}

#[derive(Debug, Deserialize)]
struct RawApi {
    base_url: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawBrowse {
    page_size: Option<u32>,
    sort_field: Option<String>,
    sort_direction: Option<String>,
    server_side_filters: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct RawStatistics {
    period: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawHistory {
    capacity: Option<usize>,
}

/// Parse TOML content, overriding only the keys it sets
fn parse_config(content: &str, mut config: Config) -> Result<Config> {
    let raw: RawConfig = toml::from_str(content)
        .map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))?;

    if let Some(backend) = raw.backend {
        config.backend = backend.parse().map_err(Error::Config)?;
    }

    if let Some(api) = raw.api {
        if let Some(url) = api.base_url {
            config.api.base_url = url;
        }
        if let Some(secs) = api.timeout_secs {
            if secs == 0 {
                return Err(Error::Config("timeout_secs must be positive".to_string()));
            }
            config.api.timeout = Duration::from_secs(secs);
        }
    }

    if let Some(browse) = raw.browse {
        if let Some(size) = browse.page_size {
            config.browse.page_size = validate_page_size(size)?;
        }
        if let Some(field) = browse.sort_field {
            config.browse.sort.field = field.parse::<SortField>().map_err(Error::Config)?;
        }
        if let Some(direction) = browse.sort_direction {
            config.browse.sort.direction =
                direction.parse::<SortDirection>().map_err(Error::Config)?;
        }
        if let Some(server_side) = browse.server_side_filters {
            config.browse.server_side_filters = server_side;
        }
    }

    if let Some(statistics) = raw.statistics {
        if let Some(period) = statistics.period {
            config.statistics_period = period.parse().map_err(Error::Config)?;
        }
    }

    if let Some(history) = raw.history {
        if let Some(capacity) = history.capacity {
            config.history_capacity = capacity.max(1);
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_parse_default_config() {
        let config = parse_config(DEFAULT_CONFIG, Config::default()).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_override_only_touches_given_keys() {
        let config = Config::from_toml(
            r#"
            [browse]
            page_size = 25
            sort_field = "amount"

            [statistics]
            period = "all_time"
            "#,
        )
        .unwrap();

        assert_eq!(config.browse.page_size, 25);
        assert_eq!(config.browse.sort.field, SortField::Amount);
        assert_eq!(config.browse.sort.direction, SortDirection::Desc);
        assert_eq!(config.statistics_period, StatisticsPeriod::AllTime);
        assert_eq!(config.api.base_url, "http://localhost:8000");
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(Config::from_toml("[browse]\npage_size = 0").is_err());
        assert!(Config::from_toml("[browse]\npage_size = 101").is_err());
        assert!(Config::from_toml("[browse]\nsort_field = \"merchant\"").is_err());
        assert!(Config::from_toml("backend = \"grpc\"").is_err());
        assert!(Config::from_toml("[unknown]\nkey = 1").is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("TALLY_BACKEND", "mock"),
            ("TALLY_API_URL", "http://example.test"),
            ("TALLY_PAGE_SIZE", "50"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_env(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.backend, BackendKind::Mock);
        assert_eq!(config.api.base_url, "http://example.test");
        assert_eq!(config.browse.page_size, 50);
    }

    #[test]
    fn test_env_rejects_bad_page_size() {
        let mut config = Config::default();
        let result = config.apply_env(|key| (key == "TALLY_PAGE_SIZE").then(|| "ten".to_string()));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_load_from_explicit_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[api]\nbase_url = \"http://10.0.0.5:8000\"\ntimeout_secs = 5").unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.api.base_url, "http://10.0.0.5:8000");
        assert_eq!(config.api.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_load_missing_explicit_file_fails() {
        let result = Config::load(Some(Path::new("/nonexistent/tally.toml")));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}

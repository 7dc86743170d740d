use anyhow::{anyhow, Result};
use config::Config;
use std::collections::HashMap;
use std::path::Path;

/// Default freshness window for cached resource states (8 hours)
pub const DEFAULT_STATE_CACHE_TTL_SECS: u64 = 8 * 60 * 60;

/// Default base URL for the RIPEstat data API
pub const DEFAULT_RIS_BASE_URL: &str = "https://stat.ripe.net/data";

pub struct VantageConfig {
    /// Path to the directory holding vantage's data
    pub data_dir: String,

    /// Freshness window for cached resource states, in seconds (default: 8 hours)
    pub state_cache_ttl_secs: u64,

    /// Base URL of the RIPEstat data API
    pub ris_base_url: String,

    /// Endpoint of the live-monitor collaborator, if any
    pub monitor_url: Option<String>,
}

const EMPTY_CONFIG: &str = r#"### vantage configuration file

### directory for cached data used by vantage
# data_dir = "~/.vantage"

### freshness window for cached resource states (in seconds)
# state_cache_ttl_secs = 28800      # 8 hours

### base URL of the RIPEstat data API
# ris_base_url = "https://stat.ripe.net/data"

### live-monitor registration endpoint (disabled when unset)
# monitor_url = "http://localhost:9100/states"
"#;

impl Default for VantageConfig {
    fn default() -> Self {
        let home_dir = dirs::home_dir()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|| ".".to_string());

        Self {
            data_dir: format!("{}/.vantage", home_dir),
            state_cache_ttl_secs: DEFAULT_STATE_CACHE_TTL_SECS,
            ris_base_url: DEFAULT_RIS_BASE_URL.to_string(),
            monitor_url: None,
        }
    }
}

impl VantageConfig {
    /// Create and initialize a new configuration
    ///
    /// When `path` is `None`, `$HOME/.vantage/vantage.toml` is used and
    /// created with a commented template if missing. Environment variables
    /// prefixed with `VANTAGE_` override file values, e.g.
    /// `VANTAGE_DATA_DIR=/tmp/vantage`.
    pub fn new(path: &Option<String>) -> Result<VantageConfig> {
        let mut builder = Config::builder();

        let home_dir = dirs::home_dir()
            .ok_or_else(|| anyhow!("Could not find home directory"))?
            .to_str()
            .ok_or_else(|| anyhow!("Could not convert home directory path to string"))?
            .to_owned();

        let vantage_dir = format!("{}/.vantage", home_dir.as_str());

        match path {
            Some(p) => {
                let path = Path::new(p.as_str());
                if path.exists() {
                    let path_str = path
                        .to_str()
                        .ok_or_else(|| anyhow!("Could not convert path to string"))?;
                    builder = builder.add_source(config::File::with_name(path_str));
                } else {
                    std::fs::write(p.as_str(), EMPTY_CONFIG)
                        .map_err(|e| anyhow!("Unable to create config file: {}", e))?;
                }
            }
            None => {
                std::fs::create_dir_all(vantage_dir.as_str())
                    .map_err(|e| anyhow!("Unable to create vantage directory: {}", e))?;
                let p = format!("{}/vantage.toml", vantage_dir.as_str());
                if Path::new(p.as_str()).exists() {
                    builder = builder.add_source(config::File::with_name(p.as_str()));
                } else {
                    std::fs::write(p.as_str(), EMPTY_CONFIG).map_err(|e| {
                        anyhow!("Unable to create config file {}: {}", p.as_str(), e)
                    })?;
                }
            }
        }

        builder = builder.add_source(config::Environment::with_prefix("VANTAGE"));

        let settings = builder
            .build()
            .map_err(|e| anyhow!("Failed to build configuration: {}", e))?;

        let config = settings
            .try_deserialize::<HashMap<String, String>>()
            .map_err(|e| anyhow!("Failed to deserialize configuration: {}", e))?;

        let data_dir = match config.get("data_dir") {
            Some(p) => p.trim_end_matches('/').to_string(),
            None => {
                std::fs::create_dir_all(vantage_dir.as_str())
                    .map_err(|e| anyhow!("Unable to create data directory: {}", e))?;
                vantage_dir
            }
        };

        let state_cache_ttl_secs = config
            .get("state_cache_ttl_secs")
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_STATE_CACHE_TTL_SECS);

        let ris_base_url = config
            .get("ris_base_url")
            .map(|v| v.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_RIS_BASE_URL.to_string());

        let monitor_url = config.get("monitor_url").cloned();

        Ok(VantageConfig {
            data_dir,
            state_cache_ttl_secs,
            ris_base_url,
            monitor_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = VantageConfig::default();
        assert_eq!(config.state_cache_ttl_secs, DEFAULT_STATE_CACHE_TTL_SECS);
        assert_eq!(config.ris_base_url, DEFAULT_RIS_BASE_URL);
        assert!(config.monitor_url.is_none());
    }

    #[test]
    fn test_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vantage.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "data_dir = \"/tmp/vantage-test\"").unwrap();
        writeln!(file, "state_cache_ttl_secs = \"3600\"").unwrap();
        writeln!(file, "monitor_url = \"http://localhost:9100/states\"").unwrap();
        drop(file);

        let config = VantageConfig::new(&Some(path.to_string_lossy().to_string())).unwrap();
        assert_eq!(config.data_dir, "/tmp/vantage-test");
        assert_eq!(config.state_cache_ttl_secs, 3600);
        assert_eq!(
            config.monitor_url.as_deref(),
            Some("http://localhost:9100/states")
        );
    }

    #[test]
    fn test_missing_config_file_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fresh.toml");

        let config = VantageConfig::new(&Some(path.to_string_lossy().to_string())).unwrap();
        assert!(path.exists());
        assert_eq!(config.state_cache_ttl_secs, DEFAULT_STATE_CACHE_TTL_SECS);
    }
}

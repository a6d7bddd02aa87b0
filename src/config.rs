use crate::error::{LocatorError, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub geocode: GeocodeConfig,
    pub data: DataConfig,
    pub export: ExportConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeocodeConfig {
    pub endpoint: String,
    pub api_key: String,
    /// Unconditional wait between provider calls, applied after every record.
    pub delay_ms: u64,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Directory holding one `<source>.json` file per configured source.
    pub source_dir: String,
    /// Directory for the JSON-file store documents.
    pub store_dir: String,
    pub sources: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub output_dir: String,
}

impl Default for GeocodeConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://maps.googleapis.com/maps/api/geocode/json".to_string(),
            api_key: String::new(),
            delay_ms: 50,
            timeout_seconds: 10,
        }
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            source_dir: "data/initial".to_string(),
            store_dir: "data/store".to_string(),
            sources: Vec::new(),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: "data/results".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            geocode: GeocodeConfig::default(),
            data: DataConfig::default(),
            export: ExportConfig::default(),
        }
    }
}

impl Config {
    /// Loads `config.toml` from the working directory, falling back to
    /// defaults when the file is absent. The geocode API key can always be
    /// overridden through the `GEOCODE_API_KEY` environment variable.
    pub fn load() -> Result<Self> {
        let config_path = "config.toml";
        let mut config = if Path::new(config_path).exists() {
            let config_content = fs::read_to_string(config_path).map_err(|e| {
                LocatorError::Config(format!("Failed to read config file '{config_path}': {e}"))
            })?;
            toml::from_str(&config_content)?
        } else {
            Config::default()
        };

        if let Ok(key) = std::env::var("GEOCODE_API_KEY") {
            if !key.trim().is_empty() {
                config.geocode.api_key = key;
            }
        }

        Ok(config)
    }
}

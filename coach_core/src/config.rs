//! Configuration file support for Coach.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/coach/config.toml`.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub metrics: MetricsSettings,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Tunables for the plan metrics calculator
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MetricsSettings {
    /// Flat energy heuristic, not a physiological model
    #[serde(default = "default_calories_per_minute")]
    pub calories_per_minute: f64,

    /// Volume assumed per session when the day declares none
    #[serde(default = "default_fallback_volume_per_session")]
    pub fallback_volume_per_session: f64,
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            calories_per_minute: default_calories_per_minute(),
            fallback_volume_per_session: default_fallback_volume_per_session(),
        }
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
        PathBuf::from(home).join(".local/share")
    });
    base.join("coach")
}

fn default_calories_per_minute() -> f64 {
    8.0
}

fn default_fallback_volume_per_session() -> f64 {
    3.0
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
            PathBuf::from(home).join(".config")
        });
        base.join("coach").join("config.toml")
    }

    /// Save the current configuration to the default path
    pub fn save(&self) -> Result<()> {
        let config_path = Self::default_config_path();
        self.save_to(&config_path)
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.metrics.calories_per_minute, 8.0);
        assert_eq!(config.metrics.fallback_volume_per_session, 3.0);
    }

    #[test]
    fn test_config_roundtrip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.toml");

        let mut config = Config::default();
        config.metrics.calories_per_minute = 9.5;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.metrics.calories_per_minute, 9.5);
        assert_eq!(loaded.metrics.fallback_volume_per_session, 3.0);
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
[metrics]
calories_per_minute = 10.0
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.metrics.calories_per_minute, 10.0);
        assert_eq!(config.metrics.fallback_volume_per_session, 3.0); // default
    }
}

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A validation error in the configuration
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]: {}", self.field, self.message)
    }
}

const CONFIG_DIR: &str = ".foodflow";

fn default_interval_ms() -> u64 {
    1_000
}

fn default_step_percent() -> u32 {
    2
}

/// Where the key-value store lives
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct StoreConfig {
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    #[serde(default)]
    pub seed_sample_data: Option<bool>,
}

/// Cadence of the simulated tracking timer
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct TrackingConfig {
    #[serde(default)]
    pub interval_ms: Option<u64>,
    #[serde(default)]
    pub step_percent: Option<u32>,
}

impl TrackingConfig {
    pub fn interval_ms(&self) -> u64 {
        self.interval_ms.unwrap_or_else(default_interval_ms)
    }

    pub fn step_percent(&self) -> u32 {
        self.step_percent.unwrap_or_else(default_step_percent)
    }

    /// Range checks shared by config files and `track` overrides
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.interval_ms() == 0 {
            errors.push(ValidationError {
                field: "tracking.interval_ms".to_string(),
                message: "Must be greater than 0".to_string(),
            });
        }

        let step = self.step_percent();
        if !(1..=100).contains(&step) {
            errors.push(ValidationError {
                field: "tracking.step_percent".to_string(),
                message: format!("Must be between 1 and 100, got {}", step),
            });
        }

        errors
    }
}

/// JSONL activity log settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ActivityConfig {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub tracking: TrackingConfig,
    #[serde(default)]
    pub activity: ActivityConfig,
    #[serde(default)]
    pub verbose: Option<bool>,
}

impl Config {
    /// Load configuration from default paths
    /// Priority: local (.foodflow/config.local.toml) > project (.foodflow/config.toml) > user (~/.foodflow/config.toml)
    pub fn load() -> Result<Self> {
        let home = dirs::home_dir();
        Self::load_layers(home.as_deref(), Path::new("."))
    }

    /// Merge the user, project and local layers found under `home` and `root`
    pub fn load_layers(home: Option<&Path>, root: &Path) -> Result<Self> {
        let mut config = Self::default();

        let mut layers = Vec::new();
        if let Some(home) = home {
            layers.push(home.join(CONFIG_DIR).join("config.toml"));
        }
        layers.push(root.join(CONFIG_DIR).join("config.toml"));
        layers.push(root.join(CONFIG_DIR).join("config.local.toml"));

        for path in layers {
            if path.exists() {
                let layer = Self::load_from(&path)?;
                config.merge(layer);
            }
        }

        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        Ok(config)
    }

    /// Merge another config into this one (other takes priority for every field it sets)
    pub fn merge(&mut self, other: Config) {
        if other.store.data_dir.is_some() {
            self.store.data_dir = other.store.data_dir;
        }
        if other.store.seed_sample_data.is_some() {
            self.store.seed_sample_data = other.store.seed_sample_data;
        }

        if other.tracking.interval_ms.is_some() {
            self.tracking.interval_ms = other.tracking.interval_ms;
        }
        if other.tracking.step_percent.is_some() {
            self.tracking.step_percent = other.tracking.step_percent;
        }

        if other.activity.enabled.is_some() {
            self.activity.enabled = other.activity.enabled;
        }
        if other.activity.dir.is_some() {
            self.activity.dir = other.activity.dir;
        }

        if other.verbose.is_some() {
            self.verbose = other.verbose;
        }
    }

    /// Data directory, defaulting to ~/.foodflow/data
    pub fn data_dir(&self) -> PathBuf {
        if let Some(dir) = &self.store.data_dir {
            return dir.clone();
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(CONFIG_DIR)
            .join("data")
    }

    pub fn seed_sample_data(&self) -> bool {
        self.store.seed_sample_data.unwrap_or(true)
    }

    pub fn activity_enabled(&self) -> bool {
        self.activity.enabled.unwrap_or(true)
    }

    pub fn activity_dir(&self) -> PathBuf {
        self.activity
            .dir
            .clone()
            .unwrap_or_else(|| self.data_dir().join("activity"))
    }

    pub fn verbose(&self) -> bool {
        self.verbose.unwrap_or(false)
    }

    /// Validate configuration and return any errors found
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = self.tracking.validate();

        if let Some(dir) = &self.store.data_dir {
            if dir.as_os_str().is_empty() {
                errors.push(ValidationError {
                    field: "store.data_dir".to_string(),
                    message: "Must not be empty".to_string(),
                });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

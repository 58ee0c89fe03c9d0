//! Engine configuration: asset locations, sample rate, and default
//! rendering options, persisted as TOML in the user's config directory.

use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use engine_core::Error;

/// Engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Directory holding impulse and HRTF assets plus their manifests
    pub asset_dir: String,

    /// Impulse-preset manifest file name, relative to `asset_dir`
    pub impulse_manifest: String,

    /// HRTF position manifest file name, relative to `asset_dir`
    pub hrtf_manifest: String,

    /// Output sample rate in Hz
    pub sample_rate: u32,

    /// Preset applied when a session starts without an explicit choice
    pub default_preset: Option<String>,

    /// Whether new sessions start with the HRTF path enabled
    pub hrtf_enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            asset_dir: "assets".to_string(),
            impulse_manifest: "impulses.json".to_string(),
            hrtf_manifest: "hrtf.json".to_string(),
            sample_rate: engine_core::DEFAULT_SAMPLE_RATE,
            default_preset: None,
            hrtf_enabled: true,
        }
    }
}

/// Configuration manager
pub struct ConfigManager {
    settings: Settings,
    config_file: PathBuf,
}

impl ConfigManager {
    /// Create a config manager backed by the user's config directory,
    /// loading an existing file or falling back to defaults.
    pub fn new() -> Result<Self, Error> {
        let mut config_dir = dirs::config_dir()
            .ok_or_else(|| Error::Config("Failed to determine config directory".to_string()))?;
        config_dir.push("soundfield");

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .map_err(|e| Error::Config(format!("Failed to create config directory: {}", e)))?;
        }

        Self::with_file(config_dir.join("config.toml"))
    }

    /// Create a ConfigManager with a custom file path (mainly for testing)
    pub fn with_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let config_file = path.as_ref().to_path_buf();
        let settings = if config_file.exists() {
            Self::load_from_file(&config_file)?
        } else {
            debug!("Config file not found, using defaults");
            Settings::default()
        };

        Ok(Self {
            settings,
            config_file,
        })
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Settings, Error> {
        let contents = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse config file: {}", e)))
    }

    /// Save settings to the config file
    pub fn save(&self) -> Result<(), Error> {
        let toml = toml::to_string_pretty(&self.settings)
            .map_err(|e| Error::Config(format!("Failed to serialize settings: {}", e)))?;

        if let Some(parent) = self.config_file.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| {
                    Error::Config(format!("Failed to create config directory: {}", e))
                })?;
            }
        }

        fs::write(&self.config_file, toml)
            .map_err(|e| Error::Config(format!("Failed to write config file: {}", e)))?;

        debug!("Saved config to {:?}", self.config_file);
        Ok(())
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn update_settings(&mut self, new_settings: Settings) {
        self.settings = new_settings;
    }
}

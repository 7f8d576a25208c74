//! Configuration and persisted mixer state
//!
//! This module provides:
//! - Application and audio device settings
//! - The persisted shape of every channel, FX chain and master effect
//! - TOML load/save through [`ConfigManager`]
//!
//! The engine never sees a file format. It produces and consumes
//! [`MixerSettings`] through its bulk serialize/restore entry points.

use crate::domain::channel::{Gain, CHANNEL_COUNT, PLUGIN_SLOT_COUNT};
use crate::domain::fx::FxChainRecord;
use crate::domain::mixer::bus::{BusNames, BUS_COUNT};
use crate::domain::mixer::master::MasterFx;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, error, info, instrument};

pub type Result<T> = std::result::Result<T, ConfigError>;

const CONFIG_FILE: &str = "synthmix.toml";

/// Errors that can occur during configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Application-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Render block in frames
    pub buffer_size: u32,

    pub sample_rate: u32,

    /// Peak meter decay per meter tick, in full-scale units
    pub meter_decay: f32,

    /// Load the native plugin host (off in restricted environments)
    pub enable_plugins: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            buffer_size: 512,
            sample_rate: 48000,
            meter_decay: 0.05,
            enable_plugins: true,
        }
    }
}

/// Audio device configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioDeviceConfig {
    /// Output device name or ID (empty = use default)
    pub output_device: String,
}

impl AudioDeviceConfig {
    pub fn output_device(&self) -> Option<&str> {
        Some(self.output_device.as_str()).filter(|s| !s.is_empty())
    }
}

/// Persisted state of one channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelRecord {
    pub gain: i32,
    pub mute: bool,
    pub solo: bool,
    /// -1 for master, otherwise a bus index
    pub bus_target: i32,
    /// -1 for none
    pub plugin_slot: i32,
    pub device: i32,
    pub speaker: i32,
    pub fx: FxChainRecord,
}

impl Default for ChannelRecord {
    fn default() -> Self {
        Self {
            gain: Gain::DEFAULT,
            mute: false,
            solo: false,
            bus_target: -1,
            plugin_slot: -1,
            device: 0,
            speaker: 0,
            fx: FxChainRecord::default(),
        }
    }
}

/// Persisted plugin-instrument slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstrumentSlotRecord {
    /// -1 for an empty slot
    pub unique_id: i64,
    /// -1 for no program
    pub program: i32,
    pub params: Vec<f32>,
    pub state_blob: Vec<u8>,
}

impl Default for InstrumentSlotRecord {
    fn default() -> Self {
        Self {
            unique_id: -1,
            program: -1,
            params: Vec::new(),
            state_blob: Vec::new(),
        }
    }
}

/// Everything the engine persists
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixerSettings {
    pub preset_bank: usize,
    pub bus_short_names: Vec<String>,
    pub bus_full_names: Vec<String>,
    pub master_fx: MasterFx,
    pub instrument_slots: Vec<InstrumentSlotRecord>,
    /// Positional by channel index
    pub channels: Vec<ChannelRecord>,
}

impl Default for MixerSettings {
    fn default() -> Self {
        let names = BusNames::new();
        Self {
            preset_bank: 0,
            bus_short_names: names.short_names().to_vec(),
            bus_full_names: names.full_names().to_vec(),
            master_fx: MasterFx::default(),
            instrument_slots: vec![InstrumentSlotRecord::default(); PLUGIN_SLOT_COUNT],
            channels: vec![ChannelRecord::default(); CHANNEL_COUNT],
        }
    }
}

impl MixerSettings {
    /// Bus name lists are only usable when both are complete
    pub fn has_bus_names(&self) -> bool {
        self.bus_short_names.len() == BUS_COUNT && self.bus_full_names.len() == BUS_COUNT
    }
}

/// Complete SynthMix configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthMixConfig {
    pub app: AppConfig,
    pub audio: AudioDeviceConfig,
    pub mixer: MixerSettings,
}

impl SynthMixConfig {
    /// Load configuration from TOML file
    #[instrument(skip(path))]
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        let contents = fs::read_to_string(path).await?;
        let config: Self = toml::from_str(&contents)?;

        debug!("Configuration loaded successfully");
        Ok(config)
    }

    /// Save configuration to TOML file
    #[instrument(skip(self, path))]
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        info!(path = %path.display(), "Saving configuration");

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let toml_str = toml::to_string_pretty(self)?;
        fs::write(path, toml_str).await?;

        debug!("Configuration saved successfully");
        Ok(())
    }

    /// Factory default configuration: every channel at its default state
    pub fn factory_default() -> Self {
        Self::default()
    }
}

/// Owns `<config dir>/synthmix.toml`
pub struct ConfigManager {
    config_dir: PathBuf,
    config_path: PathBuf,
}

impl ConfigManager {
    pub fn new(config_dir: PathBuf) -> Self {
        let config_path = config_dir.join(CONFIG_FILE);
        Self {
            config_dir,
            config_path,
        }
    }

    /// `~/.config/synthmix` on Linux, `%APPDATA%\synthmix` on Windows
    pub fn default_config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|p| p.join("synthmix"))
            .ok_or_else(|| ConfigError::Invalid("Could not determine config directory".to_string()))
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Load configuration from file
    ///
    /// A missing file yields the factory default, which is written back.
    /// A corrupt file is copied aside as `*.toml.corrupt` and the factory
    /// default is returned.
    #[instrument(skip(self))]
    pub async fn load(&self) -> SynthMixConfig {
        if !self.config_path.exists() {
            info!(
                path = %self.config_path.display(),
                "Config file not found, creating factory default"
            );

            let config = SynthMixConfig::factory_default();
            if let Err(e) = config.save_to_file(&self.config_path).await {
                error!(
                    path = %self.config_path.display(),
                    error = %e,
                    "Failed to save factory default config"
                );
            }
            return config;
        }

        match SynthMixConfig::load_from_file(&self.config_path).await {
            Ok(config) => config,
            Err(e) => {
                error!(
                    path = %self.config_path.display(),
                    error = %e,
                    "Failed to load config, using factory default"
                );

                let backup_path = self.config_path.with_extension("toml.corrupt");
                if let Err(copy_err) = fs::copy(&self.config_path, &backup_path).await {
                    error!(
                        path = %backup_path.display(),
                        error = %copy_err,
                        "Failed to backup corrupt config"
                    );
                }

                SynthMixConfig::factory_default()
            }
        }
    }

    #[instrument(skip(self, config))]
    pub async fn save(&self, config: &SynthMixConfig) -> Result<()> {
        fs::create_dir_all(&self.config_dir).await?;
        config.save_to_file(&self.config_path).await
    }

    /// Delete the config file
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<()> {
        if self.config_path.exists() {
            fs::remove_file(&self.config_path).await?;
            info!(path = %self.config_path.display(), "Configuration cleared");
        }
        Ok(())
    }

    pub fn exists(&self) -> bool {
        self.config_path.exists()
    }
}

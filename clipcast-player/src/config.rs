//! clipcast-player configuration
//!
//! Combines the bootstrap TOML with command-line overrides and validates the
//! settings the playback core needs.

use crate::dispatch::{DispatchSettings, TriggerMapping};
use crate::error::{Error, Result};
use crate::transport::VoiceDestination;
use clipcast_common::config::{ConfigResolver, TomlConfig};
use std::path::PathBuf;

/// Command-line configuration overrides
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub config_path: Option<PathBuf>,
    pub data_folder: Option<PathBuf>,
    pub grace_play_period: Option<usize>,
    pub self_id: Option<String>,
}

/// Complete player configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Folder holding clip containers
    pub data_folder: PathBuf,

    /// Container extension without the dot
    pub clip_extension: String,

    /// Non-empty frames emitted before preemption is honoured
    pub grace_play_period: usize,

    /// Decode every mapped clip at startup
    pub preload: bool,

    /// Log level from the `[logging]` table
    pub log_level: String,

    pub mapping: TriggerMapping,

    pub dispatch: DispatchSettings,
}

impl Config {
    /// Load configuration for `module_name`, applying `overrides`
    pub fn load(module_name: &str, overrides: ConfigOverrides) -> Result<Self> {
        let resolver = ConfigResolver::new(module_name);
        let toml_config = resolver.load(overrides.config_path.as_deref())?;
        let data_folder = resolver.resolve_data_folder(overrides.data_folder.as_deref(), &toml_config);
        Self::from_toml(toml_config, data_folder, overrides)
    }

    /// Build configuration from parsed TOML and an already resolved data folder
    pub fn from_toml(
        toml_config: TomlConfig,
        data_folder: PathBuf,
        overrides: ConfigOverrides,
    ) -> Result<Self> {
        toml_config.validate().map_err(|e| Error::Config(e.to_string()))?;

        let TomlConfig {
            clip_extension,
            self_id,
            allowed_channels,
            sound_map,
            guild_id,
            voice_channel_id,
            grace_play_period,
            trigger_delimiter,
            preload,
            logging,
            ..
        } = toml_config;

        // validate() guarantees both ids are present
        let destination = match (guild_id, voice_channel_id) {
            (Some(guild_id), Some(channel_id)) => VoiceDestination::new(guild_id, channel_id),
            _ => return Err(Error::Config("voice destination is not set".to_string())),
        };

        let grace_play_period = overrides.grace_play_period.unwrap_or(grace_play_period);
        let self_id = overrides.self_id.or(self_id);

        Ok(Self {
            data_folder,
            clip_extension,
            grace_play_period,
            preload,
            log_level: logging.level,
            mapping: TriggerMapping::new(sound_map),
            dispatch: DispatchSettings {
                self_id,
                allowed_channels: allowed_channels.into_iter().collect(),
                destination,
                delimiter: trigger_delimiter,
            },
        })
    }
}

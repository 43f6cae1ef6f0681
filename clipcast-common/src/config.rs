//! Bootstrap configuration loading and path resolution
//!
//! Configuration sources, highest priority first:
//! 1. Command-line arguments
//! 2. Environment variables (`CLIPCAST_CONFIG`, `CLIPCAST_DATA_FOLDER`)
//! 3. TOML configuration file
//! 4. Built-in defaults
//!
//! A missing config file at the default location is not fatal: a warning is
//! logged and built-in defaults are used. A config file named explicitly (CLI
//! or environment) must exist.

use crate::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the TOML config file
pub const CONFIG_ENV_VAR: &str = "CLIPCAST_CONFIG";

/// Environment variable naming the clip data folder
pub const DATA_FOLDER_ENV_VAR: &str = "CLIPCAST_DATA_FOLDER";

/// Data folder used when nothing else is configured
pub const DEFAULT_DATA_FOLDER: &str = "data";

/// Bootstrap configuration loaded from TOML
///
/// Read once at startup. The trigger map and channel allow-list are
/// read-only for the lifetime of the process.
#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    /// Folder holding `<clip>.<clip_extension>` container files
    #[serde(default)]
    pub data_folder: Option<PathBuf>,

    /// Container file extension (without the dot)
    #[serde(default = "default_clip_extension")]
    pub clip_extension: String,

    /// Identity of this bot; events from it are ignored
    #[serde(default)]
    pub self_id: Option<String>,

    /// Source channels whose messages may trigger clips
    #[serde(default)]
    pub allowed_channels: Vec<String>,

    /// Trigger token → clip identifier
    #[serde(default)]
    pub sound_map: HashMap<String, String>,

    /// Guild (server) of the destination voice channel
    #[serde(default)]
    pub guild_id: Option<String>,

    /// Destination voice channel
    #[serde(default)]
    pub voice_channel_id: Option<String>,

    /// Non-empty frames a clip must emit before it can be preempted
    #[serde(default = "default_grace_play_period")]
    pub grace_play_period: usize,

    /// Delimiter surrounding trigger tokens in message text
    #[serde(default = "default_trigger_delimiter")]
    pub trigger_delimiter: String,

    /// Decode every mapped clip at startup
    #[serde(default)]
    pub preload: bool,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            data_folder: None,
            clip_extension: default_clip_extension(),
            self_id: None,
            allowed_channels: Vec::new(),
            sound_map: HashMap::new(),
            guild_id: None,
            voice_channel_id: None,
            grace_play_period: default_grace_play_period(),
            trigger_delimiter: default_trigger_delimiter(),
            preload: false,
            logging: LoggingConfig::default(),
        }
    }
}

fn default_clip_extension() -> String {
    "dca".to_string()
}

fn default_grace_play_period() -> usize {
    25 // ~0.5s of 20ms Opus frames
}

fn default_trigger_delimiter() -> String {
    ":".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl TomlConfig {
    /// Parse configuration from TOML text
    pub fn parse(toml_str: &str, origin: &Path) -> Result<Self> {
        toml::from_str(toml_str).map_err(|source| Error::ConfigParse {
            path: origin.to_path_buf(),
            source,
        })
    }

    /// Read and parse a TOML configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let toml_str = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::NotFound(format!("config file {}", path.display()))
            } else {
                Error::Io(e)
            }
        })?;
        Self::parse(&toml_str, path)
    }

    /// Check the settings the playback core cannot run without
    pub fn validate(&self) -> Result<()> {
        if self.guild_id.as_deref().map_or(true, str::is_empty) {
            return Err(Error::Config("guild_id is not set".to_string()));
        }
        if self.voice_channel_id.as_deref().map_or(true, str::is_empty) {
            return Err(Error::Config("voice_channel_id is not set".to_string()));
        }
        if self.trigger_delimiter.is_empty() {
            return Err(Error::Config("trigger_delimiter must not be empty".to_string()));
        }
        if self.clip_extension.is_empty() {
            return Err(Error::Config("clip_extension must not be empty".to_string()));
        }
        for (token, clip) in &self.sound_map {
            if token.is_empty() || clip.is_empty() {
                return Err(Error::Config(format!(
                    "sound_map entry {:?} = {:?} has an empty side",
                    token, clip
                )));
            }
        }
        Ok(())
    }
}

/// Resolves config file and data folder locations for a module
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    module_name: String,
}

impl ConfigResolver {
    pub fn new(module_name: &str) -> Self {
        Self {
            module_name: module_name.to_string(),
        }
    }

    /// Default config file location: `<config_dir>/<module>/config.toml`
    pub fn default_config_path(&self) -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(&self.module_name).join("config.toml"))
    }

    /// Load the TOML configuration
    ///
    /// Explicit paths (CLI, then `CLIPCAST_CONFIG`) must exist. Otherwise the
    /// default location is tried and built-in defaults are used if absent.
    pub fn load(&self, cli_path: Option<&Path>) -> Result<TomlConfig> {
        if let Some(path) = cli_path {
            info!("Loading config from {} (command line)", path.display());
            return TomlConfig::from_file(path);
        }

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let path = PathBuf::from(path);
            info!("Loading config from {} ({})", path.display(), CONFIG_ENV_VAR);
            return TomlConfig::from_file(&path);
        }

        match self.default_config_path() {
            Some(path) if path.exists() => {
                info!("Loading config from {}", path.display());
                TomlConfig::from_file(&path)
            }
            _ => {
                warn!(
                    "No config file found for {}, using built-in defaults",
                    self.module_name
                );
                Ok(TomlConfig::default())
            }
        }
    }

    /// Resolve the clip data folder: CLI > environment > TOML > `./data`
    pub fn resolve_data_folder(&self, cli_arg: Option<&Path>, config: &TomlConfig) -> PathBuf {
        if let Some(path) = cli_arg {
            return path.to_path_buf();
        }

        if let Ok(path) = std::env::var(DATA_FOLDER_ENV_VAR) {
            if !path.is_empty() {
                return PathBuf::from(path);
            }
        }

        if let Some(path) = &config.data_folder {
            return path.clone();
        }

        PathBuf::from(DEFAULT_DATA_FOLDER)
    }
}

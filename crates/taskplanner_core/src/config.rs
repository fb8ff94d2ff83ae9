//! Core runtime configuration.
//!
//! # Responsibility
//! - Describe where the store lives and how logging is set up.
//! - Load settings from an optional TOML file, then apply
//!   `TASKPLANNER_*` environment overrides.
//!
//! # Invariants
//! - A missing file yields defaults; a malformed file is an error.
//! - Unparsable environment values fall back to the current setting.

use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Default capacity of the change-notice and snapshot broadcast channels.
pub const DEFAULT_CHANGE_BUFFER: usize = 256;
const MIN_CHANGE_BUFFER: usize = 16;

/// Environment variable naming the TOML config file.
pub const ENV_CONFIG_PATH: &str = "TASKPLANNER_CONFIG";
const ENV_DB_PATH: &str = "TASKPLANNER_DB_PATH";
const ENV_LOG_LEVEL: &str = "TASKPLANNER_LOG_LEVEL";
const ENV_LOG_DIR: &str = "TASKPLANNER_LOG_DIR";
const ENV_CHANGE_BUFFER: &str = "TASKPLANNER_CHANGE_BUFFER";

#[derive(Debug)]
pub enum ConfigError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read { path, source } => {
                write!(f, "failed to read config file `{}`: {source}", path.display())
            }
            Self::Parse { path, source } => {
                write!(f, "failed to parse config file `{}`: {source}", path.display())
            }
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Read { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// SQLite file path. `None` keeps everything in memory.
    pub db_path: Option<PathBuf>,
    /// One of `trace|debug|info|warn|error`.
    pub log_level: String,
    /// Absolute log directory. `None` leaves logging uninitialized.
    pub log_dir: Option<PathBuf>,
    /// Broadcast capacity for live-update notices.
    pub change_buffer: usize,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            log_level: crate::logging::default_log_level().to_string(),
            log_dir: None,
            change_buffer: DEFAULT_CHANGE_BUFFER,
        }
    }
}

impl CoreConfig {
    /// Reads a TOML config file. Absent keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::info!(
                "event=config_load module=config status=default path={}",
                path.display()
            );
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        log::info!(
            "event=config_load module=config status=ok path={}",
            path.display()
        );
        Ok(config)
    }

    /// Builds a config from defaults overridden by environment variables.
    ///
    /// When `TASKPLANNER_CONFIG` names a file, it is loaded first.
    pub fn from_env() -> Result<Self, ConfigError> {
        let base = match non_blank(std::env::var(ENV_CONFIG_PATH).ok()) {
            Some(path) => Self::load(Path::new(&path))?,
            None => Self::default(),
        };
        Ok(base.with_overrides(|key| std::env::var(key).ok()))
    }

    /// Builds a config from defaults and an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self::default().with_overrides(lookup)
    }

    /// Applies `TASKPLANNER_*` overrides found through `lookup`.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(path) = non_blank(lookup(ENV_DB_PATH)) {
            self.db_path = Some(PathBuf::from(path));
        }
        if let Some(level) = non_blank(lookup(ENV_LOG_LEVEL)) {
            self.log_level = level;
        }
        if let Some(dir) = non_blank(lookup(ENV_LOG_DIR)) {
            self.log_dir = Some(PathBuf::from(dir));
        }
        if let Some(buffer) = non_blank(lookup(ENV_CHANGE_BUFFER)) {
            if let Ok(value) = buffer.parse::<usize>() {
                self.change_buffer = value;
            }
        }
        self
    }

    /// Change buffer clamped to a usable minimum.
    pub fn effective_change_buffer(&self) -> usize {
        self.change_buffer.max(MIN_CHANGE_BUFFER)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

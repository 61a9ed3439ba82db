use crate::core::config::data::{path_display, FileConfig};
use crate::core::error::ChatError;
use directories::ProjectDirs;
use std::error::Error as StdError;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Errors that can occur when loading configuration from disk.
#[derive(Debug)]
pub enum ConfigError {
    /// A config path given on the command line does not exist.
    Missing { path: PathBuf },

    /// Failed to read the configuration file from disk.
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to parse the configuration file as valid TOML.
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing { path } => {
                write!(f, "Config file not found: {}", path_display(path))
            }
            ConfigError::Read { path, source } => {
                write!(f, "Failed to read config at {}: {}", path_display(path), source)
            }
            ConfigError::Parse { path, source } => {
                write!(f, "Failed to parse config at {}: {}", path_display(path), source)
            }
        }
    }
}

impl StdError for ConfigError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            ConfigError::Missing { .. } => None,
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
        }
    }
}

impl From<ConfigError> for ChatError {
    fn from(err: ConfigError) -> Self {
        ChatError::Configuration(err.to_string())
    }
}

impl FileConfig {
    /// Loads an explicitly requested file, which must exist, or the default
    /// file, which may be absent.
    pub fn load(explicit_path: Option<&Path>) -> Result<FileConfig, ConfigError> {
        match explicit_path {
            Some(path) if !path.exists() => Err(ConfigError::Missing {
                path: path.to_path_buf(),
            }),
            Some(path) => Self::load_from_path(path),
            None => match default_config_path() {
                Some(path) => Self::load_from_path(&path),
                None => Ok(FileConfig::default()),
            },
        }
    }

    pub fn load_from_path(config_path: &Path) -> Result<FileConfig, ConfigError> {
        if !config_path.exists() {
            return Ok(FileConfig::default());
        }

        let contents = fs::read_to_string(config_path).map_err(|source| ConfigError::Read {
            path: config_path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: config_path.to_path_buf(),
            source,
        })
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("org", "toolchat", "toolchat")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const CONFIG_ENV: &str = "BLACKBOX_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "./blackbox.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Cell delimiter of the produced CSV files.
    pub separator: char,
    /// Run the quaternion to Euler angle pass after decoding.
    pub convert_to_euler: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            separator: ';',
            convert_to_euler: false,
        }
    }
}

impl Config {
    /// Loads the config from `path`, then `$BLACKBOX_CONFIG`, then
    /// `./blackbox.toml`. Falls back to the defaults if none of the implicit
    /// locations exist; an explicit `path` must be readable.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::from_file(path);
        }
        let candidates = std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .into_iter()
            .chain([PathBuf::from(DEFAULT_CONFIG_PATH)]);
        for path in candidates {
            if path.exists() {
                return Self::from_file(&path);
            }
        }
        tracing::debug!("no config file found, using defaults");
        Ok(Self::default())
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&contents)?;
        config.separator_byte()?;
        Ok(config)
    }

    /// The separator as the single byte the CSV reader and writer expect.
    pub fn separator_byte(&self) -> Result<u8, ConfigError> {
        separator_byte(self.separator)
    }
}

pub fn separator_byte(separator: char) -> Result<u8, ConfigError> {
    match separator {
        '"' | '\n' | '\r' => Err(ConfigError::InvalidSeparator(separator)),
        c if c.is_ascii() => Ok(c as u8),
        c => Err(ConfigError::InvalidSeparator(c)),
    }
}
